use crate::config::ToolConfig;
use crate::error::Result;
use crate::platform::{script_name, Platform};
use crate::tools::ToolAdapter;
use async_trait::async_trait;
use std::path::Path;

const GRADLE_DIST_BASE: &str = "https://services.gradle.org/distributions";

/// Known-good Gradle releases offered by the bootstrap.
const GRADLE_VERSIONS: &[&str] = &[
    "8.10.2",
    "8.9",
    "8.7",
    "8.5",
    "8.4",
    "7.6.4",
    "6.9.4",
];

pub struct GradleAdapter {
    platform: Platform,
}

impl GradleAdapter {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolAdapter for GradleAdapter {
    fn name(&self) -> &'static str {
        "gradle"
    }

    fn description(&self) -> &'static str {
        "Gradle build tool"
    }

    async fn list_versions(&self, _cfg: &ToolConfig) -> Result<Vec<String>> {
        Ok(GRADLE_VERSIONS.iter().map(|v| v.to_string()).collect())
    }

    async fn download_url(&self, version: &str, _cfg: &ToolConfig) -> Result<String> {
        // Gradle ships a single zip for every platform.
        Ok(format!("{}/gradle-{}-bin.zip", GRADLE_DIST_BASE, version))
    }

    fn canonical_executable(&self) -> String {
        script_name(self.platform, "bin/gradle", "bat")
    }

    fn env_contribution(&self, _cfg: &ToolConfig, install_root: &Path) -> Vec<(String, String)> {
        vec![(
            "GRADLE_HOME".to_string(),
            install_root.display().to_string(),
        )]
    }

    fn dependencies(&self) -> &[&'static str] {
        &["java"]
    }
}
