use crate::config::ToolConfig;
use crate::error::Result;
use crate::platform::{script_name, Platform};
use crate::tools::ToolAdapter;
use async_trait::async_trait;
use std::path::Path;

const MAVEN_DIST_BASE: &str = "https://archive.apache.org/dist/maven";

/// Known-good Maven releases. The Apache archive keeps every historical
/// build; this list is the curated subset the bootstrap will offer.
const MAVEN_VERSIONS: &[&str] = &[
    "4.0.0-rc-1",
    "3.9.9",
    "3.9.8",
    "3.9.6",
    "3.9.5",
    "3.8.8",
    "3.6.3",
];

pub struct MavenAdapter {
    platform: Platform,
}

impl MavenAdapter {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn archive_extension(&self) -> &'static str {
        if self.platform.is_windows() {
            "zip"
        } else {
            "tar.gz"
        }
    }
}

#[async_trait]
impl ToolAdapter for MavenAdapter {
    fn name(&self) -> &'static str {
        "maven"
    }

    fn description(&self) -> &'static str {
        "Apache Maven"
    }

    async fn list_versions(&self, _cfg: &ToolConfig) -> Result<Vec<String>> {
        Ok(MAVEN_VERSIONS.iter().map(|v| v.to_string()).collect())
    }

    async fn download_url(&self, version: &str, _cfg: &ToolConfig) -> Result<String> {
        let major = version.split('.').next().unwrap_or("3");
        Ok(format!(
            "{}/maven-{}/{}/binaries/apache-maven-{}-bin.{}",
            MAVEN_DIST_BASE,
            major,
            version,
            version,
            self.archive_extension()
        ))
    }

    fn canonical_executable(&self) -> String {
        script_name(self.platform, "bin/mvn", "cmd")
    }

    fn env_contribution(&self, _cfg: &ToolConfig, install_root: &Path) -> Vec<(String, String)> {
        vec![(
            "MAVEN_HOME".to_string(),
            install_root.display().to_string(),
        )]
    }

    fn dependencies(&self) -> &[&'static str] {
        &["java"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn download_url_uses_major_line_directory() {
        let adapter = MavenAdapter::new(Platform::Linux);
        let url = adapter
            .download_url("3.9.6", &ToolConfig::with_version("3.9.6"))
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://archive.apache.org/dist/maven/maven-3/3.9.6/binaries/apache-maven-3.9.6-bin.tar.gz"
        );

        let url4 = adapter
            .download_url("4.0.0-rc-1", &ToolConfig::with_version("4.0.0-rc-1"))
            .await
            .unwrap();
        assert!(url4.contains("/maven-4/4.0.0-rc-1/"));
    }

    #[tokio::test]
    async fn windows_gets_zip_and_cmd_launcher() {
        let adapter = MavenAdapter::new(Platform::Windows);
        let url = adapter
            .download_url("3.9.6", &ToolConfig::with_version("3.9.6"))
            .await
            .unwrap();
        assert!(url.ends_with("apache-maven-3.9.6-bin.zip"));
        assert_eq!(adapter.canonical_executable(), "bin/mvn.cmd");
    }

    #[tokio::test]
    async fn known_versions_resolve_latest_to_stable() {
        let adapter = MavenAdapter::new(Platform::Linux);
        let versions = adapter
            .list_versions(&ToolConfig::default())
            .await
            .unwrap();
        let resolved =
            crate::version::resolve(&crate::version::VersionSpec::Latest, &versions).unwrap();
        assert_eq!(resolved, "3.9.9");
    }
}
