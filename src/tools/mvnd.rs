use crate::config::ToolConfig;
use crate::error::Result;
use crate::platform::{script_name, Architecture, Platform};
use crate::tools::ToolAdapter;
use async_trait::async_trait;
use std::path::Path;

const MVND_DIST_BASE: &str = "https://archive.apache.org/dist/maven/mvnd";

/// Known-good Maven Daemon releases.
const MVND_VERSIONS: &[&str] = &["1.0.2", "1.0.1", "1.0.0", "0.9.0"];

pub struct MvndAdapter {
    platform: Platform,
    arch: Architecture,
}

impl MvndAdapter {
    pub fn new(platform: Platform, arch: Architecture) -> Self {
        Self { platform, arch }
    }

    fn os_segment(&self) -> &'static str {
        match self.platform {
            Platform::Linux => "linux",
            Platform::Mac => "darwin",
            Platform::Windows => "windows",
        }
    }

    fn arch_segment(&self) -> &'static str {
        match self.arch {
            Architecture::X64 => "amd64",
            Architecture::Aarch64 => "aarch64",
        }
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
impl ToolAdapter for MvndAdapter {
    fn name(&self) -> &'static str {
        "mvnd"
    }

    fn description(&self) -> &'static str {
        "Apache Maven Daemon"
    }

    async fn list_versions(&self, _cfg: &ToolConfig) -> Result<Vec<String>> {
        Ok(MVND_VERSIONS.iter().map(|v| v.to_string()).collect())
    }

    async fn download_url(&self, version: &str, _cfg: &ToolConfig) -> Result<String> {
        Ok(format!(
            "{}/{}/maven-mvnd-{}-{}-{}.{}",
            MVND_DIST_BASE,
            version,
            version,
            self.os_segment(),
            self.arch_segment(),
            self.archive_extension()
        ))
    }

    fn canonical_executable(&self) -> String {
        script_name(self.platform, "bin/mvnd", "cmd")
    }

    fn env_contribution(&self, _cfg: &ToolConfig, install_root: &Path) -> Vec<(String, String)> {
        vec![("MVND_HOME".to_string(), install_root.display().to_string())]
    }

    fn dependencies(&self) -> &[&'static str] {
        &["java"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn download_url_encodes_platform_and_arch() {
        let adapter = MvndAdapter::new(Platform::Linux, Architecture::X64);
        let url = adapter
            .download_url("1.0.2", &ToolConfig::with_version("1.0.2"))
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://archive.apache.org/dist/maven/mvnd/1.0.2/maven-mvnd-1.0.2-linux-amd64.tar.gz"
        );

        let mac = MvndAdapter::new(Platform::Mac, Architecture::Aarch64);
        let url = mac
            .download_url("1.0.2", &ToolConfig::with_version("1.0.2"))
            .await
            .unwrap();
        assert!(url.ends_with("maven-mvnd-1.0.2-darwin-aarch64.tar.gz"));

        let win = MvndAdapter::new(Platform::Windows, Architecture::X64);
        let url = win
            .download_url("1.0.2", &ToolConfig::with_version("1.0.2"))
            .await
            .unwrap();
        assert!(url.ends_with("maven-mvnd-1.0.2-windows-amd64.zip"));
    }
}
