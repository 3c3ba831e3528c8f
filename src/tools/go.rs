use crate::config::ToolConfig;
use crate::error::{MvxError, Result};
use crate::platform::{exe_name, Architecture, Platform};
use crate::tools::ToolAdapter;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;

const GO_DL_BASE: &str = "https://go.dev/dl";

#[derive(Debug, Deserialize)]
struct GoRelease {
    version: String,
    stable: bool,
}

pub struct GoAdapter {
    platform: Platform,
    arch: Architecture,
    client: Client,
    base_url: String,
}

impl GoAdapter {
    pub fn new(platform: Platform, arch: Architecture) -> Self {
        Self {
            platform,
            arch,
            client: Client::builder()
                .user_agent(concat!(
                    env!("CARGO_PKG_NAME"),
                    "/",
                    env!("CARGO_PKG_VERSION")
                ))
                .build()
                .unwrap(),
            base_url: GO_DL_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
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
            Architecture::Aarch64 => "arm64",
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
impl ToolAdapter for GoAdapter {
    fn name(&self) -> &'static str {
        "go"
    }

    fn description(&self) -> &'static str {
        "Go toolchain"
    }

    async fn list_versions(&self, _cfg: &ToolConfig) -> Result<Vec<String>> {
        let url = format!("{}/?mode=json&include=all", self.base_url);
        let releases: Vec<GoRelease> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MvxError::Fetch {
                url: url.clone(),
                message: e.to_string(),
            })?
            .json()
            .await?;

        // Tags come as `go1.22.5`; strip the product prefix so the strings
        // parse as plain versions.
        Ok(releases
            .into_iter()
            .filter(|r| r.stable)
            .map(|r| r.version.trim_start_matches("go").to_string())
            .collect())
    }

    async fn download_url(&self, version: &str, _cfg: &ToolConfig) -> Result<String> {
        Ok(format!(
            "{}/go{}.{}-{}.{}",
            self.base_url,
            version,
            self.os_segment(),
            self.arch_segment(),
            self.archive_extension()
        ))
    }

    fn canonical_executable(&self) -> String {
        exe_name(self.platform, "bin/go")
    }

    fn env_contribution(&self, _cfg: &ToolConfig, install_root: &Path) -> Vec<(String, String)> {
        vec![("GOROOT".to_string(), install_root.display().to_string())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_stable_versions_without_go_prefix() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/?mode=json&include=all")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"version": "go1.23.2", "stable": true},
                    {"version": "go1.24rc1", "stable": false},
                    {"version": "go1.22.8", "stable": true}
                ]"#,
            )
            .create_async()
            .await;

        let adapter =
            GoAdapter::new(Platform::Linux, Architecture::X64).with_base_url(server.url());
        let versions = adapter.list_versions(&ToolConfig::default()).await.unwrap();
        assert_eq!(versions, vec!["1.23.2", "1.22.8"]);
    }

    #[tokio::test]
    async fn download_url_shape() {
        let adapter = GoAdapter::new(Platform::Linux, Architecture::X64);
        let url = adapter
            .download_url("1.23.2", &ToolConfig::with_version("1.23"))
            .await
            .unwrap();
        assert_eq!(url, "https://go.dev/dl/go1.23.2.linux-amd64.tar.gz");

        let win = GoAdapter::new(Platform::Windows, Architecture::Aarch64);
        let url = win
            .download_url("1.23.2", &ToolConfig::with_version("1.23"))
            .await
            .unwrap();
        assert_eq!(url, "https://go.dev/dl/go1.23.2.windows-arm64.zip");
    }

    #[test]
    fn goroot_points_at_install_root() {
        let adapter = GoAdapter::new(Platform::Linux, Architecture::X64);
        let env = adapter.env_contribution(&ToolConfig::default(), Path::new("/cache/tools/go/1.23.2"));
        assert_eq!(
            env,
            vec![("GOROOT".to_string(), "/cache/tools/go/1.23.2".to_string())]
        );
    }
}
