use crate::config::ToolConfig;
use crate::error::{MvxError, Result};
use crate::platform::{Architecture, Platform};
use crate::tools::ToolAdapter;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const NODE_DIST_BASE: &str = "https://nodejs.org/dist";

#[derive(Debug, Deserialize)]
struct NodeRelease {
    version: String,
}

pub struct NodeAdapter {
    platform: Platform,
    arch: Architecture,
    client: Client,
    base_url: String,
}

impl NodeAdapter {
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
            base_url: NODE_DIST_BASE.to_string(),
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
            Platform::Windows => "win",
        }
    }

    fn arch_segment(&self) -> &'static str {
        match self.arch {
            Architecture::X64 => "x64",
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
impl ToolAdapter for NodeAdapter {
    fn name(&self) -> &'static str {
        "node"
    }

    fn description(&self) -> &'static str {
        "Node.js runtime"
    }

    async fn list_versions(&self, _cfg: &ToolConfig) -> Result<Vec<String>> {
        let url = format!("{}/index.json", self.base_url);
        let releases: Vec<NodeRelease> = self
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

        // The index publishes `v22.11.0`-style tags; cache directories and
        // download URLs both want the bare version.
        Ok(releases
            .into_iter()
            .map(|r| r.version.trim_start_matches('v').to_string())
            .collect())
    }

    async fn download_url(&self, version: &str, _cfg: &ToolConfig) -> Result<String> {
        Ok(format!(
            "{}/v{}/node-v{}-{}-{}.{}",
            self.base_url,
            version,
            version,
            self.os_segment(),
            self.arch_segment(),
            self.archive_extension()
        ))
    }

    fn canonical_executable(&self) -> String {
        if self.platform.is_windows() {
            // Windows archives keep node.exe at the archive root.
            "node.exe".to_string()
        } else {
            "bin/node".to_string()
        }
    }

    fn bin_dir(&self, install_root: &Path) -> PathBuf {
        if self.platform.is_windows() {
            install_root.to_path_buf()
        } else {
            install_root.join("bin")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_versions_without_v_prefix() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/index.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"version": "v22.11.0", "lts": "Jod"},
                    {"version": "v21.7.3", "lts": false}
                ]"#,
            )
            .create_async()
            .await;

        let adapter =
            NodeAdapter::new(Platform::Linux, Architecture::X64).with_base_url(server.url());
        let versions = adapter.list_versions(&ToolConfig::default()).await.unwrap();
        assert_eq!(versions, vec!["22.11.0", "21.7.3"]);
    }

    #[tokio::test]
    async fn download_url_reinstates_v_prefix() {
        let adapter = NodeAdapter::new(Platform::Linux, Architecture::X64);
        let url = adapter
            .download_url("22.11.0", &ToolConfig::with_version("22"))
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://nodejs.org/dist/v22.11.0/node-v22.11.0-linux-x64.tar.gz"
        );
    }

    #[test]
    fn windows_layout_is_flat() {
        let adapter = NodeAdapter::new(Platform::Windows, Architecture::X64);
        assert_eq!(adapter.canonical_executable(), "node.exe");
        assert_eq!(
            adapter.bin_dir(Path::new("/cache/tools/node/22.11.0")),
            Path::new("/cache/tools/node/22.11.0")
        );

        let unix = NodeAdapter::new(Platform::Linux, Architecture::Aarch64);
        assert_eq!(
            unix.bin_dir(Path::new("/cache/tools/node/22.11.0")),
            Path::new("/cache/tools/node/22.11.0/bin")
        );
    }
}
