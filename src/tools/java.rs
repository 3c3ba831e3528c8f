use crate::config::ToolConfig;
use crate::error::{MvxError, Result};
use crate::platform::{Architecture, Platform};
use crate::tools::{Distribution, ToolAdapter};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DISCO_API_BASE: &str = "https://api.foojay.io/disco/v3.0";
const DEFAULT_DISTRIBUTION: &str = "temurin";

/// JDK distributions exposed through the foojay disco index.
const DISTRIBUTIONS: &[Distribution] = &[
    Distribution {
        name: "temurin",
        description: "Eclipse Temurin (Adoptium)",
    },
    Distribution {
        name: "zulu",
        description: "Azul Zulu",
    },
    Distribution {
        name: "corretto",
        description: "Amazon Corretto",
    },
    Distribution {
        name: "liberica",
        description: "BellSoft Liberica",
    },
];

#[derive(Debug, Deserialize)]
struct DistributionResponse {
    result: Vec<DistributionResult>,
}

#[derive(Debug, Deserialize)]
struct DistributionResult {
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PackagesResponse {
    result: Vec<PackageResult>,
}

#[derive(Debug, Deserialize)]
struct PackageResult {
    links: PackageLinks,
}

#[derive(Debug, Deserialize)]
struct PackageLinks {
    pkg_download_redirect: String,
}

/// JDK adapter. The only multi-distribution tool: the version index and the
/// package lookup are both keyed by the configured vendor.
pub struct JavaAdapter {
    platform: Platform,
    arch: Architecture,
    client: Client,
    base_url: String,
}

impl JavaAdapter {
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
            base_url: DISCO_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn distribution<'a>(&self, cfg: &'a ToolConfig) -> &'a str {
        cfg.distribution.as_deref().unwrap_or(DEFAULT_DISTRIBUTION)
    }

    fn os_query(&self) -> &'static str {
        match self.platform {
            Platform::Linux => "linux",
            Platform::Mac => "macos",
            Platform::Windows => "windows",
        }
    }

    fn archive_query(&self) -> &'static str {
        if self.platform.is_windows() {
            "zip"
        } else {
            "tar.gz"
        }
    }
}

#[async_trait]
impl ToolAdapter for JavaAdapter {
    fn name(&self) -> &'static str {
        "java"
    }

    fn description(&self) -> &'static str {
        "Java Development Kit"
    }

    async fn list_versions(&self, cfg: &ToolConfig) -> Result<Vec<String>> {
        let distribution = self.distribution(cfg);
        let url = format!(
            "{}/distributions/{}?latest_per_update=true",
            self.base_url, distribution
        );

        let response: DistributionResponse = self
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

        let versions = response
            .result
            .into_iter()
            .flat_map(|r| r.versions)
            .collect::<Vec<_>>();

        if versions.is_empty() {
            return Err(MvxError::EmptyVersionList(format!(
                "java ({})",
                distribution
            )));
        }
        Ok(versions)
    }

    async fn download_url(&self, version: &str, cfg: &ToolConfig) -> Result<String> {
        let distribution = self.distribution(cfg);
        let url = format!(
            "{}/packages?distribution={}&version={}&operating_system={}&architecture={}&archive_type={}&package_type=jdk&latest=available&directly_downloadable=true",
            self.base_url,
            distribution,
            version,
            self.os_query(),
            self.arch.as_str(),
            self.archive_query(),
        );

        let response: PackagesResponse = self
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

        response
            .result
            .into_iter()
            .next()
            .map(|p| p.links.pkg_download_redirect)
            .ok_or_else(|| MvxError::Fetch {
                url,
                message: format!(
                    "no {} JDK {} package for {}/{}",
                    distribution,
                    version,
                    self.os_query(),
                    self.arch
                ),
            })
    }

    fn canonical_executable(&self) -> String {
        crate::platform::exe_name(self.platform, "bin/java")
    }

    fn home_dir(&self, install_root: &Path) -> PathBuf {
        let bundle_home = install_root.join("Contents/Home");
        if bundle_home.is_dir() {
            bundle_home
        } else {
            install_root.to_path_buf()
        }
    }

    fn env_contribution(&self, _cfg: &ToolConfig, install_root: &Path) -> Vec<(String, String)> {
        vec![(
            "JAVA_HOME".to_string(),
            self.home_dir(install_root).display().to_string(),
        )]
    }

    fn distributions(&self) -> Option<Vec<Distribution>> {
        Some(DISTRIBUTIONS.to_vec())
    }
}
