pub mod go;
pub mod gradle;
pub mod java;
pub mod maven;
pub mod mvnd;
pub mod node;

use crate::config::ToolConfig;
use crate::error::{MvxError, Result};
use crate::platform::{Architecture, Platform};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A vendor variant of a tool; today only JDKs have more than one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub name: &'static str,
    pub description: &'static str,
}

/// Static description of a registered tool, for `tools info`.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub distributions: Vec<Distribution>,
    pub dependencies: Vec<String>,
}

/// Capability set every managed tool implements. Adapters differ in where
/// their version index lives and how download URLs are shaped; everything
/// else (fetch, verify, extract, cache) is shared machinery.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Candidate version strings, highest authority first. May hit a remote
    /// index; the manager caches results on disk.
    async fn list_versions(&self, cfg: &ToolConfig) -> Result<Vec<String>>;

    /// Download URL for a resolved version on the adapter's platform/arch.
    async fn download_url(&self, version: &str, cfg: &ToolConfig) -> Result<String>;

    /// Path of the canonical executable relative to the install home,
    /// platform suffix included (`bin/java`, `bin/mvn.cmd`, …).
    fn canonical_executable(&self) -> String;

    /// The tool home within an install root. macOS JDK bundles relocate it
    /// below `Contents/Home`.
    fn home_dir(&self, install_root: &Path) -> PathBuf {
        install_root.to_path_buf()
    }

    fn bin_dir(&self, install_root: &Path) -> PathBuf {
        self.home_dir(install_root).join("bin")
    }

    /// Environment variables this tool contributes (`JAVA_HOME`, …).
    /// PATH is composed separately by the executor.
    fn env_contribution(&self, cfg: &ToolConfig, install_root: &Path) -> Vec<(String, String)> {
        let _ = (cfg, install_root);
        Vec::new()
    }

    /// Optional capability: vendor distributions (JDK only today).
    fn distributions(&self) -> Option<Vec<Distribution>> {
        None
    }

    /// Tools that must be present for this one to function (Maven needs a
    /// JDK). Installation order follows this DAG.
    fn dependencies(&self) -> &[&'static str] {
        &[]
    }
}

impl fmt::Debug for dyn ToolAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolAdapter").field("name", &self.name()).finish()
    }
}

/// Process-wide adapter set, constructed explicitly; no module-load-time
/// side effects, so tests can build registries for foreign platforms.
pub struct ToolRegistry {
    adapters: BTreeMap<&'static str, Arc<dyn ToolAdapter>>,
}

impl ToolRegistry {
    pub fn with_builtins(platform: Platform, arch: Architecture) -> Self {
        let mut adapters: BTreeMap<&'static str, Arc<dyn ToolAdapter>> = BTreeMap::new();

        let builtins: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(java::JavaAdapter::new(platform, arch)),
            Arc::new(maven::MavenAdapter::new(platform)),
            Arc::new(mvnd::MvndAdapter::new(platform, arch)),
            Arc::new(gradle::GradleAdapter::new(platform)),
            Arc::new(node::NodeAdapter::new(platform, arch)),
            Arc::new(go::GoAdapter::new(platform, arch)),
        ];

        for adapter in builtins {
            adapters.insert(adapter.name(), adapter);
        }

        Self { adapters }
    }

    /// Register an additional adapter, replacing any previous owner of the
    /// same name.
    pub fn register(&mut self, adapter: Arc<dyn ToolAdapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ToolAdapter>> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| MvxError::UnknownTool(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }

    pub fn all(&self) -> Vec<Arc<dyn ToolAdapter>> {
        self.adapters.values().cloned().collect()
    }

    pub fn info(&self, name: &str) -> Result<ToolInfo> {
        let adapter = self.get(name)?;
        Ok(ToolInfo {
            name: adapter.name().to_string(),
            description: adapter.description().to_string(),
            distributions: adapter.distributions().unwrap_or_default(),
            dependencies: adapter
                .dependencies()
                .iter()
                .map(|d| d.to_string())
                .collect(),
        })
    }

    /// List versions for a tool, optionally filtered by prefix.
    pub async fn search_versions(
        &self,
        name: &str,
        cfg: &ToolConfig,
        filter: Option<&str>,
    ) -> Result<Vec<String>> {
        let adapter = self.get(name)?;
        let mut versions = adapter.list_versions(cfg).await?;
        if let Some(filter) = filter {
            versions.retain(|v| v.starts_with(filter));
        }
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        ToolRegistry::with_builtins(Platform::Linux, Architecture::X64)
    }

    #[test]
    fn builtins_are_registered() {
        let registry = registry();
        let names = registry.names();
        assert_eq!(names, vec!["go", "gradle", "java", "maven", "mvnd", "node"]);
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let err = registry().get("frobnicator").unwrap_err();
        assert!(matches!(err, MvxError::UnknownTool(_)));
    }

    #[test]
    fn only_java_advertises_distributions() {
        let registry = registry();
        assert!(registry.info("java").unwrap().distributions.len() >= 2);
        assert!(registry.info("maven").unwrap().distributions.is_empty());
    }

    #[test]
    fn jvm_tools_depend_on_java() {
        let registry = registry();
        for tool in ["maven", "mvnd", "gradle"] {
            assert_eq!(registry.info(tool).unwrap().dependencies, vec!["java"]);
        }
        assert!(registry.info("go").unwrap().dependencies.is_empty());
    }
}
