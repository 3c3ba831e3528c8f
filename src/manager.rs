use crate::archive;
use crate::cache::{Cache, Fingerprint, InstallLock};
use crate::config::{self, ProjectConfig, ToolConfig};
use crate::download::{self, select_checksum, Downloader};
use crate::error::{MvxError, Result};
use crate::tools::{ToolAdapter, ToolRegistry};
use crate::urlrewrite::UrlRewriter;
use crate::version::{self, VersionSpec};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A successfully ensured tool: its fingerprint and the directories callers
/// compose environments from. All paths are absolute.
#[derive(Debug, Clone)]
pub struct EnsuredTool {
    pub fingerprint: Fingerprint,
    pub install_dir: PathBuf,
    pub bin_dir: PathBuf,
}

/// Orchestrates version resolution, the fetch/verify/extract pipeline and
/// environment assembly over the shared tool cache. Cheap to clone; all
/// state is shared.
#[derive(Clone)]
pub struct ToolManager {
    registry: Arc<ToolRegistry>,
    cache: Cache,
    downloader: Arc<Downloader>,
    rewriter: Arc<UrlRewriter>,
    inflight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ToolManager {
    pub fn new(registry: ToolRegistry, cache: Cache, rewriter: UrlRewriter) -> Self {
        Self {
            registry: Arc::new(registry),
            cache,
            downloader: Arc::new(Downloader::new()),
            rewriter: Arc::new(rewriter),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Resolve a configured version spec to a concrete version string.
    /// Exact specs pass through untouched; everything else consults the
    /// adapter's version index (cached on disk with a TTL).
    pub async fn resolve_version(&self, tool: &str, cfg: &ToolConfig) -> Result<String> {
        let adapter = self.registry.get(tool)?;
        let spec = VersionSpec::parse(&cfg.version)?;

        if spec.is_exact() {
            return Ok(cfg.version.trim().trim_start_matches('v').to_string());
        }

        let candidates = self.cached_versions(adapter.as_ref(), cfg).await?;
        version::resolve(&spec, &candidates)
    }

    async fn cached_versions(
        &self,
        adapter: &dyn ToolAdapter,
        cfg: &ToolConfig,
    ) -> Result<Vec<String>> {
        let key = match &cfg.distribution {
            Some(dist) => format!("{}-{}", adapter.name(), dist),
            None => adapter.name().to_string(),
        };

        if let Some(versions) = self.cache.read_index(&key) {
            return Ok(versions);
        }

        let versions = adapter.list_versions(cfg).await?;
        if let Err(err) = self.cache.write_index(&key, &versions) {
            warn!("failed to cache version index for {}: {}", key, err);
        }
        Ok(versions)
    }

    fn fingerprint(&self, adapter: &dyn ToolAdapter, version: &str, cfg: &ToolConfig) -> Fingerprint {
        // Only multi-distribution tools carry the distribution in the key.
        let distribution = if adapter.distributions().is_some() {
            Some(
                cfg.distribution
                    .clone()
                    .unwrap_or_else(|| "temurin".to_string()),
            )
        } else {
            None
        };
        Fingerprint {
            tool: adapter.name().to_string(),
            version: version.to_string(),
            distribution,
        }
    }

    /// Ensure a tool is present in the cache, installing it when missing.
    /// Returns `None` when the tool is bypassed via `MVX_USE_SYSTEM_<TOOL>`.
    pub async fn ensure_tool(&self, name: &str, cfg: &ToolConfig) -> Result<Option<EnsuredTool>> {
        if config::is_tool_bypassed(name) {
            info!("{} bypassed, relying on the system installation", name);
            return Ok(None);
        }

        let adapter = self.registry.get(name)?;
        let resolved = self.resolve_version(name, cfg).await?;
        let fingerprint = self.fingerprint(adapter.as_ref(), &resolved, cfg);
        let exe = adapter.canonical_executable();

        if self.cache.is_installed(&fingerprint, &exe) {
            debug!("{} already installed", fingerprint);
            return Ok(Some(self.ensured(adapter.as_ref(), fingerprint)));
        }

        // At most one concurrent install per fingerprint in this process.
        let latch = {
            let mut map = self.inflight.lock().await;
            map.entry(fingerprint.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = latch.lock().await;

        if self.cache.is_installed(&fingerprint, &exe) {
            return Ok(Some(self.ensured(adapter.as_ref(), fingerprint)));
        }

        // Best-effort exclusion against other processes.
        let lock = InstallLock::acquire(self.cache.lock_path(&fingerprint)).await?;
        if self.cache.is_installed(&fingerprint, &exe) {
            return Ok(Some(self.ensured(adapter.as_ref(), fingerprint)));
        }

        info!("installing {}", fingerprint);
        let outcome = tokio::time::timeout(
            config::install_timeout(),
            self.install(adapter.as_ref(), &fingerprint, cfg),
        )
        .await;
        drop(lock);

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                warn!("install of {} hit the deadline", fingerprint);
                return Err(MvxError::Cancelled);
            }
        }

        if !self.cache.is_installed(&fingerprint, &exe) {
            return Err(MvxError::VerifyFailed {
                fingerprint: fingerprint.to_string(),
                message: format!("{} missing after extraction", exe),
            });
        }

        Ok(Some(self.ensured(adapter.as_ref(), fingerprint)))
    }

    fn ensured(&self, adapter: &dyn ToolAdapter, fingerprint: Fingerprint) -> EnsuredTool {
        let install_dir = self.cache.install_dir(&fingerprint);
        let bin_dir = adapter.bin_dir(&install_dir);
        EnsuredTool {
            fingerprint,
            install_dir,
            bin_dir,
        }
    }

    /// Fetch, verify, extract and publish one tool version.
    async fn install(
        &self,
        adapter: &dyn ToolAdapter,
        fingerprint: &Fingerprint,
        cfg: &ToolConfig,
    ) -> Result<()> {
        let raw_url = adapter.download_url(&fingerprint.version, cfg).await?;
        let url = self.rewriter.rewrite(&raw_url);
        if url != raw_url {
            debug!("rewrote {} -> {}", raw_url, url);
        }

        let extension = archive::url_extension(&url);
        let archive_path = self.cache.download_path(&url, extension);

        if !archive_path.exists() {
            let file_name = archive_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("download");
            let part_path = archive_path.with_file_name(format!("{}.part", file_name));

            let digest = self
                .downloader
                .download_to(&url, &part_path, true)
                .await?;

            if let Err(err) = self.verify_checksum(cfg, &url, &digest).await {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(err);
            }

            tokio::fs::rename(&part_path, &archive_path).await?;
        } else {
            debug!("reusing cached download {}", archive_path.display());
            // Cached archives are keyed by URL, not content; a checksum
            // configured after the first install still has to hold.
            if cfg.checksum.is_some() {
                let digest = download::file_sha256(&archive_path).await?;
                if let Err(err) = self.verify_checksum(cfg, &url, &digest).await {
                    let _ = tokio::fs::remove_file(&archive_path).await;
                    return Err(err);
                }
            }
        }

        let scratch = self.cache.scratch_dir(fingerprint);
        if scratch.exists() {
            std::fs::remove_dir_all(&scratch)?;
        }

        let extract_archive = archive_path.clone();
        let extract_dest = scratch.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            archive::extract(&extract_archive, &extract_dest)
        })
        .await
        .map_err(|e| MvxError::Extract {
            archive: archive_path.display().to_string(),
            message: format!("extraction task failed: {}", e),
        })?;

        if let Err(err) = extracted {
            // Keep the archive for diagnosis; only the scratch tree goes.
            let _ = std::fs::remove_dir_all(&scratch);
            return Err(err);
        }

        let payload = archive::payload_root(&scratch)?;
        let final_dir = self.cache.publish(&payload, fingerprint)?;
        if payload != scratch {
            let _ = std::fs::remove_dir_all(&scratch);
        }

        archive::ensure_executable(&final_dir.join(adapter.canonical_executable()))?;
        let bin_dir = adapter.bin_dir(&final_dir);
        if bin_dir.is_dir() {
            for entry in std::fs::read_dir(&bin_dir)?.filter_map(|e| e.ok()) {
                archive::ensure_executable(&entry.path())?;
            }
        }

        Ok(())
    }

    async fn verify_checksum(&self, cfg: &ToolConfig, url: &str, actual: &str) -> Result<()> {
        let Some(checksum) = &cfg.checksum else {
            return Ok(());
        };

        if !checksum.algorithm.eq_ignore_ascii_case("sha256") {
            return Err(MvxError::Config(format!(
                "unsupported checksum type: {}",
                checksum.algorithm
            )));
        }

        let expected = if let Some(value) = &checksum.value {
            Some(value.clone())
        } else if let Some(checksum_url) = &checksum.url {
            let body = self.downloader.fetch_text(checksum_url).await?;
            let filename = checksum
                .filename
                .clone()
                .or_else(|| url.rsplit('/').next().map(|s| s.to_string()));
            select_checksum(&body, filename.as_deref())
        } else {
            None
        };

        match expected {
            Some(expected) if expected.eq_ignore_ascii_case(actual) => {
                debug!("checksum verified for {}", url);
                Ok(())
            }
            Some(expected) => Err(MvxError::ChecksumMismatch {
                url: url.to_string(),
                expected,
                actual: actual.to_string(),
            }),
            None if checksum.required => Err(MvxError::Config(format!(
                "checksum required for {} but none available",
                url
            ))),
            None => {
                warn!("no checksum available for {}, proceeding", url);
                Ok(())
            }
        }
    }

    /// Ensure every configured tool.
    pub async fn install_tools(&self, cfg: &ProjectConfig, sequential: bool) -> Result<()> {
        let names: Vec<String> = cfg.tools.keys().cloned().collect();
        self.install_specific_tools(cfg, &names, sequential).await
    }

    /// Ensure a subset of the configured tools, dependencies first. The
    /// default mode runs one worker per tool, capped at the CPU count;
    /// sequential mode installs in strict wave order for CI determinism.
    pub async fn install_specific_tools(
        &self,
        cfg: &ProjectConfig,
        names: &[String],
        sequential: bool,
    ) -> Result<()> {
        for name in names {
            if !cfg.tools.contains_key(name) {
                return Err(MvxError::UnknownTool(name.clone()));
            }
        }

        let waves = self.install_waves(names)?;
        let mut errors: Vec<MvxError> = Vec::new();

        if sequential {
            for name in waves.into_iter().flatten() {
                let tool_cfg = &cfg.tools[&name];
                if let Err(err) = self.ensure_tool(&name, tool_cfg).await {
                    errors.push(MvxError::ToolInstall {
                        tool: name.clone(),
                        source: Box::new(err),
                    });
                }
            }
        } else {
            let parallelism = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4);
            let permits = names.len().clamp(1, parallelism);
            let semaphore = Arc::new(Semaphore::new(permits));

            for wave in waves {
                let mut set = JoinSet::new();
                for name in wave {
                    let manager = self.clone();
                    let tool_cfg = cfg.tools[&name].clone();
                    let semaphore = Arc::clone(&semaphore);
                    set.spawn(async move {
                        let _permit = semaphore.acquire_owned().await.ok();
                        (name.clone(), manager.ensure_tool(&name, &tool_cfg).await)
                    });
                }

                while let Some(joined) = set.join_next().await {
                    match joined {
                        Ok((_, Ok(_))) => {}
                        Ok((name, Err(err))) => errors.push(MvxError::ToolInstall {
                            tool: name,
                            source: Box::new(err),
                        }),
                        Err(join_err) => {
                            errors.push(MvxError::Config(format!(
                                "install worker panicked: {}",
                                join_err
                            )));
                        }
                    }
                }
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(MvxError::Batch(errors)),
        }
    }

    /// Wave-partition the requested tools so dependencies install before
    /// their dependents. Dependencies outside the requested set are ignored.
    fn install_waves(&self, names: &[String]) -> Result<Vec<Vec<String>>> {
        let mut remaining: Vec<String> = names.to_vec();
        remaining.sort();
        remaining.dedup();

        let mut waves = Vec::new();
        while !remaining.is_empty() {
            let mut wave = Vec::new();
            for name in &remaining {
                let adapter = self.registry.get(name)?;
                let blocked = adapter
                    .dependencies()
                    .iter()
                    .any(|dep| remaining.iter().any(|r| r == dep));
                if !blocked {
                    wave.push(name.clone());
                }
            }

            if wave.is_empty() {
                return Err(MvxError::Config(format!(
                    "dependency cycle among tools: {:?}",
                    remaining
                )));
            }

            remaining.retain(|name| !wave.contains(name));
            waves.push(wave);
        }

        Ok(waves)
    }

    /// Merged environment contributions of every configured, non-bypassed
    /// tool. Tools are ensured first; no caller observes a half-built
    /// environment. PATH is composed separately by the executor.
    pub async fn setup_environment(
        &self,
        cfg: &ProjectConfig,
    ) -> Result<BTreeMap<String, String>> {
        let mut env = BTreeMap::new();
        for (name, tool_cfg) in &cfg.tools {
            let Some(ensured) = self.ensure_tool(name, tool_cfg).await? else {
                continue;
            };
            let adapter = self.registry.get(name)?;
            for (key, value) in adapter.env_contribution(tool_cfg, &ensured.install_dir) {
                env.insert(key, value);
            }
        }
        Ok(env)
    }
}
