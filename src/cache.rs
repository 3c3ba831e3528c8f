use crate::error::{MvxError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const INDEX_TTL_HOURS: i64 = 24;
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(200);
const LOCK_WAIT_LIMIT: Duration = Duration::from_secs(120);

/// Cache key for one installed tool: `(tool, resolved version, distribution)`.
/// The install path is deterministic from the fingerprint alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub tool: String,
    pub version: String,
    pub distribution: Option<String>,
}

impl Fingerprint {
    pub fn new(tool: &str, version: &str, distribution: Option<&str>) -> Self {
        Self {
            tool: tool.to_string(),
            version: version.to_string(),
            distribution: distribution.map(|d| d.to_string()),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.distribution {
            Some(dist) => write!(f, "{}@{} ({})", self.tool, self.version, dist),
            None => write!(f, "{}@{}", self.tool, self.version),
        }
    }
}

/// Content-addressed per-user tool cache rooted at `~/.mvx`.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionIndex {
    fetched_at: DateTime<Utc>,
    versions: Vec<String>,
}

impl Cache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("tools")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    /// Deterministic install directory for a fingerprint:
    /// `tools/<tool>/<version>[/<distribution>]`.
    pub fn install_dir(&self, fingerprint: &Fingerprint) -> PathBuf {
        let mut dir = self
            .tools_dir()
            .join(&fingerprint.tool)
            .join(&fingerprint.version);
        if let Some(dist) = &fingerprint.distribution {
            dir = dir.join(dist);
        }
        dir
    }

    /// Scratch sibling of the final install directory; published via rename.
    pub fn scratch_dir(&self, fingerprint: &Fingerprint) -> PathBuf {
        let install = self.install_dir(fingerprint);
        let name = format!(
            "{}.tmp.{}",
            install.file_name().and_then(|n| n.to_str()).unwrap_or("install"),
            std::process::id()
        );
        install.with_file_name(name)
    }

    /// Downloads are content-addressed by the SHA-256 of their URL.
    pub fn download_path(&self, url: &str, extension: &str) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
        self.downloads_dir().join(format!("{}.{}", digest, extension))
    }

    /// Installed probe: the canonical executable must exist below the install
    /// directory, either directly or under the macOS bundle home.
    pub fn is_installed(&self, fingerprint: &Fingerprint, canonical_exe: &str) -> bool {
        let dir = self.install_dir(fingerprint);
        dir.join(canonical_exe).is_file()
            || dir.join("Contents/Home").join(canonical_exe).is_file()
    }

    /// Atomically publish an extracted payload as the final install
    /// directory. A concurrent publisher winning the race is not an error:
    /// the caller re-probes and both observers see the same complete tree.
    pub fn publish(&self, payload: &Path, fingerprint: &Fingerprint) -> Result<PathBuf> {
        let final_dir = self.install_dir(fingerprint);
        if let Some(parent) = final_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match std::fs::rename(payload, &final_dir) {
            Ok(()) => {
                debug!("published {} at {}", fingerprint, final_dir.display());
                Ok(final_dir)
            }
            Err(_) if final_dir.exists() => {
                debug!("{} already published by a concurrent installer", fingerprint);
                Ok(final_dir)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn lock_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.tools_dir()
            .join(&fingerprint.tool)
            .join(format!("{}.lock", fingerprint.version))
    }

    /// Read a cached version index, honouring the TTL.
    pub fn read_index(&self, key: &str) -> Option<Vec<String>> {
        let path = self.index_dir().join(format!("{}.json", key));
        let raw = std::fs::read_to_string(&path).ok()?;
        let index: VersionIndex = serde_json::from_str(&raw).ok()?;

        let age = Utc::now().signed_duration_since(index.fetched_at);
        if age > chrono::Duration::hours(INDEX_TTL_HOURS) {
            debug!("version index for {} is stale ({}h old)", key, age.num_hours());
            return None;
        }
        Some(index.versions)
    }

    pub fn write_index(&self, key: &str, versions: &[String]) -> Result<()> {
        std::fs::create_dir_all(self.index_dir())?;
        let index = VersionIndex {
            fetched_at: Utc::now(),
            versions: versions.to_vec(),
        };
        let path = self.index_dir().join(format!("{}.json", key));
        std::fs::write(&path, serde_json::to_string_pretty(&index)?)?;
        Ok(())
    }
}

/// Best-effort inter-process install lock. The file is created exclusively
/// and removed on drop; a crashed holder is tolerated by the bounded wait
/// plus the installed re-probe on the other side.
pub struct InstallLock {
    path: PathBuf,
    held: bool,
}

impl InstallLock {
    pub async fn acquire(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let start = std::time::Instant::now();
        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(_) => {
                    return Ok(Self { path, held: true });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if start.elapsed() > LOCK_WAIT_LIMIT {
                        warn!(
                            "stale install lock at {}, proceeding without it",
                            path.display()
                        );
                        return Ok(Self { path, held: false });
                    }
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(err) => return Err(MvxError::IoError(err)),
            }
        }
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if self.held {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> Cache {
        Cache::new(dir.path().to_path_buf())
    }

    #[test]
    fn install_dir_is_deterministic_from_fingerprint() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        let maven = Fingerprint::new("maven", "3.9.6", None);
        assert_eq!(
            cache.install_dir(&maven),
            dir.path().join("tools/maven/3.9.6")
        );

        let jdk = Fingerprint::new("java", "21.0.5", Some("temurin"));
        assert_eq!(
            cache.install_dir(&jdk),
            dir.path().join("tools/java/21.0.5/temurin")
        );

        // Same fingerprint, same path, always.
        assert_eq!(cache.install_dir(&jdk), cache.install_dir(&jdk));
    }

    #[test]
    fn download_path_is_content_addressed() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        let a = cache.download_path("https://example.com/a.tar.gz", "tar.gz");
        let b = cache.download_path("https://example.com/b.tar.gz", "tar.gz");
        assert_ne!(a, b);
        assert_eq!(a, cache.download_path("https://example.com/a.tar.gz", "tar.gz"));
        assert!(a.starts_with(dir.path().join("downloads")));
    }

    #[test]
    fn installed_probe_requires_canonical_executable() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let fp = Fingerprint::new("maven", "3.9.6", None);

        assert!(!cache.is_installed(&fp, "bin/mvn"));

        let bin = cache.install_dir(&fp).join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("mvn"), "#!/bin/sh\n").unwrap();
        assert!(cache.is_installed(&fp, "bin/mvn"));
    }

    #[test]
    fn installed_probe_falls_back_to_bundle_home() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let fp = Fingerprint::new("java", "21", Some("temurin"));

        let bundle_bin = cache.install_dir(&fp).join("Contents/Home/bin");
        std::fs::create_dir_all(&bundle_bin).unwrap();
        std::fs::write(bundle_bin.join("java"), "").unwrap();
        assert!(cache.is_installed(&fp, "bin/java"));
    }

    #[test]
    fn publish_is_atomic_and_race_tolerant() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let fp = Fingerprint::new("gradle", "8.7", None);

        let scratch = cache.scratch_dir(&fp);
        std::fs::create_dir_all(scratch.join("bin")).unwrap();
        std::fs::write(scratch.join("bin/gradle"), "").unwrap();

        let published = cache.publish(&scratch, &fp).unwrap();
        assert_eq!(published, cache.install_dir(&fp));
        assert!(published.join("bin/gradle").is_file());
        assert!(!scratch.exists());

        // A second publisher losing the race still resolves to the same dir.
        let other = cache.scratch_dir(&fp);
        std::fs::create_dir_all(&other).unwrap();
        let republished = cache.publish(&other, &fp).unwrap();
        assert_eq!(republished, published);
    }

    #[test]
    fn index_round_trip_and_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        assert!(cache.read_index("maven").is_none());

        let versions = vec!["3.9.6".to_string(), "4.0.0-rc-1".to_string()];
        cache.write_index("maven", &versions).unwrap();
        assert_eq!(cache.read_index("maven"), Some(versions));

        // Stale entries are ignored.
        let stale = VersionIndex {
            fetched_at: Utc::now() - chrono::Duration::hours(48),
            versions: vec!["1.0.0".to_string()],
        };
        std::fs::write(
            cache.index_dir().join("maven.json"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();
        assert!(cache.read_index("maven").is_none());
    }

    #[tokio::test]
    async fn lock_excludes_second_holder_until_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tools/maven/3.9.6.lock");

        let first = InstallLock::acquire(path.clone()).await.unwrap();
        assert!(path.exists());
        drop(first);
        assert!(!path.exists());

        let second = InstallLock::acquire(path.clone()).await.unwrap();
        assert!(path.exists());
        drop(second);
    }
}
