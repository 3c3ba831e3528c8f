use crate::error::{MvxError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

/// Detect the archive format from the file name.
pub fn detect_kind(path: &Path) -> Result<ArchiveKind> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(ArchiveKind::TarGz)
    } else if name.ends_with(".zip") {
        Ok(ArchiveKind::Zip)
    } else {
        Err(MvxError::Extract {
            archive: path.display().to_string(),
            message: "unsupported archive format".to_string(),
        })
    }
}

/// Archive extension for a download URL, used to name the cached file.
pub fn url_extension(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".zip") {
        "zip"
    } else if lower.ends_with(".tgz") {
        "tgz"
    } else {
        "tar.gz"
    }
}

/// Extract an archive into `dest`. Blocking; callers on the async path run
/// this through `spawn_blocking`.
pub fn extract(archive_path: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    match detect_kind(archive_path)? {
        ArchiveKind::TarGz => extract_tar_gz(archive_path, dest),
        ArchiveKind::Zip => extract_zip(archive_path, dest),
    }
}

fn extract_error(archive: &Path, message: impl std::fmt::Display) -> MvxError {
    MvxError::Extract {
        archive: archive.display().to_string(),
        message: message.to_string(),
    }
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    let tar_gz = File::open(archive_path)?;
    let tar = GzDecoder::new(tar_gz);
    let mut archive = Archive::new(tar);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive
        .unpack(dest)
        .map_err(|e| extract_error(archive_path, e))?;
    Ok(())
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| extract_error(archive_path, e))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| extract_error(archive_path, e))?;

        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };

        if entry.name().ends_with('/') {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}

/// Locate the directory that should be published as the install root.
///
/// Applies the strip-components heuristic: when the scratch directory holds
/// exactly one directory and nothing else, that directory is the payload.
pub fn payload_root(scratch: &Path) -> Result<PathBuf> {
    let entries: Vec<PathBuf> = std::fs::read_dir(scratch)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();

    if entries.len() == 1 && entries[0].is_dir() {
        debug!("stripping single top-level directory {:?}", entries[0]);
        return Ok(entries[0].clone());
    }

    Ok(scratch.to_path_buf())
}

/// Ensure a published binary carries the executable bit. No-op on Windows.
pub fn ensure_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.is_file() {
            let metadata = std::fs::metadata(path)?;
            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o755))?;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn build_tar_gz(dest: &Path, files: &[(&str, &str)]) {
        let file = File::create(dest).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn build_zip(dest: &Path, files: &[(&str, &str)]) {
        let file = File::create(dest).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (path, contents) in files {
            writer.start_file(*path, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn detects_archive_kinds() {
        assert_eq!(
            detect_kind(Path::new("a/apache-maven-3.9.6-bin.tar.gz")).unwrap(),
            ArchiveKind::TarGz
        );
        assert_eq!(detect_kind(Path::new("node.tgz")).unwrap(), ArchiveKind::TarGz);
        assert_eq!(detect_kind(Path::new("gradle.zip")).unwrap(), ArchiveKind::Zip);
        assert!(detect_kind(Path::new("tool.tar.xz")).is_err());
    }

    #[test]
    fn url_extension_matches_archive_name() {
        assert_eq!(url_extension("https://x/y/gradle-8.7-bin.zip"), "zip");
        assert_eq!(url_extension("https://x/node-v22.tar.gz"), "tar.gz");
    }

    #[test]
    fn extracts_tar_and_finds_single_root_payload() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("tool.tar.gz");
        build_tar_gz(
            &archive,
            &[
                ("tool-1.0/bin/tool", "#!/bin/sh\n"),
                ("tool-1.0/README", "docs"),
            ],
        );

        let scratch = dir.path().join("scratch");
        extract(&archive, &scratch).unwrap();

        let payload = payload_root(&scratch).unwrap();
        assert_eq!(payload, scratch.join("tool-1.0"));
        assert!(payload.join("bin/tool").is_file());
    }

    #[test]
    fn extracts_zip_with_flat_layout() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("tool.zip");
        build_zip(&archive, &[("bin/tool.cmd", "@echo off"), ("README", "x")]);

        let scratch = dir.path().join("scratch");
        extract(&archive, &scratch).unwrap();

        // Two top-level entries: no strip, scratch itself is the payload.
        let payload = payload_root(&scratch).unwrap();
        assert_eq!(payload, scratch);
        assert!(scratch.join("bin/tool.cmd").is_file());
    }

    #[test]
    fn corrupt_archive_fails_extraction() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bad.tar.gz");
        std::fs::write(&archive, b"this is not a tarball").unwrap();

        let err = extract(&archive, &dir.path().join("scratch")).unwrap_err();
        assert!(matches!(
            err,
            MvxError::Extract { .. } | MvxError::IoError(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn ensure_executable_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("tool");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o644)).unwrap();

        ensure_executable(&bin).unwrap();
        let mode = std::fs::metadata(&bin).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0);
    }
}
