use crate::error::{MvxError, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, Response, StatusCode};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Downloader {
    client: Client,
    backoff_base: Duration,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!(
                    env!("CARGO_PKG_NAME"),
                    "/",
                    env!("CARGO_PKG_VERSION")
                ))
                .connect_timeout(CONNECT_TIMEOUT)
                .read_timeout(READ_TIMEOUT)
                .build()
                .unwrap(),
            backoff_base: Duration::from_millis(BACKOFF_BASE_MS),
        }
    }

    #[cfg(test)]
    fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// GET with retry: transient transport errors and 5xx responses are
    /// retried with exponential backoff; 4xx responses fail immediately.
    pub async fn get_with_retry(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let outcome = self.client.get(url).send().await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(MvxError::FetchNotFound {
                            url: url.to_string(),
                        });
                    }
                    if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
                        return Err(MvxError::FetchForbidden {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    if status.is_client_error() {
                        return Err(MvxError::Fetch {
                            url: url.to_string(),
                            message: format!("HTTP {}", status),
                        });
                    }
                    // 5xx: retryable
                    if attempt >= MAX_RETRIES {
                        return Err(MvxError::Fetch {
                            url: url.to_string(),
                            message: format!("HTTP {} after {} retries", status, attempt),
                        });
                    }
                    warn!("HTTP {} from {}, retrying", status, url);
                }
                Err(err) => {
                    if attempt >= MAX_RETRIES {
                        return Err(MvxError::Fetch {
                            url: url.to_string(),
                            message: format!("{} after {} retries", err, attempt),
                        });
                    }
                    warn!("transport error from {}: {}, retrying", url, err);
                }
            }

            attempt += 1;
            tokio::time::sleep(self.backoff_base * (1 << attempt)).await;
        }
    }

    /// Stream a URL to disk, computing the SHA-256 digest on the fly.
    /// Returns the hex digest of the downloaded bytes.
    pub async fn download_to(&self, url: &str, dest: &Path, progress: bool) -> Result<String> {
        let response = self.get_with_retry(url).await?;
        let total_size = response.content_length().unwrap_or(0);

        let pb = if progress {
            let pb = ProgressBar::new(total_size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb.set_message(format!(
                "Downloading {}",
                url.rsplit('/').next().unwrap_or("file")
            ));
            Some(pb)
        } else {
            None
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest).await?;
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MvxError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if let Some(pb) = &pb {
                pb.set_position(downloaded);
            }
        }

        file.flush().await?;
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        debug!("downloaded {} bytes from {}", downloaded, url);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Fetch a small text document (checksum files, version indexes).
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get_with_retry(url).await?;
        Ok(response.text().await?)
    }
}

/// SHA-256 of a file already on disk, for re-verifying cached downloads.
pub async fn file_sha256(path: &Path) -> Result<String> {
    use tokio::io::AsyncReadExt;

    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Extract the hex digest from a checksum document. Single-token documents
/// are taken as-is; multi-line `<digest> <filename>` documents are filtered
/// by the filename column (a leading `*` marks binary mode and is ignored).
pub fn select_checksum(body: &str, filename: Option<&str>) -> Option<String> {
    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();

    if lines.len() == 1 {
        let fields: Vec<&str> = lines[0].split_whitespace().collect();
        match fields.as_slice() {
            [digest] => return Some((*digest).to_string()),
            [digest, name] if filename.is_none() => {
                let _ = name;
                return Some((*digest).to_string());
            }
            _ => {}
        }
    }

    let wanted = filename?;
    for line in lines {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        if let Some(name) = fields.last() {
            let name = name.trim_start_matches('*');
            let name = name.rsplit('/').next().unwrap_or(name);
            if name == wanted {
                return Some(digest.to_string());
            }
        }
    }

    None
}
