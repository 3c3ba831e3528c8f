use thiserror::Error;

#[derive(Error, Debug)]
pub enum MvxError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    #[error("no matching version for spec {spec} in candidates {candidates:?}")]
    NoMatchingVersion {
        spec: String,
        candidates: Vec<String>,
    },

    #[error("no versions available for {0}")]
    EmptyVersionList(String),

    #[error("failed to download {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("download not found (HTTP 404): {url}")]
    FetchNotFound { url: String },

    #[error("download forbidden (HTTP {status}): {url}")]
    FetchForbidden { url: String, status: u16 },

    #[error("checksum mismatch (expected {expected}, got {actual}) for {url}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("failed to extract {archive}: {message}")]
    Extract { archive: String, message: String },

    #[error("install verification failed for {fingerprint}: {message}")]
    VerifyFailed {
        fingerprint: String,
        message: String,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("command {command} has no script for platform {os}")]
    NoPlatformScript { command: String, os: String },

    #[error("unsupported platform: {os} {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("command exited with status {0}")]
    CommandFailed(i32),

    #[error("failed to install {tool}: {source}")]
    ToolInstall {
        tool: String,
        #[source]
        source: Box<MvxError>,
    },

    #[error("{}", render_batch(.0))]
    Batch(Vec<MvxError>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),
}

fn render_batch(errors: &[MvxError]) -> String {
    let mut out = format!("{} error(s) occurred:", errors.len());
    for err in errors {
        out.push_str("\n  - ");
        out.push_str(&err.to_string());
    }
    out
}

pub type Result<T> = std::result::Result<T, MvxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_lists_every_error() {
        let err = MvxError::Batch(vec![
            MvxError::UnknownTool("frob".to_string()),
            MvxError::Cancelled,
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("2 error(s)"));
        assert!(rendered.contains("unknown tool: frob"));
        assert!(rendered.contains("operation cancelled"));
    }

    #[test]
    fn checksum_message_carries_context() {
        let err = MvxError::ChecksumMismatch {
            url: "https://example.com/a.tar.gz".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("expected aa"));
        assert!(rendered.contains("got bb"));
        assert!(rendered.contains("https://example.com/a.tar.gz"));
    }
}
