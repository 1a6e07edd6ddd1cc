use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installation pipeline.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Metadata unavailable: {0}")]
    MetadataFetch(String),

    // ── Maven ───────────────────────────────────────────
    #[error("Malformed maven coordinate: {0}")]
    MalformedCoordinate(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Entry {entry} missing from archive {archive:?}")]
    MissingArchiveEntry { archive: PathBuf, entry: String },

    // ── Processors ──────────────────────────────────────
    #[error("Processor jar {jar:?} has no usable manifest: {reason}")]
    ProcessorManifest { jar: PathBuf, reason: String },

    #[error("Java execution failed: {0}")]
    JavaExecution(String),

    // ── Loader ──────────────────────────────────────────
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Installation was cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl LauncherError {
    /// Wrap an IO error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LauncherError::Cancelled)
    }
}
