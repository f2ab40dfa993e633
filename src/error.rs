use std::path::PathBuf;

use thiserror::Error;

/// Per-page fetch failure. Never raised past a worker: it is written into the
/// record's `error` field instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch URL: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bad status: {0}")]
    Status(reqwest::StatusCode),
    /// The headers arrived but the body could not be read into a document.
    #[error("failed to parse HTML: {0}")]
    Parse(#[source] reqwest::Error),
}

/// Run-level failures. Everything here aborts the run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to fetch index page {url}: {source}")]
    Discovery {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to save {path:?}: {reason}")]
    Persist { path: PathBuf, reason: String },
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
