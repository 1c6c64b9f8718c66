use thiserror::Error;
use tracing::{error, warn};

/// Domain-specific errors for Overlook.
///
/// Most of the crate deliberately degrades instead of failing (a broken
/// generator must never take the overlay down), so these surface only from
/// cache persistence, where the caller chooses whether to swallow or
/// propagate.
#[derive(Error, Debug)]
pub enum OverlookError {
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cache IO failed for '{path}': {source}")]
    CacheIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, OverlookError>;

/// Extension trait for ergonomic error logging on swallow-and-log paths.
pub trait LogResultExt<T> {
    fn log_err(self) -> Option<T>;
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> LogResultExt<T> for std::result::Result<T, E> {
    fn log_err(self) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                error!(error = ?e, "Operation failed");
                None
            }
        }
    }

    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = ?e, "Operation warning");
                None
            }
        }
    }
}
