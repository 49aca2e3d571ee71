//! Account store error types.

use std::io;
use std::path::{Path, PathBuf};

use certward_common::{AccountId, InvalidAccountId};
use thiserror::Error;

/// Errors returned by account stores.
///
/// "No account" is not an error; stores return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize account {id}: {source}")]
    Serialize {
        id: AccountId,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid account id: {0}")]
    InvalidAccountId(#[from] InvalidAccountId),

    #[error("invalid authority directory URL '{url}': {reason}")]
    InvalidAuthority { url: String, reason: String },

    #[error("account store operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Adapter for `map_err` on I/O results touching `path`.
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled)
    }
}
