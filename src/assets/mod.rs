//! Relocation of externally hosted media into the owned object store.

mod fetcher;
mod migrator;
mod object_store;
pub mod refs;
mod retry_policy;

pub use fetcher::{detect_content_type, AssetFetcher, FetchedAsset, HttpAssetFetcher};
pub use migrator::{AssetMigrationOutcome, AssetMigrator, MigrationReport, MigrationState};
pub use object_store::{FsObjectStore, ObjectStore};
pub use refs::AssetKind;
pub use retry_policy::RetryPolicy;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("download of {0} returned an empty body")]
    EmptyBody(String),

    #[error("object store failure for {path}: {reason}")]
    Store { path: String, reason: String },

    #[error("no object stored at {0}")]
    MissingObject(String),
}

impl AssetError {
    /// Client errors other than timeouts and throttling will not change on
    /// retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AssetError::Status { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            AssetError::MissingObject(_) => false,
            _ => true,
        }
    }

    pub(crate) fn store(path: &str, error: impl std::fmt::Display) -> Self {
        AssetError::Store {
            path: path.to_string(),
            reason: error.to_string(),
        }
    }
}
