use crate::store::client::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),
    #[error("invalid API response: missing lands")]
    MissingLands,
}

/// Park-level failure. Any of these aborts the remainder of that park's sync
/// but never the batch.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("wait-time fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("no park record found for api id {api_id}")]
    ParkNotFound { api_id: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Tick-level failure, caught and logged at the scheduler boundary. The next
/// scheduled tick is the retry mechanism.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("store authentication failed: {0}")]
    Auth(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum MainError {
    #[error(transparent)]
    Init(#[from] shared::error::InitializationError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}
