//! Error types for the refresh pipeline.
//!
//! Each layer has its own error; `RefreshError` wraps whichever one cut a
//! refresh cycle short so callers can inspect the cause.

use thiserror::Error;

/// Failure talking to the remote playlist endpoint.
#[derive(Error, Debug)]
pub enum NetworkError {
  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("failed to decode playlist: {0}")]
  Decode(#[from] serde_json::Error),
}

/// A single payload item is missing a required field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("video #{index} is missing required field `{field}`")]
pub struct MalformedRecordError {
  /// Position of the offending item in the payload
  pub index: usize,
  pub field: &'static str,
}

/// Failure reading or writing the local cache.
#[derive(Error, Debug)]
pub enum StorageError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to prepare cache location: {0}")]
  Io(#[from] std::io::Error),

  #[error("cache task did not complete: {0}")]
  Task(String),
}

/// Why a refresh cycle failed. The cache is untouched in every case.
#[derive(Error, Debug)]
pub enum RefreshError {
  #[error("network: {0}")]
  Network(#[from] NetworkError),

  #[error("malformed payload: {0}")]
  Malformed(#[from] MalformedRecordError),

  #[error("storage: {0}")]
  Storage(#[from] StorageError),
}
