//! Error type for `squall-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] squall_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown message type: {0:?}")]
  UnknownMessageType(String),

  /// Attempted to ingest an alert whose remote ID is already persisted.
  /// Callers are expected to check `alert_exists` first.
  #[error("alert already persisted: {0}")]
  AlertExists(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
