//! Error types for `squall-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("a polygon requires at least a perimeter ring")]
  EmptyPolygon,

  #[error("a ring requires at least three points, got {0}")]
  DegenerateRing(usize),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
