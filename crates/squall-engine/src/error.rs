//! Engine error taxonomy.
//!
//! Every error separates its internal cause (the `Display`/`source`
//! chain, meant for logs) from a classification and a safe external
//! message (meant for callers that surface errors to users).

use squall_core::remote::RemoteError;
use thiserror::Error;

use crate::fetcher::FetchError;

/// Classification of an engine error, mirroring how a caller should
/// react: reject the request, report absence or conflict, retry later,
/// or log and apologise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
  /// The request itself was wrong (remote 4xx or invalid input).
  Rejected,
  NotFound,
  Conflict,
  /// Transient; a later retry may succeed (remote 5xx).
  Unavailable,
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("region {0:?} is already onboarded")]
  RegionExists(String),

  #[error("region {0:?} is not onboarded")]
  RegionNotOnboarded(String),

  #[error("a reconciliation for region {0:?} is already in flight")]
  RegionBusy(String),

  #[error("remote error: {0}")]
  Remote(#[from] RemoteError),

  #[error("zone fetch failed: {0}")]
  Fetch(#[from] FetchError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("worker pool is closed")]
  PoolClosed,
}

impl Error {
  /// Wrap a backend error from any `ReconStore` implementation.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(err))
  }

  pub fn fault(&self) -> Fault {
    match self {
      Error::RegionExists(_) => Fault::Conflict,
      Error::RegionNotOnboarded(_) => Fault::NotFound,
      Error::RegionBusy(_) => Fault::Conflict,
      Error::Remote(e) | Error::Fetch(FetchError::Remote(e)) => {
        if e.is_rejection() {
          Fault::Rejected
        } else if e.is_retryable() {
          Fault::Unavailable
        } else {
          Fault::Internal
        }
      }
      Error::Fetch(_) | Error::Store(_) | Error::PoolClosed => Fault::Internal,
    }
  }

  /// A message safe to show to external callers. Internal causal detail
  /// stays in the `Display`/`source` chain for logging.
  pub fn safe_message(&self) -> String {
    match self {
      Error::RegionExists(code) => format!("{code} already exists"),
      Error::RegionNotOnboarded(code) => format!("{code} is not onboarded"),
      Error::RegionBusy(code) => {
        format!("{code} is already being reconciled")
      }
      _ => match self.fault() {
        Fault::Rejected => "the weather service rejected the request".into(),
        Fault::Unavailable => {
          "the weather service is temporarily unavailable".into()
        }
        _ => "internal error".into(),
      },
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
