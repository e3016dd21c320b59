//! The remote weather-data capability.
//!
//! Components take the client as an explicit constructor argument rather
//! than reaching for a process-wide default; tests substitute a stub.

use std::future::Future;

use thiserror::Error;

use crate::{alert::AlertBundle, zone::Zone};

// ─── Error ───────────────────────────────────────────────────────────────────

/// Failure talking to the remote service.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
  /// The service answered with a non-success status. 4xx is a client
  /// fault and not worth retrying; 5xx is a server fault and is.
  #[error("remote service returned status {status}: {detail}")]
  Status { status: u16, detail: String },

  #[error("transport error: {0}")]
  Transport(String),

  #[error("malformed remote payload: {0}")]
  Decode(String),
}

impl RemoteError {
  pub fn status(&self) -> Option<u16> {
    match self {
      RemoteError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }

  /// A client fault (4xx): the request itself was wrong, surface it.
  pub fn is_rejection(&self) -> bool {
    matches!(self.status(), Some(s) if (400..500).contains(&s))
  }

  /// A server fault (5xx): worth another attempt.
  pub fn is_retryable(&self) -> bool {
    matches!(self.status(), Some(s) if (500..600).contains(&s))
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the remote weather data service.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait WeatherClient: Send + Sync {
  /// List a region's zone catalog. The returned zones are stubs: their
  /// identifying and descriptive fields are set, their geometry is
  /// empty.
  fn zone_catalog<'a>(
    &'a self,
    region: &'a str,
  ) -> impl Future<Output = Result<Vec<Zone>, RemoteError>> + Send + 'a;

  /// Fetch one zone's full detail, including geometry.
  fn zone_detail<'a>(
    &'a self,
    kind: &'a str,
    code: &'a str,
  ) -> impl Future<Output = Result<Zone, RemoteError>> + Send + 'a;

  /// Fetch all currently active alerts for the given regions. An empty
  /// region list yields an empty result without a network call.
  fn active_alerts<'a>(
    &'a self,
    regions: &'a [String],
  ) -> impl Future<Output = Result<Vec<AlertBundle>, RemoteError>> + Send + 'a;
}
