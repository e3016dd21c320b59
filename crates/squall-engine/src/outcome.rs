//! Aggregate results of reconciliation batches.
//!
//! A batch outcome collects per-item failures alongside the successful
//! writes; it is never itself an error. Only batch-setup failures (the
//! catalog cannot be listed, the region row cannot be read) surface as
//! `Err` from the services.

use chrono::{DateTime, Utc};

use crate::{error::Error, fetcher::FetchError};

/// Identifying fields of a zone that was written (or attempted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneWrite {
  pub uri:  String,
  pub code: String,
  pub kind: String,
}

impl From<&squall_core::zone::Zone> for ZoneWrite {
  fn from(z: &squall_core::zone::Zone) -> Self {
    Self { uri: z.uri.clone(), code: z.code.clone(), kind: z.kind.clone() }
  }
}

/// One zone that could not be fetched or persisted.
#[derive(Debug)]
pub struct ZoneFailure {
  pub uri:   String,
  pub cause: Error,
}

impl ZoneFailure {
  pub fn fetch(uri: String, cause: FetchError) -> Self {
    Self { uri, cause: Error::Fetch(cause) }
  }
}

/// Result of onboarding a region's full zone catalog.
#[derive(Debug)]
pub struct OnboardOutcome {
  pub region:     String,
  pub writes:     Vec<ZoneWrite>,
  pub failures:   Vec<ZoneFailure>,
  pub created_at: DateTime<Utc>,
}

impl OnboardOutcome {
  pub fn total_zones(&self) -> usize {
    self.writes.len() + self.failures.len()
  }
}

/// Result of diff-syncing an already onboarded region.
#[derive(Debug)]
pub struct RegionSyncOutcome {
  pub region:       String,
  pub inserts:      Vec<ZoneWrite>,
  pub updates:      Vec<ZoneWrite>,
  pub deletes:      Vec<ZoneWrite>,
  pub failures:     Vec<ZoneFailure>,
  pub completed_at: DateTime<Utc>,
}

impl RegionSyncOutcome {
  pub fn total_operations(&self) -> usize {
    self.inserts.len()
      + self.updates.len()
      + self.deletes.len()
      + self.failures.len()
  }
}

/// One alert that could not be checked or ingested.
#[derive(Debug)]
pub struct AlertFailure {
  pub id:    String,
  /// The operation that failed, e.g. `"select"` or `"insert"`.
  pub op:    &'static str,
  pub cause: Error,
}

/// Result of one alert sync pass over every onboarded region.
#[derive(Debug, Default)]
pub struct AlertSyncOutcome {
  pub regions:  Vec<String>,
  pub writes:   usize,
  pub failures: Vec<AlertFailure>,
}

/// Result of one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
  /// Alerts removed because their `ends` passed the cutoff.
  pub ended:   u64,
  /// Alerts without `ends` removed because their `expires` passed it.
  pub expired: u64,
}

impl CleanupOutcome {
  pub fn total(&self) -> u64 { self.ended + self.expired }
}
