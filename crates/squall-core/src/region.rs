//! Region — the onboarding marker for a zone catalog.
//!
//! A region row exists once its catalog has been onboarded; the periodic
//! alert sync targets every persisted region.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
  /// Uppercased region code, e.g. `IL`.
  pub code:        String,
  /// Zone count observed in the remote catalog at the last onboard/sync.
  pub total_zones: i64,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}
