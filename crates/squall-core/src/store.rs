//! The `ReconStore` trait — transactional persistence for zones, alerts
//! and their associations.
//!
//! The trait is implemented by storage backends (e.g.
//! `squall-store-sqlite`). The sync engine depends on this abstraction,
//! not on any concrete backend.

use std::{collections::HashMap, future::Future};

use chrono::{DateTime, Utc};

use crate::{
  alert::{AlertBundle, AlertRecord},
  geometry::Point,
  region::Region,
  zone::{Zone, ZoneRecord},
};

/// Abstraction over the reconciliation store backend.
///
/// Multi-row mutations that must be all-or-nothing (zone insert with
/// geometry and lonely-alert promotion, zone update with geometry
/// replacement, alert insert with reference deletion and associations)
/// are transactional in every implementation. Single-row reads and
/// deletes are not.
pub trait ReconStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Regions ───────────────────────────────────────────────────────────

  /// Look up an onboarded region by code. Returns `None` if the region
  /// has not been onboarded.
  fn get_region<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<Region>, Self::Error>> + Send + 'a;

  fn insert_region<'a>(
    &'a self,
    region: &'a Region,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Persist refreshed region bookkeeping; `updated_at` is set by the
  /// store.
  fn update_region<'a>(
    &'a self,
    region: &'a Region,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// All onboarded region codes.
  fn list_regions(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Zones ─────────────────────────────────────────────────────────────

  /// All persisted zones for a region, keyed by URI.
  fn zones_for_region<'a>(
    &'a self,
    region: &'a str,
  ) -> impl Future<Output = Result<HashMap<String, ZoneRecord>, Self::Error>>
  + Send
  + 'a;

  /// Insert a zone with its geometry, assigning identity. In the same
  /// transaction, every lonely alert waiting on the zone's URI is
  /// promoted to a regular alert-zone association.
  fn insert_zone<'a>(
    &'a self,
    zone: &'a Zone,
  ) -> impl Future<Output = Result<ZoneRecord, Self::Error>> + Send + 'a;

  /// Persist refreshed descriptive fields at the record's identity and
  /// replace its geometry wholesale, in one transaction.
  fn update_zone<'a>(
    &'a self,
    record: &'a ZoneRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete a zone by identity; geometry and associations cascade.
  fn delete_zone(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Alerts ────────────────────────────────────────────────────────────

  fn alert_exists<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Ingest one alert bundle in a single transaction: insert the alert
  /// row, delete every referenced (superseded) alert, and associate each
  /// affected zone — as an alert-zone row when the zone is persisted,
  /// as a lonely-alert row when it is not.
  fn insert_alert<'a>(
    &'a self,
    bundle: &'a AlertBundle,
  ) -> impl Future<Output = Result<AlertRecord, Self::Error>> + Send + 'a;

  /// Delete alerts whose `ends` is before `cutoff`. Returns the number
  /// of rows removed.
  fn delete_ended_alerts(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Delete alerts with no `ends` whose `expires` is before `cutoff`.
  /// Returns the number of rows removed.
  fn delete_expired_alerts(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All non-`Cancel` alerts covering a point, either through an
  /// explicit boundary or through an associated zone's perimeter.
  fn alerts_at(
    &self,
    point: Point,
  ) -> impl Future<Output = Result<Vec<AlertRecord>, Self::Error>> + Send + '_;
}
