//! Alert ingestion and retention.
//!
//! Sync pulls every active alert for the onboarded regions and ingests
//! the ones not yet present; supersession and zone association happen
//! inside the store's transaction. Cleanup sweeps alerts whose hazard
//! has ended or whose message has expired.

use std::sync::Arc;

use chrono::Utc;
use squall_core::{
  alert::AlertRecord, geometry::Point, remote::WeatherClient,
  store::ReconStore,
};

use crate::{
  Error, Result,
  outcome::{AlertFailure, AlertSyncOutcome, CleanupOutcome},
};

pub struct AlertService<C, S> {
  client: Arc<C>,
  store:  Arc<S>,
}

impl<C, S> AlertService<C, S>
where
  C: WeatherClient,
  S: ReconStore,
{
  pub fn new(client: Arc<C>, store: Arc<S>) -> Self {
    Self { client, store }
  }

  /// Fetch and ingest all active alerts for every onboarded region.
  ///
  /// An alert already present by ID is skipped — never re-inserted,
  /// updated or re-associated. A single alert's failure is recorded in
  /// the outcome and never aborts the rest of the batch; only the
  /// region listing or the active-alerts fetch failing aborts.
  pub async fn sync(&self) -> Result<AlertSyncOutcome> {
    let regions = self.store.list_regions().await.map_err(Error::store)?;
    let mut outcome =
      AlertSyncOutcome { regions: regions.clone(), ..Default::default() };
    if regions.is_empty() {
      return Ok(outcome);
    }

    let bundles = self.client.active_alerts(&regions).await?;

    for bundle in bundles {
      let id = bundle.alert.id.clone();
      match self.store.alert_exists(&id).await {
        // Present already; supersession was handled when it arrived.
        Ok(true) => {}
        Ok(false) => match self.store.insert_alert(&bundle).await {
          Ok(_) => outcome.writes += 1,
          Err(e) => outcome.failures.push(AlertFailure {
            id,
            op: "insert",
            cause: Error::store(e),
          }),
        },
        Err(e) => outcome.failures.push(AlertFailure {
          id,
          op: "select",
          cause: Error::store(e),
        }),
      }
    }

    Ok(outcome)
  }

  /// Delete alerts that are stale as of now: first those whose `ends`
  /// passed, then those without `ends` whose `expires` passed.
  ///
  /// The two sweeps are independent; rows removed by the first stay
  /// removed even when the second fails, and their count is logged
  /// before the error propagates.
  pub async fn cleanup(&self) -> Result<CleanupOutcome> {
    let cutoff = Utc::now();

    let ended =
      self.store.delete_ended_alerts(cutoff).await.map_err(Error::store)?;
    let expired = match self.store.delete_expired_alerts(cutoff).await {
      Ok(n) => n,
      Err(e) => {
        tracing::warn!(ended, error = %e, "expired-alert sweep failed");
        return Err(Error::store(e));
      }
    };

    Ok(CleanupOutcome { ended, expired })
  }

  /// All active (non-Cancel) alerts covering a coordinate.
  pub async fn active_at(&self, point: Point) -> Result<Vec<AlertRecord>> {
    self.store.alerts_at(point).await.map_err(Error::store)
  }
}
