//! Region onboarding and catalog sync.
//!
//! Onboarding pulls a region's complete zone catalog and persists it;
//! sync diffs the remote catalog against the stored one and applies
//! only the delta. Both flows share the Fetcher/WorkerPool machinery
//! and collect per-zone failures without aborting the batch.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
};

use chrono::Utc;
use squall_core::{
  delta::{self, ZoneDelta},
  region::Region,
  remote::WeatherClient,
  store::ReconStore,
};
use tokio_util::sync::CancellationToken;

use crate::{
  Error, Result,
  fetcher::{FetchOutcome, Fetcher},
  outcome::{OnboardOutcome, RegionSyncOutcome, ZoneFailure, ZoneWrite},
};

pub struct RegionService<C, S> {
  client:    Arc<C>,
  store:     Arc<S>,
  fetcher:   Fetcher<C>,
  /// Region codes with a reconciliation currently in flight. Concurrent
  /// onboard/sync of the same region is rejected rather than raced.
  in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<C, S> RegionService<C, S>
where
  C: WeatherClient + 'static,
  S: ReconStore,
{
  pub fn new(client: Arc<C>, store: Arc<S>, fetcher: Fetcher<C>) -> Self {
    Self {
      client,
      store,
      fetcher,
      in_flight: Arc::new(Mutex::new(HashSet::new())),
    }
  }

  /// Fetch and persist a region's full zone catalog.
  ///
  /// Batch setup (region lookup, catalog listing) failing aborts the
  /// whole operation; a single zone failing to hydrate or persist does
  /// not.
  pub async fn onboard(
    &self,
    region: &str,
    cancel: &CancellationToken,
  ) -> Result<OnboardOutcome> {
    let code = region.to_uppercase();
    let _claim = self.claim(&code)?;

    if self.region(&code).await?.is_some() {
      return Err(Error::RegionExists(code));
    }

    let stubs = self.client.zone_catalog(&code).await?;
    let total = stubs.len();
    let fetched = self.fetcher.fetch_each(stubs, cancel).await;

    let now = Utc::now();
    self
      .store
      .insert_region(&Region {
        code:        code.clone(),
        total_zones: total as i64,
        created_at:  now,
        updated_at:  now,
      })
      .await
      .map_err(Error::store)?;

    let mut outcome = OnboardOutcome {
      region:     code.clone(),
      writes:     Vec::new(),
      failures:   Vec::new(),
      created_at: now,
    };
    self.insert_fetched(fetched, &mut outcome.writes, &mut outcome.failures)
      .await;

    tracing::info!(
      region = %code,
      writes = outcome.writes.len(),
      failures = outcome.failures.len(),
      "onboarded region",
    );
    Ok(outcome)
  }

  /// Diff the remote catalog against the stored one and apply the
  /// resulting insert/update/delete plan.
  pub async fn sync(
    &self,
    region: &str,
    cancel: &CancellationToken,
  ) -> Result<RegionSyncOutcome> {
    let code = region.to_uppercase();
    let _claim = self.claim(&code)?;

    let Some(mut region_row) = self.region(&code).await? else {
      return Err(Error::RegionNotOnboarded(code));
    };

    let fresh = self.client.zone_catalog(&code).await?;
    let total = fresh.len();
    let stored =
      self.store.zones_for_region(&code).await.map_err(Error::store)?;

    let plan = delta::diff(fresh, stored);
    tracing::debug!(
      region = %code,
      inserts = plan.insert.len(),
      updates = plan.update.len(),
      deletes = plan.delete.len(),
      "computed zone delta",
    );

    // Only inserts and updates need a geometry fetch; deletes go by
    // stored identity alone.
    let fetched =
      self.fetcher.fetch_each(plan.insert_update_stubs(), cancel).await;

    let mut outcome = RegionSyncOutcome {
      region:       code.clone(),
      inserts:      Vec::new(),
      updates:      Vec::new(),
      deletes:      Vec::new(),
      failures:     Vec::new(),
      completed_at: Utc::now(),
    };
    self.apply_plan(plan, fetched, &mut outcome).await;

    region_row.total_zones = total as i64;
    self.store.update_region(&region_row).await.map_err(Error::store)?;

    outcome.completed_at = Utc::now();
    tracing::info!(
      region = %code,
      inserts = outcome.inserts.len(),
      updates = outcome.updates.len(),
      deletes = outcome.deletes.len(),
      failures = outcome.failures.len(),
      "synced region",
    );
    Ok(outcome)
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  async fn region(&self, code: &str) -> Result<Option<Region>> {
    self.store.get_region(code).await.map_err(Error::store)
  }

  fn claim(&self, code: &str) -> Result<RegionClaim> {
    let mut in_flight =
      self.in_flight.lock().expect("region claim lock poisoned");
    if !in_flight.insert(code.to_owned()) {
      return Err(Error::RegionBusy(code.to_owned()));
    }
    Ok(RegionClaim {
      set:  Arc::clone(&self.in_flight),
      code: code.to_owned(),
    })
  }

  /// Persist every hydrated zone as an insert; carry fetch failures
  /// through unchanged.
  async fn insert_fetched(
    &self,
    fetched: FetchOutcome,
    writes: &mut Vec<ZoneWrite>,
    failures: &mut Vec<ZoneFailure>,
  ) {
    for (uri, cause) in fetched.failures {
      failures.push(ZoneFailure::fetch(uri, cause));
    }
    for (uri, zone) in fetched.zones {
      match self.store.insert_zone(&zone).await {
        Ok(record) => writes.push(ZoneWrite::from(&record.zone)),
        Err(e) => failures.push(ZoneFailure { uri, cause: Error::store(e) }),
      }
    }
  }

  async fn apply_plan(
    &self,
    plan: ZoneDelta,
    mut fetched: FetchOutcome,
    outcome: &mut RegionSyncOutcome,
  ) {
    for (uri, cause) in std::mem::take(&mut fetched.failures) {
      outcome.failures.push(ZoneFailure::fetch(uri, cause));
    }

    for stub in plan.insert {
      // Stubs whose hydration failed were recorded above.
      let Some(zone) = fetched.zones.remove(&stub.uri) else { continue };
      match self.store.insert_zone(&zone).await {
        Ok(record) => outcome.inserts.push(ZoneWrite::from(&record.zone)),
        Err(e) => outcome
          .failures
          .push(ZoneFailure { uri: stub.uri, cause: Error::store(e) }),
      }
    }

    for record in plan.update {
      let Some(zone) = fetched.zones.remove(&record.zone.uri) else {
        continue;
      };
      let refreshed = record.refreshed(zone);
      match self.store.update_zone(&refreshed).await {
        Ok(()) => outcome.updates.push(ZoneWrite::from(&refreshed.zone)),
        Err(e) => outcome.failures.push(ZoneFailure {
          uri:   refreshed.zone.uri.clone(),
          cause: Error::store(e),
        }),
      }
    }

    for record in plan.delete {
      match self.store.delete_zone(record.id).await {
        Ok(()) => outcome.deletes.push(ZoneWrite::from(&record.zone)),
        Err(e) => outcome.failures.push(ZoneFailure {
          uri:   record.zone.uri.clone(),
          cause: Error::store(e),
        }),
      }
    }
  }
}

/// Removes its region code from the in-flight set on drop.
struct RegionClaim {
  set:  Arc<Mutex<HashSet<String>>>,
  code: String,
}

impl Drop for RegionClaim {
  fn drop(&mut self) {
    if let Ok(mut set) = self.set.lock() {
      set.remove(&self.code);
    }
  }
}
