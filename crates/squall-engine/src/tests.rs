//! Engine tests against the real SQLite store and a scripted remote.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use squall_core::{
  alert::{Alert, AlertBundle, AlertRecord, MessageType},
  geometry::Point,
  region::Region,
  remote::{RemoteError, WeatherClient},
  store::ReconStore,
  zone::{Zone, ZoneRecord},
};
use squall_store_sqlite::SqliteStore;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{
  Error, Fault,
  alerts::AlertService,
  fetcher::Fetcher,
  pool::WorkerPool,
  region::RegionService,
  scheduler::SyncScheduler,
};

// ─── Scripted remote ─────────────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedClient {
  catalogs:     Mutex<HashMap<String, Vec<Zone>>>,
  details:      Mutex<HashMap<String, Zone>>,
  alerts:       Mutex<Vec<AlertBundle>>,
  alert_calls:  AtomicUsize,
  /// When set, `active_alerts` fails with this status.
  alert_status: Mutex<Option<u16>>,
  /// When set, `zone_catalog` signals `entered` and blocks on `release`.
  gate:         Option<(Arc<Notify>, Arc<Notify>)>,
  /// Same handshake for `active_alerts`.
  alert_gate:   Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedClient {
  fn set_catalog(&self, region: &str, stubs: Vec<Zone>) {
    for stub in &stubs {
      self
        .details
        .lock()
        .unwrap()
        .insert(stub.code.clone(), stub.clone());
    }
    self.catalogs.lock().unwrap().insert(region.to_owned(), stubs);
  }

  fn set_alerts(&self, bundles: Vec<AlertBundle>) {
    *self.alerts.lock().unwrap() = bundles;
  }

  fn fail_alerts(&self, status: u16) {
    *self.alert_status.lock().unwrap() = Some(status);
  }
}

impl WeatherClient for ScriptedClient {
  async fn zone_catalog(&self, region: &str) -> Result<Vec<Zone>, RemoteError> {
    if let Some((entered, release)) = &self.gate {
      entered.notify_one();
      release.notified().await;
    }
    Ok(
      self
        .catalogs
        .lock()
        .unwrap()
        .get(region)
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn zone_detail(
    &self,
    _kind: &str,
    code: &str,
  ) -> Result<Zone, RemoteError> {
    self.details.lock().unwrap().get(code).cloned().ok_or(
      RemoteError::Status { status: 404, detail: "no such zone".into() },
    )
  }

  async fn active_alerts(
    &self,
    _regions: &[String],
  ) -> Result<Vec<AlertBundle>, RemoteError> {
    self.alert_calls.fetch_add(1, Ordering::SeqCst);
    if let Some((entered, release)) = &self.alert_gate {
      entered.notify_one();
      release.notified().await;
    }
    if let Some(status) = *self.alert_status.lock().unwrap() {
      return Err(RemoteError::Status {
        status,
        detail: "scripted failure".into(),
      });
    }
    Ok(self.alerts.lock().unwrap().clone())
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn zone(code: &str, effective_secs: i64) -> Zone {
  Zone {
    uri:       format!("uri-{code}"),
    code:      code.to_owned(),
    kind:      "county".into(),
    name:      format!("Zone {code}"),
    effective: Utc.timestamp_opt(effective_secs, 0).unwrap(),
    region:    "IL".into(),
    geometry:  vec![],
  }
}

fn bundle(id: &str, affected: &[&str]) -> AlertBundle {
  AlertBundle {
    alert:          Alert {
      id:           id.to_owned(),
      area_desc:    "Cook; Lake".into(),
      onset:        None,
      expires:      Utc::now() + Duration::hours(1),
      ends:         None,
      message_type: MessageType::Alert,
      category:     "Met".into(),
      severity:     "Severe".into(),
      certainty:    "Likely".into(),
      urgency:      "Expected".into(),
      event:        "Tornado Warning".into(),
      headline:     String::new(),
      description:  String::new(),
      instruction:  String::new(),
      response:     "Shelter".into(),
      boundary:     None,
    },
    references:     vec![],
    affected_zones: affected.iter().map(|s| s.to_string()).collect(),
  }
}

fn region_service(
  client: Arc<ScriptedClient>,
  store: Arc<SqliteStore>,
) -> RegionService<ScriptedClient, SqliteStore> {
  let pool = Arc::new(WorkerPool::new(2, 8));
  let fetcher = Fetcher::new(Arc::clone(&client), pool);
  RegionService::new(client, store, fetcher)
}

async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.unwrap())
}

async fn with_region(store: &SqliteStore, code: &str) {
  store
    .insert_region(&Region {
      code:        code.into(),
      total_zones: 0,
      created_at:  Utc::now(),
      updated_at:  Utc::now(),
    })
    .await
    .unwrap();
}

// ─── Region flows ────────────────────────────────────────────────────────────

#[tokio::test]
async fn onboard_persists_region_and_catalog() {
  let client = Arc::new(ScriptedClient::default());
  client.set_catalog("IL", vec![zone("ILC031", 100), zone("ILC043", 100)]);
  let store = store().await;
  let service = region_service(client, Arc::clone(&store));

  let outcome =
    service.onboard("il", &CancellationToken::new()).await.unwrap();

  // The code is normalised to uppercase before anything else.
  assert_eq!(outcome.region, "IL");
  assert_eq!(outcome.writes.len(), 2);
  assert!(outcome.failures.is_empty());

  let region = store.get_region("IL").await.unwrap().unwrap();
  assert_eq!(region.total_zones, 2);

  let zones = store.zones_for_region("IL").await.unwrap();
  assert_eq!(zones.len(), 2);
  assert!(zones.contains_key("uri-ILC031"));
  assert!(zones.contains_key("uri-ILC043"));
}

#[tokio::test]
async fn onboard_rejects_an_already_onboarded_region() {
  let client = Arc::new(ScriptedClient::default());
  client.set_catalog("IL", vec![zone("ILC031", 100)]);
  let store = store().await;
  let service = region_service(client, store);

  service.onboard("IL", &CancellationToken::new()).await.unwrap();
  let err =
    service.onboard("IL", &CancellationToken::new()).await.unwrap_err();

  assert!(matches!(err, Error::RegionExists(_)));
  assert_eq!(err.fault(), Fault::Conflict);
}

#[tokio::test]
async fn sync_requires_onboarding_first() {
  let client = Arc::new(ScriptedClient::default());
  let service = region_service(client, store().await);

  let err = service.sync("WA", &CancellationToken::new()).await.unwrap_err();
  assert!(matches!(err, Error::RegionNotOnboarded(_)));
  assert_eq!(err.fault(), Fault::NotFound);
}

#[tokio::test]
async fn sync_applies_the_full_delta() {
  let client = Arc::new(ScriptedClient::default());
  client.set_catalog("IL", vec![zone("ILC031", 100), zone("ILC043", 100)]);
  let store = store().await;
  let service = region_service(Arc::clone(&client), Arc::clone(&store));
  service.onboard("IL", &CancellationToken::new()).await.unwrap();

  // ILC031 disappears, ILC043 is reissued with a newer effective date,
  // ILC097 is new.
  client.set_catalog("IL", vec![zone("ILC043", 200), zone("ILC097", 100)]);

  let outcome = service.sync("IL", &CancellationToken::new()).await.unwrap();

  assert_eq!(outcome.inserts.len(), 1);
  assert_eq!(outcome.inserts[0].code, "ILC097");
  assert_eq!(outcome.updates.len(), 1);
  assert_eq!(outcome.updates[0].code, "ILC043");
  assert_eq!(outcome.deletes.len(), 1);
  assert_eq!(outcome.deletes[0].code, "ILC031");
  assert!(outcome.failures.is_empty());

  let zones = store.zones_for_region("IL").await.unwrap();
  assert_eq!(zones.len(), 2);
  assert!(!zones.contains_key("uri-ILC031"));
  assert_eq!(
    zones["uri-ILC043"].zone.effective,
    Utc.timestamp_opt(200, 0).unwrap(),
  );

  let region = store.get_region("IL").await.unwrap().unwrap();
  assert_eq!(region.total_zones, 2);
}

#[tokio::test]
async fn sync_of_an_unchanged_catalog_is_a_no_op() {
  let client = Arc::new(ScriptedClient::default());
  client.set_catalog("IL", vec![zone("ILC031", 100)]);
  let store = store().await;
  let service = region_service(client, store);
  service.onboard("IL", &CancellationToken::new()).await.unwrap();

  let outcome = service.sync("IL", &CancellationToken::new()).await.unwrap();
  assert_eq!(outcome.total_operations(), 0);
}

#[tokio::test]
async fn concurrent_reconciliation_of_one_region_is_rejected() {
  let entered = Arc::new(Notify::new());
  let release = Arc::new(Notify::new());
  let client = Arc::new(ScriptedClient {
    gate: Some((Arc::clone(&entered), Arc::clone(&release))),
    ..Default::default()
  });
  client.set_catalog("IL", vec![]);
  let service = Arc::new(region_service(client, store().await));

  let first = {
    let service = Arc::clone(&service);
    tokio::spawn(async move {
      service.onboard("IL", &CancellationToken::new()).await
    })
  };
  // Wait until the first onboard holds the region and sits in the
  // catalog fetch.
  entered.notified().await;

  let err =
    service.onboard("IL", &CancellationToken::new()).await.unwrap_err();
  assert!(matches!(err, Error::RegionBusy(_)));
  assert_eq!(err.fault(), Fault::Conflict);

  release.notify_one();
  first.await.unwrap().unwrap();

  // The claim is released once the first run finishes.
  let err = service.sync("WA", &CancellationToken::new()).await.unwrap_err();
  assert!(matches!(err, Error::RegionNotOnboarded(_)));
}

#[tokio::test]
async fn per_zone_failures_do_not_abort_onboarding() {
  let client = Arc::new(ScriptedClient::default());
  client.set_catalog("IL", vec![zone("ILC031", 100), zone("ILC043", 100)]);
  // Drop one detail so its hydration 404s.
  client.details.lock().unwrap().remove("ILC043");
  let store = store().await;
  let service = region_service(client, Arc::clone(&store));

  let outcome =
    service.onboard("IL", &CancellationToken::new()).await.unwrap();

  assert_eq!(outcome.writes.len(), 1);
  assert_eq!(outcome.failures.len(), 1);
  assert_eq!(outcome.failures[0].uri, "uri-ILC043");
  assert_eq!(outcome.total_zones(), 2);

  let zones = store.zones_for_region("IL").await.unwrap();
  assert_eq!(zones.len(), 1);
}

// ─── Alert flows ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn alert_sync_ingests_new_and_skips_known() {
  let client = Arc::new(ScriptedClient::default());
  client.set_alerts(vec![bundle("a-1", &[]), bundle("a-2", &[])]);
  let store = store().await;
  store
    .insert_region(&Region {
      code:        "IL".into(),
      total_zones: 0,
      created_at:  Utc::now(),
      updated_at:  Utc::now(),
    })
    .await
    .unwrap();
  let service = AlertService::new(client, Arc::clone(&store));

  let outcome = service.sync().await.unwrap();
  assert_eq!(outcome.regions, vec!["IL".to_string()]);
  assert_eq!(outcome.writes, 2);
  assert!(outcome.failures.is_empty());

  // A second pass over the same feed writes nothing.
  let outcome = service.sync().await.unwrap();
  assert_eq!(outcome.writes, 0);
  assert!(outcome.failures.is_empty());
  assert!(store.alert_exists("a-1").await.unwrap());
}

#[tokio::test]
async fn alert_sync_without_regions_never_calls_the_remote() {
  let client = Arc::new(ScriptedClient::default());
  client.set_alerts(vec![bundle("a-1", &[])]);
  let service = AlertService::new(Arc::clone(&client), store().await);

  let outcome = service.sync().await.unwrap();
  assert!(outcome.regions.is_empty());
  assert_eq!(outcome.writes, 0);
  assert_eq!(client.alert_calls.load(Ordering::SeqCst), 0);
}

/// Succeeds at the ended sweep, fails the expired sweep. Everything
/// else is unreachable from `cleanup`.
#[derive(Default)]
struct FlakyRetentionStore {
  ended_sweeps: AtomicUsize,
}

#[derive(Debug, thiserror::Error)]
#[error("scripted sweep failure")]
struct SweepError;

impl ReconStore for FlakyRetentionStore {
  type Error = SweepError;

  async fn get_region(
    &self,
    _code: &str,
  ) -> Result<Option<Region>, SweepError> {
    unreachable!()
  }

  async fn insert_region(&self, _region: &Region) -> Result<(), SweepError> {
    unreachable!()
  }

  async fn update_region(&self, _region: &Region) -> Result<(), SweepError> {
    unreachable!()
  }

  async fn list_regions(&self) -> Result<Vec<String>, SweepError> {
    unreachable!()
  }

  async fn zones_for_region(
    &self,
    _region: &str,
  ) -> Result<HashMap<String, ZoneRecord>, SweepError> {
    unreachable!()
  }

  async fn insert_zone(&self, _zone: &Zone) -> Result<ZoneRecord, SweepError> {
    unreachable!()
  }

  async fn update_zone(
    &self,
    _record: &ZoneRecord,
  ) -> Result<(), SweepError> {
    unreachable!()
  }

  async fn delete_zone(&self, _id: i64) -> Result<(), SweepError> {
    unreachable!()
  }

  async fn alert_exists(&self, _id: &str) -> Result<bool, SweepError> {
    unreachable!()
  }

  async fn insert_alert(
    &self,
    _bundle: &AlertBundle,
  ) -> Result<AlertRecord, SweepError> {
    unreachable!()
  }

  async fn delete_ended_alerts(
    &self,
    _cutoff: DateTime<Utc>,
  ) -> Result<u64, SweepError> {
    self.ended_sweeps.fetch_add(1, Ordering::SeqCst);
    Ok(2)
  }

  async fn delete_expired_alerts(
    &self,
    _cutoff: DateTime<Utc>,
  ) -> Result<u64, SweepError> {
    Err(SweepError)
  }

  async fn alerts_at(
    &self,
    _point: Point,
  ) -> Result<Vec<AlertRecord>, SweepError> {
    unreachable!()
  }
}

#[tokio::test]
async fn cleanup_runs_the_ended_sweep_before_a_failing_expired_sweep() {
  let client = Arc::new(ScriptedClient::default());
  let store = Arc::new(FlakyRetentionStore::default());
  let service = AlertService::new(client, Arc::clone(&store));

  let err = service.cleanup().await.unwrap_err();
  assert!(matches!(err, Error::Store(_)));
  // The first sweep ran; its deletions are not undone by the failure.
  assert_eq!(store.ended_sweeps.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cleanup_sweeps_ended_then_expired() {
  let client = Arc::new(ScriptedClient::default());
  let store = store().await;
  let service = AlertService::new(client, Arc::clone(&store));

  let mut ended = bundle("a-ended", &[]);
  ended.alert.ends = Some(Utc::now() - Duration::hours(1));

  let mut expired = bundle("a-expired", &[]);
  expired.alert.expires = Utc::now() - Duration::hours(1);

  let live = bundle("a-live", &[]);

  for b in [&ended, &expired, &live] {
    store.insert_alert(b).await.unwrap();
  }

  let swept = service.cleanup().await.unwrap();
  assert_eq!(swept.ended, 1);
  assert_eq!(swept.expired, 1);
  assert_eq!(swept.total(), 2);

  assert!(!store.alert_exists("a-ended").await.unwrap());
  assert!(!store.alert_exists("a-expired").await.unwrap());
  assert!(store.alert_exists("a-live").await.unwrap());
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

const TICK: std::time::Duration = std::time::Duration::from_millis(10);
const DEADLINE: std::time::Duration = std::time::Duration::from_secs(5);

#[tokio::test]
async fn scheduler_cycles_ingest_alerts() {
  let client = Arc::new(ScriptedClient::default());
  client.set_alerts(vec![bundle("a-1", &[])]);
  let store = store().await;
  with_region(&store, "IL").await;
  let service = Arc::new(AlertService::new(client, Arc::clone(&store)));

  let scheduler = SyncScheduler::spawn(service, TICK);
  let deadline = tokio::time::Instant::now() + DEADLINE;
  while !store.alert_exists("a-1").await.unwrap() {
    assert!(
      tokio::time::Instant::now() < deadline,
      "no cycle ingested the alert",
    );
    tokio::time::sleep(TICK).await;
  }
  scheduler.shutdown().await;
}

#[tokio::test]
async fn cleanup_runs_even_when_alert_sync_fails() {
  let client = Arc::new(ScriptedClient::default());
  client.fail_alerts(500);
  let store = store().await;
  with_region(&store, "IL").await;

  // Locally stale alert; only the retention sweep can remove it.
  let mut stale = bundle("a-stale", &[]);
  stale.alert.expires = Utc::now() - Duration::hours(5);
  store.insert_alert(&stale).await.unwrap();

  let service =
    Arc::new(AlertService::new(Arc::clone(&client), Arc::clone(&store)));
  let scheduler = SyncScheduler::spawn(service, TICK);
  let deadline = tokio::time::Instant::now() + DEADLINE;
  while store.alert_exists("a-stale").await.unwrap() {
    assert!(
      tokio::time::Instant::now() < deadline,
      "retention never ran during the remote outage",
    );
    tokio::time::sleep(TICK).await;
  }
  scheduler.shutdown().await;
  assert!(client.alert_calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn shutdown_waits_for_the_cycle_in_flight() {
  let entered = Arc::new(Notify::new());
  let release = Arc::new(Notify::new());
  let client = Arc::new(ScriptedClient {
    alert_gate: Some((Arc::clone(&entered), Arc::clone(&release))),
    ..Default::default()
  });
  client.set_alerts(vec![bundle("a-1", &[])]);
  let store = store().await;
  with_region(&store, "IL").await;
  let service = Arc::new(AlertService::new(client, Arc::clone(&store)));

  let scheduler = SyncScheduler::spawn(service, TICK);
  // A cycle is now blocked inside the alert fetch.
  entered.notified().await;

  let shutdown = tokio::spawn(scheduler.shutdown());
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;
  assert!(
    !shutdown.is_finished(),
    "shutdown must wait for the in-flight cycle",
  );

  release.notify_one();
  shutdown.await.unwrap();
  // The interrupted cycle ran to completion, not cancellation.
  assert!(store.alert_exists("a-1").await.unwrap());
}
