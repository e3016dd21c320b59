//! Concurrent zone hydration: fan out one detail fetch per stub through
//! the worker pool, fan the results back in.
//!
//! `fetch_each` is synchronous from the caller's perspective: it submits
//! N tasks and drains exactly N completions before returning, so no
//! result is ever leaked. Cancellation is cooperative — it only stops
//! tasks that have not started; in-flight calls run to completion and
//! their outcome is still recorded.

use std::{collections::HashMap, sync::Arc};

use squall_core::{remote::RemoteError, remote::WeatherClient, zone::Zone};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::pool::WorkerPool;

/// Why a single stub could not be hydrated.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
  #[error("fetch cancelled before it started")]
  Cancelled,

  #[error(transparent)]
  Remote(RemoteError),

  #[error("worker pool closed before the fetch was queued")]
  PoolClosed,
}

/// The aggregate of one `fetch_each` run. Every input stub's URI appears
/// in exactly one of the two maps.
#[derive(Debug, Default)]
pub struct FetchOutcome {
  pub zones:    HashMap<String, Zone>,
  pub failures: HashMap<String, FetchError>,
}

impl FetchOutcome {
  pub fn total(&self) -> usize { self.zones.len() + self.failures.len() }
}

struct Report {
  uri:    String,
  result: Result<Zone, FetchError>,
}

pub struct Fetcher<C> {
  client: Arc<C>,
  pool:   Arc<WorkerPool>,
}

impl<C: WeatherClient + 'static> Fetcher<C> {
  pub fn new(client: Arc<C>, pool: Arc<WorkerPool>) -> Self {
    Self { client, pool }
  }

  /// Hydrate every stub concurrently. Each stub needs only its
  /// identifying fields (URI, Kind, Code) set; the hydrated zone keeps
  /// them unchanged and takes the descriptive fields from the fetch.
  pub async fn fetch_each(
    &self,
    stubs: Vec<Zone>,
    cancel: &CancellationToken,
  ) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();
    let (tx, mut rx) = mpsc::channel::<Report>(stubs.len().max(1));

    let mut submitted = 0usize;
    for stub in stubs {
      let uri = stub.uri.clone();
      let client = Arc::clone(&self.client);
      let cancel = cancel.clone();
      let tx = tx.clone();

      let queued = self
        .pool
        .submit(async move {
          let report = hydrate(client, stub, cancel).await;
          // The drain below keeps the receiver alive until every report
          // has arrived, so a send failure is unreachable.
          let _ = tx.send(report).await;
        })
        .await;

      match queued {
        Ok(()) => submitted += 1,
        // No task will ever report this URI; record the failure here.
        Err(_) => {
          outcome.failures.insert(uri, FetchError::PoolClosed);
        }
      }
    }
    drop(tx);

    // Drain exactly one report per submitted task.
    let mut drained = 0usize;
    while drained < submitted {
      match rx.recv().await {
        Some(Report { uri, result: Ok(zone) }) => {
          outcome.zones.insert(uri, zone);
        }
        Some(Report { uri, result: Err(err) }) => {
          outcome.failures.insert(uri, err);
        }
        None => break,
      }
      drained += 1;
    }

    outcome
  }
}

async fn hydrate<C: WeatherClient>(
  client: Arc<C>,
  stub: Zone,
  cancel: CancellationToken,
) -> Report {
  // Check before the long-running call; once a fetch is in flight it
  // runs to completion.
  if cancel.is_cancelled() {
    return Report { uri: stub.uri, result: Err(FetchError::Cancelled) };
  }

  match client.zone_detail(&stub.kind, &stub.code).await {
    Ok(detail) => {
      let zone = stub.hydrated(detail);
      Report { uri: zone.uri.clone(), result: Ok(zone) }
    }
    Err(err) => {
      Report { uri: stub.uri, result: Err(FetchError::Remote(err)) }
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
