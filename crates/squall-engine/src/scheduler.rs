//! Periodic alert sync driven by a fixed-interval ticker.
//!
//! One cycle runs alert sync and then a retention sweep. Shutdown is
//! graceful: a cycle already in flight runs to completion before the
//! scheduler task exits.

use std::{sync::Arc, time::Duration};

use squall_core::{remote::WeatherClient, store::ReconStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alerts::AlertService;

pub struct SyncScheduler {
  token:  CancellationToken,
  handle: JoinHandle<()>,
}

impl SyncScheduler {
  /// Start ticking every `interval`. The first cycle runs one full
  /// interval after spawn, not immediately.
  pub fn spawn<C, S>(
    alerts: Arc<AlertService<C, S>>,
    interval: Duration,
  ) -> Self
  where
    C: WeatherClient + 'static,
    S: ReconStore + 'static,
  {
    let token = CancellationToken::new();
    let handle = tokio::spawn(run(alerts, interval, token.clone()));
    Self { token, handle }
  }

  /// Stop ticking and wait for any in-flight cycle to finish.
  pub async fn shutdown(self) {
    self.token.cancel();
    let _ = self.handle.await;
  }
}

async fn run<C, S>(
  alerts: Arc<AlertService<C, S>>,
  interval: Duration,
  token: CancellationToken,
) where
  C: WeatherClient,
  S: ReconStore,
{
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  // The first tick resolves immediately; consume it so the cycle cadence
  // starts one interval out.
  ticker.tick().await;

  loop {
    tokio::select! {
      // Cancellation wins over a due tick, so shutdown never starts
      // another cycle.
      biased;
      _ = token.cancelled() => {
        tracing::info!("sync scheduler stopping");
        return;
      }
      _ = ticker.tick() => run_cycle(&alerts).await,
    }
  }
}

/// A cycle never propagates errors; a failed pass is logged and the next
/// tick tries again. Retention is purely local work and runs even when
/// the remote sync fails.
async fn run_cycle<C, S>(alerts: &AlertService<C, S>)
where
  C: WeatherClient,
  S: ReconStore,
{
  match alerts.sync().await {
    Ok(outcome) => {
      for failure in &outcome.failures {
        tracing::warn!(
          alert = %failure.id,
          op = failure.op,
          error = %failure.cause,
          "alert ingest failed",
        );
      }
      tracing::info!(
        regions = outcome.regions.len(),
        writes = outcome.writes,
        failures = outcome.failures.len(),
        "alert sync cycle complete",
      );
    }
    Err(e) => tracing::error!(error = %e, "alert sync cycle failed"),
  }

  match alerts.cleanup().await {
    Ok(swept) if swept.total() > 0 => {
      tracing::info!(
        ended = swept.ended,
        expired = swept.expired,
        "swept stale alerts",
      );
    }
    Ok(_) => {}
    Err(e) => tracing::error!(error = %e, "alert cleanup failed"),
  }
}
