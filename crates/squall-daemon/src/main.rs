//! `squall` — NWS zone and alert reconciliation daemon.
//!
//! Reads `squall.toml` (or the path given with `--config`), opens an
//! in-process SQLite store, and either runs the periodic alert sync
//! daemon or executes a one-shot administrative command.
//!
//! # Usage
//!
//! ```
//! squall onboard IL          # persist Illinois' zone catalog
//! squall sync-region IL      # reconcile it against the live catalog
//! squall run                 # periodic alert sync until Ctrl-C
//! squall query -87.6 41.8    # active alerts at a coordinate
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use squall_core::geometry::Point;
use squall_engine::{
  alerts::AlertService,
  fetcher::Fetcher,
  pool::WorkerPool,
  region::RegionService,
  scheduler::SyncScheduler,
};
use squall_nws::NwsClient;
use squall_store_sqlite::SqliteStore;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "NWS zone and alert reconciliation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "squall.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run the periodic alert sync until interrupted.
  Run,

  /// Fetch and persist a region's full zone catalog.
  Onboard { region: String },

  /// Reconcile an onboarded region against the live catalog.
  SyncRegion { region: String },

  /// Delete alerts whose hazard has ended or whose message has expired.
  Cleanup,

  /// List active alerts covering a coordinate.
  Query {
    #[arg(allow_negative_numbers = true)]
    lon: f64,
    #[arg(allow_negative_numbers = true)]
    lat: f64,
  },
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct Settings {
  #[serde(default = "default_store_path")]
  store_path:         PathBuf,
  /// The NWS API requires an identifying User-Agent with contact
  /// information.
  #[serde(default = "default_user_agent")]
  user_agent:         String,
  #[serde(default = "default_sync_interval_secs")]
  sync_interval_secs: u64,
  #[serde(default = "default_workers")]
  workers:            usize,
  #[serde(default = "default_queue")]
  queue:              usize,
}

fn default_store_path() -> PathBuf { PathBuf::from("squall.db") }
fn default_user_agent() -> String {
  "squall (github.com/squall-daemon/squall)".to_owned()
}
fn default_sync_interval_secs() -> u64 { 10 }
fn default_workers() -> usize { 10 }
fn default_queue() -> usize { 100 }

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SQUALL"))
    .build()
    .context("failed to read config file")?;
  let settings: Settings = settings
    .try_deserialize()
    .context("failed to deserialise Settings")?;

  let store_path = expand_tilde(&settings.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let client = Arc::new(
    NwsClient::new(&settings.user_agent)
      .context("failed to build NWS client")?,
  );

  let pool = Arc::new(WorkerPool::new(settings.workers, settings.queue));
  let fetcher = Fetcher::new(Arc::clone(&client), Arc::clone(&pool));
  let regions =
    RegionService::new(Arc::clone(&client), Arc::clone(&store), fetcher);
  let alerts = Arc::new(AlertService::new(client, store));

  let result = match cli.command {
    Command::Run => run(alerts, settings.sync_interval_secs).await,
    Command::Onboard { region } => onboard(&regions, &region).await,
    Command::SyncRegion { region } => sync_region(&regions, &region).await,
    Command::Cleanup => cleanup(&alerts).await,
    Command::Query { lon, lat } => query(&alerts, lon, lat).await,
  };

  pool.close().await;
  result
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn run(
  alerts: Arc<AlertService<NwsClient, SqliteStore>>,
  interval_secs: u64,
) -> anyhow::Result<()> {
  let scheduler =
    SyncScheduler::spawn(alerts, Duration::from_secs(interval_secs));
  tracing::info!(interval_secs, "alert sync running; Ctrl-C to stop");

  tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
  tracing::info!("shutting down");
  scheduler.shutdown().await;
  Ok(())
}

async fn onboard(
  regions: &RegionService<NwsClient, SqliteStore>,
  region: &str,
) -> anyhow::Result<()> {
  let outcome = regions
    .onboard(region, &CancellationToken::new())
    .await
    .with_context(|| format!("failed to onboard {region}"))?;

  report_zone_failures(outcome.failures.iter().map(|f| (&f.uri, &f.cause)));
  println!(
    "onboarded {}: {} of {} zones persisted",
    outcome.region,
    outcome.writes.len(),
    outcome.total_zones(),
  );
  Ok(())
}

async fn sync_region(
  regions: &RegionService<NwsClient, SqliteStore>,
  region: &str,
) -> anyhow::Result<()> {
  let outcome = regions
    .sync(region, &CancellationToken::new())
    .await
    .with_context(|| format!("failed to sync {region}"))?;

  report_zone_failures(outcome.failures.iter().map(|f| (&f.uri, &f.cause)));
  println!(
    "synced {}: {} inserted, {} updated, {} deleted, {} failed",
    outcome.region,
    outcome.inserts.len(),
    outcome.updates.len(),
    outcome.deletes.len(),
    outcome.failures.len(),
  );
  Ok(())
}

async fn cleanup(
  alerts: &AlertService<NwsClient, SqliteStore>,
) -> anyhow::Result<()> {
  let swept = alerts.cleanup().await.context("cleanup failed")?;
  println!(
    "swept {} alerts ({} ended, {} expired)",
    swept.total(),
    swept.ended,
    swept.expired,
  );
  Ok(())
}

async fn query(
  alerts: &AlertService<NwsClient, SqliteStore>,
  lon: f64,
  lat: f64,
) -> anyhow::Result<()> {
  let records =
    alerts.active_at(Point::new(lon, lat)).await.context("query failed")?;

  if records.is_empty() {
    println!("no active alerts at ({lon}, {lat})");
    return Ok(());
  }
  for record in records {
    println!(
      "{} [{}] {}",
      record.alert.event, record.alert.severity, record.alert.id,
    );
  }
  Ok(())
}

fn report_zone_failures<'a>(
  failures: impl Iterator<Item = (&'a String, &'a squall_engine::Error)>,
) {
  for (uri, cause) in failures {
    tracing::warn!(zone = %uri, error = %cause, "zone write failed");
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
