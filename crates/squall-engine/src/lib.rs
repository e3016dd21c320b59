//! The Squall reconciliation engine.
//!
//! Ties the remote weather capability to the reconciliation store:
//! a bounded [`pool::WorkerPool`] executes concurrent zone fetches, the
//! [`fetcher::Fetcher`] fans them out and collects exactly one outcome
//! per stub, [`region::RegionService`] onboards and syncs zone catalogs
//! through the pure delta in `squall-core`, [`alerts::AlertService`]
//! ingests active alerts and sweeps stale ones, and
//! [`scheduler::SyncScheduler`] drives the periodic cycle.

pub mod alerts;
pub mod error;
pub mod fetcher;
pub mod outcome;
pub mod pool;
pub mod region;
pub mod scheduler;

pub use error::{Error, Fault, Result};

#[cfg(test)]
mod tests;
