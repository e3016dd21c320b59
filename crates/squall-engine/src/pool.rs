//! A fixed-size worker pool with a bounded task queue.
//!
//! `submit` applies backpressure: when the queue is full the submitter
//! waits until a worker frees a slot — work is never dropped. Workers
//! pull tasks in arrival order; completion order across workers is
//! unspecified. A panicking task is contained and logged, and its
//! worker keeps dequeuing. `close` drains the queue and joins every
//! worker.

use std::{future::Future, pin::Pin, sync::Arc};

use futures::FutureExt as _;
use thiserror::Error;
use tokio::{
  sync::{Mutex, mpsc},
  task::JoinHandle,
};

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Returned by [`WorkerPool::submit`] once the pool has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("worker pool is closed")]
pub struct PoolClosed;

pub struct WorkerPool {
  tx:      std::sync::Mutex<Option<mpsc::Sender<Task>>>,
  handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
  /// Spawn `workers` workers sharing one queue of capacity `queue`.
  /// A zero capacity still admits a single in-flight handoff slot.
  ///
  /// # Panics
  ///
  /// Panics if `workers` is zero.
  pub fn new(workers: usize, queue: usize) -> Self {
    assert!(workers > 0, "worker pool requires at least one worker");

    let (tx, rx) = mpsc::channel::<Task>(queue.max(1));
    let rx = Arc::new(Mutex::new(rx));

    let handles = (0..workers)
      .map(|worker| {
        let rx = Arc::clone(&rx);
        tokio::spawn(worker_loop(worker, rx))
      })
      .collect();

    Self {
      tx: std::sync::Mutex::new(Some(tx)),
      handles: std::sync::Mutex::new(handles),
    }
  }

  /// Enqueue a task, waiting for queue space when the pool is saturated.
  pub async fn submit<F>(&self, task: F) -> Result<(), PoolClosed>
  where
    F: Future<Output = ()> + Send + 'static,
  {
    // Clone the sender out of the lock so the wait for queue space does
    // not hold it.
    let tx = {
      let guard = self.tx.lock().expect("pool sender lock poisoned");
      guard.clone()
    };
    let Some(tx) = tx else { return Err(PoolClosed) };

    tx.send(Box::pin(task)).await.map_err(|_| PoolClosed)
  }

  /// Stop intake, let every queued task run, and join the workers.
  /// Subsequent `submit` calls return [`PoolClosed`].
  pub async fn close(&self) {
    let tx = {
      let mut guard = self.tx.lock().expect("pool sender lock poisoned");
      guard.take()
    };
    drop(tx);

    let handles = {
      let mut guard = self.handles.lock().expect("pool handle lock poisoned");
      std::mem::take(&mut *guard)
    };
    for handle in handles {
      let _ = handle.await;
    }
  }
}

async fn worker_loop(worker: usize, rx: Arc<Mutex<mpsc::Receiver<Task>>>) {
  loop {
    // Hold the receiver lock only for the dequeue, so other workers can
    // pull while this one runs its task.
    let task = { rx.lock().await.recv().await };
    let Some(task) = task else { return };

    if std::panic::AssertUnwindSafe(task).catch_unwind().await.is_err() {
      tracing::error!(worker, "task panicked; worker continues");
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
