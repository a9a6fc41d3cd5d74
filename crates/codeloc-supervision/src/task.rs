//! ---
//! codeloc_section: "05-supervision"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Background supervision of location servers."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::future::Future;
use std::time::Duration;

use codeloc_metrics::LocationMetrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Control handle for a running supervision loop.
#[derive(Debug)]
pub struct LoopHandle {
    kind: &'static str,
    location_name: String,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Spawn `body` with a fresh shutdown channel.
    pub(crate) fn spawn<F, Fut>(kind: &'static str, location_name: &str, body: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(body(shutdown_rx));
        debug!(location = location_name, kind, "supervision loop started");
        Self {
            kind,
            location_name: location_name.to_owned(),
            shutdown,
            task,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Ask the loop to exit at its next iteration boundary.
    pub fn signal(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop task to exit. A panicked loop is logged, not propagated.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            error!(location = %self.location_name, kind = self.kind, error = %err, "supervision loop join error");
        }
    }

    /// Signal, then wait for the loop to exit.
    pub async fn stop(self) {
        self.signal();
        self.join().await;
    }
}

/// Resolves once shutdown is requested or the controlling handle is gone.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `period` unless shutdown arrives first. Returns `true` on shutdown.
pub(crate) async fn sleep_or_shutdown(rx: &mut watch::Receiver<bool>, period: Duration) -> bool {
    tokio::select! {
        biased;
        _ = shutdown_requested(rx) => true,
        _ = tokio::time::sleep(period) => false,
    }
}

/// Run `fut` unless shutdown arrives first, in which case it is dropped.
pub(crate) async fn unless_shutdown<F: Future>(
    rx: &mut watch::Receiver<bool>,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = shutdown_requested(rx) => None,
        output = fut => Some(output),
    }
}

/// Keeps the active-loop gauge in step with the task's lifetime, panics included.
pub(crate) struct ActiveLoopGuard {
    metrics: Option<LocationMetrics>,
    location_name: String,
    kind: &'static str,
}

impl ActiveLoopGuard {
    pub(crate) fn new(metrics: Option<LocationMetrics>, location_name: &str, kind: &'static str) -> Self {
        if let Some(metrics) = &metrics {
            metrics.loop_started(location_name, kind);
        }
        Self {
            metrics,
            location_name: location_name.to_owned(),
            kind,
        }
    }
}

impl Drop for ActiveLoopGuard {
    fn drop(&mut self) {
        if let Some(metrics) = &self.metrics {
            metrics.loop_stopped(&self.location_name, self.kind);
        }
        debug!(location = %self.location_name, kind = self.kind, "supervision loop exited");
    }
}
