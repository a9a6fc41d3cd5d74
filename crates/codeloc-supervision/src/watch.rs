//! ---
//! codeloc_section: "05-supervision"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Background supervision of location servers."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::sync::Arc;

use codeloc_common::WatchConfig;
use codeloc_metrics::{LocationMetrics, LOOP_WATCH};
use codeloc_rpc::{LocationClient, RpcError};
use codeloc_schema::LocationStateChangeEvent;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

use crate::subscribers::SubscriberRegistry;
use crate::task::{sleep_or_shutdown, unless_shutdown, ActiveLoopGuard, LoopHandle};

/// Message carried by the `ERROR` event once the reconnect budget is spent.
pub const RECONNECT_FAILED_MESSAGE: &str =
    "Unable to reconnect to server. You can reload the server once it is reachable again";

/// Server id last observed for a location. Shared between a handle and its watch loop.
#[derive(Debug, Default)]
pub struct ServerIdentity {
    current: RwLock<String>,
}

impl ServerIdentity {
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(server_id.into()),
        }
    }

    pub fn get(&self) -> String {
        self.current.read().clone()
    }

    /// Record `server_id`; returns `true` when it differs from the previous value.
    pub fn replace(&self, server_id: &str) -> bool {
        let mut current = self.current.write();
        if *current == server_id {
            return false;
        }
        *current = server_id.to_owned();
        true
    }
}

/// Everything a watch loop needs.
pub struct WatchLoopParams {
    pub location_name: String,
    pub client: Arc<dyn LocationClient>,
    pub server_id: Arc<ServerIdentity>,
    pub subscribers: Arc<SubscriberRegistry>,
    pub config: WatchConfig,
    pub metrics: Option<LocationMetrics>,
}

enum Reconnect {
    Reconnected,
    GaveUp,
    Shutdown,
}

/// Start the identity watcher.
///
/// Emits one `UPDATED` event per distinct new server id. A poll that errors or
/// outlives `timeout` counts as failed. After a failed poll it retries up to `max_reconnect_attempts` times, `reconnect_interval` apart; if
/// none succeed it emits a single `ERROR` event and exits.
pub fn spawn_watch_loop(params: WatchLoopParams) -> LoopHandle {
    let location_name = params.location_name.clone();
    LoopHandle::spawn(LOOP_WATCH, &location_name, move |shutdown| run(params, shutdown))
}

async fn run(params: WatchLoopParams, mut shutdown: watch::Receiver<bool>) {
    let _guard = ActiveLoopGuard::new(params.metrics.clone(), &params.location_name, LOOP_WATCH);

    loop {
        match unless_shutdown(&mut shutdown, params.poll()).await {
            None => return,
            Some(Ok(server_id)) => params.observe(&server_id),
            Some(Err(err)) => {
                warn!(location = %params.location_name, error = %err, "lost connection to location server");
                match params.reconnect(&mut shutdown).await {
                    Reconnect::Reconnected => {}
                    Reconnect::Shutdown => return,
                    Reconnect::GaveUp => {
                        params.subscribers.dispatch(&LocationStateChangeEvent::error(
                            params.location_name.as_str(),
                            RECONNECT_FAILED_MESSAGE,
                        ));
                        return;
                    }
                }
            }
        }

        if sleep_or_shutdown(&mut shutdown, params.config.interval).await {
            return;
        }
    }
}

impl WatchLoopParams {
    async fn poll(&self) -> codeloc_rpc::Result<String> {
        time::timeout(self.config.timeout, self.client.get_server_id())
            .await
            .map_err(|_| RpcError::DeadlineExceeded {
                method: "GetServerId",
            })?
    }

    fn observe(&self, server_id: &str) {
        if self.server_id.replace(server_id) {
            self.subscribers
                .dispatch(&LocationStateChangeEvent::updated(self.location_name.as_str(), server_id));
        }
    }

    async fn reconnect(&self, shutdown: &mut watch::Receiver<bool>) -> Reconnect {
        let budget = self.config.max_reconnect_attempts;
        for attempt in 1..=budget {
            if sleep_or_shutdown(shutdown, self.config.reconnect_interval).await {
                return Reconnect::Shutdown;
            }
            match unless_shutdown(shutdown, self.poll()).await {
                None => return Reconnect::Shutdown,
                Some(Ok(server_id)) => {
                    info!(location = %self.location_name, attempt, "reconnected to location server");
                    self.observe(&server_id);
                    return Reconnect::Reconnected;
                }
                Some(Err(err)) => {
                    debug!(location = %self.location_name, attempt, budget, error = %err, "reconnect attempt failed");
                }
            }
        }
        warn!(location = %self.location_name, attempts = budget, "giving up on location server");
        Reconnect::GaveUp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_reports_only_changes() {
        let identity = ServerIdentity::new("a");
        assert!(!identity.replace("a"));
        assert!(identity.replace("b"));
        assert!(!identity.replace("b"));
        assert_eq!(identity.get(), "b");
    }
}
