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

use codeloc_common::HeartbeatConfig;
use codeloc_metrics::{LocationMetrics, LOOP_HEARTBEAT};
use codeloc_rpc::LocationClient;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::task::{unless_shutdown, ActiveLoopGuard, LoopHandle};

const HEARTBEAT_ECHO: &str = "ping";

/// Start the keep-alive loop for `location_name`.
///
/// Failures are logged and counted; the loop keeps going until signalled.
/// Persistent outages are reported by the watch loop instead.
pub fn spawn_heartbeat_loop(
    location_name: &str,
    client: Arc<dyn LocationClient>,
    config: &HeartbeatConfig,
    metrics: Option<LocationMetrics>,
) -> LoopHandle {
    let location = location_name.to_owned();
    let config = config.clone();
    LoopHandle::spawn(LOOP_HEARTBEAT, location_name, move |mut shutdown| async move {
        let _guard = ActiveLoopGuard::new(metrics.clone(), &location, LOOP_HEARTBEAT);
        let mut ticker = time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures: u32 = 0;

        loop {
            let tick = unless_shutdown(&mut shutdown, ticker.tick()).await;
            if tick.is_none() {
                break;
            }
            let sent = time::timeout(config.timeout, client.heartbeat(HEARTBEAT_ECHO));
            let outcome = match unless_shutdown(&mut shutdown, sent).await {
                None => break,
                Some(Ok(result)) => result.map(|_| ()).map_err(|err| err.to_string()),
                Some(Err(_)) => Err(format!("no response within {}ms", config.timeout.as_millis())),
            };
            if let Some(metrics) = &metrics {
                metrics.record_heartbeat(&location, outcome.is_ok());
            }
            match outcome {
                Ok(()) => {
                    if consecutive_failures > 0 {
                        debug!(location = %location, after = consecutive_failures, "heartbeat recovered");
                    }
                    consecutive_failures = 0;
                }
                Err(reason) => {
                    consecutive_failures += 1;
                    if consecutive_failures == 1 {
                        warn!(location = %location, error = %reason, "heartbeat failed");
                    } else {
                        debug!(location = %location, error = %reason, consecutive_failures, "heartbeat failed");
                    }
                }
            }
        }
    })
}

