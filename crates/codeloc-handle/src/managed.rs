//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location handles and the references derived from them."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codeloc_metrics::LocationMetrics;
use codeloc_rpc::{LocationClient, RepositoryCatalog, SpawnedWorker, WorkerProcess, WorkerSpawner};
use codeloc_schema::{CodePointer, LoadableTargetOrigin, ManagedWorkerOrigin, RepositoryLocationOrigin};
use codeloc_supervision::LocationStateSubscriber;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{HandleError, Result};
use crate::location::{HandleOptions, RepositoryLocationHandle};
use crate::repository_location::RepositoryLocation;
use crate::session::{establish, with_deadline, ClientContext, ClientState, SessionRequest};

pub(crate) const VARIANT: &str = "managed_worker";

const LOCAL_HOST: &str = "localhost";

/// Handle on a worker process the platform spawns and owns.
///
/// The worker is always started with heartbeats enabled so it exits on its own
/// if this process disappears. Teardown asks it to shut down exactly once and
/// then reaps the process.
#[derive(Debug)]
pub struct ManagedWorkerLocationHandle {
    state: ClientState,
    loadable_target_origin: LoadableTargetOrigin,
    process: Mutex<Option<WorkerProcess>>,
    shutdown_grace: Duration,
    metrics: Option<LocationMetrics>,
}

impl ManagedWorkerLocationHandle {
    /// Spawn a worker for `origin` and connect to it once it answers.
    ///
    /// Heartbeating is forced on; `options.watch` still decides whether the
    /// server identity is watched.
    pub async fn launch(
        context: &ClientContext,
        spawner: &dyn WorkerSpawner,
        origin: ManagedWorkerOrigin,
        options: HandleOptions,
    ) -> Result<Self> {
        let result = Self::launch_inner(context, spawner, origin, options).await;
        if let Some(metrics) = &context.metrics {
            metrics.record_construction(VARIANT, result.is_ok());
        }
        result
    }

    async fn launch_inner(
        context: &ClientContext,
        spawner: &dyn WorkerSpawner,
        origin: ManagedWorkerOrigin,
        options: HandleOptions,
    ) -> Result<Self> {
        let location_name = origin.location_name.clone();
        let target = origin.loadable_target_origin.clone();
        let SpawnedWorker { params, process } = spawner
            .spawn(&target, true)
            .await
            .map_err(|err| HandleError::construction(&location_name, err))?;
        debug!(location = %location_name, endpoint = %params, "managed worker spawned");

        let config = &context.config;
        let params = params.with_tls(false);
        let origin = RepositoryLocationOrigin::from(origin);
        let outcome = establish(SessionRequest {
            origin: &origin,
            params: &params,
            context,
            attempts: readiness_attempts(config.worker.startup_timeout, config.connect.retry_interval),
            options: options.with_heartbeat(true),
        })
        .await;

        match outcome {
            Ok(established) => {
                let repository_names: BTreeSet<String> =
                    established.listing.repository_code_pointers.keys().cloned().collect();
                let executable_path = target
                    .executable_path
                    .clone()
                    .unwrap_or_else(|| established.listing.executable_path.clone());
                Ok(Self {
                    state: ClientState::new(
                        origin,
                        params,
                        established,
                        executable_path,
                        repository_names,
                        config.connect.rpc_timeout,
                    ),
                    loadable_target_origin: target,
                    process: Mutex::new(process),
                    shutdown_grace: config.worker.shutdown_grace,
                    metrics: context.metrics.clone(),
                })
            }
            Err(failed) => {
                let grace = if failed.client.is_some() {
                    config.worker.shutdown_grace
                } else {
                    Duration::ZERO
                };
                release_worker(&location_name, failed.client, process, config.connect.rpc_timeout, grace)
                    .await;
                Err(HandleError::construction(&location_name, failed.cause))
            }
        }
    }

    pub fn loadable_target_origin(&self) -> &LoadableTargetOrigin {
        &self.loadable_target_origin
    }

    pub fn host(&self) -> &str {
        LOCAL_HOST
    }

    pub fn port(&self) -> Option<u16> {
        self.state.params.port()
    }

    pub fn socket(&self) -> Option<&str> {
        self.state.params.socket_path()
    }

    pub fn use_tls(&self) -> bool {
        false
    }

    pub async fn reload_current_image(&self) -> Result<Option<String>> {
        self.state.reload_current_image().await
    }
}

/// Request shutdown over `client` when one is open, then reap the process.
///
/// Failures are logged; a server that is already gone counts as released.
async fn release_worker(
    location_name: &str,
    client: Option<Arc<dyn LocationClient>>,
    process: Option<WorkerProcess>,
    rpc_timeout: Duration,
    grace: Duration,
) {
    if let Some(client) = client {
        match with_deadline("ShutdownServer", rpc_timeout, client.shutdown_server()).await {
            Ok(()) => info!(location = location_name, "managed worker asked to shut down"),
            Err(err) => warn!(location = location_name, error = %err, "shutdown request failed; treating worker as gone"),
        }
    }
    if let Some(process) = process {
        process.reap(grace).await;
    }
}

/// Connection tries that fit in the worker's startup window.
fn readiness_attempts(startup_timeout: Duration, retry_interval: Duration) -> u32 {
    if retry_interval.is_zero() {
        return 1;
    }
    let attempts = startup_timeout.as_millis() / retry_interval.as_millis().max(1);
    u32::try_from(attempts).unwrap_or(u32::MAX).max(1)
}

#[async_trait]
impl RepositoryLocationHandle for ManagedWorkerLocationHandle {
    fn origin(&self) -> &RepositoryLocationOrigin {
        &self.state.origin
    }

    fn repository_names(&self) -> BTreeSet<String> {
        self.state.repository_names.clone()
    }

    fn executable_path(&self) -> &str {
        &self.state.executable_path
    }

    fn repository_code_pointers(&self) -> &IndexMap<String, CodePointer> {
        &self.state.code_pointers
    }

    fn container_image(&self) -> Option<String> {
        self.state.container_image()
    }

    fn server_id(&self) -> Option<String> {
        Some(self.state.server_id())
    }

    fn add_state_subscriber(&self, subscriber: Arc<dyn LocationStateSubscriber>) {
        self.state.add_subscriber(subscriber);
    }

    fn repositories_data(&self) -> Result<RepositoryCatalog> {
        self.state.repositories_data()
    }

    fn create_location(self: Arc<Self>) -> Result<RepositoryLocation> {
        RepositoryLocation::new(self)
    }

    fn is_cleaned_up(&self) -> bool {
        self.state.is_cleaned_up()
    }

    async fn cleanup(&self) {
        let location_name = self.state.location_name().to_owned();
        let rpc_timeout = self.state.rpc_timeout();
        let released = self
            .state
            .teardown(|client| async move {
                let process = self.process.lock().take();
                release_worker(&location_name, Some(client), process, rpc_timeout, self.shutdown_grace)
                    .await;
            })
            .await;
        if released {
            if let Some(metrics) = &self.metrics {
                metrics.record_cleanup(VARIANT);
            }
        }
    }
}

impl Drop for ManagedWorkerLocationHandle {
    fn drop(&mut self) {
        if self.state.abandon() {
            warn!(
                location = self.state.location_name(),
                "managed location handle dropped without cleanup; worker will be killed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_attempts_cover_startup_window() {
        assert_eq!(readiness_attempts(Duration::from_secs(30), Duration::from_millis(500)), 60);
        assert_eq!(readiness_attempts(Duration::from_millis(100), Duration::from_secs(1)), 1);
        assert_eq!(readiness_attempts(Duration::from_secs(1), Duration::ZERO), 1);
    }
}
