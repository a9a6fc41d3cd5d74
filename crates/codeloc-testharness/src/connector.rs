//! ---
//! codeloc_section: "07-test-harness"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Stub collaborators for exercising location handles without real servers."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use codeloc_rpc::{
    ClientConnector, ConnectionParams, LocationClient, Result, RpcError, SpawnError, SpawnedWorker,
    WorkerSpawner,
};
use codeloc_schema::LoadableTargetOrigin;
use parking_lot::Mutex;

use crate::server::StubLocationServer;

/// Resolves connection parameters to registered stub servers.
///
/// Unknown endpoints are refused as unavailable, like a closed port.
#[derive(Debug, Default)]
pub struct StubConnector {
    servers: Mutex<HashMap<ConnectionParams, Arc<StubLocationServer>>>,
    connects: AtomicUsize,
}

impl StubConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `server` at its own connection parameters.
    pub fn register(&self, server: Arc<StubLocationServer>) {
        let params = server.params().clone();
        self.servers.lock().insert(params, server);
    }

    pub fn deregister(&self, params: &ConnectionParams) {
        self.servers.lock().remove(params);
    }

    /// Number of connect attempts, successful or not.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientConnector for StubConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn LocationClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let server = self.servers.lock().get(params).cloned();
        match server {
            Some(server) => Ok(server),
            None => Err(RpcError::Unavailable {
                endpoint: params.to_string(),
                message: "connection refused".to_owned(),
            }),
        }
    }
}

/// Stands in for the managed worker supervisor.
///
/// Each spawn registers the stub server with the connector and reports its
/// parameters; no OS process is created.
#[derive(Debug)]
pub struct StubWorkerSpawner {
    connector: Arc<StubConnector>,
    server: Arc<StubLocationServer>,
    spawns: AtomicUsize,
    heartbeat_requested: AtomicBool,
    refuse: AtomicBool,
    targets: Mutex<Vec<LoadableTargetOrigin>>,
}

impl StubWorkerSpawner {
    pub fn new(connector: Arc<StubConnector>, server: Arc<StubLocationServer>) -> Self {
        Self {
            connector,
            server,
            spawns: AtomicUsize::new(0),
            heartbeat_requested: AtomicBool::new(false),
            refuse: AtomicBool::new(false),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Make subsequent spawns fail to launch.
    pub fn refuse_spawns(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    /// Whether the last spawn asked for heartbeat supervision.
    pub fn heartbeat_requested(&self) -> bool {
        self.heartbeat_requested.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<LoadableTargetOrigin> {
        self.targets.lock().clone()
    }
}

#[async_trait]
impl WorkerSpawner for StubWorkerSpawner {
    async fn spawn(
        &self,
        target: &LoadableTargetOrigin,
        heartbeat: bool,
    ) -> std::result::Result<SpawnedWorker, SpawnError> {
        target.validate()?;
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SpawnError::Launch {
                program: "stub-worker".to_owned(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "spawns refused"),
            });
        }
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.heartbeat_requested.store(heartbeat, Ordering::SeqCst);
        self.targets.lock().push(target.clone());
        self.connector.register(self.server.clone());
        Ok(SpawnedWorker {
            params: self.server.params().clone(),
            process: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_endpoint_is_refused() {
        let connector = StubConnector::new();
        let err = connector
            .connect(&ConnectionParams::tcp("localhost", 1))
            .await
            .err()
            .expect("nothing registered");
        assert!(err.is_unavailable());
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn spawn_registers_server() {
        let connector = Arc::new(StubConnector::new());
        let server = Arc::new(StubLocationServer::new(ConnectionParams::tcp("localhost", 4100)));
        let spawner = StubWorkerSpawner::new(connector.clone(), server);
        let target = LoadableTargetOrigin {
            source_file: Some("repo.py".into()),
            ..LoadableTargetOrigin::default()
        };
        let worker = spawner.spawn(&target, true).await.unwrap();
        assert!(spawner.heartbeat_requested());
        assert!(connector.connect(&worker.params).await.is_ok());
    }
}
