//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "tests"
//! codeloc_type: "source"
//! codeloc_scope: "test"
//! codeloc_description: "Shared fixtures for location handle tests."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use codeloc_common::LocationConfig;
use codeloc_handle::{ClientContext, HandleFactory, StaticRepositoryLoader};
use codeloc_metrics::{new_registry, LocationMetrics};
use codeloc_rpc::ConnectionParams;
use codeloc_schema::{
    CodePointer, ExternalGrpcOrigin, GrpcEndpoint, LoadableTargetOrigin, ManagedWorkerOrigin,
    RepositoryLocationOrigin,
};
use codeloc_testharness::{StubConnector, StubLocationServer, StubWorkerSpawner};

pub const IMAGE: &str = "registry.internal/pipelines:2024.06";

pub fn fast_config() -> LocationConfig {
    let mut config = LocationConfig::default();
    config.heartbeat.interval = Duration::from_millis(10);
    config.heartbeat.timeout = Duration::from_millis(500);
    config.watch.interval = Duration::from_millis(10);
    config.watch.timeout = Duration::from_millis(500);
    config.watch.max_reconnect_attempts = 3;
    config.watch.reconnect_interval = Duration::from_millis(10);
    config.connect.retry_interval = Duration::from_millis(10);
    config.connect.rpc_timeout = Duration::from_secs(2);
    config.worker.startup_timeout = Duration::from_millis(200);
    config.worker.shutdown_grace = Duration::from_millis(100);
    config
}

pub fn demo_server(port: u16) -> Arc<StubLocationServer> {
    Arc::new(
        StubLocationServer::new(ConnectionParams::tcp("localhost", port))
            .with_repository("demo_repo", CodePointer::file("/srv/code/repo.py", "demo_repo"))
            .with_repository("etl_repo", CodePointer::module("pipelines.etl", "etl_repo"))
            .with_executable_path("/opt/venv/bin/python")
            .with_image(IMAGE)
            .with_server_ids(["s1"]),
    )
}

pub fn grpc_origin(port: u16) -> RepositoryLocationOrigin {
    ExternalGrpcOrigin::new("localhost", GrpcEndpoint::Port(port))
        .with_location_name("remote")
        .into()
}

pub fn managed_origin() -> ManagedWorkerOrigin {
    ManagedWorkerOrigin::new(LoadableTargetOrigin {
        source_file: Some("/srv/code/repo.py".into()),
        attribute: Some("demo_repo".into()),
        ..LoadableTargetOrigin::default()
    })
    .with_location_name("demo_location")
}

/// Stub server reachable through a stub connector, with metrics on a private registry.
pub struct Env {
    pub server: Arc<StubLocationServer>,
    pub connector: Arc<StubConnector>,
    pub spawner: Arc<StubWorkerSpawner>,
    pub metrics: LocationMetrics,
    pub config: LocationConfig,
}

impl Env {
    pub fn new(port: u16) -> Self {
        Self::with_config(port, fast_config())
    }

    pub fn with_config(port: u16, config: LocationConfig) -> Self {
        let server = demo_server(port);
        let connector = Arc::new(StubConnector::new());
        let spawner = Arc::new(StubWorkerSpawner::new(connector.clone(), server.clone()));
        Self {
            server,
            connector,
            spawner,
            metrics: LocationMetrics::new(new_registry()).expect("metrics register"),
            config,
        }
    }

    /// Make the stub server reachable at its endpoint without spawning it.
    pub fn serve(&self) -> &Self {
        self.connector.register(self.server.clone());
        self
    }

    pub fn context(&self) -> ClientContext {
        ClientContext::new(self.connector.clone(), self.config.clone()).with_metrics(self.metrics.clone())
    }

    pub fn factory(&self, loader: StaticRepositoryLoader) -> HandleFactory {
        HandleFactory::new(
            self.config.clone(),
            self.connector.clone(),
            self.spawner.clone(),
            Arc::new(loader),
        )
        .with_metrics(self.metrics.clone())
    }
}

/// Poll `condition` for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
