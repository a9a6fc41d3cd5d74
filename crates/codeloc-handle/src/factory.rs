//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location handles and the references derived from them."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

use codeloc_common::LocationConfig;
use codeloc_metrics::LocationMetrics;
use codeloc_rpc::{ClientConnector, WorkerSpawner};
use codeloc_schema::RepositoryLocationOrigin;
use futures::FutureExt;
use tracing::debug;

use crate::error::Result;
use crate::grpc::GrpcServerLocationHandle;
use crate::in_process::{InProcessLocationHandle, RepositoryLoader};
use crate::location::{HandleOptions, RepositoryLocationHandle};
use crate::managed::ManagedWorkerLocationHandle;
use crate::session::ClientContext;

/// Builds the right handle variant for an origin.
#[derive(Clone)]
pub struct HandleFactory {
    context: ClientContext,
    spawner: Arc<dyn WorkerSpawner>,
    loader: Arc<dyn RepositoryLoader>,
}

impl std::fmt::Debug for HandleFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleFactory")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl HandleFactory {
    pub fn new(
        config: LocationConfig,
        connector: Arc<dyn ClientConnector>,
        spawner: Arc<dyn WorkerSpawner>,
        loader: Arc<dyn RepositoryLoader>,
    ) -> Self {
        Self {
            context: ClientContext::new(connector, config),
            spawner,
            loader,
        }
    }

    pub fn with_metrics(mut self, metrics: LocationMetrics) -> Self {
        self.context = self.context.with_metrics(metrics);
        self
    }

    pub fn config(&self) -> &LocationConfig {
        &self.context.config
    }

    /// Construct a handle for `origin`. The caller owns its teardown.
    pub async fn create(
        &self,
        origin: &RepositoryLocationOrigin,
        options: HandleOptions,
    ) -> Result<Arc<dyn RepositoryLocationHandle>> {
        debug!(location = origin.location_name(), kind = origin.kind(), "creating location handle");
        let handle: Arc<dyn RepositoryLocationHandle> = match origin {
            RepositoryLocationOrigin::ExternalGrpc(_) => Arc::new(
                GrpcServerLocationHandle::connect(&self.context, origin.clone(), options).await?,
            ),
            RepositoryLocationOrigin::ManagedWorker(managed) => Arc::new(
                ManagedWorkerLocationHandle::launch(
                    &self.context,
                    self.spawner.as_ref(),
                    managed.clone(),
                    options,
                )
                .await?,
            ),
            RepositoryLocationOrigin::InProcess(in_process) => Arc::new(InProcessLocationHandle::load(
                self.loader.as_ref(),
                in_process.clone(),
                self.context.metrics.clone(),
            )?),
        };
        Ok(handle)
    }

    /// Construct a handle, run `body` with it and tear it down afterwards.
    ///
    /// Teardown runs whether `body` returns or panics; a panic is resumed
    /// once the handle has been released.
    pub async fn with_handle<F, Fut, T>(
        &self,
        origin: &RepositoryLocationOrigin,
        options: HandleOptions,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(Arc<dyn RepositoryLocationHandle>) -> Fut,
        Fut: Future<Output = T>,
    {
        let handle = self.create(origin, options).await?;
        let outcome = AssertUnwindSafe(body(handle.clone())).catch_unwind().await;
        handle.cleanup().await;
        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => resume_unwind(panic),
        }
    }
}
