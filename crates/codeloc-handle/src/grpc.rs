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

use async_trait::async_trait;
use codeloc_metrics::LocationMetrics;
use codeloc_rpc::{ConnectionParams, RepositoryCatalog};
use codeloc_schema::{CodePointer, RepositoryLocationOrigin};
use codeloc_supervision::LocationStateSubscriber;
use indexmap::IndexMap;
use tracing::warn;

use crate::error::{HandleError, Result};
use crate::location::{HandleOptions, RepositoryLocationHandle};
use crate::repository_location::RepositoryLocation;
use crate::session::{establish, ClientContext, ClientState, SessionRequest};

pub(crate) const VARIANT: &str = "external_grpc";

/// Handle on a location server the platform does not operate.
///
/// Teardown stops the loops and drops the client; the server itself is left
/// running and never receives a shutdown request.
#[derive(Debug)]
pub struct GrpcServerLocationHandle {
    state: ClientState,
    metrics: Option<LocationMetrics>,
}

impl GrpcServerLocationHandle {
    /// Connect to the server described by an external origin.
    pub async fn connect(
        context: &ClientContext,
        origin: RepositoryLocationOrigin,
        options: HandleOptions,
    ) -> Result<Self> {
        let params = match &origin {
            RepositoryLocationOrigin::ExternalGrpc(external) => ConnectionParams::from(external),
            other => {
                return Err(HandleError::OriginMismatch {
                    handle: VARIANT,
                    origin: other.kind(),
                })
            }
        };
        Self::connect_to(context, origin, params, options).await
    }

    /// Connect to an explicit endpoint while addressing it through `origin`.
    pub async fn connect_to(
        context: &ClientContext,
        origin: RepositoryLocationOrigin,
        params: ConnectionParams,
        options: HandleOptions,
    ) -> Result<Self> {
        let location_name = origin.location_name().to_owned();
        let outcome = establish(SessionRequest {
            origin: &origin,
            params: &params,
            context,
            attempts: context.config.connect.attempts,
            options,
        })
        .await;
        if let Some(metrics) = &context.metrics {
            metrics.record_construction(VARIANT, outcome.is_ok());
        }

        let established =
            outcome.map_err(|failed| HandleError::construction(&location_name, failed.cause))?;
        let repository_names: BTreeSet<String> = established
            .listing
            .symbol_names()
            .map(str::to_owned)
            .collect();
        let executable_path = established.listing.executable_path.clone();
        Ok(Self {
            state: ClientState::new(
                origin,
                params,
                established,
                executable_path,
                repository_names,
                context.config.connect.rpc_timeout,
            ),
            metrics: context.metrics.clone(),
        })
    }

    pub fn host(&self) -> &str {
        &self.state.params.host
    }

    pub fn port(&self) -> Option<u16> {
        self.state.params.port()
    }

    pub fn socket(&self) -> Option<&str> {
        self.state.params.socket_path()
    }

    pub fn use_tls(&self) -> bool {
        self.state.params.use_tls
    }

    /// Refresh the container image reported by the server.
    pub async fn reload_current_image(&self) -> Result<Option<String>> {
        self.state.reload_current_image().await
    }
}

#[async_trait]
impl RepositoryLocationHandle for GrpcServerLocationHandle {
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
        let released = self.state.teardown(|client| async move { drop(client) }).await;
        if released {
            if let Some(metrics) = &self.metrics {
                metrics.record_cleanup(VARIANT);
            }
        }
    }
}

impl Drop for GrpcServerLocationHandle {
    fn drop(&mut self) {
        if self.state.abandon() {
            warn!(
                location = self.state.location_name(),
                "location handle dropped without cleanup; loops signalled"
            );
        }
    }
}
