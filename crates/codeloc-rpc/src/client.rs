//! ---
//! codeloc_section: "04-rpc-interfaces"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location RPC contract and managed worker supervision."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use codeloc_schema::{ExternalGrpcOrigin, GrpcEndpoint, RepositoryLocationOrigin};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::messages::{
    CurrentImage, ListRepositoriesResponse, RepositoryCatalog, RepositoryDataChunk,
};
use crate::Result;

/// Stream of catalog entries returned by `FetchRepositoriesData`.
pub type RepositoryDataStream = BoxStream<'static, Result<RepositoryDataChunk>>;

/// Resolved connection parameters for a location endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionParams {
    pub host: String,
    pub endpoint: GrpcEndpoint,
    pub use_tls: bool,
}

impl ConnectionParams {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            endpoint: GrpcEndpoint::Port(port),
            use_tls: false,
        }
    }

    pub fn socket(host: impl Into<String>, socket: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            endpoint: GrpcEndpoint::Socket(socket.into()),
            use_tls: false,
        }
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn port(&self) -> Option<u16> {
        match self.endpoint {
            GrpcEndpoint::Port(port) => Some(port),
            GrpcEndpoint::Socket(_) => None,
        }
    }

    pub fn socket_path(&self) -> Option<&str> {
        match &self.endpoint {
            GrpcEndpoint::Port(_) => None,
            GrpcEndpoint::Socket(socket) => Some(socket),
        }
    }
}

impl From<&ExternalGrpcOrigin> for ConnectionParams {
    fn from(origin: &ExternalGrpcOrigin) -> Self {
        Self {
            host: origin.host.clone(),
            endpoint: origin.endpoint.clone(),
            use_tls: origin.use_tls,
        }
    }
}

impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            GrpcEndpoint::Port(port) => write!(f, "{}:{}", self.host, port),
            GrpcEndpoint::Socket(socket) => write!(f, "unix:{socket}"),
        }
    }
}

/// Request/response and streaming calls against one location endpoint.
///
/// Implementations are shared between the caller and the supervision loops,
/// so every method takes `&self` and must be safe to call concurrently.
#[async_trait]
pub trait LocationClient: Send + Sync {
    /// Endpoint this client talks to.
    fn params(&self) -> &ConnectionParams;

    async fn list_repositories(&self) -> Result<ListRepositoriesResponse>;

    /// Opaque id of the current server incarnation.
    async fn get_server_id(&self) -> Result<String>;

    /// Keep-alive; servers started with heartbeat enabled exit when these stop.
    async fn heartbeat(&self, echo: &str) -> Result<String>;

    async fn get_current_image(&self) -> Result<CurrentImage>;

    async fn fetch_repositories_data(
        &self,
        location: &RepositoryLocationOrigin,
    ) -> Result<RepositoryDataStream>;

    /// Ask the server process to exit. Only managed workers are ever sent this.
    async fn shutdown_server(&self) -> Result<()>;
}

/// Opens clients for resolved connection parameters.
#[async_trait]
pub trait ClientConnector: Send + Sync {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn LocationClient>>;
}

/// Drain the streamed catalog into a map keyed by repository name.
///
/// A repeated name keeps the last payload received.
pub async fn collect_repositories_data(
    client: &dyn LocationClient,
    location: &RepositoryLocationOrigin,
) -> Result<RepositoryCatalog> {
    let mut stream = client.fetch_repositories_data(location).await?;
    let mut catalog = RepositoryCatalog::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        debug!(location = location.location_name(), repository = %chunk.repository_name, "received repository data");
        catalog.insert(chunk.repository_name, chunk.repository_data);
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_display() {
        assert_eq!(ConnectionParams::tcp("localhost", 4000).to_string(), "localhost:4000");
        let socket = ConnectionParams::socket("localhost", "/tmp/worker.sock");
        assert_eq!(socket.to_string(), "unix:/tmp/worker.sock");
        assert_eq!(socket.port(), None);
        assert_eq!(socket.socket_path(), Some("/tmp/worker.sock"));
    }

    #[test]
    fn params_from_origin_carry_tls() {
        let origin = ExternalGrpcOrigin::new("code.internal", GrpcEndpoint::Port(443)).with_tls(true);
        let params = ConnectionParams::from(&origin);
        assert!(params.use_tls);
        assert_eq!(params.port(), Some(443));
    }
}
