//! ---
//! codeloc_section: "04-rpc-interfaces"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location RPC contract and managed worker supervision."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RpcError>;

#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("location endpoint {endpoint} is unavailable: {message}")]
    Unavailable { endpoint: String, message: String },
    #[error("{method} exceeded its deadline")]
    DeadlineExceeded { method: &'static str },
    #[error("{method} failed with status {code}: {message}")]
    Status {
        method: &'static str,
        code: i32,
        message: String,
    },
    #[error("repository data stream broke: {0}")]
    Stream(String),
    #[error("client has been closed")]
    Closed,
}

impl RpcError {
    /// Connectivity failures that may clear up if the call is retried.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            RpcError::Unavailable { .. } | RpcError::DeadlineExceeded { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("invalid loadable target: {0}")]
    InvalidTarget(#[from] codeloc_schema::SchemaError),
    #[error("no worker program configured and target has no executable path")]
    NoProgram,
    #[error("unable to reserve a port for the worker: {0}")]
    Port(#[source] std::io::Error),
    #[error("failed to launch worker {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_classification() {
        let unavailable = RpcError::Unavailable {
            endpoint: "localhost:4000".into(),
            message: "connection refused".into(),
        };
        assert!(unavailable.is_unavailable());
        assert!(RpcError::DeadlineExceeded { method: "GetServerId" }.is_unavailable());
        let status = RpcError::Status {
            method: "ListRepositories",
            code: 13,
            message: "internal".into(),
        };
        assert!(!status.is_unavailable());
        assert!(!RpcError::Closed.is_unavailable());
    }
}
