//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location handles and the references derived from them."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use codeloc_rpc::{RpcError, SpawnError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HandleError>;

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("could not initialize location {location_name}: {source}")]
    Construction {
        location_name: String,
        #[source]
        source: ConstructionCause,
    },
    #[error("Unable to find repository name {repository_name} on location {location_name}.")]
    RepositoryNotFound {
        repository_name: String,
        location_name: String,
    },
    #[error("location handle {location_name} has been cleaned up")]
    Closed { location_name: String },
    #[error("{handle} handles cannot be built from {origin} origins")]
    OriginMismatch {
        handle: &'static str,
        origin: &'static str,
    },
    #[error("location {location_name} request failed: {source}")]
    Rpc {
        location_name: String,
        #[source]
        source: RpcError,
    },
}

impl HandleError {
    pub(crate) fn construction(location_name: &str, source: impl Into<ConstructionCause>) -> Self {
        Self::Construction {
            location_name: location_name.to_owned(),
            source: source.into(),
        }
    }

    pub(crate) fn closed(location_name: &str) -> Self {
        Self::Closed {
            location_name: location_name.to_owned(),
        }
    }

    /// Underlying cause when construction failed.
    pub fn construction_cause(&self) -> Option<&ConstructionCause> {
        match self {
            Self::Construction { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// What went wrong while a handle was being built.
#[derive(Debug, Error)]
pub enum ConstructionCause {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Failure to resolve a code pointer in the calling process.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no repository definition found for {pointer}")]
    NotFound { pointer: String },
    #[error("failed to load {pointer}: {message}")]
    Failed { pointer: String, message: String },
    #[error("unable to resolve the current executable: {0}")]
    Executable(#[source] std::io::Error),
}
