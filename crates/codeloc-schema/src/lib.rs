//! ---
//! codeloc_section: "02-origins-schema"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Shared schema definitions for origins and events."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! Immutable, serialisable descriptors used to reach a code location and to
//! address entities hosted inside it.
//!
//! Nothing in this crate owns a live resource: every type is a plain value that
//! can be persisted and shipped to another process.
#![warn(missing_docs)]

pub mod code_pointer;
pub mod event;
pub mod external;
pub mod origin;
pub mod python;
pub mod selector;

use serde::Serialize;
use sha2::{Digest, Sha256};

pub use code_pointer::CodePointer;
pub use event::{LocationStateChangeEvent, LocationStateChangeKind};
pub use external::{
    ExternalJobOrigin, ExternalPartitionSetOrigin, ExternalPipelineOrigin, ExternalRepositoryOrigin,
};
pub use origin::{
    ExternalGrpcOrigin, GrpcEndpoint, InProcessOrigin, LoadableTargetOrigin, ManagedWorkerOrigin,
    RepositoryLocationOrigin,
};
pub use python::{PipelinePythonOrigin, RepositoryPythonOrigin};
pub use selector::PipelineSelector;

/// Ordered key/value pairs shown to operators when describing a location.
pub type DisplayMetadata = indexmap::IndexMap<String, String>;

/// Shared result type for schema routines.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while encoding or validating schema values.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The value could not be rendered into its canonical JSON form.
    #[error("unable to encode origin: {0}")]
    Encode(#[from] serde_json::Error),
    /// A loadable target did not name any code to load.
    #[error("loadable target must set one of source_file, module_name or package_name")]
    EmptyTarget,
}

/// Stable identifier of a serialisable value: hex SHA-256 over its canonical JSON form.
///
/// Two processes holding structurally equal origins always compute the same id.
pub fn stable_id<T: Serialize>(value: &T) -> SchemaResult<String> {
    let encoded = serde_json::to_vec(value)?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}
