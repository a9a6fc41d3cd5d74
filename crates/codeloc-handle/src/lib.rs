//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location handles and the references derived from them."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! Location handles and reference handles.
//!
//! A location handle connects to a code location, snapshots its catalog and
//! owns the supervision loops watching it. Three variants share one trait:
//!
//! * [`GrpcServerLocationHandle`] for servers operated elsewhere,
//! * [`ManagedWorkerLocationHandle`] for worker processes this process spawns,
//! * [`InProcessLocationHandle`] for repositories loaded in the caller.
//!
//! Reference handles ([`RepositoryHandle`], [`PipelineHandle`], [`JobHandle`],
//! [`PartitionSetHandle`]) are cheap name-chain keys derived from a location
//! handle that produce serialisable origins.

pub mod error;
pub mod factory;
pub mod grpc;
pub mod in_process;
pub mod location;
pub mod managed;
pub mod reference;
pub mod repository_location;
mod session;

pub use error::{ConstructionCause, HandleError, LoadError, Result};
pub use factory::HandleFactory;
pub use grpc::GrpcServerLocationHandle;
pub use in_process::{InProcessLocationHandle, LoadedRepository, RepositoryLoader, StaticRepositoryLoader};
pub use location::{repository_python_origin, HandleOptions, RepositoryLocationHandle};
pub use managed::ManagedWorkerLocationHandle;
pub use reference::{JobHandle, PartitionSetHandle, PipelineHandle, RepositoryHandle};
pub use repository_location::{ExternalRepository, RepositoryLocation};
pub use session::ClientContext;
