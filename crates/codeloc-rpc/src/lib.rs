//! ---
//! codeloc_section: "04-rpc-interfaces"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location RPC contract and managed worker supervision."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! The RPC surface a location exposes, expressed as traits.
//!
//! The wire transport is supplied by implementors of [`ClientConnector`];
//! handles only ever see `Arc<dyn LocationClient>`, which must tolerate
//! concurrent use from the caller, the heartbeat loop and the watch loop.

pub mod client;
pub mod error;
pub mod messages;
pub mod worker;

pub use client::{
    collect_repositories_data, ClientConnector, ConnectionParams, LocationClient,
    RepositoryDataStream,
};
pub use error::{Result, RpcError, SpawnError};
pub use messages::{
    CurrentImage, ListRepositoriesResponse, RepositoryCatalog, RepositoryDataChunk,
    RepositorySymbol,
};
pub use worker::{CommandWorkerSpawner, SpawnedWorker, WorkerProcess, WorkerSpawner};
