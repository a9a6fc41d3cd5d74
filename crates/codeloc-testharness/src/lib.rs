//! ---
//! codeloc_section: "07-test-harness"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Stub collaborators for exercising location handles without real servers."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! In-memory stand-ins for the location RPC surface.
//!
//! [`StubLocationServer`] answers every location RPC from scripted state and
//! counts the calls it receives. [`StubConnector`] and [`StubWorkerSpawner`]
//! hand those servers to code that expects real endpoints, and
//! [`EventRecorder`] captures state change events for assertions.

mod connector;
mod events;
mod server;

pub use connector::{StubConnector, StubWorkerSpawner};
pub use events::{failing_subscriber, panicking_subscriber, EventRecorder};
pub use server::{StubLocationServer, StubMethod};
