//! ---
//! codeloc_section: "05-supervision"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Background supervision of location servers."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! Background supervision of location servers.
//!
//! Two loops run per client-owning location handle: the heartbeat loop keeps a
//! server's idle timer reset, the watch loop detects restarts and outages and
//! reports them to subscribers. Both observe a shutdown signal between
//! iterations and are stopped with signal-then-join through [`LoopHandle`].

mod heartbeat;
mod subscribers;
mod task;
mod watch;

pub use heartbeat::spawn_heartbeat_loop;
pub use subscribers::{DeliveryReport, LocationStateSubscriber, SubscriberRegistry};
pub use task::LoopHandle;
pub use watch::{spawn_watch_loop, ServerIdentity, WatchLoopParams, RECONNECT_FAILED_MESSAGE};
