//! ---
//! codeloc_section: "01-core-functionality"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Shared primitives and utilities for the location control plane."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! Shared primitives for the codeloc workspace.
//! This crate exposes configuration loading and logging initialisation
//! consumed by the supervision and handle crates.

pub mod config;
pub mod logging;

pub use config::{
    ConnectConfig, HeartbeatConfig, LoadedLocationConfig, LocationConfig, LoggingConfig,
    WatchConfig, WorkerConfig,
};
pub use logging::{init_tracing, LogFormat};
