//! ---
//! codeloc_section: "04-rpc-interfaces"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location RPC contract and managed worker supervision."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::net::TcpListener as StdTcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use codeloc_common::WorkerConfig;
use codeloc_schema::LoadableTargetOrigin;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::client::ConnectionParams;
use crate::error::SpawnError;

/// Spawns worker processes that host a loadable target behind an RPC endpoint.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    /// Start a worker for `target`. With `heartbeat` set the worker exits when
    /// heartbeats stop arriving.
    async fn spawn(
        &self,
        target: &LoadableTargetOrigin,
        heartbeat: bool,
    ) -> Result<SpawnedWorker, SpawnError>;
}

/// Result of a successful spawn.
#[derive(Debug)]
pub struct SpawnedWorker {
    pub params: ConnectionParams,
    /// OS process, when the spawner owns one.
    pub process: Option<WorkerProcess>,
}

/// An owned worker process.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
}

impl WorkerProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait up to `grace` for the process to exit on its own, then kill it.
    pub async fn reap(mut self, grace: Duration) {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!(?status, "worker exited"),
            Ok(Err(err)) => warn!(error = %err, "failed to wait for worker"),
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "worker did not exit in time; killing");
                if let Err(err) = self.child.kill().await {
                    warn!(error = %err, "failed to kill worker");
                }
            }
        }
    }
}

/// Launches workers as child processes listening on a reserved local port.
#[derive(Debug, Clone)]
pub struct CommandWorkerSpawner {
    config: WorkerConfig,
}

impl CommandWorkerSpawner {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    fn program(&self, target: &LoadableTargetOrigin) -> Result<PathBuf, SpawnError> {
        self.config
            .program
            .clone()
            .or_else(|| target.executable_path.as_ref().map(PathBuf::from))
            .ok_or(SpawnError::NoProgram)
    }

    /// Arguments appended after the configured base arguments.
    pub fn target_args(target: &LoadableTargetOrigin, port: u16, heartbeat: bool) -> Vec<String> {
        let mut args = vec!["--port".to_owned(), port.to_string()];
        if heartbeat {
            args.push("--heartbeat".to_owned());
        }
        let options = [
            ("--source-file", &target.source_file),
            ("--module-name", &target.module_name),
            ("--package-name", &target.package_name),
            ("--working-directory", &target.working_directory),
            ("--attribute", &target.attribute),
        ];
        for (flag, value) in options {
            if let Some(value) = value {
                args.push(flag.to_owned());
                args.push(value.clone());
            }
        }
        args
    }
}

#[async_trait]
impl WorkerSpawner for CommandWorkerSpawner {
    async fn spawn(
        &self,
        target: &LoadableTargetOrigin,
        heartbeat: bool,
    ) -> Result<SpawnedWorker, SpawnError> {
        target.validate()?;
        let program = self.program(target)?;
        let port = reserve_port().map_err(SpawnError::Port)?;

        let mut command = Command::new(&program);
        command
            .args(&self.config.args)
            .args(Self::target_args(target, port, heartbeat))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(directory) = &target.working_directory {
            command.current_dir(directory);
        }

        let child = command.spawn().map_err(|source| SpawnError::Launch {
            program: program.display().to_string(),
            source,
        })?;
        info!(program = %program.display(), port, pid = ?child.id(), "spawned worker");

        Ok(SpawnedWorker {
            params: ConnectionParams::tcp("localhost", port),
            process: Some(WorkerProcess::new(child)),
        })
    }
}

fn reserve_port() -> std::io::Result<u16> {
    let listener = StdTcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
