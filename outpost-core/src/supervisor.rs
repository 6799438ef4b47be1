//! Worker process supervision.
//!
//! Spawns worker processes for child domains and watches peer
//! processes for exit. The watch uses signal 0 probes rather than
//! wait(2) so it works for non-child pids, which is what a worker
//! needs to observe its parent.

use std::process::Stdio;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::config::{DomainOptions, RUNTIME_DIR_ENV};
use crate::error::LifecycleError;
use crate::types::{RendezvousName, WorkerPath};

/// A spawned worker process and its observed pid.
pub struct SpawnedWorker {
    child: Child,
    pid: u32,
}

impl SpawnedWorker {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn into_child(self) -> Child {
        self.child
    }
}

/// Spawn a worker process for a child domain.
///
/// The rendezvous name is the sole argument; the runtime directory
/// travels in the environment so both sides derive the same socket
/// path. The child is killed if its handle is dropped unawaited.
pub fn spawn_worker(
    worker: &WorkerPath,
    rendezvous: &RendezvousName,
    options: &DomainOptions,
) -> Result<SpawnedWorker, LifecycleError> {
    let child = Command::new(worker.as_path())
        .arg(rendezvous.to_string())
        .env(RUNTIME_DIR_ENV, &options.runtime_dir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| LifecycleError::SpawnFailed {
            path: worker.as_path().to_path_buf(),
            reason: e.to_string(),
        })?;

    let pid = child.id().ok_or_else(|| LifecycleError::SpawnFailed {
        path: worker.as_path().to_path_buf(),
        reason: "process exited before a pid could be observed".to_string(),
    })?;

    tracing::debug!(
        rendezvous = %rendezvous,
        pid = pid,
        worker = %worker,
        "Spawned worker process"
    );

    Ok(SpawnedWorker { child, pid })
}

/// Probe whether a process with the given pid is still running.
///
/// EPERM counts as alive: the process exists, we merely lack the
/// right to signal it.
pub fn process_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Resolve once the process with the given pid has exited.
pub async fn wait_for_process_exit(pid: u32, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !process_alive(pid) {
            tracing::debug!(pid = pid, "Watched process exited");
            return;
        }
    }
}
