//! Running instance tracking.
//!
//! A running loop owns a pid file under the data directory. Removing that
//! file asks the loop to stop: it notices on its next check and shuts down
//! through the control channel, which resets the proxy. A loop that does not
//! exit within the grace period is terminated.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use switcher_core::orchestrator::{ControlHandle, StopReason};
use switcher_system::ProcessControl;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How often a running loop checks that it still owns the pid file.
pub const RELEASE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// How long a stop request waits before terminating the process.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Errors that can occur while tracking the running instance.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// Another loop owns the pid file.
    #[error("another instance is already running (pid {0})")]
    AlreadyRunning(u32),

    /// The instance survived the stop request and termination.
    #[error("instance {0} did not stop")]
    StillRunning(u32),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for instance operations.
pub type Result<T> = std::result::Result<T, InstanceError>;

/// Reads the pid stored in `path`.
pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Ownership of the pid file; removes the file on drop if still owned.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
}

impl PidFile {
    /// Claims `path` for the current process.
    ///
    /// A stale file whose process is gone is taken over.
    pub fn acquire<P: ProcessControl>(path: &Path, processes: &P) -> Result<Self> {
        Self::acquire_as(path, std::process::id(), processes)
    }

    fn acquire_as<P: ProcessControl>(path: &Path, pid: u32, processes: &P) -> Result<Self> {
        if let Some(existing) = read_pid(path) {
            if existing != pid && processes.is_alive(existing) {
                return Err(InstanceError::AlreadyRunning(existing));
            }
            debug!("Taking over stale pid file (pid {})", existing);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, pid.to_string())?;

        Ok(Self {
            path: path.to_path_buf(),
            pid,
        })
    }

    /// Pid recorded in the file.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Path of the pid file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns false once the file was removed or claimed by someone else.
    pub fn is_held(&self) -> bool {
        read_pid(&self.path) == Some(self.pid)
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if self.is_held() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Spawns a task that stops the loop once the pid file is released.
pub fn watch_release(pid_file: &PidFile, handle: ControlHandle, period: Duration) -> JoinHandle<()> {
    let path = pid_file.path().to_path_buf();
    let pid = pid_file.pid();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if handle.is_closed() {
                return;
            }
            if read_pid(&path) != Some(pid) {
                info!("Stop requested through {}", path.display());
                if let Err(e) = handle.stop(StopReason::ServiceStop).await {
                    debug!("Stop request not delivered: {}", e);
                }
                return;
            }
        }
    })
}

/// How a running instance was brought down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No live instance was recorded.
    NotRunning,
    /// The instance exited on request.
    Stopped(u32),
    /// The instance had to be terminated.
    Terminated(u32),
}

/// Stops the instance recorded in `path`, waiting up to `grace` for a clean
/// exit before terminating it.
pub fn stop_running<P: ProcessControl>(path: &Path, processes: &P, grace: Duration) -> Result<StopOutcome> {
    let Some(pid) = read_pid(path) else {
        return Ok(StopOutcome::NotRunning);
    };

    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if pid == std::process::id() || !processes.is_alive(pid) {
        return Ok(StopOutcome::NotRunning);
    }

    info!("Waiting for running instance (pid {}) to stop", pid);
    if wait_for_exit(processes, pid, grace) {
        return Ok(StopOutcome::Stopped(pid));
    }

    warn!("Instance {} did not stop within {:?}, terminating", pid, grace);
    processes.terminate(pid)?;
    if wait_for_exit(processes, pid, grace) {
        Ok(StopOutcome::Terminated(pid))
    } else {
        Err(InstanceError::StillRunning(pid))
    }
}

fn wait_for_exit<P: ProcessControl>(processes: &P, pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !processes.is_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}
