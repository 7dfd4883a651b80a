//! Process liveness and termination by pid.
//!
//! - Unix: `kill -0` / `kill -TERM`
//! - Windows: `tasklist` / `taskkill /F`

use std::io;

#[cfg(any(unix, windows))]
use crate::command::run;

/// Inspects and terminates other processes.
pub trait ProcessControl {
    /// Returns true if a process with `pid` exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Asks the process to terminate.
    fn terminate(&self, pid: u32) -> io::Result<()>;
}

impl<T: ProcessControl + ?Sized> ProcessControl for &T {
    fn is_alive(&self, pid: u32) -> bool {
        (**self).is_alive(pid)
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        (**self).terminate(pid)
    }
}

/// Process control backed by the operating system.
#[derive(Debug, Clone, Default)]
pub struct SystemProcesses;

impl SystemProcesses {
    /// Creates a new controller.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl ProcessControl for SystemProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        run("kill", ["-0", pid.to_string().as_str()]).is_ok()
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        run("kill", ["-TERM", pid.to_string().as_str()]).map(|_| ())
    }
}

#[cfg(windows)]
impl ProcessControl for SystemProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        let filter = format!("PID eq {}", pid);
        run("tasklist", ["/FI", filter.as_str(), "/NH", "/FO", "CSV"])
            .map(|stdout| tasklist_contains(&stdout, pid))
            .unwrap_or(false)
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        // A windowless process has no console to receive Ctrl events.
        run("taskkill", ["/PID", pid.to_string().as_str(), "/F"]).map(|_| ())
    }
}

#[cfg(not(any(unix, windows)))]
impl ProcessControl for SystemProcesses {
    fn is_alive(&self, _pid: u32) -> bool {
        false
    }

    fn terminate(&self, _pid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process control not supported on this platform",
        ))
    }
}

/// Checks `tasklist /FO CSV /NH` output for a row with `pid`.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn tasklist_contains(stdout: &str, pid: u32) -> bool {
    let pid = pid.to_string();
    stdout.lines().any(|line| {
        line.split(',')
            .nth(1)
            .map(|field| field.trim().trim_matches('"') == pid)
            .unwrap_or(false)
    })
}
