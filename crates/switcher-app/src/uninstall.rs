//! Clean uninstall.
//!
//! Removes everything the switcher leaves behind:
//! - the running loop (asked to stop through its pid file)
//! - the system proxy setting (reset to off)
//! - the autostart registration
//! - the log directory
//! - the configuration file, unless kept
//!
//! Only a failure to delete the logs fails the uninstall; the other steps
//! degrade to warnings.

use std::fs;
use std::path::{Path, PathBuf};

use switcher_core::effector::ProxyEffector;
use thiserror::Error;
use tracing::{info, warn};

use crate::autostart::AutostartError;
use crate::instance::{self, StopOutcome};
use crate::paths;

/// Errors that can occur during uninstall.
#[derive(Debug, Error)]
pub enum UninstallError {
    /// Failed to delete a file or directory.
    #[error("failed to delete {path}: {reason}")]
    DeleteFailed { path: String, reason: String },
}

/// Result type for uninstall operations.
pub type Result<T> = std::result::Result<T, UninstallError>;

/// Result of an uninstall operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallResult {
    /// Uninstall completed successfully.
    Success,
    /// Residue removed, but some best-effort steps failed.
    PartialSuccess {
        /// Warnings from the best-effort steps.
        warnings: Vec<String>,
    },
    /// Log cleanup failed.
    Failed {
        /// The log cleanup error.
        error: String,
        /// Warnings from the best-effort steps.
        warnings: Vec<String>,
    },
}

impl UninstallResult {
    /// Whether the process should exit with a failure status.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Options for uninstall.
#[derive(Debug, Clone, Default)]
pub struct UninstallOptions {
    /// Leave the configuration file in place.
    pub keep_config: bool,
}

/// Paths that will be deleted during uninstall.
#[derive(Debug, Clone, Default)]
pub struct UninstallPaths {
    /// Rolling log directory.
    pub logs_dir: Option<PathBuf>,
    /// Configuration file.
    pub config_file: Option<PathBuf>,
    /// Pid file of the running loop.
    pub pid_file: Option<PathBuf>,
}

impl UninstallPaths {
    /// Paths of the default installation, with an optional explicit config file.
    pub fn default_paths(config_file: Option<PathBuf>) -> Self {
        Self {
            logs_dir: paths::logs_dir(),
            config_file: config_file.or_else(paths::config_path),
            pid_file: paths::pid_file(),
        }
    }
}

/// Runs every uninstall step.
///
/// `stop_service` brings down a running loop before anything is removed, so
/// it cannot re-apply the proxy afterwards. `remove_autostart` unregisters
/// the background service.
pub fn perform_uninstall<E, S, F>(
    effector: &E,
    stop_service: S,
    remove_autostart: F,
    paths: &UninstallPaths,
    options: &UninstallOptions,
) -> UninstallResult
where
    E: ProxyEffector,
    S: FnOnce() -> instance::Result<StopOutcome>,
    F: FnOnce() -> std::result::Result<(), AutostartError>,
{
    let mut warnings = Vec::new();

    match stop_service() {
        Ok(StopOutcome::NotRunning) => {}
        Ok(outcome) => info!("Running instance stopped: {:?}", outcome),
        Err(e) => {
            warn!("Failed to stop running instance: {}", e);
            warnings.push(format!("stop service: {}", e));
        }
    }

    match effector.clear() {
        Ok(()) => info!("System proxy reset"),
        Err(e) => {
            warn!("Failed to reset system proxy: {}", e);
            warnings.push(format!("proxy reset: {}", e));
        }
    }

    match remove_autostart() {
        Ok(()) => info!("Autostart entry removed"),
        Err(e) => {
            warn!("Failed to remove autostart entry: {}", e);
            warnings.push(format!("autostart: {}", e));
        }
    }

    if !options.keep_config {
        if let Some(config) = &paths.config_file {
            if let Err(e) = delete_path(config) {
                warn!("{}", e);
                warnings.push(e.to_string());
            }
        }
    }

    if let Some(logs) = &paths.logs_dir {
        if let Err(e) = delete_path(logs) {
            return UninstallResult::Failed {
                error: e.to_string(),
                warnings,
            };
        }
        info!("Removed log directory {}", logs.display());
    }

    if warnings.is_empty() {
        UninstallResult::Success
    } else {
        UninstallResult::PartialSuccess { warnings }
    }
}

/// Delete a specific path (file or directory). Missing paths are fine.
pub fn delete_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|e| UninstallError::DeleteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use crate::instance::InstanceError;
    use switcher_core::effector::{EffectorError, Result as EffectorResult};
    use switcher_core::state::CommitDecision;

    #[derive(Default)]
    struct FakeProxy {
        fail: bool,
        cleared: Cell<bool>,
    }

    impl ProxyEffector for FakeProxy {
        fn apply(&self, _decision: &CommitDecision) -> EffectorResult<()> {
            Ok(())
        }

        fn clear(&self) -> EffectorResult<()> {
            self.cleared.set(true);
            if self.fail {
                Err(EffectorError::PermissionDenied("registry".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn not_running() -> instance::Result<StopOutcome> {
        Ok(StopOutcome::NotRunning)
    }

    fn fixture() -> (tempfile::TempDir, UninstallPaths) {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(logs.join("proxy-switcher.2026-01-01.log"), "line\n").unwrap();
        let config = dir.path().join("config.json");
        fs::write(&config, "{}").unwrap();

        let paths = UninstallPaths {
            logs_dir: Some(logs),
            config_file: Some(config),
            pid_file: None,
        };
        (dir, paths)
    }

    #[test]
    fn test_full_uninstall() {
        let (_dir, paths) = fixture();
        let proxy = FakeProxy::default();

        let result = perform_uninstall(
            &proxy,
            not_running,
            || Ok(()),
            &paths,
            &UninstallOptions::default(),
        );

        assert_eq!(result, UninstallResult::Success);
        assert!(proxy.cleared.get());
        assert!(!paths.logs_dir.as_ref().unwrap().exists());
        assert!(!paths.config_file.as_ref().unwrap().exists());
    }

    #[test]
    fn test_keep_config() {
        let (_dir, paths) = fixture();
        let options = UninstallOptions { keep_config: true };

        let result =
            perform_uninstall(&FakeProxy::default(), not_running, || Ok(()), &paths, &options);

        assert_eq!(result, UninstallResult::Success);
        assert!(paths.config_file.as_ref().unwrap().exists());
    }

    #[test]
    fn test_best_effort_steps_become_warnings() {
        let (_dir, paths) = fixture();
        let proxy = FakeProxy {
            fail: true,
            ..Default::default()
        };

        let result = perform_uninstall(
            &proxy,
            || Err(InstanceError::StillRunning(4242)),
            || Err(AutostartError::DisableFailed("denied".to_string())),
            &paths,
            &UninstallOptions::default(),
        );

        match &result {
            UninstallResult::PartialSuccess { warnings } => assert_eq!(warnings.len(), 3),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!result.is_failure());
        // Logs are still removed.
        assert!(!paths.logs_dir.as_ref().unwrap().exists());
    }

    #[test]
    fn test_missing_paths_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UninstallPaths {
            logs_dir: Some(dir.path().join("never-created")),
            config_file: Some(dir.path().join("config.json")),
            pid_file: None,
        };

        let result = perform_uninstall(
            &FakeProxy::default(),
            not_running,
            || Ok(()),
            &paths,
            &UninstallOptions::default(),
        );
        assert_eq!(result, UninstallResult::Success);
    }

    #[test]
    fn test_delete_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        delete_path(&file).unwrap();
        delete_path(&dir.path().join("a")).unwrap();
        delete_path(&dir.path().join("missing")).unwrap();

        assert!(!file.exists());
        assert!(!nested.exists());
    }

    #[test]
    fn test_stops_service_before_cleanup() {
        let (_dir, paths) = fixture();
        let logs = paths.logs_dir.clone().unwrap();
        let order = std::cell::RefCell::new(Vec::new());

        let result = perform_uninstall(
            &FakeProxy::default(),
            || {
                // The service still owns its logs while it runs.
                assert!(logs.exists());
                order.borrow_mut().push("stop");
                Ok(StopOutcome::Stopped(4242))
            },
            || {
                order.borrow_mut().push("autostart");
                Ok(())
            },
            &paths,
            &UninstallOptions::default(),
        );

        assert_eq!(result, UninstallResult::Success);
        assert_eq!(*order.borrow(), vec!["stop", "autostart"]);
    }

    #[test]
    fn test_unparsable_config_is_removed() {
        let (_dir, paths) = fixture();
        let config = paths.config_file.clone().unwrap();
        fs::write(&config, "{ broken").unwrap();
        assert!(crate::config::AppConfig::load(&config).is_err());

        let result = perform_uninstall(
            &FakeProxy::default(),
            not_running,
            || Ok(()),
            &paths,
            &UninstallOptions::default(),
        );

        assert_eq!(result, UninstallResult::Success);
        assert!(!config.exists());
    }
}
