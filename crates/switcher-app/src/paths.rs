//! Application directories.

use std::path::PathBuf;

use directories::ProjectDirs;

/// File name of the JSON configuration.
pub const CONFIG_FILE: &str = "config.json";

/// Prefix of rolling log files.
pub const LOG_FILE_PREFIX: &str = "proxy-switcher";

/// File name of the running instance's pid file.
pub const PID_FILE: &str = "proxy-switcher.pid";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "proxy-switcher", "ProxySwitcher")
}

/// Default configuration file path.
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Get the logs directory path.
pub fn logs_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

/// Pid file of the running loop, kept outside the logs directory.
pub fn pid_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join(PID_FILE))
}
