//! Proxy Switcher - enables the system proxy on the trusted wired network.
//!
//! Each evaluation looks at every active interface:
//! - wireless with an address outside the internal range: proxy off
//! - wired with an internal address: proxy on
//! - anything else: proxy off
//!
//! A new target is applied only after two consecutive matching checks.

use std::panic;
use std::path::{Path, PathBuf};
use std::process::{ExitCode, Stdio};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use switcher_app::autostart::Autostart;
use switcher_app::cli::{Args, Command};
use switcher_app::config::{AppConfig, DEFAULT_LOG_LEVEL};
use switcher_app::instance::{
    self, stop_running, watch_release, PidFile, StopOutcome, RELEASE_CHECK_INTERVAL,
    STOP_GRACE_PERIOD,
};
use switcher_app::logging::init_logging;
use switcher_app::paths;
use switcher_app::signals::spawn_signal_listener;
use switcher_app::uninstall::{perform_uninstall, UninstallOptions, UninstallPaths, UninstallResult};
use switcher_core::{
    resolve_target, EnvironmentEvaluator, InterfaceObservation, Orchestrator, OrchestratorConfig,
    ProxyState,
};
use switcher_system::{
    system_manager, ProxyAddress, SystemAdapters, SystemInterfaces, SystemProcesses, SystemProxy,
};

/// Run the control loop until a stop request arrives.
async fn run_loop(config: &AppConfig, config_path: &Path) -> anyhow::Result<()> {
    config.validate(config_path)?;
    check_address(&config.proxy_address)?;

    // Set up panic hook to log panics to file
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("PANIC: {}", panic_info);
        default_hook(panic_info);
    }));

    let pid_file = match paths::pid_file() {
        Some(path) => Some(PidFile::acquire(&path, &SystemProcesses::new())?),
        None => {
            tracing::warn!("No data directory, uninstall cannot stop this instance");
            None
        }
    };

    tracing::info!(
        "Watching network every {}s, proxy {}",
        config.poll_interval_secs,
        config.proxy_address
    );

    let manager = system_manager(config.proxy_address.clone());
    let (orchestrator, handle) = Orchestrator::new(
        manager,
        OrchestratorConfig {
            poll_interval: config.poll_interval(),
        },
    );
    let release = pid_file
        .as_ref()
        .map(|pid_file| watch_release(pid_file, handle.clone(), RELEASE_CHECK_INTERVAL));
    let signals = spawn_signal_listener(handle);

    let status = orchestrator.run().await;
    signals.abort();
    if let Some(release) = release {
        release.abort();
    }

    tracing::info!(
        "Switcher stopped after {} tick(s), {} switch(es)",
        status.ticks,
        status.commits
    );
    Ok(())
}

/// Rejects addresses the platform backend cannot write.
fn check_address(address: &str) -> anyhow::Result<()> {
    match ProxyAddress::parse(address) {
        Ok(_) => Ok(()),
        // The registry accepts per-scheme lists such as `http=host:80;https=host:443`.
        Err(e) if cfg!(windows) => {
            tracing::warn!("Proxy address is not host:port, writing it as-is: {}", e);
            Ok(())
        }
        Err(e) => Err(e).context("invalid proxy address"),
    }
}

/// Register the background service and optionally start it now.
fn install(
    config: &AppConfig,
    config_path: &Path,
    explicit_config: bool,
    force: bool,
    no_start: bool,
) -> anyhow::Result<()> {
    config.validate(config_path)?;
    check_address(&config.proxy_address)?;

    let autostart = Autostart::new(explicit_config.then_some(config_path))
        .context("failed to prepare autostart entry")?;
    if autostart.is_installed() && !force {
        return Err(switcher_app::AutostartError::AlreadyInstalled.into());
    }

    config
        .save(config_path)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    tracing::info!("Configuration saved to {}", config_path.display());

    autostart.install(force)?;
    tracing::info!("Autostart registered: {}", autostart.command());
    println!("Installed: {}", autostart.command());

    if !no_start {
        match stop_instance() {
            Ok(StopOutcome::NotRunning) => {}
            Ok(outcome) => tracing::info!("Previous instance stopped: {:?}", outcome),
            Err(e) => return Err(e).context("failed to stop the running service"),
        }

        let child = std::process::Command::new(autostart.executable())
            .args(autostart.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to start the service")?;
        tracing::info!("Service started (pid {})", child.id());
        println!("Service started (pid {})", child.id());
    }

    Ok(())
}

/// Stop the loop recorded in the default pid file, if any.
fn stop_instance() -> instance::Result<StopOutcome> {
    stop_pid_file(paths::pid_file())
}

fn stop_pid_file(path: Option<PathBuf>) -> instance::Result<StopOutcome> {
    match path {
        Some(path) => stop_running(&path, &SystemProcesses::new(), STOP_GRACE_PERIOD),
        None => Ok(StopOutcome::NotRunning),
    }
}

/// Reset the proxy and remove every trace of the switcher.
fn uninstall(explicit_config: Option<&Path>, keep_config: bool) -> ExitCode {
    let paths = UninstallPaths::default_paths(explicit_config.map(Path::to_path_buf));
    let options = UninstallOptions { keep_config };

    let result = perform_uninstall(
        &SystemProxy::new(),
        || stop_pid_file(paths.pid_file.clone()),
        || Autostart::new(explicit_config).and_then(|autostart| autostart.uninstall()),
        &paths,
        &options,
    );

    match &result {
        UninstallResult::Success => println!("Uninstalled."),
        UninstallResult::PartialSuccess { warnings } => {
            println!("Uninstalled with warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
        UninstallResult::Failed { error, warnings } => {
            for warning in warnings {
                eprintln!("warning: {}", warning);
            }
            eprintln!("error: {}", error);
        }
    }

    if result.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[derive(Serialize)]
struct CheckReport<'a> {
    interfaces: &'a [InterfaceObservation],
    target: ProxyState,
}

/// Evaluate the network once and print what the loop would decide.
fn check(json: bool) -> anyhow::Result<()> {
    let evaluator = EnvironmentEvaluator::new(SystemAdapters::new(), SystemInterfaces::new());
    let observations = evaluator.observe().context("failed to observe network")?;
    let target = resolve_target(&observations);

    if json {
        let report = CheckReport {
            interfaces: &observations,
            target,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{:<24} {:<9} {:<9} {:<9}",
        "INTERFACE", "WIRELESS", "INTERNAL", "EXTERNAL"
    );
    for obs in &observations {
        println!(
            "{:<24} {:<9} {:<9} {:<9}",
            obs.name, obs.is_wireless, obs.has_internal_ipv4, obs.has_external_ipv4_wireless
        );
    }
    println!();
    println!("Target proxy state: {}", target);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Uninstall must work even when the configuration no longer parses.
    if let Command::Uninstall { keep_config } = args.command {
        let level = args
            .overrides()
            .log_level
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let _log_guard = init_logging(&level, args.log_target());
        tracing::debug!("Args: {:?}", args);
        return Ok(uninstall(args.config.as_deref(), keep_config));
    }

    let config_path = AppConfig::resolve_path(args.config.as_deref())?;
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?
        .with_overrides(&args.overrides());

    // Initialize logging (keep guard alive for the duration of the program)
    let _log_guard = init_logging(&config.log_level, args.log_target());

    tracing::debug!("Args: {:?}", args);

    match args.command {
        Command::Run | Command::Service => {
            tracing::info!("Starting Proxy Switcher ({:?} mode)...", args.command);
            run_loop(&config, &config_path).await?;
        }
        Command::Install { force, no_start } => {
            install(&config, &config_path, args.config.is_some(), force, no_start)?;
        }
        Command::Uninstall { .. } => {}
        Command::Check { json } => check(json)?,
    }

    Ok(ExitCode::SUCCESS)
}
