//! OS signal forwarding.

use std::future::Future;

use switcher_core::orchestrator::{ControlHandle, StopReason};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawns a task that turns the first termination signal into a stop request.
pub fn spawn_signal_listener(handle: ControlHandle) -> JoinHandle<()> {
    forward_stop(handle, wait_for_signal())
}

/// Spawns a task that sends the reason `signal` resolves to as a stop request.
pub fn forward_stop<F>(handle: ControlHandle, signal: F) -> JoinHandle<()>
where
    F: Future<Output = StopReason> + Send + 'static,
{
    tokio::spawn(async move {
        let reason = signal.await;
        info!("Received {:?}, stopping", reason);

        if let Err(e) = handle.stop(reason).await {
            debug!("Stop request not delivered: {}", e);
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> StopReason {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        reason = wait_for_ctrl_c() => reason,
        _ = terminate.recv() => StopReason::Terminate,
    }
}

#[cfg(windows)]
async fn wait_for_signal() -> StopReason {
    use tokio::signal::windows;

    let (mut close, mut shutdown) = match (windows::ctrl_close(), windows::ctrl_shutdown()) {
        (Ok(close), Ok(shutdown)) => (close, shutdown),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to install console handlers: {}", e);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        reason = wait_for_ctrl_c() => reason,
        _ = close.recv() => StopReason::Terminate,
        _ = shutdown.recv() => StopReason::ServiceStop,
    }
}

#[cfg(not(any(unix, windows)))]
async fn wait_for_signal() -> StopReason {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> StopReason {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        // Nothing left to wait on; park until the loop ends another way.
        std::future::pending::<()>().await;
    }
    StopReason::Interrupt
}
