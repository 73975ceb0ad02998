use logipost_core::ShutdownState;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Flips `shutdown` on the first Ctrl+C or SIGTERM. Loops observe the flag at
/// their next iteration boundary.
pub fn spawn_signal_listener(shutdown: ShutdownState) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Stop requested, finishing current step and saving progress");
        shutdown.start_shutdown();
    })
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
