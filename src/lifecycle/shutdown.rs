//! Signal handling for graceful shutdown

use tracing::{debug, warn};

/// Handles shutdown signals (SIGTERM, SIGINT)
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutdownSignal;

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self
    }

    /// Wait for a shutdown signal.
    ///
    /// A handler that cannot be installed never fires; the other one still can.
    pub async fn wait(self) {
        let interrupt = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => debug!("received SIGINT"),
                Err(e) => {
                    warn!(?e, "failed to listen for SIGINT");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    debug!("received SIGTERM");
                }
                Err(e) => {
                    warn!(?e, "failed to register SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = interrupt => {}
            _ = terminate => {}
        }
    }
}
