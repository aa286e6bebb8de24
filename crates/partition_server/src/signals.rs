//! Signal handling.
//!
//! SIGINT and SIGTERM (Ctrl+C on Windows) request a graceful shutdown. On
//! unix, SIGHUP requests a configuration reload.

use anyhow::Result;
use tokio::signal;
use tracing::info;

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerSignal {
    Shutdown,
    Reload,
}

/// Installs the process signal handlers. Must be called from within a tokio
/// runtime.
pub struct SignalListener {
    #[cfg(unix)]
    sigint: signal::unix::Signal,
    #[cfg(unix)]
    sigterm: signal::unix::Signal,
    #[cfg(unix)]
    sighup: signal::unix::Signal,
}

impl SignalListener {
    pub fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use signal::unix::{signal, SignalKind};

            Ok(Self {
                sigint: signal(SignalKind::interrupt())?,
                sigterm: signal(SignalKind::terminate())?,
                sighup: signal(SignalKind::hangup())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Waits for the next signal.
    pub async fn next(&mut self) -> Result<ServerSignal> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.sigint.recv() => {
                    info!("📡 Received SIGINT");
                    Ok(ServerSignal::Shutdown)
                }
                _ = self.sigterm.recv() => {
                    info!("📡 Received SIGTERM");
                    Ok(ServerSignal::Shutdown)
                }
                _ = self.sighup.recv() => {
                    info!("📡 Received SIGHUP");
                    Ok(ServerSignal::Reload)
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await?;
            info!("📡 Received Ctrl+C");
            Ok(ServerSignal::Shutdown)
        }
    }
}
