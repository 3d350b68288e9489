//! Operator-requested termination.
//!
//! The controller wraps a [`CancellationToken`] handed to the producer and
//! every worker. Triggering it stops the feed, closes the queue and makes
//! workers exit after the comparison they are running. Records still
//! buffered in the queue are abandoned.

use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why the run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Triggered programmatically.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("interrupt"),
            Self::Terminate => f.write_str("terminate"),
            Self::Requested => f.write_str("requested"),
        }
    }
}

#[derive(Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by the pipeline.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels the run. Only the first reason is kept.
    pub fn trigger(&self, reason: ShutdownReason) {
        if self.reason.set(reason).is_ok() {
            warn!(%reason, "shutdown requested, stopping workers");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// Spawns a task that triggers the controller on the first termination
    /// signal. Abort the handle once the run is over.
    pub fn listen(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = controller.token.cancelled() => {}
                signal = wait_for_signal() => match signal {
                    Ok(reason) => controller.trigger(reason),
                    Err(e) => warn!(error = %e, "unable to listen for shutdown signals"),
                },
            }
            debug!("shutdown listener stopped");
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<ShutdownReason> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| ShutdownReason::Interrupt),
        _ = terminate.recv() => Ok(ShutdownReason::Terminate),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<ShutdownReason> {
    tokio::signal::ctrl_c().await.map(|()| ShutdownReason::Interrupt)
}
