//! OS signal handling (Unix only).
//!
//! | Signal            | Action                                  |
//! |-------------------|-----------------------------------------|
//! | `SIGINT`          | graceful shutdown                       |
//! | `SIGTERM`         | graceful shutdown                       |
//! | `SIGUSR1`         | re-open the log file (external rotation)|
//! | `SIGUSR2`, `SIGHUP` | ignored, server state unchanged       |
//!
//! Ignored signals are still registered. An unregistered `SIGUSR2` or
//! `SIGHUP` would fall back to the default disposition and terminate the
//! process.

use anyhow::Result;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;

use stanza_core::metrics as m;

use crate::server::StreamingServer;

/// What the server does when a signal arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Shut the server down.
    Shutdown,
    /// Re-open the log file.
    ReopenLog,
    /// Log at debug level and carry on.
    Ignore,
}

impl SignalAction {
    /// Classify a signal kind.
    pub fn for_kind(kind: SignalKind) -> Self {
        if kind == SignalKind::interrupt() || kind == SignalKind::terminate() {
            Self::Shutdown
        } else if kind == SignalKind::user_defined1() {
            Self::ReopenLog
        } else {
            Self::Ignore
        }
    }
}

/// A signal delivered to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedSignal {
    pub kind: SignalKind,
    pub name: &'static str,
    pub action: SignalAction,
}

impl ReceivedSignal {
    fn new(kind: SignalKind, name: &'static str) -> Self {
        Self {
            kind,
            name,
            action: SignalAction::for_kind(kind),
        }
    }
}

/// Registered signal streams for every signal the server listens to.
pub struct SignalHandler {
    sigint: Signal,
    sigterm: Signal,
    sigusr1: Signal,
    sigusr2: Signal,
    sighup: Signal,
}

impl SignalHandler {
    /// Register all signal streams.
    ///
    /// Registration is complete when this returns; a signal sent
    /// afterwards is queued for [`recv`](Self::recv).
    ///
    /// # Errors
    ///
    /// Returns an error naming the first signal that could not be registered.
    pub fn install() -> Result<Self> {
        Ok(Self {
            sigint: register(SignalKind::interrupt(), "SIGINT")?,
            sigterm: register(SignalKind::terminate(), "SIGTERM")?,
            sigusr1: register(SignalKind::user_defined1(), "SIGUSR1")?,
            sigusr2: register(SignalKind::user_defined2(), "SIGUSR2")?,
            sighup: register(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    /// Wait for the next signal of any registered kind.
    ///
    /// Returns `None` once the runtime's signal driver has gone away.
    pub async fn recv(&mut self) -> Option<ReceivedSignal> {
        let (kind, name) = tokio::select! {
            Some(()) = self.sigint.recv() => (SignalKind::interrupt(), "SIGINT"),
            Some(()) = self.sigterm.recv() => (SignalKind::terminate(), "SIGTERM"),
            Some(()) = self.sigusr1.recv() => (SignalKind::user_defined1(), "SIGUSR1"),
            Some(()) = self.sigusr2.recv() => (SignalKind::user_defined2(), "SIGUSR2"),
            Some(()) = self.sighup.recv() => (SignalKind::hangup(), "SIGHUP"),
            else => return None,
        };
        Some(ReceivedSignal::new(kind, name))
    }
}

fn register(kind: SignalKind, name: &str) -> Result<Signal> {
    signal(kind).map_err(|e| anyhow::anyhow!("failed to install {} handler: {}", name, e))
}

/// Spawn the signal dispatch loop for `server`.
///
/// The task runs under the server's dispatcher and exits once the server
/// reaches the `Shutdown` state, whether through a signal, through
/// [`StreamingServer::shutdown`] or by the last handle being dropped. It
/// does not keep the server alive.
pub fn spawn_signal_task(mut handler: SignalHandler, server: &StreamingServer) -> JoinHandle<()> {
    let dispatch = server.logger().dispatch().clone();
    let mut state_rx = server.subscribe_state();
    let server = server.downgrade();

    let task = async move {
        loop {
            tokio::select! {
                received = handler.recv() => {
                    let Some(received) = received else {
                        tracing::debug!("signal streams closed, exiting signal handler");
                        break;
                    };
                    metrics::counter!(m::SIGNALS_RECEIVED_TOTAL, m::LABEL_SIGNAL => received.name)
                        .increment(1);
                    let Some(server) = server.upgrade() else {
                        break;
                    };

                    match received.action {
                        SignalAction::Shutdown => {
                            tracing::info!(signal = received.name, "shutdown signal received");
                            server.shutdown();
                            break;
                        }
                        SignalAction::ReopenLog => {
                            tracing::debug!(signal = received.name, "re-opening log file");
                            if let Err(e) = server.logger().reopen_log_file() {
                                tracing::warn!(error = %e, "log file re-open failed");
                            }
                        }
                        SignalAction::Ignore => {
                            tracing::debug!(signal = received.name, "ignoring unhandled signal");
                        }
                    }
                }
                _ = async {
                    let _ = state_rx.wait_for(|state| !state.is_running()).await;
                } => {
                    tracing::debug!("signal handler shutting down");
                    break;
                }
            }
        }
    };

    tokio::spawn(task.with_subscriber(dispatch))
}
