//! Streaming server lifecycle -- startup, state reporting, and shutdown.
//!
//! The [`StreamingServer`] is the process shell of `stanza-daemon`. It
//! owns the server logger, the PID file, OS signal handling and the
//! reported [`ServerState`].
//!
//! # Startup Order
//!
//! 1. Validate configuration
//! 2. Build the server logger (opens the log file)
//! 3. Write the PID file
//! 4. Install signal handlers and spawn background tasks
//! 5. Publish the running state
//!
//! # Shutdown
//!
//! Triggered by [`StreamingServer::shutdown`], by `SIGINT`/`SIGTERM`, or
//! by dropping the last `StreamingServer` handle. The state moves to
//! `Shutdown`, background tasks exit, and the PID file is removed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use stanza_core::config::StanzaConfig;
use stanza_core::metrics as m;
use stanza_core::types::ServerState;

use crate::logging::ServerLogger;

/// Name used in the startup banner.
pub const SERVER_NAME: &str = "stanza-daemon";

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// A running streaming server.
///
/// Cloning is cheap; all clones refer to the same server. Background
/// tasks only hold a [`WeakServer`], so dropping the last clone shuts the
/// server down and releases its log file, signal streams and PID file.
#[derive(Clone)]
pub struct StreamingServer {
    inner: Arc<Inner>,
}

/// Non-owning handle held by background tasks.
#[derive(Clone)]
pub struct WeakServer {
    inner: Weak<Inner>,
}

impl WeakServer {
    /// The server, unless every `StreamingServer` handle is gone.
    pub fn upgrade(&self) -> Option<StreamingServer> {
        self.inner.upgrade().map(|inner| StreamingServer { inner })
    }
}

struct Inner {
    /// Validated configuration.
    config: StanzaConfig,
    /// Configured or generated server id.
    server_id: String,
    /// Server log (file or stderr).
    logger: ServerLogger,
    /// Current state; receivers observe shutdown through it.
    state_tx: watch::Sender<ServerState>,
    /// Server start time (for uptime reporting).
    start_time: Instant,
    /// PID file written at startup, removed at shutdown.
    pid_file: Option<PathBuf>,
    /// Background tasks joined by `wait_for_shutdown`.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Point-in-time description of a server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub server_id: String,
    pub cluster_id: String,
    pub state: ServerState,
    pub uptime_secs: u64,
    pub log_file: Option<String>,
    pub handles_signals: bool,
    pub version: &'static str,
}

impl StreamingServer {
    /// Validate `config`, start the server and return it running.
    ///
    /// Signal handlers (when `general.handle_signals` is set) are
    /// installed before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The log file cannot be opened
    /// - The PID file exists or cannot be written
    /// - Signal handlers cannot be installed
    pub async fn run(config: StanzaConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let logger = ServerLogger::from_config(&config.logging)?;

        let server_id = if config.general.server_id.is_empty() {
            uuid::Uuid::new_v4().simple().to_string()
        } else {
            config.general.server_id.clone()
        };

        let pid_file = if config.general.pid_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&config.general.pid_file))
        };
        if let Some(path) = &pid_file {
            logger.in_scope(|| write_pid_file(path))?;
        }

        let (state_tx, _) = watch::channel(ServerState::for_config(&config.general));

        let server = Self {
            inner: Arc::new(Inner {
                config,
                server_id,
                logger,
                state_tx,
                start_time: Instant::now(),
                pid_file,
                tasks: Mutex::new(Vec::new()),
            }),
        };

        server.log_banner();

        if let Err(e) = server.start_background_tasks() {
            server.logger().error(format!("Unable to start server: {e}"));
            server.shutdown();
            return Err(e);
        }

        server.logger().notice(format!(
            "Streaming Server is ready (state: {})",
            server.state()
        ));
        Ok(server)
    }

    fn log_banner(&self) {
        let log = self.logger();
        log.notice(format!(
            "Starting {}[{}] version {}",
            SERVER_NAME,
            self.cluster_id(),
            env!("CARGO_PKG_VERSION")
        ));
        log.notice(format!("ServerID: {}", self.server_id()));
        log.notice(format!("Process ID: {}", std::process::id()));
        if let Some(path) = log.log_file() {
            log.debug(format!("Logging to file {}", path.display()));
        }
    }

    fn start_background_tasks(&self) -> Result<()> {
        let mut tasks = Vec::new();

        if self.inner.config.general.handle_signals {
            #[cfg(unix)]
            {
                let handler = crate::signals::SignalHandler::install()?;
                tasks.push(crate::signals::spawn_signal_task(handler, self));
                self.logger().debug("OS signal handling enabled");
            }
            #[cfg(not(unix))]
            {
                self.logger()
                    .warn("signal handling requested but not supported on this platform");
            }
        }

        if self.inner.config.metrics.enabled {
            record_build_info();
            tasks.push(spawn_uptime_updater(
                self.inner.start_time,
                self.subscribe_state(),
            ));
        }

        self.inner
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(tasks);
        Ok(())
    }

    /// Current reported state.
    pub fn state(&self) -> ServerState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ServerState> {
        self.inner.state_tx.subscribe()
    }

    /// A handle that does not keep the server alive.
    pub fn downgrade(&self) -> WeakServer {
        WeakServer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The server's log.
    pub fn logger(&self) -> &ServerLogger {
        &self.inner.logger
    }

    pub fn server_id(&self) -> &str {
        &self.inner.server_id
    }

    pub fn cluster_id(&self) -> &str {
        &self.inner.config.general.cluster_id
    }

    pub fn config(&self) -> &StanzaConfig {
        &self.inner.config
    }

    pub fn uptime(&self) -> Duration {
        self.inner.start_time.elapsed()
    }

    /// Snapshot of the server's identity and state.
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            server_id: self.server_id().to_owned(),
            cluster_id: self.cluster_id().to_owned(),
            state: self.state(),
            uptime_secs: self.uptime().as_secs(),
            log_file: self
                .logger()
                .log_file()
                .map(|path| path.display().to_string()),
            handles_signals: self.inner.config.general.handle_signals,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Shut the server down. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Wait until the server is shut down and its background tasks have exited.
    pub async fn wait_for_shutdown(&self) {
        let mut state_rx = self.subscribe_state();
        let _ = state_rx.wait_for(|state| !state.is_running()).await;

        let tasks = std::mem::take(
            &mut *self
                .inner
                .tasks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for task in tasks {
            let _ = task.await;
        }
    }
}

impl Inner {
    fn shutdown(&self) {
        let changed = self.state_tx.send_if_modified(|state| {
            if state.is_running() {
                *state = ServerState::Shutdown;
                true
            } else {
                false
            }
        });
        if !changed {
            return;
        }

        self.logger.notice("Streaming Server is shutting down");
        if let Some(path) = &self.pid_file {
            self.logger.in_scope(|| remove_pid_file(path));
        }
        self.logger.notice("Streaming Server stopped");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for StreamingServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingServer")
            .field("server_id", &self.inner.server_id)
            .field("cluster_id", &self.inner.config.general.cluster_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Record this process as the running instance.
///
/// The file is created exclusively (`O_CREAT | O_EXCL`), which also refuses
/// a symlink left at `path`. A missing parent directory is created
/// owner-only.
///
/// # Errors
///
/// Returns an error naming the recorded PID when another instance already
/// holds the file, or the I/O error when it cannot be written.
fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let holder = fs::read_to_string(path).unwrap_or_default();
            let holder = match holder.trim() {
                "" => "unknown",
                pid => pid,
            };
            anyhow::bail!(
                "PID file {} already exists (held by PID {}); is another stanza-daemon running?",
                path.display(),
                holder
            );
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("failed to create PID file {}", path.display())));
        }
    };

    let pid = std::process::id();
    writeln!(file, "{pid}")?;

    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record the build info gauge (always 1, labelled with the version).
fn record_build_info() {
    metrics::gauge!(m::BUILD_INFO, m::LABEL_VERSION => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Spawn a background task that periodically updates the uptime gauge.
///
/// Exits once the server leaves its running state.
fn spawn_uptime_updater(
    start_time: Instant,
    mut state_rx: watch::Receiver<ServerState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    metrics::gauge!(m::SERVER_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs_f64().floor());
                }
                _ = async {
                    let _ = state_rx.wait_for(|state| !state.is_running()).await;
                } => {
                    break;
                }
            }
        }
    })
}
