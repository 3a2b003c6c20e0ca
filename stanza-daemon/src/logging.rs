//! Logging for stanza-daemon.
//!
//! Every [`StreamingServer`](crate::server::StreamingServer) owns a
//! [`ServerLogger`]: a `tracing` dispatcher built from the `[logging]`
//! section of `StanzaConfig`. Events go either to stderr or to a
//! [`LogFile`], and are written synchronously, so a notice is on disk by
//! the time the logging call returns.
//!
//! # Log rotation
//!
//! External tools rotate the file by renaming it and then sending
//! `SIGUSR1`. The server answers with [`ServerLogger::reopen_log_file`],
//! which opens the configured path again (creating a fresh file), swaps
//! the handle and writes a confirmation notice into the new file.
//!
//! # Formats
//!
//! * `"text"` - single-line human-readable output (default)
//! * `"json"` - machine-parseable JSON lines
//! * `"pretty"` - multi-line colored output for development

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use tracing::Dispatch;
use tracing::dispatcher::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use stanza_core::config::LoggingConfig;
use stanza_core::metrics as m;

/// Target used for server notices.
pub const LOG_TARGET: &str = "stanza";

/// Notice written into the new file after a successful re-open.
pub const REOPENED_MESSAGE: &str = "File log re-opened";

/// Notice written when a re-open is requested but output is not a file.
pub const REOPEN_IGNORED_MESSAGE: &str = "File log re-open ignored, not a file logger";

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedFmtLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// A log file that can be re-opened in place.
///
/// The handle is guarded by a mutex; each formatted event is written
/// under a single lock acquisition, so lines never interleave with a
/// concurrent [`reopen`](LogFile::reopen).
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl LogFile {
    /// Open (or create) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// The configured path. After a rename this may differ from the
    /// file the current handle points at, until the next re-open.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the current handle and open the configured path again.
    ///
    /// The new handle is opened before the old one is released; if the
    /// open fails the current handle stays in place.
    pub fn reopen(&self) -> io::Result<()> {
        let fresh = open_append(&self.path)?;
        let mut current = self.lock();
        current.flush()?;
        let previous = std::mem::replace(&mut *current, fresh);
        drop(previous);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, File> {
        self.file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Write for &LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.lock().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }
}

/// Open a log file in append mode, creating it with mode 0640 on Unix.
fn open_append(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o640);
    }
    options.open(path)
}

/// Destination for formatted log events.
#[derive(Debug, Clone)]
pub enum LogWriter {
    /// Standard error.
    Stderr,
    /// A re-openable log file.
    File(Arc<LogFile>),
}

/// Per-event writer handed out by [`LogWriter`].
pub enum LogSink<'a> {
    Stderr(io::Stderr),
    File(&'a LogFile),
}

impl Write for LogSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stderr(stderr) => stderr.write(buf),
            Self::File(file) => file.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Stderr(stderr) => stderr.write_all(buf),
            Self::File(file) => file.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stderr(stderr) => stderr.flush(),
            Self::File(file) => file.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogSink<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match self {
            Self::Stderr => LogSink::Stderr(io::stderr()),
            Self::File(file) => LogSink::File(file.as_ref()),
        }
    }
}

/// Result of a log re-open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReopenOutcome {
    /// The file was re-opened and the confirmation notice written.
    Reopened,
    /// Output goes to stderr; nothing to re-open.
    NotFileLogger,
    /// Logging is disabled; the request was dropped silently.
    Disabled,
}

/// The logger owned by a running server.
pub struct ServerLogger {
    dispatch: Dispatch,
    file: Option<Arc<LogFile>>,
    enabled: bool,
}

impl ServerLogger {
    /// Build a logger from the `[logging]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened or the format
    /// is unknown.
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let file = if config.is_file_logger() {
            let file = LogFile::open(&config.file)
                .with_context(|| format!("failed to open log file {}", config.file))?;
            Some(Arc::new(file))
        } else {
            None
        };

        let writer = match &file {
            Some(file) => LogWriter::File(Arc::clone(file)),
            None => LogWriter::Stderr,
        };
        let ansi = file.is_none() && config.format == "pretty";
        let fmt_layer = build_fmt_layer(config, writer, ansi)?;

        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(&config.level))
            .with(fmt_layer);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            file,
            enabled: true,
        })
    }

    /// A stderr logger for process startup, before any server exists.
    ///
    /// Uses the level, format and timestamps of `config` but never opens
    /// `config.file`; the server's own logger owns that.
    ///
    /// # Errors
    ///
    /// Returns an error if the format is unknown.
    pub fn bootstrap(config: &LoggingConfig) -> Result<Self> {
        Self::from_config(&LoggingConfig {
            file: String::new(),
            ..config.clone()
        })
    }

    /// A logger that discards everything.
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
            file: None,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The server's dispatcher. Background tasks run under it.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Path of the log file, if this is a file logger.
    pub fn log_file(&self) -> Option<&Path> {
        self.file.as_deref().map(LogFile::path)
    }

    /// Run `f` with this logger as the current dispatcher.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Make this logger the current thread's dispatcher until the guard
    /// is dropped. Unlike [`in_scope`](Self::in_scope) it stays active
    /// across `.await` points of the calling task.
    pub fn set_default(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }

    /// Log an operational notice (INFO level).
    pub fn notice(&self, message: impl Display) {
        self.in_scope(|| tracing::info!(target: LOG_TARGET, "{}", message));
    }

    pub fn warn(&self, message: impl Display) {
        self.in_scope(|| tracing::warn!(target: LOG_TARGET, "{}", message));
    }

    pub fn error(&self, message: impl Display) {
        self.in_scope(|| tracing::error!(target: LOG_TARGET, "{}", message));
    }

    pub fn debug(&self, message: impl Display) {
        self.in_scope(|| tracing::debug!(target: LOG_TARGET, "{}", message));
    }

    pub fn trace(&self, message: impl Display) {
        self.in_scope(|| tracing::trace!(target: LOG_TARGET, "{}", message));
    }

    /// Close and re-open the log file at its configured path.
    ///
    /// Writes [`REOPENED_MESSAGE`] into the new file on success. On a
    /// stderr logger this only logs [`REOPEN_IGNORED_MESSAGE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be opened again. The previous
    /// handle stays active and the failure is logged to it.
    pub fn reopen_log_file(&self) -> Result<ReopenOutcome> {
        if !self.enabled {
            return Ok(ReopenOutcome::Disabled);
        }

        let Some(file) = &self.file else {
            self.notice(REOPEN_IGNORED_MESSAGE);
            return Ok(ReopenOutcome::NotFileLogger);
        };

        match file.reopen() {
            Ok(()) => {
                metrics::counter!(m::LOG_REOPENS_TOTAL, m::LABEL_RESULT => "success").increment(1);
                self.notice(REOPENED_MESSAGE);
                Ok(ReopenOutcome::Reopened)
            }
            Err(e) => {
                metrics::counter!(m::LOG_REOPENS_TOTAL, m::LABEL_RESULT => "failure").increment(1);
                self.error(format!(
                    "Unable to re-open log file {}: {}",
                    file.path().display(),
                    e
                ));
                Err(anyhow::Error::new(e)
                    .context(format!("failed to re-open log file {}", file.path().display())))
            }
        }
    }

    /// Make this logger the process-wide default dispatcher.
    ///
    /// Must be called at most once per process.
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| anyhow::anyhow!("failed to install global tracing dispatcher: {}", e))
    }
}

impl std::fmt::Debug for ServerLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLogger")
            .field("enabled", &self.enabled)
            .field("log_file", &self.log_file())
            .finish()
    }
}

fn build_fmt_layer(config: &LoggingConfig, writer: LogWriter, ansi: bool) -> Result<BoxedFmtLayer> {
    let base = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);

    let layer: BoxedFmtLayer = match (config.format.as_str(), config.timestamps) {
        ("text", true) => base.boxed(),
        ("text", false) => base.without_time().boxed(),
        ("json", true) => base.json().boxed(),
        ("json", false) => base.json().without_time().boxed(),
        ("pretty", true) => base.pretty().boxed(),
        ("pretty", false) => base.pretty().without_time().boxed(),
        (other, _) => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'text', 'json' or 'pretty'",
                other
            ));
        }
    };

    Ok(layer)
}
