//! CLI argument definitions for stanza-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Flags take precedence over the config file and environment variables.

use std::path::PathBuf;

use clap::Parser;
use stanza_core::config::StanzaConfig;

/// Stanza streaming server daemon.
///
/// Runs the server process: rotatable file logging, OS signal handling
/// and PID file management.
#[derive(Parser, Debug)]
#[command(name = "stanza-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to stanza.toml configuration file.
    ///
    /// Without it the server runs on built-in defaults and environment
    /// overrides.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the cluster id.
    #[arg(long)]
    pub cluster_id: Option<String>,

    /// Start in clustered mode.
    #[arg(long)]
    pub clustered: bool,

    /// Log to this file instead of stderr.
    ///
    /// The file can be rotated externally and re-opened with SIGUSR1.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (text, json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override PID file path.
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Do not install OS signal handlers.
    #[arg(long)]
    pub no_signals: bool,

    /// Validate configuration file and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut StanzaConfig) {
        if let Some(cluster_id) = &self.cluster_id {
            config.general.cluster_id = cluster_id.clone();
        }
        if self.clustered {
            config.general.clustered = true;
        }
        if self.no_signals {
            config.general.handle_signals = false;
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.logging.file = log_file.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = DaemonCli::try_parse_from(["stanza-daemon"]).expect("should parse");

        assert!(cli.config.is_none());
        assert!(!cli.clustered);
        assert!(!cli.no_signals);
        assert!(!cli.validate);
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn test_overrides_replace_config_values() {
        // Given: CLI flags for every overridable field
        let cli = DaemonCli::try_parse_from([
            "stanza-daemon",
            "-c",
            "/etc/stanza/stanza.toml",
            "--cluster-id",
            "prod",
            "--clustered",
            "--log-file",
            "/var/log/stanza.log",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--pid-file",
            "/run/stanza.pid",
            "--no-signals",
        ])
        .expect("should parse");
        let mut config = StanzaConfig::default();

        // When: Applying overrides
        cli.apply_overrides(&mut config);

        // Then: Config reflects the flags
        assert_eq!(cli.config, Some(PathBuf::from("/etc/stanza/stanza.toml")));
        assert_eq!(config.general.cluster_id, "prod");
        assert!(config.general.clustered);
        assert!(!config.general.handle_signals);
        assert_eq!(config.general.pid_file, "/run/stanza.pid");
        assert_eq!(config.logging.file, "/var/log/stanza.log");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_absent_flags_keep_config_values() {
        let cli = DaemonCli::try_parse_from(["stanza-daemon"]).expect("should parse");
        let mut config = StanzaConfig::default();
        config.general.clustered = true;
        config.logging.file = "/tmp/keep.log".to_owned();

        cli.apply_overrides(&mut config);

        assert!(config.general.clustered);
        assert!(config.general.handle_signals);
        assert_eq!(config.logging.file, "/tmp/keep.log");
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(DaemonCli::try_parse_from(["stanza-daemon", "--bogus"]).is_err());
    }
}
