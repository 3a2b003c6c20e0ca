//! OS signal handling tests.
//!
//! Each test sends a real signal to the test process. Handlers are
//! installed by `StreamingServer::run` before any signal is sent, and
//! tests are serialized so only one server observes each signal.

#![cfg(unix)]

use std::fs;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serial_test::serial;
use stanza_core::config::StanzaConfig;
use stanza_core::types::ServerState;
use stanza_daemon::logging::REOPENED_MESSAGE;
use stanza_daemon::server::StreamingServer;
use tempfile::TempDir;

fn signal_config() -> StanzaConfig {
    let mut config = StanzaConfig::default();
    config.general.handle_signals = true;
    config.logging.enabled = false;
    config
}

fn send(signal: Signal) {
    kill(Pid::this(), signal).expect("should deliver signal to self");
}

#[tokio::test]
#[serial]
async fn test_sigusr2_is_ignored() {
    // Given: A running standalone server handling signals
    let server = StreamingServer::run(signal_config())
        .await
        .expect("server should start");

    // When: Sending a signal the server does not act on
    send(Signal::SIGUSR2);
    tokio::time::sleep(Duration::from_millis(250)).await;

    // Then: The process survives and the state is unchanged
    assert_eq!(server.state(), ServerState::Standalone);

    server.shutdown();
    server.wait_for_shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_sighup_is_ignored() {
    let mut config = signal_config();
    config.general.clustered = true;
    let server = StreamingServer::run(config)
        .await
        .expect("server should start");

    send(Signal::SIGHUP);
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(server.state(), ServerState::Clustered);

    server.shutdown();
    server.wait_for_shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_sigusr1_reopens_rotated_log_file() {
    // Given: A server logging to a file
    let dir = TempDir::new().expect("should create temp dir");
    let log_path = dir.path().join("stanza.log");
    let backup_path = dir.path().join("stanza.log.bak");

    let mut config = signal_config();
    config.logging.enabled = true;
    config.logging.file = log_path.display().to_string();
    let server = StreamingServer::run(config)
        .await
        .expect("server should start");

    // And: A notice already on disk
    server.logger().notice("This is a Notice");
    let before = fs::read_to_string(&log_path).expect("should read log file");
    assert!(before.contains("This is a Notice"), "got: {before}");

    // When: The file is rotated externally and SIGUSR1 is sent
    fs::rename(&log_path, &backup_path).expect("should rotate log file");
    send(Signal::SIGUSR1);
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Then: A new file exists at the original path with the re-open notice
    let reopened = fs::read_to_string(&log_path).expect("log file should be re-created");
    assert!(
        reopened.contains(REOPENED_MESSAGE),
        "expected re-open notice in new log file, got: {reopened}"
    );
    assert!(!reopened.contains("This is a Notice"), "got: {reopened}");

    // And: The rotated file keeps the earlier notice but not the re-open notice
    let rotated = fs::read_to_string(&backup_path).expect("rotated file should remain");
    assert!(rotated.contains("This is a Notice"), "got: {rotated}");
    assert!(!rotated.contains(REOPENED_MESSAGE), "got: {rotated}");

    // And: The server keeps running
    assert_eq!(server.state(), ServerState::Standalone);

    server.shutdown();
    server.wait_for_shutdown().await;

    let after = fs::read_to_string(&log_path).expect("log file should still exist");
    assert!(after.contains("Streaming Server is shutting down"), "got: {after}");
}

#[tokio::test]
#[serial]
async fn test_failed_reopen_keeps_server_running() {
    // Given: A file logger whose path becomes a directory after rotation
    let dir = TempDir::new().expect("should create temp dir");
    let log_path = dir.path().join("stanza.log");
    let backup_path = dir.path().join("stanza.log.bak");

    let mut config = signal_config();
    config.logging.enabled = true;
    config.logging.file = log_path.display().to_string();
    let server = StreamingServer::run(config)
        .await
        .expect("server should start");

    fs::rename(&log_path, &backup_path).expect("should rotate log file");
    fs::create_dir(&log_path).expect("should block the log path");

    // When: SIGUSR1 asks for a re-open that cannot succeed
    send(Signal::SIGUSR1);
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Then: The server keeps running and logs the failure to the old file
    assert_eq!(server.state(), ServerState::Standalone);
    let rotated = fs::read_to_string(&backup_path).expect("rotated file should remain");
    assert!(rotated.contains("Unable to re-open log file"), "got: {rotated}");
    assert!(!rotated.contains(REOPENED_MESSAGE), "got: {rotated}");

    server.shutdown();
    server.wait_for_shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_sigusr1_without_file_logger_keeps_running() {
    let server = StreamingServer::run(signal_config())
        .await
        .expect("server should start");

    send(Signal::SIGUSR1);
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(server.state(), ServerState::Standalone);

    server.shutdown();
    server.wait_for_shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_sigterm_shuts_down_and_removes_pid_file() {
    // Given: A server with a PID file
    let dir = TempDir::new().expect("should create temp dir");
    let pid_path = dir.path().join("stanza.pid");

    let mut config = signal_config();
    config.general.pid_file = pid_path.display().to_string();
    let server = StreamingServer::run(config)
        .await
        .expect("server should start");
    assert!(pid_path.exists(), "PID file should be written at startup");

    // When: Sending SIGTERM
    send(Signal::SIGTERM);

    // Then: The server shuts down on its own
    tokio::time::timeout(Duration::from_secs(2), server.wait_for_shutdown())
        .await
        .expect("server should shut down after SIGTERM");
    assert_eq!(server.state(), ServerState::Shutdown);
    assert!(!pid_path.exists(), "PID file should be removed on shutdown");
}

#[tokio::test]
#[serial]
async fn test_sigint_shuts_down() {
    let server = StreamingServer::run(signal_config())
        .await
        .expect("server should start");

    send(Signal::SIGINT);

    tokio::time::timeout(Duration::from_secs(2), server.wait_for_shutdown())
        .await
        .expect("server should shut down after SIGINT");
    assert_eq!(server.state(), ServerState::Shutdown);
}
