//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`
//! to expose signal, log re-open and uptime metrics.
//!
//! # Usage
//!
//! ```ignore
//! let config = MetricsConfig::default();
//! install_metrics_recorder(&config)?;
//! // Signal and log re-open counters are now exported
//! ```

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use stanza_core::config::MetricsConfig;

/// The only scrape path the built-in listener serves.
pub const SUPPORTED_ENDPOINT: &str = "/metrics";

/// Resolve the socket address the exporter binds to.
///
/// Warns when the address exposes the endpoint on all interfaces.
///
/// # Errors
///
/// - The endpoint is not [`SUPPORTED_ENDPOINT`]
/// - `listen_addr:port` is not a valid socket address
pub fn listen_socket_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != SUPPORTED_ENDPOINT {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '{}' is currently supported",
            config.endpoint,
            SUPPORTED_ENDPOINT
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    Ok(addr)
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// This function should be called once per process.
/// After calling this, the server's `metrics::counter!()` and `metrics::gauge!()`
/// calls are exported in the Prometheus text format.
///
/// # Errors
///
/// - The endpoint or listen address is invalid
/// - Socket binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_socket_addr(config)?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    stanza_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_socket_addr_from_defaults() {
        let addr = listen_socket_addr(&MetricsConfig::default()).expect("defaults should resolve");
        assert_eq!(addr.to_string(), "127.0.0.1:9222");
    }

    #[test]
    fn test_listen_socket_addr_rejects_custom_endpoint() {
        let config = MetricsConfig {
            endpoint: "/stats".to_owned(),
            ..MetricsConfig::default()
        };
        let err = listen_socket_addr(&config).unwrap_err().to_string();
        assert!(err.contains("unsupported metrics endpoint"), "got: {err}");
    }

    #[test]
    fn test_listen_socket_addr_rejects_bad_address() {
        let config = MetricsConfig {
            listen_addr: "not-an-ip".to_owned(),
            ..MetricsConfig::default()
        };
        assert!(listen_socket_addr(&config).is_err());
    }
}
