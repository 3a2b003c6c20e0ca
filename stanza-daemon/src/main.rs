use anyhow::Result;
use clap::Parser;

use stanza_core::config::StanzaConfig;
use stanza_daemon::cli::DaemonCli;
use stanza_daemon::logging::ServerLogger;
use stanza_daemon::metrics_server::install_metrics_recorder;
use stanza_daemon::server::StreamingServer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드: 파일 -> 환경변수 -> CLI 순으로 덮어쓴다
    let mut config = match &cli.config {
        Some(path) => StanzaConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e))?,
        None => StanzaConfig::default(),
    };

    // 서버가 뜨기 전까지의 경고는 stderr로 보낸다
    let bootstrap = ServerLogger::bootstrap(&config.logging)?;
    let bootstrap_guard = bootstrap.set_default();

    config.apply_env_overrides();
    cli.apply_overrides(&mut config);

    if cli.validate {
        return match config.validate() {
            Ok(()) => {
                println!("configuration is valid");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("configuration is invalid: {}", e)),
        };
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if config.metrics.enabled {
        install_metrics_recorder(&config.metrics)?;
    }

    let server = StreamingServer::run(config).await?;

    // 이후 전역 tracing 이벤트도 서버 로그로 보낸다
    drop(bootstrap_guard);
    server.logger().install_global()?;

    server.wait_for_shutdown().await;
    Ok(())
}
