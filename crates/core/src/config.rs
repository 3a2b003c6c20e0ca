//! 설정 관리: stanza.toml 파싱 및 런타임 설정
//!
//! [`StanzaConfig`]는 서버 프로세스의 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 데몬에서 적용)
//! 2. 환경변수 (`STANZA_LOGGING_FILE=/var/log/stanza.log` 형식)
//! 3. 설정 파일 (`stanza.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), stanza_core::error::StanzaError> {
//! use stanza_core::config::StanzaConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = StanzaConfig::load("stanza.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = StanzaConfig::parse("[logging]\nfile = \"stanza.log\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, StanzaError};

/// 허용되는 로그 레벨
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// 허용되는 로그 형식
pub const LOG_FORMATS: [&str; 3] = ["text", "json", "pretty"];

/// Stanza 통합 설정
///
/// `stanza.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StanzaConfig {
    /// 일반 설정 (클러스터 ID, 시그널 처리, PID 파일)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl StanzaConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StanzaError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, StanzaError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StanzaError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                StanzaError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, StanzaError> {
        toml::from_str(toml_str).map_err(|e| {
            StanzaError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `STANZA_{SECTION}_{FIELD}`
    /// 예: `STANZA_GENERAL_HANDLE_SIGNALS=false`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.cluster_id, "STANZA_GENERAL_CLUSTER_ID");
        override_string(&mut self.general.server_id, "STANZA_GENERAL_SERVER_ID");
        override_bool(&mut self.general.clustered, "STANZA_GENERAL_CLUSTERED");
        override_bool(
            &mut self.general.handle_signals,
            "STANZA_GENERAL_HANDLE_SIGNALS",
        );
        override_string(&mut self.general.pid_file, "STANZA_GENERAL_PID_FILE");

        // Logging
        override_bool(&mut self.logging.enabled, "STANZA_LOGGING_ENABLED");
        override_string(&mut self.logging.level, "STANZA_LOGGING_LEVEL");
        override_string(&mut self.logging.format, "STANZA_LOGGING_FORMAT");
        override_string(&mut self.logging.file, "STANZA_LOGGING_FILE");
        override_bool(&mut self.logging.timestamps, "STANZA_LOGGING_TIMESTAMPS");

        // Metrics
        override_bool(&mut self.metrics.enabled, "STANZA_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "STANZA_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "STANZA_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "STANZA_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), StanzaError> {
        // cluster_id 검증
        if self.general.cluster_id.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "general.cluster_id".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }
        if !is_valid_cluster_id(&self.general.cluster_id) {
            return Err(ConfigError::InvalidValue {
                field: "general.cluster_id".to_owned(),
                reason: "may only contain letters, digits, '_' and '-'".to_owned(),
            }
            .into());
        }

        // logging.level 검증
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_owned(),
                reason: format!("must be one of: {}", LOG_LEVELS.join(", ")),
            }
            .into());
        }

        // logging.format 검증
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".to_owned(),
                reason: format!("must be one of: {}", LOG_FORMATS.join(", ")),
            }
            .into());
        }

        // 메트릭은 활성화된 경우에만 검증
        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "metrics.port".to_owned(),
                    reason: "port must be non-zero when metrics are enabled".to_owned(),
                }
                .into());
            }
            if !self.metrics.endpoint.starts_with('/') {
                return Err(ConfigError::InvalidValue {
                    field: "metrics.endpoint".to_owned(),
                    reason: "endpoint must start with '/'".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// 클러스터 ID 문자 규칙: `[A-Za-z0-9_-]+`
fn is_valid_cluster_id(id: &str) -> bool {
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 클러스터 ID
    pub cluster_id: String,
    /// 서버 ID (비어 있으면 시작 시 생성)
    pub server_id: String,
    /// 클러스터 모드 여부
    pub clustered: bool,
    /// OS 시그널 처리 활성화
    pub handle_signals: bool,
    /// PID 파일 경로 (비어 있으면 사용하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cluster_id: "test-cluster".to_owned(),
            server_id: String::new(),
            clustered: false,
            handle_signals: true,
            pid_file: String::new(),
        }
    }
}

/// 로깅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로깅 활성화 여부
    pub enabled: bool,
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub level: String,
    /// 로그 형식 (text, json, pretty)
    pub format: String,
    /// 로그 파일 경로 (비어 있으면 stderr)
    pub file: String,
    /// 타임스탬프 출력 여부
    pub timestamps: bool,
}

impl LoggingConfig {
    /// 파일 로거인지 여부
    pub fn is_file_logger(&self) -> bool {
        !self.file.is_empty()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_owned(),
            format: "text".to_owned(),
            file: String::new(),
            timestamps: true,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 바인드 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9222,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}
