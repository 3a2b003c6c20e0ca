//! 에러 타입: 도메인별 에러 정의

/// Stanza 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum StanzaError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_names_field() {
        let err = ConfigError::InvalidValue {
            field: "general.cluster_id".to_owned(),
            reason: "must not be empty".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("general.cluster_id"));
        assert!(msg.contains("must not be empty"));
    }

    #[test]
    fn config_error_converts_into_stanza_error() {
        let err: StanzaError = ConfigError::ParseFailed {
            reason: "unexpected eof".to_owned(),
        }
        .into();
        assert!(matches!(err, StanzaError::Config(ConfigError::ParseFailed { .. })));
        assert!(err.to_string().starts_with("config error:"));
    }

    #[test]
    fn io_error_converts_into_stanza_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StanzaError = io.into();
        assert!(matches!(err, StanzaError::Io(_)));
    }
}
