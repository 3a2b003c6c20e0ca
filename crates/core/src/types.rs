//! 도메인 타입: 서버 상태
//!
//! 서버가 외부에 보고하는 운영 상태를 정의합니다.
//! 데몬은 이 상태를 `watch` 채널로 공유하며, 시그널 처리 결과도
//! 이 상태를 통해 관찰됩니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::GeneralConfig;

/// 서버 운영 상태
///
/// 상태 전환:
/// - 시작 → `Standalone` 또는 `Clustered` (설정에 따라)
/// - `shutdown()` 또는 종료 시그널 → `Shutdown`
///
/// 처리하지 않는 시그널은 상태를 바꾸지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// 단독 실행 중
    Standalone,
    /// 클러스터 모드로 실행 중
    Clustered,
    /// 종료됨
    Shutdown,
}

impl ServerState {
    /// 설정으로부터 실행 중 상태를 결정합니다.
    pub fn for_config(general: &GeneralConfig) -> Self {
        if general.clustered {
            Self::Clustered
        } else {
            Self::Standalone
        }
    }

    /// 서버가 아직 실행 중인지 여부
    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Shutdown)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standalone => write!(f, "STANDALONE"),
            Self::Clustered => write!(f, "CLUSTERED"),
            Self::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}
