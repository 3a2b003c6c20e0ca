//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 데몬은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `stanza_`
//! - 접미어: `_total` (counter), `_seconds` (gauge/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(stanza_core::metrics::SIGNALS_RECEIVED_TOTAL, "signal" => "SIGUSR1").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 시그널 이름 레이블 키 (SIGINT, SIGTERM, SIGUSR1, ...)
pub const LABEL_SIGNAL: &str = "signal";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 버전 레이블 키
pub const LABEL_VERSION: &str = "version";

// ─── Signal / Logging 메트릭 ────────────────────────────────────────

/// 수신한 OS 시그널 수 (counter, label: signal)
pub const SIGNALS_RECEIVED_TOTAL: &str = "stanza_signals_received_total";

/// 로그 파일 재오픈 횟수 (counter, label: result)
pub const LOG_REOPENS_TOTAL: &str = "stanza_log_reopens_total";

// ─── Server 메트릭 ──────────────────────────────────────────────────

/// Server: 가동 시간 (gauge, 초)
pub const SERVER_UPTIME_SECONDS: &str = "stanza_server_uptime_seconds";

/// Server: 빌드 정보 (gauge, 항상 1, label: version)
pub const BUILD_INFO: &str = "stanza_build_info";

/// 정의된 모든 메트릭 이름
pub const ALL_METRIC_NAMES: [&str; 4] = [
    SIGNALS_RECEIVED_TOTAL,
    LOG_REOPENS_TOTAL,
    SERVER_UPTIME_SECONDS,
    BUILD_INFO,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `stanza-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        SIGNALS_RECEIVED_TOTAL,
        "Total number of OS signals received by the server, by signal name"
    );
    describe_counter!(
        LOG_REOPENS_TOTAL,
        "Total number of log file re-open attempts, by result"
    );
    describe_gauge!(SERVER_UPTIME_SECONDS, "Server uptime in seconds");
    describe_gauge!(BUILD_INFO, "Build information (always 1)");
}
