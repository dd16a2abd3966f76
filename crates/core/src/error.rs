//! 에러 타입 -- 도메인별 에러 정의

/// u2relay 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum U2RelayError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 로그 모니터 에러
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),

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

/// 로그 모니터 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// 이미 실행 중
    #[error("monitor already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("monitor not running")]
    NotRunning,

    /// 감시 디렉토리 접근 불가 (시작 실패)
    #[error("watch directory unavailable: {path}: {reason}")]
    WatchDirUnavailable { path: String, reason: String },

    /// 모니터 초기화 실패
    #[error("monitor init failed: {0}")]
    InitFailed(String),
}
