//! 로그 모니터 에러 타입
//!
//! [`LogMonitorError`]는 파일 처리, 디코더 호출, 집계 파일 쓰기, 감시 설정에서
//! 발생하는 모든 에러를 표현합니다. 파일 단위 에러는 `process()` 밖으로
//! 전파되지 않고 로그로만 남으며, 시작 단계 에러만 데몬까지 올라갑니다.

use std::path::PathBuf;

use u2relay_core::error::{ConfigError, MonitorError, U2RelayError};

/// 로그 모니터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogMonitorError {
    /// 파일 stat 실패 (이벤트와 처리 사이에 삭제됨 등)
    #[error("file unavailable: {}: {source}", .path.display())]
    FileUnavailable {
        /// 대상 파일
        path: PathBuf,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// 디코더 프로세스를 시작할 수 없음 (바이너리 없음, 권한 없음)
    #[error("failed to launch decoder '{binary}': {source}")]
    DecoderLaunch {
        /// 디코더 실행 파일
        binary: String,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// 디코더 실패 (non-zero 종료, stderr 출력, 타임아웃)
    #[error("decode failed for {}: {reason}", .path.display())]
    Decode {
        /// 대상 파일
        path: PathBuf,
        /// 실패 사유
        reason: String,
    },

    /// 집계 파일 열기/쓰기 실패
    #[error("sink write failed: {}: {source}", .path.display())]
    SinkWrite {
        /// 집계 파일 경로
        path: PathBuf,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// 감시 디렉토리가 없거나 접근 불가 (시작 실패)
    #[error("watch directory unavailable: {}: {reason}", .path.display())]
    WatchDir {
        /// 감시 디렉토리
        path: PathBuf,
        /// 사유
        reason: String,
    },

    /// 파일시스템 감시자 에러
    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl LogMonitorError {
    /// 다음 이벤트에서 자연스럽게 재시도되는 일시적 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FileUnavailable { .. })
    }

    /// 디코더 관련 에러인지 확인합니다.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Self::DecoderLaunch { .. } | Self::Decode { .. })
    }
}

impl From<LogMonitorError> for U2RelayError {
    fn from(err: LogMonitorError) -> Self {
        match err {
            LogMonitorError::WatchDir { path, reason } => {
                U2RelayError::Monitor(MonitorError::WatchDirUnavailable {
                    path: path.display().to_string(),
                    reason,
                })
            }
            LogMonitorError::Config { field, reason } => {
                U2RelayError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => U2RelayError::Monitor(MonitorError::InitFailed(other.to_string())),
        }
    }
}
