//! 로그 모니터 설정
//!
//! [`LogMonitorConfig`]는 core의 [`MonitorConfig`](u2relay_core::config::MonitorConfig)를
//! 엔진이 바로 쓸 수 있는 타입(경로, `Duration`)으로 변환한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use u2relay_core::config::U2RelayConfig;
//! use u2relay_log_monitor::config::LogMonitorConfig;
//!
//! let core_config = U2RelayConfig::default();
//! let config = LogMonitorConfig::from_core(&core_config.monitor)?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use u2relay_core::config::{DEFAULT_OUTPUT_FILE_NAME, MonitorConfig};

use crate::error::LogMonitorError;
use crate::router::EventRouter;

/// 로그 모니터 설정
#[derive(Debug, Clone)]
pub struct LogMonitorConfig {
    /// 감시 디렉토리
    pub watch_dir: PathBuf,
    /// 처리 대상 파일 이름 접두어
    pub file_prefix: String,
    /// 디코더 실행 파일
    pub decoder_binary: String,
    /// 파일 경로 앞에 전달할 추가 인자
    pub decoder_args: Vec<String>,
    /// 집계 파일 경로
    pub output_path: PathBuf,
    /// 디코딩 전 대기 시간
    pub grace_period: Duration,
    /// 디코더 타임아웃 (None이면 무제한)
    pub decode_timeout: Option<Duration>,
    /// 디코더 stderr 출력을 실패로 처리할지 여부
    pub fail_on_stderr: bool,
    /// 파일시스템 이벤트 채널 용량
    pub event_channel_capacity: usize,
    /// 종료 시 디스패처를 기다리는 최대 시간
    pub shutdown_timeout: Duration,
}

impl Default for LogMonitorConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("/var/log/snort"),
            file_prefix: "snort.log.".to_owned(),
            decoder_binary: "u2spewfoo".to_owned(),
            decoder_args: Vec::new(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE_NAME),
            grace_period: Duration::from_secs(1),
            decode_timeout: None,
            fail_on_stderr: true,
            event_channel_capacity: 1024,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl LogMonitorConfig {
    /// core의 `MonitorConfig`에서 모니터 설정을 생성합니다.
    ///
    /// `output_path`가 비어 있으면 현재 실행 파일이 있는 디렉토리의
    /// `snort_logs.txt`를 사용합니다.
    pub fn from_core(core: &MonitorConfig) -> Result<Self, LogMonitorError> {
        let output_path = if core.output_path.is_empty() {
            default_output_path()?
        } else {
            PathBuf::from(&core.output_path)
        };

        let config = Self {
            watch_dir: PathBuf::from(&core.watch_dir),
            file_prefix: core.file_prefix.clone(),
            decoder_binary: core.decoder_binary.clone(),
            decoder_args: core.decoder_args.clone(),
            output_path,
            grace_period: Duration::from_millis(core.grace_period_ms),
            decode_timeout: (core.decode_timeout_secs > 0)
                .then(|| Duration::from_secs(core.decode_timeout_secs)),
            fail_on_stderr: core.fail_on_stderr,
            event_channel_capacity: core.event_channel_capacity,
            shutdown_timeout: Duration::from_secs(core.shutdown_timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogMonitorError> {
        if self.watch_dir.as_os_str().is_empty() {
            return Err(config_err("watch_dir", "must not be empty"));
        }

        if self.file_prefix.is_empty() {
            return Err(config_err("file_prefix", "must not be empty"));
        }
        if self.file_prefix.contains(['/', '\\']) {
            return Err(config_err(
                "file_prefix",
                "must be a file name prefix, not a path",
            ));
        }

        if self.decoder_binary.trim().is_empty() {
            return Err(config_err("decoder_binary", "must not be empty"));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(config_err("output_path", "must not be empty"));
        }
        if EventRouter::new(&self.watch_dir, &self.file_prefix).matches(&self.output_path) {
            return Err(config_err(
                "output_path",
                "must not match the watched log file pattern",
            ));
        }

        if self.event_channel_capacity == 0 {
            return Err(config_err(
                "event_channel_capacity",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn default_output_path() -> Result<PathBuf, LogMonitorError> {
    let exe = std::env::current_exe().map_err(|e| {
        config_err(
            "output_path",
            format!("cannot resolve executable location: {e}"),
        )
    })?;
    let dir = exe
        .parent()
        .ok_or_else(|| config_err("output_path", "executable has no parent directory"))?;
    Ok(dir.join(DEFAULT_OUTPUT_FILE_NAME))
}

fn config_err(field: &str, reason: impl Into<String>) -> LogMonitorError {
    LogMonitorError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 로그 모니터 설정 빌더
#[derive(Default)]
pub struct LogMonitorConfigBuilder {
    config: LogMonitorConfig,
}

impl LogMonitorConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 감시 디렉토리를 설정합니다.
    pub fn watch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.watch_dir = dir.into();
        self
    }

    /// 파일 이름 접두어를 설정합니다.
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    /// 디코더 실행 파일을 설정합니다.
    pub fn decoder_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.decoder_binary = binary.into();
        self
    }

    /// 디코더 추가 인자를 설정합니다.
    pub fn decoder_args(mut self, args: Vec<String>) -> Self {
        self.config.decoder_args = args;
        self
    }

    /// 집계 파일 경로를 설정합니다.
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    /// grace period를 설정합니다.
    pub fn grace_period(mut self, period: Duration) -> Self {
        self.config.grace_period = period;
        self
    }

    /// 디코더 타임아웃을 설정합니다.
    pub fn decode_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.decode_timeout = timeout;
        self
    }

    /// stderr 실패 처리 여부를 설정합니다.
    pub fn fail_on_stderr(mut self, fail: bool) -> Self {
        self.config.fail_on_stderr = fail;
        self
    }

    /// 이벤트 채널 용량을 설정합니다.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// 종료 대기 시간을 설정합니다.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// 설정을 검증하고 `LogMonitorConfig`를 생성합니다.
    pub fn build(self) -> Result<LogMonitorConfig, LogMonitorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        LogMonitorConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = MonitorConfig {
            watch_dir: "/data/ids".to_owned(),
            output_path: "/srv/alerts.txt".to_owned(),
            grace_period_ms: 250,
            decode_timeout_secs: 30,
            ..Default::default()
        };
        let config = LogMonitorConfig::from_core(&core).unwrap();
        assert_eq!(config.watch_dir, PathBuf::from("/data/ids"));
        assert_eq!(config.output_path, PathBuf::from("/srv/alerts.txt"));
        assert_eq!(config.grace_period, Duration::from_millis(250));
        assert_eq!(config.decode_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn from_core_resolves_output_next_to_executable() {
        let core = MonitorConfig::default();
        let config = LogMonitorConfig::from_core(&core).unwrap();
        let exe_dir = std::env::current_exe().unwrap();
        assert_eq!(
            config.output_path,
            exe_dir.parent().unwrap().join(DEFAULT_OUTPUT_FILE_NAME)
        );
        assert_eq!(config.decode_timeout, None);
    }

    #[test]
    fn validate_rejects_output_inside_watch_pattern() {
        let result = LogMonitorConfigBuilder::new()
            .watch_dir("/var/log/snort")
            .output_path("/var/log/snort/snort.log.txt")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = LogMonitorConfigBuilder::new()
            .watch_dir("/tmp/ids")
            .file_prefix("unified2.alert.")
            .output_path("/tmp/out.txt")
            .grace_period(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(config.file_prefix, "unified2.alert.");
        assert_eq!(config.grace_period, Duration::ZERO);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        assert!(LogMonitorConfigBuilder::new().file_prefix("").build().is_err());
        assert!(
            LogMonitorConfigBuilder::new()
                .event_channel_capacity(0)
                .build()
                .is_err()
        );
    }
}
