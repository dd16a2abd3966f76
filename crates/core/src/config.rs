//! 설정 관리 -- u2relay.toml 파싱 및 런타임 설정
//!
//! [`U2RelayConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`U2RELAY_MONITOR_WATCH_DIR=/var/log/snort` 형식)
//! 3. 설정 파일 (`u2relay.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), u2relay_core::error::U2RelayError> {
//! use u2relay_core::config::U2RelayConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = U2RelayConfig::load("u2relay.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = U2RelayConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, U2RelayError};

/// 집계 파일 기본 이름 (실행 파일 디렉토리 기준)
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "snort_logs.txt";

/// grace period 상한 (밀리초)
const MAX_GRACE_PERIOD_MS: u64 = 60_000;

/// u2relay 통합 설정
///
/// `u2relay.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct U2RelayConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 모니터 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl U2RelayConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, U2RelayError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, U2RelayError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                U2RelayError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                U2RelayError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, U2RelayError> {
        toml::from_str(toml_str).map_err(|e| {
            U2RelayError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `U2RELAY_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "U2RELAY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "U2RELAY_GENERAL_LOG_FORMAT");

        // Monitor
        override_string(&mut self.monitor.watch_dir, "U2RELAY_MONITOR_WATCH_DIR");
        override_string(&mut self.monitor.file_prefix, "U2RELAY_MONITOR_FILE_PREFIX");
        override_string(
            &mut self.monitor.decoder_binary,
            "U2RELAY_MONITOR_DECODER_BINARY",
        );
        override_csv(&mut self.monitor.decoder_args, "U2RELAY_MONITOR_DECODER_ARGS");
        override_string(&mut self.monitor.output_path, "U2RELAY_MONITOR_OUTPUT_PATH");
        override_u64(
            &mut self.monitor.grace_period_ms,
            "U2RELAY_MONITOR_GRACE_PERIOD_MS",
        );
        override_u64(
            &mut self.monitor.decode_timeout_secs,
            "U2RELAY_MONITOR_DECODE_TIMEOUT_SECS",
        );
        override_bool(
            &mut self.monitor.fail_on_stderr,
            "U2RELAY_MONITOR_FAIL_ON_STDERR",
        );
        override_usize(
            &mut self.monitor.event_channel_capacity,
            "U2RELAY_MONITOR_EVENT_CHANNEL_CAPACITY",
        );
        override_u64(
            &mut self.monitor.shutdown_timeout_secs,
            "U2RELAY_MONITOR_SHUTDOWN_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "U2RELAY_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "U2RELAY_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "U2RELAY_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), U2RelayError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        validate_watch_dir(&self.monitor.watch_dir)?;

        if self.monitor.file_prefix.is_empty() {
            return Err(invalid("monitor.file_prefix", "must not be empty"));
        }
        if self.monitor.file_prefix.contains(['/', '\\']) {
            return Err(invalid(
                "monitor.file_prefix",
                "must be a file name prefix, not a path",
            ));
        }

        if self.monitor.decoder_binary.trim().is_empty() {
            return Err(invalid("monitor.decoder_binary", "must not be empty"));
        }

        if self.monitor.grace_period_ms > MAX_GRACE_PERIOD_MS {
            return Err(invalid(
                "monitor.grace_period_ms",
                format!("must be 0-{}", MAX_GRACE_PERIOD_MS),
            ));
        }

        if self.monitor.event_channel_capacity == 0 {
            return Err(invalid(
                "monitor.event_channel_capacity",
                "must be greater than 0",
            ));
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is currently supported",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> U2RelayError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 감시 디렉토리 경로를 검증합니다.
///
/// 비어 있지 않은 절대 경로여야 하며 `..` 컴포넌트를 포함할 수 없습니다.
/// 디렉토리 존재 여부는 모니터 시작 시점에 확인합니다.
fn validate_watch_dir(dir: &str) -> Result<(), U2RelayError> {
    if dir.is_empty() {
        return Err(invalid("monitor.watch_dir", "must not be empty"));
    }

    let path = Path::new(dir);
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(invalid(
            "monitor.watch_dir",
            format!("'{}' contains path traversal pattern '..'", dir),
        ));
    }
    if !path.is_absolute() {
        return Err(invalid(
            "monitor.watch_dir",
            format!("'{}' must be an absolute path", dir),
        ));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 로그 모니터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 감시 디렉토리 (하위 디렉토리는 감시하지 않음)
    pub watch_dir: String,
    /// 처리 대상 파일 이름 접두어
    pub file_prefix: String,
    /// 디코더 실행 파일 (PATH 검색)
    pub decoder_binary: String,
    /// 파일 경로 앞에 전달할 추가 인자
    pub decoder_args: Vec<String>,
    /// 집계 파일 경로. 비어 있으면 실행 파일 디렉토리의 `snort_logs.txt`
    pub output_path: String,
    /// 디코딩 전 대기 시간 (밀리초)
    pub grace_period_ms: u64,
    /// 디코더 타임아웃 (초, 0이면 무제한)
    pub decode_timeout_secs: u64,
    /// 디코더 stderr 출력이 있으면 실패로 처리
    pub fail_on_stderr: bool,
    /// 파일시스템 이벤트 채널 용량
    pub event_channel_capacity: usize,
    /// 종료 시 처리 중인 작업을 기다리는 최대 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watch_dir: "/var/log/snort".to_owned(),
            file_prefix: "snort.log.".to_owned(),
            decoder_binary: "u2spewfoo".to_owned(),
            decoder_args: Vec::new(),
            output_path: String::new(),
            grace_period_ms: 1000,
            decode_timeout_secs: 0,
            fail_on_stderr: true,
            event_channel_capacity: 1024,
            shutdown_timeout_secs: 5,
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
            port: 9100,
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

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
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

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = U2RelayConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.monitor.watch_dir, "/var/log/snort");
        assert_eq!(config.monitor.file_prefix, "snort.log.");
        assert_eq!(config.monitor.decoder_binary, "u2spewfoo");
        assert_eq!(config.monitor.grace_period_ms, 1000);
        assert!(config.monitor.output_path.is_empty());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        U2RelayConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = U2RelayConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.monitor.file_prefix, "snort.log.");
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[monitor]
watch_dir = "/data/ids"
"#;
        let config = U2RelayConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.monitor.watch_dir, "/data/ids");
        assert_eq!(config.monitor.decoder_binary, "u2spewfoo");
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"

[monitor]
watch_dir = "/var/log/suricata"
file_prefix = "unified2.alert."
decoder_binary = "/usr/local/bin/u2spewfoo"
decoder_args = ["-v"]
output_path = "/srv/ids/alerts.txt"
grace_period_ms = 250
decode_timeout_secs = 30
fail_on_stderr = false
event_channel_capacity = 64
shutdown_timeout_secs = 2

[metrics]
enabled = true
listen_addr = "0.0.0.0"
port = 9200
"#;
        let config = U2RelayConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.monitor.file_prefix, "unified2.alert.");
        assert_eq!(config.monitor.decoder_args, vec!["-v"]);
        assert_eq!(config.monitor.decode_timeout_secs, 30);
        assert!(!config.monitor.fail_on_stderr);
        assert_eq!(config.metrics.port, 9200);
        config.validate().unwrap();
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = U2RelayConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            U2RelayError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = U2RelayConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = U2RelayConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_relative_watch_dir() {
        let mut config = U2RelayConfig::default();
        config.monitor.watch_dir = "var/log/snort".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn validate_rejects_traversal_in_watch_dir() {
        let mut config = U2RelayConfig::default();
        config.monitor.watch_dir = "/var/log/../etc".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(".."));
    }

    #[test]
    fn validate_rejects_prefix_with_separator() {
        let mut config = U2RelayConfig::default();
        config.monitor.file_prefix = "snort/log.".to_owned();
        assert!(config.validate().is_err());

        config.monitor.file_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_decoder() {
        let mut config = U2RelayConfig::default();
        config.monitor.decoder_binary = "  ".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("decoder_binary"));
    }

    #[test]
    fn validate_rejects_excessive_grace_period() {
        let mut config = U2RelayConfig::default();
        config.monitor.grace_period_ms = MAX_GRACE_PERIOD_MS + 1;
        assert!(config.validate().is_err());

        config.monitor.grace_period_ms = 0;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_channel_capacity() {
        let mut config = U2RelayConfig::default();
        config.monitor.event_channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_metrics_endpoint_only_when_enabled() {
        let mut config = U2RelayConfig::default();
        config.metrics.endpoint = "/stats".to_owned();
        config.validate().unwrap();

        config.metrics.enabled = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: #[serial]로 환경변수를 조작하는 테스트를 직렬화합니다.
        unsafe { std::env::set_var("TEST_U2RELAY_STR", "overridden") };
        override_string(&mut val, "TEST_U2RELAY_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_U2RELAY_STR") };
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        // SAFETY: #[serial]로 환경변수를 조작하는 테스트를 직렬화합니다.
        unsafe { std::env::set_var("TEST_U2RELAY_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_U2RELAY_BOOL_BAD");
        assert!(val);
        unsafe { std::env::remove_var("TEST_U2RELAY_BOOL_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_csv_drops_empty_items() {
        let mut val = vec!["a".to_owned()];
        // SAFETY: #[serial]로 환경변수를 조작하는 테스트를 직렬화합니다.
        unsafe { std::env::set_var("TEST_U2RELAY_CSV", "-v, ,-e") };
        override_csv(&mut val, "TEST_U2RELAY_CSV");
        assert_eq!(val, vec!["-v", "-e"]);
        unsafe { std::env::remove_var("TEST_U2RELAY_CSV") };
    }

    #[test]
    #[serial]
    fn apply_env_overrides_updates_monitor_section() {
        let mut config = U2RelayConfig::default();
        // SAFETY: #[serial]로 환경변수를 조작하는 테스트를 직렬화합니다.
        unsafe {
            std::env::set_var("U2RELAY_MONITOR_WATCH_DIR", "/tmp/ids");
            std::env::set_var("U2RELAY_MONITOR_GRACE_PERIOD_MS", "5");
        }
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("U2RELAY_MONITOR_WATCH_DIR");
            std::env::remove_var("U2RELAY_MONITOR_GRACE_PERIOD_MS");
        }
        assert_eq!(config.monitor.watch_dir, "/tmp/ids");
        assert_eq!(config.monitor.grace_period_ms, 5);
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = 7u64;
        override_u64(&mut val, "TEST_U2RELAY_NONEXISTENT_12345");
        assert_eq!(val, 7);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = U2RelayConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = U2RelayConfig::parse(&toml_str).unwrap();
        assert_eq!(config.monitor.watch_dir, parsed.monitor.watch_dir);
        assert_eq!(config.metrics.port, parsed.metrics.port);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = U2RelayConfig::from_file("/nonexistent/path/u2relay.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            U2RelayError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn load_reads_file_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u2relay.toml");
        std::fs::write(&path, "[general]\nlog_level = \"loud\"\n").unwrap();
        let err = U2RelayConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }
}
