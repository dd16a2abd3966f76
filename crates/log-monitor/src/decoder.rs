//! 외부 디코더 호출 추상화
//!
//! [`Decoder`] trait은 바이너리 로그 파일 하나를 텍스트로 변환하는 외부 작업을
//! 추상화합니다. 프로덕션은 [`CommandDecoder`]로 `<decoder-binary> <file-path>`를
//! 실행하고, 테스트는 스크립트된 mock 구현을 사용합니다.
//!
//! ```text
//! ┌──────────────┐
//! │ LogProcessor │
//! └──────┬───────┘
//!        ▼
//!   ┌─────────┐
//!   │ Decoder │ (trait)
//!   └─────────┘
//!     │     │
//!     ▼     ▼
//! ┌───────┐ ┌──────┐
//! │Command│ │ Mock │
//! └───┬───┘ └──────┘
//!     ▼
//!  u2spewfoo
//! ```
//!
//! 디코더는 매번 파일 *전체*를 변환합니다. 새 바이트 여부는 호출자가
//! 크기 비교로 판단하며, 델타 디코딩은 하지 않습니다.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use tokio::process::Command;

use crate::config::LogMonitorConfig;
use crate::error::LogMonitorError;

/// 에러 메시지에 포함할 stderr 최대 길이 (문자)
const STDERR_SUMMARY_MAX_CHARS: usize = 512;

/// 바이너리 로그 파일 → 텍스트 변환 trait
///
/// `Send + Sync + 'static`이므로 `Arc`로 감싸 여러 태스크에서 공유할 수 있습니다.
pub trait Decoder: Send + Sync + 'static {
    /// 파일 전체를 디코딩하여 표준 출력 바이트를 반환합니다.
    ///
    /// # Errors
    ///
    /// - `LogMonitorError::DecoderLaunch`: 프로세스를 시작할 수 없음
    /// - `LogMonitorError::Decode`: non-zero 종료, stderr 출력, 타임아웃
    fn decode(&self, path: &Path) -> impl Future<Output = Result<Bytes, LogMonitorError>> + Send;
}

/// 외부 프로세스를 실행하는 디코더
///
/// `<binary> [args...] <path>`를 실행하고 표준 출력 전체를 캡처합니다.
/// 타임아웃이 지나면 자식 프로세스를 종료합니다 (`kill_on_drop`).
#[derive(Debug, Clone)]
pub struct CommandDecoder {
    binary: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    fail_on_stderr: bool,
}

impl CommandDecoder {
    /// 기본 옵션(추가 인자 없음, 타임아웃 없음, stderr 실패 처리)으로 생성합니다.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            timeout: None,
            fail_on_stderr: true,
        }
    }

    /// 모니터 설정에서 디코더를 생성합니다.
    pub fn from_config(config: &LogMonitorConfig) -> Self {
        Self::new(config.decoder_binary.clone())
            .with_args(config.decoder_args.clone())
            .with_timeout(config.decode_timeout)
            .with_fail_on_stderr(config.fail_on_stderr)
    }

    /// 파일 경로 앞에 전달할 인자를 설정합니다.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// 타임아웃을 설정합니다.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// stderr 출력이 있을 때 실패로 처리할지 설정합니다.
    pub fn with_fail_on_stderr(mut self, fail: bool) -> Self {
        self.fail_on_stderr = fail;
        self
    }

    /// 디코더 실행 파일 이름을 반환합니다.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn decode_error(path: &Path, reason: impl Into<String>) -> LogMonitorError {
        LogMonitorError::Decode {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl Decoder for CommandDecoder {
    async fn decode(&self, path: &Path) -> Result<Bytes, LogMonitorError> {
        let child = Command::new(&self.binary)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LogMonitorError::DecoderLaunch {
                binary: self.binary.clone(),
                source,
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    Self::decode_error(
                        path,
                        format!("decoder timed out after {}s", limit.as_secs_f64()),
                    )
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Self::decode_error(path, format!("failed to collect decoder output: {e}")))?;

        if !output.status.success() {
            return Err(Self::decode_error(
                path,
                format!(
                    "decoder exited with {}: {}",
                    output.status,
                    summarize_stderr(&output.stderr)
                ),
            ));
        }

        if self.fail_on_stderr && !output.stderr.is_empty() {
            return Err(Self::decode_error(
                path,
                format!(
                    "decoder wrote to stderr: {}",
                    summarize_stderr(&output.stderr)
                ),
            ));
        }

        tracing::debug!(
            path = %path.display(),
            bytes = output.stdout.len(),
            "decoder finished"
        );
        Ok(Bytes::from(output.stdout))
    }
}

fn summarize_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return "<no stderr>".to_owned();
    }
    let mut summary: String = text.chars().take(STDERR_SUMMARY_MAX_CHARS).collect();
    if text.chars().count() > STDERR_SUMMARY_MAX_CHARS {
        summary.push_str("...");
    }
    summary
}

/// 테스트용 Mock 디코더
///
/// 호출 횟수와 호출 경로를 기록하고, 설정된 출력이나 실패를 반환합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDecoder {
    /// 성공 시 반환할 출력
    pub output: Bytes,
    /// 실패를 시뮬레이션할지 여부
    pub fail: std::sync::atomic::AtomicBool,
    /// 호출된 경로 목록
    pub calls: std::sync::Mutex<Vec<std::path::PathBuf>>,
}

#[cfg(test)]
impl MockDecoder {
    /// 고정 출력을 반환하는 mock을 생성합니다.
    pub fn with_output(output: &'static str) -> Self {
        Self {
            output: Bytes::from_static(output.as_bytes()),
            ..Default::default()
        }
    }

    /// 항상 실패하는 mock을 생성합니다.
    pub fn failing() -> Self {
        let mock = Self::default();
        mock.set_failing(true);
        mock
    }

    /// 실패 여부를 변경합니다.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// 호출 횟수를 반환합니다.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[cfg(test)]
impl Decoder for MockDecoder {
    async fn decode(&self, path: &Path) -> Result<Bytes, LogMonitorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(path.to_path_buf());
        }
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LogMonitorError::Decode {
                path: path.to_path_buf(),
                reason: "mock failure".to_owned(),
            });
        }
        Ok(self.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_copies_options() {
        let config = LogMonitorConfig {
            decoder_binary: "/usr/bin/u2spewfoo".to_owned(),
            decoder_args: vec!["-x".to_owned()],
            decode_timeout: Some(Duration::from_secs(3)),
            fail_on_stderr: false,
            ..Default::default()
        };
        let decoder = CommandDecoder::from_config(&config);
        assert_eq!(decoder.binary(), "/usr/bin/u2spewfoo");
        assert_eq!(decoder.args, vec!["-x"]);
        assert_eq!(decoder.timeout, Some(Duration::from_secs(3)));
        assert!(!decoder.fail_on_stderr);
    }

    #[test]
    fn summarize_stderr_truncates() {
        assert_eq!(summarize_stderr(b""), "<no stderr>");
        assert_eq!(summarize_stderr(b"  bad header\n"), "bad header");
        let long = vec![b'x'; STDERR_SUMMARY_MAX_CHARS + 10];
        let summary = summarize_stderr(&long);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.len(), STDERR_SUMMARY_MAX_CHARS + 3);
    }

    #[tokio::test]
    async fn missing_binary_is_launch_error() {
        let decoder = CommandDecoder::new("/nonexistent/u2relay-test-decoder");
        let err = decoder
            .decode(Path::new("/var/log/snort/snort.log.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LogMonitorError::DecoderLaunch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_of_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("snort.log.1");
        std::fs::write(&log, b"binary-ish payload").unwrap();

        let decoder = CommandDecoder::new("cat");
        let out = decoder.decode(&log).await.unwrap();
        assert_eq!(&out[..], b"binary-ish payload");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_decode_error() {
        let decoder = CommandDecoder::new("sh").with_args(vec!["-c".to_owned(), "exit 3".to_owned()]);
        let err = decoder
            .decode(Path::new("/var/log/snort/snort.log.1"))
            .await
            .unwrap_err();
        match err {
            LogMonitorError::Decode { reason, .. } => assert!(reason.contains("exited")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_output_fails_only_when_configured() {
        let args = vec!["-c".to_owned(), "echo decoded; echo warn >&2".to_owned()];

        let strict = CommandDecoder::new("sh").with_args(args.clone());
        assert!(strict.decode(Path::new("ignored")).await.is_err());

        let lenient = CommandDecoder::new("sh")
            .with_args(args)
            .with_fail_on_stderr(false);
        let out = lenient.decode(Path::new("ignored")).await.unwrap();
        assert_eq!(&out[..], b"decoded\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_decoder_times_out() {
        let decoder = CommandDecoder::new("sleep")
            .with_timeout(Some(Duration::from_millis(100)));
        let err = decoder.decode(Path::new("5")).await.unwrap_err();
        match err {
            LogMonitorError::Decode { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
