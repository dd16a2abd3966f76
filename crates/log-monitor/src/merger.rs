//! 집계 파일 병합기
//!
//! 디코더 출력을 헤더(구분선, 원본 파일, 타임스탬프)와 함께 하나의 집계 파일
//! 끝에 덧붙입니다. 엔트리 형식:
//!
//! ```text
//! \n----- New Log Entries -----\n
//! Source file: <path>\n
//! Timestamp: <YYYY-MM-DD HH:MM:SS>\n
//! \n
//! <decoded text>
//! ```
//!
//! 호출마다 append 모드로 열고 한 번의 쓰기 후 바로 닫습니다. 기존 내용을
//! seek하거나 truncate하지 않습니다. 동시 호출 간 직렬화는 호출자
//! ([`LogProcessor`](crate::engine::LogProcessor))의 락이 담당합니다.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::LogMonitorError;

/// 엔트리 구분선
pub const ENTRY_SEPARATOR: &str = "----- New Log Entries -----";

/// 헤더 타임스탬프 형식 (로컬 시각)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 집계 파일 병합기
#[derive(Debug, Clone)]
pub struct LogMerger {
    output_path: PathBuf,
}

impl LogMerger {
    /// 집계 파일 경로로 병합기를 생성합니다. 파일은 첫 append 때 생성됩니다.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    /// 집계 파일 경로를 반환합니다.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// 엔트리 하나를 현재 시각으로 덧붙이고 기록한 바이트 수를 반환합니다.
    ///
    /// # Errors
    ///
    /// 파일 열기/쓰기/flush 실패 시 `LogMonitorError::SinkWrite`.
    pub async fn append(&self, source: &Path, body: &[u8]) -> Result<usize, LogMonitorError> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let entry = format_entry(source, &timestamp, body);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .await
            .map_err(|e| self.sink_error(e))?;

        file.write_all(&entry).await.map_err(|e| self.sink_error(e))?;
        file.flush().await.map_err(|e| self.sink_error(e))?;

        Ok(entry.len())
    }

    fn sink_error(&self, source: std::io::Error) -> LogMonitorError {
        LogMonitorError::SinkWrite {
            path: self.output_path.clone(),
            source,
        }
    }
}

/// 엔트리 바이트를 조립합니다. 본문은 변환 없이 그대로 이어 붙입니다.
pub fn format_entry(source: &Path, timestamp: &str, body: &[u8]) -> Vec<u8> {
    let header = format!(
        "\n{ENTRY_SEPARATOR}\nSource file: {}\nTimestamp: {timestamp}\n\n",
        source.display()
    );
    let mut entry = Vec::with_capacity(header.len() + body.len());
    entry.extend_from_slice(header.as_bytes());
    entry.extend_from_slice(body);
    entry
}
