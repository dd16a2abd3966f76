//! 처리 진입점 -- `process(path, check_size)`
//!
//! 라우터와 시작 스윕이 공통으로 호출하는 상태 머신입니다.
//!
//! ```text
//! Idle -> SizeCheck -> (grace period) -> Decode -> Merge -> Idle
//!            |  |                          |         |
//!        empty  no growth               failed    failed   (조기 종료, 상태 변경 없음)
//! ```
//!
//! 추적기와 집계 파일은 하나의 `tokio::sync::Mutex` 아래에 있습니다.
//! 디코딩은 락 밖에서 수행하고, 병합 직전에 락을 잡은 채로 추적 크기를 다시
//! 확인하므로 같은 크기를 두 번 병합하지 않습니다. 병합이 성공한 뒤에만
//! 추적 크기를 갱신합니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

use u2relay_core::metrics as m;

use crate::decoder::Decoder;
use crate::error::LogMonitorError;
use crate::merger::LogMerger;
use crate::tracker::FileStateTracker;

/// 처리 요청 (이벤트 또는 스윕 항목 하나당 하나)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    /// 대상 파일
    pub path: PathBuf,
    /// 추적 크기보다 커졌을 때만 처리할지 여부
    pub check_size: bool,
}

impl ProcessRequest {
    /// 크기 확인 없이 처리하는 요청 (생성 이벤트, 스윕)
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            check_size: false,
        }
    }

    /// 크기가 커졌을 때만 처리하는 요청 (수정 이벤트)
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            check_size: true,
        }
    }
}

/// `process()` 결과
#[derive(Debug)]
pub enum ProcessOutcome {
    /// 디코딩 후 집계 파일에 병합됨
    Merged {
        /// 새로 기록된 추적 크기
        size: u64,
        /// 집계 파일에 쓴 바이트 수
        bytes_written: usize,
    },
    /// 크기 0 파일이라 건너뜀
    EmptyFile,
    /// 추적 크기 이후 새 바이트가 없음
    Unchanged,
    /// 디코딩 중에 다른 트리거가 같은 크기 이상을 이미 병합함
    Superseded,
    /// 실패 (로그 기록됨, 상태 변경 없음)
    Failed(LogMonitorError),
}

impl ProcessOutcome {
    /// 병합이 일어났는지 확인합니다.
    pub fn is_merged(&self) -> bool {
        matches!(self, Self::Merged { .. })
    }
}

/// 락으로 보호되는 공유 상태: 추적기 + 집계 파일
#[derive(Debug)]
struct SharedState {
    tracker: FileStateTracker,
    merger: LogMerger,
}

/// 로그 파일 처리기
///
/// 감시 디렉토리당 하나의 인스턴스가 추적 상태를 독점 소유합니다.
/// `Arc`로 감싸 디스패처 태스크와 시작 스윕이 공유합니다.
pub struct LogProcessor<D: Decoder> {
    decoder: D,
    state: Mutex<SharedState>,
    grace_period: Duration,
}

impl<D: Decoder> LogProcessor<D> {
    /// 새 처리기를 생성합니다.
    pub fn new(decoder: D, merger: LogMerger, grace_period: Duration) -> Self {
        Self {
            decoder,
            state: Mutex::new(SharedState {
                tracker: FileStateTracker::new(),
                merger,
            }),
            grace_period,
        }
    }

    /// 디코더에 대한 참조를 반환합니다.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// grace period를 반환합니다.
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// 경로의 추적 크기를 반환합니다 (없으면 0).
    pub async fn tracked_size(&self, path: &Path) -> u64 {
        self.state.lock().await.tracker.get(path)
    }

    /// 추적 중인 파일 수를 반환합니다.
    pub async fn tracked_count(&self) -> usize {
        self.state.lock().await.tracker.len()
    }

    /// 요청 하나를 처리합니다.
    pub async fn handle(&self, request: &ProcessRequest) -> ProcessOutcome {
        self.process(&request.path, request.check_size).await
    }

    /// 파일 하나를 처리합니다.
    ///
    /// 파일 단위 에러는 여기서 로그로 남기고 [`ProcessOutcome::Failed`]로
    /// 반환하며, 호출자(디스패처, 스윕)로 전파하지 않습니다.
    pub async fn process(&self, path: &Path, check_size: bool) -> ProcessOutcome {
        match self.try_process(path, check_size).await {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    e if e.is_transient() => {
                        warn!(path = %path.display(), error = %e, "log file unavailable, skipping");
                    }
                    e if e.is_decode_failure() => {
                        metrics::counter!(m::MONITOR_DECODE_FAILURES_TOTAL).increment(1);
                        error!(path = %path.display(), error = %e, "error processing log file");
                    }
                    LogMonitorError::SinkWrite { .. } => {
                        metrics::counter!(m::MONITOR_SINK_FAILURES_TOTAL).increment(1);
                        error!(path = %path.display(), error = %err, "failed to append to aggregated log");
                    }
                    e => {
                        error!(path = %path.display(), error = %e, "unexpected error processing log file");
                    }
                }
                ProcessOutcome::Failed(err)
            }
        }
    }

    async fn try_process(
        &self,
        path: &Path,
        check_size: bool,
    ) -> Result<ProcessOutcome, LogMonitorError> {
        let current_size = tokio::fs::metadata(path)
            .await
            .map_err(|source| LogMonitorError::FileUnavailable {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        if current_size == 0 {
            metrics::counter!(m::MONITOR_EMPTY_SKIPPED_TOTAL).increment(1);
            info!(path = %path.display(), "skipped empty log file");
            return Ok(ProcessOutcome::EmptyFile);
        }

        if check_size {
            let state = self.state.lock().await;
            if state.tracker.contains(path) && current_size <= state.tracker.get(path) {
                trace!(path = %path.display(), size = current_size, "no growth since last merge");
                return Ok(ProcessOutcome::Unchanged);
            }
        }

        // 생산자가 아직 쓰는 중일 수 있으므로 잠시 기다림 (휴리스틱)
        if !self.grace_period.is_zero() {
            tokio::time::sleep(self.grace_period).await;
        }

        let last_processed = self.state.lock().await.tracker.get(path);
        if current_size <= last_processed {
            debug!(
                path = %path.display(),
                size = current_size,
                tracked = last_processed,
                "already processed by another trigger"
            );
            return Ok(ProcessOutcome::Unchanged);
        }

        let decoded = self.decoder.decode(path).await?;

        let mut state = self.state.lock().await;
        if current_size <= state.tracker.get(path) {
            debug!(path = %path.display(), size = current_size, "decode superseded, discarding output");
            return Ok(ProcessOutcome::Superseded);
        }

        let bytes_written = state.merger.append(path, &decoded).await?;
        state.tracker.set(path, current_size);
        let tracked = state.tracker.len();
        drop(state);

        metrics::counter!(m::MONITOR_ENTRIES_MERGED_TOTAL).increment(1);
        metrics::counter!(m::MONITOR_SINK_BYTES_TOTAL).increment(bytes_written as u64);
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::MONITOR_TRACKED_FILES).set(tracked as f64);

        info!(
            path = %path.display(),
            size = current_size,
            bytes_written,
            "processed log file"
        );
        Ok(ProcessOutcome::Merged {
            size: current_size,
            bytes_written,
        })
    }
}
