//! 시작 스윕 -- 모니터 시작 시 기존 로그 파일을 한 번씩 처리합니다.
//!
//! 알림 전달과 무관하게 감시 디렉토리의 모든 로그 파일을
//! `process(path, check_size = false)`로 넘깁니다. 디렉토리 목록을 읽지 못하면
//! 시작 실패이며, 파일 단위 실패는 요약에만 집계됩니다.
//!
//! 종료 신호는 파일 사이에서 확인합니다. 처리 중인 파일은 병합까지 마칩니다.

use std::path::PathBuf;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::decoder::Decoder;
use crate::engine::{LogProcessor, ProcessOutcome};
use crate::error::LogMonitorError;
use crate::router::EventRouter;

/// 스윕 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// 발견한 로그 파일 수
    pub scanned: usize,
    /// 병합된 파일 수
    pub merged: usize,
    /// 건너뛴 파일 수 (빈 파일, 변화 없음)
    pub skipped: usize,
    /// 실패한 파일 수
    pub failed: usize,
    /// 종료 신호로 중간에 멈췄는지 여부
    pub interrupted: bool,
}

/// 감시 디렉토리에서 로그 파일 이름 규칙에 맞는 파일을 나열합니다.
///
/// 하위 디렉토리는 내려가지 않습니다. 결과는 경로 순으로 정렬됩니다.
pub async fn list_log_files(router: &EventRouter) -> Result<Vec<PathBuf>, LogMonitorError> {
    let dir = router.watch_dir();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| LogMonitorError::WatchDir {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut files = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to read directory entry");
                continue;
            }
        };

        let path = entry.path();
        if !router.matches(&path) {
            continue;
        }
        match entry.file_type().await {
            Ok(file_type) if file_type.is_dir() => continue,
            Ok(_) => files.push(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read file type");
            }
        }
    }

    files.sort();
    Ok(files)
}

/// 시작 스윕을 실행합니다.
///
/// `stop`이 `true`가 되면 남은 파일을 건너뛰고 `interrupted`로 표시합니다.
pub async fn run_startup_sweep<D: Decoder>(
    processor: &LogProcessor<D>,
    router: &EventRouter,
    stop: &watch::Receiver<bool>,
) -> Result<SweepSummary, LogMonitorError> {
    let files = list_log_files(router).await?;
    let mut summary = SweepSummary {
        scanned: files.len(),
        ..Default::default()
    };

    for path in &files {
        if *stop.borrow() {
            summary.interrupted = true;
            warn!(
                remaining = summary.scanned - summary.merged - summary.skipped - summary.failed,
                "startup sweep interrupted by shutdown"
            );
            break;
        }
        match processor.process(path, false).await {
            ProcessOutcome::Merged { .. } => summary.merged += 1,
            ProcessOutcome::EmptyFile
            | ProcessOutcome::Unchanged
            | ProcessOutcome::Superseded => summary.skipped += 1,
            ProcessOutcome::Failed(_) => summary.failed += 1,
        }
    }

    info!(
        watch_dir = %router.watch_dir().display(),
        scanned = summary.scanned,
        merged = summary.merged,
        skipped = summary.skipped,
        failed = summary.failed,
        interrupted = summary.interrupted,
        "startup sweep finished"
    );
    Ok(summary)
}
