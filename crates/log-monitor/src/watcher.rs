//! 파일시스템 변경 알림 구독
//!
//! notify의 플랫폼 기본 감시자로 감시 디렉토리를 비재귀로 구독하고,
//! notify 스레드에서 받은 이벤트를 tokio 채널로 넘깁니다.
//! [`DirectoryWatcher`]를 drop하면 notify 스레드가 멈추고 채널 송신측이
//! 닫혀 디스패처가 종료됩니다.

use std::path::{Path, PathBuf};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::LogMonitorError;

/// 감시 디렉토리 구독 핸들
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl DirectoryWatcher {
    /// `dir` 구독을 시작합니다. 이벤트는 `tx`로 전달됩니다.
    ///
    /// 채널이 가득 차면 notify 스레드가 블록되어 이벤트 전달이 늦어질 뿐
    /// 이벤트를 버리지는 않습니다.
    pub fn start(dir: &Path, tx: mpsc::Sender<Event>) -> Result<Self, LogMonitorError> {
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    // notify 스레드는 tokio 런타임 밖이므로 blocking_send 사용
                    if tx.blocking_send(event).is_err() {
                        warn!("event channel closed, dropping filesystem event");
                    }
                }
                Err(e) => error!(error = %e, "filesystem watch error"),
            }
        })?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!(dir = %dir.display(), "watching directory");

        Ok(Self {
            watcher,
            dir: dir.to_path_buf(),
        })
    }

    /// 감시 중인 디렉토리를 반환합니다.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        if let Err(e) = self.watcher.unwatch(&self.dir) {
            debug!(dir = %self.dir.display(), error = %e, "unwatch failed during drop");
        }
    }
}
