//! 파일시스템 이벤트 라우터
//!
//! notify 이벤트를 감시 디렉토리/파일 이름 규칙으로 걸러
//! [`ProcessRequest`]로 바꾸고, 디스패처 루프에서 처리기에 전달합니다.
//!
//! | 이벤트 | 요청 |
//! |--------|------|
//! | 파일 생성 | `check_size = false` |
//! | 디렉토리로 이름 변경되어 들어옴 | `check_size = false` |
//! | 내용/메타데이터 수정 | `check_size = true` |
//! | 디렉토리 이벤트, 삭제, 접근 | 무시 |
//!
//! 이벤트를 큐에 쌓거나 병합하지 않습니다. 같은 경로의 연속 이벤트는
//! 처리기의 크기 비교가 흡수합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use u2relay_core::metrics as m;

use crate::config::LogMonitorConfig;
use crate::decoder::Decoder;
use crate::engine::{LogProcessor, ProcessRequest};

/// 감시 대상 로그 파일 필터 겸 이벤트 라우터
#[derive(Debug, Clone)]
pub struct EventRouter {
    watch_dir: PathBuf,
    file_prefix: String,
}

impl EventRouter {
    /// 새 라우터를 생성합니다.
    pub fn new(watch_dir: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            file_prefix: file_prefix.into(),
        }
    }

    /// 설정의 감시 디렉토리 대신 `watch_dir`(정규화된 경로)을 사용해 생성합니다.
    pub fn for_dir(config: &LogMonitorConfig, watch_dir: impl Into<PathBuf>) -> Self {
        Self::new(watch_dir, config.file_prefix.clone())
    }

    /// 감시 디렉토리를 반환합니다.
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// 경로가 감시 디렉토리 바로 아래의 로그 파일 이름 규칙을 따르는지 확인합니다.
    pub fn matches(&self, path: &Path) -> bool {
        path.parent() == Some(self.watch_dir.as_path())
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&self.file_prefix))
    }

    /// 이벤트를 처리 요청 목록으로 변환합니다.
    pub fn route(&self, event: &Event) -> Vec<ProcessRequest> {
        let (paths, check_size): (&[PathBuf], bool) = match &event.kind {
            EventKind::Create(CreateKind::Folder) => return Vec::new(),
            EventKind::Create(_) => (&event.paths[..], false),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => return Vec::new(),
            // Both: [from, to]
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                (event.paths.get(1..).unwrap_or_default(), false)
            }
            EventKind::Modify(ModifyKind::Name(_)) => (&event.paths[..], false),
            EventKind::Modify(_) => (&event.paths[..], true),
            _ => return Vec::new(),
        };

        paths
            .iter()
            .filter(|path| self.matches(path) && !path.is_dir())
            .map(|path| ProcessRequest {
                path: path.clone(),
                check_size,
            })
            .collect()
    }
}

/// 디스패처 루프
///
/// 이벤트 채널이 닫히거나 `stop`이 `true`가 될 때까지 이벤트를 라우팅하고
/// 요청을 순서대로 처리합니다. 처리 중인 요청은 끝까지 진행한 뒤 종료 신호를
/// 확인합니다.
pub async fn dispatch_events<D: Decoder>(
    processor: Arc<LogProcessor<D>>,
    router: EventRouter,
    mut events: mpsc::Receiver<Event>,
    mut stop: watch::Receiver<bool>,
) {
    info!(watch_dir = %router.watch_dir().display(), "event dispatcher started");

    loop {
        if *stop.borrow_and_update() {
            debug!("event dispatcher received shutdown signal");
            break;
        }

        let event = tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() {
                    debug!("shutdown sender dropped");
                    break;
                }
                continue;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    debug!("event channel closed");
                    break;
                }
            },
        };

        for request in router.route(&event) {
            let kind = if request.check_size { "modify" } else { "create" };
            metrics::counter!(m::MONITOR_EVENTS_ROUTED_TOTAL, m::LABEL_EVENT_KIND => kind)
                .increment(1);
            debug!(path = %request.path.display(), kind, "routing filesystem event");
            processor.handle(&request).await;
        }
    }

    info!("event dispatcher stopped");
}
