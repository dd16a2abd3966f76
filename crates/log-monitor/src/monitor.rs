//! 로그 모니터 -- 감시자, 디스패처, 시작 스윕의 생명주기를 관리합니다.
//!
//! [`LogMonitor`]는 core의 [`Pipeline`] trait을 구현하여 데몬에서
//! start/stop/health_check로 관리됩니다.
//!
//! # 시작 순서
//! 1. 감시 디렉토리 확인 및 정규화 (없으면 시작 실패)
//! 2. notify 구독 시작, 디스패처 태스크 스폰
//! 3. 시작 스윕 (기존 파일 한 번씩 처리)
//!
//! 구독을 스윕보다 먼저 시작하므로 스윕 도중 생성된 파일도 놓치지 않습니다.
//! 양쪽에서 같은 파일을 처리하더라도 처리기의 크기 비교가 중복 병합을 막습니다.
//!
//! [`ShutdownHandle`]로 시작 스윕 도중에도 종료를 요청할 수 있습니다.
//! 스윕은 처리 중인 파일까지만 마치고 멈춥니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use u2relay_core::error::{MonitorError, U2RelayError};
use u2relay_core::pipeline::{HealthStatus, Pipeline};

use crate::config::LogMonitorConfig;
use crate::decoder::{CommandDecoder, Decoder};
use crate::engine::LogProcessor;
use crate::error::LogMonitorError;
use crate::merger::LogMerger;
use crate::router::{EventRouter, dispatch_events};
use crate::sweep::{SweepSummary, run_startup_sweep};
use crate::watcher::DirectoryWatcher;

/// 모니터 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    /// 생성됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 종료 요청 핸들
///
/// 모니터를 `&mut`로 빌려 `start()`를 기다리는 동안에도 다른 곳에서
/// 종료를 요청할 수 있습니다. 요청은 다음 `stop()`이 끝날 때 초기화됩니다.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// 종료를 요청합니다. 스윕과 디스패처는 처리 중인 파일을 마친 뒤 멈춥니다.
    pub fn trigger(&self) {
        self.stop_tx.send_replace(true);
    }

    /// 종료가 요청되었는지 확인합니다.
    pub fn is_triggered(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

/// 로그 모니터
///
/// # 사용 예시
/// ```ignore
/// use u2relay_log_monitor::{CommandDecoder, LogMonitorBuilder};
///
/// let mut monitor = LogMonitorBuilder::new()
///     .config(config.clone())
///     .decoder(CommandDecoder::from_config(&config))
///     .build()?;
///
/// monitor.start().await?;
/// // ... 종료 신호 대기
/// monitor.stop().await?;
/// ```
pub struct LogMonitor<D: Decoder> {
    config: LogMonitorConfig,
    processor: Arc<LogProcessor<D>>,
    state: MonitorState,
    watcher: Option<DirectoryWatcher>,
    dispatcher: Option<JoinHandle<()>>,
    stop_tx: Arc<watch::Sender<bool>>,
    last_sweep: Option<SweepSummary>,
}

impl<D: Decoder> LogMonitor<D> {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            MonitorState::Initialized => "initialized",
            MonitorState::Running => "running",
            MonitorState::Stopped => "stopped",
        }
    }

    /// 설정을 반환합니다.
    pub fn config(&self) -> &LogMonitorConfig {
        &self.config
    }

    /// 공유 처리기를 반환합니다.
    pub fn processor(&self) -> &Arc<LogProcessor<D>> {
        &self.processor
    }

    /// 종료 요청 핸들을 반환합니다.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            stop_tx: Arc::clone(&self.stop_tx),
        }
    }

    /// 마지막 시작 스윕 결과를 반환합니다.
    pub fn last_sweep(&self) -> Option<SweepSummary> {
        self.last_sweep
    }

    /// 감시 없이 시작 스윕만 한 번 실행합니다.
    pub async fn run_once(&mut self) -> Result<SweepSummary, LogMonitorError> {
        let watch_dir = resolve_watch_dir(&self.config.watch_dir).await?;
        let router = EventRouter::for_dir(&self.config, watch_dir);
        check_output_outside_pattern(&router, &self.config.output_path).await?;
        let stop_rx = self.stop_tx.subscribe();
        let summary = run_startup_sweep(&self.processor, &router, &stop_rx).await?;
        self.last_sweep = Some(summary);
        Ok(summary)
    }

    async fn start_inner(&mut self) -> Result<(), LogMonitorError> {
        let watch_dir = resolve_watch_dir(&self.config.watch_dir).await?;
        let router = EventRouter::for_dir(&self.config, watch_dir.clone());
        check_output_outside_pattern(&router, &self.config.output_path).await?;

        let (event_tx, event_rx) = mpsc::channel(self.config.event_channel_capacity);
        let watcher = DirectoryWatcher::start(&watch_dir, event_tx)?;

        let dispatcher = tokio::spawn(dispatch_events(
            Arc::clone(&self.processor),
            router.clone(),
            event_rx,
            self.stop_tx.subscribe(),
        ));

        self.watcher = Some(watcher);
        self.dispatcher = Some(dispatcher);

        let stop_rx = self.stop_tx.subscribe();
        let summary = match run_startup_sweep(&self.processor, &router, &stop_rx).await {
            Ok(summary) => summary,
            Err(e) => {
                self.teardown().await;
                return Err(e);
            }
        };
        self.last_sweep = Some(summary);
        Ok(())
    }

    /// 감시자를 해제하고 디스패처를 종료합니다.
    ///
    /// 처리 중인 파일은 `shutdown_timeout`까지 기다린 뒤 중단합니다.
    async fn teardown(&mut self) {
        // 감시자를 먼저 drop하여 새 이벤트 유입을 막음
        self.watcher.take();
        self.stop_tx.send_replace(true);

        if let Some(mut handle) = self.dispatcher.take() {
            match tokio::time::timeout(self.config.shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "event dispatcher task failed"),
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = self.config.shutdown_timeout.as_secs(),
                        "event dispatcher did not stop in time, aborting in-flight work"
                    );
                    handle.abort();
                }
            }
        }

        // 다음 start()를 위해 초기화
        self.stop_tx.send_replace(false);
    }
}

impl<D: Decoder> Pipeline for LogMonitor<D> {
    async fn start(&mut self) -> Result<(), U2RelayError> {
        if self.state == MonitorState::Running {
            return Err(MonitorError::AlreadyRunning.into());
        }

        tracing::info!(
            watch_dir = %self.config.watch_dir.display(),
            prefix = %self.config.file_prefix,
            output = %self.config.output_path.display(),
            "starting log monitor"
        );

        self.start_inner().await.map_err(U2RelayError::from)?;

        self.state = MonitorState::Running;
        tracing::info!("log monitor started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), U2RelayError> {
        if self.state != MonitorState::Running {
            return Err(MonitorError::NotRunning.into());
        }

        tracing::info!("stopping log monitor");
        self.teardown().await;

        self.state = MonitorState::Stopped;
        let tracked_files = self.processor.tracked_count().await;
        tracing::info!(tracked_files, "log monitor stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            MonitorState::Running => match &self.dispatcher {
                Some(handle) if !handle.is_finished() => HealthStatus::Healthy,
                _ => HealthStatus::Degraded("event dispatcher is not running".to_owned()),
            },
            MonitorState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            MonitorState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 감시 디렉토리가 존재하는 디렉토리인지 확인하고 정규화된 경로를 반환합니다.
///
/// notify 이벤트 경로와 비교하므로 심볼릭 링크를 해석한 경로를 사용합니다.
async fn resolve_watch_dir(dir: &Path) -> Result<PathBuf, LogMonitorError> {
    let watch_dir_err = |reason: String| LogMonitorError::WatchDir {
        path: dir.to_path_buf(),
        reason,
    };

    let canonical = tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| watch_dir_err(e.to_string()))?;
    let metadata = tokio::fs::metadata(&canonical)
        .await
        .map_err(|e| watch_dir_err(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(watch_dir_err("not a directory".to_owned()));
    }
    Ok(canonical)
}

/// 집계 파일이 감시 대상 이름 규칙에 걸리지 않는지 정규화된 경로로 확인합니다.
///
/// 설정 검증은 원본 경로만 비교하므로 상대 경로나 심볼릭 링크를 거친 경로는
/// 여기서 다시 확인합니다. 부모 디렉토리가 없으면 원본 경로로 비교합니다.
async fn check_output_outside_pattern(
    router: &EventRouter,
    output_path: &Path,
) -> Result<(), LogMonitorError> {
    let resolved = match (output_path.parent(), output_path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            match tokio::fs::canonicalize(parent).await {
                Ok(dir) => dir.join(name),
                Err(_) => output_path.to_path_buf(),
            }
        }
        _ => output_path.to_path_buf(),
    };

    if router.matches(&resolved) {
        return Err(LogMonitorError::Config {
            field: "output_path".to_owned(),
            reason: format!(
                "{} resolves into the watched log file pattern",
                resolved.display()
            ),
        });
    }
    Ok(())
}

/// 로그 모니터 빌더
pub struct LogMonitorBuilder<D: Decoder = CommandDecoder> {
    config: LogMonitorConfig,
    decoder: Option<D>,
}

impl LogMonitorBuilder<CommandDecoder> {
    /// 기본 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: LogMonitorConfig::default(),
            decoder: None,
        }
    }
}

impl Default for LogMonitorBuilder<CommandDecoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Decoder> LogMonitorBuilder<D> {
    /// 모니터 설정을 지정합니다.
    pub fn config(mut self, config: LogMonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// 디코더를 지정합니다.
    pub fn decoder<E: Decoder>(self, decoder: E) -> LogMonitorBuilder<E> {
        LogMonitorBuilder {
            config: self.config,
            decoder: Some(decoder),
        }
    }

    /// 설정을 검증하고 모니터를 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정이 유효하지 않거나 디코더가 지정되지 않은 경우.
    pub fn build(self) -> Result<LogMonitor<D>, LogMonitorError> {
        self.config.validate()?;
        let decoder = self.decoder.ok_or_else(|| LogMonitorError::Config {
            field: "decoder".to_owned(),
            reason: "decoder must be set".to_owned(),
        })?;

        let processor = LogProcessor::new(
            decoder,
            LogMerger::new(self.config.output_path.clone()),
            self.config.grace_period,
        );
        let (stop_tx, _) = watch::channel(false);

        Ok(LogMonitor {
            config: self.config,
            processor: Arc::new(processor),
            state: MonitorState::Initialized,
            watcher: None,
            dispatcher: None,
            stop_tx: Arc::new(stop_tx),
            last_sweep: None,
        })
    }
}
