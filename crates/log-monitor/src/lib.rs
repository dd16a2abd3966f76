#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`watcher`]: notify 기반 감시 디렉토리 구독
//! - [`router`]: 파일시스템 이벤트 필터링 및 디스패처 루프
//! - [`engine`]: 파일 처리기 (크기 비교, grace period, 디코딩, 병합)
//! - [`decoder`]: 외부 디코더 프로세스 호출 (`u2spewfoo`)
//! - [`merger`]: 집계 파일 엔트리 형식 및 추가 쓰기
//! - [`tracker`]: 파일별 마지막 처리 크기 추적
//! - [`sweep`]: 시작 시 기존 파일 일괄 처리
//! - [`monitor`]: 전체 생명주기 관리 (Pipeline trait 구현)
//! - [`config`]: 모니터 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! notify thread -> mpsc -> dispatcher -> LogProcessor -> Decoder -> LogMerger
//!                             |               |                        |
//!                        EventRouter    FileStateTracker         snort_logs.txt
//! ```

pub mod config;
pub mod error;
pub mod monitor;

pub mod decoder;
pub mod engine;
pub mod merger;
pub mod router;
pub mod sweep;
pub mod tracker;
pub mod watcher;

// --- 주요 타입 re-export ---

// 모니터
pub use monitor::{LogMonitor, LogMonitorBuilder, ShutdownHandle};

// 설정
pub use config::{LogMonitorConfig, LogMonitorConfigBuilder};

// 에러
pub use error::LogMonitorError;

// 처리기
pub use engine::{LogProcessor, ProcessOutcome, ProcessRequest};

// 디코더
pub use decoder::{CommandDecoder, Decoder};

// 집계
pub use merger::LogMerger;

// 추적
pub use tracker::FileStateTracker;

// 이벤트 라우팅
pub use router::EventRouter;
pub use sweep::SweepSummary;
