//! u2relay 공통 크레이트
//!
//! 바이너리 IDS 로그(unified2)를 텍스트로 변환해 하나의 집계 파일에 누적하는
//! `u2relay`의 모든 크레이트가 공유하는 타입을 제공합니다.
//!
//! - [`config`]: `u2relay.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`error`]: 최상위 에러 타입
//! - [`pipeline`]: 모듈 생명주기 trait
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, MonitorError, U2RelayError};

// 설정
pub use config::U2RelayConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};
