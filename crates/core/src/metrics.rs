//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! recorder가 설치되지 않은 경우 `metrics::counter!()` 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `u2relay_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 이벤트 종류 레이블 키 (create, modify)
pub const LABEL_EVENT_KIND: &str = "kind";

// ─── Log Monitor 메트릭 ────────────────────────────────────────────

/// 집계 파일에 병합된 엔트리 수 (counter)
pub const MONITOR_ENTRIES_MERGED_TOTAL: &str = "u2relay_monitor_entries_merged_total";

/// 집계 파일에 기록된 바이트 수 (counter)
pub const MONITOR_SINK_BYTES_TOTAL: &str = "u2relay_monitor_sink_bytes_total";

/// 디코더 실패 수 (counter)
pub const MONITOR_DECODE_FAILURES_TOTAL: &str = "u2relay_monitor_decode_failures_total";

/// 집계 파일 쓰기 실패 수 (counter)
pub const MONITOR_SINK_FAILURES_TOTAL: &str = "u2relay_monitor_sink_failures_total";

/// 빈 파일로 건너뛴 수 (counter)
pub const MONITOR_EMPTY_SKIPPED_TOTAL: &str = "u2relay_monitor_empty_skipped_total";

/// 라우팅된 파일시스템 이벤트 수 (counter, label: kind)
pub const MONITOR_EVENTS_ROUTED_TOTAL: &str = "u2relay_monitor_events_routed_total";

/// 추적 중인 파일 수 (gauge)
pub const MONITOR_TRACKED_FILES: &str = "u2relay_monitor_tracked_files";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// 데몬 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "u2relay_daemon_uptime_seconds";

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "u2relay_daemon_build_info";

/// 모든 메트릭 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        MONITOR_ENTRIES_MERGED_TOTAL,
        "Decoded entries appended to the aggregated sink"
    );
    describe_counter!(
        MONITOR_SINK_BYTES_TOTAL,
        "Bytes appended to the aggregated sink"
    );
    describe_counter!(
        MONITOR_DECODE_FAILURES_TOTAL,
        "Decoder invocations that failed (launch, exit status, stderr, timeout)"
    );
    describe_counter!(
        MONITOR_SINK_FAILURES_TOTAL,
        "Appends to the aggregated sink that failed"
    );
    describe_counter!(
        MONITOR_EMPTY_SKIPPED_TOTAL,
        "Zero-length log files skipped without decoding"
    );
    describe_counter!(
        MONITOR_EVENTS_ROUTED_TOTAL,
        "Filesystem events accepted by the router (label: kind)"
    );
    describe_gauge!(
        MONITOR_TRACKED_FILES,
        "Log files with a recorded processed size"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Seconds since the daemon started");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (label: version)");
}
