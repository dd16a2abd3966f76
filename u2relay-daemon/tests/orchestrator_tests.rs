//! Orchestrator integration tests.
//!
//! Tests the full flow: config -> build -> start (sweep) -> watch -> shutdown,
//! using `cat` as a stand-in decoder.

#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use u2relay_core::config::U2RelayConfig;
use u2relay_daemon::orchestrator::Orchestrator;

const SEPARATOR: &str = "----- New Log Entries -----";

fn test_config(watch_dir: &Path, output: &Path) -> U2RelayConfig {
    let mut config = U2RelayConfig::default();
    config.monitor.watch_dir = watch_dir.display().to_string();
    config.monitor.output_path = output.display().to_string();
    config.monitor.decoder_binary = "cat".to_owned();
    config.monitor.grace_period_ms = 20;
    config.monitor.shutdown_timeout_secs = 2;
    config
}

fn entries(sink: &Path) -> usize {
    std::fs::read_to_string(sink)
        .map(|s| s.matches(SEPARATOR).count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_startup_sweep_then_clean_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let watch_dir = dir.path().join("ids");
    std::fs::create_dir(&watch_dir).unwrap();
    std::fs::write(watch_dir.join("snort.log.1"), "first\n").unwrap();
    std::fs::write(watch_dir.join("snort.log.2"), "second\n").unwrap();
    std::fs::write(watch_dir.join("snort.log.3"), "").unwrap();
    let sink = dir.path().join("snort_logs.txt");

    let mut orchestrator = Orchestrator::build_from_config(test_config(&watch_dir, &sink))
        .await
        .unwrap();
    assert!(!orchestrator.health().await.is_healthy());

    let sink_for_wait = sink.clone();
    orchestrator
        .run_until(async move { wait_for_entries(&sink_for_wait, 2).await })
        .await
        .unwrap();

    assert_eq!(entries(&sink), 2);
    let content = std::fs::read_to_string(&sink).unwrap();
    assert!(content.contains("first\n"));
    assert!(content.contains("second\n"));
    assert_eq!(orchestrator.monitor().state_name(), "stopped");
}

#[tokio::test]
async fn test_watch_merges_created_and_grown_files() {
    let dir = tempfile::tempdir().unwrap();
    let watch_dir = dir.path().join("ids");
    std::fs::create_dir(&watch_dir).unwrap();
    let sink = dir.path().join("snort_logs.txt");
    let log = watch_dir.join("snort.log.1700000000");

    let mut orchestrator = Orchestrator::build_from_config(test_config(&watch_dir, &sink))
        .await
        .unwrap();

    let sink_for_wait = sink.clone();
    orchestrator
        .run_until(async move {
            std::fs::write(&log, "alert one\n").unwrap();
            wait_for_entries(&sink_for_wait, 1).await;

            std::fs::write(&log, "alert one\nalert two\n").unwrap();
            wait_for_entries(&sink_for_wait, 2).await;
        })
        .await
        .unwrap();

    let content = std::fs::read_to_string(&sink).unwrap();
    assert!(entries(&sink) >= 2);
    // 두 번째 엔트리는 파일 전체를 다시 디코딩한 결과
    assert!(content.ends_with("alert one\nalert two\n"));
}

async fn wait_for_entries(sink: &Path, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while entries(sink) < expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {expected} entries"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_shutdown_during_startup_sweep_stops_early() {
    let dir = tempfile::tempdir().unwrap();
    let watch_dir = dir.path().join("ids");
    std::fs::create_dir(&watch_dir).unwrap();
    for i in 1..=6 {
        std::fs::write(watch_dir.join(format!("snort.log.{i}")), "alert\n").unwrap();
    }
    let sink = dir.path().join("snort_logs.txt");

    let mut config = test_config(&watch_dir, &sink);
    config.monitor.grace_period_ms = 300;
    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();

    // 스윕이 끝나기 전에 종료 신호가 도착
    let started = std::time::Instant::now();
    orchestrator.run_until(async {}).await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(1500));
    assert!(entries(&sink) < 6);
    let sweep = orchestrator.monitor().last_sweep().unwrap();
    assert!(sweep.interrupted);
    assert_eq!(orchestrator.monitor().state_name(), "stopped");
}

#[tokio::test]
async fn test_missing_watch_dir_fails_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("missing"), &dir.path().join("out.txt"));

    let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let err = orchestrator.run_until(async {}).await.unwrap_err();
    assert!(err.to_string().contains("failed to start log monitor"));
    assert!(!orchestrator.health().await.is_healthy());
}

#[tokio::test]
async fn test_run_once_processes_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("snort.log.1"), "payload\n").unwrap();
    let sink = dir.path().join("out").join("snort_logs.txt");
    std::fs::create_dir(dir.path().join("out")).unwrap();

    let mut orchestrator = Orchestrator::build_from_config(test_config(dir.path(), &sink))
        .await
        .unwrap();
    let summary = orchestrator.run_once().await.unwrap();

    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.merged, 1);
    assert_eq!(entries(&sink), 1);
}

#[tokio::test]
async fn test_invalid_config_rejected_at_build() {
    let mut config = U2RelayConfig::default();
    config.monitor.watch_dir = "relative".to_owned();
    assert!(Orchestrator::build_from_config(config).await.is_err());
}
