use super::*;
use crate::camera::{ArbiterState, CameraArbiter, FrameMetadata, MockCameraBackend, Owner};
use crate::capture::{parse_capture_name, CaptureOutcome};
use crate::config::{CaptureWindowConfig, TimelapseConfig};
use crate::error::CameraError;
use crate::settings::{session_config, SessionPurpose};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn at(date: (i32, u32, u32), h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn test_config(root: &Path) -> TimelapseConfig {
    TimelapseConfig {
        capture_interval_seconds: 60,
        storage_path: root.to_string_lossy().into_owned(),
        still_warmup_ms: 0,
        ..TimelapseConfig::default()
    }
}

struct Harness {
    _dir: TempDir,
    root: std::path::PathBuf,
    backend: MockCameraBackend,
    arbiter: Arc<CameraArbiter>,
    clock: ManualClock,
}

impl Harness {
    fn new(start: NaiveDateTime) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let backend = MockCameraBackend::new();
        let arbiter = Arc::new(CameraArbiter::new(Arc::new(backend.clone())));
        Self {
            _dir: dir,
            root,
            backend,
            arbiter,
            clock: ManualClock::new(start),
        }
    }

    fn scheduler(&self, config: &TimelapseConfig) -> CaptureScheduler {
        CaptureScheduler::new(config, Arc::clone(&self.arbiter))
            .unwrap()
            .with_clock(Arc::new(self.clock.clone()))
    }

    fn image_files(&self) -> Vec<std::path::PathBuf> {
        let mut files = Vec::new();
        if let Ok(days) = std::fs::read_dir(&self.root) {
            for day in days.flatten() {
                if let Ok(entries) = std::fs::read_dir(day.path()) {
                    files.extend(entries.flatten().map(|e| e.path()));
                }
            }
        }
        files.sort();
        files
    }
}

fn make_day_folder(root: &Path, date: NaiveDate, images: usize) -> std::path::PathBuf {
    let folder = root.join(date.format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&folder).unwrap();
    for i in 0..images {
        std::fs::write(folder.join(format!("img_{}.jpg", i)), b"jpeg").unwrap();
    }
    folder
}

// Capture window

#[test]
fn test_window_same_day_is_inclusive() {
    let window = CaptureWindow::new(time(8, 0), time(20, 0));
    assert!(window.contains(time(8, 0)));
    assert!(window.contains(time(12, 30)));
    assert!(window.contains(time(20, 0)));
    assert!(!window.contains(time(7, 59)));
    assert!(!window.contains(time(20, 1)));
    assert!(!window.is_overnight());
}

#[test]
fn test_window_overnight_wraps() {
    let window = CaptureWindow::new(time(22, 0), time(6, 0));
    assert!(window.is_overnight());
    assert!(window.contains(time(22, 0)));
    assert!(window.contains(time(23, 59)));
    assert!(window.contains(time(0, 0)));
    assert!(window.contains(time(6, 0)));
    assert!(!window.contains(time(6, 1)));
    assert!(!window.contains(time(12, 0)));
    assert!(!window.contains(time(21, 59)));
}

#[test]
fn test_window_matches_predicate_for_every_minute() {
    let bounds = [
        (time(0, 0), time(23, 59)),
        (time(9, 15), time(17, 45)),
        (time(18, 0), time(7, 30)),
        (time(12, 0), time(12, 0)),
        (time(23, 0), time(0, 30)),
    ];

    for (start, end) in bounds {
        let window = CaptureWindow::new(start, end);
        for minute in 0..24 * 60 {
            let t = time(minute / 60, minute % 60);
            let expected = if start <= end {
                start <= t && t <= end
            } else {
                t >= start || t <= end
            };
            assert_eq!(window.contains(t), expected, "{}-{} at {}", start, end, t);
        }
    }
}

#[test]
fn test_disabled_window_always_passes() {
    let config = CaptureWindowConfig {
        enabled: false,
        start_time: "not a time".to_string(),
        end_time: "".to_string(),
    };
    let window = CaptureWindow::from_config(&config).unwrap();
    assert!(!window.is_enabled());
    for hour in 0..24 {
        assert!(window.contains(time(hour, 0)));
    }
}

#[test]
fn test_window_from_config_rejects_bad_times() {
    let config = CaptureWindowConfig {
        enabled: true,
        start_time: "25:00".to_string(),
        end_time: "06:00".to_string(),
    };
    assert!(CaptureWindow::from_config(&config).is_err());
}

#[test]
fn test_parse_time_of_day() {
    assert_eq!(parse_time_of_day("22:00"), Some(time(22, 0)));
    assert_eq!(
        parse_time_of_day("06:00:30"),
        NaiveTime::from_hms_opt(6, 0, 30)
    );
    assert_eq!(parse_time_of_day(" 07:15 "), Some(time(7, 15)));
    assert_eq!(parse_time_of_day("7pm"), None);
    assert_eq!(parse_time_of_day(""), None);
}

// Light gating

#[test]
fn test_light_score_decreases_with_exposure_gain_product() {
    let heuristic = ExposureGainHeuristic::default();
    let samples = [
        (1.0, 1.0),
        (100.0, 1.0),
        (500.0, 2.0),
        (10_000.0, 1.0),
        (10_000.0, 1.5),
        (33_000.0, 4.0),
        (120_000.0, 16.0),
    ];

    let scores: Vec<f64> = samples
        .iter()
        .map(|(exposure, gain)| heuristic.score(*exposure, *gain))
        .collect();
    for pair in scores.windows(2) {
        assert!(pair[0] > pair[1], "{:?}", scores);
    }
    assert!((heuristic.score(0.0, 0.0) - 1_000_000.0).abs() < f64::EPSILON);
}

#[test]
fn test_light_gate_threshold_is_strict() {
    let gate = LightGate::new(100.0);
    // 1e6 / (9999 * 1 + 1) == 100
    let reading = gate.evaluate(Ok(FrameMetadata {
        exposure_time_us: 9_999.0,
        analogue_gain: 1.0,
    }));
    assert!(!reading.lights_on);

    let reading = gate.evaluate(Ok(FrameMetadata {
        exposure_time_us: 5_000.0,
        analogue_gain: 1.0,
    }));
    assert!(reading.lights_on);
    assert!(reading.score.unwrap() > 100.0);
}

#[test]
fn test_light_gate_fails_open() {
    let gate = LightGate::new(1e12);
    let reading = gate.evaluate(Err(CameraError::MetadataUnavailable {
        details: "sensor timeout".to_string(),
    }));
    assert!(reading.lights_on);
    assert_eq!(reading.score, None);
}

struct AlwaysDark;

impl LightHeuristic for AlwaysDark {
    fn score(&self, _exposure_time_us: f64, _analogue_gain: f64) -> f64 {
        0.0
    }
}

// Retention

#[tokio::test]
async fn test_retention_boundary() {
    let dir = TempDir::new().unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let policy = RetentionPolicy::new(7);

    let kept = make_day_folder(dir.path(), today - chrono::Days::new(7), 1);
    let deleted = make_day_folder(dir.path(), today - chrono::Days::new(8), 2);

    let result = policy.run(dir.path(), today).await.unwrap();
    assert!(kept.exists());
    assert!(!deleted.exists());
    assert_eq!(result.images_deleted, 2);
    assert_eq!(result.folders_removed, 1);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_retention_skips_malformed_and_foreign_entries() {
    let dir = TempDir::new().unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

    std::fs::create_dir_all(dir.path().join("thumbnails")).unwrap();
    std::fs::create_dir_all(dir.path().join("2024-13-01")).unwrap();
    std::fs::write(dir.path().join("2020-01-01"), b"a file, not a folder").unwrap();

    let old = make_day_folder(dir.path(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 1);
    std::fs::write(old.join("notes.txt"), b"keep me").unwrap();

    let result = RetentionPolicy::new(7).run(dir.path(), today).await.unwrap();
    assert_eq!(result.images_deleted, 1);
    assert_eq!(result.folders_removed, 0);
    assert!(old.join("notes.txt").exists());
    assert!(!old.join("img_0.jpg").exists());
    assert!(dir.path().join("thumbnails").exists());
    assert!(dir.path().join("2024-13-01").exists());
}

#[tokio::test]
async fn test_retention_missing_root() {
    let dir = TempDir::new().unwrap();
    let result = RetentionPolicy::new(1)
        .run(&dir.path().join("absent"), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(result.images_deleted, 0);
}

#[tokio::test]
async fn test_cleanup_scenario_ten_and_three_days() {
    let now = at((2024, 6, 15), 9, 0, 0);
    let harness = Harness::new(now);
    let config = TimelapseConfig {
        capture_interval_seconds: 5,
        keep_days: 7,
        ..test_config(&harness.root)
    };

    let old = make_day_folder(&harness.root, now.date() - chrono::Days::new(10), 2);
    let recent = make_day_folder(&harness.root, now.date() - chrono::Days::new(3), 2);

    let scheduler = harness.scheduler(&config);
    let result = scheduler.run_cleanup(now).await;

    assert!(!old.exists());
    assert!(recent.join("img_0.jpg").exists());
    assert!(recent.join("img_1.jpg").exists());
    assert_eq!(result.images_deleted, 2);
    assert_eq!(result.folders_removed, 1);
}

#[tokio::test]
async fn test_cleanup_runs_once_per_elapsed_day() {
    let start = at((2024, 6, 15), 9, 0, 0);
    let harness = Harness::new(start);
    let mut scheduler = harness.scheduler(&test_config(&harness.root));

    let old = make_day_folder(&harness.root, start.date() - chrono::Days::new(30), 1);

    // First call only records the reference time
    assert!(scheduler.maybe_cleanup().await.is_none());

    harness.clock.advance(chrono::Duration::hours(23));
    assert!(scheduler.maybe_cleanup().await.is_none());
    assert!(old.exists());

    harness.clock.advance(chrono::Duration::hours(1));
    let result = scheduler.maybe_cleanup().await.unwrap();
    assert_eq!(result.folders_removed, 1);
    assert!(!old.exists());

    harness.clock.advance(chrono::Duration::hours(1));
    assert!(scheduler.maybe_cleanup().await.is_none());
}

// Ticks

#[tokio::test]
async fn test_three_ticks_capture_three_files() {
    let harness = Harness::new(at((2024, 6, 15), 11, 59, 30));
    let mut scheduler = harness.scheduler(&test_config(&harness.root));

    for _ in 0..3 {
        let record = scheduler.tick().await;
        assert_eq!(record.outcome, CaptureOutcome::Captured);
        harness.clock.advance(chrono::Duration::seconds(60));
    }

    let files = harness.image_files();
    assert_eq!(files.len(), 3);

    let mut stamps: Vec<NaiveDateTime> = files
        .iter()
        .map(|p| {
            let name = p.file_name().unwrap().to_str().unwrap();
            assert_eq!(name.len(), "YYYYMMDD_HHMMSS.jpg".len());
            parse_capture_name(name).unwrap()
        })
        .collect();
    stamps.sort();
    stamps.dedup();
    assert_eq!(stamps.len(), 3);
    for pair in stamps.windows(2) {
        assert!(pair[1] - pair[0] >= chrono::Duration::seconds(60));
    }

    assert_eq!(scheduler.stats().captured, 3);
    assert_eq!(harness.arbiter.state(), ArbiterState::Idle);
    assert_eq!(harness.backend.open_devices(), 0);
}

#[tokio::test]
async fn test_outside_window_skips_without_acquiring() {
    let harness = Harness::new(at((2024, 6, 15), 12, 0, 0));
    let config = TimelapseConfig {
        capture_window: CaptureWindowConfig {
            enabled: true,
            start_time: "22:00".to_string(),
            end_time: "06:00".to_string(),
        },
        ..test_config(&harness.root)
    };
    let mut scheduler = harness.scheduler(&config);

    let record = scheduler.tick().await;
    assert_eq!(record.outcome, CaptureOutcome::SkippedWindow);
    assert!(harness.image_files().is_empty());
    assert_eq!(harness.backend.total_opens(), 0);
    assert_eq!(scheduler.stats().skipped_window, 1);
}

#[tokio::test]
async fn test_dark_scene_skips_and_releases() {
    let harness = Harness::new(at((2024, 6, 15), 23, 0, 0));
    let config = TimelapseConfig {
        lights_only_mode: true,
        light_threshold: 50.0,
        ..test_config(&harness.root)
    };
    harness.backend.set_metadata(Some(FrameMetadata {
        exposure_time_us: 100_000.0,
        analogue_gain: 8.0,
    }));
    let mut scheduler = harness.scheduler(&config);

    let record = scheduler.tick().await;
    assert_eq!(record.outcome, CaptureOutcome::SkippedLight);
    assert!(record.light_score.unwrap() < 50.0);
    assert!(harness.image_files().is_empty());
    assert_eq!(harness.arbiter.state(), ArbiterState::Idle);
    assert_eq!(harness.backend.open_devices(), 0);
}

#[tokio::test]
async fn test_bright_scene_captures() {
    let harness = Harness::new(at((2024, 6, 15), 14, 0, 0));
    let config = TimelapseConfig {
        lights_only_mode: true,
        ..test_config(&harness.root)
    };
    harness.backend.set_metadata(Some(FrameMetadata {
        exposure_time_us: 1_000.0,
        analogue_gain: 1.0,
    }));
    let mut scheduler = harness.scheduler(&config);

    let record = scheduler.tick().await;
    assert_eq!(record.outcome, CaptureOutcome::Captured);
    assert!(record.light_score.unwrap() > 50.0);
}

#[tokio::test]
async fn test_missing_metadata_still_captures() {
    let harness = Harness::new(at((2024, 6, 15), 14, 0, 0));
    let config = TimelapseConfig {
        lights_only_mode: true,
        light_threshold: 1e12,
        ..test_config(&harness.root)
    };
    harness.backend.set_metadata(None);
    let mut scheduler = harness.scheduler(&config);

    let record = scheduler.tick().await;
    assert_eq!(record.outcome, CaptureOutcome::Captured);
    assert_eq!(harness.image_files().len(), 1);
}

#[tokio::test]
async fn test_light_gating_needs_metering_backend() {
    let harness = Harness::new(at((2024, 6, 15), 14, 0, 0));
    let config = TimelapseConfig {
        lights_only_mode: true,
        ..test_config(&harness.root)
    };
    assert!(harness.scheduler(&config).light_gating_effective());
    assert!(!harness
        .scheduler(&test_config(&harness.root))
        .light_gating_effective());

    harness.backend.set_can_meter(false);
    harness.backend.set_metadata(None);
    let mut scheduler = harness.scheduler(&config);
    assert!(!scheduler.light_gating_effective());

    // Without metering the gate fails open
    let record = scheduler.tick().await;
    assert_eq!(record.outcome, CaptureOutcome::Captured);
    assert_eq!(record.light_score, None);
}

#[tokio::test]
async fn test_custom_light_heuristic() {
    let harness = Harness::new(at((2024, 6, 15), 14, 0, 0));
    let config = TimelapseConfig {
        lights_only_mode: true,
        ..test_config(&harness.root)
    };
    let mut scheduler = harness
        .scheduler(&config)
        .with_light_heuristic(Box::new(AlwaysDark));

    assert_eq!(scheduler.tick().await.outcome, CaptureOutcome::SkippedLight);
}

#[tokio::test]
async fn test_busy_camera_is_skipped() {
    let harness = Harness::new(at((2024, 6, 15), 14, 0, 0));
    let mut scheduler = harness.scheduler(&test_config(&harness.root));

    let session = session_config(
        SessionPurpose::Video,
        1280,
        960,
        &TimelapseConfig::default().camera_settings,
    );
    let stream_lease = harness.arbiter.acquire(Owner::Stream, &session).await.unwrap();

    let record = scheduler.tick().await;
    assert_eq!(record.outcome, CaptureOutcome::SkippedBusy);
    assert_eq!(scheduler.stats().skipped_busy, 1);
    assert_eq!(scheduler.stats().failed, 0);
    assert!(harness.image_files().is_empty());

    stream_lease.release().await;
    harness.clock.advance(chrono::Duration::seconds(60));
    assert_eq!(scheduler.tick().await.outcome, CaptureOutcome::Captured);
}

#[tokio::test]
async fn test_capture_failure_is_transient() {
    let harness = Harness::new(at((2024, 6, 15), 14, 0, 0));
    let mut scheduler = harness.scheduler(&test_config(&harness.root));

    harness.backend.set_fail_capture(true);
    for _ in 0..FAILURE_ALERT_THRESHOLD {
        let record = scheduler.tick().await;
        assert_eq!(record.outcome, CaptureOutcome::Failed);
        assert!(record.error.is_some());
        harness.clock.advance(chrono::Duration::seconds(60));
    }
    assert!(scheduler.stats().needs_attention());
    assert!(harness.image_files().is_empty());
    assert_eq!(harness.arbiter.state(), ArbiterState::Idle);
    assert_eq!(harness.backend.open_devices(), 0);

    harness.backend.set_fail_capture(false);
    assert_eq!(scheduler.tick().await.outcome, CaptureOutcome::Captured);
    assert_eq!(scheduler.stats().consecutive_failures, 0);
    assert_eq!(scheduler.stats().failed, u64::from(FAILURE_ALERT_THRESHOLD));
}

#[tokio::test]
async fn test_open_failure_counts_as_failed() {
    let harness = Harness::new(at((2024, 6, 15), 14, 0, 0));
    let mut scheduler = harness.scheduler(&test_config(&harness.root));
    harness.backend.set_fail_open(true);

    assert_eq!(scheduler.tick().await.outcome, CaptureOutcome::Failed);
    assert_eq!(harness.arbiter.state(), ArbiterState::Idle);
}

// Run loop

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_capture() {
    let harness = Harness::new(at((2024, 6, 15), 14, 0, 0));
    harness.backend.set_capture_delay(Duration::from_millis(200));
    let scheduler = harness.scheduler(&test_config(&harness.root));
    let mut state = scheduler.subscribe_state();

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(shutdown.clone()));

    state
        .wait_for(|s| *s == SchedulerState::Running)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.captured, 1);
    assert_eq!(harness.image_files().len(), 1);
    assert_eq!(*state.borrow(), SchedulerState::Stopped);
    assert_eq!(harness.arbiter.state(), ArbiterState::Idle);
}

#[tokio::test]
async fn test_cancelled_before_start_does_nothing() {
    let harness = Harness::new(at((2024, 6, 15), 14, 0, 0));
    let scheduler = harness.scheduler(&test_config(&harness.root));

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let stats = scheduler.run(shutdown).await;

    assert_eq!(stats.ticks(), 0);
    assert_eq!(harness.backend.total_opens(), 0);
}

#[test]
fn test_stats_summary_line() {
    let mut stats = CaptureStats::default();
    stats.record(CaptureOutcome::Captured);
    stats.record(CaptureOutcome::SkippedWindow);
    stats.record(CaptureOutcome::SkippedLight);
    stats.record(CaptureOutcome::SkippedBusy);
    stats.record(CaptureOutcome::Failed);

    assert_eq!(stats.to_string(), "Captured: 1, Skipped: 3, Failed: 1");
    assert_eq!(stats.ticks(), 5);
    assert_eq!(stats.consecutive_failures, 1);
}
