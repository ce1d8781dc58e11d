use super::clock::{Clock, SystemClock};
use super::light::{LightGate, LightHeuristic};
use super::retention::{CleanupResult, RetentionPolicy};
use super::stats::CaptureStats;
use super::window::CaptureWindow;
use crate::camera::{CameraArbiter, CameraLease, Owner};
use crate::capture::{capture_still, CaptureOutcome, CaptureRecord};
use crate::config::TimelapseConfig;
use crate::settings::{session_config, SessionConfig, SessionPurpose};
use chrono::NaiveDateTime;
use config::ConfigError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Running,
    ShuttingDown,
    Stopped,
}

/// Periodic capture loop with window and light gating and daily retention.
///
/// Interval, window and retention are fixed at construction; changing
/// them means building a new scheduler.
pub struct CaptureScheduler {
    arbiter: Arc<CameraArbiter>,
    interval: Duration,
    window: CaptureWindow,
    light_gate: Option<LightGate>,
    retention: RetentionPolicy,
    storage_root: PathBuf,
    session: SessionConfig,
    quality: u8,
    warmup: Duration,
    clock: Arc<dyn Clock>,
    stats: CaptureStats,
    last_cleanup: Option<NaiveDateTime>,
    state: watch::Sender<SchedulerState>,
}

impl CaptureScheduler {
    pub fn new(config: &TimelapseConfig, arbiter: Arc<CameraArbiter>) -> Result<Self, ConfigError> {
        let window = CaptureWindow::from_config(&config.capture_window)?;
        let light_gate = config
            .lights_only_mode
            .then(|| LightGate::new(config.light_threshold));
        if light_gate.is_some() && !arbiter.can_meter() {
            warn!(
                "Lights only mode is enabled but the {} camera backend cannot read exposure \
                 metadata; every tick will pass the light check",
                arbiter.backend_name()
            );
        }
        let (state, _) = watch::channel(SchedulerState::Stopped);

        Ok(Self {
            arbiter,
            interval: Duration::from_secs(config.capture_interval_seconds),
            window,
            light_gate,
            retention: RetentionPolicy::new(config.keep_days),
            storage_root: PathBuf::from(&config.storage_path),
            session: session_config(
                SessionPurpose::Still,
                config.resolution.width,
                config.resolution.height,
                &config.camera_settings,
            ),
            quality: config.image_quality,
            warmup: Duration::from_millis(config.still_warmup_ms),
            clock: Arc::new(SystemClock),
            stats: CaptureStats::default(),
            last_cleanup: None,
            state,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the light heuristic, keeping the configured threshold
    pub fn with_light_heuristic(mut self, heuristic: Box<dyn LightHeuristic>) -> Self {
        if let Some(gate) = self.light_gate.take() {
            self.light_gate = Some(LightGate::with_heuristic(gate.threshold(), heuristic));
        }
        self
    }

    /// True when ticks can actually be skipped for darkness
    pub fn light_gating_effective(&self) -> bool {
        self.light_gate.is_some() && self.arbiter.can_meter()
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Run until `shutdown` is cancelled. A capture in progress when the
    /// token fires is completed before the loop exits.
    pub async fn run(mut self, shutdown: CancellationToken) -> CaptureStats {
        self.state.send_replace(SchedulerState::Running);
        info!(
            "Capture scheduler running (every {}s, camera backend: {})",
            self.interval.as_secs(),
            self.arbiter.backend_name()
        );
        self.last_cleanup.get_or_insert_with(|| self.clock.now());

        while !shutdown.is_cancelled() {
            self.tick().await;
            self.maybe_cleanup().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state.send_replace(SchedulerState::ShuttingDown);
        info!("Shutting down...");
        info!("Final statistics - {}", self.stats);
        self.state.send_replace(SchedulerState::Stopped);

        self.stats
    }

    /// Evaluate and act on one tick at the clock's current time
    pub async fn tick(&mut self) -> CaptureRecord {
        let now = self.clock.now();
        let record = self.evaluate(now).await;
        self.stats.record(record.outcome);

        match record.outcome {
            CaptureOutcome::Captured => {}
            CaptureOutcome::Failed => {
                warn!(
                    "Capture failed: {}",
                    record.error.as_deref().unwrap_or("unknown error")
                );
                if self.stats.needs_attention() {
                    error!(
                        "Capture has failed {} consecutive times - manual intervention may be required",
                        self.stats.consecutive_failures
                    );
                }
            }
            outcome => debug!("Skipping capture - {}", outcome),
        }

        record
    }

    async fn evaluate(&self, now: NaiveDateTime) -> CaptureRecord {
        if !self.window.contains(now.time()) {
            return CaptureRecord::skipped(now, CaptureOutcome::SkippedWindow);
        }

        let mut lease = match self.arbiter.acquire(Owner::Scheduler, &self.session).await {
            Ok(lease) => lease,
            Err(e) if e.is_busy() => {
                return CaptureRecord::skipped(now, CaptureOutcome::SkippedBusy);
            }
            Err(e) => return CaptureRecord::failed(now, e),
        };

        let record = self.capture_with(&mut lease, now).await;
        lease.release().await;
        record
    }

    async fn capture_with(&self, lease: &mut CameraLease, now: NaiveDateTime) -> CaptureRecord {
        if let Err(e) = lease.prepare(self.warmup).await {
            return CaptureRecord::failed(now, e);
        }

        let mut light_score = None;
        if let Some(gate) = &self.light_gate {
            let reading = gate.evaluate(lease.capture_metadata().await);
            light_score = reading.score;
            if !reading.lights_on {
                return CaptureRecord::skipped(now, CaptureOutcome::SkippedLight)
                    .with_light_score(light_score);
            }
        }

        match capture_still(lease, &self.storage_root, now, self.quality).await {
            Ok(receipt) => CaptureRecord::captured(receipt).with_light_score(light_score),
            Err(e) => CaptureRecord::failed(now, e).with_light_score(light_score),
        }
    }

    /// Run retention if a full day has passed since the last pass
    pub async fn maybe_cleanup(&mut self) -> Option<CleanupResult> {
        let now = self.clock.now();
        let last = *self.last_cleanup.get_or_insert(now);
        if now - last < chrono::Duration::days(1) {
            return None;
        }

        let result = self.run_cleanup(now).await;
        self.last_cleanup = Some(now);
        info!("Statistics - {}", self.stats);
        Some(result)
    }

    /// One retention pass relative to `now`'s calendar date
    pub async fn run_cleanup(&self, now: NaiveDateTime) -> CleanupResult {
        match self.retention.run(&self.storage_root, now.date()).await {
            Ok(result) => result,
            Err(e) => {
                error!("Error during cleanup: {}", e);
                CleanupResult {
                    errors: vec![e.to_string()],
                    ..CleanupResult::default()
                }
            }
        }
    }
}
