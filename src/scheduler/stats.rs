use crate::capture::CaptureOutcome;
use serde::Serialize;
use std::fmt;

/// Failed ticks in a row after which every further failure is logged as
/// needing attention
pub const FAILURE_ALERT_THRESHOLD: u32 = 10;

/// Running tick counters for the capture loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub captured: u64,
    pub skipped_window: u64,
    pub skipped_light: u64,
    pub skipped_busy: u64,
    pub failed: u64,
    pub consecutive_failures: u32,
}

impl CaptureStats {
    pub fn record(&mut self, outcome: CaptureOutcome) {
        match outcome {
            CaptureOutcome::Captured => self.captured += 1,
            CaptureOutcome::SkippedWindow => self.skipped_window += 1,
            CaptureOutcome::SkippedLight => self.skipped_light += 1,
            CaptureOutcome::SkippedBusy => self.skipped_busy += 1,
            CaptureOutcome::Failed => self.failed += 1,
        }

        if outcome == CaptureOutcome::Failed {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_window + self.skipped_light + self.skipped_busy
    }

    pub fn ticks(&self) -> u64 {
        self.captured + self.skipped() + self.failed
    }

    pub fn needs_attention(&self) -> bool {
        self.consecutive_failures >= FAILURE_ALERT_THRESHOLD
    }
}

impl fmt::Display for CaptureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Captured: {}, Skipped: {}, Failed: {}",
            self.captured,
            self.skipped(),
            self.failed
        )
    }
}
