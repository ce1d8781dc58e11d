use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// What a single scheduler tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureOutcome {
    Captured,
    SkippedWindow,
    SkippedLight,
    SkippedBusy,
    Failed,
}

impl fmt::Display for CaptureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureOutcome::Captured => "captured",
            CaptureOutcome::SkippedWindow => "skipped-window",
            CaptureOutcome::SkippedLight => "skipped-light",
            CaptureOutcome::SkippedBusy => "skipped-busy",
            CaptureOutcome::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A stored image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureReceipt {
    pub path: PathBuf,
    pub bytes: u64,
    pub timestamp: NaiveDateTime,
}

impl CaptureReceipt {
    pub fn size_mb(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Per-tick log entry; logged, never persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureRecord {
    pub timestamp: NaiveDateTime,
    pub outcome: CaptureOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<CaptureReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureRecord {
    pub fn skipped(timestamp: NaiveDateTime, outcome: CaptureOutcome) -> Self {
        Self {
            timestamp,
            outcome,
            receipt: None,
            light_score: None,
            error: None,
        }
    }

    pub fn captured(receipt: CaptureReceipt) -> Self {
        Self {
            timestamp: receipt.timestamp,
            outcome: CaptureOutcome::Captured,
            receipt: Some(receipt),
            light_score: None,
            error: None,
        }
    }

    pub fn failed(timestamp: NaiveDateTime, error: impl fmt::Display) -> Self {
        Self {
            timestamp,
            outcome: CaptureOutcome::Failed,
            receipt: None,
            light_score: None,
            error: Some(error.to_string()),
        }
    }

    pub fn with_light_score(mut self, score: Option<f64>) -> Self {
        self.light_score = score;
        self
    }
}
