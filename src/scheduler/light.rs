use crate::camera::FrameMetadata;
use crate::error::CameraError;
use tracing::{debug, warn};

/// Maps sensor exposure readings to an ambient light score.
///
/// Higher scores mean brighter scenes.
pub trait LightHeuristic: Send + Sync {
    fn score(&self, exposure_time_us: f64, analogue_gain: f64) -> f64;
}

/// `k / (exposure_time * gain + 1)`: short exposures at low gain imply light
#[derive(Debug, Clone, Copy)]
pub struct ExposureGainHeuristic {
    pub k: f64,
}

impl ExposureGainHeuristic {
    pub const DEFAULT_K: f64 = 1_000_000.0;
}

impl Default for ExposureGainHeuristic {
    fn default() -> Self {
        Self {
            k: Self::DEFAULT_K,
        }
    }
}

impl LightHeuristic for ExposureGainHeuristic {
    fn score(&self, exposure_time_us: f64, analogue_gain: f64) -> f64 {
        self.k / (exposure_time_us * analogue_gain + 1.0)
    }
}

/// Outcome of one light check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightReading {
    /// `None` when metadata could not be sampled
    pub score: Option<f64>,
    pub lights_on: bool,
}

/// Threshold check over a pluggable heuristic.
///
/// Metadata failures count as lights on so a sensor fault never blocks
/// capture.
pub struct LightGate {
    heuristic: Box<dyn LightHeuristic>,
    threshold: f64,
}

impl LightGate {
    pub fn new(threshold: f64) -> Self {
        Self::with_heuristic(threshold, Box::new(ExposureGainHeuristic::default()))
    }

    pub fn with_heuristic(threshold: f64, heuristic: Box<dyn LightHeuristic>) -> Self {
        Self {
            heuristic,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn evaluate(&self, metadata: Result<FrameMetadata, CameraError>) -> LightReading {
        match metadata {
            Ok(meta) => {
                let score = self
                    .heuristic
                    .score(meta.exposure_time_us, meta.analogue_gain);
                debug!(
                    "Light score: {:.2} (threshold: {})",
                    score, self.threshold
                );
                LightReading {
                    score: Some(score),
                    lights_on: score > self.threshold,
                }
            }
            Err(e) => {
                warn!("Could not check light level: {}", e);
                LightReading {
                    score: None,
                    lights_on: true,
                }
            }
        }
    }
}

impl std::fmt::Debug for LightGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightGate")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}
