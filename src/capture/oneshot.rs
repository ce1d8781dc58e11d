use super::record::CaptureReceipt;
use super::still::capture_still;
use crate::camera::{CameraArbiter, Owner};
use crate::config::TimelapseConfig;
use crate::error::Result;
use crate::scheduler::{Clock, SystemClock};
use crate::settings::{session_config, SessionConfig, SessionPurpose};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Operator-triggered single capture at full still resolution
pub struct OneShotCapture {
    arbiter: Arc<CameraArbiter>,
    storage_root: PathBuf,
    session: SessionConfig,
    quality: u8,
    warmup: Duration,
    clock: Arc<dyn Clock>,
}

impl OneShotCapture {
    pub fn new(arbiter: Arc<CameraArbiter>, config: &TimelapseConfig) -> Self {
        Self {
            arbiter,
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
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Acquire, capture one frame, release. The camera is released on
    /// every path, including a failed capture.
    pub async fn capture(&self) -> Result<CaptureReceipt> {
        let mut lease = self.arbiter.acquire(Owner::OneShot, &self.session).await?;

        let result = match lease.prepare(self.warmup).await {
            Ok(()) => {
                capture_still(&mut lease, &self.storage_root, self.clock.now(), self.quality).await
            }
            Err(e) => Err(e.into()),
        };

        lease.release().await;

        match &result {
            Ok(receipt) => info!("One-shot capture saved to {}", receipt.path.display()),
            Err(e) => error!("One-shot capture failed: {}", e),
        }
        result
    }
}
