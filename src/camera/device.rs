use crate::error::CameraError;
use crate::settings::{ControlSet, SessionConfig};
use async_trait::async_trait;
use serde::Serialize;

/// Sensor readings attached to the most recent frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameMetadata {
    /// Exposure time in microseconds
    pub exposure_time_us: f64,
    pub analogue_gain: f64,
}

/// An open camera device.
///
/// Only the arbiter holds values of this type; sessions reach the device
/// through a [`CameraLease`](super::CameraLease).
#[async_trait]
pub trait CameraDevice: Send {
    /// Apply the sensor configuration. Must be called before `start`.
    async fn configure(&mut self, session: &SessionConfig) -> Result<(), CameraError>;

    async fn start(&mut self) -> Result<(), CameraError>;

    async fn set_controls(&mut self, controls: &ControlSet) -> Result<(), CameraError>;

    async fn capture_metadata(&mut self) -> Result<FrameMetadata, CameraError>;

    /// Capture one frame encoded as JPEG
    async fn capture_jpeg(&mut self, quality: u8) -> Result<Vec<u8>, CameraError>;

    async fn stop(&mut self) -> Result<(), CameraError>;

    /// Release the underlying hardware. Safe to call more than once.
    async fn close(&mut self) -> Result<(), CameraError>;
}

/// Opens camera devices. One backend per physical camera.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    async fn open(&self) -> Result<Box<dyn CameraDevice>, CameraError>;

    fn name(&self) -> &str;

    /// Whether devices from this backend can report exposure and gain
    fn can_meter(&self) -> bool {
        true
    }
}
