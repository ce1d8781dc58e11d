use super::device::{CameraBackend, CameraDevice, FrameMetadata};
use crate::error::CameraError;
use crate::settings::{ControlSet, SessionConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

#[derive(Debug)]
struct MockState {
    open_devices: AtomicUsize,
    total_opens: AtomicU64,
    frames_captured: AtomicU64,
    fail_open: AtomicBool,
    fail_configure: AtomicBool,
    fail_capture: AtomicBool,
    can_meter: AtomicBool,
    capture_delay: Mutex<Duration>,
    metadata: Mutex<Option<FrameMetadata>>,
    last_session: Mutex<Option<SessionConfig>>,
    applied_controls: Mutex<Vec<ControlSet>>,
}

/// Synthetic camera used when the GStreamer backend is unavailable and in tests.
///
/// Clones share state, so a test can keep a handle while the arbiter owns
/// another and observe opens, captures and applied controls.
#[derive(Debug, Clone)]
pub struct MockCameraBackend {
    state: Arc<MockState>,
}

impl MockCameraBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                open_devices: AtomicUsize::new(0),
                total_opens: AtomicU64::new(0),
                frames_captured: AtomicU64::new(0),
                fail_open: AtomicBool::new(false),
                fail_configure: AtomicBool::new(false),
                fail_capture: AtomicBool::new(false),
                can_meter: AtomicBool::new(true),
                capture_delay: Mutex::new(Duration::ZERO),
                metadata: Mutex::new(Some(FrameMetadata {
                    exposure_time_us: 10_000.0,
                    analogue_gain: 1.5,
                })),
                last_session: Mutex::new(None),
                applied_controls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Metadata reported by `capture_metadata`; `None` makes it fail
    pub fn set_metadata(&self, metadata: Option<FrameMetadata>) {
        *self.state.metadata.lock() = metadata;
    }

    /// Report the backend as unable to meter, like a pipeline without sensor metadata
    pub fn set_can_meter(&self, can_meter: bool) {
        self.state.can_meter.store(can_meter, Ordering::SeqCst);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_configure(&self, fail: bool) {
        self.state.fail_configure.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_capture(&self, fail: bool) {
        self.state.fail_capture.store(fail, Ordering::SeqCst);
    }

    /// Simulated hardware latency per captured frame
    pub fn set_capture_delay(&self, delay: Duration) {
        *self.state.capture_delay.lock() = delay;
    }

    /// Devices opened and not yet closed
    pub fn open_devices(&self) -> usize {
        self.state.open_devices.load(Ordering::SeqCst)
    }

    pub fn total_opens(&self) -> u64 {
        self.state.total_opens.load(Ordering::SeqCst)
    }

    pub fn frames_captured(&self) -> u64 {
        self.state.frames_captured.load(Ordering::SeqCst)
    }

    pub fn last_session(&self) -> Option<SessionConfig> {
        self.state.last_session.lock().clone()
    }

    pub fn applied_controls(&self) -> Vec<ControlSet> {
        self.state.applied_controls.lock().clone()
    }
}

impl Default for MockCameraBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraBackend for MockCameraBackend {
    async fn open(&self) -> Result<Box<dyn CameraDevice>, CameraError> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(CameraError::Open {
                details: "mock device unavailable".to_string(),
            });
        }

        self.state.total_opens.fetch_add(1, Ordering::SeqCst);
        self.state.open_devices.fetch_add(1, Ordering::SeqCst);
        debug!("Opened mock camera device");

        Ok(Box::new(MockCameraDevice {
            state: Arc::clone(&self.state),
            session: None,
            running: false,
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn can_meter(&self) -> bool {
        self.state.can_meter.load(Ordering::SeqCst)
    }
}

struct MockCameraDevice {
    state: Arc<MockState>,
    session: Option<SessionConfig>,
    running: bool,
    closed: bool,
}

impl MockCameraDevice {
    fn mark_closed(&mut self) {
        if !self.closed {
            self.closed = true;
            self.running = false;
            self.state.open_devices.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl CameraDevice for MockCameraDevice {
    async fn configure(&mut self, session: &SessionConfig) -> Result<(), CameraError> {
        if self.state.fail_configure.load(Ordering::SeqCst) {
            return Err(CameraError::Configuration {
                details: "mock configure failure".to_string(),
            });
        }
        *self.state.last_session.lock() = Some(session.clone());
        self.session = Some(session.clone());
        Ok(())
    }

    async fn start(&mut self) -> Result<(), CameraError> {
        if self.session.is_none() {
            return Err(CameraError::Configuration {
                details: "device started before configure".to_string(),
            });
        }
        self.running = true;
        Ok(())
    }

    async fn set_controls(&mut self, controls: &ControlSet) -> Result<(), CameraError> {
        self.state.applied_controls.lock().push(controls.clone());
        Ok(())
    }

    async fn capture_metadata(&mut self) -> Result<FrameMetadata, CameraError> {
        let metadata = *self.state.metadata.lock();
        metadata.ok_or_else(|| CameraError::MetadataUnavailable {
            details: "mock metadata disabled".to_string(),
        })
    }

    async fn capture_jpeg(&mut self, quality: u8) -> Result<Vec<u8>, CameraError> {
        if !self.running {
            return Err(CameraError::Capture {
                details: "device not started".to_string(),
            });
        }

        let delay = *self.state.capture_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_capture.load(Ordering::SeqCst) {
            return Err(CameraError::Capture {
                details: "mock capture failure".to_string(),
            });
        }

        let frame_id = self.state.frames_captured.fetch_add(1, Ordering::SeqCst);

        // JFIF header, a pattern body sized by quality, EOI marker
        let mut data = vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01,
            0x00, 0x48, 0x00, 0x48, 0x00, 0x00,
        ];
        let pattern_size = 1000 + quality as usize * 10 + (frame_id % 500) as usize;
        data.extend(vec![(frame_id % 256) as u8; pattern_size]);
        data.extend_from_slice(&[0xFF, 0xD9]);

        trace!("Generated mock JPEG frame {} ({} bytes)", frame_id, data.len());
        Ok(data)
    }

    async fn stop(&mut self) -> Result<(), CameraError> {
        self.running = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), CameraError> {
        self.mark_closed();
        Ok(())
    }
}

impl Drop for MockCameraDevice {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Mock camera device dropped without close");
            self.mark_closed();
        }
    }
}
