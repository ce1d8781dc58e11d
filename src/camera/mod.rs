mod arbiter;
mod device;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst;
#[cfg(all(feature = "metering", target_os = "linux"))]
mod metering;
mod mock;
mod service;

pub use arbiter::{ArbiterState, CameraArbiter, CameraLease, LeaseToken, Owner};
pub use device::{CameraBackend, CameraDevice, FrameMetadata};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst::GstCameraBackend;
pub use mock::MockCameraBackend;
pub use service::{ServiceStatus, SystemctlStatus};

use crate::config::TimelapseConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Pick the hardware backend when it is built in and present, else the mock
pub fn default_backend(config: &TimelapseConfig) -> Arc<dyn CameraBackend> {
    #[cfg(all(feature = "camera", target_os = "linux"))]
    {
        match GstCameraBackend::new(config.stream.fps) {
            Ok(backend) => {
                info!("Using libcamera backend");
                return Arc::new(backend);
            }
            Err(e) => warn!("libcamera backend unavailable ({}), using mock camera", e),
        }
    }

    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    {
        let _ = config;
        warn!("Built without camera support, using mock camera");
    }

    info!("Using mock camera backend");
    Arc::new(MockCameraBackend::new())
}

/// Build the arbiter for this process.
///
/// `external` is attached when the process is not itself the capture
/// service, so stream and one-shot requests defer to it.
pub fn build_arbiter(
    config: &TimelapseConfig,
    backend: Arc<dyn CameraBackend>,
    external: bool,
) -> CameraArbiter {
    let arbiter = CameraArbiter::new(backend);
    if external && config.service.check_external {
        arbiter.with_external_service(Arc::new(SystemctlStatus::from_config(&config.service)))
    } else {
        arbiter
    }
}
