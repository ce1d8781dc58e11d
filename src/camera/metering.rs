use super::device::FrameMetadata;
use crate::error::CameraError;
use libcamera::camera::CameraConfigurationStatus;
use libcamera::camera_manager::CameraManager;
use libcamera::controls::{AnalogueGain, ExposureTime};
use libcamera::framebuffer_allocator::FrameBufferAllocator;
use libcamera::request::{Request, ReuseFlag};
use libcamera::stream::StreamRole;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, warn};

/// Completed requests to wait through so auto-exposure can converge
pub const SETTLE_FRAMES: usize = 8;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Run the sensor briefly through libcamera and read the exposure time
/// and analogue gain reported on the last completed request.
///
/// Blocks the calling thread. The camera must not be held by anything
/// else in the process while this runs.
pub fn sample_exposure(settle_frames: usize) -> Result<FrameMetadata, CameraError> {
    let manager = CameraManager::new().map_err(|e| CameraError::Open {
        details: format!("Failed to start libcamera: {}", e),
    })?;
    let cameras = manager.cameras();
    let camera = cameras.get(0).ok_or(CameraError::NotAvailable)?;
    let mut camera = camera.acquire().map_err(|e| CameraError::Open {
        details: format!("Failed to acquire camera for metering: {}", e),
    })?;

    let mut configs = camera
        .generate_configuration(&[StreamRole::ViewFinder])
        .ok_or_else(|| CameraError::Configuration {
            details: "No viewfinder configuration for metering".to_string(),
        })?;
    if matches!(configs.validate(), CameraConfigurationStatus::Invalid) {
        return Err(CameraError::Configuration {
            details: "Metering configuration rejected by camera".to_string(),
        });
    }
    camera
        .configure(&mut configs)
        .map_err(|e| CameraError::Configuration {
            details: format!("Failed to configure metering stream: {}", e),
        })?;

    let stream = configs
        .get(0)
        .and_then(|config| config.stream())
        .ok_or_else(|| CameraError::Configuration {
            details: "Metering stream missing after configure".to_string(),
        })?;

    let mut allocator = FrameBufferAllocator::new(&camera);
    let buffers = allocator
        .alloc(&stream)
        .map_err(|e| CameraError::Configuration {
            details: format!("Failed to allocate metering buffers: {}", e),
        })?;

    let mut requests = Vec::with_capacity(buffers.len());
    for (index, buffer) in buffers.into_iter().enumerate() {
        let mut request = camera
            .create_request(Some(index as u64))
            .ok_or_else(|| CameraError::Capture {
                details: "Failed to create metering request".to_string(),
            })?;
        request
            .add_buffer(&stream, buffer)
            .map_err(|e| CameraError::Capture {
                details: format!("Failed to attach metering buffer: {}", e),
            })?;
        requests.push(request);
    }

    let (tx, rx) = mpsc::channel();
    camera.on_request_completed(move |request| {
        let _ = tx.send(request);
    });

    camera.start(None).map_err(|e| CameraError::Capture {
        details: format!("Failed to start metering stream: {}", e),
    })?;

    let mut sampled = Err(CameraError::MetadataUnavailable {
        details: "no metering request completed".to_string(),
    });

    let mut queued = true;
    for request in requests {
        if camera.queue_request(request).is_err() {
            queued = false;
            break;
        }
    }

    if queued {
        for frame in 0..settle_frames.max(1) {
            let mut request = match rx.recv_timeout(REQUEST_TIMEOUT) {
                Ok(request) => request,
                Err(_) => {
                    warn!("Metering request timed out after {} frames", frame);
                    break;
                }
            };

            sampled = read_exposure(&request);
            request.reuse(ReuseFlag::REUSE_BUFFERS);
            if camera.queue_request(request).is_err() {
                break;
            }
        }
    } else {
        sampled = Err(CameraError::Capture {
            details: "Failed to queue metering request".to_string(),
        });
    }

    if let Err(e) = camera.stop() {
        debug!("Failed to stop metering stream: {}", e);
    }

    sampled
}

fn read_exposure(request: &Request) -> Result<FrameMetadata, CameraError> {
    let metadata = request.metadata();
    let exposure = metadata
        .get::<ExposureTime>()
        .map_err(|e| CameraError::MetadataUnavailable {
            details: format!("ExposureTime: {}", e),
        })?;
    let gain = metadata
        .get::<AnalogueGain>()
        .map_err(|e| CameraError::MetadataUnavailable {
            details: format!("AnalogueGain: {}", e),
        })?;

    Ok(FrameMetadata {
        exposure_time_us: f64::from(exposure.0),
        analogue_gain: f64::from(gain.0),
    })
}
