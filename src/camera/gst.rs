use super::device::{CameraBackend, CameraDevice, FrameMetadata};
use crate::error::CameraError;
use crate::settings::{ControlSet, SessionConfig, SessionPurpose};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use tracing::{debug, info, warn};

/// How long a single frame pull may block before the capture fails
const PULL_TIMEOUT_SECS: u64 = 5;

/// Auto-exposure settling after the pipeline restarts from a metering pass
#[cfg(feature = "metering")]
const RESUME_SETTLE: std::time::Duration = std::time::Duration::from_millis(1000);

/// libcamera camera driven through a GStreamer pipeline
#[derive(Debug, Clone)]
pub struct GstCameraBackend {
    /// Frame rate requested for video sessions
    video_fps: u32,
}

impl GstCameraBackend {
    pub fn new(video_fps: u32) -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        if gstreamer::ElementFactory::find("libcamerasrc").is_none() {
            return Err(CameraError::NotAvailable);
        }

        Ok(Self { video_fps })
    }
}

#[async_trait]
impl CameraBackend for GstCameraBackend {
    async fn open(&self) -> Result<Box<dyn CameraDevice>, CameraError> {
        Ok(Box::new(GstCameraDevice {
            video_fps: self.video_fps,
            pipeline: None,
        }))
    }

    fn name(&self) -> &str {
        "libcamera"
    }

    fn can_meter(&self) -> bool {
        cfg!(feature = "metering")
    }
}

struct GstCameraDevice {
    video_fps: u32,
    pipeline: Option<Pipeline>,
}

impl GstCameraDevice {
    fn build_pipeline_string(&self, session: &SessionConfig) -> String {
        let mut caps = format!(
            "video/x-raw,width={},height={}",
            session.width, session.height
        );
        if session.purpose == SessionPurpose::Video {
            caps.push_str(&format!(",framerate={}/1", self.video_fps));
        }

        let flip = session
            .rotation
            .map(|r| format!("videoflip method={} ! ", r.videoflip_method()))
            .unwrap_or_default();

        format!(
            "libcamerasrc name=src ! {} ! videoconvert ! {}\
             jpegenc name=enc ! \
             appsink name=sink sync=false max-buffers=1 drop=true enable-last-sample=false",
            caps, flip
        )
    }

    fn pipeline(&self) -> Result<&Pipeline, CameraError> {
        self.pipeline.as_ref().ok_or_else(|| CameraError::Configuration {
            details: "Pipeline not initialized".to_string(),
        })
    }

    fn element(&self, name: &str) -> Result<gstreamer::Element, CameraError> {
        self.pipeline()?
            .by_name(name)
            .ok_or_else(|| CameraError::Configuration {
                details: format!("Failed to get {} element", name),
            })
    }

    fn set_state(&self, state: gstreamer::State) -> Result<(), CameraError> {
        if let Some(pipeline) = &self.pipeline {
            pipeline
                .set_state(state)
                .map_err(|e| CameraError::Capture {
                    details: format!("Failed to set pipeline to {:?}: {}", state, e),
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl CameraDevice for GstCameraDevice {
    async fn configure(&mut self, session: &SessionConfig) -> Result<(), CameraError> {
        let desc = self.build_pipeline_string(session);
        info!("Creating GStreamer pipeline: {}", desc);

        let pipeline = gstreamer::parse::launch(&desc)
            .map_err(|e| CameraError::Open {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;
        self.pipeline = Some(pipeline);

        if session.hdr {
            let src = self.element("src")?;
            if src.find_property("hdr-mode").is_some() {
                set_from_str(&src, "hdr-mode", "single-exposure")?;
                info!("HDR mode enabled");
            } else {
                warn!("HDR requested but libcamerasrc does not expose hdr-mode");
            }
        }

        // Ready state opens the sensor so open failures surface here
        self.set_state(gstreamer::State::Ready)
            .map_err(|e| CameraError::Open {
                details: e.to_string(),
            })
    }

    async fn start(&mut self) -> Result<(), CameraError> {
        self.pipeline()?;
        self.set_state(gstreamer::State::Playing)
    }

    async fn set_controls(&mut self, controls: &ControlSet) -> Result<(), CameraError> {
        let src = self.element("src")?;

        for control in controls {
            let property = control.property_name();
            if src.find_property(property).is_none() {
                debug!("libcamerasrc has no {} property, skipping", property);
                continue;
            }
            set_from_str(&src, property, &control.property_value())?;
        }

        Ok(())
    }

    #[cfg(feature = "metering")]
    async fn capture_metadata(&mut self) -> Result<FrameMetadata, CameraError> {
        // libcamerasrc holds the sensor until the pipeline drops to Null
        self.set_state(gstreamer::State::Null)?;

        let sampled = match tokio::task::spawn_blocking(|| {
            super::metering::sample_exposure(super::metering::SETTLE_FRAMES)
        })
        .await
        {
            Ok(sampled) => sampled,
            Err(e) => Err(CameraError::MetadataUnavailable {
                details: format!("Metering task failed: {}", e),
            }),
        };

        self.set_state(gstreamer::State::Playing)?;
        tokio::time::sleep(RESUME_SETTLE).await;

        if let Ok(metadata) = &sampled {
            debug!(
                exposure_us = metadata.exposure_time_us,
                gain = metadata.analogue_gain,
                "Sampled exposure"
            );
        }
        sampled
    }

    #[cfg(not(feature = "metering"))]
    async fn capture_metadata(&mut self) -> Result<FrameMetadata, CameraError> {
        Err(CameraError::MetadataUnavailable {
            details: "per-frame metadata is not exposed by libcamerasrc".to_string(),
        })
    }

    async fn capture_jpeg(&mut self, quality: u8) -> Result<Vec<u8>, CameraError> {
        self.element("enc")?.set_property("quality", i32::from(quality));

        let appsink = self
            .element("sink")?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, CameraError> {
            let sample = appsink
                .try_pull_sample(gstreamer::ClockTime::from_seconds(PULL_TIMEOUT_SECS))
                .ok_or_else(|| CameraError::Capture {
                    details: "No sample available from camera (timeout)".to_string(),
                })?;

            let buffer = sample.buffer().ok_or_else(|| CameraError::Capture {
                details: "No buffer in sample".to_string(),
            })?;

            let map = buffer.map_readable().map_err(|e| CameraError::Capture {
                details: format!("Failed to map buffer: {}", e),
            })?;

            Ok(map.as_slice().to_vec())
        })
        .await
        .map_err(|e| CameraError::Capture {
            details: format!("Capture task failed: {}", e),
        })?
    }

    async fn stop(&mut self) -> Result<(), CameraError> {
        self.set_state(gstreamer::State::Paused)
    }

    async fn close(&mut self) -> Result<(), CameraError> {
        let result = self.set_state(gstreamer::State::Null);
        self.pipeline = None;
        result
    }
}

impl Drop for GstCameraDevice {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gstreamer::State::Null);
        }
    }
}

fn set_from_str(element: &gstreamer::Element, property: &str, value: &str) -> Result<(), CameraError> {
    let pspec = element
        .find_property(property)
        .ok_or_else(|| CameraError::Configuration {
            details: format!("Unknown property {}", property),
        })?;

    let value = gstreamer::glib::Value::deserialize(value, pspec.value_type()).map_err(|e| {
        CameraError::Configuration {
            details: format!("Invalid value '{}' for {}: {}", value, property, e),
        }
    })?;

    element.set_property_from_value(property, &value);
    Ok(())
}
