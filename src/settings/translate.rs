use super::controls::{
    Control, ControlSet, MeteringMode, NoiseReductionMode, Rotation, SessionConfig, SessionPurpose,
};
use crate::config::CameraSettings;
use tracing::debug;

/// Default custom white balance gains (red, blue)
pub const DEFAULT_AWB_GAINS: (f32, f32) = (1.5, 1.8);

/// Map declarative camera settings onto driver controls.
///
/// Pure and deterministic. Unknown metering or noise reduction names are
/// dropped so the camera keeps whatever mode it already had; optional
/// scalar adjustments are only emitted when configured.
pub fn translate(settings: &CameraSettings) -> ControlSet {
    let mut controls = ControlSet::new();

    if let Some(ev) = settings.exposure_compensation {
        controls.push(Control::ExposureValue(ev));
    }

    match settings.awb_mode.to_lowercase().as_str() {
        "auto" => controls.push(Control::AwbEnable(true)),
        "custom" => {
            controls.push(Control::AwbEnable(false));
            controls.push(Control::ColourGains(
                settings.awb_gains_red.unwrap_or(DEFAULT_AWB_GAINS.0),
                settings.awb_gains_blue.unwrap_or(DEFAULT_AWB_GAINS.1),
            ));
        }
        other => debug!("Ignoring unknown awb_mode '{}'", other),
    }

    match MeteringMode::parse(&settings.metering_mode) {
        Some(mode) => controls.push(Control::AeMeteringMode(mode)),
        None => debug!("Ignoring unknown metering_mode '{}'", settings.metering_mode),
    }

    if let Some(name) = settings.noise_reduction_mode.as_deref() {
        match NoiseReductionMode::parse(name) {
            Some(mode) => controls.push(Control::NoiseReductionMode(mode)),
            None => debug!("Ignoring noise_reduction_mode '{}'", name),
        }
    }

    if let Some(v) = settings.sharpness {
        controls.push(Control::Sharpness(v));
    }
    if let Some(v) = settings.contrast {
        controls.push(Control::Contrast(v));
    }
    if let Some(v) = settings.brightness {
        controls.push(Control::Brightness(v));
    }
    if let Some(v) = settings.saturation {
        controls.push(Control::Saturation(v));
    }

    if let Some(limits) = settings.frame_duration_limits {
        match (limits.min_us, limits.max_us) {
            (Some(min), Some(max)) if min != 0 && max != 0 => {
                controls.push(Control::FrameDurationLimits(min, max));
            }
            _ => debug!("Frame duration limits incomplete, leaving driver default"),
        }
    }

    controls
}

/// Build the sensor configuration for a session.
///
/// The caller decides between still and video; the settings contribute
/// rotation, the HDR variant and the translated controls.
pub fn session_config(
    purpose: SessionPurpose,
    width: u32,
    height: u32,
    settings: &CameraSettings,
) -> SessionConfig {
    SessionConfig {
        purpose,
        width,
        height,
        // Invalid rotations are rejected by config validation
        rotation: Rotation::from_degrees(settings.rotation).unwrap_or(None),
        hdr: settings.hdr_enabled,
        controls: translate(settings),
    }
}
