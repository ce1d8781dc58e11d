use crate::scheduler::CaptureWindow;
use crate::settings::Rotation;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TimelapseConfig {
    /// Seconds between scheduler ticks
    pub capture_interval_seconds: u64,

    /// Still capture resolution
    pub resolution: Resolution,

    /// Root directory for per-date image folders
    pub storage_path: String,

    /// Retention period in days
    pub keep_days: u32,

    /// Skip captures when the light heuristic says the lights are off
    pub lights_only_mode: bool,

    /// Light score above which the lights are considered on
    pub light_threshold: f64,

    /// JPEG quality for still captures
    #[serde(default = "default_image_quality")]
    pub image_quality: u8,

    /// Optional log file receiving the same events as stdout
    #[serde(default)]
    pub log_path: Option<String>,

    /// Warm-up delay after starting the sensor for stills
    #[serde(default = "default_still_warmup_ms")]
    pub still_warmup_ms: u64,

    #[serde(default)]
    pub capture_window: CaptureWindowConfig,

    #[serde(default)]
    pub camera_settings: CameraSettings,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureWindowConfig {
    #[serde(default)]
    pub enabled: bool,

    /// HH:MM or HH:MM:SS
    #[serde(default = "default_window_start")]
    pub start_time: String,

    /// HH:MM or HH:MM:SS
    #[serde(default = "default_window_end")]
    pub end_time: String,
}

/// Declarative camera tuning, translated into driver controls per session
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraSettings {
    /// Exposure bias in stops
    #[serde(default)]
    pub exposure_compensation: Option<f32>,

    /// "auto" or "custom"
    #[serde(default = "default_awb_mode")]
    pub awb_mode: String,

    #[serde(default)]
    pub awb_gains_red: Option<f32>,

    #[serde(default)]
    pub awb_gains_blue: Option<f32>,

    /// CentreWeighted, Spot or Matrix
    #[serde(default = "default_metering_mode")]
    pub metering_mode: String,

    /// HighQuality, Fast or Minimal
    #[serde(default)]
    pub noise_reduction_mode: Option<String>,

    #[serde(default)]
    pub sharpness: Option<f32>,

    #[serde(default)]
    pub contrast: Option<f32>,

    #[serde(default)]
    pub brightness: Option<f32>,

    #[serde(default)]
    pub saturation: Option<f32>,

    #[serde(default)]
    pub frame_duration_limits: Option<FrameDurationLimits>,

    #[serde(default, alias = "hdr_mode")]
    pub hdr_enabled: bool,

    /// Sensor rotation in degrees (0, 90, 180, 270)
    #[serde(default = "default_rotation")]
    pub rotation: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
pub struct FrameDurationLimits {
    #[serde(default)]
    pub min_us: Option<i64>,
    #[serde(default)]
    pub max_us: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// Live preview width
    #[serde(default = "default_stream_width")]
    pub width: u32,

    /// Live preview height
    #[serde(default = "default_stream_height")]
    pub height: u32,

    /// Target frames per second
    #[serde(default = "default_stream_fps")]
    pub fps: u32,

    #[serde(default = "default_stream_quality")]
    pub quality: u8,

    #[serde(default = "default_stream_warmup_ms")]
    pub warmup_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// systemd user unit that runs the capture scheduler
    #[serde(default = "default_capture_unit")]
    pub capture_unit: String,

    /// Refuse stream/one-shot acquisition while the capture unit is active
    #[serde(default = "default_check_external")]
    pub check_external: bool,

    /// Timeout for the status query
    #[serde(default = "default_service_timeout")]
    pub timeout_seconds: u64,
}

impl TimelapseConfig {
    /// Load configuration from a specific file path (TOML or JSON)
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("image_quality", default_image_quality() as i64)?
            .set_default("still_warmup_ms", default_still_warmup_ms() as i64)?
            .set_default("capture_window.enabled", false)?
            .set_default("capture_window.start_time", default_window_start())?
            .set_default("capture_window.end_time", default_window_end())?
            .set_default("stream.width", default_stream_width())?
            .set_default("stream.height", default_stream_height())?
            .set_default("stream.fps", default_stream_fps())?
            .set_default("stream.quality", default_stream_quality() as i64)?
            .set_default("stream.warmup_ms", default_stream_warmup_ms() as i64)?
            .set_default("service.capture_unit", default_capture_unit())?
            .set_default("service.check_external", default_check_external())?
            .set_default("service.timeout_seconds", default_service_timeout() as i64)?
            // Required fields have no defaults, so the file must exist
            .add_source(File::with_name(&path_str).required(true))
            // TIMELAPSE_KEEP_DAYS, TIMELAPSE_STREAM__FPS, ...
            .add_source(
                Environment::with_prefix("TIMELAPSE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: TimelapseConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "capture_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(ConfigError::Message(
                "Resolution must be greater than 0".to_string(),
            ));
        }

        if self.storage_path.trim().is_empty() {
            return Err(ConfigError::Message(
                "storage_path must not be empty".to_string(),
            ));
        }

        if !self.light_threshold.is_finite() {
            return Err(ConfigError::Message(
                "light_threshold must be a finite number".to_string(),
            ));
        }

        if self.image_quality == 0 || self.image_quality > 100 {
            return Err(ConfigError::Message(
                "image_quality must be between 1 and 100".to_string(),
            ));
        }

        CaptureWindow::parse_bounds(&self.capture_window)?;

        if let Err(degrees) = Rotation::from_degrees(self.camera_settings.rotation) {
            return Err(ConfigError::Message(format!(
                "camera_settings.rotation must be a multiple of 90, got {}",
                degrees
            )));
        }

        if self.stream.width == 0 || self.stream.height == 0 {
            return Err(ConfigError::Message(
                "Stream resolution must be greater than 0".to_string(),
            ));
        }

        if self.stream.fps == 0 {
            return Err(ConfigError::Message(
                "Stream fps must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for TimelapseConfig {
    fn default() -> Self {
        Self {
            capture_interval_seconds: 60,
            resolution: Resolution {
                width: 3280,
                height: 2464,
            },
            storage_path: "./images".to_string(),
            keep_days: 7,
            lights_only_mode: false,
            light_threshold: 50.0,
            image_quality: default_image_quality(),
            log_path: None,
            still_warmup_ms: default_still_warmup_ms(),
            capture_window: CaptureWindowConfig::default(),
            camera_settings: CameraSettings::default(),
            stream: StreamConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl Default for CaptureWindowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: default_window_start(),
            end_time: default_window_end(),
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            exposure_compensation: None,
            awb_mode: default_awb_mode(),
            awb_gains_red: None,
            awb_gains_blue: None,
            metering_mode: default_metering_mode(),
            noise_reduction_mode: None,
            sharpness: None,
            contrast: None,
            brightness: None,
            saturation: None,
            frame_duration_limits: None,
            hdr_enabled: false,
            rotation: default_rotation(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: default_stream_width(),
            height: default_stream_height(),
            fps: default_stream_fps(),
            quality: default_stream_quality(),
            warmup_ms: default_stream_warmup_ms(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            capture_unit: default_capture_unit(),
            check_external: default_check_external(),
            timeout_seconds: default_service_timeout(),
        }
    }
}

// Default value functions
fn default_image_quality() -> u8 {
    90
}
fn default_still_warmup_ms() -> u64 {
    2000
}

fn default_window_start() -> String {
    "00:00".to_string()
}
fn default_window_end() -> String {
    "23:59:59".to_string()
}

fn default_awb_mode() -> String {
    "auto".to_string()
}
fn default_metering_mode() -> String {
    "CentreWeighted".to_string()
}
fn default_rotation() -> u16 {
    270
}

fn default_stream_width() -> u32 {
    1280
}
fn default_stream_height() -> u32 {
    960
}
fn default_stream_fps() -> u32 {
    10
}
fn default_stream_quality() -> u8 {
    80
}
fn default_stream_warmup_ms() -> u64 {
    1000
}

fn default_capture_unit() -> String {
    "timelapse.service".to_string()
}
fn default_check_external() -> bool {
    true
}
fn default_service_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(extension: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(extension)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = TimelapseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.fps, 10);
        assert_eq!(config.camera_settings.rotation, 270);
    }

    #[test]
    fn test_load_toml_with_defaults() {
        let file = write_config(
            ".toml",
            r#"
capture_interval_seconds = 30
storage_path = "/tmp/timelapse"
keep_days = 14
lights_only_mode = true
light_threshold = 75.5

[resolution]
width = 1920
height = 1080

[capture_window]
enabled = true
start_time = "08:00"
end_time = "20:30:00"

[camera_settings]
awb_mode = "custom"
awb_gains_red = 1.2
metering_mode = "Spot"
hdr_mode = true
"#,
        );

        let config = TimelapseConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.capture_interval_seconds, 30);
        assert_eq!(config.resolution, Resolution { width: 1920, height: 1080 });
        assert_eq!(config.keep_days, 14);
        assert!(config.lights_only_mode);
        assert_eq!(config.image_quality, 90);
        assert!(config.capture_window.enabled);
        assert_eq!(config.capture_window.end_time, "20:30:00");
        assert_eq!(config.camera_settings.awb_mode, "custom");
        assert_eq!(config.camera_settings.awb_gains_red, Some(1.2));
        assert!(config.camera_settings.hdr_enabled);
        assert_eq!(config.stream.width, 1280);
        assert_eq!(config.service.capture_unit, "timelapse.service");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_json() {
        let file = write_config(
            ".json",
            r#"{
  "capture_interval_seconds": 300,
  "resolution": {"width": 4608, "height": 2592},
  "storage_path": "/home/pi/images",
  "keep_days": 30,
  "lights_only_mode": false,
  "light_threshold": 50,
  "camera_settings": {
    "noise_reduction_mode": "HighQuality",
    "frame_duration_limits": {"min_us": 100, "max_us": 120000}
  }
}"#,
        );

        let config = TimelapseConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.capture_interval_seconds, 300);
        assert_eq!(
            config.camera_settings.frame_duration_limits,
            Some(FrameDurationLimits {
                min_us: Some(100),
                max_us: Some(120000)
            })
        );
        assert_eq!(config.camera_settings.metering_mode, "CentreWeighted");
    }

    #[test]
    fn test_missing_required_field_is_fatal() {
        let file = write_config(
            ".toml",
            r#"
capture_interval_seconds = 30
keep_days = 7
lights_only_mode = false
light_threshold = 50.0

[resolution]
width = 640
height = 480
"#,
        );

        let result = TimelapseConfig::load_from_file(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = TimelapseConfig::load_from_file("/nonexistent/timelapse.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TimelapseConfig::default();

        config.capture_interval_seconds = 0;
        assert!(config.validate().is_err());
        config.capture_interval_seconds = 60;

        config.capture_window.start_time = "25:00".to_string();
        assert!(config.validate().is_err());
        config.capture_window.start_time = "22:00".to_string();
        assert!(config.validate().is_ok());

        config.camera_settings.rotation = 45;
        assert!(config.validate().is_err());
        config.camera_settings.rotation = 180;

        config.resolution.width = 0;
        assert!(config.validate().is_err());
        config.resolution.width = 640;

        config.light_threshold = f64::NAN;
        assert!(config.validate().is_err());
        config.light_threshold = 10.0;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_parses_disabled_window_times() {
        let mut config = TimelapseConfig::default();
        assert!(!config.capture_window.enabled);

        config.capture_window.end_time = "6pm".to_string();
        assert!(config.validate().is_err());
        // The runtime window still ignores the bounds while disabled
        assert!(!CaptureWindow::from_config(&config.capture_window)
            .unwrap()
            .is_enabled());

        config.capture_window.end_time = "18:00".to_string();
        assert!(config.validate().is_ok());
    }
}
