use serde::{Deserialize, Serialize};

/// Auto-exposure metering modes understood by the sensor pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeteringMode {
    CentreWeighted,
    Spot,
    Matrix,
}

impl MeteringMode {
    /// Parse a metering mode name. Unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "centreweighted" | "centerweighted" => Some(MeteringMode::CentreWeighted),
            "spot" => Some(MeteringMode::Spot),
            "matrix" => Some(MeteringMode::Matrix),
            _ => None,
        }
    }

    pub fn nick(&self) -> &'static str {
        match self {
            MeteringMode::CentreWeighted => "centre-weighted",
            MeteringMode::Spot => "spot",
            MeteringMode::Matrix => "matrix",
        }
    }
}

/// Noise reduction levels (draft control in libcamera)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseReductionMode {
    HighQuality,
    Fast,
    Minimal,
}

impl NoiseReductionMode {
    /// Parse a noise reduction level. Unknown names and "unset" yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "highquality" => Some(NoiseReductionMode::HighQuality),
            "fast" => Some(NoiseReductionMode::Fast),
            "minimal" => Some(NoiseReductionMode::Minimal),
            _ => None,
        }
    }

    pub fn nick(&self) -> &'static str {
        match self {
            NoiseReductionMode::HighQuality => "high-quality",
            NoiseReductionMode::Fast => "fast",
            NoiseReductionMode::Minimal => "minimal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfMode {
    Manual,
    Auto,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfSpeed {
    Normal,
    Fast,
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// A single concrete control value handed to the camera driver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Control {
    ExposureValue(f32),
    AwbEnable(bool),
    /// Red and blue gains
    ColourGains(f32, f32),
    AeMeteringMode(MeteringMode),
    NoiseReductionMode(NoiseReductionMode),
    Sharpness(f32),
    Contrast(f32),
    Brightness(f32),
    Saturation(f32),
    /// Minimum and maximum frame duration in microseconds
    FrameDurationLimits(i64, i64),
    AfMode(AfMode),
    AfSpeed(AfSpeed),
}

impl Control {
    /// libcamera control name
    pub fn name(&self) -> &'static str {
        match self {
            Control::ExposureValue(_) => "ExposureValue",
            Control::AwbEnable(_) => "AwbEnable",
            Control::ColourGains(..) => "ColourGains",
            Control::AeMeteringMode(_) => "AeMeteringMode",
            Control::NoiseReductionMode(_) => "NoiseReductionMode",
            Control::Sharpness(_) => "Sharpness",
            Control::Contrast(_) => "Contrast",
            Control::Brightness(_) => "Brightness",
            Control::Saturation(_) => "Saturation",
            Control::FrameDurationLimits(..) => "FrameDurationLimits",
            Control::AfMode(_) => "AfMode",
            Control::AfSpeed(_) => "AfSpeed",
        }
    }

    /// Element property name used by `libcamerasrc`
    pub fn property_name(&self) -> &'static str {
        match self {
            Control::ExposureValue(_) => "exposure-value",
            Control::AwbEnable(_) => "awb-enable",
            Control::ColourGains(..) => "colour-gains",
            Control::AeMeteringMode(_) => "ae-metering-mode",
            Control::NoiseReductionMode(_) => "noise-reduction-mode",
            Control::Sharpness(_) => "sharpness",
            Control::Contrast(_) => "contrast",
            Control::Brightness(_) => "brightness",
            Control::Saturation(_) => "saturation",
            Control::FrameDurationLimits(..) => "frame-duration-limits",
            Control::AfMode(_) => "af-mode",
            Control::AfSpeed(_) => "af-speed",
        }
    }

    /// Property value in the serialized form `gst_util_set_object_arg` parses
    pub fn property_value(&self) -> String {
        match self {
            Control::ExposureValue(v)
            | Control::Sharpness(v)
            | Control::Contrast(v)
            | Control::Brightness(v)
            | Control::Saturation(v) => v.to_string(),
            Control::AwbEnable(v) => v.to_string(),
            Control::ColourGains(red, blue) => format!("<{}, {}>", red, blue),
            Control::AeMeteringMode(mode) => mode.nick().to_string(),
            Control::NoiseReductionMode(mode) => mode.nick().to_string(),
            Control::FrameDurationLimits(min, max) => format!("<{}, {}>", min, max),
            Control::AfMode(mode) => match mode {
                AfMode::Manual => "manual",
                AfMode::Auto => "auto",
                AfMode::Continuous => "continuous",
            }
            .to_string(),
            Control::AfSpeed(speed) => match speed {
                AfSpeed::Normal => "normal",
                AfSpeed::Fast => "fast",
            }
            .to_string(),
        }
    }
}

/// Ordered set of controls; later entries for the same control win
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControlSet {
    controls: Vec<Control>,
}

impl ControlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continuous autofocus at fast speed
    pub fn autofocus() -> Self {
        let mut set = Self::new();
        set.push(Control::AfMode(AfMode::Continuous));
        set.push(Control::AfSpeed(AfSpeed::Fast));
        set
    }

    /// Insert a control, replacing any earlier value of the same control
    pub fn push(&mut self, control: Control) {
        self.controls.retain(|c| c.name() != control.name());
        self.controls.push(control);
    }

    pub fn get(&self, name: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.name() == name)
    }

    pub fn contains(&self, control: &Control) -> bool {
        self.controls.iter().any(|c| c == control)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

impl<'a> IntoIterator for &'a ControlSet {
    type Item = &'a Control;
    type IntoIter = std::slice::Iter<'a, Control>;

    fn into_iter(self) -> Self::IntoIter {
        self.controls.iter()
    }
}

/// Rotation options applied by the sensor transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    /// Rotate 90 degrees clockwise
    Rotate90,
    /// Rotate 180 degrees
    Rotate180,
    /// Rotate 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl Rotation {
    /// Map a degree value to a rotation. `Ok(None)` means no rotation.
    pub fn from_degrees(degrees: u16) -> Result<Option<Self>, u16> {
        match degrees % 360 {
            0 => Ok(None),
            90 => Ok(Some(Rotation::Rotate90)),
            180 => Ok(Some(Rotation::Rotate180)),
            270 => Ok(Some(Rotation::Rotate270)),
            other => Err(other),
        }
    }

    /// Get rotation angle in degrees
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// `videoflip` method name
    pub fn videoflip_method(&self) -> &'static str {
        match self {
            Rotation::Rotate90 => "clockwise",
            Rotation::Rotate180 => "rotate-180",
            Rotation::Rotate270 => "counterclockwise",
        }
    }
}

/// Whether a session wants full-resolution stills or a video mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPurpose {
    Still,
    Video,
}

/// Sensor configuration a session asks the device to apply before start
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub purpose: SessionPurpose,
    pub width: u32,
    pub height: u32,
    pub rotation: Option<Rotation>,
    pub hdr: bool,
    /// Controls applied after the warm-up delay
    pub controls: ControlSet,
}
