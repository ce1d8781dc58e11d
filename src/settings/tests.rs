use super::*;
use crate::config::{CameraSettings, FrameDurationLimits};

fn tuned_settings() -> CameraSettings {
    CameraSettings {
        exposure_compensation: Some(-0.3),
        awb_mode: "auto".to_string(),
        awb_gains_red: None,
        awb_gains_blue: None,
        metering_mode: "CentreWeighted".to_string(),
        noise_reduction_mode: Some("HighQuality".to_string()),
        sharpness: Some(1.8),
        contrast: Some(1.15),
        brightness: None,
        saturation: Some(1.05),
        frame_duration_limits: Some(FrameDurationLimits {
            min_us: Some(100),
            max_us: Some(120_000),
        }),
        hdr_enabled: false,
        rotation: 270,
    }
}

#[test]
fn test_translate_full_settings() {
    let controls = translate(&tuned_settings());

    assert!(controls.contains(&Control::ExposureValue(-0.3)));
    assert!(controls.contains(&Control::AwbEnable(true)));
    assert!(controls.contains(&Control::AeMeteringMode(MeteringMode::CentreWeighted)));
    assert!(controls.contains(&Control::NoiseReductionMode(
        NoiseReductionMode::HighQuality
    )));
    assert!(controls.contains(&Control::Sharpness(1.8)));
    assert!(controls.contains(&Control::Contrast(1.15)));
    assert!(controls.contains(&Control::Saturation(1.05)));
    assert!(controls.contains(&Control::FrameDurationLimits(100, 120_000)));
    assert!(controls.get("Brightness").is_none());
    assert!(controls.get("ColourGains").is_none());
}

#[test]
fn test_custom_awb_uses_default_gains() {
    let mut settings = CameraSettings::default();
    settings.awb_mode = "Custom".to_string();

    let controls = translate(&settings);
    assert!(controls.contains(&Control::AwbEnable(false)));
    assert_eq!(
        controls.get("ColourGains"),
        Some(&Control::ColourGains(1.5, 1.8))
    );

    settings.awb_gains_red = Some(2.0);
    let controls = translate(&settings);
    assert_eq!(
        controls.get("ColourGains"),
        Some(&Control::ColourGains(2.0, 1.8))
    );
}

#[test]
fn test_auto_awb_ignores_gains() {
    let mut settings = CameraSettings::default();
    settings.awb_gains_red = Some(3.0);
    settings.awb_gains_blue = Some(3.0);

    let controls = translate(&settings);
    assert!(controls.contains(&Control::AwbEnable(true)));
    assert!(controls.get("ColourGains").is_none());
}

#[test]
fn test_unknown_modes_are_dropped() {
    let mut settings = CameraSettings::default();
    settings.metering_mode = "Evaluative".to_string();
    settings.noise_reduction_mode = Some("Aggressive".to_string());
    settings.awb_mode = "tungsten".to_string();

    let controls = translate(&settings);
    assert!(controls.get("AeMeteringMode").is_none());
    assert!(controls.get("NoiseReductionMode").is_none());
    assert!(controls.get("AwbEnable").is_none());
    assert!(controls.is_empty());
}

#[test]
fn test_mode_spellings() {
    assert_eq!(MeteringMode::parse("centre-weighted"), Some(MeteringMode::CentreWeighted));
    assert_eq!(MeteringMode::parse("MATRIX"), Some(MeteringMode::Matrix));
    assert_eq!(MeteringMode::parse("spot"), Some(MeteringMode::Spot));
    assert_eq!(
        NoiseReductionMode::parse("high_quality"),
        Some(NoiseReductionMode::HighQuality)
    );
    assert_eq!(NoiseReductionMode::parse("unset"), None);
}

#[test]
fn test_frame_duration_requires_both_bounds() {
    let mut settings = CameraSettings::default();

    settings.frame_duration_limits = Some(FrameDurationLimits {
        min_us: Some(100),
        max_us: None,
    });
    assert!(translate(&settings).get("FrameDurationLimits").is_none());

    settings.frame_duration_limits = Some(FrameDurationLimits {
        min_us: Some(0),
        max_us: Some(120_000),
    });
    assert!(translate(&settings).get("FrameDurationLimits").is_none());

    settings.frame_duration_limits = Some(FrameDurationLimits {
        min_us: Some(33_333),
        max_us: Some(33_333),
    });
    assert_eq!(
        translate(&settings).get("FrameDurationLimits"),
        Some(&Control::FrameDurationLimits(33_333, 33_333))
    );
}

#[test]
fn test_translate_is_idempotent() {
    let settings = tuned_settings();
    assert_eq!(translate(&settings), translate(&settings));
}

#[test]
fn test_session_config_carries_hdr_and_rotation() {
    let mut settings = tuned_settings();
    settings.hdr_enabled = true;

    let config = session_config(SessionPurpose::Video, 1280, 960, &settings);
    assert_eq!(config.purpose, SessionPurpose::Video);
    assert_eq!((config.width, config.height), (1280, 960));
    assert!(config.hdr);
    assert_eq!(config.rotation, Some(Rotation::Rotate270));
    assert_eq!(config.controls, translate(&settings));

    settings.rotation = 0;
    let config = session_config(SessionPurpose::Still, 4608, 2592, &settings);
    assert_eq!(config.rotation, None);
}

#[test]
fn test_control_set_replaces_duplicates() {
    let mut set = ControlSet::new();
    set.push(Control::Contrast(1.0));
    set.push(Control::Contrast(1.5));
    assert_eq!(set.len(), 1);
    assert_eq!(set.get("Contrast"), Some(&Control::Contrast(1.5)));
}

#[test]
fn test_autofocus_controls() {
    let set = ControlSet::autofocus();
    assert!(set.contains(&Control::AfMode(AfMode::Continuous)));
    assert!(set.contains(&Control::AfSpeed(AfSpeed::Fast)));
}
