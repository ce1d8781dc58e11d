use crate::config::CaptureWindowConfig;
use chrono::NaiveTime;
use config::ConfigError;
use serde::Serialize;

/// Time-of-day range during which automated capture is permitted.
///
/// Both bounds are inclusive. A start later than the end wraps past
/// midnight, so 22:00-06:00 admits 23:30 and 05:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureWindow {
    enabled: bool,
    start: NaiveTime,
    end: NaiveTime,
}

impl CaptureWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            enabled: true,
            start,
            end,
        }
    }

    /// A disabled window; every instant passes
    pub fn always() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }
    }

    /// Build the runtime window. A disabled window admits every instant.
    pub fn from_config(config: &CaptureWindowConfig) -> Result<Self, ConfigError> {
        if !config.enabled {
            return Ok(Self::always());
        }

        let (start, end) = Self::parse_bounds(config)?;
        Ok(Self::new(start, end))
    }

    /// Parse both bounds whether or not the window is enabled
    pub fn parse_bounds(config: &CaptureWindowConfig) -> Result<(NaiveTime, NaiveTime), ConfigError> {
        let start = parse_time_of_day(&config.start_time).ok_or_else(|| {
            ConfigError::Message(format!(
                "capture_window.start_time '{}' is not HH:MM[:SS]",
                config.start_time
            ))
        })?;
        let end = parse_time_of_day(&config.end_time).ok_or_else(|| {
            ConfigError::Message(format!(
                "capture_window.end_time '{}' is not HH:MM[:SS]",
                config.end_time
            ))
        })?;

        Ok((start, end))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_overnight(&self) -> bool {
        self.enabled && self.start > self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled {
            return true;
        }

        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}
