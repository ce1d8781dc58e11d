mod clock;
mod core;
mod light;
mod retention;
mod stats;
#[cfg(test)]
mod tests;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use self::core::{CaptureScheduler, SchedulerState};
pub use light::{ExposureGainHeuristic, LightGate, LightHeuristic, LightReading};
pub use retention::{CleanupResult, RetentionPolicy};
pub use stats::{CaptureStats, FAILURE_ALERT_THRESHOLD};
pub use window::{parse_time_of_day, CaptureWindow};
