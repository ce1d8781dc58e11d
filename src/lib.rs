pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod response;
pub mod scheduler;
pub mod settings;
pub mod stream;

pub use camera::{ArbiterState, CameraArbiter, CameraBackend, CameraLease, MockCameraBackend, Owner};
pub use capture::{CaptureOutcome, CaptureReceipt, CaptureRecord, OneShotCapture};
pub use config::TimelapseConfig;
pub use error::{CameraError, FailureKind, Result, StorageError, StreamError, TimelapseError};
pub use response::ControlResponse;
pub use scheduler::{CaptureScheduler, CaptureStats, CaptureWindow, CleanupResult, LightGate, RetentionPolicy};
pub use settings::{ControlSet, SessionConfig, SessionPurpose};
pub use stream::{StreamSession, StreamStats};
