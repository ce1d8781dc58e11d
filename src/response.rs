use crate::camera::Owner;
use crate::capture::CaptureReceipt;
use crate::error::{CameraError, FailureKind, TimelapseError};
use serde::Serialize;

pub const SUGGESTION_STOP_CAPTURE: &str =
    "Stop the capture service before using the camera";
pub const SUGGESTION_STOP_STREAM: &str =
    "Stop the live stream before capturing";
pub const SUGGESTION_RETRY: &str =
    "A capture is in progress, try again in a few seconds";
pub const SUGGESTION_CHECK_CAMERA: &str =
    "Check camera connection and ensure it's properly connected";
pub const SUGGESTION_CHECK_STORAGE: &str =
    "Ensure the storage path exists and is writable";

/// Structured result for stream control and one-shot capture requests
#[derive(Debug, Clone, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureReceipt>,
}

impl ControlResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            kind: None,
            suggestion: None,
            capture: None,
        }
    }

    pub fn failure(error: &TimelapseError) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
            suggestion: suggestion_for(error),
            capture: None,
        }
    }

    pub fn from_result(result: Result<(), TimelapseError>, message: &str) -> Self {
        match result {
            Ok(()) => Self::ok(message),
            Err(e) => Self::failure(&e),
        }
    }

    pub fn from_capture(result: Result<CaptureReceipt, TimelapseError>) -> Self {
        match result {
            Ok(receipt) => Self {
                message: Some(format!("Image saved to {}", receipt.path.display())),
                capture: Some(receipt),
                ..Self::ok("")
            },
            Err(e) => Self::failure(&e),
        }
    }
}

fn suggestion_for(error: &TimelapseError) -> Option<&'static str> {
    match error {
        TimelapseError::Camera(CameraError::Busy { holder }) => match Owner::from_holder(holder) {
            Some(Owner::Stream) => Some(SUGGESTION_STOP_STREAM),
            Some(Owner::Scheduler | Owner::OneShot) => Some(SUGGESTION_RETRY),
            None => Some(SUGGESTION_STOP_CAPTURE),
        },
        TimelapseError::Camera(CameraError::Open { .. } | CameraError::NotAvailable) => {
            Some(SUGGESTION_CHECK_CAMERA)
        }
        e if e.kind() == FailureKind::Storage => Some(SUGGESTION_CHECK_STORAGE),
        _ => None,
    }
}
