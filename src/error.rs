use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimelapseError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),
}

impl TimelapseError {
    /// Coarse classification used for structured request results
    pub fn kind(&self) -> FailureKind {
        match self {
            TimelapseError::Camera(e) => e.kind(),
            TimelapseError::Storage(_) | TimelapseError::Io(_) => FailureKind::Storage,
            TimelapseError::Stream(_) => FailureKind::Conflict,
            TimelapseError::Config(_) | TimelapseError::Serialization(_) => FailureKind::Config,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, TimelapseError::Camera(e) if e.is_busy())
    }
}

/// Errors raised while opening, configuring or reading the camera
#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("Camera is busy (held by {holder})")]
    Busy { holder: String },

    #[error("Failed to open camera: {details}")]
    Open { details: String },

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },

    #[error("Capture failed: {details}")]
    Capture { details: String },

    #[error("Frame metadata unavailable: {details}")]
    MetadataUnavailable { details: String },

    #[error("Camera not available on this system")]
    NotAvailable,
}

impl CameraError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CameraError::Busy { .. } => FailureKind::Busy,
            _ => FailureKind::Hardware,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, CameraError::Busy { .. })
    }
}

/// Filesystem failures while writing captures or pruning old folders
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cleanup of {path} failed: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream already active")]
    AlreadyActive,

    #[error("Stream not active. Start it first.")]
    NotActive,
}

/// Failure categories surfaced to request-driven callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Busy,
    Hardware,
    Storage,
    Config,
    Conflict,
}

pub type Result<T> = std::result::Result<T, TimelapseError>;
