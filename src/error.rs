use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PocketcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Gallery export error: {0}")]
    Export(#[from] ExportError),

    #[error("Density error: {0}")]
    Domain(#[from] DomainError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Invalid capture request: {message}")]
    InvalidRequest { message: String },

    #[error("System error: {message}")]
    System { message: String },
}

/// Failures reported by a camera device
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Photo capture failed: {details}")]
    Photo { details: String },

    #[error("Recording failed: {details}")]
    Recording { details: String },

    #[error("A recording session is already active")]
    AlreadyRecording,

    #[error("No recording session is active")]
    NotRecording,

    #[error("Device ended the recording session without reporting a result")]
    SessionDropped,
}

/// Failures reported by a gallery exporter
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Permission denied writing {} to the gallery", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Gallery storage is full, could not store {}", path.display())]
    StorageFull { path: PathBuf },

    #[error("Gallery write failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid inputs to the pixel density math
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum DomainError {
    #[error("Display diagonal must be positive, got {0}")]
    NonPositiveDiagonal(f64),

    #[error("Pixel density must be positive, got {0}")]
    NonPositiveDensity(f64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {0} events")]
    Lagged(u64),

    #[error("Event channel closed")]
    ChannelClosed,
}

/// Coarse classification used by logs, events and the front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No camera faces the requested way; requests are skipped, not failed
    DeviceUnavailable,
    CaptureFailure,
    IoFailure,
    ExportFailure,
    DomainError,
    Configuration,
    InvalidRequest,
    System,
}

impl PocketcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PocketcamError::Config(_) | PocketcamError::Serialization(_) => ErrorKind::Configuration,
            PocketcamError::Capture(_) => ErrorKind::CaptureFailure,
            PocketcamError::Io { .. } | PocketcamError::Move { .. } => ErrorKind::IoFailure,
            PocketcamError::Export(_) => ErrorKind::ExportFailure,
            PocketcamError::Domain(_) => ErrorKind::DomainError,
            PocketcamError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            PocketcamError::EventBus(_) | PocketcamError::System { .. } => ErrorKind::System,
        }
    }
}

pub type Result<T> = std::result::Result<T, PocketcamError>;
