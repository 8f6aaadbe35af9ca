use crate::error::CaptureError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Which sensor a device faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl CameraFacing {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraFacing::Back => "back",
            CameraFacing::Front => "front",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::Back => CameraFacing::Front,
            CameraFacing::Front => CameraFacing::Back,
        }
    }
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const HD: Resolution = Resolution::new(1280, 720);
    pub const FULL_HD: Resolution = Resolution::new(1920, 1080);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Kind of media a device produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Photo,
    Video,
}

impl AssetKind {
    /// File extension used for persisted assets of this kind
    pub fn extension(&self) -> &'static str {
        match self {
            AssetKind::Photo => "jpg",
            AssetKind::Video => "mp4",
        }
    }
}

/// A capture format advertised by a device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraFormat {
    pub resolution: Resolution,
    pub min_fps: u32,
    pub max_fps: u32,
    pub supports_stabilization: bool,
}

impl CameraFormat {
    pub fn supports_fps(&self, fps: u32) -> bool {
        fps >= self.min_fps && fps <= self.max_fps
    }
}

/// Requested format properties, in priority order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatConstraints {
    pub aspect_ratio: f64,
    pub resolution: Resolution,
    pub fps: u32,
}

impl FormatConstraints {
    pub const WIDESCREEN: f64 = 16.0 / 9.0;

    pub fn widescreen(resolution: Resolution, fps: u32) -> Self {
        Self {
            aspect_ratio: Self::WIDESCREEN,
            resolution,
            fps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoOptions {
    /// Encode quality in [0, 1]
    pub quality: f32,
    /// Do not embed location or device metadata
    pub skip_metadata: bool,
    /// Format negotiated for the selected resolution; `None` leaves the device default
    pub format: Option<CameraFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingOptions {
    pub frame_rate: u32,
    pub format: Option<CameraFormat>,
    pub stabilization: bool,
}

/// A file the device wrote to a transient location
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAsset {
    pub temporary_path: PathBuf,
    pub kind: AssetKind,
    pub timestamp: DateTime<Utc>,
}

impl CapturedAsset {
    pub fn new(temporary_path: impl Into<PathBuf>, kind: AssetKind) -> Self {
        Self {
            temporary_path: temporary_path.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Result the device reports when a recording session ends
pub type RecordingResult = std::result::Result<CapturedAsset, CaptureError>;

/// An acknowledged recording session.
///
/// The device resolves `finished` exactly once: with the recorded file when the
/// session is stopped, or with the error that ended it.
#[derive(Debug)]
pub struct RecordingSession {
    pub id: Uuid,
    pub finished: oneshot::Receiver<RecordingResult>,
}

impl RecordingSession {
    pub fn new() -> (Self, oneshot::Sender<RecordingResult>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id: Uuid::new_v4(),
                finished: rx,
            },
            tx,
        )
    }
}
