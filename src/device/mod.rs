mod format;
mod interface;
mod simulated;
mod types;

pub use format::negotiate_format;
pub use interface::{CameraDevice, CameraProvider};
pub use simulated::{SimulatedCamera, SimulatedProvider};
pub use types::{
    AssetKind, CameraFacing, CameraFormat, CapturedAsset, FormatConstraints, PhotoOptions,
    RecordingOptions, RecordingResult, RecordingSession, Resolution,
};
