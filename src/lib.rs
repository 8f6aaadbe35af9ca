pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod gallery;
pub mod gate;
pub mod keyboard_input;
pub mod pipeline;
pub mod settings;

pub use config::PocketcamConfig;
pub use device::{
    CameraDevice, CameraFacing, CameraProvider, Resolution, SimulatedCamera, SimulatedProvider,
};
pub use error::{ErrorKind, PocketcamError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, PocketcamEvent};
pub use gallery::{AssetType, DirectoryGallery, GalleryEntry, GalleryExporter};
pub use gate::{is_acceptable, pixel_density, GateVerdict, ResolutionGate};
pub use keyboard_input::{InteractiveSession, KeyCommand};
pub use pipeline::{
    BurstReport, CaptureOutcome, CapturePipeline, CaptureStats, RecordingOutcome, RecordingState,
};
pub use settings::{CaptureSettings, ResolutionChange};
