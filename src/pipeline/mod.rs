mod naming;
mod outcome;
mod persist;
mod runner;
mod state;
#[cfg(test)]
mod tests;

pub use naming::AssetNamer;
pub use outcome::{
    BurstReport, CaptureOutcome, CaptureRequest, ExportStatus, PersistedAsset, RecordingOutcome,
};
pub use persist::{move_file, remove_dir_if_empty};
pub use runner::{CapturePipeline, CaptureStats};
pub use state::{CaptureMode, CaptureStage, RecordingState};
