use super::types::{
    CameraFacing, CameraFormat, CapturedAsset, PhotoOptions, RecordingOptions, RecordingSession,
};
use crate::error::CaptureError;
use std::sync::Arc;

/// Capture primitives of one physical camera
#[async_trait::async_trait]
pub trait CameraDevice: Send + Sync {
    /// Stable identifier of the device, used in logs
    fn id(&self) -> &str;

    fn facing(&self) -> CameraFacing;

    /// Formats the device can be configured with
    fn formats(&self) -> Vec<CameraFormat>;

    /// Take one photo and return the transient file it was written to
    async fn take_photo(&self, options: &PhotoOptions) -> Result<CapturedAsset, CaptureError>;

    /// Begin a recording session. Returning `Ok` means the device acknowledged the start.
    async fn start_recording(
        &self,
        options: &RecordingOptions,
    ) -> Result<RecordingSession, CaptureError>;

    /// Ask the device to end the active session. The recorded file is reported
    /// through the session's `finished` channel.
    async fn stop_recording(&self) -> Result<(), CaptureError>;
}

/// Resolves the active camera for a facing
pub trait CameraProvider: Send + Sync {
    /// `None` when no camera faces that way
    fn device(&self, facing: CameraFacing) -> Option<Arc<dyn CameraDevice>>;
}
