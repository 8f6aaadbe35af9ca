use super::interface::{CameraDevice, CameraProvider};
use super::types::{
    AssetKind, CameraFacing, CameraFormat, CapturedAsset, PhotoOptions, RecordingOptions,
    RecordingResult, RecordingSession, Resolution,
};
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Smallest byte sequence image viewers recognise as a JPEG
const JPEG_PLACEHOLDER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
const JPEG_END: &[u8] = &[0xFF, 0xD9];
const MP4_PLACEHOLDER: &[u8] = &[0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2'];
const SIMULATED_FRAME_BYTES: usize = 64;
const MAX_SIMULATED_FRAMES: u64 = 10_000;

struct ActiveRecording {
    path: PathBuf,
    started: Instant,
    frame_rate: u32,
    finished: oneshot::Sender<RecordingResult>,
}

/// Camera that writes placeholder media files instead of talking to hardware.
///
/// Used by the terminal front-end and by tests, which can script failures.
pub struct SimulatedCamera {
    id: String,
    facing: CameraFacing,
    scratch_dir: PathBuf,
    formats: Vec<CameraFormat>,
    photo_requests: AtomicU64,
    stop_requests: AtomicU64,
    failing_shots: Mutex<HashSet<u64>>,
    fail_recording_start: AtomicBool,
    fail_stop: AtomicBool,
    last_photo_options: Mutex<Option<PhotoOptions>>,
    active: Mutex<Option<ActiveRecording>>,
}

impl SimulatedCamera {
    pub fn new(facing: CameraFacing, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: format!("simulated-{}", facing),
            facing,
            scratch_dir: scratch_dir.into(),
            formats: default_formats(),
            photo_requests: AtomicU64::new(0),
            stop_requests: AtomicU64::new(0),
            failing_shots: Mutex::new(HashSet::new()),
            fail_recording_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            last_photo_options: Mutex::new(None),
            active: Mutex::new(None),
        }
    }

    /// Make the n-th photo request (1-based, counted over the device lifetime) fail
    pub fn fail_photo(&self, request_number: u64) {
        self.failing_shots.lock().insert(request_number);
    }

    pub fn set_fail_recording_start(&self, fail: bool) {
        self.fail_recording_start.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn photo_requests(&self) -> u64 {
        self.photo_requests.load(Ordering::SeqCst)
    }

    /// Options of the most recent photo request
    pub fn last_photo_options(&self) -> Option<PhotoOptions> {
        *self.last_photo_options.lock()
    }

    pub fn stop_requests(&self) -> u64 {
        self.stop_requests.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// End the active session with an error, as a device does when encoding fails
    pub async fn fail_active_recording(&self, details: &str) -> bool {
        let active = self.active.lock().take();
        let Some(active) = active else {
            return false;
        };

        warn!("{}: recording aborted: {}", self.id, details);
        if let Err(e) = fs::remove_file(&active.path).await {
            debug!("Could not remove partial recording {}: {}", active.path.display(), e);
        }
        let _ = active.finished.send(Err(CaptureError::Recording {
            details: details.to_string(),
        }));
        true
    }

    fn scratch_file(&self, kind: AssetKind) -> PathBuf {
        self.scratch_dir
            .join(format!("{}-{}.{}", self.id, Uuid::new_v4(), kind.extension()))
    }

    async fn write_file(&self, path: &Path, chunks: &[&[u8]]) -> std::io::Result<()> {
        fs::create_dir_all(&self.scratch_dir).await?;
        let mut file = fs::File::create(path).await?;
        for chunk in chunks {
            file.write_all(chunk).await?;
        }
        file.flush().await
    }
}

fn default_formats() -> Vec<CameraFormat> {
    [
        (Resolution::new(640, 480), 60),
        (Resolution::HD, 60),
        (Resolution::FULL_HD, 30),
        (Resolution::new(3840, 2160), 30),
    ]
    .into_iter()
    .map(|(resolution, max_fps)| CameraFormat {
        resolution,
        min_fps: 1,
        max_fps,
        supports_stabilization: resolution.pixels() <= Resolution::FULL_HD.pixels(),
    })
    .collect()
}

#[async_trait::async_trait]
impl CameraDevice for SimulatedCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn facing(&self) -> CameraFacing {
        self.facing
    }

    fn formats(&self) -> Vec<CameraFormat> {
        self.formats.clone()
    }

    async fn take_photo(&self, options: &PhotoOptions) -> Result<CapturedAsset, CaptureError> {
        let request = self.photo_requests.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_photo_options.lock() = Some(*options);

        if self.failing_shots.lock().contains(&request) {
            return Err(CaptureError::Photo {
                details: format!("simulated sensor failure on request {}", request),
            });
        }

        let path = self.scratch_file(AssetKind::Photo);
        let quality = [(options.quality.clamp(0.0, 1.0) * 100.0).round() as u8];
        self.write_file(&path, &[JPEG_PLACEHOLDER, &quality, JPEG_END])
            .await
            .map_err(|e| CaptureError::Photo {
                details: format!("failed to write {}: {}", path.display(), e),
            })?;

        debug!(
            "{}: photo {} written to {} (quality {}, skip metadata {})",
            self.id,
            request,
            path.display(),
            options.quality,
            options.skip_metadata
        );
        Ok(CapturedAsset::new(path, AssetKind::Photo))
    }

    async fn start_recording(
        &self,
        options: &RecordingOptions,
    ) -> Result<RecordingSession, CaptureError> {
        if self.active.lock().is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        if self.fail_recording_start.load(Ordering::SeqCst) {
            return Err(CaptureError::Recording {
                details: "simulated encoder failed to start".to_string(),
            });
        }

        let path = self.scratch_file(AssetKind::Video);
        self.write_file(&path, &[MP4_PLACEHOLDER])
            .await
            .map_err(|e| CaptureError::Recording {
                details: format!("failed to create {}: {}", path.display(), e),
            })?;

        let (session, finished) = RecordingSession::new();

        let mut active = self.active.lock();
        if active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        *active = Some(ActiveRecording {
            path,
            started: Instant::now(),
            frame_rate: options.frame_rate,
            finished,
        });

        info!(
            "{}: recording session {} started at {} fps",
            self.id, session.id, options.frame_rate
        );
        Ok(session)
    }

    async fn stop_recording(&self) -> Result<(), CaptureError> {
        self.stop_requests.fetch_add(1, Ordering::SeqCst);

        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(CaptureError::Recording {
                details: "simulated stop request rejected".to_string(),
            });
        }

        let active = self.active.lock().take();
        let Some(active) = active else {
            return Err(CaptureError::NotRecording);
        };

        // One placeholder chunk per elapsed frame, at least one
        let frames = (active.started.elapsed().as_secs_f64() * active.frame_rate as f64)
            .ceil()
            .clamp(1.0, MAX_SIMULATED_FRAMES as f64) as usize;
        let payload = vec![0u8; frames * SIMULATED_FRAME_BYTES];

        let written = async {
            let mut file = fs::OpenOptions::new().append(true).open(&active.path).await?;
            file.write_all(&payload).await?;
            file.flush().await
        }
        .await;

        let result = match written {
            Ok(()) => {
                info!(
                    "{}: recording stopped, {} frames in {}",
                    self.id,
                    frames,
                    active.path.display()
                );
                Ok(CapturedAsset::new(active.path, AssetKind::Video))
            }
            Err(e) => Err(CaptureError::Recording {
                details: format!("failed to finalize {}: {}", active.path.display(), e),
            }),
        };

        if active.finished.send(result).is_err() {
            warn!("{}: recording finished but nobody is waiting for it", self.id);
        }
        Ok(())
    }
}

/// Provider over a fixed set of simulated cameras
#[derive(Default)]
pub struct SimulatedProvider {
    devices: HashMap<CameraFacing, Arc<SimulatedCamera>>,
}

impl SimulatedProvider {
    /// Back and front cameras writing into `scratch_dir`
    pub fn new(scratch_dir: impl AsRef<Path>) -> Self {
        let scratch_dir = scratch_dir.as_ref();
        Self::default()
            .with_device(Arc::new(SimulatedCamera::new(CameraFacing::Back, scratch_dir)))
            .with_device(Arc::new(SimulatedCamera::new(CameraFacing::Front, scratch_dir)))
    }

    /// Provider with no cameras at all
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, camera: Arc<SimulatedCamera>) -> Self {
        self.devices.insert(camera.facing(), camera);
        self
    }

    pub fn camera(&self, facing: CameraFacing) -> Option<Arc<SimulatedCamera>> {
        self.devices.get(&facing).cloned()
    }
}

impl CameraProvider for SimulatedProvider {
    fn device(&self, facing: CameraFacing) -> Option<Arc<dyn CameraDevice>> {
        self.devices
            .get(&facing)
            .map(|camera| Arc::clone(camera) as Arc<dyn CameraDevice>)
    }
}
