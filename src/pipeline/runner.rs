use super::{
    naming::AssetNamer,
    outcome::{
        BurstReport, CaptureOutcome, CaptureRequest, ExportStatus, PersistedAsset,
        RecordingOutcome,
    },
    persist::move_file,
    state::{CaptureMode, CaptureStage, RecordingState, StageTracker},
};
use crate::{
    config::{CaptureConfig, PocketcamConfig},
    device::{
        negotiate_format, AssetKind, CameraDevice, CameraFormat, CameraProvider, CapturedAsset,
        FormatConstraints, PhotoOptions, RecordingOptions, RecordingResult,
    },
    error::{CaptureError, PocketcamError, Result},
    events::{EventBus, PocketcamEvent},
    gallery::GalleryExporter,
    settings::CaptureSettings,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Capture-and-persist pipeline.
///
/// Every asset a camera produces is moved from its transient location into
/// the application directory and then handed to the gallery exporter. Entry
/// points never return errors; they report a typed outcome and publish the
/// same information on the event bus.
pub struct CapturePipeline {
    app_dir: PathBuf,
    capture_config: CaptureConfig,
    provider: Arc<dyn CameraProvider>,
    gallery: Arc<dyn GalleryExporter>,
    event_bus: Arc<EventBus>,
    namer: Arc<AssetNamer>,
    recording_state: Arc<Mutex<RecordingState>>,
    recorder: Arc<tokio::sync::Mutex<Option<ActiveRecording>>>,
    counters: Arc<PipelineCounters>,
}

/// A recording the device acknowledged
struct ActiveRecording {
    session_id: Uuid,
    device: Arc<dyn CameraDevice>,
    completion: JoinHandle<CaptureOutcome>,
}

#[derive(Default)]
struct PipelineCounters {
    photos_persisted: AtomicU64,
    videos_persisted: AtomicU64,
    exports_failed: AtomicU64,
    captures_failed: AtomicU64,
}

/// Statistics about the capture pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureStats {
    pub photos_persisted: u64,
    pub videos_persisted: u64,
    pub exports_failed: u64,
    pub captures_failed: u64,
    pub recording: RecordingState,
}

impl CapturePipeline {
    pub fn new(
        config: &PocketcamConfig,
        provider: Arc<dyn CameraProvider>,
        gallery: Arc<dyn GalleryExporter>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            app_dir: PathBuf::from(&config.storage.app_dir),
            capture_config: config.capture.clone(),
            provider,
            gallery,
            event_bus,
            namer: Arc::new(AssetNamer::new()),
            recording_state: Arc::new(Mutex::new(RecordingState::Idle)),
            recorder: Arc::new(tokio::sync::Mutex::new(None)),
            counters: Arc::new(PipelineCounters::default()),
        }
    }

    /// Prepare application storage
    pub async fn start(&self) -> Result<()> {
        if !fs::try_exists(&self.app_dir)
            .await
            .map_err(|e| PocketcamError::io(&self.app_dir, e))?
        {
            fs::create_dir_all(&self.app_dir)
                .await
                .map_err(|e| PocketcamError::io(&self.app_dir, e))?;
            info!("Created application directory: {}", self.app_dir.display());
        }

        info!(
            "Capture pipeline ready (storage: {})",
            self.app_dir.display()
        );
        Ok(())
    }

    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    pub fn recording_state(&self) -> RecordingState {
        *self.recording_state.lock()
    }

    /// True only while the device has acknowledged an active session
    pub fn is_recording(&self) -> bool {
        self.recording_state() == RecordingState::Recording
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            photos_persisted: self.counters.photos_persisted.load(Ordering::Relaxed),
            videos_persisted: self.counters.videos_persisted.load(Ordering::Relaxed),
            exports_failed: self.counters.exports_failed.load(Ordering::Relaxed),
            captures_failed: self.counters.captures_failed.load(Ordering::Relaxed),
            recording: self.recording_state(),
        }
    }

    /// Take one photo and persist it
    pub async fn capture_photo(&self, settings: &CaptureSettings, quality: f32) -> CaptureOutcome {
        let Some(device) = self.provider.device(settings.facing()) else {
            debug!("No {} camera available, ignoring photo request", settings.facing());
            return CaptureOutcome::Skipped;
        };

        if let Err(e) = CaptureRequest::photo(quality).validate() {
            return self.fail(&mut StageTracker::new("photo"), e).await;
        }

        self.notify(PocketcamEvent::CaptureStarted {
            mode: CaptureMode::Photo,
            timestamp: SystemTime::now(),
        })
        .await;

        let options = self.photo_options(device.as_ref(), settings, quality);
        self.take_and_persist(device.as_ref(), &options, "photo").await
    }

    /// Take `shot_count` photos one after another.
    ///
    /// Shots are independent: a failed shot is recorded and the burst goes on.
    pub async fn capture_burst(
        &self,
        settings: &CaptureSettings,
        quality: f32,
        shot_count: u32,
    ) -> BurstReport {
        let mut report = BurstReport {
            requested: shot_count,
            ..BurstReport::default()
        };

        let Some(device) = self.provider.device(settings.facing()) else {
            debug!("No {} camera available, ignoring burst request", settings.facing());
            report.skipped = true;
            return report;
        };

        if let Err(e) = CaptureRequest::burst(quality, shot_count).validate() {
            let outcome = self.fail(&mut StageTracker::new("burst"), e).await;
            report.shots.push(outcome);
            return report;
        }

        self.notify(PocketcamEvent::CaptureStarted {
            mode: CaptureMode::Burst,
            timestamp: SystemTime::now(),
        })
        .await;

        let options = self.photo_options(device.as_ref(), settings, quality);
        for shot in 1..=shot_count {
            let label = format!("burst shot {}/{}", shot, shot_count);
            let outcome = self.take_and_persist(device.as_ref(), &options, &label).await;
            report.shots.push(outcome);
        }

        info!(
            "Burst finished: {}/{} shots persisted, {} exported",
            report.persisted(),
            shot_count,
            report.exported()
        );
        report
    }

    /// Begin recording with the current settings.
    ///
    /// Recording state moves to `Recording` only once the device acknowledged
    /// the start.
    pub async fn start_recording(&self, settings: &CaptureSettings) -> RecordingOutcome {
        let Some(device) = self.provider.device(settings.facing()) else {
            debug!("No {} camera available, ignoring record request", settings.facing());
            return RecordingOutcome::Skipped;
        };

        let mut recorder = self.recorder.lock().await;

        if recorder.is_some() && self.recording_state() != RecordingState::Idle {
            warn!("Recording already in progress");
            return RecordingOutcome::AlreadyRecording;
        }

        // A session that ended on its own is still waiting to be collected
        if let Some(ended) = recorder.take() {
            match ended.completion.await {
                Ok(outcome) => debug!(
                    "Collected ended session {}: failed = {}",
                    ended.session_id,
                    outcome.is_failed()
                ),
                Err(e) => warn!("Recording task {} did not complete: {}", ended.session_id, e),
            }
        }

        self.notify(PocketcamEvent::CaptureStarted {
            mode: CaptureMode::Video,
            timestamp: SystemTime::now(),
        })
        .await;
        self.set_recording_state(RecordingState::Starting).await;

        let format = Self::negotiate(device.as_ref(), settings);
        let options = RecordingOptions {
            frame_rate: settings.frame_rate(),
            format,
            stabilization: settings.stabilization_enabled()
                && format.is_some_and(|f| f.supports_stabilization),
        };

        let session = match device.start_recording(&options).await {
            Ok(session) => session,
            Err(e) => {
                self.set_recording_state(RecordingState::Idle).await;
                let error: PocketcamError = e.into();
                self.counters.captures_failed.fetch_add(1, Ordering::Relaxed);
                self.notify(PocketcamEvent::CaptureFailed {
                    stage: CaptureStage::Capturing,
                    kind: error.kind(),
                    error: format!("Failed to start recording: {}", error),
                })
                .await;
                return RecordingOutcome::Failed { error };
            }
        };

        let session_id = session.id;
        self.set_recording_state(RecordingState::Recording).await;

        let pipeline = self.clone();
        let completion = tokio::spawn(async move {
            pipeline.finish_recording(session_id, session.finished).await
        });

        *recorder = Some(ActiveRecording {
            session_id,
            device,
            completion,
        });

        info!(
            "Recording {} started at {} fps on {} camera",
            session_id,
            settings.frame_rate(),
            settings.facing()
        );
        RecordingOutcome::Started { session_id }
    }

    /// End the active recording and wait for the video to be persisted.
    ///
    /// Without an active session this is a no-op that never reaches the device.
    pub async fn stop_recording(&self) -> RecordingOutcome {
        let mut recorder = self.recorder.lock().await;

        let Some(active) = recorder.take() else {
            debug!("Stop requested while not recording");
            return RecordingOutcome::NotRecording;
        };

        if self.recording_state() == RecordingState::Idle {
            // The device already ended this session
            return Self::collect(active).await;
        }

        self.set_recording_state(RecordingState::Stopping).await;

        if let Err(e) = active.device.stop_recording().await {
            error!("Failed to stop recording {}: {}", active.session_id, e);
            // The session is still live unless it ended while we were asking
            self.transition_if(RecordingState::Stopping, RecordingState::Recording)
                .await;
            *recorder = Some(active);
            return RecordingOutcome::Failed { error: e.into() };
        }

        let outcome = Self::collect(active).await;
        self.set_recording_state(RecordingState::Idle).await;
        outcome
    }

    async fn collect(active: ActiveRecording) -> RecordingOutcome {
        match active.completion.await {
            Ok(outcome) => RecordingOutcome::Finished(outcome),
            Err(e) => RecordingOutcome::Failed {
                error: PocketcamError::system(format!(
                    "recording task {} did not complete: {}",
                    active.session_id, e
                )),
            },
        }
    }

    /// Runs when the device reports the end of a session
    async fn finish_recording(
        &self,
        session_id: Uuid,
        finished: oneshot::Receiver<RecordingResult>,
    ) -> CaptureOutcome {
        let result = finished.await;
        self.set_recording_state(RecordingState::Idle).await;

        let mut tracker = StageTracker::new(format!("recording {}", session_id));
        tracker.advance();

        match result {
            Ok(Ok(video)) => self.persist_and_export(video, tracker).await,
            Ok(Err(e)) => self.fail(&mut tracker, e.into()).await,
            Err(_) => self.fail(&mut tracker, CaptureError::SessionDropped.into()).await,
        }
    }

    /// Format closest to the selected resolution and frame rate, in 16:9
    fn negotiate(device: &dyn CameraDevice, settings: &CaptureSettings) -> Option<CameraFormat> {
        let constraints =
            FormatConstraints::widescreen(settings.resolution(), settings.frame_rate());
        negotiate_format(&device.formats(), &constraints)
    }

    fn photo_options(
        &self,
        device: &dyn CameraDevice,
        settings: &CaptureSettings,
        quality: f32,
    ) -> PhotoOptions {
        PhotoOptions {
            quality,
            skip_metadata: self.capture_config.skip_metadata,
            format: Self::negotiate(device, settings),
        }
    }

    async fn take_and_persist(
        &self,
        device: &dyn CameraDevice,
        options: &PhotoOptions,
        label: &str,
    ) -> CaptureOutcome {
        let mut tracker = StageTracker::new(label);
        tracker.advance();

        match device.take_photo(options).await {
            Ok(photo) => self.persist_and_export(photo, tracker).await,
            Err(e) => {
                debug!("{}: photo request to {} failed", label, device.id());
                self.fail(&mut tracker, e.into()).await
            }
        }
    }

    /// Move a captured file into application storage and export it
    async fn persist_and_export(
        &self,
        captured: CapturedAsset,
        mut tracker: StageTracker,
    ) -> CaptureOutcome {
        tracker.advance();

        let destination = match self.reserve_destination(&captured).await {
            Ok(path) => path,
            Err(e) => return self.fail(&mut tracker, e).await,
        };

        if let Err(e) = move_file(&captured.temporary_path, &destination).await {
            debug!("Temporary file kept: {}", captured.temporary_path.display());
            return self.fail(&mut tracker, e).await;
        }

        let asset = PersistedAsset {
            final_path: destination,
            kind: captured.kind,
            captured_at: captured.timestamp,
        };

        match asset.kind {
            AssetKind::Photo => self.counters.photos_persisted.fetch_add(1, Ordering::Relaxed),
            AssetKind::Video => self.counters.videos_persisted.fetch_add(1, Ordering::Relaxed),
        };
        info!("{:?} saved: {}", asset.kind, asset.final_path.display());
        self.notify(PocketcamEvent::AssetPersisted {
            path: asset.final_path.clone(),
            kind: asset.kind,
            timestamp: SystemTime::now(),
        })
        .await;

        tracker.advance();

        let export = match self.gallery.save(&asset.final_path, asset.kind.into()).await {
            Ok(entry) => {
                self.notify(PocketcamEvent::AssetExported {
                    path: asset.final_path.clone(),
                    location: entry.location.clone(),
                })
                .await;
                ExportStatus::Exported(entry)
            }
            Err(e) => {
                self.counters.exports_failed.fetch_add(1, Ordering::Relaxed);
                self.notify(PocketcamEvent::ExportFailed {
                    path: asset.final_path.clone(),
                    error: e.to_string(),
                })
                .await;
                ExportStatus::Failed(e)
            }
        };

        tracker.advance();
        CaptureOutcome::Persisted { asset, export }
    }

    /// First free `<app_dir>/<ms>[-n].<ext>` for the asset
    pub(super) async fn reserve_destination(&self, captured: &CapturedAsset) -> Result<PathBuf> {
        loop {
            let candidate = self
                .namer
                .path_in(&self.app_dir, captured.timestamp, captured.kind);
            match fs::try_exists(&candidate).await {
                Ok(false) => return Ok(candidate),
                Ok(true) => debug!("{} already exists, trying next name", candidate.display()),
                Err(e) => return Err(PocketcamError::io(candidate, e)),
            }
        }
    }

    async fn fail(&self, tracker: &mut StageTracker, error: PocketcamError) -> CaptureOutcome {
        let stage = tracker.fail();
        self.counters.captures_failed.fetch_add(1, Ordering::Relaxed);
        self.notify(PocketcamEvent::CaptureFailed {
            stage,
            kind: error.kind(),
            error: error.to_string(),
        })
        .await;
        CaptureOutcome::Failed { stage, error }
    }

    async fn set_recording_state(&self, next: RecordingState) {
        let previous = {
            let mut state = self.recording_state.lock();
            let previous = *state;
            *state = next;
            previous
        };

        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!("Unexpected recording transition {} -> {}", previous, next);
        }
        self.announce_recording_state(next).await;
    }

    /// Apply `next` only if the state is still `expected`
    async fn transition_if(&self, expected: RecordingState, next: RecordingState) -> bool {
        let applied = {
            let mut state = self.recording_state.lock();
            if *state == expected {
                *state = next;
                true
            } else {
                false
            }
        };

        if applied {
            self.announce_recording_state(next).await;
        }
        applied
    }

    async fn announce_recording_state(&self, state: RecordingState) {
        info!("Recording state: {}", state);
        self.notify(PocketcamEvent::RecordingStateChanged {
            state,
            timestamp: SystemTime::now(),
        })
        .await;
    }

    async fn notify(&self, event: PocketcamEvent) {
        if let Err(e) = self.event_bus.publish(event).await {
            debug!("Pipeline event not delivered: {}", e);
        }
    }
}

impl Clone for CapturePipeline {
    fn clone(&self) -> Self {
        Self {
            app_dir: self.app_dir.clone(),
            capture_config: self.capture_config.clone(),
            provider: Arc::clone(&self.provider),
            gallery: Arc::clone(&self.gallery),
            event_bus: Arc::clone(&self.event_bus),
            namer: Arc::clone(&self.namer),
            recording_state: Arc::clone(&self.recording_state),
            recorder: Arc::clone(&self.recorder),
            counters: Arc::clone(&self.counters),
        }
    }
}
