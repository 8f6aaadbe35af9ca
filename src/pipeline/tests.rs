use super::*;
use crate::config::PocketcamConfig;
use crate::device::{
    AssetKind, CameraFacing, CapturedAsset, Resolution, SimulatedCamera, SimulatedProvider,
};
use crate::error::{CaptureError, ErrorKind, ExportError, PocketcamError};
use crate::events::{EventBus, PocketcamEvent};
use crate::gallery::{AssetType, GalleryEntry, GalleryExporter};
use crate::gate::{ResolutionGate, DEFAULT_MIN_DENSITY};
use crate::settings::CaptureSettings;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{sleep, timeout, Duration};

/// Gallery that remembers every save request
#[derive(Default)]
struct MockGallery {
    saved: Mutex<Vec<(PathBuf, AssetType)>>,
    reject: bool,
}

impl MockGallery {
    fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    fn saved(&self) -> Vec<(PathBuf, AssetType)> {
        self.saved.lock().clone()
    }
}

#[async_trait::async_trait]
impl GalleryExporter for MockGallery {
    async fn save(&self, path: &Path, asset_type: AssetType) -> Result<GalleryEntry, ExportError> {
        self.saved.lock().push((path.to_path_buf(), asset_type));
        if self.reject {
            return Err(ExportError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Ok(GalleryEntry {
            source: path.to_path_buf(),
            location: PathBuf::from("/gallery").join(path.file_name().unwrap_or_default()),
            asset_type: asset_type.resolve(path),
        })
    }
}

struct Harness {
    _temp_dir: TempDir,
    app_dir: PathBuf,
    camera: Arc<SimulatedCamera>,
    gallery: Arc<MockGallery>,
    event_bus: Arc<EventBus>,
    pipeline: CapturePipeline,
    settings: CaptureSettings,
}

impl Harness {
    async fn new() -> Self {
        Self::build(MockGallery::default(), true, true).await
    }

    async fn build(gallery: MockGallery, with_camera: bool, create_app_dir: bool) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let app_dir = temp_dir.path().join("media");

        let mut config = PocketcamConfig::default();
        config.storage.app_dir = app_dir.to_string_lossy().into_owned();

        let camera = Arc::new(SimulatedCamera::new(
            CameraFacing::Back,
            temp_dir.path().join("scratch"),
        ));
        let provider = if with_camera {
            SimulatedProvider::empty().with_device(Arc::clone(&camera))
        } else {
            SimulatedProvider::empty()
        };

        let gallery = Arc::new(gallery);
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let pipeline = CapturePipeline::new(
            &config,
            Arc::new(provider),
            Arc::clone(&gallery) as Arc<dyn GalleryExporter>,
            Arc::clone(&event_bus),
        );
        if create_app_dir {
            pipeline.start().await.unwrap();
        }

        Self {
            _temp_dir: temp_dir,
            app_dir,
            camera,
            gallery,
            event_bus,
            pipeline,
            settings: CaptureSettings::from_config(&config.camera),
        }
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn stored(&self) -> Vec<PathBuf> {
        Self::files_in(&self.app_dir)
    }

    fn scratch(&self) -> Vec<PathBuf> {
        Self::files_in(self.camera.scratch_dir())
    }

    async fn wait_until_idle(&self) {
        timeout(Duration::from_secs(2), async {
            while self.pipeline.recording_state() != RecordingState::Idle {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_photo_is_persisted_then_exported() {
    let harness = Harness::new().await;

    let outcome = harness
        .pipeline
        .capture_photo(&harness.settings, 0.85)
        .await;

    let asset = outcome.persisted().expect("photo should be persisted").clone();
    assert_eq!(asset.kind, AssetKind::Photo);
    assert!(asset.final_path.exists());
    assert_eq!(asset.final_path.parent(), Some(harness.app_dir.as_path()));
    assert_eq!(
        asset.final_path.file_name().unwrap().to_string_lossy(),
        format!("{}.jpg", asset.captured_at.timestamp_millis())
    );
    assert!(outcome.is_exported());

    assert_eq!(
        harness.gallery.saved(),
        vec![(asset.final_path.clone(), AssetType::Photo)]
    );
    assert!(harness.scratch().is_empty());
    assert_eq!(harness.pipeline.stats().photos_persisted, 1);
}

#[tokio::test]
async fn test_invalid_quality_never_reaches_device() {
    let harness = Harness::new().await;

    let outcome = harness.pipeline.capture_photo(&harness.settings, 1.5).await;

    match outcome {
        CaptureOutcome::Failed { stage, error } => {
            assert_eq!(stage, CaptureStage::Idle);
            assert_eq!(error.kind(), ErrorKind::InvalidRequest);
        }
        other => panic!("Unexpected outcome: {:?}", other),
    }
    assert_eq!(harness.camera.photo_requests(), 0);
}

#[tokio::test]
async fn test_burst_shot_failure_does_not_stop_burst() {
    let harness = Harness::new().await;
    harness.camera.fail_photo(3);

    let report = harness
        .pipeline
        .capture_burst(&harness.settings, 0.85, 5)
        .await;

    assert_eq!(report.requested, 5);
    assert_eq!(report.shots.len(), 5);
    assert_eq!(report.persisted(), 4);
    assert_eq!(report.exported(), 4);
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.shots[2],
        CaptureOutcome::Failed {
            stage: CaptureStage::Capturing,
            error: PocketcamError::Capture(CaptureError::Photo { .. })
        }
    ));

    assert_eq!(harness.camera.photo_requests(), 5);
    assert_eq!(harness.gallery.saved().len(), 4);
    assert_eq!(harness.stored().len(), 4);
}

#[tokio::test]
async fn test_burst_names_are_unique() {
    let harness = Harness::new().await;

    let report = harness
        .pipeline
        .capture_burst(&harness.settings, 0.5, 8)
        .await;

    let mut names: Vec<_> = report
        .shots
        .iter()
        .filter_map(|s| s.persisted())
        .map(|a| a.final_path.clone())
        .collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 8);
}

#[tokio::test]
async fn test_zero_shot_burst_is_rejected() {
    let harness = Harness::new().await;

    let report = harness
        .pipeline
        .capture_burst(&harness.settings, 0.85, 0)
        .await;

    assert_eq!(report.persisted(), 0);
    assert_eq!(report.failed(), 1);
    assert_eq!(harness.camera.photo_requests(), 0);
}

#[tokio::test]
async fn test_recording_round_trip() {
    let harness = Harness::new().await;

    let started = harness.pipeline.start_recording(&harness.settings).await;
    assert!(matches!(started, RecordingOutcome::Started { .. }));
    assert!(harness.pipeline.is_recording());
    assert!(harness.camera.is_recording());

    let stopped = harness.pipeline.stop_recording().await;
    let video = match stopped {
        RecordingOutcome::Finished(outcome) => {
            assert!(outcome.is_exported());
            outcome.persisted().unwrap().clone()
        }
        other => panic!("Unexpected outcome: {:?}", other),
    };

    assert_eq!(video.kind, AssetKind::Video);
    assert_eq!(video.final_path.extension().unwrap(), "mp4");
    assert!(!harness.pipeline.is_recording());
    assert_eq!(harness.pipeline.recording_state(), RecordingState::Idle);
    assert_eq!(harness.stored(), vec![video.final_path.clone()]);
    assert_eq!(
        harness.gallery.saved(),
        vec![(video.final_path, AssetType::Video)]
    );
}

#[tokio::test]
async fn test_second_start_reports_already_recording() {
    let harness = Harness::new().await;

    harness.pipeline.start_recording(&harness.settings).await;
    let second = harness.pipeline.start_recording(&harness.settings).await;

    assert!(matches!(second, RecordingOutcome::AlreadyRecording));
    assert!(harness.pipeline.is_recording());
}

#[tokio::test]
async fn test_stop_while_idle_is_noop() {
    let harness = Harness::new().await;

    let outcome = harness.pipeline.stop_recording().await;

    assert!(matches!(outcome, RecordingOutcome::NotRecording));
    assert_eq!(harness.camera.stop_requests(), 0);
    assert_eq!(harness.pipeline.recording_state(), RecordingState::Idle);
}

#[tokio::test]
async fn test_failed_move_keeps_temporary_file() {
    // Application directory is never created, so the move must fail
    let harness = Harness::build(MockGallery::default(), true, false).await;

    let outcome = harness
        .pipeline
        .capture_photo(&harness.settings, 0.85)
        .await;

    match &outcome {
        CaptureOutcome::Failed { stage, error } => {
            assert_eq!(*stage, CaptureStage::Moving);
            assert_eq!(error.kind(), ErrorKind::IoFailure);
        }
        other => panic!("Unexpected outcome: {:?}", other),
    }
    assert_eq!(harness.scratch().len(), 1);
    assert!(harness.gallery.saved().is_empty());
    assert_eq!(harness.pipeline.stats().captures_failed, 1);

    // Cleaning up the scratch area must not discard the unpersisted photo
    let kept = harness.scratch();
    assert!(!remove_dir_if_empty(harness.camera.scratch_dir()).await.unwrap());
    assert_eq!(harness.scratch(), kept);
}

#[tokio::test]
async fn test_photo_uses_selected_resolution() {
    let mut harness = Harness::new().await;
    let gate = ResolutionGate::new(6.5, DEFAULT_MIN_DENSITY).unwrap();
    harness.settings.apply_resolution(Resolution::HD, &gate);

    harness.pipeline.capture_photo(&harness.settings, 0.85).await;
    let options = harness.camera.last_photo_options().unwrap();
    assert_eq!(options.format.unwrap().resolution, Resolution::HD);

    harness.settings.apply_resolution(Resolution::FULL_HD, &gate);
    harness
        .pipeline
        .capture_burst(&harness.settings, 0.85, 2)
        .await;
    let options = harness.camera.last_photo_options().unwrap();
    assert_eq!(options.format.unwrap().resolution, Resolution::FULL_HD);
}

#[tokio::test]
async fn test_existing_file_is_never_overwritten() {
    let harness = Harness::new().await;
    let captured_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let taken = harness.app_dir.join("1700000000000.jpg");
    std::fs::write(&taken, b"earlier photo").unwrap();

    let mut captured =
        CapturedAsset::new(harness.camera.scratch_dir().join("shot.jpg"), AssetKind::Photo);
    captured.timestamp = captured_at;
    let destination = harness.pipeline.reserve_destination(&captured).await.unwrap();

    assert_eq!(destination, harness.app_dir.join("1700000000000-1.jpg"));
    assert_eq!(std::fs::read(&taken).unwrap(), b"earlier photo");
}

#[tokio::test]
async fn test_failed_export_keeps_persisted_file() {
    let harness = Harness::build(MockGallery::rejecting(), true, true).await;

    let outcome = harness
        .pipeline
        .capture_photo(&harness.settings, 0.85)
        .await;

    let asset = outcome.persisted().unwrap();
    assert!(asset.final_path.exists());
    assert!(!outcome.is_exported());
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ExportFailure));
    assert_eq!(harness.gallery.saved().len(), 1);

    let stats = harness.pipeline.stats();
    assert_eq!(stats.photos_persisted, 1);
    assert_eq!(stats.exports_failed, 1);
}

#[tokio::test]
async fn test_missing_camera_makes_everything_noop() {
    let harness = Harness::build(MockGallery::default(), false, true).await;

    let photo = harness.pipeline.capture_photo(&harness.settings, 0.85).await;
    let burst = harness
        .pipeline
        .capture_burst(&harness.settings, 0.85, 5)
        .await;
    let start = harness.pipeline.start_recording(&harness.settings).await;
    let stop = harness.pipeline.stop_recording().await;

    assert!(matches!(photo, CaptureOutcome::Skipped));
    assert!(burst.skipped);
    assert!(burst.shots.is_empty());
    assert!(matches!(start, RecordingOutcome::Skipped));
    assert!(matches!(stop, RecordingOutcome::NotRecording));

    assert!(harness.stored().is_empty());
    assert!(harness.gallery.saved().is_empty());
    assert!(!harness.pipeline.is_recording());
}

#[tokio::test]
async fn test_failed_start_returns_to_idle() {
    let harness = Harness::new().await;
    harness.camera.set_fail_recording_start(true);

    let outcome = harness.pipeline.start_recording(&harness.settings).await;

    assert!(matches!(outcome, RecordingOutcome::Failed { .. }));
    assert_eq!(harness.pipeline.recording_state(), RecordingState::Idle);
    assert!(!harness.pipeline.is_recording());

    // Nothing to stop, the device is not asked
    harness.pipeline.stop_recording().await;
    assert_eq!(harness.camera.stop_requests(), 0);
}

#[tokio::test]
async fn test_failed_stop_keeps_recording() {
    let harness = Harness::new().await;
    harness.pipeline.start_recording(&harness.settings).await;
    harness.camera.set_fail_stop(true);

    let outcome = harness.pipeline.stop_recording().await;

    assert!(matches!(outcome, RecordingOutcome::Failed { .. }));
    assert!(harness.pipeline.is_recording());
    assert!(harness.camera.is_recording());

    harness.camera.set_fail_stop(false);
    let retried = harness.pipeline.stop_recording().await;

    assert!(matches!(retried, RecordingOutcome::Finished(ref o) if o.persisted().is_some()));
    assert!(!harness.pipeline.is_recording());
    assert_eq!(harness.camera.stop_requests(), 2);
}

#[tokio::test]
async fn test_device_error_during_recording_returns_to_idle() {
    let harness = Harness::new().await;
    harness.pipeline.start_recording(&harness.settings).await;

    assert!(harness.camera.fail_active_recording("encoder crashed").await);
    harness.wait_until_idle().await;
    assert!(!harness.pipeline.is_recording());

    // Collecting the ended session does not reach the device
    let outcome = harness.pipeline.stop_recording().await;
    match outcome {
        RecordingOutcome::Finished(CaptureOutcome::Failed { stage, error }) => {
            assert_eq!(stage, CaptureStage::Capturing);
            assert_eq!(error.kind(), ErrorKind::CaptureFailure);
        }
        other => panic!("Unexpected outcome: {:?}", other),
    }
    assert_eq!(harness.camera.stop_requests(), 0);
    assert!(harness.stored().is_empty());

    // A fresh session can start right away
    let restarted = harness.pipeline.start_recording(&harness.settings).await;
    assert!(matches!(restarted, RecordingOutcome::Started { .. }));
}

#[tokio::test]
async fn test_restart_after_device_error_without_stop() {
    let harness = Harness::new().await;
    harness.pipeline.start_recording(&harness.settings).await;
    harness.camera.fail_active_recording("storage removed").await;
    harness.wait_until_idle().await;

    let restarted = harness.pipeline.start_recording(&harness.settings).await;

    assert!(matches!(restarted, RecordingOutcome::Started { .. }));
    assert!(harness.pipeline.is_recording());
}

#[tokio::test]
async fn test_events_follow_photo_lifecycle() {
    let harness = Harness::new().await;
    let mut receiver = harness.event_bus.subscribe();

    harness.pipeline.capture_photo(&harness.settings, 0.85).await;

    let mut types = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        types.push(event.event_type());
    }
    assert_eq!(
        types,
        vec!["capture_started", "asset_persisted", "asset_exported"]
    );
}

#[tokio::test]
async fn test_recording_state_changes_are_published() {
    let harness = Harness::new().await;
    let mut receiver = harness.event_bus.subscribe();

    harness.pipeline.start_recording(&harness.settings).await;
    harness.pipeline.stop_recording().await;

    let mut states = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        if let PocketcamEvent::RecordingStateChanged { state, .. } = event {
            states.push(state);
        }
    }
    assert_eq!(
        states,
        vec![
            RecordingState::Starting,
            RecordingState::Recording,
            RecordingState::Stopping,
            RecordingState::Idle,
        ]
    );
}

#[tokio::test]
async fn test_failed_photo_is_reported_once() {
    let harness = Harness::new().await;
    harness.camera.fail_photo(1);
    let mut receiver = harness.event_bus.subscribe();

    harness.pipeline.capture_photo(&harness.settings, 0.85).await;

    let mut types = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        types.push(event.event_type());
    }
    assert_eq!(types, vec!["capture_started", "capture_failed"]);
}
