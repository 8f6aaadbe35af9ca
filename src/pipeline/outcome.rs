use super::state::{CaptureMode, CaptureStage};
use crate::device::AssetKind;
use crate::error::{ErrorKind, ExportError, PocketcamError, Result};
use crate::gallery::GalleryEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

/// One user action, checked before the pipeline runs it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    pub mode: CaptureMode,
    /// Shots in a burst; 1 for photo and video
    pub shot_count: u32,
    /// Encode quality in [0, 1]
    pub quality: f32,
}

impl CaptureRequest {
    pub fn photo(quality: f32) -> Self {
        Self {
            mode: CaptureMode::Photo,
            shot_count: 1,
            quality,
        }
    }

    pub fn burst(quality: f32, shot_count: u32) -> Self {
        Self {
            mode: CaptureMode::Burst,
            shot_count,
            quality,
        }
    }

    pub fn video() -> Self {
        Self {
            mode: CaptureMode::Video,
            shot_count: 1,
            quality: 1.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(PocketcamError::invalid_request(format!(
                "quality must be within [0, 1], got {}",
                self.quality
            )));
        }
        if self.shot_count == 0 {
            return Err(PocketcamError::invalid_request(
                "a capture needs at least one shot",
            ));
        }
        if self.mode != CaptureMode::Burst && self.shot_count != 1 {
            return Err(PocketcamError::invalid_request(format!(
                "{:?} captures take exactly one shot",
                self.mode
            )));
        }
        Ok(())
    }
}

/// An asset living in application storage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedAsset {
    pub final_path: PathBuf,
    pub kind: AssetKind,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum ExportStatus {
    Exported(GalleryEntry),
    /// The persisted file is kept even though the gallery does not show it
    Failed(ExportError),
}

/// Result of one capture invocation
#[derive(Debug)]
pub enum CaptureOutcome {
    Persisted {
        asset: PersistedAsset,
        export: ExportStatus,
    },
    Failed {
        stage: CaptureStage,
        error: PocketcamError,
    },
    /// No camera was available; nothing happened
    Skipped,
}

impl CaptureOutcome {
    pub fn persisted(&self) -> Option<&PersistedAsset> {
        match self {
            CaptureOutcome::Persisted { asset, .. } => Some(asset),
            _ => None,
        }
    }

    pub fn is_exported(&self) -> bool {
        matches!(
            self,
            CaptureOutcome::Persisted {
                export: ExportStatus::Exported(_),
                ..
            }
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CaptureOutcome::Failed { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            CaptureOutcome::Failed { error, .. } => Some(error.kind()),
            CaptureOutcome::Persisted {
                export: ExportStatus::Failed(_),
                ..
            } => Some(ErrorKind::ExportFailure),
            _ => None,
        }
    }

    /// JSON rendering for front-ends
    pub fn summary(&self) -> serde_json::Value {
        match self {
            CaptureOutcome::Persisted { asset, export } => {
                let gallery = match export {
                    ExportStatus::Exported(entry) => serde_json::json!({
                        "status": "exported",
                        "location": entry.location,
                    }),
                    ExportStatus::Failed(e) => serde_json::json!({
                        "status": "failed",
                        "error": e.to_string(),
                    }),
                };
                serde_json::json!({
                    "outcome": "persisted",
                    "asset": asset,
                    "gallery": gallery,
                })
            }
            CaptureOutcome::Failed { stage, error } => serde_json::json!({
                "outcome": "failed",
                "stage": stage,
                "kind": error.kind(),
                "error": error.to_string(),
            }),
            CaptureOutcome::Skipped => serde_json::json!({
                "outcome": "skipped",
                "reason": ErrorKind::DeviceUnavailable,
            }),
        }
    }
}

/// Outcomes of every shot of one burst, in issuance order
#[derive(Debug, Default)]
pub struct BurstReport {
    pub requested: u32,
    pub shots: Vec<CaptureOutcome>,
    /// No camera was available, no shot was attempted
    pub skipped: bool,
}

impl BurstReport {
    pub fn persisted(&self) -> usize {
        self.shots.iter().filter(|s| s.persisted().is_some()).count()
    }

    pub fn exported(&self) -> usize {
        self.shots.iter().filter(|s| s.is_exported()).count()
    }

    pub fn failed(&self) -> usize {
        self.shots.iter().filter(|s| s.is_failed()).count()
    }

    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "requested": self.requested,
            "skipped": self.skipped,
            "reason": self.skipped.then_some(ErrorKind::DeviceUnavailable),
            "persisted": self.persisted(),
            "exported": self.exported(),
            "failed": self.failed(),
            "shots": self.shots.iter().map(CaptureOutcome::summary).collect::<Vec<_>>(),
        })
    }
}

/// Result of a recording start or stop request
#[derive(Debug)]
pub enum RecordingOutcome {
    /// The device acknowledged the start
    Started { session_id: Uuid },
    /// The session ended; carries the persisted video or the failure
    Finished(CaptureOutcome),
    /// The device refused the request; recording state is unchanged
    Failed { error: PocketcamError },
    AlreadyRecording,
    NotRecording,
    /// No camera was available; nothing happened
    Skipped,
}

impl RecordingOutcome {
    pub fn summary(&self) -> serde_json::Value {
        match self {
            RecordingOutcome::Started { session_id } => serde_json::json!({
                "recording": "started",
                "session_id": session_id,
            }),
            RecordingOutcome::Finished(outcome) => serde_json::json!({
                "recording": "finished",
                "video": outcome.summary(),
            }),
            RecordingOutcome::Failed { error } => serde_json::json!({
                "recording": "failed",
                "kind": error.kind(),
                "error": error.to_string(),
            }),
            RecordingOutcome::AlreadyRecording => serde_json::json!({ "recording": "already_recording" }),
            RecordingOutcome::NotRecording => serde_json::json!({ "recording": "not_recording" }),
            RecordingOutcome::Skipped => serde_json::json!({
                "recording": "skipped",
                "reason": ErrorKind::DeviceUnavailable,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert!(CaptureRequest::photo(0.85).validate().is_ok());
        assert!(CaptureRequest::burst(0.85, 5).validate().is_ok());
        assert!(CaptureRequest::video().validate().is_ok());

        assert!(CaptureRequest::photo(1.2).validate().is_err());
        assert!(CaptureRequest::photo(-0.1).validate().is_err());
        assert!(CaptureRequest::burst(0.85, 0).validate().is_err());

        let odd = CaptureRequest {
            mode: CaptureMode::Photo,
            shot_count: 3,
            quality: 0.5,
        };
        assert!(odd.validate().is_err());
    }

    #[test]
    fn test_burst_report_counts() {
        let asset = PersistedAsset {
            final_path: PathBuf::from("/media/1.jpg"),
            kind: AssetKind::Photo,
            captured_at: Utc::now(),
        };
        let report = BurstReport {
            requested: 3,
            shots: vec![
                CaptureOutcome::Persisted {
                    asset: asset.clone(),
                    export: ExportStatus::Failed(ExportError::StorageFull {
                        path: asset.final_path.clone(),
                    }),
                },
                CaptureOutcome::Failed {
                    stage: CaptureStage::Capturing,
                    error: PocketcamError::system("sensor"),
                },
                CaptureOutcome::Skipped,
            ],
            skipped: false,
        };

        assert_eq!(report.persisted(), 1);
        assert_eq!(report.exported(), 0);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.shots[0].error_kind(), Some(ErrorKind::ExportFailure));
        assert_eq!(report.summary()["persisted"], 1);
        assert!(report.summary()["reason"].is_null());
    }

    #[test]
    fn test_skipped_summaries_name_missing_device() {
        assert_eq!(
            CaptureOutcome::Skipped.summary()["reason"],
            "device_unavailable"
        );
        assert_eq!(
            RecordingOutcome::Skipped.summary()["reason"],
            "device_unavailable"
        );

        let burst = BurstReport {
            requested: 5,
            shots: Vec::new(),
            skipped: true,
        };
        assert_eq!(burst.summary()["reason"], "device_unavailable");
    }
}
