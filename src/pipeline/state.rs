use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// What a user action asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Photo,
    Burst,
    Video,
}

/// Progress of a single capture invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStage {
    Idle,
    Capturing,
    Moving,
    Exporting,
    Done,
    Failed,
}

impl CaptureStage {
    /// The stage that follows this one on the success path
    pub fn next(self) -> Option<CaptureStage> {
        match self {
            CaptureStage::Idle => Some(CaptureStage::Capturing),
            CaptureStage::Capturing => Some(CaptureStage::Moving),
            CaptureStage::Moving => Some(CaptureStage::Exporting),
            CaptureStage::Exporting => Some(CaptureStage::Done),
            CaptureStage::Done | CaptureStage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CaptureStage::Done | CaptureStage::Failed)
    }
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureStage::Idle => "idle",
            CaptureStage::Capturing => "capturing",
            CaptureStage::Moving => "moving",
            CaptureStage::Exporting => "exporting",
            CaptureStage::Done => "done",
            CaptureStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Walks one invocation through its stages and remembers where it failed
#[derive(Debug)]
pub(crate) struct StageTracker {
    label: String,
    stage: CaptureStage,
}

impl StageTracker {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stage: CaptureStage::Idle,
        }
    }

    pub(crate) fn stage(&self) -> CaptureStage {
        self.stage
    }

    /// Move to the next success-path stage
    pub(crate) fn advance(&mut self) -> CaptureStage {
        if let Some(next) = self.stage.next() {
            debug!("{}: {} -> {}", self.label, self.stage, next);
            self.stage = next;
        }
        self.stage
    }

    /// Mark the invocation failed; returns the stage the failure happened in
    pub(crate) fn fail(&mut self) -> CaptureStage {
        let failed_in = self.stage;
        debug!("{}: {} -> failed", self.label, failed_in);
        self.stage = CaptureStage::Failed;
        failed_in
    }
}

/// Recording lifecycle, updated only on transitions the device confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    Idle,
    Starting,
    Recording,
    Stopping,
}

impl RecordingState {
    pub fn can_transition_to(self, next: RecordingState) -> bool {
        use RecordingState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Recording)
                | (Starting, Idle)
                | (Recording, Stopping)
                | (Recording, Idle)
                | (Stopping, Idle)
                | (Stopping, Recording)
        )
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingState::Idle => "idle",
            RecordingState::Starting => "starting",
            RecordingState::Recording => "recording",
            RecordingState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
