use crate::device::AssetKind;
use crate::error::{ErrorKind, EventBusError};
use crate::pipeline::{CaptureMode, CaptureStage, RecordingState};
use serde::Serialize;
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events published by the capture pipeline
#[derive(Debug, Clone, Serialize)]
pub enum PocketcamEvent {
    /// A user action started a capture
    CaptureStarted {
        mode: CaptureMode,
        timestamp: SystemTime,
    },
    /// An asset was moved into application storage
    AssetPersisted {
        path: PathBuf,
        kind: AssetKind,
        timestamp: SystemTime,
    },
    /// A persisted asset was registered with the gallery
    AssetExported { path: PathBuf, location: PathBuf },
    /// Gallery registration failed; the persisted file is kept
    ExportFailed { path: PathBuf, error: String },
    /// A capture invocation failed before producing a persisted asset
    CaptureFailed {
        stage: CaptureStage,
        kind: ErrorKind,
        error: String,
    },
    /// The recording state machine moved
    RecordingStateChanged {
        state: RecordingState,
        timestamp: SystemTime,
    },
    /// The front-end asked to quit
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl PocketcamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PocketcamEvent::CaptureStarted { mode, .. } => format!("{:?} capture started", mode),
            PocketcamEvent::AssetPersisted { path, kind, .. } => {
                format!("{:?} saved to {}", kind, path.display())
            }
            PocketcamEvent::AssetExported { location, .. } => {
                format!("Saved to gallery: {}", location.display())
            }
            PocketcamEvent::ExportFailed { path, error } => {
                format!("Failed to save {} to gallery: {}", path.display(), error)
            }
            PocketcamEvent::CaptureFailed { stage, error, .. } => {
                format!("Capture failed while {}: {}", stage, error)
            }
            PocketcamEvent::RecordingStateChanged { state, .. } => {
                format!("Recording state: {}", state)
            }
            PocketcamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PocketcamEvent::CaptureStarted { .. } => "capture_started",
            PocketcamEvent::AssetPersisted { .. } => "asset_persisted",
            PocketcamEvent::AssetExported { .. } => "asset_exported",
            PocketcamEvent::ExportFailed { .. } => "export_failed",
            PocketcamEvent::CaptureFailed { .. } => "capture_failed",
            PocketcamEvent::RecordingStateChanged { .. } => "recording_state_changed",
            PocketcamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Whether the user should be told about this event
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PocketcamEvent::ExportFailed { .. } | PocketcamEvent::CaptureFailed { .. }
        )
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<PocketcamEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PocketcamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: PocketcamEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!(event = event.event_type(), "Publishing: {}", event.description());
        }

        match &event {
            PocketcamEvent::CaptureFailed { stage, error, .. } => {
                error!("Capture failed while {}: {}", stage, error);
            }
            PocketcamEvent::ExportFailed { path, error } => {
                warn!("Failed to save {} to gallery: {}", path.display(), error);
            }
            PocketcamEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {}
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only failures worth surfacing to the user
    Failures,
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &PocketcamEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Failures => event.is_failure(),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<PocketcamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<PocketcamEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<PocketcamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
