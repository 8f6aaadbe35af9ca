use crate::device::Resolution;
use crate::error::Result;
use crate::events::{EventBus, PocketcamEvent};
use crate::gate::ResolutionGate;
use crate::pipeline::{CapturePipeline, RecordingOutcome};
use crate::settings::{CaptureSettings, FRAME_RATE_PRESETS};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Actions bound to keys in the interactive session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyCommand {
    Photo,
    Burst,
    ToggleRecording,
    ToggleFacing,
    ToggleStabilization,
    FrameRate(u32),
    Resolution(Resolution),
    Quit,
}

impl KeyCommand {
    pub fn from_key(code: KeyCode) -> Option<KeyCommand> {
        match code {
            KeyCode::Char(' ') => Some(KeyCommand::Photo),
            KeyCode::Char('b') => Some(KeyCommand::Burst),
            KeyCode::Char('r') => Some(KeyCommand::ToggleRecording),
            KeyCode::Char('f') => Some(KeyCommand::ToggleFacing),
            KeyCode::Char('s') => Some(KeyCommand::ToggleStabilization),
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                FRAME_RATE_PRESETS.get(index).copied().map(KeyCommand::FrameRate)
            }
            KeyCode::Char('h') => Some(KeyCommand::Resolution(Resolution::HD)),
            KeyCode::Char('u') => Some(KeyCommand::Resolution(Resolution::FULL_HD)),
            KeyCode::Char('q') | KeyCode::Esc => Some(KeyCommand::Quit),
            _ => None,
        }
    }
}

pub const KEY_HELP: &str = "space: photo | b: burst | r: record | f: facing | s: stabilization | \
1-4: 10/15/20/30 fps | h/u: 720p/1080p | q: quit";

/// Reads key presses in raw mode and forwards them as commands
pub struct KeyboardInputHandler {
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new() -> Self {
        Self {
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub fn start(&self, commands: mpsc::Sender<KeyCommand>) -> Result<()> {
        info!("Starting keyboard input handler");

        let cancellation_token = self.cancellation_token.clone();

        // crossterm polling blocks, keep it off the runtime threads
        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        let Some(command) = KeyCommand::from_key(key_event.code) else {
                            debug!("Unbound key pressed: {:?}", key_event.code);
                            continue;
                        };

                        if commands.blocking_send(command).is_err() {
                            debug!("Command receiver dropped");
                            break;
                        }
                        if command == KeyCommand::Quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

impl Default for KeyboardInputHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the pipeline from key commands, one command at a time
pub struct InteractiveSession {
    pipeline: CapturePipeline,
    settings: CaptureSettings,
    gate: ResolutionGate,
    event_bus: Arc<EventBus>,
    quality: f32,
    burst_shots: u32,
}

impl InteractiveSession {
    pub fn new(
        pipeline: CapturePipeline,
        settings: CaptureSettings,
        gate: ResolutionGate,
        event_bus: Arc<EventBus>,
        quality: f32,
        burst_shots: u32,
    ) -> Self {
        Self {
            pipeline,
            settings,
            gate,
            event_bus,
            quality,
            burst_shots,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Run one command and describe what happened
    pub async fn handle(&mut self, command: KeyCommand) -> serde_json::Value {
        match command {
            KeyCommand::Photo => self
                .pipeline
                .capture_photo(&self.settings, self.quality)
                .await
                .summary(),
            KeyCommand::Burst => self
                .pipeline
                .capture_burst(&self.settings, self.quality, self.burst_shots)
                .await
                .summary(),
            KeyCommand::ToggleRecording => {
                if self.pipeline.is_recording() {
                    self.pipeline.stop_recording().await.summary()
                } else {
                    self.pipeline.start_recording(&self.settings).await.summary()
                }
            }
            KeyCommand::ToggleFacing => {
                serde_json::json!({ "facing": self.settings.toggle_facing() })
            }
            KeyCommand::ToggleStabilization => {
                serde_json::json!({ "stabilization": self.settings.toggle_stabilization() })
            }
            KeyCommand::FrameRate(fps) => match self.settings.set_frame_rate(fps) {
                Ok(()) => serde_json::json!({ "fps": fps }),
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
            KeyCommand::Resolution(candidate) => {
                serde_json::to_value(self.settings.apply_resolution(candidate, &self.gate))
                    .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
            }
            KeyCommand::Quit => self.shutdown().await,
        }
    }

    /// Finish an active recording so its video is not lost
    async fn shutdown(&mut self) -> serde_json::Value {
        // Also collects a session the device already ended
        let recording = match self.pipeline.stop_recording().await {
            RecordingOutcome::NotRecording => None,
            outcome => Some(outcome.summary()),
        };

        let event = PocketcamEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "User requested via keyboard".to_string(),
        };
        if let Err(e) = self.event_bus.publish(event).await {
            debug!("Shutdown event not delivered: {}", e);
        }

        serde_json::json!({
            "quit": true,
            "recording": recording,
            "stats": self.pipeline.stats(),
        })
    }

    /// Read commands until quit or until the keyboard goes away
    pub async fn run(mut self) -> Result<()> {
        let (sender, mut commands) = mpsc::channel(16);
        let keyboard = KeyboardInputHandler::new();
        keyboard.start(sender)?;

        print_line(KEY_HELP);

        while let Some(command) = commands.recv().await {
            let result = self.handle(command).await;
            print_line(&result.to_string());
            if command == KeyCommand::Quit {
                break;
            }
        }

        keyboard.stop().await
    }
}

// Raw mode does not translate '\n' into a carriage return
fn print_line(line: &str) {
    print!("{}\r\n", line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PocketcamConfig;
    use crate::device::{CameraFacing, SimulatedProvider};
    use crate::gallery::DirectoryGallery;
    use tempfile::TempDir;

    async fn session(temp_dir: &TempDir) -> InteractiveSession {
        let mut config = PocketcamConfig::default();
        config.storage.app_dir = temp_dir.path().join("media").to_string_lossy().into_owned();

        let event_bus = Arc::new(EventBus::new(100));
        let pipeline = CapturePipeline::new(
            &config,
            Arc::new(SimulatedProvider::new(temp_dir.path().join("scratch"))),
            Arc::new(DirectoryGallery::new(temp_dir.path().join("gallery"))),
            Arc::clone(&event_bus),
        );
        pipeline.start().await.unwrap();

        InteractiveSession::new(
            pipeline,
            CaptureSettings::from_config(&config.camera),
            ResolutionGate::new(6.5, 113.0).unwrap(),
            event_bus,
            0.85,
            3,
        )
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(KeyCommand::from_key(KeyCode::Char(' ')), Some(KeyCommand::Photo));
        assert_eq!(KeyCommand::from_key(KeyCode::Char('1')), Some(KeyCommand::FrameRate(10)));
        assert_eq!(KeyCommand::from_key(KeyCode::Char('4')), Some(KeyCommand::FrameRate(30)));
        assert_eq!(
            KeyCommand::from_key(KeyCode::Char('h')),
            Some(KeyCommand::Resolution(Resolution::HD))
        );
        assert_eq!(KeyCommand::from_key(KeyCode::Esc), Some(KeyCommand::Quit));
        assert_eq!(KeyCommand::from_key(KeyCode::Char('5')), None);
        assert_eq!(KeyCommand::from_key(KeyCode::Char('x')), None);
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let handler = KeyboardInputHandler::new();

        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }

    #[tokio::test]
    async fn test_photo_and_burst_commands() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = session(&temp_dir).await;

        let photo = session.handle(KeyCommand::Photo).await;
        assert_eq!(photo["outcome"], "persisted");
        assert_eq!(photo["gallery"]["status"], "exported");

        let burst = session.handle(KeyCommand::Burst).await;
        assert_eq!(burst["persisted"], 3);
        assert_eq!(burst["exported"], 3);
    }

    #[tokio::test]
    async fn test_settings_commands() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = session(&temp_dir).await;

        session.handle(KeyCommand::ToggleFacing).await;
        assert_eq!(session.settings().facing(), CameraFacing::Front);

        session.handle(KeyCommand::FrameRate(15)).await;
        assert_eq!(session.settings().frame_rate(), 15);

        let change = session.handle(KeyCommand::Resolution(Resolution::HD)).await;
        assert_eq!(change["change"], "applied");
        assert_eq!(session.settings().resolution(), Resolution::HD);
    }

    #[tokio::test]
    async fn test_record_toggle_and_quit_finishes_video() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = session(&temp_dir).await;

        let started = session.handle(KeyCommand::ToggleRecording).await;
        assert_eq!(started["recording"], "started");

        let quit = session.handle(KeyCommand::Quit).await;
        assert_eq!(quit["quit"], true);
        assert_eq!(quit["recording"]["recording"], "finished");
        assert_eq!(quit["stats"]["videos_persisted"], 1);
    }
}
