//! User-facing capture settings.
//!
//! Settings start from the configured launch defaults and are never written
//! back; every launch begins from the same state.

use crate::config::CameraConfig;
use crate::device::{CameraFacing, Resolution};
use crate::error::{PocketcamError, Result};
use crate::gate::{GateVerdict, ResolutionGate};
use serde::Serialize;
use tracing::{info, warn};

pub const FRAME_RATE_PRESETS: [u32; 4] = [10, 15, 20, 30];
pub const RESOLUTION_PRESETS: [Resolution; 2] = [Resolution::HD, Resolution::FULL_HD];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureSettings {
    facing: CameraFacing,
    frame_rate: u32,
    resolution: Resolution,
    stabilization_enabled: bool,
}

/// Result of asking for a new capture resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ResolutionChange {
    Applied {
        resolution: Resolution,
        density: f64,
    },
    Unchanged {
        resolution: Resolution,
    },
    /// The previous resolution is kept; `warning` is meant for the user
    Rejected {
        kept: Resolution,
        candidate: Resolution,
        warning: String,
    },
}

impl CaptureSettings {
    pub fn from_config(camera: &CameraConfig) -> Self {
        Self {
            facing: camera.facing,
            frame_rate: camera.fps,
            resolution: camera.resolution.into(),
            stabilization_enabled: camera.stabilization,
        }
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn stabilization_enabled(&self) -> bool {
        self.stabilization_enabled
    }

    pub fn toggle_facing(&mut self) -> CameraFacing {
        self.facing = self.facing.toggled();
        info!("Camera facing switched to {}", self.facing);
        self.facing
    }

    pub fn toggle_stabilization(&mut self) -> bool {
        self.stabilization_enabled = !self.stabilization_enabled;
        info!(
            "Video stabilization {}",
            if self.stabilization_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        self.stabilization_enabled
    }

    pub fn set_frame_rate(&mut self, fps: u32) -> Result<()> {
        if !FRAME_RATE_PRESETS.contains(&fps) {
            return Err(PocketcamError::invalid_request(format!(
                "frame rate {} is not one of {:?}",
                fps, FRAME_RATE_PRESETS
            )));
        }
        self.frame_rate = fps;
        info!("Selected FPS: {}", fps);
        Ok(())
    }

    /// Switch resolution if the gate accepts it, otherwise keep the current one
    pub fn apply_resolution(
        &mut self,
        candidate: Resolution,
        gate: &ResolutionGate,
    ) -> ResolutionChange {
        if candidate == self.resolution {
            return ResolutionChange::Unchanged {
                resolution: candidate,
            };
        }

        match gate.evaluate(candidate) {
            Ok(GateVerdict::Accepted { density }) => {
                self.resolution = candidate;
                info!("Resolution set to {} ({:.1} ppi)", candidate, density);
                ResolutionChange::Applied {
                    resolution: candidate,
                    density,
                }
            }
            Ok(GateVerdict::Rejected {
                density,
                min_density,
            }) => ResolutionChange::Rejected {
                kept: self.resolution,
                candidate,
                warning: format!(
                    "{} would only give {:.0} ppi on this display (minimum {:.0} ppi); keeping {}",
                    candidate, density, min_density, self.resolution
                ),
            },
            Err(e) => {
                warn!("Could not evaluate resolution {}: {}", candidate, e);
                ResolutionChange::Rejected {
                    kept: self.resolution,
                    candidate,
                    warning: format!("Could not check {}: {}; keeping {}", candidate, e, self.resolution),
                }
            }
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from_config(&crate::config::PocketcamConfig::default().camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        let settings = CaptureSettings::default();
        assert_eq!(settings.facing(), CameraFacing::Back);
        assert_eq!(settings.frame_rate(), 30);
        assert_eq!(settings.resolution(), Resolution::FULL_HD);
        assert!(!settings.stabilization_enabled());
    }

    #[test]
    fn test_toggles() {
        let mut settings = CaptureSettings::default();
        assert_eq!(settings.toggle_facing(), CameraFacing::Front);
        assert_eq!(settings.toggle_facing(), CameraFacing::Back);
        assert!(settings.toggle_stabilization());
        assert!(!settings.toggle_stabilization());
    }

    #[test]
    fn test_frame_rate_presets_only() {
        let mut settings = CaptureSettings::default();
        for fps in FRAME_RATE_PRESETS {
            settings.set_frame_rate(fps).unwrap();
            assert_eq!(settings.frame_rate(), fps);
        }

        assert!(settings.set_frame_rate(24).is_err());
        assert_eq!(settings.frame_rate(), 30);
    }

    #[test]
    fn test_accepted_resolution_is_applied() {
        let mut settings = CaptureSettings::default();
        let gate = ResolutionGate::new(6.5, 113.0).unwrap();

        let change = settings.apply_resolution(Resolution::HD, &gate);
        assert!(matches!(change, ResolutionChange::Applied { .. }));
        assert_eq!(settings.resolution(), Resolution::HD);

        let change = settings.apply_resolution(Resolution::HD, &gate);
        assert!(matches!(change, ResolutionChange::Unchanged { .. }));
    }

    #[test]
    fn test_rejected_resolution_keeps_previous() {
        let mut settings = CaptureSettings::default();
        let gate = ResolutionGate::new(20.0, 113.0).unwrap();

        match settings.apply_resolution(Resolution::HD, &gate) {
            ResolutionChange::Rejected {
                kept,
                candidate,
                warning,
            } => {
                assert_eq!(kept, Resolution::FULL_HD);
                assert_eq!(candidate, Resolution::HD);
                assert!(warning.contains("1280x720"));
            }
            other => panic!("Unexpected change: {:?}", other),
        }
        assert_eq!(settings.resolution(), Resolution::FULL_HD);
    }
}
