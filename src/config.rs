use crate::device::CameraFacing;
use crate::settings::FRAME_RATE_PRESETS;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PocketcamConfig {
    pub storage: StorageConfig,
    pub capture: CaptureConfig,
    pub camera: CameraConfig,
    pub display: DisplayConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Application directory persisted captures are moved into
    #[serde(default = "default_app_dir")]
    pub app_dir: String,

    /// Directory standing in for the shared media library
    #[serde(default = "default_gallery_dir")]
    pub gallery_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Photo encode quality in [0, 1]
    #[serde(default = "default_photo_quality")]
    pub photo_quality: f32,

    /// Ask the device not to embed metadata (location, device info) in photos
    #[serde(default = "default_skip_metadata")]
    pub skip_metadata: bool,

    /// Number of shots taken by one burst trigger
    #[serde(default = "default_burst_shots")]
    pub burst_shots: u32,
}

/// Launch defaults for the user-facing capture settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    #[serde(default = "default_camera_facing")]
    pub facing: CameraFacing,

    /// Frames per second, one of the frame rate presets
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    #[serde(default = "default_stabilization")]
    pub stabilization: bool,
}

/// Physical display the resolution gate evaluates against
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DisplayConfig {
    /// Native display resolution (width, height)
    #[serde(default = "default_display_resolution")]
    pub resolution: (u32, u32),

    /// Native display pixel density in pixels per inch
    #[serde(default = "default_display_density")]
    pub density_ppi: f64,

    /// Lowest acceptable capture density on this display
    #[serde(default = "default_min_density")]
    pub min_density: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl PocketcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("pocketcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("storage.app_dir", default_app_dir())?
            .set_default("storage.gallery_dir", default_gallery_dir())?
            .set_default("capture.photo_quality", default_photo_quality() as f64)?
            .set_default("capture.skip_metadata", default_skip_metadata())?
            .set_default("capture.burst_shots", default_burst_shots())?
            .set_default("camera.facing", default_camera_facing().as_str())?
            .set_default("camera.fps", default_camera_fps())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.stabilization", default_stabilization())?
            .set_default(
                "display.resolution",
                vec![
                    default_display_resolution().0,
                    default_display_resolution().1,
                ],
            )?
            .set_default("display.density_ppi", default_display_density())?
            .set_default("display.min_density", default_min_density())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // POCKETCAM_STORAGE__APP_DIR, POCKETCAM_CAMERA__FPS, ...
            .add_source(
                Environment::with_prefix("POCKETCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: PocketcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.app_dir.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage app_dir must not be empty".to_string(),
            ));
        }

        if self.storage.gallery_dir.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage gallery_dir must not be empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.capture.photo_quality) {
            return Err(ConfigError::Message(format!(
                "Capture photo_quality must be within [0, 1], got {}",
                self.capture.photo_quality
            )));
        }

        if self.capture.burst_shots == 0 {
            return Err(ConfigError::Message(
                "Capture burst_shots must be greater than 0".to_string(),
            ));
        }

        if !FRAME_RATE_PRESETS.contains(&self.camera.fps) {
            return Err(ConfigError::Message(format!(
                "Camera fps must be one of {:?}, got {}",
                FRAME_RATE_PRESETS, self.camera.fps
            )));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.display.resolution.0 == 0 || self.display.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Display resolution must be greater than 0".to_string(),
            ));
        }

        if !(self.display.density_ppi > 0.0) {
            return Err(ConfigError::Message(
                "Display density_ppi must be greater than 0".to_string(),
            ));
        }

        if !(self.display.min_density > 0.0) {
            return Err(ConfigError::Message(
                "Display min_density must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PocketcamConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                app_dir: default_app_dir(),
                gallery_dir: default_gallery_dir(),
            },
            capture: CaptureConfig {
                photo_quality: default_photo_quality(),
                skip_metadata: default_skip_metadata(),
                burst_shots: default_burst_shots(),
            },
            camera: CameraConfig {
                facing: default_camera_facing(),
                fps: default_camera_fps(),
                resolution: default_camera_resolution(),
                stabilization: default_stabilization(),
            },
            display: DisplayConfig {
                resolution: default_display_resolution(),
                density_ppi: default_display_density(),
                min_density: default_min_density(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_app_dir() -> String {
    "./pocketcam/media".to_string()
}
fn default_gallery_dir() -> String {
    "./pocketcam/gallery".to_string()
}

fn default_photo_quality() -> f32 {
    0.85
}
fn default_skip_metadata() -> bool {
    true
}
fn default_burst_shots() -> u32 {
    5
}

fn default_camera_facing() -> CameraFacing {
    CameraFacing::Back
}
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_resolution() -> (u32, u32) {
    (1920, 1080)
}
fn default_stabilization() -> bool {
    false
}

fn default_display_resolution() -> (u32, u32) {
    (1080, 2400)
}
fn default_display_density() -> f64 {
    400.0
}
fn default_min_density() -> f64 {
    crate::gate::DEFAULT_MIN_DENSITY
}

fn default_event_bus_capacity() -> usize {
    100
}
