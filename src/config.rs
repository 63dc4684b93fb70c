//! Configuration parsing and management for vrmdrop
//!
//! The configuration is a flat record read once at startup. Nothing in it is
//! reconfigured at runtime.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, VrmDropError};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub viewport: ViewportConfig,
    pub perspective: PerspectiveConfig,
    pub camera: CameraConfig,
    pub light: LightConfig,
    /// Model to feed through the drop pipeline at startup
    pub model_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VrmDropError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, VrmDropError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, VrmDropError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), VrmDropError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(invalid(
                "viewport",
                "Width and height must be greater than 0",
            ));
        }

        let p = &self.perspective;
        if !(p.fov > 0.0 && p.fov < 180.0) {
            return Err(invalid(
                "perspective.fov",
                "Field of view must be between 0 and 180 degrees",
            ));
        }
        if p.near <= 0.0 {
            return Err(invalid("perspective.near", "Near plane must be positive"));
        }
        if p.far <= p.near {
            return Err(invalid(
                "perspective.far",
                "Far plane must be beyond the near plane",
            ));
        }

        if !self.camera.distance.is_finite() {
            return Err(invalid("camera.distance", "Distance must be finite"));
        }

        if self.light.direction.iter().all(|c| *c == 0.0) {
            return Err(invalid("light.direction", "Direction must be non-zero"));
        }

        if let Some(ref model) = self.model_path {
            if !model.exists() {
                tracing::warn!("Configured model not found at: {}", model.display());
            }
        }

        Ok(())
    }

    /// Viewport aspect ratio
    pub fn aspect(&self) -> f32 {
        self.viewport.width as f32 / self.viewport.height as f32
    }
}

fn invalid(field: &str, message: &str) -> VrmDropError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Render surface size, fixed at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Perspective projection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveConfig {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self {
            fov: 30.0,
            near: 0.1,
            far: 20.0,
        }
    }
}

/// Camera placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Standoff distance along +Z once an avatar is framed
    pub distance: f32,
    /// Camera position before any avatar has been framed
    pub initial_position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 1.5,
            initial_position: [0.0, 1.0, 5.0],
        }
    }
}

/// Scene lighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Position of the directional light; normalized on use
    pub direction: [f32; 3],
    /// Linear RGB colour of the light
    pub color: [f32; 3],
    /// Clear colour behind the scene
    pub background: [f32; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: [1.0, 1.0, 1.0],
            color: [1.0, 1.0, 1.0],
            background: [0.0, 0.0, 0.0],
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("vrmdrop");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/vrmdrop");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/vrmdrop");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("vrmdrop");
        }
    }

    PathBuf::from(".")
}
