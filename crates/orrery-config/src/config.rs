//! Settings sections, their defaults, and the `config.ron` round trip.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const APP_NAME: &str = "orrery";

/// Resolve the platform configuration directory for Orrery
/// (`$XDG_CONFIG_HOME/orrery` on Linux, `%APPDATA%\orrery` on Windows, ...).
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|base| base.join(APP_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Window settings.
    pub window: WindowConfig,
    /// Camera projection, bloom and shadow settings.
    pub render: RenderConfig,
    /// Mouse-look and keyboard settings.
    pub input: InputConfig,
    /// Autonomous per-frame motion of the scene.
    pub animation: AnimationConfig,
    /// Texture locations.
    pub assets: AssetConfig,
    /// Log level and frame statistics.
    pub debug: DebugConfig,
}

/// Initial window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Logical pixels.
    pub width: u32,
    /// Logical pixels.
    pub height: u32,
    /// Present with `Fifo`; off picks the lowest-latency mode available.
    pub vsync: bool,
    /// Window title.
    pub title: String,
}

/// Projection, bloom and shadow settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Near clip plane distance.
    pub near: f32,
    /// Far clip plane distance.
    pub far: f32,
    /// Glow intensity added on top of the bright pass.
    pub bloom_strength: f32,
    /// Blur spread. 0 keeps the glow tight around the emitter.
    pub bloom_radius: f32,
    /// Luminance above which a pixel contributes to glow.
    pub bloom_threshold: f32,
    /// Number of blur mip levels.
    pub bloom_levels: u32,
    /// Point-light shadow map resolution (square).
    pub shadow_map_size: u32,
    /// Screen clear colour (linear RGBA).
    pub clear_color: [f64; 4],
}

/// Mouse-look and keyboard step sizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Radians of rig rotation per pixel of pointer motion.
    pub mouse_sensitivity: f32,
    /// Distance the rig moves per movement key press.
    pub move_step: f32,
    /// Radians the rig yaws per turn key press.
    pub turn_step: f32,
    /// Rebinds, keyed by action name, valued by key label.
    pub keybindings: HashMap<String, String>,
}

/// How autonomous rotation deltas relate to wall-clock time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum MotionTiming {
    /// Apply each delta once per rendered frame. Speed depends on the refresh rate.
    #[default]
    PerFrame,
    /// Scale each delta by `elapsed_seconds * reference_fps`.
    Elapsed { reference_fps: f32 },
}

/// Autonomous motion applied by the frame scheduler (radians per frame).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnimationConfig {
    /// Cloud layer spin around Y.
    pub cloud_spin: f32,
    /// Moon pivot spin around Y.
    pub moon_orbit: f32,
    /// Fixed tilt of the moon's orbital plane around X.
    pub moon_tilt: f32,
    /// Slow drift of the camera rig around the earth.
    pub rig_drift: f32,
    /// Galaxy backdrop spin around Y.
    pub galaxy_spin: f32,
    /// Per-frame or elapsed-time scaling.
    pub timing: MotionTiming,
}

/// Texture locations, relative to `texture_dir`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding all textures.
    pub texture_dir: PathBuf,
    pub galaxy: String,
    pub earth_map: String,
    pub earth_bump: String,
    pub clouds: String,
    pub moon_map: String,
    pub moon_bump: String,
}

/// Diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// A level such as `debug`, or a full filter directive.
    pub log_level: String,
    /// Log frame statistics every N frames (0 = never).
    pub frame_stats_interval: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            vsync: true,
            title: "Orrery".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 1000.0,
            bloom_strength: 2.0,
            bloom_radius: 0.0,
            bloom_threshold: 0.0,
            bloom_levels: 5,
            shadow_map_size: 2048,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 0.01,
            move_step: 0.1,
            turn_step: 0.1,
            keybindings: HashMap::new(),
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            cloud_spin: -0.0002,
            moon_orbit: -0.005,
            moon_tilt: 0.5,
            rig_drift: 0.001,
            galaxy_spin: 0.0002,
            timing: MotionTiming::PerFrame,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            texture_dir: PathBuf::from("texture"),
            galaxy: "galaxy1.png".to_string(),
            earth_map: "earthmap1.jpg".to_string(),
            earth_bump: "bump.jpg".to_string(),
            clouds: "earthCloud.png".to_string(),
            moon_map: "moonmap4k.jpg".to_string(),
            moon_bump: "moonbump4k.jpg".to_string(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frame_stats_interval: 0,
        }
    }
}

const CONFIG_FILE: &str = "config.ron";

impl Config {
    /// Read `config.ron` from `config_dir`. When there is none, write the
    /// defaults there and return them.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            let config = Self::default();
            config.save(config_dir)?;
            log::info!("Wrote default config to {}", path.display());
            return Ok(config);
        }
        let config = read_config(&path)?;
        log::info!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// Write `config.ron` into `config_dir`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let write_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| ConfigError::Write { path, source }
        };
        std::fs::create_dir_all(config_dir).map_err(write_error(config_dir))?;

        let style = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let text = ron::ser::to_string_pretty(self, style).map_err(ConfigError::Serialize)?;

        let path = config_dir.join(CONFIG_FILE);
        std::fs::write(&path, text).map_err(write_error(path.as_path()))
    }

    /// Re-read the file. `Some` only when it now differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_config(&config_dir.join(CONFIG_FILE))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("Config changed on disk");
        Ok(Some(fresh))
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
