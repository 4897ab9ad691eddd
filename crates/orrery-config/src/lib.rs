//! Orrery settings: typed sections persisted as `config.ron`, with command
//! line overrides on top. Unknown or missing fields fall back to defaults so
//! old files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AnimationConfig, AssetConfig, Config, DebugConfig, InputConfig, MotionTiming, RenderConfig,
    WindowConfig, default_config_dir,
};
pub use error::ConfigError;
