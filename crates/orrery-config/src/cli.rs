//! Command-line flags. Anything given here wins over `config.ron`.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, MotionTiming};

#[derive(Parser, Debug, Default)]
#[command(
    name = "orrery",
    version,
    about = "Earth, moon and sun with glow and a free-look camera"
)]
pub struct CliArgs {
    /// Initial window width in logical pixels.
    #[arg(long, value_name = "PX")]
    pub width: Option<u32>,

    /// Initial window height in logical pixels.
    #[arg(long, value_name = "PX")]
    pub height: Option<u32>,

    /// Present without waiting for vertical blank.
    #[arg(long)]
    pub no_vsync: bool,

    /// Directory the scene textures are read from.
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Glow intensity added on top of the scene.
    #[arg(long, value_name = "STRENGTH")]
    pub bloom_strength: Option<f32>,

    /// Scale motion by frame time against this refresh rate instead of
    /// advancing a fixed amount every frame.
    #[arg(long, value_name = "FPS")]
    pub reference_fps: Option<f32>,

    /// error, warn, info, debug or trace; `RUST_LOG` still takes precedence.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Directory holding `config.ron`.
    #[arg(long, value_name = "DIR")]
    pub config: Option<PathBuf>,
}

impl Config {
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        fn set<T: Clone>(slot: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }

        set(&mut self.window.width, args.width.as_ref());
        set(&mut self.window.height, args.height.as_ref());
        set(&mut self.assets.texture_dir, args.assets.as_ref());
        set(&mut self.render.bloom_strength, args.bloom_strength.as_ref());
        set(&mut self.debug.log_level, args.log_level.as_ref());
        if args.no_vsync {
            self.window.vsync = false;
        }
        if let Some(reference_fps) = args.reference_fps {
            self.animation.timing = MotionTiming::Elapsed { reference_fps };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_given_flags_replace_loaded_values() {
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs {
            width: Some(1920),
            assets: Some(PathBuf::from("public/texture")),
            bloom_strength: Some(0.5),
            ..Default::default()
        });
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.assets.texture_dir, PathBuf::from("public/texture"));
        assert_eq!(config.render.bloom_strength, 0.5);
        assert_eq!(config.window.height, Config::default().window.height);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_no_flags_leave_config_untouched() {
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_vsync_and_timing_flags() {
        let args = CliArgs::parse_from(["orrery", "--no-vsync", "--reference-fps", "60"]);
        let mut config = Config::default();
        config.apply_cli_overrides(&args);
        assert!(!config.window.vsync);
        assert_eq!(
            config.animation.timing,
            MotionTiming::Elapsed {
                reference_fps: 60.0
            }
        );
    }

    #[test]
    fn test_every_flag_has_help() {
        let command = CliArgs::command();
        for arg in command.get_arguments() {
            assert!(arg.get_help().is_some(), "--{} has no help", arg.get_id());
        }
    }

    #[test]
    fn test_parse_long_flags() {
        let args = CliArgs::parse_from(["orrery", "--width", "800", "--log-level", "debug"]);
        assert_eq!(args.width, Some(800));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.config.is_none());
        assert!(!args.no_vsync);
    }
}
