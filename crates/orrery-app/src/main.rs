//! Orrery binary: load config, apply CLI overrides, start logging, open the
//! window.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use orrery_config::{CliArgs, Config, default_config_dir};
use tracing::{error, info};

fn log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("orrery").join("logs"))
}

fn load_config(args: &CliArgs) -> Config {
    let dir = match args.config.clone().map(Ok).unwrap_or_else(default_config_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{e}; using default config");
            return Config::default();
        }
    };
    Config::load_or_create(&dir).unwrap_or_else(|e| {
        eprintln!("{e}; using default config");
        Config::default()
    })
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let mut config = load_config(&args);
    config.apply_cli_overrides(&args);

    orrery_log::init_logging(
        log_dir().as_deref(),
        cfg!(debug_assertions),
        Some(&config),
    );
    info!(
        width = config.window.width,
        height = config.window.height,
        assets = %config.assets.texture_dir.display(),
        "starting orrery"
    );

    match orrery_app::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("orrery exited with error: {e}");
            ExitCode::FAILURE
        }
    }
}
