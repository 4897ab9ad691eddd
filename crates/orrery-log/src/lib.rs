//! Logging setup shared by the orrery binary.
//!
//! One `tracing` subscriber takes everything: the app, input and scene
//! crates emit `tracing` events, while render and config use the `log`
//! facade, which `tracing-subscriber` forwards into the same registry.
//! Console output is stamped with uptime. Debug builds also write JSON lines
//! to a file.

use orrery_config::Config;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Caps for the GPU stack, whose info output is per-frame noise.
const GPU_CAPS: &str = "wgpu=warn,naga=warn";

/// Used when there is neither `RUST_LOG` nor a configured level.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

pub const LOG_FILE_NAME: &str = "orrery.log";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.debug.log_level`. The JSON file
/// layer is added only when `debug_build` is set and `log_dir` is writable;
/// otherwise logging continues on the console alone.
///
/// ```no_run
/// let config = orrery_config::Config::default();
/// orrery_log::init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let directive = filter_directive(config);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));
    let console = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::uptime());

    let file = log_dir
        .filter(|_| debug_build)
        .and_then(|dir| open_log_file(dir).map(|f| (log_path(dir), f)));
    let (file_path, file_layer) = match file {
        Some((path, file)) => {
            let layer = fmt::layer()
                .json()
                .with_writer(file)
                .with_ansi(false)
                .with_timer(fmt::time::uptime());
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
    tracing::debug!(%directive, file = ?file_path, "logging ready");
}

/// Create `dir` and truncate the log file in it. `None` when either fails.
fn open_log_file(dir: &Path) -> Option<File> {
    std::fs::create_dir_all(dir).ok()?;
    File::create(log_path(dir)).ok()
}

pub fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}

/// Filter directive for the configured level.
///
/// A bare level such as `debug` gets the GPU caps appended. Anything that
/// already names targets is used as written.
pub fn filter_directive(config: Option<&Config>) -> String {
    let level = config
        .map(|c| c.debug.log_level.trim())
        .filter(|level| !level.is_empty());
    match level {
        None => DEFAULT_FILTER.to_owned(),
        Some(level) if level.contains(['=', ',']) => level.to_owned(),
        Some(level) => format!("{level},{GPU_CAPS}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_level(level: &str) -> Config {
        let mut config = Config::default();
        config.debug.log_level = level.into();
        config
    }

    #[test]
    fn test_default_directive_caps_gpu_crates() {
        assert_eq!(filter_directive(None), DEFAULT_FILTER);
        assert_eq!(filter_directive(Some(&with_level("  "))), DEFAULT_FILTER);
        assert!(DEFAULT_FILTER.ends_with(GPU_CAPS));
    }

    #[test]
    fn test_bare_level_gets_gpu_caps() {
        assert_eq!(
            filter_directive(Some(&with_level("debug"))),
            "debug,wgpu=warn,naga=warn"
        );
    }

    #[test]
    fn test_full_directive_used_verbatim() {
        let config = with_level("warn,orrery_input=trace");
        assert_eq!(filter_directive(Some(&config)), "warn,orrery_input=trace");
        assert_eq!(filter_directive(Some(&with_level("orrery_scene=debug"))), "orrery_scene=debug");
    }

    #[test]
    fn test_directives_parse() {
        for level in ["info", "error", "debug,orrery_render=trace", "trace"] {
            let directive = filter_directive(Some(&with_level(level)));
            assert!(EnvFilter::try_new(&directive).is_ok(), "{directive}");
        }
    }

    #[test]
    fn test_log_file_created_in_nested_dir() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("orrery").join("logs");
        assert!(open_log_file(&dir).is_some());
        assert!(log_path(&dir).is_file());
    }
}
