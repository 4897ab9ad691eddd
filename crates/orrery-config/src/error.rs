//! Configuration error types.

use std::path::PathBuf;

/// Loading or saving `config.ron` failed. Every variant names the file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid RON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("config could not be serialized: {0}")]
    Serialize(#[source] ron::Error),

    /// The OS did not expose a configuration directory.
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
}
