use std::path::PathBuf;
use thiserror::Error;

/// Structural failures: input the board never offers, or a broken config file.
#[derive(Debug, Error)]
pub enum KenoError {
    #[error("number {0} is outside the board (1-80)")]
    NumberOutOfRange(u8),

    #[error("{0} is not one of the allowed stakes")]
    UnknownStake(u32),

    #[error("failed to read config from {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to save config to {}", path.display())]
    ConfigSave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
