use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::error::KenoError;
use crate::keno::{BetAmount, BoardSettings};

pub const CONFIG_FILE: &str = "keno_config.json";

/// Persisted bot settings. Boards themselves are never written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KenoConfig {
    pub require_bet_before_selection: bool,
    /// Stake a fresh board starts with; `None` leaves it unset.
    pub opening_bet: Option<u32>,
    /// Boards untouched for this long are dropped on the next command.
    pub board_idle_minutes: u64,
}

impl Default for KenoConfig {
    fn default() -> Self {
        Self {
            require_bet_before_selection: true,
            opening_bet: None,
            board_idle_minutes: 30,
        }
    }
}

impl KenoConfig {
    /// `KENO_CONFIG` if set, otherwise `keno_config.json` in the working directory.
    pub fn path_from_env() -> PathBuf {
        std::env::var("KENO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(KenoConfig::default());
        }
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| KenoError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        let config: KenoConfig =
            serde_json::from_str(&content).map_err(|source| KenoError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.board_settings()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .map_err(|source| KenoError::ConfigSave {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.board_idle_minutes.saturating_mul(60))
    }

    pub fn board_settings(&self) -> Result<BoardSettings, KenoError> {
        let opening_bet = self.opening_bet.map(BetAmount::try_from).transpose()?;
        Ok(BoardSettings {
            require_bet_before_selection: self.require_bet_before_selection,
            opening_bet,
        })
    }
}
