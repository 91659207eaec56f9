//! Herald configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HeraldError, Result};

/// Root configuration, loaded from `~/.herald/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeraldConfig {
    /// Telegram bot token. `HERALD_BOT_TOKEN` overrides the file value.
    #[serde(default)]
    pub bot_token: String,
    /// Static operator allow-list. Only these user ids may compose broadcasts.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Minimum delay between consecutive sends within one broadcast.
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
    /// Pause between long-poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_database_path() -> String {
    "~/.herald/newsletter.db".into()
}
fn default_send_delay_ms() -> u64 {
    50
}
fn default_poll_interval() -> u64 {
    1
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_ids: Vec::new(),
            database_path: default_database_path(),
            send_delay_ms: default_send_delay_ms(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl HeraldConfig {
    /// Load config from the default path, falling back to defaults if the
    /// file does not exist. Environment overrides are applied either way.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HeraldError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| HeraldError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| HeraldError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("HERALD_BOT_TOKEN")
            && !token.is_empty()
        {
            self.bot_token = token;
        }
        if let Ok(ids) = std::env::var("HERALD_ADMIN_IDS")
            && !ids.is_empty()
        {
            self.admin_ids = ids
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
        }
    }

    /// Expanded database path (`~` resolved against the home directory).
    pub fn database_path(&self) -> PathBuf {
        match self.database_path.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(rest),
            None => PathBuf::from(&self.database_path),
        }
    }

    /// Check the static operator allow-list.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Herald home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".herald")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HeraldConfig::default();
        assert_eq!(config.send_delay_ms, 50);
        assert_eq!(config.poll_interval_secs, 1);
        assert!(config.admin_ids.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: HeraldConfig =
            toml::from_str("bot_token = \"123:abc\"\nadmin_ids = [1, 2]\n").unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert!(config.is_admin(1));
        assert!(config.is_admin(2));
        assert!(!config.is_admin(3));
        assert_eq!(config.database_path, default_database_path());
    }
}
