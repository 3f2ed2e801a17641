//! Runtime configuration.
//!
//! Defaults cover the common setup; an optional TOML file at
//! `~/.config/warp_rpc/config.toml` (or `$WARP_PRESENCE_CONFIG`) overrides
//! them, and `$DISCORD_CLIENT_ID` overrides the file.

use fs_err as fs;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PresenceError, Result};
use crate::paths::expand_home;
use crate::types::Button;

pub const CLIENT_ID_ENV: &str = "DISCORD_CLIENT_ID";
pub const CONFIG_PATH_ENV: &str = "WARP_PRESENCE_CONFIG";
pub const DEFAULT_CLIENT_ID: &str = "YOUR_DISCORD_APP_ID";

const DEFAULT_STATUS_PATH: &str = "~/.local/share/discord_rpc/status.json";
const DEFAULT_RULES_PATH: &str = "~/.config/warp_rpc/focus.json";
const DEFAULT_TARGET_MARKER: &str = "/applications/warp.app/";
const DEFAULT_CHAT_CLIENT_MARKER: &str = "discord";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresenceConfig {
    pub client_id: String,
    pub poll_interval_secs: u64,
    pub absent_recheck_secs: u64,
    pub connect_backoff_secs: u64,
    pub status_path: String,
    pub rules_path: String,
    pub target_marker: String,
    pub chat_client_marker: String,
    pub assets: PresenceAssets,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            poll_interval_secs: 5,
            absent_recheck_secs: 3,
            connect_backoff_secs: 5,
            status_path: DEFAULT_STATUS_PATH.to_string(),
            rules_path: DEFAULT_RULES_PATH.to_string(),
            target_marker: DEFAULT_TARGET_MARKER.to_string(),
            chat_client_marker: DEFAULT_CHAT_CLIENT_MARKER.to_string(),
            assets: PresenceAssets::default(),
        }
    }
}

/// Fixed asset keys and buttons for the base presence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresenceAssets {
    pub large_image: String,
    pub large_text: String,
    pub buttons: Vec<Button>,
}

impl Default for PresenceAssets {
    fn default() -> Self {
        Self {
            large_image: "warp".to_string(),
            large_text: "Warp Terminal".to_string(),
            buttons: vec![Button::new("Warp", "https://warp.dev")],
        }
    }
}

impl PresenceConfig {
    pub fn poll_interval(&self) -> Duration {
        secs_at_least_one(self.poll_interval_secs)
    }

    pub fn absent_recheck(&self) -> Duration {
        secs_at_least_one(self.absent_recheck_secs)
    }

    pub fn connect_backoff(&self) -> Duration {
        secs_at_least_one(self.connect_backoff_secs)
    }

    pub fn status_path(&self, home: Option<&str>) -> PathBuf {
        PathBuf::from(expand_home(&self.status_path, home))
    }

    pub fn rules_path(&self, home: Option<&str>) -> PathBuf {
        PathBuf::from(expand_home(&self.rules_path, home))
    }

    pub fn has_placeholder_client_id(&self) -> bool {
        self.client_id.trim().is_empty() || self.client_id == DEFAULT_CLIENT_ID
    }
}

fn secs_at_least_one(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(PresenceError::HomeDirNotFound)?;
    Ok(home.join(".config").join("warp_rpc").join("config.toml"))
}

/// Loads configuration from `path` (or the default location) plus the
/// process environment.
pub fn load_config(path: Option<PathBuf>) -> Result<PresenceConfig> {
    let path = match path.or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from)) {
        Some(path) => path,
        None => default_config_path()?,
    };
    load_config_with_env(&path, |key| env::var(key).ok())
}

pub fn load_config_with_env<F>(path: &Path, lookup: F) -> Result<PresenceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = read_config_file(path)?;
    if let Some(client_id) = lookup(CLIENT_ID_ENV).filter(|value| !value.trim().is_empty()) {
        config.client_id = client_id;
    }
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<PresenceConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(PresenceConfig::default())
        }
        Err(source) => {
            return Err(PresenceError::Io {
                context: format!("reading config {}", path.display()),
                source,
            })
        }
    };

    toml::from_str(&content).map_err(|err| PresenceError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}
