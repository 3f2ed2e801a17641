//! Shared value types: the presence payload, buttons, and identity keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use warp_presence_protocol::{Activity, ActivityButton, Assets, Timestamps};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub url: String,
}

impl Button {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Everything Discord is asked to show for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresencePayload {
    pub details: String,
    pub state: String,
    pub large_image_key: String,
    pub large_text: String,
    pub small_image_key: Option<String>,
    pub small_text: Option<String>,
    pub start_epoch_seconds: i64,
    pub buttons: Vec<Button>,
}

impl PresencePayload {
    pub fn to_activity(&self) -> Activity {
        Activity {
            details: non_empty(&self.details),
            state: non_empty(&self.state),
            timestamps: Some(Timestamps {
                start: Some(self.start_epoch_seconds),
            }),
            assets: Some(Assets {
                large_image: non_empty(&self.large_image_key),
                large_text: non_empty(&self.large_text),
                small_image: self.small_image_key.clone(),
                small_text: self.small_text.clone(),
            }),
            buttons: self
                .buttons
                .iter()
                .map(|button| ActivityButton {
                    label: button.label.clone(),
                    url: button.url.clone(),
                })
                .collect(),
        }
        .clamped()
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// What is currently on display, reduced to a comparable string.
///
/// Only used to decide whether the elapsed timer restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn focus(rule_name: &str, cwd: &str, branch: &str) -> Self {
        Self(format!("FOCUS:{}|{}|{}", rule_name, cwd, branch))
    }

    pub fn normal(cwd: &str, branch: &str) -> Self {
        Self(format!("NORMAL|{}|{}", cwd, branch))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> PresencePayload {
        PresencePayload {
            details: "command line".to_string(),
            state: "Using ZSH • On Warp".to_string(),
            large_image_key: "warp".to_string(),
            large_text: "Warp Terminal".to_string(),
            small_image_key: None,
            small_text: None,
            start_epoch_seconds: 1_700_000_000,
            buttons: vec![Button::new("Warp", "https://warp.dev")],
        }
    }

    #[test]
    fn identity_keys_encode_mode_and_context() {
        assert_eq!(
            IdentityKey::focus("work", "/w", "main").as_str(),
            "FOCUS:work|/w|main"
        );
        assert_eq!(IdentityKey::normal("/w", "").as_str(), "NORMAL|/w|");
    }

    #[test]
    fn to_activity_maps_all_fields() {
        let mut payload = payload();
        payload.small_image_key = Some("zsh".to_string());
        payload.small_text = Some("ZSH".to_string());

        let activity = payload.to_activity();
        let assets = activity.assets.expect("assets");

        assert_eq!(activity.details.as_deref(), Some("command line"));
        assert_eq!(activity.state.as_deref(), Some("Using ZSH • On Warp"));
        assert_eq!(activity.timestamps.and_then(|t| t.start), Some(1_700_000_000));
        assert_eq!(assets.large_image.as_deref(), Some("warp"));
        assert_eq!(assets.small_image.as_deref(), Some("zsh"));
        assert_eq!(activity.buttons.len(), 1);
        assert_eq!(activity.buttons[0].url, "https://warp.dev");
    }

    #[test]
    fn to_activity_drops_empty_text() {
        let mut payload = payload();
        payload.state = String::new();
        assert!(payload.to_activity().state.is_none());
    }
}
