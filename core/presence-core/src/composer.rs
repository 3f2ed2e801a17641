//! Builds the presence payload for one tick.
//!
//! Composition is an ordered series of override steps on a typed payload:
//! base → shell small image → focus-rule overrides. The elapsed-timer
//! decision is made here too, since it depends on the same inputs.
//!
//! ## Timer invariant
//!
//! Two consecutive compositions with the same [`IdentityKey`] always carry the
//! same start time. Outside focus rules, any identity change moves the start
//! to `now`. Inside a rule the start moves only when the rule sets
//! `reset_timer_on_enter`; otherwise the previous start and the previously
//! committed identity are both held ([`TimerReset::Held`]).

use crate::config::PresenceAssets;
use crate::paths::shorten_path;
use crate::rules::FocusRule;
use crate::status::SessionStatus;
use crate::template::{render, TemplateFields};
use crate::types::{IdentityKey, PresencePayload};

pub const BASE_DETAILS: &str = "command line";
pub const TARGET_APP_LABEL: &str = "On Warp";
pub const STATE_SEPARATOR: &str = " • ";

/// Shells with a matching small image uploaded to the Discord application.
const KNOWN_SHELL_ICONS: &[&str] = &["zsh", "bash", "fish"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error("unknown template field {{{field}}} in {template:?}")]
    UnknownTemplateField { field: String, template: String },

    #[error("malformed template {template:?}: {reason}")]
    MalformedTemplate {
        template: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerReset {
    /// Identity unchanged; the previous start carries over.
    Kept,
    /// Identity changed (including the very first composition).
    IdentityChanged,
    /// Identity changed into a rule flagged `reset_timer_on_enter`.
    RuleEntered,
    /// Identity changed into an unflagged rule: start and stored identity
    /// stay as they were.
    Held,
}

impl TimerReset {
    /// Whether the composed identity replaces the stored one.
    pub fn commits_identity(self) -> bool {
        !matches!(self, TimerReset::Held)
    }
}

#[derive(Debug, Clone)]
pub struct ComposeInput<'a> {
    pub session: &'a SessionStatus,
    pub shell: &'a str,
    pub rule: Option<&'a FocusRule>,
    pub previous_identity: Option<&'a IdentityKey>,
    pub previous_start: i64,
    pub now: i64,
    pub assets: &'a PresenceAssets,
    pub home: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub payload: PresencePayload,
    pub identity: IdentityKey,
    pub start_epoch_seconds: i64,
    pub timer: TimerReset,
}

pub fn compose(input: &ComposeInput<'_>) -> Result<Composition, ComposeError> {
    let cwd = input.session.cwd.as_str();
    let branch = input.session.branch.as_str();
    let shell_upper = input.shell.to_uppercase();
    let cwd_short = if cwd.is_empty() {
        String::new()
    } else {
        shorten_path(cwd, input.home)
    };

    let mut payload = base_payload(&shell_upper, &cwd_short, branch, input.assets);
    apply_shell_icon(&mut payload, input.shell, &shell_upper);

    if let Some(rule) = input.rule {
        let fields = TemplateFields {
            cwd: cwd.to_string(),
            cwd_short,
            branch: branch.to_string(),
            shell: shell_upper.clone(),
        };
        apply_rule(&mut payload, rule, &fields)?;
    }

    let identity = match input.rule {
        Some(rule) => IdentityKey::focus(&rule.name, cwd, branch),
        None => IdentityKey::normal(cwd, branch),
    };
    let timer = decide_timer(input.previous_identity, &identity, input.rule);
    let start_epoch_seconds = match timer {
        TimerReset::Kept | TimerReset::Held => input.previous_start,
        TimerReset::IdentityChanged | TimerReset::RuleEntered => input.now,
    };
    payload.start_epoch_seconds = start_epoch_seconds;

    Ok(Composition {
        payload,
        identity,
        start_epoch_seconds,
        timer,
    })
}

fn base_payload(
    shell_upper: &str,
    cwd_short: &str,
    branch: &str,
    assets: &PresenceAssets,
) -> PresencePayload {
    let mut parts = vec![format!("Using {}", shell_upper), TARGET_APP_LABEL.to_string()];
    if !cwd_short.is_empty() {
        parts.push(cwd_short.to_string());
    }
    if !branch.is_empty() {
        parts.push(format!("git:{}", branch));
    }

    PresencePayload {
        details: BASE_DETAILS.to_string(),
        state: parts.join(STATE_SEPARATOR),
        large_image_key: assets.large_image.clone(),
        large_text: assets.large_text.clone(),
        small_image_key: None,
        small_text: None,
        start_epoch_seconds: 0,
        buttons: assets.buttons.clone(),
    }
}

fn apply_shell_icon(payload: &mut PresencePayload, shell: &str, shell_upper: &str) {
    let shell = shell.to_lowercase();
    if let Some(icon) = KNOWN_SHELL_ICONS.iter().find(|icon| **icon == shell) {
        payload.small_image_key = Some(icon.to_string());
        payload.small_text = Some(shell_upper.to_string());
    }
}

fn apply_rule(
    payload: &mut PresencePayload,
    rule: &FocusRule,
    fields: &TemplateFields,
) -> Result<(), ComposeError> {
    if let Some(template) = rule.details_template() {
        payload.details = render(template, fields)?;
    }
    if let Some(template) = rule.state_template() {
        payload.state = render(template, fields)?;
    }
    if let Some(key) = rule.large_image_key() {
        payload.large_image_key = key.to_string();
    }
    if let Some(key) = rule.small_image_key() {
        payload.small_image_key = Some(key.to_string());
        let small_text = rule.small_text().unwrap_or(fields.shell.as_str());
        payload.small_text = Some(small_text.to_string());
    }
    if let Some(buttons) = rule.buttons() {
        payload.buttons = buttons.to_vec();
    }
    Ok(())
}

fn decide_timer(
    previous: Option<&IdentityKey>,
    current: &IdentityKey,
    rule: Option<&FocusRule>,
) -> TimerReset {
    if previous == Some(current) {
        return TimerReset::Kept;
    }
    match rule {
        Some(rule) if rule.reset_timer_on_enter => TimerReset::RuleEntered,
        // Nothing to hold before the first composition.
        Some(_) if previous.is_some() => TimerReset::Held,
        _ => TimerReset::IdentityChanged,
    }
}
