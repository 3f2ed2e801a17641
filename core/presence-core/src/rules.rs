//! Focus rules: user overrides keyed on the working directory.
//!
//! Rules live in a JSON file (`{"rules": [...]}`) that is re-read every tick,
//! so edits apply without restarting the daemon. Matching is first-match in
//! file order; there is no scoring.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{PresenceError, Result};
use crate::glob::compile_glob;
use crate::paths::expand_home;
use crate::status::null_as_default;
use crate::types::Button;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusRule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, rename = "match", deserialize_with = "null_as_default")]
    pub match_patterns: Vec<String>,
    #[serde(default, rename = "details", skip_serializing_if = "Option::is_none")]
    pub details_template: Option<String>,
    #[serde(default, rename = "state", skip_serializing_if = "Option::is_none")]
    pub state_template: Option<String>,
    #[serde(default, rename = "large_image", skip_serializing_if = "Option::is_none")]
    pub large_image_key: Option<String>,
    #[serde(default, rename = "small_image", skip_serializing_if = "Option::is_none")]
    pub small_image_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub buttons: Vec<Button>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reset_timer_on_enter: bool,
}

impl FocusRule {
    pub fn details_template(&self) -> Option<&str> {
        present(&self.details_template)
    }

    pub fn state_template(&self) -> Option<&str> {
        present(&self.state_template)
    }

    pub fn large_image_key(&self) -> Option<&str> {
        present(&self.large_image_key)
    }

    pub fn small_image_key(&self) -> Option<&str> {
        present(&self.small_image_key)
    }

    /// Unlike the other overrides, an explicit empty `small_text` is honored.
    pub fn small_text(&self) -> Option<&str> {
        self.small_text.as_deref()
    }

    pub fn buttons(&self) -> Option<&[Button]> {
        (!self.buttons.is_empty()).then_some(self.buttons.as_slice())
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

pub type RuleSet = Vec<FocusRule>;

#[derive(Debug, Clone)]
pub struct RuleFile {
    path: PathBuf,
}

impl RuleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the current rules. A missing file is an empty set; an unreadable
    /// or malformed one is too, with a warning.
    pub fn load(&self) -> RuleSet {
        match load_rules_file(&self.path) {
            Ok(rules) => rules,
            Err(err) if err.is_not_found() => RuleSet::new(),
            Err(err) => {
                warn!(error = %err, "Focus rules unusable; continuing without rules");
                RuleSet::new()
            }
        }
    }
}

pub fn load_rules_file(path: &Path) -> Result<RuleSet> {
    let content = fs::read_to_string(path).map_err(|source| PresenceError::Io {
        context: format!("reading focus rules {}", path.display()),
        source,
    })?;
    parse_rules(&content).map_err(|source| PresenceError::Json {
        context: format!("parsing focus rules {}", path.display()),
        source,
    })
}

/// Parses a rule document. Individual rules that don't fit the schema are
/// skipped so one typo doesn't disable the rest.
pub fn parse_rules(content: &str) -> std::result::Result<RuleSet, serde_json::Error> {
    #[derive(Deserialize)]
    struct RuleDocument {
        #[serde(default, deserialize_with = "null_as_default")]
        rules: Vec<Value>,
    }

    let document: RuleDocument = serde_json::from_str(content)?;
    let rules = document
        .rules
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| match serde_json::from_value::<FocusRule>(raw) {
            Ok(rule) => Some(rule),
            Err(err) => {
                warn!(index, error = %err, "Skipping malformed focus rule");
                None
            }
        })
        .collect();
    Ok(rules)
}

/// Returns the first rule with any pattern matching `cwd`.
///
/// Both `cwd` and the patterns have `~` expanded against `home` first.
pub fn match_rule<'a>(
    cwd: &str,
    rules: &'a [FocusRule],
    home: Option<&str>,
) -> Option<&'a FocusRule> {
    if cwd.is_empty() {
        return None;
    }
    let expanded_cwd = expand_home(cwd, home);

    rules.iter().find(|rule| {
        rule.match_patterns.iter().any(|pattern| {
            let expanded = expand_home(pattern, home);
            match compile_glob(&expanded) {
                Ok(re) => re.is_match(&expanded_cwd),
                Err(err) => {
                    warn!(
                        rule = %rule.name,
                        pattern = %pattern,
                        error = %err,
                        "Ignoring invalid focus pattern"
                    );
                    false
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: Option<&str> = Some("/home/u");

    fn rule(name: &str, patterns: &[&str]) -> FocusRule {
        FocusRule {
            name: name.to_string(),
            match_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            ..FocusRule::default()
        }
    }

    fn work_and_personal() -> RuleSet {
        vec![
            rule("work", &["~/work/*"]),
            rule("personal", &["~/personal/*"]),
        ]
    }

    #[test]
    fn matches_home_relative_cwd() {
        let rules = work_and_personal();
        let matched = match_rule("~/work/proj", &rules, HOME).expect("match");
        assert_eq!(matched.name, "work");
    }

    #[test]
    fn matches_absolute_cwd_against_tilde_pattern() {
        let rules = work_and_personal();
        let matched = match_rule("/home/u/personal/blog", &rules, HOME).expect("match");
        assert_eq!(matched.name, "personal");
    }

    #[test]
    fn returns_none_without_match() {
        let rules = work_and_personal();
        assert!(match_rule("~/other", &rules, HOME).is_none());
    }

    #[test]
    fn returns_none_for_empty_cwd() {
        let rules = vec![rule("everything", &["*"])];
        assert!(match_rule("", &rules, HOME).is_none());
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = vec![
            rule("broad", &["/home/u/*"]),
            rule("narrow", &["/home/u/work/*"]),
        ];
        let matched = match_rule("/home/u/work/proj", &rules, HOME).expect("match");
        assert_eq!(matched.name, "broad");
    }

    #[test]
    fn any_pattern_in_a_rule_can_match() {
        let rules = vec![rule("multi", &["/srv/*", "~/code/*"])];
        assert!(match_rule("/home/u/code/x", &rules, HOME).is_some());
    }

    #[test]
    fn parses_rule_file_schema() {
        let rules = parse_rules(
            r#"{
              "rules": [
                {
                  "name": "work",
                  "match": ["~/work/*"],
                  "details": "{shell} in {cwd_short}",
                  "state": "",
                  "large_image": "briefcase",
                  "small_image": "zsh",
                  "buttons": [{"label": "Repo", "url": "https://example.com"}],
                  "reset_timer_on_enter": true
                }
              ]
            }"#,
        )
        .expect("rules");

        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.match_patterns, vec!["~/work/*".to_string()]);
        assert_eq!(rule.details_template(), Some("{shell} in {cwd_short}"));
        assert_eq!(rule.state_template(), None);
        assert_eq!(rule.large_image_key(), Some("briefcase"));
        assert_eq!(rule.small_text(), None);
        assert_eq!(rule.buttons().map(|b| b.len()), Some(1));
        assert!(rule.reset_timer_on_enter);
    }

    #[test]
    fn malformed_rules_are_skipped_individually() {
        let rules = parse_rules(r#"{"rules": [42, {"name": "ok", "match": ["/x"]}]}"#)
            .expect("rules");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "ok");
    }

    #[test]
    fn missing_or_malformed_file_is_empty_rule_set() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let missing = RuleFile::new(temp_dir.path().join("focus.json"));
        assert!(missing.load().is_empty());

        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2").expect("write rules");
        assert!(RuleFile::new(&path).load().is_empty());
    }

    #[test]
    fn document_without_rules_key_is_empty() {
        assert!(parse_rules("{}").expect("rules").is_empty());
    }
}
