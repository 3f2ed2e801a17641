//! Flat `{field}` substitution for focus-rule text.
//!
//! The field set is fixed (`cwd`, `cwd_short`, `branch`, `shell`). `{{` and
//! `}}` produce literal braces. Anything else in braces is a configuration
//! error surfaced to the caller.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::composer::ComposeError;

static RE_TEMPLATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFields {
    pub cwd: String,
    pub cwd_short: String,
    pub branch: String,
    pub shell: String,
}

impl TemplateFields {
    fn get(&self, name: &str) -> Option<&str> {
        match name {
            "cwd" => Some(&self.cwd),
            "cwd_short" => Some(&self.cwd_short),
            "branch" => Some(&self.branch),
            "shell" => Some(&self.shell),
            _ => None,
        }
    }
}

pub fn render(template: &str, fields: &TemplateFields) -> Result<String, ComposeError> {
    let mut rendered = String::with_capacity(template.len());
    let mut cursor = 0;

    for captures in RE_TEMPLATE_TOKEN.captures_iter(template) {
        let Some(token) = captures.get(0) else {
            continue;
        };
        push_literal(&mut rendered, &template[cursor..token.start()], template)?;
        cursor = token.end();

        match token.as_str() {
            "{{" => rendered.push('{'),
            "}}" => rendered.push('}'),
            _ => {
                let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
                if name.is_empty() {
                    return Err(ComposeError::MalformedTemplate {
                        template: template.to_string(),
                        reason: "empty field name",
                    });
                }
                let value = fields
                    .get(name)
                    .ok_or_else(|| ComposeError::UnknownTemplateField {
                        field: name.to_string(),
                        template: template.to_string(),
                    })?;
                rendered.push_str(value);
            }
        }
    }

    push_literal(&mut rendered, &template[cursor..], template)?;
    Ok(rendered)
}

fn push_literal(out: &mut String, literal: &str, template: &str) -> Result<(), ComposeError> {
    if literal.contains(['{', '}']) {
        return Err(ComposeError::MalformedTemplate {
            template: template.to_string(),
            reason: "unbalanced brace",
        });
    }
    out.push_str(literal);
    Ok(())
}
