//! Command templates backed by minijinja.
//!
//! Templates use Jinja syntax against PascalCase fields (`{{ Path }}`, `{{ Prompt | shq }}`).
//! Undefined fields are errors, never empty strings.

use crate::errors::HiveError;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::sync::LazyLock;

static ENGINE: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
    env.add_filter("shq", shell_quote);
    env.add_function("shq", shell_quote);
    env
});

/// Wrap `value` in single quotes for POSIX shells, escaping embedded single quotes.
pub fn shell_quote(value: String) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub fn render<S: Serialize>(source: &str, context: S) -> Result<String, HiveError> {
    ENGINE
        .render_str(source, context)
        .map_err(|e| HiveError::Template {
            template: source.to_string(),
            message: e.to_string(),
        })
}

/// Parse `source` without rendering it; used to reject broken configuration early.
pub fn validate(source: &str) -> Result<(), HiveError> {
    Environment::new()
        .template_from_str(source)
        .map(|_| ())
        .map_err(|e| HiveError::Template {
            template: source.to_string(),
            message: e.to_string(),
        })
}
