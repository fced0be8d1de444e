pub mod copier;
pub mod hooks;
pub mod retention;

pub use copier::{CopyReport, copy_patterns};
pub use hooks::{HookContext, HookRunner};
pub use retention::{DEFAULT_MAX_RECYCLED, select_evictions};

use crate::domains::settings::Rule;
use crate::errors::HiveError;
use regex::Regex;

#[derive(Debug, Clone)]
struct CompiledRule {
    /// `None` for an empty pattern, which matches every remote.
    pattern: Option<Regex>,
    rule: Rule,
}

impl CompiledRule {
    fn matches(&self, remote: &str) -> bool {
        self.pattern.as_ref().is_none_or(|re| re.is_match(remote))
    }
}

/// Rules in declaration order with their patterns compiled once.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn compile(rules: &[Rule]) -> Result<Self, HiveError> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let pattern = if rule.pattern.is_empty() {
                    None
                } else {
                    Some(Regex::new(&rule.pattern).map_err(|e| {
                        HiveError::config(&format!("rules[{index}].pattern"), e)
                    })?)
                };
                Ok(CompiledRule {
                    pattern,
                    rule: rule.clone(),
                })
            })
            .collect::<Result<Vec<_>, HiveError>>()?;
        Ok(Self { rules })
    }

    /// Every rule matching `remote`, in declaration order.
    pub fn matching<'a>(&'a self, remote: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |compiled| compiled.matches(remote))
            .map(|compiled| &compiled.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
