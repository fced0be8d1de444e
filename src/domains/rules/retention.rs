use super::RuleSet;
use crate::domains::sessions::entity::Session;

/// Recycled sessions kept per remote when no rule overrides it.
pub const DEFAULT_MAX_RECYCLED: usize = 5;

impl RuleSet {
    /// Retention limit for `remote`; `0` means unlimited.
    ///
    /// The last matching rule that sets `max_recycled` wins. Rules without the field carry the
    /// value resolved so far forward.
    pub fn max_recycled(&self, remote: &str) -> usize {
        self.matching(remote)
            .fold(None, |resolved, rule| rule.max_recycled.or(resolved))
            .unwrap_or(DEFAULT_MAX_RECYCLED)
    }
}

/// Sessions beyond `limit`, oldest by `updated_at` first out. A `limit` of zero keeps everything.
pub fn select_evictions(mut sessions: Vec<Session>, limit: usize) -> Vec<Session> {
    if limit == 0 || sessions.len() <= limit {
        return Vec::new();
    }
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    sessions.split_off(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sessions::entity::SessionState;
    use crate::domains::settings::Rule;
    use chrono::{Duration, Utc};
    use std::path::PathBuf;

    fn rule(pattern: &str, max_recycled: Option<usize>) -> Rule {
        Rule {
            pattern: pattern.to_string(),
            max_recycled,
            ..Rule::default()
        }
    }

    fn recycled(id: &str, age_minutes: i64) -> Session {
        let at = Utc::now() - Duration::minutes(age_minutes);
        Session {
            id: id.to_string(),
            name: id.to_string(),
            slug: id.to_string(),
            path: PathBuf::from(format!("/tmp/{id}")),
            remote: "r".to_string(),
            state: SessionState::Recycled,
            created_at: at,
            updated_at: at,
            last_inbox_read: None,
        }
    }

    #[test]
    fn more_specific_later_rule_overrides_catch_all() {
        let rules =
            RuleSet::compile(&[rule("", Some(5)), rule("github.com/x/.*", Some(2))]).unwrap();
        assert_eq!(rules.max_recycled("https://github.com/x/y"), 2);
        assert_eq!(rules.max_recycled("https://github.com/z/y"), 5);
    }

    #[test]
    fn no_rules_uses_default() {
        assert_eq!(RuleSet::default().max_recycled("anything"), DEFAULT_MAX_RECYCLED);
    }

    #[test]
    fn zero_means_unlimited_for_every_remote() {
        let rules = RuleSet::compile(&[rule("", Some(0))]).unwrap();
        assert_eq!(rules.max_recycled("https://github.com/x/y"), 0);
        assert_eq!(rules.max_recycled("/srv/git/other"), 0);
    }

    #[test]
    fn rule_without_override_inherits_previous_value() {
        let rules = RuleSet::compile(&[
            rule("", Some(3)),
            rule("github", None),
            rule("gitlab", Some(9)),
        ])
        .unwrap();
        assert_eq!(rules.max_recycled("https://github.com/x/y"), 3);
        assert_eq!(rules.max_recycled("https://gitlab.com/x/y"), 9);
    }

    #[test]
    fn matching_rules_without_any_override_use_default() {
        let rules = RuleSet::compile(&[rule("", None), rule("github", None)]).unwrap();
        assert_eq!(rules.max_recycled("https://github.com/x/y"), DEFAULT_MAX_RECYCLED);
    }

    #[test]
    fn evicts_oldest_beyond_limit() {
        let sessions = vec![
            recycled("two", 2),
            recycled("four", 4),
            recycled("one", 1),
            recycled("three", 3),
        ];

        let evicted: Vec<_> = select_evictions(sessions, 2)
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(evicted, vec!["three", "four"]);
    }

    #[test]
    fn nothing_evicted_at_or_below_limit_or_when_unlimited() {
        let sessions = vec![recycled("a", 1), recycled("b", 2)];
        assert!(select_evictions(sessions.clone(), 2).is_empty());
        assert!(select_evictions(sessions, 0).is_empty());
    }
}
