//! Keyword-based auto-categorization.
//!
//! A keyword rule maps a description pattern, optionally scoped to one
//! account, to a target envelope. The first rule whose pattern occurs in a
//! transaction's description and whose scope covers the transaction's
//! account wins. No match leaves the transaction unassigned; that is
//! distinct from the "Uncategorized" category, which only parents orphaned
//! envelopes.

use uuid::Uuid;

/// Account scope value meaning "applies to every account".
pub const ACCOUNT_WILDCARD: &str = "All";

/// One stored keyword rule, as loaded for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    /// Rule row id, used for last-used bookkeeping after a match.
    pub id: Uuid,
    /// Pattern matched as a case-sensitive substring of the description.
    pub pattern: String,
    /// An account's common name, or [`ACCOUNT_WILDCARD`].
    pub account_scope: String,
    /// Envelope the rule assigns.
    pub envelope_id: Uuid,
}

/// A successful rule match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    /// The rule that matched, for last-used bookkeeping.
    pub rule_id: Uuid,
    /// Envelope to assign.
    pub envelope_id: Uuid,
}

/// Resolves a description against the rules, first match wins.
///
/// Rules are evaluated in the order given; callers load them in a stable
/// order so repeated runs categorize identically.
#[must_use]
pub fn resolve(rules: &[KeywordRule], account_name: &str, description: &str) -> Option<RuleMatch> {
    rules
        .iter()
        .find(|rule| scope_covers(&rule.account_scope, account_name) && !rule.pattern.is_empty()
            && description.contains(&rule.pattern))
        .map(|rule| RuleMatch { rule_id: rule.id, envelope_id: rule.envelope_id })
}

fn scope_covers(scope: &str, account_name: &str) -> bool {
    scope == ACCOUNT_WILDCARD || scope == account_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rule(pattern: &str, scope: &str) -> KeywordRule {
        KeywordRule {
            id: Uuid::new_v4(),
            pattern: pattern.to_string(),
            account_scope: scope.to_string(),
            envelope_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn substring_match_returns_rule_envelope() {
        let rules = vec![rule("COFFEE", ACCOUNT_WILDCARD)];
        let matched = resolve(&rules, "Checking", "CITY COFFEE #42").unwrap();
        assert_eq!(matched.rule_id, rules[0].id);
        assert_eq!(matched.envelope_id, rules[0].envelope_id);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let rules = vec![rule("COFFEE", ACCOUNT_WILDCARD)];
        assert_eq!(resolve(&rules, "Checking", "city coffee #42"), None);
    }

    #[rstest]
    #[case::wildcard(ACCOUNT_WILDCARD, "Checking", true)]
    #[case::exact("Checking", "Checking", true)]
    #[case::other_account("Savings", "Checking", false)]
    fn scope_limits_the_rule(#[case] scope: &str, #[case] account: &str, #[case] matches: bool) {
        let rules = vec![rule("COFFEE", scope)];
        assert_eq!(resolve(&rules, account, "CITY COFFEE").is_some(), matches);
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = vec![rule("COFFEE", ACCOUNT_WILDCARD), rule("CITY", ACCOUNT_WILDCARD)];
        let matched = resolve(&rules, "Checking", "CITY COFFEE").unwrap();
        assert_eq!(matched.rule_id, rules[0].id);
    }

    #[test]
    fn scoped_out_rule_yields_to_a_later_match() {
        let rules = vec![rule("COFFEE", "Savings"), rule("COFFEE", ACCOUNT_WILDCARD)];
        let matched = resolve(&rules, "Checking", "CITY COFFEE").unwrap();
        assert_eq!(matched.rule_id, rules[1].id);
    }

    #[test]
    fn empty_pattern_never_matches() {
        let rules = vec![rule("", ACCOUNT_WILDCARD)];
        assert_eq!(resolve(&rules, "Checking", "ANYTHING"), None);
    }

    #[test]
    fn no_match_means_unassigned() {
        let rules = vec![rule("GROCERY", ACCOUNT_WILDCARD)];
        assert_eq!(resolve(&rules, "Checking", "CITY COFFEE"), None);
    }
}
