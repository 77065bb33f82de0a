//! Enforcement policies.
//!
//! A policy is the set of label matchers every selector of a query must carry,
//! plus the strictness flag deciding what happens when the query already
//! constrains one of those labels differently.

use std::collections::BTreeMap;
use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PolicyError;
use crate::matcher::{compile_anchored, MatchOp, Matcher};

/// Unique identifier for a policy instance.
///
/// Policies are built per request; the id ties together the log events of
/// one enforcement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(Uuid);

impl PolicyId {
    /// Creates a new random policy ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds the matcher for a label restricted to one or more literal values.
///
/// A single value yields `label="value"`. Several values yield a regex
/// alternation over the escaped values, `label=~"a|b"`, which goes through
/// [`regex_matcher`] so a set containing the empty string is rejected.
pub fn equal_matcher<I, S>(label: impl Into<String>, values: I) -> Result<Matcher, PolicyError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let label = label.into();
    let mut values: Vec<String> = values.into_iter().map(Into::into).collect();

    match values.len() {
        0 => Err(PolicyError::EmptyValues { label }),
        1 => {
            let value = values.remove(0);
            Ok(Matcher::equal(label, value)?)
        }
        _ => {
            let pattern = values
                .iter()
                .map(|v| regex::escape(v))
                .collect::<Vec<_>>()
                .join("|");
            regex_matcher(label, pattern)
        }
    }
}

/// Builds a regex matcher from a raw pattern.
///
/// Rejects malformed patterns and patterns that match the empty string: such
/// a matcher would also select series that lack the label entirely.
pub fn regex_matcher(
    label: impl Into<String>,
    pattern: impl Into<String>,
) -> Result<Matcher, PolicyError> {
    let label = label.into();
    let pattern = pattern.into();

    let compiled = compile_anchored(&pattern).map_err(|e| PolicyError::InvalidPattern {
        label: label.clone(),
        reason: format!("invalid regex: {e}"),
    })?;
    if compiled.is_match("") {
        return Err(PolicyError::InvalidPattern {
            label,
            reason: "regex should not match empty string".to_string(),
        });
    }

    Ok(Matcher::regex_match(label, pattern)?)
}

/// An immutable enforcement policy.
///
/// Holds at most one matcher per label name. Iteration order over the
/// matchers is ascending label name.
#[derive(Debug, Clone)]
pub struct Policy {
    id: PolicyId,
    matchers: BTreeMap<String, Matcher>,
    strict: bool,
}

impl Policy {
    /// Creates a policy from a list of matchers.
    ///
    /// When two matchers share a label name the later one wins.
    #[must_use]
    pub fn new(strict: bool, matchers: impl IntoIterator<Item = Matcher>) -> Self {
        let mut entries = BTreeMap::new();
        for matcher in matchers {
            if let Some(replaced) = entries.insert(matcher.name().to_string(), matcher) {
                tracing::trace!(replaced = %replaced, "policy matcher overridden by later entry");
            }
        }

        Self {
            id: PolicyId::new(),
            matchers: entries,
            strict,
        }
    }

    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    /// Identifier of this policy instance.
    #[must_use]
    pub const fn id(&self) -> PolicyId {
        self.id
    }

    /// Returns `true` if conflicting client matchers are rejected.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Required matchers in label-name order.
    pub fn matchers(&self) -> impl Iterator<Item = &Matcher> {
        self.matchers.values()
    }

    /// The required matcher for `label`, if any.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Matcher> {
        self.matchers.get(label)
    }

    /// Number of required matchers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Returns `true` if the policy requires nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Stable content hash of this policy.
    ///
    /// Covers strictness and the canonical form of every matcher but not the
    /// instance id, so two policies with the same rules share a fingerprint
    /// across processes. Suitable as a cache-key component for enforced queries.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut h = Hasher::new();
        let mode: &[u8] = if self.strict { b"strict\n" } else { b"lenient\n" };
        h.update(mode);
        for matcher in self.matchers.values() {
            h.update(matcher.canonical().as_bytes());
            h.update(b"\n");
        }
        h.finalize().to_hex().to_string()
    }

    /// Equality requirements replace client matchers on their label; all
    /// other kinds are layered on top of them.
    pub(crate) fn is_exclusive(required: &Matcher) -> bool {
        required.op() == MatchOp::Equal
    }
}

/// Builder for [`Policy`].
///
/// # Example
/// ```rust
/// use labelscope::Policy;
///
/// let policy = Policy::builder()
///     .strict(true)
///     .equal("tenant", ["acme"])?
///     .regex("env", "prod|staging")?
///     .build();
/// assert_eq!(policy.len(), 2);
/// # Ok::<(), labelscope::PolicyError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    strict: bool,
    matchers: Vec<Matcher>,
}

impl PolicyBuilder {
    /// Creates a non-strict builder with no matchers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode (default: false).
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add a pre-built matcher.
    #[must_use]
    pub fn matcher(mut self, matcher: Matcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Add a matcher restricting `label` to the given values.
    ///
    /// See [`equal_matcher`].
    pub fn equal<I, S>(self, label: impl Into<String>, values: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.matcher(equal_matcher(label, values)?))
    }

    /// Add a regex matcher for `label`.
    ///
    /// See [`regex_matcher`].
    pub fn regex(
        self,
        label: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        Ok(self.matcher(regex_matcher(label, pattern)?))
    }

    /// Build the policy.
    #[must_use]
    pub fn build(self) -> Policy {
        Policy::new(self.strict, self.matchers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_matcher_single_value() {
        let m = equal_matcher("tenant", ["acme"]).unwrap();
        assert_eq!(m.op(), MatchOp::Equal);
        assert_eq!(m.canonical(), "tenant=\"acme\"");
    }

    #[test]
    fn test_equal_matcher_multiple_values_escaped() {
        let m = equal_matcher("tenant", ["a.b", "c|d", "e"]).unwrap();
        assert_eq!(m.op(), MatchOp::RegexMatch);
        assert_eq!(m.value(), r"a\.b|c\|d|e");
        assert!(m.matches("a.b"));
        assert!(m.matches("c|d"));
        assert!(!m.matches("axb"));
        assert!(!m.matches("c"));
    }

    #[test]
    fn test_equal_matcher_requires_values() {
        let err = equal_matcher("tenant", Vec::<String>::new()).unwrap_err();
        assert_eq!(
            err,
            PolicyError::EmptyValues {
                label: "tenant".to_string()
            }
        );
    }

    #[test]
    fn test_equal_matcher_rejects_empty_value_in_set() {
        let err = equal_matcher("tenant", ["acme", ""]).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidPattern { .. }));
    }

    #[test]
    fn test_regex_matcher_rejects_empty_match() {
        for pattern in [".*", "", "a*", "x|"] {
            let err = regex_matcher("env", pattern).unwrap_err();
            assert!(
                matches!(err, PolicyError::InvalidPattern { .. }),
                "pattern {pattern:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_regex_matcher_rejects_malformed() {
        let err = regex_matcher("env", "(prod").unwrap_err();
        let PolicyError::InvalidPattern { reason, .. } = err else {
            panic!("expected InvalidPattern");
        };
        assert!(reason.starts_with("invalid regex"));
    }

    #[test]
    fn test_regex_matcher_accepts_non_empty() {
        let m = regex_matcher("env", "prod|staging").unwrap();
        assert_eq!(m.op(), MatchOp::RegexMatch);
        assert!(m.matches("staging"));
    }

    #[test]
    fn test_duplicate_labels_last_wins() {
        let policy = Policy::new(
            false,
            vec![
                Matcher::equal("tenant", "first").unwrap(),
                Matcher::equal("env", "prod").unwrap(),
                Matcher::equal("tenant", "second").unwrap(),
            ],
        );
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.get("tenant").unwrap().value(), "second");
    }

    #[test]
    fn test_matchers_in_label_order() {
        let policy = Policy::builder()
            .equal("zone", ["eu"])
            .unwrap()
            .equal("app", ["web"])
            .unwrap()
            .build();
        let names: Vec<_> = policy.matchers().map(Matcher::name).collect();
        assert_eq!(names, vec!["app", "zone"]);
    }

    #[test]
    fn test_fingerprint_stable_across_instances() {
        let a = Policy::builder().equal("tenant", ["acme"]).unwrap().build();
        let b = Policy::builder().equal("tenant", ["acme"]).unwrap().build();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let strict = Policy::builder()
            .strict(true)
            .equal("tenant", ["acme"])
            .unwrap()
            .build();
        assert_ne!(a.fingerprint(), strict.fingerprint());
    }

    #[test]
    fn test_policy_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Policy>();
    }
}
