//! Declarative policy configuration.
//!
//! Gateways describe the scoping rule for a tenant as JSON and turn it into a
//! [`Policy`] per request:
//!
//! ```json
//! {
//!   "strict": true,
//!   "matchers": [
//!     { "label": "tenant", "values": ["acme"] },
//!     { "label": "env", "regex": "prod|staging" },
//!     { "label": "team", "op": "not_equal", "value": "ops" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::matcher::{MatchOp, Matcher};
use crate::policy::{equal_matcher, regex_matcher, Policy};

/// Restricts a label to literal values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValuesEntry {
    /// Label name.
    pub label: String,
    /// Allowed values; several become a regex alternation.
    pub values: Vec<String>,
}

/// Restricts a label to a regex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegexEntry {
    /// Label name.
    pub label: String,
    /// Raw pattern; must not match the empty string.
    pub regex: String,
}

/// A matcher spelled out as label, op and value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplicitEntry {
    /// Label name.
    pub label: String,
    /// Match kind.
    pub op: MatchOp,
    /// Value or pattern.
    pub value: String,
}

/// One configured matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatcherConfig {
    /// `{"label", "values"}`
    Values(ValuesEntry),
    /// `{"label", "regex"}`
    Regex(RegexEntry),
    /// `{"label", "op", "value"}`
    Explicit(ExplicitEntry),
}

impl MatcherConfig {
    /// Builds the matcher, applying the same validation as the programmatic
    /// constructors.
    pub fn to_matcher(&self) -> Result<Matcher, PolicyError> {
        match self {
            Self::Values(e) => equal_matcher(e.label.as_str(), e.values.iter().cloned()),
            Self::Regex(e) => regex_matcher(e.label.as_str(), e.regex.as_str()),
            Self::Explicit(e) if e.op == MatchOp::RegexMatch => {
                regex_matcher(e.label.as_str(), e.value.as_str())
            }
            Self::Explicit(e) => Ok(Matcher::new(e.op, e.label.as_str(), e.value.as_str())?),
        }
    }
}

/// Serializable description of a [`Policy`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Reject conflicting client matchers instead of overriding them.
    #[serde(default)]
    pub strict: bool,

    /// Required matchers. Later entries win over earlier ones for the same label.
    #[serde(default)]
    pub matchers: Vec<MatcherConfig>,
}

impl PolicyConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(s: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(s).map_err(|e| PolicyError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Validates the configuration and builds the policy.
    ///
    /// A configuration without matchers is rejected: it would enforce nothing.
    pub fn to_policy(&self) -> Result<Policy, PolicyError> {
        if self.matchers.is_empty() {
            return Err(PolicyError::InvalidConfig {
                message: "at least one matcher is required".to_string(),
            });
        }

        let matchers = self
            .matchers
            .iter()
            .map(MatcherConfig::to_matcher)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Policy::new(self.strict, matchers))
    }
}

impl TryFrom<PolicyConfig> for Policy {
    type Error = PolicyError;

    fn try_from(config: PolicyConfig) -> Result<Self, Self::Error> {
        config.to_policy()
    }
}
