//! Label matchers.
//!
//! A matcher is a `(name, op, value)` constraint on one label of a series.
//! Regex matchers are fully anchored, so `=~"prod"` matches only the exact
//! value `prod` and never `production`.

use std::fmt;
use std::hash::{Hash, Hasher};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MatcherError;

/// The kind of comparison a matcher performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOp {
    /// `label="value"`
    Equal,
    /// `label!="value"`
    NotEqual,
    /// `label=~"regex"`
    RegexMatch,
    /// `label!~"regex"`
    RegexNoMatch,
}

impl MatchOp {
    /// Returns the operator token as written in query text.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::RegexMatch => "=~",
            Self::RegexNoMatch => "!~",
        }
    }

    /// Returns `true` for the two regex kinds.
    #[must_use]
    pub const fn is_regex(&self) -> bool {
        matches!(self, Self::RegexMatch | Self::RegexNoMatch)
    }
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize)]
struct RawMatcher {
    name: String,
    op: MatchOp,
    value: String,
}

/// A single label matcher.
///
/// Identity (`PartialEq`, `Hash`) is defined over `(name, op, value)`, which
/// is exactly the information carried by the canonical form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawMatcher", into = "RawMatcher")]
pub struct Matcher {
    name: String,
    op: MatchOp,
    value: String,
    regex: Option<Regex>,
}

impl Matcher {
    /// Creates a matcher, compiling and validating the pattern of regex kinds.
    pub fn new(
        op: MatchOp,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, MatcherError> {
        let name = name.into();
        let value = value.into();
        if name.trim().is_empty() {
            return Err(MatcherError::EmptyLabelName);
        }
        if !is_valid_label_name(&name) {
            return Err(MatcherError::InvalidLabelName { name });
        }

        let regex = if op.is_regex() {
            Some(compile_anchored(&value).map_err(|e| MatcherError::InvalidRegex {
                label: name.clone(),
                reason: e.to_string(),
            })?)
        } else {
            None
        };

        Ok(Self {
            name,
            op,
            value,
            regex,
        })
    }

    /// Creates an equality matcher. Fails only on an invalid label name.
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Result<Self, MatcherError> {
        Self::new(MatchOp::Equal, name, value)
    }

    /// Creates a negated equality matcher.
    pub fn not_equal(
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, MatcherError> {
        Self::new(MatchOp::NotEqual, name, value)
    }

    /// Creates a regex matcher.
    pub fn regex_match(
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, MatcherError> {
        Self::new(MatchOp::RegexMatch, name, pattern)
    }

    /// Creates a negated regex matcher.
    pub fn regex_no_match(
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, MatcherError> {
        Self::new(MatchOp::RegexNoMatch, name, pattern)
    }

    /// Label name this matcher constrains.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Match kind.
    #[must_use]
    pub const fn op(&self) -> MatchOp {
        self.op
    }

    /// Literal value, or the raw pattern for regex kinds.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Canonical string form, e.g. `tenant="acme"`.
    ///
    /// Two matchers are the same constraint iff their canonical forms are equal.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Evaluates the matcher against a label value.
    ///
    /// A missing label is represented by the empty string.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match (self.op, &self.regex) {
            (MatchOp::Equal, _) => self.value == value,
            (MatchOp::NotEqual, _) => self.value != value,
            (MatchOp::RegexMatch, Some(re)) => re.is_match(value),
            (MatchOp::RegexNoMatch, Some(re)) => !re.is_match(value),
            // Regex kinds are always compiled in `new`.
            (MatchOp::RegexMatch | MatchOp::RegexNoMatch, None) => false,
        }
    }
}

/// Returns `true` if `name` is a legal label name, `[a-zA-Z_][a-zA-Z0-9_]*`.
///
/// Label names are written unquoted in query text, so anything else could
/// change the structure of the rendered query.
#[must_use]
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns `true` if `name` is a legal metric name, `[a-zA-Z_:][a-zA-Z0-9_:]*`.
#[must_use]
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Compiles a pattern with the full-string anchoring label matchers use.
pub(crate) fn compile_anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

/// Writes `value` as a double-quoted query string literal.
pub(crate) fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in value.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", u32::from(c))?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.op)?;
        write_quoted(f, &self.value)
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.op == other.op && self.value == other.value
    }
}

impl Eq for Matcher {}

impl Hash for Matcher {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.op.hash(state);
        self.value.hash(state);
    }
}

impl TryFrom<RawMatcher> for Matcher {
    type Error = MatcherError;

    fn try_from(raw: RawMatcher) -> Result<Self, Self::Error> {
        Self::new(raw.op, raw.name, raw.value)
    }
}

impl From<Matcher> for RawMatcher {
    fn from(m: Matcher) -> Self {
        Self {
            name: m.name,
            op: m.op,
            value: m.value,
        }
    }
}
