//! Expression tree serialization helpers.
//!
//! Lets an out-of-process parser hand trees to the enforcer and lets the
//! enforced tree be logged or cached in a stable format.

use crate::error::ScopeError;

use super::expr::Expr;

/// Serialize an expression to compact JSON.
pub fn to_json(expr: &Expr) -> Result<String, ScopeError> {
    serde_json::to_string(expr).map_err(|e| ScopeError::serialization(format!("serialize expr: {e}")))
}

/// Serialize an expression to pretty JSON.
pub fn to_json_pretty(expr: &Expr) -> Result<String, ScopeError> {
    serde_json::to_string_pretty(expr)
        .map_err(|e| ScopeError::serialization(format!("serialize expr: {e}")))
}

/// Deserialize an expression from JSON.
///
/// Matchers are validated while decoding, so an invalid regex fails here.
pub fn from_json(s: &str) -> Result<Expr, ScopeError> {
    serde_json::from_str::<Expr>(s)
        .map_err(|e| ScopeError::serialization(format!("deserialize expr: {e}")))
}
