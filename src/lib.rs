//! # labelscope - Label scoping for multi-tenant query gateways
//!
//! labelscope rewrites a parsed query expression so that every selector in it
//! carries a fixed set of label matchers. A gateway builds one [`Policy`] per
//! request from the caller's tenant, enforces it on the parsed query, and only
//! then forwards the query upstream. A query cannot widen, weaken, or
//! contradict the injected constraints.
//!
//! ## Core Concepts
//!
//! - **Matcher**: a `(label, op, value)` constraint such as `tenant="acme"`
//! - **Policy**: the required matchers (one per label) plus a strictness flag
//! - **Expr**: the query expression tree handed over by a parser
//! - **Enforcement**: the walk that merges the policy into every selector
//!
//! ## Usage
//!
//! ```rust
//! use labelscope::{enforce, Expr, Matcher, Policy};
//!
//! let policy = Policy::builder().equal("tenant", ["acme"])?.build();
//!
//! let mut query = Expr::selector(Some("up"), vec![Matcher::equal("job", "api")?]);
//! enforce(&mut query, &policy)?;
//!
//! assert_eq!(query.to_string(), r#"up{job="api", tenant="acme"}"#);
//! # Ok::<(), labelscope::ScopeError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod ast;
pub mod config;
pub mod enforce;
pub mod error;
pub mod matcher;
pub mod policy;

// Re-export primary types at crate root for convenience
pub use ast::{EvalStmt, Expr, Node, VectorSelector};
pub use config::{MatcherConfig, PolicyConfig};
pub use enforce::enforce;
pub use error::{EnforceError, MatcherError, PolicyError, ScopeError, ScopeResult};
pub use matcher::{MatchOp, Matcher};
pub use policy::{equal_matcher, regex_matcher, Policy, PolicyBuilder, PolicyId};
