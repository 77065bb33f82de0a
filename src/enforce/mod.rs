//! Label policy enforcement over expression trees.
//!
//! The walker visits every node reachable from the root and rewrites the
//! matcher list of each instant selector with [`Policy::enforce_matchers`].
//!
//! Errors abort the walk at once. Selectors visited before the error keep
//! their rewritten matchers, so a tree must be discarded after a failed call.
//!
//! A node kind without an enforcement rule is a defect in this crate, not a
//! property of the query: the walker logs it and panics rather than return an
//! error a caller could ignore and forward the unscoped query.

mod reconcile;

use crate::ast::{Expr, Node, VectorSelector};
use crate::error::EnforceError;
use crate::policy::Policy;

/// Enforces `policy` on every selector reachable from `node`.
///
/// Equivalent to [`Policy::enforce_node`].
pub fn enforce<'a>(node: impl Into<Node<'a>>, policy: &Policy) -> Result<(), EnforceError> {
    policy.enforce_node(node)
}

impl Policy {
    /// Walks `node` and enforces this policy on every selector in it.
    ///
    /// # Panics
    ///
    /// Panics when the tree contains an [`Expr::Extension`] node, which has
    /// no enforcement rule.
    pub fn enforce_node<'a>(&self, node: impl Into<Node<'a>>) -> Result<(), EnforceError> {
        tracing::debug!(
            policy_id = %self.id(),
            strict = self.is_strict(),
            matchers = self.len(),
            "enforcing label policy"
        );

        match node.into() {
            Node::Statement(stmt) => self.enforce_expr(&mut stmt.expr),
            Node::Expressions(exprs) => self.enforce_exprs(exprs),
            Node::Expr(expr) => self.enforce_expr(expr),
        }
    }

    fn enforce_exprs(&self, exprs: &mut [Expr]) -> Result<(), EnforceError> {
        for expr in exprs {
            self.enforce_expr(expr)?;
        }
        Ok(())
    }

    fn enforce_expr(&self, expr: &mut Expr) -> Result<(), EnforceError> {
        match expr {
            Expr::Aggregate(n) => {
                self.enforce_expr(&mut n.expr)?;
                // `topk(scalar(x), y)` reads samples through the parameter too.
                if let Some(param) = &mut n.param {
                    self.enforce_expr(param)?;
                }
            }

            Expr::Binary(n) => {
                self.enforce_expr(&mut n.lhs)?;
                self.enforce_expr(&mut n.rhs)?;
            }

            Expr::Call(n) => self.enforce_exprs(&mut n.args)?,

            Expr::Subquery(n) => self.enforce_expr(&mut n.expr)?,

            Expr::Paren(n) => self.enforce_expr(&mut n.expr)?,

            Expr::Unary(n) => self.enforce_expr(&mut n.expr)?,

            Expr::NumberLiteral(_) | Expr::StringLiteral(_) => {}

            Expr::MatrixSelector(n) => {
                if let Expr::VectorSelector(vs) = n.vector_selector.as_mut() {
                    self.enforce_selector(vs)?;
                }
            }

            Expr::VectorSelector(vs) => self.enforce_selector(vs)?,

            Expr::Extension(n) => unhandled_node(&n.kind),
        }

        Ok(())
    }

    fn enforce_selector(&self, vs: &mut VectorSelector) -> Result<(), EnforceError> {
        vs.matchers = self.enforce_matchers(&vs.matchers)?;
        tracing::trace!(
            policy_id = %self.id(),
            selector = %vs,
            "enforced selector"
        );
        Ok(())
    }
}

#[cold]
fn unhandled_node(kind: &str) -> ! {
    tracing::error!(kind, "no enforcement rule for node type, aborting");
    panic!("unhandled node type extension({kind})");
}
