//! Query expression tree.
//!
//! Parsing query text is the job of an upstream parser; this module defines
//! the tree it hands over, renders a tree back to query text, and moves trees
//! across process boundaries as JSON.

mod display;
mod expr;
mod serialization;

pub use display::format_duration;
pub use expr::{
    AggregateExpr, AggregateOp, BinaryExpr, BinaryOp, Call, EvalStmt, Expr, ExtensionExpr,
    MatchCardinality, MatrixSelector, NumberLiteral, ParenExpr, StringLiteral, SubqueryExpr,
    UnaryExpr, UnaryOp, VectorMatching, VectorSelector,
};
pub use serialization::{from_json, to_json, to_json_pretty};

/// A mutable borrow of any node the enforcer accepts as a root.
#[derive(Debug)]
pub enum Node<'a> {
    /// A top-level evaluation statement.
    Statement(&'a mut EvalStmt),
    /// A list of expressions, e.g. the `match[]` selectors of a series request.
    Expressions(&'a mut [Expr]),
    /// A single expression.
    Expr(&'a mut Expr),
}

impl<'a> From<&'a mut EvalStmt> for Node<'a> {
    fn from(stmt: &'a mut EvalStmt) -> Self {
        Self::Statement(stmt)
    }
}

impl<'a> From<&'a mut [Expr]> for Node<'a> {
    fn from(exprs: &'a mut [Expr]) -> Self {
        Self::Expressions(exprs)
    }
}

impl<'a> From<&'a mut Vec<Expr>> for Node<'a> {
    fn from(exprs: &'a mut Vec<Expr>) -> Self {
        Self::Expressions(exprs.as_mut_slice())
    }
}

impl<'a> From<&'a mut Expr> for Node<'a> {
    fn from(expr: &'a mut Expr) -> Self {
        Self::Expr(expr)
    }
}
