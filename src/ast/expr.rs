//! Expression tree node definitions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matcher::Matcher;

/// Top-level evaluation statement wrapping one expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalStmt {
    /// The expression to evaluate.
    pub expr: Expr,

    /// First evaluation timestamp.
    pub start: DateTime<Utc>,

    /// Last evaluation timestamp (equal to `start` for instant queries).
    pub end: DateTime<Utc>,

    /// Step between evaluations (zero for instant queries).
    pub interval: Duration,

    /// How far back an instant selector looks for samples.
    pub lookback_delta: Duration,
}

impl EvalStmt {
    /// Default lookback window for instant selectors.
    pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(5 * 60);

    /// Creates an instant-query statement evaluated at `at`.
    #[must_use]
    pub fn instant(expr: Expr, at: DateTime<Utc>) -> Self {
        Self {
            expr,
            start: at,
            end: at,
            interval: Duration::ZERO,
            lookback_delta: Self::DEFAULT_LOOKBACK,
        }
    }

    /// Creates a range-query statement.
    #[must_use]
    pub fn range(
        expr: Expr,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Duration,
    ) -> Self {
        Self {
            expr,
            start,
            end,
            interval,
            lookback_delta: Self::DEFAULT_LOOKBACK,
        }
    }
}

/// A query expression.
///
/// The set of kinds is closed; every consumer matches exhaustively so that a
/// new kind cannot be introduced without a rule for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    /// `sum by (job) (x)`
    Aggregate(AggregateExpr),
    /// `a + b`
    Binary(BinaryExpr),
    /// `rate(x[5m])`
    Call(Call),
    /// `x[1h:5m]`
    Subquery(SubqueryExpr),
    /// `(x)`
    Paren(ParenExpr),
    /// `-x`
    Unary(UnaryExpr),
    /// `42`
    NumberLiteral(NumberLiteral),
    /// `"text"`
    StringLiteral(StringLiteral),
    /// `x[5m]`
    MatrixSelector(MatrixSelector),
    /// `x{job="api"}`
    VectorSelector(VectorSelector),
    /// A node contributed by a parser extension. It has no enforcement rule.
    Extension(ExtensionExpr),
}

/// Aggregation operators.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    Group,
    Stddev,
    Stdvar,
    Topk,
    Bottomk,
    CountValues,
    Quantile,
    Limitk,
    LimitRatio,
}

impl AggregateOp {
    /// Keyword as written in query text.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Group => "group",
            Self::Stddev => "stddev",
            Self::Stdvar => "stdvar",
            Self::Topk => "topk",
            Self::Bottomk => "bottomk",
            Self::CountValues => "count_values",
            Self::Quantile => "quantile",
            Self::Limitk => "limitk",
            Self::LimitRatio => "limit_ratio",
        }
    }
}

/// An aggregation over an inner expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateExpr {
    /// Aggregation operator.
    pub op: AggregateOp,
    /// Aggregated expression.
    pub expr: Box<Expr>,
    /// Parameter for `topk`, `quantile`, `count_values` and friends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<Box<Expr>>,
    /// `by`/`without` label list.
    #[serde(default)]
    pub grouping: Vec<String>,
    /// `true` for `without`, `false` for `by`.
    #[serde(default)]
    pub without: bool,
}

/// Binary operators.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Atan2,
    Eql,
    Neq,
    Gtr,
    Lss,
    Gte,
    Lte,
    And,
    Or,
    Unless,
}

impl BinaryOp {
    /// Operator token as written in query text.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "^",
            Self::Atan2 => "atan2",
            Self::Eql => "==",
            Self::Neq => "!=",
            Self::Gtr => ">",
            Self::Lss => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::And => "and",
            Self::Or => "or",
            Self::Unless => "unless",
        }
    }

    /// Returns `true` for comparison operators, which accept the `bool` modifier.
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eql | Self::Neq | Self::Gtr | Self::Lss | Self::Gte | Self::Lte
        )
    }
}

/// Cardinality of a vector match.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCardinality {
    #[default]
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

/// `on`/`ignoring` and `group_left`/`group_right` modifiers of a binary op.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VectorMatching {
    /// Match cardinality.
    #[serde(default)]
    pub card: MatchCardinality,
    /// `true` for `on(...)`, `false` for `ignoring(...)`.
    #[serde(default)]
    pub on: bool,
    /// Labels listed in `on`/`ignoring`.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Extra labels listed in `group_left`/`group_right`.
    #[serde(default)]
    pub include: Vec<String>,
}

/// A binary operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    /// Operator.
    pub op: BinaryOp,
    /// Left operand.
    pub lhs: Box<Expr>,
    /// Right operand.
    pub rhs: Box<Expr>,
    /// `bool` modifier on comparisons.
    #[serde(default)]
    pub return_bool: bool,
    /// Vector matching modifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching: Option<VectorMatching>,
}

/// A function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Function name.
    pub func: String,
    /// Arguments in order.
    #[serde(default)]
    pub args: Vec<Expr>,
}

/// A subquery, `expr[range:step]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubqueryExpr {
    /// Inner expression evaluated at every step.
    pub expr: Box<Expr>,
    /// Window covered by the subquery.
    pub range: Duration,
    /// Resolution; the evaluation interval is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Duration>,
    /// `offset` modifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Duration>,
}

/// A parenthesized expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParenExpr {
    /// Wrapped expression.
    pub expr: Box<Expr>,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Pos,
}

/// A unary operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    /// Operator.
    pub op: UnaryOp,
    /// Operand.
    pub expr: Box<Expr>,
}

/// A numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumberLiteral {
    /// Literal value.
    pub value: f64,
}

/// A string literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringLiteral {
    /// Unescaped contents.
    pub value: String,
}

/// A range selector, `x[5m]`.
///
/// The wrapped expression is a [`VectorSelector`] for every tree a parser
/// produces; other shapes are left alone by the enforcer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSelector {
    /// Wrapped selector.
    pub vector_selector: Box<Expr>,
    /// Lookback window.
    pub range: Duration,
}

/// An instant selector. This is the only node that carries label matchers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VectorSelector {
    /// Metric name, if written as `name{...}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Label matchers inside the braces.
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    /// `offset` modifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Duration>,
}

impl VectorSelector {
    /// Creates a selector with a metric name and matchers.
    #[must_use]
    pub fn new(name: Option<impl Into<String>>, matchers: Vec<Matcher>) -> Self {
        Self {
            name: name.map(Into::into),
            matchers,
            offset: None,
        }
    }

    /// Returns every matcher on `label`, in order.
    pub fn matchers_for<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Matcher> + 'a {
        self.matchers.iter().filter(move |m| m.name() == label)
    }
}

/// A node contributed by a parser extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionExpr {
    /// Extension node kind.
    pub kind: String,
    /// Child expressions.
    #[serde(default)]
    pub args: Vec<Expr>,
}

impl Expr {
    /// Short name of this node kind, used in log events.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Aggregate(_) => "aggregate",
            Self::Binary(_) => "binary",
            Self::Call(_) => "call",
            Self::Subquery(_) => "subquery",
            Self::Paren(_) => "paren",
            Self::Unary(_) => "unary",
            Self::NumberLiteral(_) => "number_literal",
            Self::StringLiteral(_) => "string_literal",
            Self::MatrixSelector(_) => "matrix_selector",
            Self::VectorSelector(_) => "vector_selector",
            Self::Extension(_) => "extension",
        }
    }

    /// `name{matchers}`
    #[must_use]
    pub fn selector(name: Option<&str>, matchers: Vec<Matcher>) -> Self {
        Self::VectorSelector(VectorSelector::new(name, matchers))
    }

    /// `selector[range]`
    #[must_use]
    pub fn matrix(selector: Self, range: Duration) -> Self {
        Self::MatrixSelector(MatrixSelector {
            vector_selector: Box::new(selector),
            range,
        })
    }

    /// Numeric literal.
    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::NumberLiteral(NumberLiteral { value })
    }

    /// String literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::StringLiteral(StringLiteral {
            value: value.into(),
        })
    }

    /// `op(expr)` without grouping or parameter.
    #[must_use]
    pub fn aggregate(op: AggregateOp, expr: Self) -> Self {
        Self::Aggregate(AggregateExpr {
            op,
            expr: Box::new(expr),
            param: None,
            grouping: Vec::new(),
            without: false,
        })
    }

    /// `lhs op rhs` without modifiers.
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary(BinaryExpr {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            return_bool: false,
            matching: None,
        })
    }

    /// `func(args...)`
    #[must_use]
    pub fn call(func: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call(Call {
            func: func.into(),
            args,
        })
    }

    /// `expr[range:step]`
    #[must_use]
    pub fn subquery(expr: Self, range: Duration, step: Option<Duration>) -> Self {
        Self::Subquery(SubqueryExpr {
            expr: Box::new(expr),
            range,
            step,
            offset: None,
        })
    }

    /// `(expr)`
    #[must_use]
    pub fn paren(expr: Self) -> Self {
        Self::Paren(ParenExpr {
            expr: Box::new(expr),
        })
    }

    /// `-expr`
    #[must_use]
    pub fn neg(expr: Self) -> Self {
        Self::Unary(UnaryExpr {
            op: UnaryOp::Neg,
            expr: Box::new(expr),
        })
    }

    /// Collects every instant selector reachable from this node, in
    /// depth-first order, including those wrapped by range selectors.
    #[must_use]
    pub fn selectors(&self) -> Vec<&VectorSelector> {
        let mut out = Vec::new();
        self.collect_selectors(&mut out);
        out
    }

    fn collect_selectors<'a>(&'a self, out: &mut Vec<&'a VectorSelector>) {
        match self {
            Self::Aggregate(n) => {
                n.expr.collect_selectors(out);
                if let Some(param) = &n.param {
                    param.collect_selectors(out);
                }
            }
            Self::Binary(n) => {
                n.lhs.collect_selectors(out);
                n.rhs.collect_selectors(out);
            }
            Self::Call(n) => n.args.iter().for_each(|a| a.collect_selectors(out)),
            Self::Extension(n) => n.args.iter().for_each(|a| a.collect_selectors(out)),
            Self::Subquery(SubqueryExpr { expr, .. })
            | Self::Paren(ParenExpr { expr })
            | Self::Unary(UnaryExpr { expr, .. }) => expr.collect_selectors(out),
            Self::MatrixSelector(n) => n.vector_selector.collect_selectors(out),
            Self::VectorSelector(vs) => out.push(vs),
            Self::NumberLiteral(_) | Self::StringLiteral(_) => {}
        }
    }
}
