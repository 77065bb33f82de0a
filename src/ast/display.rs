//! Rendering expressions back to query text.
//!
//! A gateway forwards the enforced tree upstream as text, so the output must
//! re-parse to the same tree. Matchers render in their canonical form.

use std::fmt::{self, Write as _};
use std::time::Duration;

use crate::matcher::{is_valid_label_name, is_valid_metric_name, write_quoted};

use super::expr::{
    AggregateExpr, BinaryExpr, Call, EvalStmt, Expr, ExtensionExpr, MatchCardinality,
    MatrixSelector, SubqueryExpr, UnaryOp, VectorSelector,
};

const UNITS: [(&str, u128); 7] = [
    ("y", 365 * 24 * 60 * 60 * 1000),
    ("w", 7 * 24 * 60 * 60 * 1000),
    ("d", 24 * 60 * 60 * 1000),
    ("h", 60 * 60 * 1000),
    ("m", 60 * 1000),
    ("s", 1000),
    ("ms", 1),
];

/// Formats a duration in query-language units, e.g. `1h30m`.
///
/// Sub-millisecond precision is dropped.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let mut ms = d.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in UNITS {
        if ms >= size {
            let _ = write!(out, "{}{unit}", ms / size);
            ms %= size;
        }
    }
    out
}

/// Writes a label name bare when legal, quoted otherwise so it stays one token.
fn write_label_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_valid_label_name(name) {
        f.write_str(name)
    } else {
        write_quoted(f, name)
    }
}

fn write_labels(f: &mut fmt::Formatter<'_>, labels: &[String]) -> fmt::Result {
    f.write_str("(")?;
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_label_name(f, label)?;
    }
    f.write_str(")")
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl VectorSelector {
    /// A metric name that is not a legal identifier moves inside the braces
    /// as `__name__="..."`, so it can never extend past the selector.
    fn fmt_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut needs_comma = false;
        match self.name.as_deref() {
            Some(name) if is_valid_metric_name(name) => {
                f.write_str(name)?;
                if self.matchers.is_empty() {
                    return Ok(());
                }
                f.write_str("{")?;
            }
            Some(name) => {
                f.write_str("{__name__=")?;
                write_quoted(f, name)?;
                needs_comma = true;
            }
            None => f.write_str("{")?,
        }
        for m in &self.matchers {
            if needs_comma {
                f.write_str(", ")?;
            }
            write!(f, "{m}")?;
            needs_comma = true;
        }
        f.write_str("}")
    }
}

impl fmt::Display for VectorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_body(f)?;
        if let Some(offset) = self.offset {
            write!(f, " offset {}", format_duration(offset))?;
        }
        Ok(())
    }
}

impl fmt::Display for MatrixSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The offset of the wrapped selector follows the range.
        match self.vector_selector.as_ref() {
            Expr::VectorSelector(vs) => {
                vs.fmt_body(f)?;
                write!(f, "[{}]", format_duration(self.range))?;
                if let Some(offset) = vs.offset {
                    write!(f, " offset {}", format_duration(offset))?;
                }
                Ok(())
            }
            other => write!(f, "{other}[{}]", format_duration(self.range)),
        }
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op.as_str())?;
        if self.without {
            f.write_str(" without ")?;
            write_labels(f, &self.grouping)?;
            f.write_str(" ")?;
        } else if !self.grouping.is_empty() {
            f.write_str(" by ")?;
            write_labels(f, &self.grouping)?;
            f.write_str(" ")?;
        }
        f.write_str("(")?;
        if let Some(param) = &self.param {
            write!(f, "{param}, ")?;
        }
        write!(f, "{})", self.expr)
    }
}

impl fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.lhs, self.op.as_str())?;
        if self.return_bool {
            f.write_str(" bool")?;
        }
        if let Some(m) = &self.matching {
            if m.on {
                f.write_str(" on ")?;
                write_labels(f, &m.labels)?;
            } else if !m.labels.is_empty() {
                f.write_str(" ignoring ")?;
                write_labels(f, &m.labels)?;
            }
            match m.card {
                MatchCardinality::ManyToOne => {
                    f.write_str(" group_left ")?;
                    write_labels(f, &m.include)?;
                }
                MatchCardinality::OneToMany => {
                    f.write_str(" group_right ")?;
                    write_labels(f, &m.include)?;
                }
                MatchCardinality::OneToOne | MatchCardinality::ManyToMany => {}
            }
        }
        write!(f, " {}", self.rhs)
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_label_name(f, &self.func)?;
        f.write_str("(")?;
        write_args(f, &self.args)?;
        f.write_str(")")
    }
}

impl fmt::Display for SubqueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}:", self.expr, format_duration(self.range))?;
        if let Some(step) = self.step {
            f.write_str(&format_duration(step))?;
        }
        f.write_str("]")?;
        if let Some(offset) = self.offset {
            write!(f, " offset {}", format_duration(offset))?;
        }
        Ok(())
    }
}

impl fmt::Display for ExtensionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        write_args(f, &self.args)?;
        f.write_str(")")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregate(n) => fmt::Display::fmt(n, f),
            Self::Binary(n) => fmt::Display::fmt(n, f),
            Self::Call(n) => fmt::Display::fmt(n, f),
            Self::Subquery(n) => fmt::Display::fmt(n, f),
            Self::Paren(n) => write!(f, "({})", n.expr),
            Self::Unary(n) => match n.op {
                UnaryOp::Neg => write!(f, "-{}", n.expr),
                UnaryOp::Pos => write!(f, "+{}", n.expr),
            },
            Self::NumberLiteral(n) => {
                if n.value.is_nan() {
                    f.write_str("NaN")
                } else if n.value.is_infinite() {
                    f.write_str(if n.value > 0.0 { "+Inf" } else { "-Inf" })
                } else {
                    write!(f, "{}", n.value)
                }
            }
            Self::StringLiteral(n) => write_quoted(f, &n.value),
            Self::MatrixSelector(n) => fmt::Display::fmt(n, f),
            Self::VectorSelector(n) => fmt::Display::fmt(n, f),
            Self::Extension(n) => fmt::Display::fmt(n, f),
        }
    }
}

impl fmt::Display for EvalStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expr, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AggregateOp, BinaryOp, VectorMatching};
    use crate::matcher::Matcher;

    fn selector(name: &str, matchers: Vec<Matcher>) -> Expr {
        Expr::selector(Some(name), matchers)
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1s500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(14 * 86400)), "2w");
    }

    #[test]
    fn test_selector_rendering() {
        let e = selector("up", vec![]);
        assert_eq!(e.to_string(), "up");

        let e = selector(
            "http_requests_total",
            vec![
                Matcher::equal("job", "api").unwrap(),
                Matcher::regex_match("code", "5..").unwrap(),
            ],
        );
        assert_eq!(e.to_string(), r#"http_requests_total{job="api", code=~"5.."}"#);

        let e = Expr::selector(None, vec![Matcher::equal("__name__", "up").unwrap()]);
        assert_eq!(e.to_string(), r#"{__name__="up"}"#);
    }

    #[test]
    fn test_matrix_with_offset_rendering() {
        let mut vs = VectorSelector::new(Some("x"), vec![Matcher::equal("a", "b").unwrap()]);
        vs.offset = Some(Duration::from_secs(60));
        let e = Expr::call(
            "rate",
            vec![Expr::matrix(Expr::VectorSelector(vs), Duration::from_secs(300))],
        );
        assert_eq!(e.to_string(), r#"rate(x{a="b"}[5m] offset 1m)"#);
    }

    #[test]
    fn test_aggregate_rendering() {
        let mut agg = AggregateExpr {
            op: AggregateOp::Topk,
            expr: Box::new(selector("x", vec![])),
            param: Some(Box::new(Expr::number(5.0))),
            grouping: vec!["job".to_string()],
            without: false,
        };
        assert_eq!(agg.to_string(), "topk by (job) (5, x)");

        agg.without = true;
        agg.param = None;
        agg.op = AggregateOp::Sum;
        assert_eq!(agg.to_string(), "sum without (job) (x)");
    }

    #[test]
    fn test_binary_rendering() {
        let mut bin = BinaryExpr {
            op: BinaryOp::Div,
            lhs: Box::new(selector("a", vec![])),
            rhs: Box::new(selector("b", vec![])),
            return_bool: false,
            matching: Some(VectorMatching {
                card: MatchCardinality::ManyToOne,
                on: true,
                labels: vec!["instance".to_string()],
                include: vec!["version".to_string()],
            }),
        };
        assert_eq!(
            bin.to_string(),
            "a / on (instance) group_left (version) b"
        );

        bin.op = BinaryOp::Gtr;
        bin.return_bool = true;
        bin.matching = None;
        assert_eq!(bin.to_string(), "a > bool b");
    }

    #[test]
    fn test_subquery_and_unary_rendering() {
        let e = Expr::neg(Expr::paren(Expr::subquery(
            selector("x", vec![]),
            Duration::from_secs(3600),
            Some(Duration::from_secs(60)),
        )));
        assert_eq!(e.to_string(), "-(x[1h:1m])");

        let e = Expr::subquery(selector("x", vec![]), Duration::from_secs(600), None);
        assert_eq!(e.to_string(), "x[10m:]");
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Expr::number(0.5).to_string(), "0.5");
        assert_eq!(Expr::number(f64::INFINITY).to_string(), "+Inf");
        assert_eq!(Expr::string("a\"b").to_string(), r#""a\"b""#);
        assert_eq!(Expr::string("a\u{7f}").to_string(), r#""a\u007f""#);
        assert_eq!(Expr::string("tab\there").to_string(), r#""tab\there""#);
    }

    #[test]
    fn test_illegal_metric_name_rendered_as_matcher() {
        let e = selector("secret{} or up", vec![]);
        assert_eq!(e.to_string(), r#"{__name__="secret{} or up"}"#);

        let e = selector("a b", vec![Matcher::equal("job", "api").unwrap()]);
        assert_eq!(e.to_string(), r#"{__name__="a b", job="api"}"#);

        let e = selector("job:rate5m", vec![]);
        assert_eq!(e.to_string(), "job:rate5m");
    }

    #[test]
    fn test_illegal_identifiers_quoted_in_lists_and_calls() {
        let agg = AggregateExpr {
            op: AggregateOp::Sum,
            expr: Box::new(selector("x", vec![])),
            param: None,
            grouping: vec!["job".to_string(), "a) (secret".to_string()],
            without: false,
        };
        assert_eq!(agg.to_string(), r#"sum by (job, "a) (secret") (x)"#);

        let e = Expr::call("secret{} or rate", vec![selector("x", vec![])]);
        assert_eq!(e.to_string(), r#""secret{} or rate"(x)"#);
    }
}
