//! Sandboxed formula evaluation.
//!
//! A formula is parsed once into a tree whose names are already bound to the fixed
//! [`registry`], then evaluated against a time axis. There is no path from a formula to
//! anything outside the registry: unknown names fail at parse time, before any sample is
//! computed.
//!
//! ```
//! use echoconv::expr::Expression;
//! use ndarray::Array1;
//!
//! let t = Array1::linspace(0.0, 1.0, 3);
//! let h = Expression::parse("exp(-t)").unwrap();
//! let values = h.evaluate(t.view()).unwrap();
//! assert_eq!(values[0], 1.0);
//! ```

mod eval;
mod lexer;
mod parser;
pub mod registry;

use crate::error::{Error, Result};
use eval::Value;
use ndarray::{Array1, ArrayView1};
use parser::{Node, Parser};

/// A parsed, resolved formula over the variable `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parse and resolve `source`.
    pub fn parse(source: &str) -> Result<Self> {
        let root = Parser::new(source)?.parse()?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// The text this expression was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate over `t`, producing exactly one value per sample.
    ///
    /// A scalar result is broadcast over the axis. An array result must already have the
    /// axis length.
    pub fn evaluate(&self, t: ArrayView1<f64>) -> Result<Array1<f64>> {
        match eval::eval(&self.root, &t)? {
            Value::Scalar(v) => Ok(Array1::from_elem(t.len(), v)),
            Value::Array(values) if values.len() == t.len() => Ok(values),
            Value::Array(values) => Err(Error::LengthMismatch {
                arg: "expression",
                expected: t.len(),
                got: values.len(),
            }),
            Value::Sequence(items) => Err(Error::LengthMismatch {
                arg: "expression",
                expected: t.len(),
                got: items.len(),
            }),
        }
    }
}

impl core::str::FromStr for Expression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl core::fmt::Display for Expression {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse `expression` and evaluate it over `axis` in one go.
pub fn evaluate(expression: &str, axis: ArrayView1<f64>) -> Result<Array1<f64>> {
    Expression::parse(expression)?.evaluate(axis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use core::f64::consts::PI;

    #[track_caller]
    fn assert_vec_close(got: &Array1<f64>, expected: &[f64]) {
        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected) {
            assert_abs_diff_eq!(*g, *e, epsilon = 1e-12);
        }
    }

    fn default_axis() -> Array1<f64> {
        Array1::linspace(0.0, 10.0, 1000)
    }

    #[test]
    fn exponential_decay_over_the_default_axis() {
        let t = default_axis();
        let h = evaluate("exp(-t)", t.view()).expect("exp(-t)");
        assert_eq!(h.len(), 1000);
        assert_abs_diff_eq!(h[0], 1.0);
        assert_abs_diff_eq!(h[999], (-10.0f64).exp(), epsilon = 1e-15);
        for (ti, hi) in t.iter().zip(h.iter()) {
            assert_abs_diff_eq!(*hi, (-ti).exp(), epsilon = 1e-15);
        }
    }

    #[test]
    fn pulse_built_from_blocks() {
        let t = default_axis();
        let x = evaluate("hstack((zeros(200), ones(300), zeros(500)))", t.view()).expect("pulse");
        assert_eq!(x.len(), 1000);
        assert_eq!(x[199], 0.0);
        assert_eq!(x[200], 1.0);
        assert_eq!(x[499], 1.0);
        assert_eq!(x[500], 0.0);
        assert_abs_diff_eq!(x.sum(), 300.0);
    }

    #[test]
    fn scalar_formula_is_broadcast() {
        let t = Array1::linspace(0.0, 1.0, 4);
        let y = evaluate("2 * pi", t.view()).expect("constant");
        assert_vec_close(&y, &[2.0 * PI; 4]);
    }

    #[test]
    fn trigonometry_and_precedence() {
        let t = Array1::linspace(0.0, 1.0, 5);
        let y = evaluate("sin(pi * t) - t**2 / 2", t.view()).expect("formula");
        let expected: Vec<f64> = t.iter().map(|t| (PI * t).sin() - t * t / 2.0).collect();
        assert_vec_close(&y, &expected);

        let y = evaluate("-t**2", t.view()).expect("negated square");
        let expected: Vec<f64> = t.iter().map(|t| -(t * t)).collect();
        assert_vec_close(&y, &expected);
    }

    #[test]
    fn block_formula_must_match_axis_length() {
        let t = Array1::linspace(0.0, 1.0, 10);
        assert_eq!(
            evaluate("ones(9)", t.view()).expect_err("short block"),
            Error::LengthMismatch {
                arg: "expression",
                expected: 10,
                got: 9
            }
        );
        assert!(matches!(
            evaluate("(1, 2)", t.view()),
            Err(Error::LengthMismatch { arg: "expression", .. })
        ));
    }

    #[test]
    fn host_escape_is_an_unknown_identifier() {
        let t = Array1::linspace(0.0, 1.0, 3);
        assert_eq!(
            evaluate("__import__('os').system('rm -rf /')", t.view()).expect_err("sandboxed"),
            Error::UnknownIdentifier {
                name: "__import__".to_string()
            }
        );
    }

    #[test]
    fn non_finite_samples_pass_through() {
        let t = Array1::linspace(0.0, 1.0, 3);
        let y = evaluate("log(t)", t.view()).expect("log");
        assert!(y[0].is_infinite() && y[0] < 0.0);
        assert_abs_diff_eq!(y[2], 0.0);
    }

    #[test]
    fn parses_from_str() {
        let expr: Expression = "cos(t)".parse().expect("from_str");
        assert_eq!(expr.source(), "cos(t)");
        assert_eq!(expr.to_string(), "cos(t)");
    }
}
