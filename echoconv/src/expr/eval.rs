use super::parser::{BinaryOp, Node};
use super::registry::Function;
use crate::error::{Error, Result};
use ndarray::{Array1, ArrayView1, Zip};

/// Largest block `zeros`/`ones` may allocate.
pub(crate) const MAX_BLOCK_LEN: usize = 1 << 24;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Scalar(f64),
    Array(Array1<f64>),
    Sequence(Vec<Value>),
}

fn sequence_misuse() -> Error {
    Error::InvalidParameter {
        arg: "sequence",
        reason: "a parenthesised or bracketed list can only be passed to concatenate".to_string(),
    }
}

impl Value {
    fn map(self, f: impl Fn(f64) -> f64) -> Result<Value> {
        match self {
            Value::Scalar(v) => Ok(Value::Scalar(f(v))),
            Value::Array(a) => Ok(Value::Array(a.mapv_into(f))),
            Value::Sequence(_) => Err(sequence_misuse()),
        }
    }

    fn combine(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
        match (lhs, rhs) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(op.apply(a, b))),
            (Value::Array(a), Value::Scalar(b)) => Ok(Value::Array(a.mapv_into(|a| op.apply(a, b)))),
            (Value::Scalar(a), Value::Array(b)) => Ok(Value::Array(b.mapv_into(|b| op.apply(a, b)))),
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return Err(Error::LengthMismatch {
                        arg: "operand",
                        expected: a.len(),
                        got: b.len(),
                    });
                }
                Ok(Value::Array(
                    Zip::from(&a).and(&b).map_collect(|&a, &b| op.apply(a, b)),
                ))
            }
            _ => Err(sequence_misuse()),
        }
    }
}

pub(crate) fn eval(node: &Node, t: &ArrayView1<f64>) -> Result<Value> {
    match node {
        Node::Number(v) => Ok(Value::Scalar(*v)),
        Node::Time => Ok(Value::Array(t.to_owned())),
        Node::Neg(inner) => eval(inner, t)?.map(|v| -v),
        Node::Binary(op, lhs, rhs) => Value::combine(*op, eval(lhs, t)?, eval(rhs, t)?),
        Node::Sequence(items) => items
            .iter()
            .map(|item| eval(item, t))
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        Node::Call(func, args) => call(*func, args, t),
    }
}

fn call(func: Function, args: &[Node], t: &ArrayView1<f64>) -> Result<Value> {
    if let Some(f) = func.elementwise() {
        return eval(&args[0], t)?.map(f);
    }
    match func {
        Function::Power => Value::combine(BinaryOp::Pow, eval(&args[0], t)?, eval(&args[1], t)?),
        Function::Zeros => block_len(func, eval(&args[0], t)?).map(|n| Value::Array(Array1::zeros(n))),
        Function::Ones => block_len(func, eval(&args[0], t)?).map(|n| Value::Array(Array1::ones(n))),
        Function::Concatenate => {
            let mut parts = args
                .iter()
                .map(|arg| eval(arg, t))
                .collect::<Result<Vec<_>>>()?;
            if let [Value::Sequence(_)] = parts.as_slice() {
                if let Some(Value::Sequence(items)) = parts.pop() {
                    parts = items;
                }
            }
            concatenate(parts)
        }
        _ => Err(Error::InvalidParameter {
            arg: func.name(),
            reason: "not callable in this position".to_string(),
        }),
    }
}

fn block_len(func: Function, value: Value) -> Result<usize> {
    let invalid = |reason: &str| Error::InvalidParameter {
        arg: func.name(),
        reason: reason.to_string(),
    };
    let Value::Scalar(n) = value else {
        return Err(invalid("block length must be a scalar"));
    };
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
        return Err(invalid("block length must be a non-negative integer"));
    }
    if n > MAX_BLOCK_LEN as f64 {
        return Err(invalid("block length is too large"));
    }
    Ok(n as usize)
}

fn concatenate(parts: Vec<Value>) -> Result<Value> {
    let mut out = Vec::new();
    for part in parts {
        match part {
            Value::Scalar(v) => out.push(v),
            Value::Array(a) => out.extend(a.iter().copied()),
            Value::Sequence(_) => {
                return Err(Error::InvalidParameter {
                    arg: Function::Concatenate.name(),
                    reason: "nested lists are not supported".to_string(),
                })
            }
        }
    }
    Ok(Value::Array(Array1::from(out)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::Parser;
    use ndarray::array;

    fn run(src: &str, t: Array1<f64>) -> Result<Value> {
        let node = Parser::new(src)?.parse()?;
        eval(&node, &t.view())
    }

    #[test]
    fn scalar_broadcasts_over_array() {
        assert_eq!(
            run("2 * t + 1", array![0.0, 1.0, 2.0]).expect("eval"),
            Value::Array(array![1.0, 3.0, 5.0])
        );
        assert_eq!(
            run("power(t, 2)", array![1.0, 2.0, 3.0]).expect("eval"),
            Value::Array(array![1.0, 4.0, 9.0])
        );
    }

    #[test]
    fn blocks_and_concatenation() {
        assert_eq!(
            run("concatenate([zeros(2), 3 * ones(2), 7])", array![0.0]).expect("eval"),
            Value::Array(array![0.0, 0.0, 3.0, 3.0, 7.0])
        );
        assert_eq!(
            run("hstack(ones(1), zeros(1))", array![0.0]).expect("eval"),
            Value::Array(array![1.0, 0.0])
        );
    }

    #[test]
    fn block_length_must_be_a_whole_number() {
        for src in ["zeros(-1)", "ones(2.5)", "zeros(t)", "ones(1e300)"] {
            assert!(
                matches!(run(src, array![0.0, 1.0]), Err(Error::InvalidParameter { .. })),
                "{src}"
            );
        }
    }

    #[test]
    fn mismatched_arrays_are_rejected() {
        assert_eq!(
            run("t + ones(2)", array![0.0, 1.0, 2.0]).expect_err("mismatch"),
            Error::LengthMismatch {
                arg: "operand",
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn sequences_only_feed_concatenate() {
        assert!(matches!(
            run("(1, 2) + 1", array![0.0]),
            Err(Error::InvalidParameter { arg: "sequence", .. })
        ));
        assert!(matches!(
            run("exp([1])", array![0.0]),
            Err(Error::InvalidParameter { arg: "sequence", .. })
        ));
    }
}
