//! The fixed table of names a formula may reference.
//!
//! Nothing outside these tables resolves. Every callable is a [`Function`] variant.

use core::f64::consts::{E, PI};

/// Name of the free variable bound to the time axis.
pub const VARIABLE: &str = "t";

/// Callable names and the function they resolve to. `hstack` is an alias of `concatenate`.
pub const FUNCTIONS: &[(&str, Function)] = &[
    ("abs", Function::Abs),
    ("sin", Function::Sin),
    ("cos", Function::Cos),
    ("tan", Function::Tan),
    ("arcsin", Function::Arcsin),
    ("arccos", Function::Arccos),
    ("arctan", Function::Arctan),
    ("exp", Function::Exp),
    ("log", Function::Log),
    ("log10", Function::Log10),
    ("sqrt", Function::Sqrt),
    ("power", Function::Power),
    ("zeros", Function::Zeros),
    ("ones", Function::Ones),
    ("concatenate", Function::Concatenate),
    ("hstack", Function::Concatenate),
];

/// Named constants.
pub const CONSTANTS: &[(&str, f64)] = &[("pi", PI), ("e", E)];

/// A whitelisted function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `abs(x)`
    Abs,
    /// `sin(x)`
    Sin,
    /// `cos(x)`
    Cos,
    /// `tan(x)`
    Tan,
    /// `arcsin(x)`
    Arcsin,
    /// `arccos(x)`
    Arccos,
    /// `arctan(x)`
    Arctan,
    /// `exp(x)`
    Exp,
    /// Natural logarithm, `log(x)`
    Log,
    /// `log10(x)`
    Log10,
    /// `sqrt(x)`
    Sqrt,
    /// `power(base, exponent)`
    Power,
    /// `zeros(n)`, a block of `n` zeros.
    Zeros,
    /// `ones(n)`, a block of `n` ones.
    Ones,
    /// `concatenate((a, b, ...))` or `concatenate(a, b, ...)`.
    Concatenate,
}

/// How many arguments a function takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub(crate) fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }

    pub(crate) fn describe(self) -> String {
        match self {
            Arity::Exactly(1) => "exactly 1 argument".to_string(),
            Arity::Exactly(k) => format!("exactly {k} arguments"),
            Arity::AtLeast(k) => format!("at least {k} argument(s)"),
        }
    }
}

impl Function {
    /// Resolve a callable name.
    pub fn lookup(name: &str) -> Option<Self> {
        FUNCTIONS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, func)| *func)
    }

    /// Canonical name, as used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Arcsin => "arcsin",
            Function::Arccos => "arccos",
            Function::Arctan => "arctan",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Log10 => "log10",
            Function::Sqrt => "sqrt",
            Function::Power => "power",
            Function::Zeros => "zeros",
            Function::Ones => "ones",
            Function::Concatenate => "concatenate",
        }
    }

    pub(crate) fn arity(self) -> Arity {
        match self {
            Function::Power => Arity::Exactly(2),
            Function::Concatenate => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    /// The scalar map for functions applied sample by sample.
    pub(crate) fn elementwise(self) -> Option<fn(f64) -> f64> {
        let f: fn(f64) -> f64 = match self {
            Function::Abs => f64::abs,
            Function::Sin => f64::sin,
            Function::Cos => f64::cos,
            Function::Tan => f64::tan,
            Function::Arcsin => f64::asin,
            Function::Arccos => f64::acos,
            Function::Arctan => f64::atan,
            Function::Exp => f64::exp,
            Function::Log => f64::ln,
            Function::Log10 => f64::log10,
            Function::Sqrt => f64::sqrt,
            Function::Power | Function::Zeros | Function::Ones | Function::Concatenate => {
                return None
            }
        };
        Some(f)
    }
}

/// Resolve a constant name.
pub fn constant(name: &str) -> Option<f64> {
    CONSTANTS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, value)| *value)
}

/// `true` if `name` is the variable, a constant or a function.
pub fn is_known(name: &str) -> bool {
    name == VARIABLE || constant(name).is_some() || Function::lookup(name).is_some()
}
