use super::lexer::{Lexer, Spanned, Token};
use super::registry::{self, Function};
use crate::error::{Error, Result};

/// Bound on the depth of the resulting tree. Chained operators count too, since
/// `1 + 1 + ...` nests to the left.
///
/// One level of `(` or `f(` costs up to seven parser frames, so this has to fit a 2 MiB
/// thread stack in an unoptimized build.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub(crate) fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

/// Resolved syntax tree. Names are already bound to the registry, so evaluation cannot
/// encounter an unknown identifier.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Number(f64),
    Time,
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
    Sequence(Vec<Node>),
}

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Spanned,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str) -> Result<Self> {
        let mut lexer = Lexer::new(src);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            depth: 0,
        })
    }

    pub(crate) fn parse(mut self) -> Result<Node> {
        if self.current.token == Token::End {
            return Err(Error::ExpressionSyntax {
                position: self.current.position,
                reason: "empty expression".to_string(),
            });
        }
        let node = self.expr()?;
        match self.current.token {
            Token::End => Ok(node),
            _ => Err(self.unexpected("an operator or end of input")),
        }
    }

    fn advance(&mut self) -> Result<Spanned> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        if self.current.token == token {
            self.advance()?;
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> Error {
        Error::ExpressionSyntax {
            position: self.current.position,
            reason: format!("expected {what}, found {}", self.current.token.describe()),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::ExpressionSyntax {
                position: self.current.position,
                reason: format!("expression nests deeper than {MAX_DEPTH} levels"),
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expr(&mut self) -> Result<Node> {
        self.enter()?;
        let mut lhs = self.product()?;
        let mut chained = 0;
        loop {
            let op = match self.current.token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            self.enter()?;
            chained += 1;
            let rhs = self.product()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained + 1;
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        let mut chained = 0;
        loop {
            let op = match self.current.token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance()?;
            self.enter()?;
            chained += 1;
            let rhs = self.unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node> {
        match self.current.token {
            Token::Minus | Token::Plus => {
                let negate = self.advance()?.token == Token::Minus;
                self.enter()?;
                let operand = self.unary()?;
                self.leave();
                Ok(if negate {
                    Node::Neg(Box::new(operand))
                } else {
                    operand
                })
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.atom()?;
        if self.current.token != Token::Power {
            return Ok(base);
        }
        self.advance()?;
        self.enter()?;
        let exponent = self.unary()?;
        self.leave();
        Ok(Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)))
    }

    fn atom(&mut self) -> Result<Node> {
        match self.current.token.clone() {
            Token::Number(value) => {
                self.advance()?;
                Ok(Node::Number(value))
            }
            Token::Ident(name) => self.name(name),
            Token::LParen => {
                self.advance()?;
                let first = self.expr()?;
                if self.current.token != Token::Comma {
                    self.expect(Token::RParen, "`)`")?;
                    return Ok(first);
                }
                let mut items = vec![first];
                items.extend(self.list_tail(Token::RParen)?);
                Ok(Node::Sequence(items))
            }
            Token::LBracket => {
                self.advance()?;
                if self.current.token == Token::RBracket {
                    self.advance()?;
                    return Ok(Node::Sequence(Vec::new()));
                }
                let first = self.expr()?;
                let mut items = vec![first];
                if self.current.token == Token::Comma {
                    items.extend(self.list_tail(Token::RBracket)?);
                } else {
                    self.expect(Token::RBracket, "`]`")?;
                }
                Ok(Node::Sequence(items))
            }
            _ => Err(self.unexpected("a number, a name, `(` or `[`")),
        }
    }

    /// Parse `, item, item ,? close` after the first item of a list.
    fn list_tail(&mut self, close: Token) -> Result<Vec<Node>> {
        let mut items = Vec::new();
        while self.current.token == Token::Comma {
            self.advance()?;
            if self.current.token == close {
                break;
            }
            items.push(self.expr()?);
        }
        let what = match close {
            Token::RBracket => "`,` or `]`",
            _ => "`,` or `)`",
        };
        self.expect(close, what)?;
        Ok(items)
    }

    fn name(&mut self, name: String) -> Result<Node> {
        // Resolve before looking further so a foreign name is reported as such, whatever
        // syntax follows it.
        if !registry::is_known(&name) {
            return Err(Error::UnknownIdentifier { name });
        }
        let at = self.advance()?.position;
        let is_call = self.current.token == Token::LParen;

        if let Some(func) = Function::lookup(&name) {
            if !is_call {
                return Err(Error::ExpressionSyntax {
                    position: at,
                    reason: format!("function `{name}` must be called"),
                });
            }
            return self.call(func);
        }
        if is_call {
            return Err(Error::ExpressionSyntax {
                position: at,
                reason: format!("`{name}` is not callable"),
            });
        }
        if name == registry::VARIABLE {
            return Ok(Node::Time);
        }
        registry::constant(&name)
            .map(Node::Number)
            .ok_or(Error::UnknownIdentifier { name })
    }

    fn call(&mut self, func: Function) -> Result<Node> {
        self.advance()?;
        let mut args = Vec::new();
        if self.current.token != Token::RParen {
            args.push(self.expr()?);
            while self.current.token == Token::Comma {
                self.advance()?;
                if self.current.token == Token::RParen {
                    break;
                }
                args.push(self.expr()?);
            }
        }
        self.expect(Token::RParen, "`,` or `)`")?;

        let arity = func.arity();
        if !arity.accepts(args.len()) {
            return Err(Error::InvalidParameter {
                arg: func.name(),
                reason: format!("expects {}, got {}", arity.describe(), args.len()),
            });
        }
        Ok(Node::Call(func, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<Node> {
        Parser::new(src)?.parse()
    }

    fn num(v: f64) -> Box<Node> {
        Box::new(Node::Number(v))
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        assert_eq!(
            parse("-t**2").expect("parse"),
            Node::Neg(Box::new(Node::Binary(
                BinaryOp::Pow,
                Box::new(Node::Time),
                num(2.0)
            )))
        );
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(
            parse("2**3**2").expect("parse"),
            Node::Binary(
                BinaryOp::Pow,
                num(2.0),
                Box::new(Node::Binary(BinaryOp::Pow, num(3.0), num(2.0)))
            )
        );
    }

    #[test]
    fn product_before_sum() {
        assert_eq!(
            parse("1 + 2 * t").expect("parse"),
            Node::Binary(
                BinaryOp::Add,
                num(1.0),
                Box::new(Node::Binary(BinaryOp::Mul, num(2.0), Box::new(Node::Time)))
            )
        );
    }

    #[test]
    fn tuple_argument_becomes_sequence() {
        let node = parse("hstack((zeros(2), ones(3),))").expect("parse");
        let Node::Call(Function::Concatenate, args) = node else {
            panic!("expected a concatenate call");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(&args[0], Node::Sequence(items) if items.len() == 2));
    }

    #[test]
    fn constants_resolve_to_numbers() {
        assert_eq!(
            parse("pi").expect("parse"),
            Node::Number(core::f64::consts::PI)
        );
    }

    #[test]
    fn unknown_names_fail_before_anything_else() {
        for (src, name) in [
            ("os.system('x')", "os"),
            ("foo(t)", "foo"),
            ("__import__('os')", "__import__"),
            ("exp(t) + eval", "eval"),
        ] {
            assert_eq!(
                parse(src).expect_err("unknown name"),
                Error::UnknownIdentifier {
                    name: name.to_string()
                },
                "{src}"
            );
        }
    }

    #[test]
    fn malformed_text_is_a_syntax_error() {
        for src in ["", "exp(", "1 +", "(t", "t t", "[1, 2", "exp", "t(1)", ")"] {
            assert!(
                matches!(parse(src), Err(Error::ExpressionSyntax { .. })),
                "{src}"
            );
        }
    }

    #[test]
    fn wrong_arity_is_an_invalid_parameter() {
        assert!(matches!(
            parse("exp(t, 1)"),
            Err(Error::InvalidParameter { arg: "exp", .. })
        ));
        assert!(matches!(
            parse("power(t)"),
            Err(Error::InvalidParameter { arg: "power", .. })
        ));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let src = format!("{}t{}", "(".repeat(500), ")".repeat(500));
        assert!(matches!(
            parse(&src),
            Err(Error::ExpressionSyntax { .. })
        ));
        let src = format!("{}t", "-".repeat(500));
        assert!(matches!(
            parse(&src),
            Err(Error::ExpressionSyntax { .. })
        ));
        let src = vec!["t"; 1000].join(" + ");
        assert!(matches!(
            parse(&src),
            Err(Error::ExpressionSyntax { .. })
        ));
        let src = vec!["t"; 50].join(" * ");
        assert!(parse(&src).is_ok());
    }

    fn nested(open: &str, close: &str, levels: usize) -> String {
        format!("{}t{}", open.repeat(levels), close.repeat(levels))
    }

    #[test]
    fn nesting_limit_fits_a_small_thread_stack() {
        let worker = std::thread::Builder::new()
            .stack_size(2 << 20)
            .spawn(|| {
                for (open, close) in [("(", ")"), ("sin(", ")"), ("[", "]"), ("-(", ")")] {
                    for levels in [MAX_DEPTH + 1, 255, 1000] {
                        assert!(
                            matches!(
                                parse(&nested(open, close, levels)),
                                Err(Error::ExpressionSyntax { .. })
                            ),
                            "{open} x {levels}"
                        );
                    }
                }
                // Each `sin(` level adds one to the innermost expression's depth.
                let deepest = nested("sin(", ")", MAX_DEPTH - 1);
                let expression = crate::expr::Expression::parse(&deepest).expect("at the limit");
                let values = expression
                    .evaluate(ndarray::array![0.0, 1.0].view())
                    .expect("evaluate");
                assert_eq!(values[0], 0.0);
                assert!(parse(&nested("(", ")", MAX_DEPTH - 1)).is_ok());
            })
            .expect("spawn parser thread");
        assert!(worker.join().is_ok(), "parser overflowed a 2 MiB stack");
    }
}
