use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Power,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    End,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(v) => format!("number `{v}`"),
            Token::Ident(name) => format!("name `{name}`"),
            Token::Plus => "`+`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::Slash => "`/`".to_string(),
            Token::Power => "`**`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::LBracket => "`[`".to_string(),
            Token::RBracket => "`]`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::End => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) position: usize,
}

/// On-demand tokenizer; the parser pulls one token at a time so the first offending
/// name or character is the one reported.
pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn eat_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek_byte(0), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - start
    }

    pub(crate) fn next_token(&mut self) -> Result<Spanned> {
        while matches!(self.peek_byte(0), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let position = self.pos;
        let Some(byte) = self.peek_byte(0) else {
            return Ok(Spanned {
                token: Token::End,
                position,
            });
        };

        let token = match byte {
            b'0'..=b'9' => self.number(position)?,
            b'.' if matches!(self.peek_byte(1), Some(b'0'..=b'9')) => self.number(position)?,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while matches!(
                    self.peek_byte(0),
                    Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')
                ) {
                    self.pos += 1;
                }
                Token::Ident(self.src[position..self.pos].to_string())
            }
            b'*' if self.peek_byte(1) == Some(b'*') => {
                self.pos += 2;
                Token::Power
            }
            _ => {
                let token = match byte {
                    b'+' => Token::Plus,
                    b'-' => Token::Minus,
                    b'*' => Token::Star,
                    b'/' => Token::Slash,
                    b'^' => Token::Power,
                    b'(' => Token::LParen,
                    b')' => Token::RParen,
                    b'[' => Token::LBracket,
                    b']' => Token::RBracket,
                    b',' => Token::Comma,
                    _ => {
                        let ch = self.src[position..].chars().next().unwrap_or('?');
                        return Err(Error::ExpressionSyntax {
                            position,
                            reason: format!("unexpected character `{ch}`"),
                        });
                    }
                };
                self.pos += 1;
                token
            }
        };
        Ok(Spanned { token, position })
    }

    fn number(&mut self, position: usize) -> Result<Token> {
        self.eat_digits();
        if self.peek_byte(0) == Some(b'.') {
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.peek_byte(0), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_byte(1), Some(b'+' | b'-')));
            if matches!(self.peek_byte(1 + sign), Some(b'0'..=b'9')) {
                self.pos += 1 + sign;
                self.eat_digits();
            }
        }
        let text = &self.src[position..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| Error::ExpressionSyntax {
                position,
                reason: format!("malformed number `{text}`"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Result<Vec<Token>> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let spanned = lexer.next_token()?;
            if spanned.token == Token::End {
                return Ok(out);
            }
            out.push(spanned.token);
        }
    }

    #[test]
    fn numbers_in_every_spelling() {
        assert_eq!(
            tokens("1 2.5 .5 3. 1e-3 2E+2").expect("lex"),
            vec![
                Token::Number(1.0),
                Token::Number(2.5),
                Token::Number(0.5),
                Token::Number(3.0),
                Token::Number(1e-3),
                Token::Number(200.0),
            ]
        );
    }

    #[test]
    fn exponent_without_digits_leaves_a_name() {
        assert_eq!(
            tokens("2e").expect("lex"),
            vec![Token::Number(2.0), Token::Ident("e".to_string())]
        );
    }

    #[test]
    fn double_star_and_caret_are_power() {
        assert_eq!(
            tokens("t**2^3*4").expect("lex"),
            vec![
                Token::Ident("t".to_string()),
                Token::Power,
                Token::Number(2.0),
                Token::Power,
                Token::Number(3.0),
                Token::Star,
                Token::Number(4.0),
            ]
        );
    }

    #[test]
    fn stray_characters_report_their_offset() {
        let err = tokens("exp(t) ; 1").expect_err("semicolon");
        assert_eq!(
            err,
            Error::ExpressionSyntax {
                position: 7,
                reason: "unexpected character `;`".to_string()
            }
        );
        assert!(matches!(
            tokens("sin(τ)"),
            Err(Error::ExpressionSyntax { position: 4, .. })
        ));
    }
}
