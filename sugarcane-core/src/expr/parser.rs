//! Pratt parser for macro expressions.
//!
//! Precedence levels (low to high):
//!  1. Sequence (`;`, `,`)
//!  2. Assignment (`=`, `+=`, `-=`, `*=`, `/=`), right-associative
//!  3. Logical OR (`||`, `or`)
//!  4. Logical AND (`&&`, `and`)
//!  5. Equality (`==`, `!=`, `===`, `!==`, `eq`, `neq`)
//!  6. Relational (`<`, `<=`, `>`, `>=`, `lt`, `lte`, `gt`, `gte`)
//!  7. Additive (`+`, `-`)
//!  8. Multiplicative (`*`, `/`, `%`)
//!  9. Unary prefix (`!`, `not`, `-`, `+`)

use super::lexer::{Token, TokenKind};
use super::ExprError;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `$name = value`, or a compound form when `op` is set.
    Assign {
        name: String,
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    /// Evaluate each in turn; the last value wins.
    Sequence(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

const BP_SEQ: u8 = 1;
const BP_ASSIGN: u8 = 3;
const BP_OR: u8 = 5;
const BP_AND: u8 = 7;
const BP_EQ: u8 = 9;
const BP_REL: u8 = 11;
const BP_ADD: u8 = 13;
const BP_MUL: u8 = 15;
const BP_PREFIX: u8 = 17;

/// Parse a token stream (ending in `Eof`) into one expression.
pub fn parse_tokens(tokens: &[Token]) -> Result<Expr, ExprError> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_sequence()?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        other => Err(ExprError::UnexpectedToken {
            found: other.describe(),
            offset: parser.offset(),
        }),
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn parse_sequence(&mut self) -> Result<Expr, ExprError> {
        let mut items = Vec::new();
        loop {
            // Trailing or doubled separators are tolerated: `$a = 1;`
            if matches!(self.peek(), TokenKind::Eof | TokenKind::RParen) {
                break;
            }
            items.push(self.parse_bp(BP_SEQ + 1)?);
            if matches!(self.peek(), TokenKind::Semicolon | TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        match items.len() {
            0 => Err(ExprError::Empty),
            1 => Ok(items.remove(0)),
            _ => Ok(Expr::Sequence(items)),
        }
    }

    fn parse_bp(&mut self, min_bp: u8) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let kind = self.peek().clone();

            if let Some(op) = assign_op(&kind) {
                if BP_ASSIGN < min_bp {
                    break;
                }
                let offset = self.offset();
                self.advance();
                let name = match lhs {
                    Expr::Var(name) => name,
                    _ => return Err(ExprError::InvalidAssignmentTarget { offset }),
                };
                // Right-associative: `$a = $b = 1`
                let value = self.parse_bp(BP_ASSIGN)?;
                lhs = Expr::Assign {
                    name,
                    op,
                    value: Box::new(value),
                };
                continue;
            }

            let Some((bp, infix)) = infix_op(&kind) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            self.advance();
            let rhs = Box::new(self.parse_bp(bp + 1)?);
            let lhs_box = Box::new(lhs);

            lhs = match infix {
                Infix::Or => Expr::Or(lhs_box, rhs),
                Infix::And => Expr::And(lhs_box, rhs),
                Infix::Binary(op) => Expr::Binary {
                    op,
                    lhs: lhs_box,
                    rhs,
                },
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.advance() {
            TokenKind::Number(n) => Ok(Expr::Literal(Value::Num(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Var(name) => Ok(Expr::Var(name)),
            TokenKind::Ident(word) => Err(ExprError::UnknownIdentifier { word, offset }),
            TokenKind::Bang => self.unary(UnaryOp::Not),
            TokenKind::Minus => self.unary(UnaryOp::Neg),
            TokenKind::Plus => self.unary(UnaryOp::Plus),
            TokenKind::LParen => {
                let inner = self.parse_sequence()?;
                match self.advance() {
                    TokenKind::RParen => Ok(inner),
                    other => Err(ExprError::UnexpectedToken {
                        found: other.describe(),
                        offset: self.offset(),
                    }),
                }
            }
            TokenKind::Eof => Err(ExprError::UnexpectedEnd),
            other => Err(ExprError::UnexpectedToken {
                found: other.describe(),
                offset,
            }),
        }
    }

    fn unary(&mut self, op: UnaryOp) -> Result<Expr, ExprError> {
        let operand = self.parse_bp(BP_PREFIX)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }
}

enum Infix {
    Or,
    And,
    Binary(BinaryOp),
}

fn infix_op(kind: &TokenKind) -> Option<(u8, Infix)> {
    let entry = match kind {
        TokenKind::PipePipe => (BP_OR, Infix::Or),
        TokenKind::AmpAmp => (BP_AND, Infix::And),
        TokenKind::EqEq => (BP_EQ, Infix::Binary(BinaryOp::Eq)),
        TokenKind::NotEq => (BP_EQ, Infix::Binary(BinaryOp::NotEq)),
        TokenKind::EqEqEq => (BP_EQ, Infix::Binary(BinaryOp::StrictEq)),
        TokenKind::NotEqEq => (BP_EQ, Infix::Binary(BinaryOp::StrictNotEq)),
        TokenKind::Less => (BP_REL, Infix::Binary(BinaryOp::Less)),
        TokenKind::LessEq => (BP_REL, Infix::Binary(BinaryOp::LessEq)),
        TokenKind::Greater => (BP_REL, Infix::Binary(BinaryOp::Greater)),
        TokenKind::GreaterEq => (BP_REL, Infix::Binary(BinaryOp::GreaterEq)),
        TokenKind::Plus => (BP_ADD, Infix::Binary(BinaryOp::Add)),
        TokenKind::Minus => (BP_ADD, Infix::Binary(BinaryOp::Sub)),
        TokenKind::Star => (BP_MUL, Infix::Binary(BinaryOp::Mul)),
        TokenKind::Slash => (BP_MUL, Infix::Binary(BinaryOp::Div)),
        TokenKind::Percent => (BP_MUL, Infix::Binary(BinaryOp::Rem)),
        _ => return None,
    };
    Some(entry)
}

fn assign_op(kind: &TokenKind) -> Option<Option<BinaryOp>> {
    match kind {
        TokenKind::Eq => Some(None),
        TokenKind::PlusEq => Some(Some(BinaryOp::Add)),
        TokenKind::MinusEq => Some(Some(BinaryOp::Sub)),
        TokenKind::StarEq => Some(Some(BinaryOp::Mul)),
        TokenKind::SlashEq => Some(Some(BinaryOp::Div)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::tokenize;

    fn parse(src: &str) -> Result<Expr, ExprError> {
        parse_tokens(&tokenize(src)?)
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::Literal(Value::Num(1.0))),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(Expr::Literal(Value::Num(2.0))),
                    rhs: Box::new(Expr::Literal(Value::Num(3.0))),
                }),
            }
        );
    }

    #[test]
    fn test_assignment_sequence() {
        let expr = parse("$a = 1; $b += 2").unwrap();
        match expr {
            Expr::Sequence(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[1], Expr::Assign { name, op: Some(BinaryOp::Add), .. } if name == "b"));
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(matches!(
            parse("1 = 2"),
            Err(ExprError::InvalidAssignmentTarget { .. })
        ));
    }

    #[test]
    fn test_unknown_identifier() {
        assert!(matches!(
            parse("window.alert"),
            Err(ExprError::UnknownIdentifier { .. }) | Err(ExprError::UnexpectedChar { .. })
        ));
    }

    #[test]
    fn test_unbalanced_parens() {
        assert!(parse("(1 + 2").is_err());
        assert!(parse("1 + 2)").is_err());
        assert!(matches!(parse(""), Err(ExprError::Empty)));
    }
}
