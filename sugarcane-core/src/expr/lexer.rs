//! Lexer for macro expressions.
//!
//! Besides the usual punctuation operators the lexer understands the
//! bareword operators authors write inside macros: `eq` (==), `neq` (!=),
//! `gt` (>), `gte` (>=), `lt` (<), `lte` (<=), `and` (&&), `or` (||) and
//! `not` (!). They are matched case-insensitively and only as whole words,
//! never inside string literals or variable names.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the expression source.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    /// `$name`
    Var(String),
    /// A bareword that is not a keyword.
    Ident(String),
    True,
    False,

    LParen,
    RParen,
    Comma,
    Semicolon,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,

    AmpAmp,
    PipePipe,
    Bang,

    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,

    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => crate::value::format_number(*n),
            TokenKind::Str(s) => format!("{s:?}"),
            TokenKind::Var(v) => format!("${v}"),
            TokenKind::Ident(i) => i.clone(),
            TokenKind::Eof => "end of expression".to_string(),
            other => format!("{other:?}"),
        }
    }
}

/// Tokenize an expression.
pub fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut lexer = Lexer {
        src,
        bytes: src.as_bytes(),
        pos: 0,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Lexer<'_> {
    fn peek_at(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Result<Token, ExprError> {
        self.skip_whitespace();
        let start = self.pos;

        if start >= self.bytes.len() {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset: start,
            });
        }

        let c = self.bytes[start];
        let kind = match c {
            b'"' | b'\'' => self.scan_string(c)?,
            b'0'..=b'9' => self.scan_number()?,
            b'.' if self.peek_at(1).is_ascii_digit() => self.scan_number()?,
            b'$' => self.scan_var()?,
            _ if is_word_byte(c) => self.scan_word(),
            _ => self.scan_punct()?,
        };

        Ok(Token {
            kind,
            offset: start,
        })
    }

    fn scan_string(&mut self, quote: u8) -> Result<TokenKind, ExprError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        let mut chars = self.src[self.pos..].char_indices();

        while let Some((i, ch)) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, other)) => value.push(other),
                    None => break,
                },
                _ if ch as u32 == quote as u32 => {
                    self.pos += i + 1;
                    return Ok(TokenKind::Str(value));
                }
                _ => value.push(ch),
            }
        }

        Err(ExprError::UnterminatedString { offset: start })
    }

    fn scan_number(&mut self) -> Result<TokenKind, ExprError> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.peek_at(0) == b'.' {
            self.pos += 1;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        if matches!(self.peek_at(0), b'e' | b'E')
            && (self.peek_at(1).is_ascii_digit()
                || (matches!(self.peek_at(1), b'+' | b'-') && self.peek_at(2).is_ascii_digit()))
        {
            self.pos += 2;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }

        let text = &self.src[start..self.pos];
        text.parse()
            .map(TokenKind::Number)
            .map_err(|_| ExprError::InvalidNumber {
                text: text.to_string(),
            })
    }

    fn scan_var(&mut self) -> Result<TokenKind, ExprError> {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() && is_word_byte(self.bytes[self.pos]) {
            self.pos += 1;
        }
        if self.pos == start + 1 {
            return Err(ExprError::UnexpectedChar {
                ch: '$',
                offset: start,
            });
        }
        Ok(TokenKind::Var(self.src[start + 1..self.pos].to_string()))
    }

    fn scan_word(&mut self) -> TokenKind {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_word_byte(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];

        match word.to_ascii_lowercase().as_str() {
            "eq" => TokenKind::EqEq,
            "neq" => TokenKind::NotEq,
            "gt" => TokenKind::Greater,
            "gte" => TokenKind::GreaterEq,
            "lt" => TokenKind::Less,
            "lte" => TokenKind::LessEq,
            "and" => TokenKind::AmpAmp,
            "or" => TokenKind::PipePipe,
            "not" => TokenKind::Bang,
            _ => match word {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                "NaN" => TokenKind::Number(f64::NAN),
                "Infinity" => TokenKind::Number(f64::INFINITY),
                _ => TokenKind::Ident(word.to_string()),
            },
        }
    }

    fn scan_punct(&mut self) -> Result<TokenKind, ExprError> {
        let start = self.pos;
        let (kind, len) = match (self.peek_at(0), self.peek_at(1), self.peek_at(2)) {
            (b'=', b'=', b'=') => (TokenKind::EqEqEq, 3),
            (b'!', b'=', b'=') => (TokenKind::NotEqEq, 3),
            (b'=', b'=', _) => (TokenKind::EqEq, 2),
            (b'!', b'=', _) => (TokenKind::NotEq, 2),
            (b'<', b'=', _) => (TokenKind::LessEq, 2),
            (b'>', b'=', _) => (TokenKind::GreaterEq, 2),
            (b'&', b'&', _) => (TokenKind::AmpAmp, 2),
            (b'|', b'|', _) => (TokenKind::PipePipe, 2),
            (b'+', b'=', _) => (TokenKind::PlusEq, 2),
            (b'-', b'=', _) => (TokenKind::MinusEq, 2),
            (b'*', b'=', _) => (TokenKind::StarEq, 2),
            (b'/', b'=', _) => (TokenKind::SlashEq, 2),
            (b'=', _, _) => (TokenKind::Eq, 1),
            (b'!', _, _) => (TokenKind::Bang, 1),
            (b'<', _, _) => (TokenKind::Less, 1),
            (b'>', _, _) => (TokenKind::Greater, 1),
            (b'+', _, _) => (TokenKind::Plus, 1),
            (b'-', _, _) => (TokenKind::Minus, 1),
            (b'*', _, _) => (TokenKind::Star, 1),
            (b'/', _, _) => (TokenKind::Slash, 1),
            (b'%', _, _) => (TokenKind::Percent, 1),
            (b'(', _, _) => (TokenKind::LParen, 1),
            (b')', _, _) => (TokenKind::RParen, 1),
            (b',', _, _) => (TokenKind::Comma, 1),
            (b';', _, _) => (TokenKind::Semicolon, 1),
            _ => {
                let ch = self.src[start..].chars().next().unwrap_or('\0');
                return Err(ExprError::UnexpectedChar { ch, offset: start });
            }
        };
        self.pos += len;
        Ok(kind)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
