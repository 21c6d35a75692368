//! Tokenizer for the search/filter expression grammar.
//!
//! Mirrors `original_source/src/lex.c`'s scanning rules: base detection by
//! prefix, longest-match on multi-character operators, and EOL on
//! `\0`/`\n`/`\r`. The octal scanner here rejects `8`/`9`, fixing the bug the
//! original accepted (see spec Open Questions).

use crate::error::LexError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    Eol,
    LeftParen,
    RightParen,
    Integer(i64),
    UInteger(u64),
    Float(f64),
    Identifier(&'a str),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Xor,
    Or,
    Shl,
    Shr,
    Not,
    Compl,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    AndCond,
    OrCond,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
}

/// A cursor over the source string. Tokens borrow identifier slices from it.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    /// The unconsumed remainder of the source, used by the parser's
    /// two-token cast-type lookahead.
    pub fn remainder(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> char {
        self.src[self.pos..].chars().next().unwrap_or('\0')
    }

    fn peek_at(&self, offset: usize) -> char {
        self.src[self.pos..].chars().nth(offset).unwrap_or('\0')
    }

    fn bump(&mut self) -> char {
        let c = self.peek();
        if c != '\0' {
            self.pos += c.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_whitespace() && !matches!(self.peek(), '\n' | '\r') {
            self.bump();
        }
    }

    /// Scan the next token and advance past it (and any leading whitespace).
    pub fn next(&mut self) -> Result<Token<'a>, LexError> {
        self.skip_whitespace();
        let start = self.pos;
        let c = self.bump();

        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '0'..='9' | '.' => {
                self.pos = start;
                self.scan_number()?
            }
            '+' => TokenKind::Add,
            '-' => TokenKind::Sub,
            '*' => TokenKind::Mul,
            '/' => TokenKind::Div,
            '%' => TokenKind::Mod,
            '!' => {
                if self.peek() == '=' {
                    self.bump();
                    TokenKind::Neq
                } else {
                    TokenKind::Not
                }
            }
            '~' => TokenKind::Compl,
            '^' => TokenKind::Xor,
            '|' => {
                if self.peek() == '|' {
                    self.bump();
                    TokenKind::OrCond
                } else {
                    TokenKind::Or
                }
            }
            '&' => {
                if self.peek() == '&' {
                    self.bump();
                    TokenKind::AndCond
                } else {
                    TokenKind::And
                }
            }
            '=' => {
                if self.bump() != '=' {
                    return Err(LexError::UnterminatedAssign);
                }
                TokenKind::Eq
            }
            '<' => {
                if self.peek() == '=' {
                    self.bump();
                    TokenKind::Le
                } else if self.peek() == '<' {
                    self.bump();
                    TokenKind::Shl
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == '=' {
                    self.bump();
                    TokenKind::Ge
                } else if self.peek() == '>' {
                    self.bump();
                    TokenKind::Shr
                } else {
                    TokenKind::Gt
                }
            }
            '\0' | '\n' | '\r' => TokenKind::Eol,
            c if c.is_alphabetic() => {
                while self.peek().is_alphanumeric() || self.peek() == '_' {
                    self.bump();
                }
                TokenKind::Identifier(&self.src[start..self.pos])
            }
            c => return Err(LexError::UnexpectedChar(c)),
        };

        Ok(Token { kind })
    }

    /// Detect base by prefix, then scan digits for that base; fractional and
    /// exponent parts are decimal-only. A trailing `u`/`U` marks an unsigned
    /// integer only when there is no fractional/exponent part.
    fn scan_number(&mut self) -> Result<TokenKind<'a>, LexError> {
        let start = self.pos;

        if self.peek() == '0' && matches!(self.peek_at(1), 'x' | 'X') {
            self.bump();
            self.bump();
            if !self.peek().is_ascii_hexdigit() {
                return Err(LexError::InvalidNumber);
            }
            while self.peek().is_ascii_hexdigit() {
                self.bump();
            }
            let digits = &self.src[start + 2..self.pos];
            let val = i64::from_str_radix(digits, 16).map_err(|_| LexError::InvalidNumber)?;
            return self.finish_integer(val as u64);
        }

        if self.peek() == '0' && self.peek_at(1).is_ascii_digit() {
            self.bump();
            while self.peek().is_ascii_digit() {
                if matches!(self.peek(), '8' | '9') {
                    return Err(LexError::InvalidNumber);
                }
                self.bump();
            }
            let digits = &self.src[start + 1..self.pos];
            let val = if digits.is_empty() {
                0
            } else {
                i64::from_str_radix(digits, 8).map_err(|_| LexError::InvalidNumber)?
            };
            return self.finish_integer(val as u64);
        }

        // Decimal integer, float, or leading-dot float.
        let mut has_point = self.peek() == '.';
        if has_point {
            self.bump();
        }
        let digits_start = self.pos;
        while self.peek().is_ascii_digit() {
            self.bump();
        }
        if !has_point && self.peek() == '.' {
            has_point = true;
            self.bump();
            while self.peek().is_ascii_digit() {
                self.bump();
            }
        }
        if self.pos == digits_start && !has_point {
            return Err(LexError::InvalidNumber);
        }

        let mut has_exponent = false;
        if matches!(self.peek(), 'e' | 'E') {
            let save = self.pos;
            self.bump();
            if matches!(self.peek(), '+' | '-') {
                self.bump();
            }
            if self.peek().is_ascii_digit() {
                has_exponent = true;
                while self.peek().is_ascii_digit() {
                    self.bump();
                }
            } else {
                self.pos = save;
            }
        }

        if has_point || has_exponent {
            let text = &self.src[start..self.pos];
            let v: f64 = text.parse().map_err(|_| LexError::InvalidNumber)?;
            if self.peek().is_alphabetic() {
                return Err(LexError::InvalidNumber);
            }
            Ok(TokenKind::Float(v))
        } else {
            let text = &self.src[start..self.pos];
            let v: i64 = text.parse().map_err(|_| LexError::InvalidNumber)?;
            self.finish_integer(v as u64)
        }
    }

    fn finish_integer(&mut self, val: u64) -> Result<TokenKind<'a>, LexError> {
        if matches!(self.peek(), 'u' | 'U') {
            self.bump();
            if self.peek().is_alphabetic() {
                return Err(LexError::InvalidNumber);
            }
            Ok(TokenKind::UInteger(val))
        } else if self.peek().is_alphabetic() {
            Err(LexError::InvalidNumber)
        } else {
            Ok(TokenKind::Integer(val as i64))
        }
    }
}
