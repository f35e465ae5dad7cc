use std::fmt;

use crate::error::CompileError;
use crate::span::Location;

pub const KEYWORDS: &[&str] = &["echo", "let", "while", "if", "else", "end", "proc", "export"];

/// Ordered so that two-character operators are tried before their prefixes.
pub const OPERATORS: &[&str] = &[
    "<=", ">=", "==", "<<", ">>", "&&", "||",
    "+", "-", "*", "/", "%", "<", ">", "=",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Number,
    Identifier,
    Operator,
    OpenParen,
    CloseParen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, location: Location) -> Self {
        Self { kind, value: value.into(), location }
    }

    pub fn is(&self, kind: TokenKind, value: &str) -> bool {
        self.kind == kind && self.value == value
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.is(TokenKind::Keyword, keyword)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.value)
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek(0) {
            let location = self.location();

            if ch == '/' && self.peek(1) == Some('/') {
                self.skip_comment();
            } else if ch.is_ascii_alphabetic() {
                tokens.push(self.scan_word(location));
            } else if let Some(number) = self.scan_number(location)? {
                tokens.push(number);
            } else if ch == '(' {
                self.bump();
                tokens.push(Token::new(TokenKind::OpenParen, "(", location));
            } else if ch == ')' {
                self.bump();
                tokens.push(Token::new(TokenKind::CloseParen, ")", location));
            } else if let Some(op) = self.match_operator() {
                for _ in 0..op.len() {
                    self.bump();
                }
                tokens.push(Token::new(TokenKind::Operator, op, location));
            } else if ch.is_whitespace() {
                self.bump();
            } else {
                return Err(CompileError::lexical(
                    location,
                    format!("Unexpected character: '{}'", ch),
                ));
            }
        }

        Ok(tokens)
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek_digit(&self, offset: usize) -> bool {
        self.peek(offset).is_some_and(|c| c.is_ascii_digit())
    }

    fn consume_digits(&mut self, buf: &mut String) {
        while let Some(ch) = self.peek(0) {
            if !ch.is_ascii_digit() {
                break;
            }
            buf.push(ch);
            self.bump();
        }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek(0) {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    /// Letters only. The whole run is a keyword when it equals one, so
    /// `lettuce` stays an identifier.
    fn scan_word(&mut self, location: Location) -> Token {
        let mut word = String::new();
        while let Some(ch) = self.peek(0) {
            if !ch.is_ascii_alphabetic() {
                break;
            }
            word.push(ch);
            self.bump();
        }

        let kind = if KEYWORDS.contains(&word.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, word, location)
    }

    /// `-?digits(.digits)?(e-?digits)?`
    fn scan_number(&mut self, location: Location) -> Result<Option<Token>, CompileError> {
        let signed = self.peek(0) == Some('-');
        let start = if signed { 1 } else { 0 };
        if !self.peek_digit(start) {
            return Ok(None);
        }

        let mut text = String::new();
        if signed {
            text.push('-');
            self.bump();
        }
        self.consume_digits(&mut text);

        if self.peek(0) == Some('.') && self.peek_digit(1) {
            text.push('.');
            self.bump();
            self.consume_digits(&mut text);
        }

        if self.peek(0) == Some('e') {
            let exponent_sign = self.peek(1) == Some('-');
            let digits_at = if exponent_sign { 2 } else { 1 };
            if self.peek_digit(digits_at) {
                text.push('e');
                self.bump();
                if exponent_sign {
                    text.push('-');
                    self.bump();
                }
                self.consume_digits(&mut text);
            }
        }

        if text.parse::<f32>().is_err() {
            return Err(CompileError::lexical(
                location,
                format!("Invalid number literal: {}", text),
            ));
        }

        Ok(Some(Token::new(TokenKind::Number, text, location)))
    }

    fn match_operator(&self) -> Option<&'static str> {
        OPERATORS.iter().copied().find(|op| {
            op.chars()
                .enumerate()
                .all(|(i, expected)| self.peek(i) == Some(expected))
        })
    }
}
