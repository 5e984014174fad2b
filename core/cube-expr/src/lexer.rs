//! FILENAME: core/cube-expr/src/lexer.rs
//! PURPOSE: Scans a raw expression string and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the parsing pipeline. It handles
//! whitespace and comment skipping, number parsing, string literals with
//! escapes, and multi-character operators like <= and &&.
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / % ( ) [ ] { } , : . ; < > ! =
//! - Multi char: == != <= >= && ||
//! - Strings: 'single' or "double" quoted, with \n \t \\ \' \" escapes
//! - Line comments: // to end of line

use crate::token::Token;

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    /// Consumes the next char if it equals `expected`.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        match self.bump() {
            Some('+') => Token::Plus,
            Some('-') => Token::Minus,
            Some('*') => Token::Asterisk,
            Some('/') => Token::Slash,
            Some('%') => Token::Percent,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some('[') => Token::LBracket,
            Some(']') => Token::RBracket,
            Some('{') => Token::LBrace,
            Some('}') => Token::RBrace,
            Some(',') => Token::Comma,
            Some(':') => Token::Colon,
            Some('.') => Token::Dot,
            Some(';') => Token::Semicolon,

            Some('=') => {
                if self.eat('=') {
                    Token::EqualEqual
                } else {
                    Token::Assign
                }
            }
            Some('!') => {
                if self.eat('=') {
                    Token::NotEqual
                } else {
                    Token::Bang
                }
            }
            Some('<') => {
                if self.eat('=') {
                    Token::LessEqual
                } else {
                    Token::LessThan
                }
            }
            Some('>') => {
                if self.eat('=') {
                    Token::GreaterEqual
                } else {
                    Token::GreaterThan
                }
            }
            Some('&') => {
                if self.eat('&') {
                    Token::AndAnd
                } else {
                    Token::Illegal('&')
                }
            }
            Some('|') => {
                if self.eat('|') {
                    Token::OrOr
                } else {
                    Token::Illegal('|')
                }
            }

            Some(quote @ ('"' | '\'')) => self.read_string(quote),

            Some(ch) if ch.is_ascii_digit() => self.read_number(ch),

            Some(ch) if is_letter(ch) => self.read_identifier(ch),

            None => Token::EOF,

            Some(ch) => Token::Illegal(ch),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some(ch) = self.peek() {
                if !ch.is_whitespace() {
                    break;
                }
                self.pos += 1;
            }

            if self.peek() == Some('/') && self.peek_next() == Some('/') {
                while let Some(ch) = self.bump() {
                    if ch == '\n' {
                        break;
                    }
                }
                continue;
            }
            break;
        }
    }

    fn read_string(&mut self, quote: char) -> Token {
        let mut result = String::new();
        while let Some(ch) = self.bump() {
            if ch == quote {
                return Token::String(result);
            }
            if ch == '\\' {
                match self.bump() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('r') => result.push('\r'),
                    Some(other) => result.push(other),
                    None => break,
                }
            } else {
                result.push(ch);
            }
        }
        // Unterminated string literal
        Token::Illegal(quote)
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut is_float = false;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.pos += 1;
            } else if ch == '.'
                && !is_float
                && self.peek_next().is_some_and(|next| next.is_ascii_digit())
            {
                // Only a dot followed by a digit continues the number; `1.foo` stays member access.
                is_float = true;
                number_str.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }

        if is_float {
            match number_str.parse::<f64>() {
                Ok(n) => Token::Number(n),
                Err(_) => Token::Illegal(first_char),
            }
        } else {
            match number_str.parse::<i64>() {
                Ok(n) => Token::Integer(n),
                // Too large for i64, keep it as a float
                Err(_) => number_str
                    .parse::<f64>()
                    .map(Token::Number)
                    .unwrap_or(Token::Illegal(first_char)),
            }
        }
    }

    fn read_identifier(&mut self, first_char: char) -> Token {
        let mut ident = String::from(first_char);

        while let Some(ch) = self.peek() {
            if is_letter(ch) || ch.is_ascii_digit() {
                ident.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }

        match ident.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            _ => Token::Identifier(ident),
        }
    }
}

/// Returns true if `ch` can start an identifier.
fn is_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}
