//! FILENAME: core/cube-expr/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into an AST.
//! CONTEXT: This is the second stage of the parsing pipeline. It takes tokens
//! from the Lexer and builds a Program that the cube engine evaluates.
//!
//! GRAMMAR:
//!   program        --> statement ( ";" statement )* ";"?
//!   statement      --> expression ( "=" expression )?
//!   expression     --> or
//!   or             --> and ( "||" and )*
//!   and            --> equality ( "&&" equality )*
//!   equality       --> comparison ( ("==" | "!=") comparison )*
//!   comparison     --> additive ( ("<" | ">" | "<=" | ">=") additive )*
//!   additive       --> multiplicative ( ("+" | "-") multiplicative )*
//!   multiplicative --> unary ( ("*" | "/" | "%") unary )*
//!   unary          --> ("-" | "!") unary | postfix
//!   postfix        --> primary ( "." IDENTIFIER | "[" expression "]" )*
//!   primary        --> INTEGER | NUMBER | STRING | BOOLEAN | NULL
//!                    | IDENTIFIER ( "(" arguments? ")" )?
//!                    | "(" expression ")" | list | map
//!   list           --> "[" ( expression ( "," expression )* )? "]"
//!   map            --> "{" ( key ":" expression ( "," key ":" expression )* )? "}"
//!   key            --> IDENTIFIER | STRING

use crate::ast::{BinaryOperator, Expression, Program, Statement, UnaryOperator, Value};
use crate::lexer::Lexer;
use crate::token::Token;

/// Parser errors with descriptive messages.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// The Parser struct holds the lexer and current token state.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
}

impl Parser {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
        }
    }

    /// Parses the entire input as a program.
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();

        loop {
            // Tolerate empty statements (";;" and a trailing ";")
            while self.current_token == Token::Semicolon {
                self.advance();
            }
            if self.current_token == Token::EOF {
                break;
            }

            statements.push(self.parse_statement()?);

            match &self.current_token {
                Token::Semicolon => continue,
                Token::EOF => break,
                other => {
                    return Err(ParseError::new(format!(
                        "Unexpected token after statement: {}",
                        other
                    )))
                }
            }
        }

        if statements.is_empty() {
            return Err(ParseError::new("Empty expression"));
        }

        Ok(Program { statements })
    }

    /// Parses the entire input as a single expression.
    pub fn parse_single(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::EOF {
            return Err(ParseError::new("Empty expression"));
        }

        let expr = self.parse_expression()?;

        if self.current_token != Token::EOF {
            return Err(ParseError::new(format!(
                "Unexpected token after expression: {}",
                self.current_token
            )));
        }

        Ok(expr)
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// Checks if the current token matches the expected token.
    /// If it matches, advances and returns Ok. Otherwise returns an error.
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "Expected {}, found {}",
                expected, self.current_token
            )))
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let expr = self.parse_expression()?;

        if self.current_token == Token::Assign {
            self.advance();
            match expr {
                Expression::Variable(_) | Expression::Member { .. } | Expression::Index { .. } => {
                    let value = self.parse_expression()?;
                    Ok(Statement::Assign {
                        target: expr,
                        value,
                    })
                }
                _ => Err(ParseError::new("Invalid assignment target")),
            }
        } else {
            Ok(Statement::Expression(expr))
        }
    }

    /// Entry point for expression parsing.
    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or()
    }

    /// Builds a left-associative chain of binary operations.
    fn parse_binary_chain(
        &mut self,
        next: fn(&mut Self) -> ParseResult<Expression>,
        op_for: fn(&Token) -> Option<BinaryOperator>,
    ) -> ParseResult<Expression> {
        let mut left = next(self)?;

        while let Some(op) = op_for(&self.current_token) {
            self.advance();
            let right = next(self)?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_and, |token| match token {
            Token::OrOr => Some(BinaryOperator::Or),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_equality, |token| match token {
            Token::AndAnd => Some(BinaryOperator::And),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_comparison, |token| match token {
            Token::EqualEqual => Some(BinaryOperator::Equal),
            Token::NotEqual => Some(BinaryOperator::NotEqual),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_additive, |token| match token {
            Token::LessThan => Some(BinaryOperator::LessThan),
            Token::GreaterThan => Some(BinaryOperator::GreaterThan),
            Token::LessEqual => Some(BinaryOperator::LessEqual),
            Token::GreaterEqual => Some(BinaryOperator::GreaterEqual),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_multiplicative, |token| match token {
            Token::Plus => Some(BinaryOperator::Add),
            Token::Minus => Some(BinaryOperator::Subtract),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_unary, |token| match token {
            Token::Asterisk => Some(BinaryOperator::Multiply),
            Token::Slash => Some(BinaryOperator::Divide),
            Token::Percent => Some(BinaryOperator::Modulo),
            _ => None,
        })
    }

    /// Parses unary expressions (negation, logical not).
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let op = match self.current_token {
            Token::Minus => UnaryOperator::Negate,
            Token::Bang => UnaryOperator::Not,
            _ => return self.parse_postfix(),
        };

        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    /// Parses member and index access chains: a.b[c].d
    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current_token {
                Token::Dot => {
                    self.advance();
                    let name = match self.current_token.clone() {
                        Token::Identifier(name) => name,
                        other => {
                            return Err(ParseError::new(format!(
                                "Expected member name after '.', found {}",
                                other
                            )))
                        }
                    };
                    self.advance();
                    expr = Expression::Member {
                        object: Box::new(expr),
                        name,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expression::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Parses primary expressions (literals, variables, calls, collections, parentheses).
    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current_token.clone() {
            Token::Integer(n) => {
                self.advance();
                Ok(Expression::Literal(Value::Integer(n)))
            }

            Token::Number(n) => {
                self.advance();
                Ok(Expression::Literal(Value::Number(n)))
            }

            Token::String(s) => {
                self.advance();
                Ok(Expression::Literal(Value::String(s)))
            }

            Token::Boolean(b) => {
                self.advance();
                Ok(Expression::Literal(Value::Boolean(b)))
            }

            Token::Null => {
                self.advance();
                Ok(Expression::Literal(Value::Null))
            }

            Token::Identifier(name) => {
                self.advance();

                if self.current_token == Token::LParen {
                    return self.parse_function_call(name);
                }

                Ok(Expression::Variable(name))
            }

            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            Token::LBracket => self.parse_list(),

            Token::LBrace => self.parse_map(),

            Token::EOF => Err(ParseError::new("Unexpected end of expression")),

            Token::Illegal(ch) => Err(ParseError::new(format!("Illegal character: {}", ch))),

            token => Err(ParseError::new(format!("Unexpected token: {}", token))),
        }
    }

    /// Parses a function call like if(a, b, c).
    fn parse_function_call(&mut self, name: String) -> ParseResult<Expression> {
        let args = self.parse_delimited(Token::RParen, Self::parse_expression)?;
        Ok(Expression::FunctionCall {
            name: name.to_lowercase(),
            args,
        })
    }

    fn parse_list(&mut self) -> ParseResult<Expression> {
        let items = self.parse_delimited(Token::RBracket, Self::parse_expression)?;
        Ok(Expression::List(items))
    }

    fn parse_map(&mut self) -> ParseResult<Expression> {
        let entries = self.parse_delimited(Token::RBrace, Self::parse_map_entry)?;
        Ok(Expression::Map(entries))
    }

    fn parse_map_entry(&mut self) -> ParseResult<(String, Expression)> {
        let key = match self.current_token.clone() {
            Token::Identifier(key) | Token::String(key) => key,
            other => {
                return Err(ParseError::new(format!(
                    "Expected map key, found {}",
                    other
                )))
            }
        };
        self.advance();
        self.expect(Token::Colon)?;
        let value = self.parse_expression()?;
        Ok((key, value))
    }

    /// Parses `item ("," item)*` after an opening delimiter, up to and including `close`.
    fn parse_delimited<T>(
        &mut self,
        close: Token,
        item: fn(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        // Consume the opening delimiter
        self.advance();

        let mut items = Vec::new();

        if self.current_token == close {
            self.advance();
            return Ok(items);
        }

        items.push(item(self)?);

        while self.current_token == Token::Comma {
            self.advance();
            // Allow a trailing comma
            if self.current_token == close {
                break;
            }
            items.push(item(self)?);
        }

        self.expect(close)?;

        Ok(items)
    }
}

/// Convenience function to parse a program (one or more statements).
pub fn parse(input: &str) -> ParseResult<Program> {
    let mut parser = Parser::new(input);
    parser.parse_program()
}

/// Convenience function to parse a single expression.
pub fn parse_expression(input: &str) -> ParseResult<Expression> {
    let mut parser = Parser::new(input);
    parser.parse_single()
}
