//! FILENAME: core/cube-expr/src/lib.rs
//! PURPOSE: Library root for the cube expression language.
//! CONTEXT: This module exposes the lexer, parser, and AST components
//! needed to convert rule conditions and expression cells into trees
//! that the cube engine evaluates.
//!
//! PIPELINE: Source String --> Lexer --> Tokens --> Parser --> Program --> Evaluator
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /, %
//! - Comparison: ==, !=, <, >, <=, >=
//! - Logic: &&, ||, !
//! - Member access: input.age, output.total
//! - Index access: input['age'], list[0]
//! - Lists and maps: [1, 2], {state: 'OH'}
//! - Function calls: if(a, b, c), jump({rules: 'start'})
//! - Statements separated by ';' with assignment: output.x = 1; output.x + 1

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

#[cfg(test)]
mod tests;

pub use ast::{BinaryOperator, Expression, Program, Statement, UnaryOperator, Value};
pub use lexer::Lexer;
pub use parser::{parse, parse_expression, ParseError, ParseResult, Parser};
pub use token::Token;
