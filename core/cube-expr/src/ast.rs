//! FILENAME: core/cube-expr/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for cell expressions.
//! CONTEXT: After the Lexer tokenizes an expression string, the Parser converts
//! those tokens into this tree structure. The cube engine's evaluator then
//! walks the tree against an execution context (input coordinate, output map).
//!
//! SUPPORTED EXPRESSIONS:
//! - Literals: integers, decimals, strings, booleans, null
//! - Collections: [1, 2, 3] and {state: 'OH', age: 30}
//! - Variables: input, output, locals
//! - Member and index access: input.age, output['total'], list[0]
//! - Binary operations: + - * / % == != < > <= >= && ||
//! - Unary operations: - (negation), ! (logical not)
//! - Function calls: if(a, b, c), stop(), jump({rules: 'start'}), at({age: 5})
//! - Statements: `output.total = 10; output.total * 2`

/// A parsed program: one or more statements separated by ';'.
/// The value of the last statement is the value of the program.
#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A single statement in a program.
#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    /// An expression whose value becomes the current program value.
    Expression(Expression),

    /// An assignment: `target = value`. The target must be a variable,
    /// a member access or an index access.
    Assign { target: Expression, value: Expression },
}

/// Represents a parsed expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A literal value: number, string, boolean or null.
    Literal(Value),

    /// A list literal: [a, b, c].
    List(Vec<Expression>),

    /// A map literal: {key: value, 'other key': value}.
    /// Entries keep source order.
    Map(Vec<(String, Expression)>),

    /// A bare identifier such as `input`, `output` or a local variable.
    Variable(String),

    /// Member access: object.name
    Member { object: Box<Expression>, name: String },

    /// Index access: object[index]
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },

    /// A binary operation: left op right (e.g., 5 + 3, input.age > 10).
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand (e.g., -5, !done).
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// A function call like if(input.age > 18, 'adult', 'minor').
    /// Function names are stored lowercase.
    FunctionCall { name: String, args: Vec<Expression> },
}

/// Literal values that can appear in expressions.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Integer(i64),
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// Binary operators for expressions.
/// Listed in order of precedence groups (logical or is lowest).
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    Or,  // ||
    And, // &&

    Equal,    // ==
    NotEqual, // !=

    LessThan,     // <
    GreaterThan,  // >
    LessEqual,    // <=
    GreaterEqual, // >=

    Add,      // +
    Subtract, // -

    Multiply, // *
    Divide,   // /
    Modulo,   // %
}

/// Unary operators.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    Negate, // -
    Not,    // !
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Or => write!(f, "||"),
            BinaryOperator::And => write!(f, "&&"),
            BinaryOperator::Equal => write!(f, "=="),
            BinaryOperator::NotEqual => write!(f, "!="),
            BinaryOperator::LessThan => write!(f, "<"),
            BinaryOperator::GreaterThan => write!(f, ">"),
            BinaryOperator::LessEqual => write!(f, "<="),
            BinaryOperator::GreaterEqual => write!(f, ">="),
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
            BinaryOperator::Modulo => write!(f, "%"),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Not => write!(f, "!"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}
