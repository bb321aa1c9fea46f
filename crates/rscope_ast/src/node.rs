//! AST node definitions.
//!
//! Nodes reference child nodes via arena-allocated references. Only the
//! constructs that affect scoping are represented: variable and function
//! declarations, function expressions, catch clauses, identifier references,
//! `delete`/`typeof` on names, and direct `eval` calls (an ordinary call whose
//! callee is the identifier `eval`).

use crate::types::NodeId;
use rscope_core::intern::InternedString;
use rscope_core::text::TextSpan;

/// A list of nodes, allocated in the arena.
pub type NodeList<'a, T> = &'a [T];

// ============================================================================
// Program
// ============================================================================

/// The top level of a script or of a string handed to `eval`.
#[derive(Debug)]
pub struct Program<'a> {
    pub id: NodeId,
    pub file_name: String,
    pub statements: NodeList<'a, Statement<'a>>,
    /// Set by a leading `"use strict"` directive.
    pub strict: bool,
    pub span: TextSpan,
}

// ============================================================================
// Identifier
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Identifier {
    pub id: NodeId,
    pub name: InternedString,
    pub span: TextSpan,
}

// ============================================================================
// Functions
// ============================================================================

/// A function declaration or expression.
#[derive(Debug)]
pub struct Function<'a> {
    pub id: NodeId,
    /// `None` for anonymous function expressions.
    pub name: Option<Identifier>,
    pub params: NodeList<'a, Identifier>,
    pub body: NodeList<'a, Statement<'a>>,
    /// Strict either through its own directive or an enclosing strict context.
    pub strict: bool,
    pub span: TextSpan,
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug)]
pub enum Statement<'a> {
    Var(NodeList<'a, VariableDeclarator<'a>>),
    Function(&'a Function<'a>),
    Expression(&'a Expression<'a>),
    Return(Option<&'a Expression<'a>>, TextSpan),
    If(&'a IfStatement<'a>),
    While(&'a WhileStatement<'a>),
    Block(NodeList<'a, Statement<'a>>),
    Try(&'a TryStatement<'a>),
    Throw(&'a Expression<'a>),
    Empty,
}

#[derive(Debug)]
pub struct VariableDeclarator<'a> {
    pub name: Identifier,
    pub init: Option<&'a Expression<'a>>,
}

#[derive(Debug)]
pub struct IfStatement<'a> {
    pub test: &'a Expression<'a>,
    pub consequent: &'a Statement<'a>,
    pub alternate: Option<&'a Statement<'a>>,
}

#[derive(Debug)]
pub struct WhileStatement<'a> {
    pub test: &'a Expression<'a>,
    pub body: &'a Statement<'a>,
}

#[derive(Debug)]
pub struct TryStatement<'a> {
    pub block: NodeList<'a, Statement<'a>>,
    pub handler: Option<CatchClause<'a>>,
    pub finalizer: Option<NodeList<'a, Statement<'a>>>,
}

/// `catch (param) { body }`. Introduces a single-binding scope.
#[derive(Debug)]
pub struct CatchClause<'a> {
    pub id: NodeId,
    pub param: Identifier,
    pub body: NodeList<'a, Statement<'a>>,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    LessThan,
    GreaterThan,
    LessThanEquals,
    GreaterThanEquals,
    LooseEquals,
    LooseNotEquals,
    StrictEquals,
    StrictNotEquals,
    LogicalAnd,
    LogicalOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

#[derive(Debug)]
pub enum Expression<'a> {
    Number(f64),
    String(&'a str),
    Boolean(bool),
    Null,
    /// `this`, resolved through the scope chain like any other name.
    This(Identifier),
    Identifier(Identifier),
    Assign {
        target: Identifier,
        value: &'a Expression<'a>,
    },
    Binary {
        op: BinaryOperator,
        left: &'a Expression<'a>,
        right: &'a Expression<'a>,
    },
    Unary {
        op: UnaryOperator,
        operand: &'a Expression<'a>,
    },
    TypeOf(&'a Expression<'a>),
    Delete(&'a Expression<'a>, TextSpan),
    Call {
        callee: &'a Expression<'a>,
        args: NodeList<'a, &'a Expression<'a>>,
        span: TextSpan,
    },
    Function(&'a Function<'a>),
}

impl<'a> Expression<'a> {
    /// The identifier if this expression is a bare name reference.
    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Expression::Identifier(id) => Some(id),
            _ => None,
        }
    }
}
