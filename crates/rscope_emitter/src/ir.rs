//! The executable tree IR.

use rscope_ast::node::{BinaryOperator, UnaryOperator};
use rscope_binder::{Slot, VarRef};
use rscope_core::intern::InternedString;
use rscope_core::text::TextSpan;
use std::fmt;
use std::rc::Rc;

/// How a [`ScopeEntry`] is applied when its body starts running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// Declare the names into the active (global) instance, then seal them.
    Global,
    /// Build a fresh runtime-template instance over the active scope.
    Template,
    /// Build a catch instance over the active scope. Declarations made
    /// against it while it runs land in the enclosing variable scope.
    Catch,
    /// Eval program code. Strict code gets a fresh extensible eval child of
    /// the active scope; sloppy code declares its names into the caller's
    /// variable scope. Either way the names stay deletable.
    Eval,
}

/// A function declaration whose closure initializes a slot on entry.
#[derive(Debug, Clone)]
pub struct HoistedFunction {
    pub name: InternedString,
    /// Slot in the entry's name list. Only meaningful for `Template` entries;
    /// the other modes place the name wherever the target instance puts it.
    pub slot: Slot,
    pub code: Rc<FunctionCode>,
}

/// The scope-entry directive: everything needed to materialize one scope.
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    /// The descriptor's declared names, ordered by slot.
    pub names: Rc<[InternedString]>,
    pub hoisted: Vec<HoistedFunction>,
    pub mode: EntryMode,
}

/// Compiled code of one function, or of a script or eval program.
#[derive(Debug)]
pub struct FunctionCode {
    pub name: Option<InternedString>,
    /// Slot of each parameter, in parameter order.
    pub params: Vec<Slot>,
    /// Slot of a named function's own name.
    pub self_slot: Option<Slot>,
    /// Slot of `this`; `None` for program code.
    pub this_slot: Option<Slot>,
    /// Slot of `arguments`; `None` for program code.
    pub arguments_slot: Option<Slot>,
    pub entry: ScopeEntry,
    pub body: Vec<Stmt>,
    pub strict: bool,
    pub span: TextSpan,
}

impl FunctionCode {
    pub fn is_program(&self) -> bool {
        self.this_slot.is_none()
    }
}

/// A catch clause: its entry binds the exception in slot 0.
#[derive(Debug)]
pub struct CatchCode {
    pub entry: ScopeEntry,
    pub param_slot: Slot,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub enum Stmt {
    Expr(Expr),
    /// A `var` initializer. Runs like an expression statement but leaves the
    /// completion value alone.
    Init(Expr),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    Block(Vec<Stmt>),
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchCode>,
        finalizer: Option<Vec<Stmt>>,
    },
    Throw(Expr),
}

#[derive(Debug, Clone)]
pub enum Literal {
    Number(f64),
    String(Rc<str>),
    Boolean(bool),
    Null,
}

#[derive(Debug)]
pub enum Expr {
    Literal(Literal),
    Load(VarRef),
    Store(VarRef, Box<Expr>),
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// `typeof name`: never throws for an unbound name.
    TypeOfName(VarRef),
    TypeOf(Box<Expr>),
    DeleteName(VarRef),
    /// `delete` of a non-reference: evaluates the operand, yields `true`.
    DeleteValue(Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `eval(...)` where `eval` is not statically bound.
    DirectEval(Vec<Expr>),
    Function(Rc<FunctionCode>),
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryMode::Global => write!(f, "global"),
            EntryMode::Template => write!(f, "template"),
            EntryMode::Catch => write!(f, "catch"),
            EntryMode::Eval => write!(f, "eval"),
        }
    }
}
