//! The tree-walking executor.
//!
//! Every body starts by running its [`ScopeEntry`] directive against the
//! active scope. The scope it produces is installed with [`ScopeGuard`],
//! which puts the previous scope back when it is dropped, whichever way the
//! body exits.

use crate::error::RuntimeError;
use crate::heap::{ScopeHeap, Trace, DEFAULT_GC_THRESHOLD};
use crate::value::{Closure, ErrorKind, Value};
use rscope_ast::node::{BinaryOperator, UnaryOperator};
use rscope_binder::{ScopeError, ScopeId, Slot, VarRef};
use rscope_compiler::{CompileError, Compiler};
use rscope_core::intern::{InternedString, StringInterner};
use rscope_emitter::{CatchCode, EntryMode, Expr, FunctionCode, ScopeEntry, Stmt};
use rscope_options::CompilerOptions;
use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Nested calls allowed before a `RangeError` is thrown.
pub const MAX_CALL_DEPTH: u32 = 128;

/// Why evaluation stopped early.
enum Abrupt {
    /// A script-level exception; catchable.
    Throw(Value),
    Fatal(RuntimeError),
}

impl From<ScopeError> for Abrupt {
    fn from(error: ScopeError) -> Self {
        Abrupt::Fatal(RuntimeError::Scope(error))
    }
}

type Exec<T> = Result<T, Abrupt>;

/// How a statement completed.
enum Flow {
    /// Carries the statement's value, if it produced one.
    Normal(Option<Value>),
    Return(Value),
}

pub struct Interpreter {
    compiler: Compiler,
    heap: ScopeHeap,
    global: ScopeId,
    active: ScopeId,
    /// Strictness of the code currently running.
    strict: bool,
    /// Scopes displaced by in-progress entries, outermost first.
    saved: Vec<ScopeId>,
    /// Completion value of the last top-level statement.
    completion: Value,
    call_depth: u32,
}

/// Restores the displaced active scope and strictness on drop.
struct ScopeGuard<'r> {
    interpreter: &'r mut Interpreter,
    active: ScopeId,
    strict: bool,
}

impl Deref for ScopeGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interpreter
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interpreter
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.interpreter.saved.pop();
        self.interpreter.active = self.active;
        self.interpreter.strict = self.strict;
    }
}

impl Interpreter {
    pub fn new(options: CompilerOptions) -> Result<Self, RuntimeError> {
        Self::with_compiler(Compiler::new(options))
    }

    pub fn with_compiler(compiler: Compiler) -> Result<Self, RuntimeError> {
        let gc_threshold = compiler.options().gc_threshold.unwrap_or(DEFAULT_GC_THRESHOLD);
        let mut heap = ScopeHeap::new(compiler.limits(), gc_threshold);
        let global = heap.new_global_instance();

        // Both stay `undefined` for good.
        let well_known = compiler.interner().well_known();
        heap.declare(global, well_known.undefined)?;
        heap.declare(global, well_known.this)?;
        heap.seal(global)?;

        Ok(Self {
            compiler,
            heap,
            global,
            active: global,
            strict: false,
            saved: Vec::new(),
            completion: Value::Undefined,
            call_depth: 0,
        })
    }

    #[inline]
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    #[inline]
    pub fn interner(&self) -> &StringInterner {
        self.compiler.interner()
    }

    #[inline]
    pub fn heap(&self) -> &ScopeHeap {
        &self.heap
    }

    #[inline]
    pub fn global(&self) -> ScopeId {
        self.global
    }

    /// The value of a global binding, or `None` if there is none.
    pub fn global_value(&self, name: &str) -> Result<Option<Value>, RuntimeError> {
        let Some(name) = self.interner().get(name) else {
            return Ok(None);
        };
        Ok(self.heap.get_value(self.global, name)?)
    }

    /// Compile and run a script, returning its completion value.
    pub fn run_script(&mut self, file_name: &str, source: &str) -> Result<Value, RuntimeError> {
        let program = self.compiler.compile_script(file_name, source)?;
        self.execute(&program.code)
    }

    /// Run compiled script code against the global scope.
    pub fn execute(&mut self, code: &FunctionCode) -> Result<Value, RuntimeError> {
        self.completion = Value::Undefined;
        match self.run_program(code) {
            Ok(()) => Ok(self.completion.clone()),
            Err(Abrupt::Throw(value)) => Err(RuntimeError::Uncaught(value)),
            Err(Abrupt::Fatal(error)) => Err(error),
        }
    }

    /// Collect unreachable scope instances now. Returns how many were freed.
    pub fn collect_garbage(&mut self) -> usize {
        let mut roots: Vec<&dyn Trace> = Vec::with_capacity(self.saved.len() + 3);
        roots.push(&self.global);
        roots.push(&self.active);
        roots.push(&self.completion);
        roots.extend(self.saved.iter().map(|id| id as &dyn Trace));
        self.heap.collect(&roots)
    }

    fn run_program(&mut self, code: &FunctionCode) -> Exec<()> {
        let scope = self.materialize(&code.entry)?;
        let mut frame = self.enter(scope, code.strict);
        frame.init_hoisted(&code.entry, scope)?;
        for stmt in &code.body {
            if let Flow::Normal(Some(value)) = frame.exec(stmt)? {
                frame.completion = value;
            }
            if frame.heap.should_collect() {
                frame.collect_garbage();
            }
        }
        Ok(())
    }

    // ========================================================================
    // Scope entry
    // ========================================================================

    fn enter(&mut self, scope: ScopeId, strict: bool) -> ScopeGuard<'_> {
        let active = self.active;
        let was_strict = self.strict;
        self.saved.push(active);
        self.active = scope;
        self.strict = strict;
        ScopeGuard {
            interpreter: self,
            active,
            strict: was_strict,
        }
    }

    /// Run the declarative part of a scope-entry directive against the
    /// active scope. Returns the scope the body will run in.
    fn materialize(&mut self, entry: &ScopeEntry) -> Exec<ScopeId> {
        let scope = match entry.mode {
            EntryMode::Global => {
                let global = self.active;
                for &name in entry.names.iter() {
                    self.heap.declare(global, name)?;
                }
                global
            }
            EntryMode::Template => self.heap.new_runtime_template(Some(self.active), &entry.names)?,
            EntryMode::Catch => self.heap.new_catch_instance(Some(self.active), &entry.names)?,
            EntryMode::Eval => {
                let scope = self.heap.new_eval_instance(self.active)?;
                for &name in entry.names.iter() {
                    self.heap.declare(scope, name)?;
                }
                tracing::debug!(scope = %scope, parent = %self.active, "created eval scope");
                scope
            }
        };
        tracing::trace!(
            scope = %scope,
            mode = %entry.mode,
            names = entry.names.len(),
            "materialized scope"
        );
        Ok(scope)
    }

    /// Bind hoisted function declarations as closures over `scope`. Global
    /// entries are sealed afterwards.
    fn init_hoisted(&mut self, entry: &ScopeEntry, scope: ScopeId) -> Exec<()> {
        for hoisted in &entry.hoisted {
            let closure = Value::Function(Rc::new(Closure {
                code: Rc::clone(&hoisted.code),
                scope,
            }));
            match entry.mode {
                EntryMode::Template | EntryMode::Catch => self.heap.store(scope, hoisted.slot, closure)?,
                EntryMode::Global | EntryMode::Eval => self.heap.set_value(scope, hoisted.name, closure)?,
            }
        }
        if entry.mode == EntryMode::Global {
            self.heap.seal(scope)?;
        }
        Ok(())
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn call(&mut self, callee: Value, args: Vec<Value>) -> Exec<Value> {
        let type_name = callee.type_of();
        let Value::Function(closure) = callee else {
            return Err(throw(ErrorKind::TypeError, format!("{} is not a function", type_name)));
        };
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(throw(ErrorKind::RangeError, "Maximum call stack size exceeded"));
        }

        let code = Rc::clone(&closure.code);
        let mut outer = self.enter(closure.scope, code.strict);
        let scope = outer.materialize(&code.entry)?;
        let mut frame = outer.enter(scope, code.strict);
        frame.call_depth += 1;
        let result = frame.run_function(&closure, &code, scope, args);
        frame.call_depth -= 1;
        result
    }

    fn run_function(
        &mut self,
        closure: &Rc<Closure>,
        code: &FunctionCode,
        scope: ScopeId,
        args: Vec<Value>,
    ) -> Exec<Value> {
        // Later stores win: parameters shadow the function's own name and
        // `arguments`, hoisted declarations shadow parameters.
        if let Some(slot) = code.self_slot {
            self.heap.store(scope, slot, Value::Function(Rc::clone(closure)))?;
        }
        let args: Rc<[Value]> = args.into();
        if let Some(slot) = code.arguments_slot {
            self.heap.store(scope, slot, Value::Arguments(Rc::clone(&args)))?;
        }
        for (index, &slot) in code.params.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or_default();
            self.heap.store(scope, slot, value)?;
        }
        self.init_hoisted(&code.entry, scope)?;

        match self.exec_block(&code.body)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal(_) => Ok(Value::Undefined),
        }
    }

    /// `eval(...)` with no visible binding named `eval`. Strict eval code runs
    /// in a fresh eval scope below the active one. Sloppy eval code declares
    /// its variables and functions into the caller's variable scope and runs
    /// there.
    fn direct_eval(&mut self, args: Vec<Value>) -> Exec<Value> {
        let eval = self.interner().well_known().eval;
        if let Some((scope, slot)) = self.heap.lookup(self.active, eval)? {
            let callee = self.heap.load(scope, slot)?;
            return self.call(callee, args);
        }

        let source = match args.into_iter().next() {
            Some(Value::String(source)) => source,
            Some(other) => return Ok(other),
            None => return Ok(Value::Undefined),
        };
        let program = match self.compiler.compile_eval(&source, self.strict) {
            Ok(program) => program,
            Err(CompileError::Syntax(diagnostic)) => {
                return Err(throw(ErrorKind::SyntaxError, diagnostic.message_text));
            }
            Err(error) => return Err(Abrupt::Fatal(error.into())),
        };

        let code = program.code;
        let flow = if code.strict {
            let scope = self.materialize(&code.entry)?;
            let mut frame = self.enter(scope, code.strict);
            frame.init_hoisted(&code.entry, scope)?;
            frame.exec_block(&code.body)?
        } else {
            let scope = self.active;
            for &name in code.entry.names.iter() {
                self.heap.declare(scope, name)?;
            }
            tracing::debug!(scope = %scope, names = code.entry.names.len(), "injected eval declarations");
            self.init_hoisted(&code.entry, scope)?;
            self.exec_block(&code.body)?
        };
        match flow {
            Flow::Normal(value) => Ok(value.unwrap_or_default()),
            Flow::Return(value) => Ok(value),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec_block(&mut self, statements: &[Stmt]) -> Exec<Flow> {
        let mut completion = None;
        for stmt in statements {
            match self.exec(stmt)? {
                Flow::Normal(Some(value)) => completion = Some(value),
                Flow::Normal(None) => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal(completion))
    }

    fn exec(&mut self, stmt: &Stmt) -> Exec<Flow> {
        match stmt {
            Stmt::Expr(expr) => Ok(Flow::Normal(Some(self.eval(expr)?))),
            Stmt::Init(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal(None))
            }
            Stmt::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.exec(consequent)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate)
                } else {
                    Ok(Flow::Normal(None))
                }
            }
            Stmt::While { test, body } => {
                let mut completion = None;
                while self.eval(test)?.is_truthy() {
                    match self.exec(body)? {
                        Flow::Normal(Some(value)) => completion = Some(value),
                        Flow::Normal(None) => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal(completion))
            }
            Stmt::Block(statements) => self.exec_block(statements),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => self.exec_try(block, handler.as_ref(), finalizer.as_deref()),
            Stmt::Throw(expr) => {
                let value = self.eval(expr)?;
                Err(Abrupt::Throw(value))
            }
        }
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        handler: Option<&CatchCode>,
        finalizer: Option<&[Stmt]>,
    ) -> Exec<Flow> {
        let mut result = self.exec_block(block);
        if let Some(handler) = handler {
            result = match result {
                Err(Abrupt::Throw(exception)) => self.exec_catch(handler, exception),
                other => other,
            };
        }
        // Internal failures skip `finally`.
        if let Err(Abrupt::Fatal(_)) = result {
            return result;
        }
        if let Some(finalizer) = finalizer {
            if let flow @ Flow::Return(_) = self.exec_block(finalizer)? {
                return Ok(flow);
            }
        }
        result
    }

    fn exec_catch(&mut self, handler: &CatchCode, exception: Value) -> Exec<Flow> {
        let scope = self.materialize(&handler.entry)?;
        self.heap.store(scope, handler.param_slot, exception)?;
        let strict = self.strict;
        let mut frame = self.enter(scope, strict);
        frame.exec_block(&handler.body)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),
            Expr::Load(var_ref) => self.load(*var_ref),
            Expr::Store(var_ref, value) => {
                let value = self.eval(value)?;
                self.store(*var_ref, value.clone())?;
                Ok(value)
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOperator::Not => Value::Bool(!value.is_truthy()),
                    UnaryOperator::Minus => Value::Number(-value.to_number()),
                    UnaryOperator::Plus => Value::Number(value.to_number()),
                })
            }
            Expr::TypeOfName(var_ref) => {
                let type_name = match self.find(*var_ref)? {
                    Some((scope, slot)) => self.heap.load(scope, slot)?.type_of(),
                    None => "undefined",
                };
                Ok(Value::string(type_name))
            }
            Expr::TypeOf(operand) => Ok(Value::string(self.eval(operand)?.type_of())),
            Expr::DeleteName(var_ref) => self.delete_name(*var_ref),
            Expr::DeleteValue(operand) => {
                self.eval(operand)?;
                Ok(Value::Bool(true))
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let args = self.eval_args(args)?;
                self.call(callee, args)
            }
            Expr::DirectEval(args) => {
                let args = self.eval_args(args)?;
                self.direct_eval(args)
            }
            Expr::Function(code) => Ok(Value::Function(Rc::new(Closure {
                code: Rc::clone(code),
                scope: self.active,
            }))),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Exec<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    /// The scope and slot a reference currently denotes, if bound.
    fn find(&self, var_ref: VarRef) -> Exec<Option<(ScopeId, Slot)>> {
        match var_ref {
            VarRef::Static { depth, slot } => Ok(Some((self.heap.ancestor(self.active, depth)?, slot))),
            VarRef::Dynamic(name) => Ok(self.heap.lookup(self.active, name)?),
        }
    }

    fn load(&mut self, var_ref: VarRef) -> Exec<Value> {
        match self.find(var_ref)? {
            Some((scope, slot)) => Ok(self.heap.load(scope, slot)?),
            None => Err(self.reference_error(var_ref)),
        }
    }

    fn store(&mut self, var_ref: VarRef, value: Value) -> Exec<()> {
        match (self.find(var_ref)?, var_ref) {
            (Some((scope, slot)), _) => self.heap.store(scope, slot, value)?,
            (None, _) if self.strict => return Err(self.reference_error(var_ref)),
            (None, VarRef::Dynamic(name)) => {
                let global = self.global;
                self.heap.set_value(global, name, value)?;
            }
            (None, VarRef::Static { .. }) => {}
        }
        Ok(())
    }

    fn delete_name(&mut self, var_ref: VarRef) -> Exec<Value> {
        let deleted = match var_ref {
            // Declared bindings always sit in the immutable range.
            VarRef::Static { .. } => false,
            VarRef::Dynamic(name) => match self.heap.lookup(self.active, name)? {
                Some((scope, _)) => self.heap.delete(scope, name)?,
                None => true,
            },
        };
        if !deleted && self.strict {
            return Err(throw(ErrorKind::TypeError, "Cannot delete a declared binding"));
        }
        Ok(Value::Bool(deleted))
    }

    fn reference_error(&self, var_ref: VarRef) -> Abrupt {
        let message = match var_ref {
            VarRef::Dynamic(name) => format!("{} is not defined", self.name(name)),
            VarRef::Static { .. } => "binding is not defined".to_string(),
        };
        throw(ErrorKind::ReferenceError, message)
    }

    fn name(&self, name: InternedString) -> &str {
        self.interner().resolve(name)
    }

    fn binary(&mut self, op: BinaryOperator, left: &Expr, right: &Expr) -> Exec<Value> {
        use BinaryOperator as B;
        let lhs = self.eval(left)?;
        match op {
            B::LogicalAnd if !lhs.is_truthy() => return Ok(lhs),
            B::LogicalOr if lhs.is_truthy() => return Ok(lhs),
            B::LogicalAnd | B::LogicalOr => return self.eval(right),
            _ => {}
        }
        let rhs = self.eval(right)?;
        Ok(match op {
            B::Add => add(&lhs, &rhs),
            B::Subtract => Value::Number(lhs.to_number() - rhs.to_number()),
            B::Multiply => Value::Number(lhs.to_number() * rhs.to_number()),
            B::Divide => Value::Number(lhs.to_number() / rhs.to_number()),
            B::Remainder => Value::Number(lhs.to_number() % rhs.to_number()),
            B::LessThan => Value::Bool(compare(&lhs, &rhs) == Some(Ordering::Less)),
            B::GreaterThan => Value::Bool(compare(&lhs, &rhs) == Some(Ordering::Greater)),
            B::LessThanEquals => Value::Bool(matches!(
                compare(&lhs, &rhs),
                Some(Ordering::Less | Ordering::Equal)
            )),
            B::GreaterThanEquals => Value::Bool(matches!(
                compare(&lhs, &rhs),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            B::LooseEquals => Value::Bool(lhs.loose_equals(&rhs)),
            B::LooseNotEquals => Value::Bool(!lhs.loose_equals(&rhs)),
            B::StrictEquals => Value::Bool(lhs.strict_equals(&rhs)),
            B::StrictNotEquals => Value::Bool(!lhs.strict_equals(&rhs)),
            B::LogicalAnd | B::LogicalOr => rhs,
        })
    }
}

fn throw(kind: ErrorKind, message: impl Into<String>) -> Abrupt {
    Abrupt::Throw(Value::error(kind, message))
}

fn add(lhs: &Value, rhs: &Value) -> Value {
    match (lhs, rhs) {
        (Value::String(_), _) | (_, Value::String(_)) => {
            Value::String(Rc::from(format!("{}{}", lhs, rhs)))
        }
        _ => Value::Number(lhs.to_number() + rhs.to_number()),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => lhs.to_number().partial_cmp(&rhs.to_number()),
    }
}
