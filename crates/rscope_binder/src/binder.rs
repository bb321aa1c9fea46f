//! The binder implementation.
//!
//! Each body (script, eval program, or function) is bound in two passes:
//! - a declaration pass that hoists `var` and function declarations into the
//!   body's descriptor and creates catch descriptors, declaring through them
//!   so that catch forwarding applies;
//! - a resolution pass that fixes the addressing of every identifier
//!   occurrence and binds nested functions.
//!
//! Nested functions are bound during their parent's resolution pass, after
//! every declaration of the parent is known.

use crate::arena::{ScopeId, ScopeLimits};
use crate::error::ScopeError;
use crate::resolve::{resolve, VarRef};
use crate::DescriptorArena;
use rscope_ast::node::*;
use rscope_ast::NodeId;
use rscope_core::intern::{InternedString, StringInterner, WellKnownNames};
use rscope_core::text::TextSpan;
use rscope_diagnostics::{messages, Diagnostic, DiagnosticCollection};
use rustc_hash::FxHashMap;

/// One identifier occurrence and how it was resolved.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedReference {
    pub node: NodeId,
    pub name: InternedString,
    pub span: TextSpan,
    /// Descriptor the walk started from.
    pub scope: ScopeId,
    pub var_ref: VarRef,
}

/// Everything the binder produced for one program.
#[derive(Debug)]
pub struct BindResult {
    pub scopes: DescriptorArena,
    /// Descriptor of the program itself: global for scripts, eval for eval code.
    pub root: ScopeId,
    /// Descriptor of each program, function and catch clause node.
    pub node_scopes: FxHashMap<NodeId, ScopeId>,
    /// Addressing of each identifier node.
    pub references: FxHashMap<NodeId, VarRef>,
    /// The same resolutions in source order, for reports.
    pub reference_log: Vec<ResolvedReference>,
    /// Descriptors whose code contains a direct `eval` call.
    pub eval_scopes: Vec<ScopeId>,
    pub diagnostics: DiagnosticCollection,
}

impl BindResult {
    #[inline]
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.node_scopes.get(&node).copied()
    }

    #[inline]
    pub fn reference(&self, node: NodeId) -> Option<VarRef> {
        self.references.get(&node).copied()
    }
}

/// The binder creates scope descriptors and resolves references.
pub struct Binder<'i> {
    interner: &'i StringInterner,
    well_known: WellKnownNames,
    arena: DescriptorArena,
    node_scopes: FxHashMap<NodeId, ScopeId>,
    references: FxHashMap<NodeId, VarRef>,
    reference_log: Vec<ResolvedReference>,
    eval_scopes: Vec<ScopeId>,
    diagnostics: DiagnosticCollection,
    file_name: String,
    /// Names of the functions being bound, innermost last.
    function_stack: Vec<Option<InternedString>>,
    /// Whether the code being bound is strict.
    strict: bool,
}

impl<'i> Binder<'i> {
    pub fn new(interner: &'i StringInterner) -> Self {
        Self {
            interner,
            well_known: interner.well_known(),
            arena: DescriptorArena::new(),
            node_scopes: FxHashMap::default(),
            references: FxHashMap::default(),
            reference_log: Vec::new(),
            eval_scopes: Vec::new(),
            diagnostics: DiagnosticCollection::new(),
            file_name: String::new(),
            function_stack: Vec::new(),
            strict: false,
        }
    }

    pub fn with_limits(mut self, limits: ScopeLimits) -> Self {
        self.arena = DescriptorArena::with_limits(limits);
        self
    }

    /// Bind a script. Its top level is the global scope.
    #[tracing::instrument(level = "debug", skip_all, fields(file = %program.file_name))]
    pub fn bind_script(mut self, program: &Program<'_>) -> Result<BindResult, ScopeError> {
        let root = self.arena.new_global();
        self.bind_program(program, root)
    }

    /// Bind code handed to `eval`. Its top level is an eval scope with no
    /// compile-time parent; everything it does not declare is dynamic.
    #[tracing::instrument(level = "debug", skip_all, fields(file = %program.file_name))]
    pub fn bind_eval(mut self, program: &Program<'_>) -> Result<BindResult, ScopeError> {
        let root = self.arena.new_eval(None)?;
        self.bind_program(program, root)
    }

    fn bind_program(mut self, program: &Program<'_>, root: ScopeId) -> Result<BindResult, ScopeError> {
        self.file_name = program.file_name.clone();
        self.strict = program.strict;
        self.node_scopes.insert(program.id, root);
        self.trace_scope(root);

        self.declare_statements(program.statements, root)?;
        self.resolve_statements(program.statements, root)?;

        tracing::debug!(
            scopes = self.arena.len(),
            references = self.references.len(),
            "bound program"
        );

        Ok(BindResult {
            scopes: self.arena,
            root,
            node_scopes: self.node_scopes,
            references: self.references,
            reference_log: self.reference_log,
            eval_scopes: self.eval_scopes,
            diagnostics: self.diagnostics,
        })
    }

    fn trace_scope(&self, id: ScopeId) {
        if let Ok(scope) = self.arena.get(id) {
            tracing::debug!(
                scope = %id,
                kind = %scope.kind(),
                parent = ?scope.parent(),
                declared = scope.declared_count(),
                "created scope"
            );
        }
    }

    // ========================================================================
    // Declaration pass
    // ========================================================================

    fn declare_statements(&mut self, statements: &[Statement<'_>], scope: ScopeId) -> Result<(), ScopeError> {
        for statement in statements {
            self.declare_statement(statement, scope)?;
        }
        Ok(())
    }

    fn declare_statement(&mut self, statement: &Statement<'_>, scope: ScopeId) -> Result<(), ScopeError> {
        match statement {
            Statement::Var(declarators) => {
                for declarator in declarators.iter() {
                    self.arena.declare(scope, declarator.name.name)?;
                }
            }
            Statement::Function(function) => {
                if let Some(name) = function.name {
                    self.arena.declare_hoisted(scope, name.name, Some(function.id))?;
                }
            }
            Statement::If(stmt) => {
                self.declare_statement(stmt.consequent, scope)?;
                if let Some(alternate) = stmt.alternate {
                    self.declare_statement(alternate, scope)?;
                }
            }
            Statement::While(stmt) => self.declare_statement(stmt.body, scope)?,
            Statement::Block(statements) => self.declare_statements(statements, scope)?,
            Statement::Try(stmt) => {
                self.declare_statements(stmt.block, scope)?;
                if let Some(handler) = &stmt.handler {
                    let catch = self.catch_scope(handler, scope)?;
                    self.declare_statements(handler.body, catch)?;
                }
                if let Some(finalizer) = stmt.finalizer {
                    self.declare_statements(finalizer, scope)?;
                }
            }
            Statement::Expression(_)
            | Statement::Return(..)
            | Statement::Throw(_)
            | Statement::Empty => {}
        }
        Ok(())
    }

    /// The descriptor of a catch clause, created on first use.
    fn catch_scope(&mut self, handler: &CatchClause<'_>, parent: ScopeId) -> Result<ScopeId, ScopeError> {
        if let Some(&scope) = self.node_scopes.get(&handler.id) {
            return Ok(scope);
        }
        let scope = self.arena.new_catch(Some(parent), handler.param.name)?;
        self.node_scopes.insert(handler.id, scope);
        self.trace_scope(scope);
        Ok(scope)
    }

    // ========================================================================
    // Resolution pass
    // ========================================================================

    fn resolve_statements(&mut self, statements: &[Statement<'_>], scope: ScopeId) -> Result<(), ScopeError> {
        for statement in statements {
            self.resolve_statement(statement, scope)?;
        }
        Ok(())
    }

    fn resolve_statement(&mut self, statement: &Statement<'_>, scope: ScopeId) -> Result<(), ScopeError> {
        match statement {
            Statement::Var(declarators) => {
                for declarator in declarators.iter() {
                    self.resolve_identifier(&declarator.name, scope)?;
                    if let Some(init) = declarator.init {
                        self.resolve_expression(init, scope)?;
                    }
                }
            }
            Statement::Function(function) => {
                // Declarations are instantiated where they were hoisted to,
                // so a declaration inside a catch body does not see the
                // catch binding.
                let parent = self.arena.declaration_target(scope)?;
                self.bind_function(function, parent)?;
            }
            Statement::Expression(expression) | Statement::Throw(expression) => {
                self.resolve_expression(expression, scope)?;
            }
            Statement::Return(argument, _) => {
                if let Some(argument) = argument {
                    self.resolve_expression(argument, scope)?;
                }
            }
            Statement::If(stmt) => {
                self.resolve_expression(stmt.test, scope)?;
                self.resolve_statement(stmt.consequent, scope)?;
                if let Some(alternate) = stmt.alternate {
                    self.resolve_statement(alternate, scope)?;
                }
            }
            Statement::While(stmt) => {
                self.resolve_expression(stmt.test, scope)?;
                self.resolve_statement(stmt.body, scope)?;
            }
            Statement::Block(statements) => self.resolve_statements(statements, scope)?,
            Statement::Try(stmt) => {
                self.resolve_statements(stmt.block, scope)?;
                if let Some(handler) = &stmt.handler {
                    let catch = self.catch_scope(handler, scope)?;
                    self.resolve_identifier(&handler.param, catch)?;
                    self.resolve_statements(handler.body, catch)?;
                }
                if let Some(finalizer) = stmt.finalizer {
                    self.resolve_statements(finalizer, scope)?;
                }
            }
            Statement::Empty => {}
        }
        Ok(())
    }

    fn resolve_expression(&mut self, expression: &Expression<'_>, scope: ScopeId) -> Result<(), ScopeError> {
        match expression {
            Expression::Number(_)
            | Expression::String(_)
            | Expression::Boolean(_)
            | Expression::Null => {}
            Expression::This(ident) | Expression::Identifier(ident) => {
                self.resolve_identifier(ident, scope)?;
            }
            Expression::Assign { target, value } => {
                self.resolve_identifier(target, scope)?;
                self.resolve_expression(value, scope)?;
            }
            Expression::Binary { left, right, .. } => {
                self.resolve_expression(left, scope)?;
                self.resolve_expression(right, scope)?;
            }
            Expression::Unary { operand, .. }
            | Expression::TypeOf(operand)
            | Expression::Delete(operand, _) => {
                self.resolve_expression(operand, scope)?;
            }
            Expression::Call { callee, args, span } => {
                if callee
                    .as_identifier()
                    .is_some_and(|ident| ident.name == self.well_known.eval)
                {
                    self.note_direct_eval(scope, *span);
                }
                self.resolve_expression(callee, scope)?;
                for arg in args.iter() {
                    self.resolve_expression(arg, scope)?;
                }
            }
            Expression::Function(function) => {
                self.bind_function(function, scope)?;
            }
        }
        Ok(())
    }

    fn resolve_identifier(&mut self, ident: &Identifier, scope: ScopeId) -> Result<(), ScopeError> {
        let var_ref = resolve(&self.arena, scope, ident.name)?;
        tracing::trace!(
            name = self.interner.resolve(ident.name),
            %var_ref,
            "resolved reference"
        );

        if !var_ref.is_static() && !self.function_stack.is_empty() {
            let name = self.interner.resolve(ident.name).to_string();
            self.diagnostics.add(Diagnostic::with_location(
                self.file_name.clone(),
                ident.span,
                &messages::REFERENCE_TO_0_RESOLVED_DYNAMICALLY,
                &[&name],
            ));
        }

        self.references.insert(ident.id, var_ref);
        self.reference_log.push(ResolvedReference {
            node: ident.id,
            name: ident.name,
            span: ident.span,
            scope,
            var_ref,
        });
        Ok(())
    }

    fn note_direct_eval(&mut self, scope: ScopeId, span: TextSpan) {
        if !self.eval_scopes.contains(&scope) {
            self.eval_scopes.push(scope);
        }
        let owner = match self.function_stack.last() {
            Some(Some(name)) => self.interner.resolve(*name).to_string(),
            Some(None) => "<anonymous>".to_string(),
            None => "<script>".to_string(),
        };
        let message = if self.strict {
            &messages::STRICT_DIRECT_EVAL_IN_0_USES_A_SEPARATE_SCOPE
        } else {
            &messages::DIRECT_EVAL_IN_0_MAY_DECLARE_VARIABLES
        };
        tracing::debug!(scope = %scope, owner = %owner, "direct eval");
        self.diagnostics.add(Diagnostic::with_location(
            self.file_name.clone(),
            span,
            message,
            &[&owner],
        ));
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn bind_function(&mut self, function: &Function<'_>, parent: ScopeId) -> Result<ScopeId, ScopeError> {
        let params: Vec<InternedString> = function.params.iter().map(|param| param.name).collect();
        let self_name = function.name.map(|name| name.name);
        let scope = self
            .arena
            .new_function(Some(parent), self_name, &self.well_known, &params)?;
        self.node_scopes.insert(function.id, scope);
        self.trace_scope(scope);

        self.function_stack.push(self_name);
        let was_strict = std::mem::replace(&mut self.strict, function.strict);
        let result = self
            .declare_statements(function.body, scope)
            .and_then(|()| self.mark_direct_eval(function, scope))
            .and_then(|()| self.resolve_statements(function.body, scope));
        self.function_stack.pop();
        self.strict = was_strict;
        result?;

        Ok(scope)
    }

    /// A sloppy function whose body calls `eval` directly can gain bindings
    /// at run time, so names it does not declare must not resolve past it.
    fn mark_direct_eval(&mut self, function: &Function<'_>, scope: ScopeId) -> Result<(), ScopeError> {
        if function.strict || !contains_direct_eval(function.body, self.well_known.eval) {
            return Ok(());
        }
        tracing::debug!(scope = %scope, "function body calls eval directly");
        self.arena.mark_direct_eval(scope)
    }
}

// ============================================================================
// Direct eval detection
// ============================================================================

/// Whether `statements` call `eval` directly, not counting nested functions.
fn contains_direct_eval(statements: &[Statement<'_>], eval: InternedString) -> bool {
    statements.iter().any(|statement| statement_calls_eval(statement, eval))
}

fn statement_calls_eval(statement: &Statement<'_>, eval: InternedString) -> bool {
    match statement {
        Statement::Var(declarators) => declarators
            .iter()
            .any(|declarator| declarator.init.is_some_and(|init| expression_calls_eval(init, eval))),
        Statement::Expression(expression) | Statement::Throw(expression) => {
            expression_calls_eval(expression, eval)
        }
        Statement::Return(argument, _) => argument.is_some_and(|argument| expression_calls_eval(argument, eval)),
        Statement::If(stmt) => {
            expression_calls_eval(stmt.test, eval)
                || statement_calls_eval(stmt.consequent, eval)
                || stmt.alternate.is_some_and(|alternate| statement_calls_eval(alternate, eval))
        }
        Statement::While(stmt) => expression_calls_eval(stmt.test, eval) || statement_calls_eval(stmt.body, eval),
        Statement::Block(statements) => contains_direct_eval(statements, eval),
        Statement::Try(stmt) => {
            contains_direct_eval(stmt.block, eval)
                || stmt
                    .handler
                    .as_ref()
                    .is_some_and(|handler| contains_direct_eval(handler.body, eval))
                || stmt.finalizer.is_some_and(|finalizer| contains_direct_eval(finalizer, eval))
        }
        Statement::Function(_) | Statement::Empty => false,
    }
}

fn expression_calls_eval(expression: &Expression<'_>, eval: InternedString) -> bool {
    match expression {
        Expression::Call { callee, args, .. } => {
            callee.as_identifier().is_some_and(|ident| ident.name == eval)
                || expression_calls_eval(callee, eval)
                || args.iter().any(|arg| expression_calls_eval(arg, eval))
        }
        Expression::Assign { value, .. } => expression_calls_eval(value, eval),
        Expression::Binary { left, right, .. } => {
            expression_calls_eval(left, eval) || expression_calls_eval(right, eval)
        }
        Expression::Unary { operand, .. } | Expression::TypeOf(operand) | Expression::Delete(operand, _) => {
            expression_calls_eval(operand, eval)
        }
        Expression::Number(_)
        | Expression::String(_)
        | Expression::Boolean(_)
        | Expression::Null
        | Expression::This(_)
        | Expression::Identifier(_)
        | Expression::Function(_) => false,
    }
}
