//! The emitter implementation.

use crate::ir::*;
use rscope_ast::node::{self as ast, Program, Statement};
use rscope_ast::NodeId;
use rscope_binder::{BindResult, ScopeError, ScopeId, ScopeKind, VarRef};
use rscope_core::intern::{StringInterner, WellKnownNames};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Missing binder output. Unreachable when the emitter is fed the
/// [`BindResult`] of the same program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("no resolution recorded for identifier {0:?}")]
    MissingReference(NodeId),

    #[error("no scope descriptor recorded for node {0:?}")]
    MissingScope(NodeId),

    #[error("hoisted function {0:?} was never emitted")]
    MissingFunction(NodeId),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Lowers one bound program.
pub struct Emitter<'b> {
    bind: &'b BindResult,
    well_known: WellKnownNames,
    /// Compiled function declarations, for hoisted initializers.
    declared_functions: FxHashMap<NodeId, Rc<FunctionCode>>,
}

impl<'b> Emitter<'b> {
    pub fn new(bind: &'b BindResult, interner: &StringInterner) -> Self {
        Self {
            bind,
            well_known: interner.well_known(),
            declared_functions: FxHashMap::default(),
        }
    }

    /// Lower a script or eval program to its root code.
    pub fn emit_program(mut self, program: &Program<'_>) -> Result<Rc<FunctionCode>, EmitError> {
        let scope = self.scope_of(program.id)?;
        let mode = match self.bind.scopes.get(scope)?.kind() {
            ScopeKind::Eval => EntryMode::Eval,
            _ => EntryMode::Global,
        };

        let body = self.emit_statements(program.statements)?;
        let entry = self.emit_scope_entry(scope, mode)?;

        Ok(Rc::new(FunctionCode {
            name: None,
            params: Vec::new(),
            self_slot: None,
            this_slot: None,
            arguments_slot: None,
            entry,
            body,
            strict: program.strict,
            span: program.span,
        }))
    }

    /// The scope-entry primitive: one directive per body, built from the
    /// frozen descriptor.
    pub fn emit_scope_entry(&self, scope: ScopeId, mode: EntryMode) -> Result<ScopeEntry, EmitError> {
        let descriptor = self.bind.scopes.get(scope)?;
        let table = descriptor.table();

        let mut hoisted = Vec::new();
        for (slot, declaration) in table.declarations() {
            let Some(node) = declaration.hoisted else {
                continue;
            };
            let code = self
                .declared_functions
                .get(&node)
                .cloned()
                .ok_or(EmitError::MissingFunction(node))?;
            hoisted.push(HoistedFunction {
                name: declaration.name,
                slot,
                code,
            });
        }

        let names: Rc<[_]> = table.names().into();
        tracing::debug!(
            scope = %scope,
            %mode,
            names = names.len(),
            hoisted = hoisted.len(),
            "emit scope entry"
        );
        Ok(ScopeEntry { names, hoisted, mode })
    }

    fn scope_of(&self, node: NodeId) -> Result<ScopeId, EmitError> {
        self.bind.scope_of(node).ok_or(EmitError::MissingScope(node))
    }

    fn reference(&self, ident: &ast::Identifier) -> Result<VarRef, EmitError> {
        self.bind
            .reference(ident.id)
            .ok_or(EmitError::MissingReference(ident.id))
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn emit_function(&mut self, function: &ast::Function<'_>) -> Result<Rc<FunctionCode>, EmitError> {
        let scope = self.scope_of(function.id)?;
        let body = self.emit_statements(function.body)?;
        let entry = self.emit_scope_entry(scope, EntryMode::Template)?;

        let descriptor = self.bind.scopes.get(scope)?;
        let slot_of = |name| descriptor.index_of(name).ok_or(EmitError::MissingScope(function.id));
        let params = function
            .params
            .iter()
            .map(|param| slot_of(param.name))
            .collect::<Result<Vec<_>, _>>()?;
        let self_slot = function.name.map(|name| slot_of(name.name)).transpose()?;

        Ok(Rc::new(FunctionCode {
            name: function.name.map(|name| name.name),
            params,
            self_slot,
            this_slot: Some(slot_of(self.well_known.this)?),
            arguments_slot: Some(slot_of(self.well_known.arguments)?),
            entry,
            body,
            strict: function.strict,
            span: function.span,
        }))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn emit_statements(&mut self, statements: &[Statement<'_>]) -> Result<Vec<Stmt>, EmitError> {
        let mut out = Vec::with_capacity(statements.len());
        for statement in statements {
            self.emit_statement(statement, &mut out)?;
        }
        Ok(out)
    }

    fn emit_boxed(&mut self, statement: &Statement<'_>) -> Result<Box<Stmt>, EmitError> {
        let mut out = Vec::new();
        self.emit_statement(statement, &mut out)?;
        let stmt = match out.len() {
            1 => out.remove(0),
            _ => Stmt::Block(out),
        };
        Ok(Box::new(stmt))
    }

    fn emit_statement(&mut self, statement: &Statement<'_>, out: &mut Vec<Stmt>) -> Result<(), EmitError> {
        match statement {
            Statement::Var(declarators) => {
                for declarator in declarators.iter() {
                    // `var x;` only declares; the entry directive covers it.
                    if let Some(init) = declarator.init {
                        let target = self.reference(&declarator.name)?;
                        let value = self.emit_expression(init)?;
                        out.push(Stmt::Init(Expr::Store(target, Box::new(value))));
                    }
                }
            }
            Statement::Function(function) => {
                let code = self.emit_function(function)?;
                self.declared_functions.insert(function.id, code);
            }
            Statement::Expression(expression) => {
                out.push(Stmt::Expr(self.emit_expression(expression)?));
            }
            Statement::Return(argument, _) => {
                let argument = argument.map(|arg| self.emit_expression(arg)).transpose()?;
                out.push(Stmt::Return(argument));
            }
            Statement::If(stmt) => {
                let test = self.emit_expression(stmt.test)?;
                let consequent = self.emit_boxed(stmt.consequent)?;
                let alternate = stmt.alternate.map(|alt| self.emit_boxed(alt)).transpose()?;
                out.push(Stmt::If {
                    test,
                    consequent,
                    alternate,
                });
            }
            Statement::While(stmt) => {
                let test = self.emit_expression(stmt.test)?;
                let body = self.emit_boxed(stmt.body)?;
                out.push(Stmt::While { test, body });
            }
            Statement::Block(statements) => {
                out.push(Stmt::Block(self.emit_statements(statements)?));
            }
            Statement::Try(stmt) => {
                let block = self.emit_statements(stmt.block)?;
                let handler = match &stmt.handler {
                    Some(handler) => {
                        let scope = self.scope_of(handler.id)?;
                        let body = self.emit_statements(handler.body)?;
                        let entry = self.emit_scope_entry(scope, EntryMode::Catch)?;
                        let param_slot = self
                            .bind
                            .scopes
                            .get(scope)?
                            .index_of(handler.param.name)
                            .ok_or(EmitError::MissingScope(handler.id))?;
                        Some(CatchCode {
                            entry,
                            param_slot,
                            body,
                        })
                    }
                    None => None,
                };
                let finalizer = stmt.finalizer.map(|f| self.emit_statements(f)).transpose()?;
                out.push(Stmt::Try {
                    block,
                    handler,
                    finalizer,
                });
            }
            Statement::Throw(expression) => {
                out.push(Stmt::Throw(self.emit_expression(expression)?));
            }
            Statement::Empty => {}
        }
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn emit_boxed_expression(&mut self, expression: &ast::Expression<'_>) -> Result<Box<Expr>, EmitError> {
        Ok(Box::new(self.emit_expression(expression)?))
    }

    fn emit_expression(&mut self, expression: &ast::Expression<'_>) -> Result<Expr, EmitError> {
        use ast::Expression as E;
        let expr = match expression {
            E::Number(value) => Expr::Literal(Literal::Number(*value)),
            E::String(value) => Expr::Literal(Literal::String(Rc::from(*value))),
            E::Boolean(value) => Expr::Literal(Literal::Boolean(*value)),
            E::Null => Expr::Literal(Literal::Null),
            E::This(ident) | E::Identifier(ident) => Expr::Load(self.reference(ident)?),
            E::Assign { target, value } => {
                let target = self.reference(target)?;
                Expr::Store(target, self.emit_boxed_expression(value)?)
            }
            E::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: self.emit_boxed_expression(left)?,
                right: self.emit_boxed_expression(right)?,
            },
            E::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: self.emit_boxed_expression(operand)?,
            },
            E::TypeOf(operand) => match operand.as_identifier() {
                Some(ident) => Expr::TypeOfName(self.reference(ident)?),
                None => Expr::TypeOf(self.emit_boxed_expression(operand)?),
            },
            E::Delete(operand, _) => match operand.as_identifier() {
                Some(ident) => Expr::DeleteName(self.reference(ident)?),
                None => Expr::DeleteValue(self.emit_boxed_expression(operand)?),
            },
            E::Call { callee, args, .. } => {
                let args = args
                    .iter()
                    .map(|arg| self.emit_expression(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                let direct_eval = match callee.as_identifier() {
                    Some(ident) if ident.name == self.well_known.eval => {
                        !self.reference(ident)?.is_static()
                    }
                    _ => false,
                };
                if direct_eval {
                    Expr::DirectEval(args)
                } else {
                    Expr::Call {
                        callee: self.emit_boxed_expression(callee)?,
                        args,
                    }
                }
            }
            E::Function(function) => Expr::Function(self.emit_function(function)?),
        };
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;
    use rscope_binder::Binder;
    use rscope_parser::Parser;

    fn emit(source: &str) -> (Rc<FunctionCode>, StringInterner) {
        let arena = Bump::new();
        let interner = StringInterner::new();
        let parsed = Parser::new(&arena, "test.js", source, &interner).parse_program();
        let bind = Binder::new(&interner).bind_script(&parsed.program).unwrap();
        let code = Emitter::new(&bind, &interner).emit_program(&parsed.program).unwrap();
        (code, interner)
    }

    #[test]
    fn test_script_entry_is_global() {
        let (code, interner) = emit("var a = 1; function f() {}");
        assert!(code.is_program());
        assert_eq!(code.entry.mode, EntryMode::Global);
        assert_eq!(
            code.entry.names.to_vec(),
            vec![interner.intern("a"), interner.intern("f")]
        );
        assert_eq!(code.entry.hoisted.len(), 1);
        assert_eq!(code.entry.hoisted[0].name, interner.intern("f"));
        // The declaration itself emits nothing.
        assert_eq!(code.body.len(), 1);
    }

    #[test]
    fn test_function_slots() {
        let (code, _) = emit("function f(a, b) { return a; }");
        let f = &code.entry.hoisted[0].code;
        assert_eq!(f.entry.mode, EntryMode::Template);
        assert_eq!(f.self_slot, Some(0));
        assert_eq!(f.this_slot, Some(1));
        assert_eq!(f.arguments_slot, Some(2));
        assert_eq!(f.params, vec![3, 4]);
        assert!(matches!(
            f.body[0],
            Stmt::Return(Some(Expr::Load(VarRef::Static { depth: 0, slot: 3 })))
        ));
    }

    #[test]
    fn test_var_without_initializer_emits_nothing() {
        let (code, _) = emit("var a, b = 2;");
        assert_eq!(code.body.len(), 1);
        assert!(matches!(code.body[0], Stmt::Init(Expr::Store(VarRef::Dynamic(_), _))));
    }

    #[test]
    fn test_catch_entry() {
        let (code, _) = emit("try { } catch (e) { e; }");
        let Stmt::Try { handler: Some(handler), .. } = &code.body[0] else {
            panic!("expected try with handler");
        };
        assert_eq!(handler.entry.mode, EntryMode::Catch);
        assert_eq!(handler.entry.names.len(), 1);
        assert_eq!(handler.param_slot, 0);
    }

    #[test]
    fn test_hoisted_function_inside_catch_belongs_to_function_entry() {
        let (code, interner) = emit("function f() { try { } catch (e) { function g() {} } }");
        let f = &code.entry.hoisted[0].code;
        let hoisted: Vec<_> = f.entry.hoisted.iter().map(|h| h.name).collect();
        assert_eq!(hoisted, vec![interner.intern("g")]);
    }

    #[test]
    fn test_direct_eval_and_typeof_delete_forms() {
        let (code, _) = emit("eval('x'); typeof y; typeof 1; delete z; delete 1;");
        assert!(matches!(code.body[0], Stmt::Expr(Expr::DirectEval(ref args)) if args.len() == 1));
        assert!(matches!(code.body[1], Stmt::Expr(Expr::TypeOfName(_))));
        assert!(matches!(code.body[2], Stmt::Expr(Expr::TypeOf(_))));
        assert!(matches!(code.body[3], Stmt::Expr(Expr::DeleteName(_))));
        assert!(matches!(code.body[4], Stmt::Expr(Expr::DeleteValue(_))));
    }

    #[test]
    fn test_locally_bound_eval_is_an_ordinary_call() {
        let (code, _) = emit("function f(eval) { return eval('1'); }");
        let f = &code.entry.hoisted[0].code;
        assert!(matches!(f.body[0], Stmt::Return(Some(Expr::Call { .. }))));
    }
}
