//! Compiler integration tests.

use rscope_binder::{ScopeError, ScopeKind, ScopeLimits, VarRef};
use rscope_compiler::{CompileError, Compiler, EVAL_FILE_NAME};
use rscope_emitter::{EntryMode, Expr, Stmt};
use rscope_options::CompilerOptions;

fn strict_options() -> CompilerOptions {
    CompilerOptions {
        strict: Some(true),
        ..CompilerOptions::default()
    }
}

// ============================================================================
// Scripts
// ============================================================================

#[test]
fn test_compile_script_produces_global_entry() {
    let compiler = Compiler::default();
    let program = compiler.compile_script("main.js", "var a = 1; function f() { return a; }").unwrap();
    assert!(program.code.is_program());
    assert_eq!(program.code.entry.mode, EntryMode::Global);
    assert_eq!(program.code.entry.names.len(), 2);
    assert_eq!(program.bind.scopes.get(program.bind.root).unwrap().kind(), ScopeKind::Global);
}

#[test]
fn test_syntax_error_aborts() {
    let compiler = Compiler::default();
    let err = compiler.compile_script("bad.js", "var = ;").unwrap_err();
    let CompileError::Syntax(diagnostic) = err else {
        panic!("expected a syntax error");
    };
    assert!(diagnostic.is_error());
    assert_eq!(diagnostic.file.as_deref(), Some("bad.js"));
}

#[test]
fn test_return_at_top_level_is_rejected() {
    let compiler = Compiler::default();
    let err = compiler.compile_script("main.js", "return 1;").unwrap_err();
    assert!(matches!(err, CompileError::Syntax(ref d) if d.code == 1108));
}

#[test]
fn test_strict_option_applies_to_scripts() {
    let lax = Compiler::default();
    assert!(lax.compile_script("main.js", "var x; delete x;").is_ok());

    let strict = Compiler::new(strict_options());
    let err = strict.compile_script("main.js", "var x; delete x;").unwrap_err();
    assert!(matches!(err, CompileError::Syntax(ref d) if d.code == 1102));
}

#[test]
fn test_binder_messages_are_kept() {
    let compiler = Compiler::default();
    let program = compiler
        .compile_script("main.js", "var g; function f() { eval('1'); return g; }")
        .unwrap();
    let codes: Vec<u32> = program.diagnostics.diagnostics().iter().map(|d| d.code).collect();
    assert!(codes.contains(&6001));
    assert!(codes.contains(&6002));
    assert!(!program.diagnostics.has_errors());
}

// ============================================================================
// Eval code
// ============================================================================

#[test]
fn test_compile_eval_uses_eval_entry() {
    let compiler = Compiler::default();
    let program = compiler.compile_eval("var e = 1; e;", false).unwrap();
    assert_eq!(program.code.entry.mode, EntryMode::Eval);
    assert_eq!(program.bind.scopes.get(program.bind.root).unwrap().kind(), ScopeKind::Eval);
    assert!(matches!(program.code.body[1], Stmt::Expr(Expr::Load(VarRef::Dynamic(_)))));
}

#[test]
fn test_eval_inherits_caller_strictness() {
    let compiler = Compiler::default();
    assert!(!compiler.compile_eval("1;", false).unwrap().code.strict);
    assert!(compiler.compile_eval("1;", true).unwrap().code.strict);
}

#[test]
fn test_eval_syntax_errors_name_the_eval_file() {
    let compiler = Compiler::default();
    let err = compiler.compile_eval("(", false).unwrap_err();
    assert!(matches!(err, CompileError::Syntax(ref d) if d.file.as_deref() == Some(EVAL_FILE_NAME)));
}

#[test]
fn test_eval_shares_interner() {
    let compiler = Compiler::default();
    let script = compiler.compile_script("main.js", "var shared;").unwrap();
    let eval = compiler.compile_eval("shared;", false).unwrap();
    assert_eq!(script.code.entry.names[0], compiler.interner().intern("shared"));
    assert!(matches!(
        eval.code.body[0],
        Stmt::Expr(Expr::Load(VarRef::Dynamic(name))) if name == script.code.entry.names[0]
    ));
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_limits_follow_options() {
    let compiler = Compiler::new(CompilerOptions {
        growth_slack: Some(3),
        max_scope_depth: Some(2),
        ..CompilerOptions::default()
    });
    assert_eq!(
        compiler.limits(),
        ScopeLimits {
            growth_slack: 3,
            max_depth: 2
        }
    );
    let err = compiler
        .compile_script("deep.js", "function a() { function b() { function c() { x; } } }")
        .unwrap_err();
    assert!(matches!(err, CompileError::Scope(ScopeError::DepthExceeded(2))));
}

#[test]
fn test_default_limits() {
    assert_eq!(Compiler::default().limits(), ScopeLimits::default());
}
