//! Parser integration tests.
//!
//! Verifies that the parser builds scope-relevant AST structure and reports
//! strict-mode early errors.

use bumpalo::Bump;
use rscope_ast::node::{Expression, Statement};
use rscope_core::intern::StringInterner;
use rscope_parser::{ParseResult, Parser};

/// Helper: parse source text and hand the result to `f`.
fn with_parsed<R>(source: &str, f: impl FnOnce(&ParseResult<'_>, &StringInterner) -> R) -> R {
    let arena = Bump::new();
    let interner = StringInterner::new();
    let result = Parser::new(&arena, "test.js", source, &interner).parse_program();
    f(&result, &interner)
}

/// Helper: error codes reported for the source, in source order.
fn error_codes(source: &str) -> Vec<u32> {
    with_parsed(source, |result, _| {
        result
            .diagnostics
            .diagnostics()
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.code)
            .collect()
    })
}

fn assert_clean(source: &str) {
    let codes = error_codes(source);
    assert!(codes.is_empty(), "source: {} errors: {:?}", source, codes);
}

fn statement_count(source: &str) -> usize {
    with_parsed(source, |result, _| result.program.statements.len())
}

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn test_parse_var_declaration_list() {
    with_parsed("var a = 1, b, c = a;", |result, interner| {
        assert!(!result.diagnostics.has_errors());
        let Statement::Var(decls) = &result.program.statements[0] else {
            panic!("expected var statement");
        };
        let names: Vec<&str> = decls.iter().map(|d| interner.resolve(d.name.name)).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(decls[0].init.is_some());
        assert!(decls[1].init.is_none());
    });
}

#[test]
fn test_parse_function_declaration() {
    with_parsed("function f(a, b) { return a + b; }", |result, interner| {
        let Statement::Function(function) = &result.program.statements[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(function.name.map(|n| interner.resolve(n.name)), Some("f"));
        assert_eq!(function.params.len(), 2);
        assert_eq!(function.body.len(), 1);
        assert!(!function.strict);
    });
}

#[test]
fn test_parse_anonymous_function_expression() {
    with_parsed("var f = function (x) { return x; };", |result, _| {
        let Statement::Var(decls) = &result.program.statements[0] else {
            panic!("expected var statement");
        };
        match decls[0].init {
            Some(Expression::Function(function)) => assert!(function.name.is_none()),
            other => panic!("expected function expression, got {:?}", other),
        }
    });
}

#[test]
fn test_function_declaration_requires_name() {
    assert_eq!(error_codes("function () {}").first(), Some(&1003));
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_parse_control_flow() {
    assert_clean("if (a) { b(); } else c(); while (x < 3) x = x + 1;");
    assert_eq!(statement_count("if (a) b; else c; while (a) {}"), 2);
}

#[test]
fn test_parse_try_catch_finally() {
    with_parsed("try { f(); } catch (e) { g(e); } finally { h(); }", |result, interner| {
        let Statement::Try(stmt) = &result.program.statements[0] else {
            panic!("expected try statement");
        };
        let handler = stmt.handler.as_ref().expect("catch clause");
        assert_eq!(interner.resolve(handler.param.name), "e");
        assert_eq!(handler.body.len(), 1);
        assert_eq!(stmt.finalizer.map(|f| f.len()), Some(1));
    });
}

#[test]
fn test_try_without_handler_or_finalizer() {
    assert!(error_codes("try { f(); }").contains(&1472));
}

#[test]
fn test_automatic_semicolon_insertion() {
    assert_clean("var a = 1\nvar b = 2\na = b");
    assert_eq!(statement_count("var a = 1\nvar b = 2\na = b"), 3);
}

#[test]
fn test_missing_semicolon_on_same_line() {
    assert!(error_codes("var a = 1 var b").contains(&1005));
}

#[test]
fn test_return_with_line_break_returns_nothing() {
    with_parsed("function f() { return\n1; }", |result, _| {
        let Statement::Function(function) = &result.program.statements[0] else {
            panic!("expected function declaration");
        };
        assert!(matches!(function.body[0], Statement::Return(None, _)));
        assert_eq!(function.body.len(), 2);
    });
}

#[test]
fn test_return_outside_function() {
    assert_eq!(error_codes("return 1;"), vec![1108]);
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_binary_precedence() {
    with_parsed("1 + 2 * 3;", |result, _| {
        let Statement::Expression(Expression::Binary { left, right, .. }) =
            &result.program.statements[0]
        else {
            panic!("expected binary expression");
        };
        assert!(matches!(left, Expression::Number(n) if *n == 1.0));
        assert!(matches!(right, Expression::Binary { .. }));
    });
}

#[test]
fn test_call_with_arguments() {
    with_parsed("eval('var x = 1', y);", |result, interner| {
        let Statement::Expression(Expression::Call { callee, args, .. }) =
            &result.program.statements[0]
        else {
            panic!("expected call expression");
        };
        let callee = callee.as_identifier().expect("identifier callee");
        assert_eq!(callee.name, interner.well_known().eval);
        assert_eq!(args.len(), 2);
    });
}

#[test]
fn test_invalid_assignment_target() {
    assert_eq!(error_codes("1 = 2;"), vec![2364]);
}

#[test]
fn test_hex_literal() {
    with_parsed("0x1f;", |result, _| {
        assert!(matches!(
            result.program.statements[0],
            Statement::Expression(Expression::Number(n)) if *n == 31.0
        ));
    });
}

#[test]
fn test_node_ids_are_unique() {
    with_parsed("var a; function f(b) { a = b; }", |result, _| {
        assert!(result.node_count >= 6);
        let Statement::Var(decls) = &result.program.statements[0] else {
            panic!("expected var statement");
        };
        let Statement::Function(function) = &result.program.statements[1] else {
            panic!("expected function declaration");
        };
        assert_ne!(decls[0].name.id, function.id);
        assert_ne!(function.params[0].id, function.id);
    });
}

// ============================================================================
// Strict mode
// ============================================================================

#[test]
fn test_use_strict_directive() {
    with_parsed("'use strict'; var a;", |result, _| {
        assert!(result.program.strict);
        assert_eq!(result.program.statements.len(), 2);
    });
    with_parsed("var a; 'use strict';", |result, _| {
        assert!(!result.program.strict);
    });
}

#[test]
fn test_function_directive_and_inheritance() {
    with_parsed(
        "function f() { 'use strict'; function g() {} } function h() {}",
        |result, _| {
            assert!(!result.program.strict);
            let Statement::Function(f) = &result.program.statements[0] else {
                panic!("expected f");
            };
            let Statement::Function(h) = &result.program.statements[1] else {
                panic!("expected h");
            };
            assert!(f.strict);
            let Statement::Function(g) = &f.body[1] else {
                panic!("expected g");
            };
            assert!(g.strict);
            assert!(!h.strict);
        },
    );
}

#[test]
fn test_strict_delete_of_identifier() {
    assert_eq!(error_codes("'use strict'; var a; delete a;"), vec![1102]);
    assert_clean("var a; delete a;");
}

#[test]
fn test_strict_binding_of_eval_and_arguments() {
    assert_eq!(error_codes("'use strict'; var eval;"), vec![1100]);
    assert_eq!(error_codes("'use strict'; arguments = 1;"), vec![1100]);
    assert_eq!(error_codes("function f(eval) { 'use strict'; }"), vec![1100]);
    assert_clean("var eval; arguments = 1;");
}

#[test]
fn test_strict_duplicate_parameters() {
    assert_eq!(error_codes("function f(a, a) { 'use strict'; }"), vec![2300]);
    assert_clean("function f(a, a) {}");
}

#[test]
fn test_strict_option_without_directive() {
    let arena = Bump::new();
    let interner = StringInterner::new();
    let result = Parser::new(&arena, "test.js", "var a; delete a;", &interner)
        .with_strict(true)
        .parse_program();
    assert!(result.program.strict);
    assert_eq!(result.diagnostics.first_error().map(|d| d.code), Some(1102));
}

// ============================================================================
// Recovery
// ============================================================================

#[test]
fn test_diagnostics_carry_file_name() {
    with_parsed("var 'x';", |result, _| {
        let first = result.diagnostics.first_error().expect("an error");
        assert_eq!(first.file.as_deref(), Some("test.js"));
    });
}

#[test]
fn test_garbage_terminates() {
    assert!(!error_codes(") ) } @ # var").is_empty());
}

#[test]
fn test_deeply_nested_parentheses_report_instead_of_overflowing() {
    let source = format!("{}1{};", "(".repeat(20_000), ")".repeat(20_000));
    let codes = error_codes(&source);
    assert!(codes.contains(&1109), "{:?}", &codes[..codes.len().min(5)]);
}

#[test]
fn test_deep_unary_chain_reports_instead_of_overflowing() {
    let source = format!("{}x;", "!-".repeat(10_000));
    assert!(error_codes(&source).contains(&1109));
    let source = format!("{}x;", "typeof ".repeat(10_000));
    assert!(error_codes(&source).contains(&1109));
}

#[test]
fn test_moderate_nesting_parses_cleanly() {
    assert_clean(&format!("{}1{};", "(".repeat(40), ")".repeat(40)));
    assert_clean(&format!("{}x;", "!".repeat(60)));
}
