//! Binder integration tests.
//!
//! Tests the parse -> bind pipeline: descriptor shapes, forwarding, and the
//! addressing chosen for each reference.

use bumpalo::Bump;
use rscope_binder::{BindResult, Binder, ScopeArena, ScopeError, ScopeKind, ScopeLimits, VarRef};
use rscope_core::intern::StringInterner;
use rscope_parser::Parser;

/// Helper: parse and bind a script.
fn bind_script(source: &str, interner: &StringInterner) -> BindResult {
    let arena = Bump::new();
    let parsed = Parser::new(&arena, "test.js", source, interner).parse_program();
    assert!(!parsed.diagnostics.has_errors(), "source: {}", source);
    Binder::new(interner).bind_script(&parsed.program).unwrap()
}

/// Helper: parse and bind eval code.
fn bind_eval(source: &str, interner: &StringInterner) -> BindResult {
    let arena = Bump::new();
    let parsed = Parser::new(&arena, "eval", source, interner).parse_program();
    assert!(!parsed.diagnostics.has_errors(), "source: {}", source);
    Binder::new(interner).bind_eval(&parsed.program).unwrap()
}

/// Helper: resolutions of every occurrence of `name`, in source order.
fn resolutions(result: &BindResult, interner: &StringInterner, name: &str) -> Vec<VarRef> {
    let name = interner.intern(name);
    result
        .reference_log
        .iter()
        .filter(|r| r.name == name)
        .map(|r| r.var_ref)
        .collect()
}

fn names_of(result: &BindResult, interner: &StringInterner, kind: ScopeKind) -> Vec<Vec<String>> {
    result
        .scopes
        .iter()
        .filter(|(_, scope)| scope.kind() == kind)
        .map(|(_, scope)| {
            scope
                .table()
                .names()
                .into_iter()
                .map(|n| interner.resolve(n).to_string())
                .collect()
        })
        .collect()
}

// ============================================================================
// Descriptor shapes
// ============================================================================

#[test]
fn test_bind_empty_script() {
    let interner = StringInterner::new();
    let result = bind_script("", &interner);
    assert_eq!(result.scopes.len(), 1);
    assert_eq!(result.scopes.get(result.root).unwrap().kind(), ScopeKind::Global);
    assert!(result.reference_log.is_empty());
}

#[test]
fn test_function_descriptor_order() {
    let interner = StringInterner::new();
    let result = bind_script("function add(a, b) { var sum = a + b; return sum; }", &interner);
    assert_eq!(
        names_of(&result, &interner, ScopeKind::Function),
        vec![vec!["add", "this", "arguments", "a", "b", "sum"]]
    );
    assert_eq!(names_of(&result, &interner, ScopeKind::Global), vec![vec!["add"]]);
}

#[test]
fn test_catch_descriptor_holds_only_binding() {
    let interner = StringInterner::new();
    let result = bind_script(
        "function f() { try { throw 1; } catch (err) { var a; function h() {} } }",
        &interner,
    );
    assert_eq!(names_of(&result, &interner, ScopeKind::Catch), vec![vec!["err"]]);
    let function_names = &names_of(&result, &interner, ScopeKind::Function)[0];
    assert_eq!(function_names, &vec!["f", "this", "arguments", "a", "h"]);
}

#[test]
fn test_function_declared_in_catch_is_scoped_to_the_function() {
    let interner = StringInterner::new();
    let result = bind_script(
        "function f(p) { try { } catch (e) { function g() { return e + p; } } }",
        &interner,
    );
    // g is instantiated on entry to f, outside the catch clause.
    assert_eq!(
        resolutions(&result, &interner, "e"),
        vec![
            VarRef::Static { depth: 0, slot: 0 },
            VarRef::Dynamic(interner.intern("e")),
        ]
    );
    assert_eq!(
        resolutions(&result, &interner, "p"),
        vec![VarRef::Static { depth: 1, slot: 3 }]
    );
}

#[test]
fn test_top_level_catch_forwards_to_global() {
    let interner = StringInterner::new();
    let result = bind_script("try { } catch (e) { var leaked; }", &interner);
    assert_eq!(names_of(&result, &interner, ScopeKind::Global), vec![vec!["leaked"]]);
    assert_eq!(
        resolutions(&result, &interner, "leaked"),
        vec![VarRef::Dynamic(interner.intern("leaked"))]
    );
    assert_eq!(
        resolutions(&result, &interner, "e"),
        vec![VarRef::Static { depth: 0, slot: 0 }]
    );
}

#[test]
fn test_redeclaration_shares_slot() {
    let interner = StringInterner::new();
    let result = bind_script("function f(x) { var x; var x = 2; return x; }", &interner);
    let slots = resolutions(&result, &interner, "x");
    assert_eq!(slots.len(), 3);
    assert!(slots.iter().all(|r| *r == VarRef::Static { depth: 0, slot: 3 }));
}

// ============================================================================
// Addressing
// ============================================================================

#[test]
fn test_nested_closure_depths() {
    let interner = StringInterner::new();
    let result = bind_script(
        "function a(p) { function b() { function c() { return p; } return p; } }",
        &interner,
    );
    assert_eq!(
        resolutions(&result, &interner, "p"),
        vec![
            VarRef::Static { depth: 2, slot: 3 },
            VarRef::Static { depth: 1, slot: 3 },
        ]
    );
}

#[test]
fn test_inner_declaration_shadows_outer() {
    let interner = StringInterner::new();
    let result = bind_script(
        "function outer() { var v; function inner(q) { var v; return v; } return v; }",
        &interner,
    );
    let v = resolutions(&result, &interner, "v");
    assert_eq!(
        v,
        vec![
            VarRef::Static { depth: 0, slot: 3 },
            VarRef::Static { depth: 0, slot: 4 },
            VarRef::Static { depth: 0, slot: 4 },
            VarRef::Static { depth: 0, slot: 3 },
        ]
    );
}

#[test]
fn test_this_and_arguments() {
    let interner = StringInterner::new();
    let result = bind_script("this; function f() { return this === arguments; }", &interner);
    assert_eq!(
        resolutions(&result, &interner, "this"),
        vec![
            VarRef::Dynamic(interner.well_known().this),
            VarRef::Static { depth: 0, slot: 1 },
        ]
    );
    assert_eq!(
        resolutions(&result, &interner, "arguments"),
        vec![VarRef::Static { depth: 0, slot: 2 }]
    );
}

#[test]
fn test_named_function_expression_sees_itself() {
    let interner = StringInterner::new();
    let result = bind_script("var f = function fact(n) { return fact(n); };", &interner);
    assert_eq!(
        resolutions(&result, &interner, "fact"),
        vec![VarRef::Static { depth: 0, slot: 0 }]
    );
    // The expression name is not visible outside.
    assert_eq!(names_of(&result, &interner, ScopeKind::Global), vec![vec!["f"]]);
}

#[test]
fn test_eval_program_top_level() {
    let interner = StringInterner::new();
    let result = bind_eval("var e1 = outer; function g() { return e1; }", &interner);
    assert_eq!(result.scopes.get(result.root).unwrap().kind(), ScopeKind::Eval);
    assert_eq!(names_of(&result, &interner, ScopeKind::Eval), vec![vec!["e1", "g"]]);
    // Inside the eval program, its own names are still looked up by name.
    assert_eq!(
        resolutions(&result, &interner, "e1"),
        vec![VarRef::Dynamic(interner.intern("e1")); 2]
    );
    assert_eq!(
        resolutions(&result, &interner, "outer"),
        vec![VarRef::Dynamic(interner.intern("outer"))]
    );
}

#[test]
fn test_references_table_matches_log() {
    let interner = StringInterner::new();
    let result = bind_script("var a; function f(b) { return a + b; }", &interner);
    assert_eq!(result.references.len(), result.reference_log.len());
    for reference in &result.reference_log {
        assert_eq!(result.reference(reference.node), Some(reference.var_ref));
    }
}

#[test]
fn test_dynamic_references_inside_functions_are_reported() {
    let interner = StringInterner::new();
    let result = bind_script("var g; function f() { return g; } g;", &interner);
    let reported: Vec<_> = result
        .diagnostics
        .diagnostics()
        .iter()
        .filter(|d| d.code == 6001)
        .collect();
    assert_eq!(reported.len(), 1);
    assert!(reported[0].message_text.contains("'g'"));
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn test_depth_limit_surfaces_as_error() {
    let interner = StringInterner::new();
    let mut source = String::new();
    for _ in 0..8 {
        source.push_str("function f() {");
    }
    source.push_str("free;");
    for _ in 0..8 {
        source.push('}');
    }

    let arena = Bump::new();
    let parsed = Parser::new(&arena, "deep.js", &source, &interner).parse_program();
    let result = Binder::new(&interner)
        .with_limits(ScopeLimits {
            max_depth: 4,
            ..ScopeLimits::default()
        })
        .bind_script(&parsed.program);
    assert_eq!(result.err(), Some(ScopeError::DepthExceeded(4)));
}

#[test]
fn test_descriptor_arena_is_reusable_for_instances() {
    let interner = StringInterner::new();
    let result = bind_script("function f(a) {}", &interner);
    let (_, function) = result
        .scopes
        .iter()
        .find(|(_, scope)| scope.kind() == ScopeKind::Function)
        .unwrap();
    let names = function.table().names();

    let mut instances: ScopeArena<Option<u8>> = ScopeArena::new();
    let global = instances.new_global_instance();
    let instance = instances.new_runtime_template(Some(global), &names).unwrap();
    assert_eq!(instances.get(instance).unwrap().immutable_count(), 4);
}
