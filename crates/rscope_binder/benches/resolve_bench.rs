use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rscope_binder::{resolve, DescriptorArena, ScopeArena, ScopeId};
use rscope_core::intern::{InternedString, StringInterner};

const CHAIN_DEPTH: usize = 32;

fn build_chain(interner: &StringInterner) -> (DescriptorArena, ScopeId, Vec<InternedString>) {
    let well_known = interner.well_known();
    let mut arena = DescriptorArena::new();
    let global = arena.new_global();
    let mut scope = global;
    let mut names = Vec::with_capacity(CHAIN_DEPTH);
    for depth in 0..CHAIN_DEPTH {
        let params: Vec<_> = (0..4)
            .map(|i| interner.intern(&format!("p{}_{}", depth, i)))
            .collect();
        names.push(params[0]);
        scope = arena
            .new_function(Some(scope), None, &well_known, &params)
            .expect("chain scope");
    }
    (arena, scope, names)
}

fn bench_resolve(c: &mut Criterion) {
    let interner = StringInterner::new();
    let (arena, innermost, names) = build_chain(&interner);
    let shallow = names[CHAIN_DEPTH - 1];
    let deep = names[0];
    let missing = interner.intern("not_declared");

    c.bench_function("resolve_depth_0", |b| {
        b.iter(|| resolve(&arena, black_box(innermost), black_box(shallow)))
    });
    c.bench_function("resolve_depth_31", |b| {
        b.iter(|| resolve(&arena, black_box(innermost), black_box(deep)))
    });
    c.bench_function("resolve_dynamic_miss", |b| {
        b.iter(|| resolve(&arena, black_box(innermost), black_box(missing)))
    });
}

fn bench_materialize(c: &mut Criterion) {
    let interner = StringInterner::new();
    let names: Vec<_> = (0..16).map(|i| interner.intern(&format!("v{}", i))).collect();

    c.bench_function("runtime_template_16", |b| {
        let mut arena: ScopeArena<Option<f64>> = ScopeArena::new();
        let global = arena.new_global_instance();
        b.iter(|| {
            let id = arena
                .new_runtime_template(Some(global), black_box(&names))
                .expect("template");
            arena.remove(id)
        })
    });
}

criterion_group!(benches, bench_resolve, bench_materialize);
criterion_main!(benches);
