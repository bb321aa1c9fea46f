//! The pool of runtime scope instances and its collector.
//!
//! Instances reference their parents and closures reference the instance they
//! were created in, so instance lifetimes follow reachability rather than
//! call nesting. The collector marks everything reachable from the roots it
//! is handed and drops the rest; handles to dropped instances go stale.

use crate::value::Value;
use rscope_binder::{ScopeArena, ScopeId, ScopeLimits};
use rustc_hash::FxHashSet;
use std::ops::{Deref, DerefMut};

/// Live-instance count above which a collection is due.
pub const DEFAULT_GC_THRESHOLD: usize = 256;

/// Collects the scope handles reachable from a value.
pub trait Trace {
    fn trace(&self, tracer: &mut Tracer);
}

/// Worklist of instances still to be scanned during marking.
#[derive(Default)]
pub struct Tracer {
    pending: Vec<ScopeId>,
}

impl Tracer {
    #[inline]
    pub fn mark(&mut self, scope: ScopeId) {
        self.pending.push(scope);
    }
}

impl Trace for Value {
    fn trace(&self, tracer: &mut Tracer) {
        match self {
            Value::Function(closure) => tracer.mark(closure.scope),
            Value::Arguments(values) => values.iter().for_each(|value| value.trace(tracer)),
            Value::Undefined
            | Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::Error(_) => {}
        }
    }
}

impl Trace for ScopeId {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.mark(*self);
    }
}

/// Runtime instances, addressed by generational handles.
#[derive(Debug)]
pub struct ScopeHeap {
    scopes: ScopeArena<Value>,
    gc_threshold: usize,
    collections: u64,
}

impl ScopeHeap {
    pub fn new(limits: ScopeLimits, gc_threshold: usize) -> Self {
        Self {
            scopes: ScopeArena::with_limits(limits),
            gc_threshold,
            collections: 0,
        }
    }

    /// Number of live instances.
    #[inline]
    pub fn live(&self) -> usize {
        self.scopes.len()
    }

    #[inline]
    pub fn gc_threshold(&self) -> usize {
        self.gc_threshold
    }

    /// Completed collection cycles.
    #[inline]
    pub fn collections(&self) -> u64 {
        self.collections
    }

    pub fn should_collect(&self) -> bool {
        self.live() > self.gc_threshold
    }

    /// Mark from `roots`, then drop every unmarked instance. Returns the
    /// number of instances reclaimed.
    pub fn collect(&mut self, roots: &[&dyn Trace]) -> usize {
        let mut tracer = Tracer::default();
        for root in roots {
            root.trace(&mut tracer);
        }

        let mut marked = FxHashSet::default();
        while let Some(id) = tracer.pending.pop() {
            let Ok(scope) = self.scopes.get(id) else {
                continue;
            };
            if !marked.insert(id) {
                continue;
            }
            if let Some(parent) = scope.parent() {
                tracer.mark(parent);
            }
            for value in scope.values().unwrap_or_default() {
                value.trace(&mut tracer);
            }
        }

        let garbage: Vec<ScopeId> = self.scopes.ids().filter(|id| !marked.contains(id)).collect();
        for &id in &garbage {
            self.scopes.remove(id);
        }
        self.collections += 1;
        tracing::debug!(
            freed = garbage.len(),
            live = self.scopes.len(),
            cycle = self.collections,
            "collected scope instances"
        );
        garbage.len()
    }
}

impl Deref for ScopeHeap {
    type Target = ScopeArena<Value>;

    fn deref(&self) -> &Self::Target {
        &self.scopes
    }
}

impl DerefMut for ScopeHeap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Closure;
    use rscope_core::intern::StringInterner;
    use rscope_emitter::{EntryMode, FunctionCode, ScopeEntry};
    use std::rc::Rc;

    fn closure_over(scope: ScopeId) -> Value {
        let code = FunctionCode {
            name: None,
            params: Vec::new(),
            self_slot: None,
            this_slot: None,
            arguments_slot: None,
            entry: ScopeEntry {
                names: Rc::from(Vec::new()),
                hoisted: Vec::new(),
                mode: EntryMode::Template,
            },
            body: Vec::new(),
            strict: false,
            span: Default::default(),
        };
        Value::Function(Rc::new(Closure {
            code: Rc::new(code),
            scope,
        }))
    }

    #[test]
    fn test_unreachable_instances_are_reclaimed() {
        let interner = StringInterner::new();
        let mut heap = ScopeHeap::new(ScopeLimits::default(), 1);
        let global = heap.new_global_instance();
        let names = [interner.intern("a")];
        let dropped = heap.new_runtime_template(Some(global), &names).unwrap();
        assert_eq!(heap.live(), 2);
        assert!(heap.should_collect());

        let roots: [&dyn Trace; 1] = [&global];
        assert_eq!(heap.collect(&roots), 1);
        assert!(!heap.contains(dropped));
        assert!(heap.contains(global));
        assert_eq!(heap.collections(), 1);
    }

    #[test]
    fn test_closures_keep_their_scope_chain_alive() {
        let interner = StringInterner::new();
        let mut heap = ScopeHeap::new(ScopeLimits::default(), DEFAULT_GC_THRESHOLD);
        let global = heap.new_global_instance();
        let names = [interner.intern("v")];
        let outer = heap.new_runtime_template(Some(global), &names).unwrap();
        let inner = heap.new_runtime_template(Some(outer), &names).unwrap();
        let keep = interner.intern("keep");
        heap.set_value(global, keep, closure_over(inner)).unwrap();

        let roots: [&dyn Trace; 1] = [&global];
        assert_eq!(heap.collect(&roots), 0);
        assert!(heap.contains(outer));
        assert!(heap.contains(inner));

        heap.set_value(global, keep, Value::Undefined).unwrap();
        assert_eq!(heap.collect(&roots), 2);
    }

    #[test]
    fn test_value_roots_and_arguments_are_traced() {
        let mut heap = ScopeHeap::new(ScopeLimits::default(), DEFAULT_GC_THRESHOLD);
        let global = heap.new_global_instance();
        let scope = heap.new_eval_instance(global).unwrap();
        let arguments = Value::Arguments(Rc::from(vec![Value::Null, closure_over(scope)]));

        let roots: [&dyn Trace; 2] = [&global, &arguments];
        assert_eq!(heap.collect(&roots), 0);
        assert!(heap.contains(scope));
    }

    #[test]
    fn test_stale_roots_are_ignored() {
        let mut heap = ScopeHeap::new(ScopeLimits::default(), DEFAULT_GC_THRESHOLD);
        let global = heap.new_global_instance();
        let gone = heap.new_eval_instance(global).unwrap();
        heap.remove(gone);
        let roots: [&dyn Trace; 2] = [&global, &gone];
        assert_eq!(heap.collect(&roots), 0);
        assert_eq!(heap.live(), 1);
    }
}
