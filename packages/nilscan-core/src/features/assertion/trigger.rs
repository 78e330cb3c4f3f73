//! Full triggers
//!
//! The fundamental claim of the analysis: "if this producer is nilable then
//! this consumer observes nil." Backprop emits these per function; the
//! inference engine absorbs them per package.

use serde::{Deserialize, Serialize};

use nilscan_facts::{ConsumerKind, ProducerKind, SiteKey};
use rustc_hash::FxHashSet;

use super::consumer::Consumer;
use super::producer::{Producer, SiteRef};
use crate::shared::models::{AstRead, Pos};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullTrigger {
    pub producer: Producer,
    pub consumer: Consumer,
    /// Cloned from a contracted function's triggers into the caller context
    pub from_duplication: bool,
    /// Known safe at construction; kept for explanation completeness only
    pub always_safe: bool,
}

impl FullTrigger {
    pub fn new(producer: Producer, consumer: Consumer) -> Self {
        Self {
            producer,
            consumer,
            from_duplication: false,
            always_safe: false,
        }
    }

    pub fn duplicated(mut self) -> Self {
        self.from_duplication = true;
        self
    }

    pub fn safe(mut self) -> Self {
        self.always_safe = true;
        self
    }

    pub fn producer_pos(&self, ast: &impl AstRead) -> Option<Pos> {
        self.producer
            .pos
            .or_else(|| self.producer.expr.and_then(|e| ast.expr_pos(e)))
    }

    pub fn consumer_pos(&self, ast: &impl AstRead) -> Option<Pos> {
        self.consumer
            .pos
            .or_else(|| self.consumer.expr.and_then(|e| ast.expr_pos(e)))
    }

    /// Coalescing key: producer site, consumer site, both positions.
    fn coalesce_key(&self, ast: &impl AstRead) -> TriggerKey {
        TriggerKey {
            producer_kind: self.producer.kind,
            producer_site: self.producer.site.site().cloned(),
            consumer_kind: self.consumer.kind,
            consumer_site: self.consumer.site.clone(),
            producer_pos: self.producer_pos(ast),
            consumer_pos: self.consumer_pos(ast),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct TriggerKey {
    producer_kind: ProducerKind,
    producer_site: Option<SiteKey>,
    consumer_kind: ConsumerKind,
    consumer_site: Option<SiteKey>,
    producer_pos: Option<Pos>,
    consumer_pos: Option<Pos>,
}

/// Drop duplicate triggers, preserving first-seen order. Two triggers are
/// duplicates when they agree on producer site, consumer site and both AST
/// positions.
pub fn coalesce(triggers: Vec<FullTrigger>, ast: &impl AstRead) -> Vec<FullTrigger> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::with_capacity(triggers.len());
    for t in triggers {
        if seen.insert(t.coalesce_key(ast)) {
            out.push(t);
        }
    }
    out
}

/// Resolve every trigger's positions against `ast` and store them on the
/// trigger. Per-function analyses call this before their synthetic AST
/// overlay is discarded; afterwards positions no longer require the arena.
pub fn bake_positions(triggers: &mut [FullTrigger], ast: &impl AstRead) {
    for t in triggers.iter_mut() {
        if t.producer.pos.is_none() {
            t.producer.pos = t.producer.expr.and_then(|e| ast.expr_pos(e));
        }
        if t.consumer.pos.is_none() {
            t.consumer.pos = t.consumer.expr.and_then(|e| ast.expr_pos(e));
        }
    }
}

/// Convenience for tests and sub-analyzers: does any trigger reference the
/// given producer site?
pub fn any_with_producer_site(triggers: &[FullTrigger], site: &SiteKey) -> bool {
    triggers
        .iter()
        .any(|t| matches!(&t.producer.site, SiteRef::Site(s) if s == site))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testkit::TestPkg;

    #[test]
    fn test_coalesce_drops_exact_duplicates() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let f = t.func("Load", &[], &[ptr]);
        let call = t.call(f, &[]);
        let d = t.deref(call);

        let make = |t: &TestPkg| {
            FullTrigger::new(
                Producer::func_return(&t.pkg, f, 0, call),
                Consumer::deref(d),
            )
        };
        let triggers = vec![make(&t), make(&t)];
        let coalesced = coalesce(triggers, t.ast());
        assert_eq!(coalesced.len(), 1);
    }

    #[test]
    fn test_coalesce_keeps_distinct_positions() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let f = t.func("Load", &[], &[ptr]);
        let call_a = t.call(f, &[]);
        let call_b = t.call(f, &[]);
        let deref_a = t.deref(call_a);
        let deref_b = t.deref(call_b);

        let triggers = vec![
            FullTrigger::new(
                Producer::func_return(&t.pkg, f, 0, call_a),
                Consumer::deref(deref_a),
            ),
            FullTrigger::new(
                Producer::func_return(&t.pkg, f, 0, call_b),
                Consumer::deref(deref_b),
            ),
        ];
        let coalesced = coalesce(triggers, t.ast());
        assert_eq!(coalesced.len(), 2);
    }

    #[test]
    fn test_duplicated_marker() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let f = t.func("Load", &[], &[ptr]);
        let call = t.call(f, &[]);
        let d = t.deref(call);

        let trig = FullTrigger::new(
            Producer::contracted_return(&t.pkg, f, 0, call),
            Consumer::deref(d),
        )
        .duplicated();
        assert!(trig.from_duplication);
        assert!(!trig.always_safe);
    }
}
