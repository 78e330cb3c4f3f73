//! Assertion state
//!
//! The set of outstanding non-nil obligations at one program point, keyed
//! by the canonical key of the asserted expression. The key space is a
//! tree: `x.f[i]` is rooted at `x`, and an assignment to `x` must rewrite
//! or resolve everything under it. At most one node exists per key; merging
//! two states unions consumer lists and keeps a guard match only when every
//! incoming path witnessed it.

use rustc_hash::FxHashMap;

use crate::features::assertion::Consumer;
use crate::shared::models::{ExprKey, FieldId, Package, TypeId, VarId};

/// One chain step applied on top of a root expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Field(FieldId),
    Index,
    Deref,
}

/// Decompose `key` into its root variable and the steps leading out to the
/// full chain, outermost step last.
pub fn decompose(key: &ExprKey) -> (VarId, Vec<Step>) {
    match key {
        ExprKey::Var(v) => (*v, Vec::new()),
        ExprKey::Field(base, f) => {
            let (root, mut steps) = decompose(base);
            steps.push(Step::Field(*f));
            (root, steps)
        }
        ExprKey::Index(base) => {
            let (root, mut steps) = decompose(base);
            steps.push(Step::Index);
            (root, steps)
        }
        ExprKey::Deref(base) => {
            let (root, mut steps) = decompose(base);
            steps.push(Step::Deref);
            (root, steps)
        }
    }
}

/// Rebuild a key by applying `steps` (outermost last) on `base`.
pub fn apply_steps(base: ExprKey, steps: &[Step]) -> ExprKey {
    steps.iter().fold(base, |k, s| match s {
        Step::Field(f) => ExprKey::Field(Box::new(k), *f),
        Step::Index => ExprKey::Index(Box::new(k)),
        Step::Deref => ExprKey::Deref(Box::new(k)),
    })
}

/// Steps of `key` beyond `prefix`, if `prefix` is a prefix of `key`.
pub fn strip_prefix(key: &ExprKey, prefix: &ExprKey) -> Option<Vec<Step>> {
    let (kr, ks) = decompose(key);
    let (pr, ps) = decompose(prefix);
    if kr != pr || ks.len() < ps.len() || ks[..ps.len()] != ps[..] {
        return None;
    }
    Some(ks[ps.len()..].to_vec())
}

/// Static type of the expression a key denotes, following the chain from
/// its root variable.
pub fn key_type(pkg: &Package, key: &ExprKey) -> Option<TypeId> {
    let (root, steps) = decompose(key);
    let mut ty = pkg.var(root).ty;
    for s in steps {
        ty = match s {
            Step::Field(f) => pkg.field(f).ty,
            Step::Index => pkg.types.elem(ty)?,
            Step::Deref => pkg.types.pointee(ty)?,
        };
    }
    Some(ty)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionNode {
    pub consumers: Vec<Consumer>,
}

impl AssertionNode {
    fn absorb(&mut self, consumer: Consumer) {
        for existing in &mut self.consumers {
            if same_obligation(existing, &consumer) {
                // a guard match survives only when both paths carry it
                existing.guard_matched = existing.guard_matched && consumer.guard_matched;
                return;
            }
        }
        self.consumers.push(consumer);
    }
}

fn same_obligation(a: &Consumer, b: &Consumer) -> bool {
    a.kind == b.kind && a.expr == b.expr && a.site == b.site
}

/// Outstanding obligations at one program point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionState {
    nodes: FxHashMap<ExprKey, AssertionNode>,
}

impl AssertionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn insert(&mut self, key: ExprKey, consumer: Consumer) {
        self.nodes.entry(key).or_default().absorb(consumer);
    }

    pub fn get(&self, key: &ExprKey) -> Option<&AssertionNode> {
        self.nodes.get(key)
    }

    /// Remove and return the node at exactly `key`.
    pub fn take(&mut self, key: &ExprKey) -> Option<AssertionNode> {
        self.nodes.remove(key)
    }

    /// Remove and return every node at or under `key`, each with its steps
    /// beyond `key` (empty steps = the node at `key` itself). Keys are
    /// processed in their total order so trigger emission is reproducible.
    pub fn take_subtree(&mut self, key: &ExprKey) -> Vec<(Vec<Step>, AssertionNode)> {
        let mut matching: Vec<ExprKey> = self
            .nodes
            .keys()
            .filter(|k| strip_prefix(k, key).is_some())
            .cloned()
            .collect();
        matching.sort();
        let mut out = Vec::with_capacity(matching.len());
        for k in matching {
            let steps = strip_prefix(&k, key).unwrap_or_default();
            if let Some(node) = self.nodes.remove(&k) {
                out.push((steps, node));
            }
        }
        out.sort_by_key(|(steps, _)| steps.len());
        out
    }

    /// All nodes, drained, in an unspecified but stable-keyed order.
    pub fn drain(&mut self) -> Vec<(ExprKey, AssertionNode)> {
        let mut out: Vec<(ExprKey, AssertionNode)> = self.nodes.drain().collect();
        out.sort_by(|(a, _), (b, _)| a.cmp(b));
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExprKey, &AssertionNode)> {
        self.nodes.iter()
    }

    /// Union with another state.
    pub fn merge(&mut self, other: &AssertionState) {
        for (key, node) in &other.nodes {
            for c in &node.consumers {
                self.insert(key.clone(), c.clone());
            }
        }
    }

    /// Mark every consumer under `key` as guard-matched.
    pub fn mark_guarded(&mut self, key: &ExprKey) {
        if let Some(node) = self.nodes.get_mut(key) {
            for c in &mut node.consumers {
                c.guard_matched = true;
            }
        }
    }
}

impl AssertionState {
    /// Obligation count across all nodes; used by convergence accounting.
    pub fn total_consumers(&self) -> usize {
        self.nodes.values().map(|n| n.consumers.len()).sum()
    }
}
