//! Inferred map fact
//!
//! The per-package export of the inference engine: determinations reached in
//! this package plus the residual implication edges that downstream packages
//! must keep solving. Only the incremental delta crosses the boundary; an
//! edge whose endpoints both live upstream is never re-exported.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{ConsumerKind, Nilability, ProducerKind, SiteKey};

/// Resolved source position carried on the wire.
///
/// Positions are resolved to file/line/column before export; AST handles do
/// not cross the package boundary.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct FactPos {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for FactPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// One step of an explained nil flow: a producer/consumer pair with the
/// position the pairing was observed at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowStep {
    pub pos: Option<FactPos>,
    pub producer_repr: String,
    pub consumer_repr: String,
}

/// A determined site plus the flow that forced the determination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDetermination {
    pub value: Nilability,
    pub steps: Vec<FlowStep>,
}

impl SiteDetermination {
    pub fn new(value: Nilability) -> Self {
        Self {
            value,
            steps: Vec::new(),
        }
    }

    pub fn with_steps(mut self, steps: Vec<FlowStep>) -> Self {
        self.steps = steps;
        self
    }
}

/// A residual implication: if `from` is nilable then `to` must be nilable.
/// A `to` of `None` is a hard consumer: the value is dereferenced (or
/// otherwise consumed as non-nil) at `consumer_pos`, so `from` turning
/// nilable is a conflict there.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImplicationEdge {
    pub from: SiteKey,
    pub to: Option<SiteKey>,
    pub producer_kind: ProducerKind,
    pub consumer_kind: ConsumerKind,
    pub producer_repr: String,
    pub consumer_repr: String,
    pub producer_pos: Option<FactPos>,
    pub consumer_pos: Option<FactPos>,
}

/// The inferred map exported by one package.
///
/// `determinations` is a `BTreeMap` and `edges` are sorted by
/// [`InferredFact::normalize`], so a normalized fact has exactly one byte
/// representation under the codec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredFact {
    /// Package that produced this fact
    pub pkg: String,
    /// Sites determined while analyzing `pkg`
    pub determinations: BTreeMap<SiteKey, SiteDetermination>,
    /// Unresolved implications still relevant downstream
    pub edges: Vec<ImplicationEdge>,
}

impl InferredFact {
    pub fn new(pkg: impl Into<String>) -> Self {
        Self {
            pkg: pkg.into(),
            determinations: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    /// Sort and dedup edges. Encoding requires a normalized fact.
    pub fn normalize(&mut self) {
        self.edges.sort();
        self.edges.dedup();
    }

    /// Keep only the incremental delta with respect to upstream packages:
    /// every retained site-to-site edge has at least one endpoint declared
    /// in `self.pkg` (hard-consumer edges are kept; their consumer lives
    /// here), and determinations already exported upstream with the same
    /// value are dropped.
    pub fn retain_incremental(&mut self, upstream: &[InferredFact]) {
        let pkg = self.pkg.clone();
        self.edges.retain(|e| match &e.to {
            Some(to) => e.from.declared_in(&pkg) || to.declared_in(&pkg),
            None => true,
        });
        self.determinations.retain(|site, det| {
            !upstream.iter().any(|up| {
                up.determinations
                    .get(site)
                    .map(|d| d.value == det.value)
                    .unwrap_or(false)
            })
        });
    }

    /// Look up a determination across this fact and upstream facts.
    pub fn lookup<'a>(
        facts: &'a [InferredFact],
        site: &SiteKey,
    ) -> Option<&'a SiteDetermination> {
        facts.iter().find_map(|f| f.determinations.get(site))
    }
}
