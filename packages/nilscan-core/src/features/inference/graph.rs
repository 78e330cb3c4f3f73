//! Implication graph
//!
//! Sites live in a flat arena indexed by `SiteId`; edges are kept in one
//! vector with a per-site adjacency list. An edge `A -> B` means "A
//! nilable forces B nilable"; an edge with no target site is a hard
//! consumer (a dereference). Determinations are immutable once made:
//! forcing nilable onto a site pinned non-nil, or into a hard consumer, is
//! an overconstraint conflict carrying the full explanation chain.

use rustc_hash::FxHashMap;

use nilscan_facts::{ConsumerKind, FactPos, FlowStep, Nilability, ProducerKind, SiteKey};

use crate::features::diagnostics::conflict::{Conflict, ConflictKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiteId(pub u32);

/// Everything a fired edge needs to explain itself.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeInfo {
    pub producer_kind: ProducerKind,
    pub consumer_kind: ConsumerKind,
    pub producer_repr: String,
    pub consumer_repr: String,
    pub producer_pos: Option<FactPos>,
    pub consumer_pos: Option<FactPos>,
    pub scope: Option<String>,
}

impl EdgeInfo {
    pub fn step(&self) -> FlowStep {
        FlowStep {
            pos: self.producer_pos.clone().or_else(|| self.consumer_pos.clone()),
            producer_repr: self.producer_repr.clone(),
            consumer_repr: self.consumer_repr.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeTarget {
    Site(SiteId),
    /// The consumer requires non-nil on the spot
    Hard,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub from: SiteId,
    pub target: EdgeTarget,
    pub info: EdgeInfo,
    pub upstream: bool,
    fired: bool,
}

#[derive(Debug, Clone)]
struct SiteRecord {
    key: SiteKey,
    value: Nilability,
    /// Explanation of a nilable determination
    chain: Vec<FlowStep>,
    /// Came in through upstream facts
    upstream: bool,
}

#[derive(Debug, Default)]
pub struct ImplicationGraph {
    sites: Vec<SiteRecord>,
    index: FxHashMap<SiteKey, SiteId>,
    edges: Vec<Edge>,
    out: FxHashMap<SiteId, Vec<usize>>,
    conflicts: Vec<Conflict>,
}

impl ImplicationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, key: SiteKey) -> SiteId {
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = SiteId(self.sites.len() as u32);
        self.sites.push(SiteRecord {
            key: key.clone(),
            value: Nilability::Undetermined,
            chain: Vec::new(),
            upstream: false,
        });
        self.index.insert(key, id);
        id
    }

    pub fn value(&self, key: &SiteKey) -> Nilability {
        self.index
            .get(key)
            .map(|id| self.sites[id.0 as usize].value)
            .unwrap_or(Nilability::Undetermined)
    }

    /// Pin a site's value ahead of solving (upstream fact or syntactic
    /// annotation). The first determination wins; later contradictions are
    /// conflicts when nilable meets non-nil.
    pub fn annotate(
        &mut self,
        key: SiteKey,
        value: Nilability,
        chain: Vec<FlowStep>,
        upstream: bool,
    ) {
        let id = self.intern(key);
        let record = &mut self.sites[id.0 as usize];
        record.upstream = record.upstream || upstream;
        if record.value == Nilability::Undetermined {
            record.value = value;
            record.chain = chain;
            if value == Nilability::Nilable {
                self.propagate_from(id);
            }
        }
    }

    /// Add an implication edge. Fires immediately when the producer site is
    /// already nilable.
    pub fn add_edge(&mut self, from: SiteKey, to: Option<SiteKey>, info: EdgeInfo, upstream: bool) {
        let from_id = self.intern(from);
        let target = match to {
            Some(k) => EdgeTarget::Site(self.intern(k)),
            None => EdgeTarget::Hard,
        };
        let idx = self.edges.len();
        self.edges.push(Edge {
            from: from_id,
            target,
            info,
            upstream,
            fired: false,
        });
        self.out.entry(from_id).or_default().push(idx);
        if self.sites[from_id.0 as usize].value == Nilability::Nilable {
            self.fire(idx);
        }
    }

    /// Force a site nilable with the given explanation, then propagate.
    pub fn force_nilable(&mut self, key: SiteKey, chain: Vec<FlowStep>) {
        let id = self.intern(key);
        let record = &mut self.sites[id.0 as usize];
        match record.value {
            Nilability::Nilable => {}
            Nilability::Undetermined => {
                record.value = Nilability::Nilable;
                record.chain = chain;
                self.propagate_from(id);
            }
            Nilability::Nonnil => {
                // overconstraint: nilable chain meets a pinned non-nil site
                let mut flow = chain;
                flow.push(FlowStep {
                    pos: None,
                    producer_repr: format!("site `{}`", record.key),
                    consumer_repr: "required non-nil by its annotation".into(),
                });
                self.conflicts
                    .push(Conflict::new(ConflictKind::Overconstraint, None, flow));
            }
        }
    }

    /// A nil value arrives directly at a hard consumer.
    pub fn conflict_at(&mut self, info: &EdgeInfo, mut prefix: Vec<FlowStep>) {
        prefix.push(info.step());
        self.conflicts.push(
            Conflict::new(
                ConflictKind::Overconstraint,
                info.consumer_pos.clone(),
                prefix,
            )
            .with_scope(info.scope.clone()),
        );
    }

    fn propagate_from(&mut self, id: SiteId) {
        let mut stack = vec![id];
        while let Some(s) = stack.pop() {
            let edge_ids = self.out.get(&s).cloned().unwrap_or_default();
            for e in edge_ids {
                if self.edges[e].fired {
                    continue;
                }
                if let Some(next) = self.fire(e) {
                    stack.push(next);
                }
            }
        }
    }

    /// Fire one edge from a nilable site. Returns a newly-nilable site to
    /// continue propagation from.
    fn fire(&mut self, edge_idx: usize) -> Option<SiteId> {
        self.edges[edge_idx].fired = true;
        let edge = self.edges[edge_idx].clone();
        let from_chain = self.sites[edge.from.0 as usize].chain.clone();
        let mut chain = from_chain;
        chain.push(edge.info.step());

        match edge.target {
            EdgeTarget::Hard => {
                self.conflicts.push(
                    Conflict::new(
                        ConflictKind::Overconstraint,
                        edge.info.consumer_pos.clone(),
                        chain,
                    )
                    .with_scope(edge.info.scope.clone()),
                );
                None
            }
            EdgeTarget::Site(to) => {
                let record = &mut self.sites[to.0 as usize];
                match record.value {
                    Nilability::Nilable => None,
                    Nilability::Undetermined => {
                        record.value = Nilability::Nilable;
                        record.chain = chain;
                        Some(to)
                    }
                    Nilability::Nonnil => {
                        let mut flow = chain;
                        flow.push(FlowStep {
                            pos: None,
                            producer_repr: format!("site `{}`", record.key),
                            consumer_repr: "required non-nil by its annotation".into(),
                        });
                        self.conflicts.push(
                            Conflict::new(
                                ConflictKind::Overconstraint,
                                edge.info.consumer_pos.clone(),
                                flow,
                            )
                            .with_scope(edge.info.scope.clone()),
                        );
                        None
                    }
                }
            }
        }
    }

    pub fn push_conflict(&mut self, conflict: Conflict) {
        self.conflicts.push(conflict);
    }

    pub fn take_conflicts(&mut self) -> Vec<Conflict> {
        std::mem::take(&mut self.conflicts)
    }

    /// Determinations made in this package (not seeded from upstream).
    pub fn local_determinations(&self) -> Vec<(SiteKey, Nilability, Vec<FlowStep>)> {
        self.sites
            .iter()
            .filter(|s| !s.upstream && s.value.is_determined())
            .map(|s| (s.key.clone(), s.value, s.chain.clone()))
            .collect()
    }

    /// Residual local edges: not upstream, producer still undetermined.
    pub fn residual_edges(&self) -> Vec<(SiteKey, Option<SiteKey>, EdgeInfo)> {
        self.edges
            .iter()
            .filter(|e| !e.upstream)
            .filter(|e| self.sites[e.from.0 as usize].value == Nilability::Undetermined)
            .map(|e| {
                let to = match e.target {
                    EdgeTarget::Site(s) => Some(self.sites[s.0 as usize].key.clone()),
                    EdgeTarget::Hard => None,
                };
                (self.sites[e.from.0 as usize].key.clone(), to, e.info.clone())
            })
            .collect()
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }
}
