//! Conflicts
//!
//! A conflict is the inference engine's proof that nil reaches a place that
//! requires non-nil. The flow is a list of steps, each pairing a producer
//! repr with the consumer repr it feeds; the final step's consumer is the
//! dereference (or other hard requirement) the diagnostic points at.

use serde::{Deserialize, Serialize};

use nilscan_facts::{FactPos, FlowStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// No-infer mode: one trigger whose annotated producer is nilable
    SingleAssertion,
    /// Full-infer mode: a nilability chain meets a non-nil requirement
    Overconstraint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Position of the consuming end, where the diagnostic is reported
    pub pos: Option<FactPos>,
    /// Nil flow from source to the consumption point
    pub flow: Vec<FlowStep>,
    /// Enclosing function of the consumer, when known
    pub scope: Option<String>,
    /// Positions of similar conflicts merged into this one by grouping
    pub similar: Vec<Option<FactPos>>,
}

impl Conflict {
    pub fn new(kind: ConflictKind, pos: Option<FactPos>, flow: Vec<FlowStep>) -> Self {
        Self {
            kind,
            pos,
            flow,
            scope: None,
            similar: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Grouping key: the nil path identified by producer positions and
    /// reprs; conflicts sharing it are merged. When any step of the path
    /// lacks a producer position, positions cannot identify the path, so
    /// the key falls back to producer and consumer reprs prefixed by the
    /// enclosing function. Without the prefix, two unrelated flows from
    /// same-repr unpositioned producers in different functions would
    /// collapse into one diagnostic.
    pub fn group_key(&self) -> String {
        let fully_positioned = self.flow.iter().all(|s| s.pos.is_some());
        if fully_positioned {
            let path: Vec<String> = self
                .flow
                .iter()
                .map(|s| {
                    format!(
                        "{}@{}",
                        s.producer_repr,
                        s.pos.as_ref().map(|p| p.to_string()).unwrap_or_default()
                    )
                })
                .collect();
            path.join("|")
        } else {
            let scope = self.scope.as_deref().unwrap_or("<unknown>");
            let reprs: Vec<String> = self
                .flow
                .iter()
                .map(|s| format!("{} {}", s.producer_repr, s.consumer_repr))
                .collect();
            format!("{}::{}", scope, reprs.join("|"))
        }
    }
}
