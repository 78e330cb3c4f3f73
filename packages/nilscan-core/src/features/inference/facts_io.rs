//! Fact import/export for the inference engine
//!
//! Upstream inferred maps seed the graph read-only; after absorption the
//! incremental delta (local determinations plus residual edges touching
//! this package) is packaged for downstream consumers.

use nilscan_facts::{ImplicationEdge, InferredFact, SiteDetermination};

use super::graph::{EdgeInfo, ImplicationGraph};

/// Seed the graph from upstream package facts.
pub fn seed_from_facts(graph: &mut ImplicationGraph, upstream: &[InferredFact]) {
    for fact in upstream {
        for (site, det) in &fact.determinations {
            graph.annotate(site.clone(), det.value, det.steps.clone(), true);
        }
        for edge in &fact.edges {
            let info = EdgeInfo {
                producer_kind: edge.producer_kind,
                consumer_kind: edge.consumer_kind,
                producer_repr: edge.producer_repr.clone(),
                consumer_repr: edge.consumer_repr.clone(),
                producer_pos: edge.producer_pos.clone(),
                consumer_pos: edge.consumer_pos.clone(),
                scope: None,
            };
            graph.add_edge(edge.from.clone(), edge.to.clone(), info, true);
        }
    }
}

/// Build the incremental fact this package exports.
pub fn export_incremental(
    graph: &ImplicationGraph,
    pkg_path: &str,
    upstream: &[InferredFact],
) -> InferredFact {
    let mut fact = InferredFact::new(pkg_path);

    for (site, value, steps) in graph.local_determinations() {
        fact.determinations
            .insert(site, SiteDetermination::new(value).with_steps(steps));
    }

    for (from, to, info) in graph.residual_edges() {
        fact.edges.push(ImplicationEdge {
            from,
            to,
            producer_kind: info.producer_kind,
            consumer_kind: info.consumer_kind,
            producer_repr: info.producer_repr,
            consumer_repr: info.consumer_repr,
            producer_pos: info.producer_pos,
            consumer_pos: info.consumer_pos,
        });
    }

    fact.retain_incremental(upstream);
    fact.normalize();
    fact
}
