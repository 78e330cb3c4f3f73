//! Cross-package inference engine
//!
//! Consumes every trigger the package produced, together with upstream
//! facts and syntactic annotations, and determines which annotation sites
//! must be nilable. Two absorption modes exist: full inference interprets
//! each trigger as an implication edge and solves the graph; no-infer mode
//! (selected by the `<nilscan no inference>` package directive) checks each
//! trigger against declared annotations only, with unannotated sites
//! defaulting to non-nil.

pub mod annotations;
pub mod facts_io;
pub mod graph;

pub use annotations::{parse_directives, syntactic_annotations, Mode, PackageDirectives};
pub use facts_io::{export_incremental, seed_from_facts};
pub use graph::{EdgeInfo, ImplicationGraph};

use nilscan_facts::{FactPos, InferredFact, Nilability};
use tracing::{debug, info};

use crate::features::assertion::{FullTrigger, SiteRef};
use crate::features::diagnostics::conflict::{Conflict, ConflictKind};
use crate::shared::models::Package;

/// Result of one package's inference.
#[derive(Debug)]
pub struct InferenceOutcome {
    pub conflicts: Vec<Conflict>,
    pub fact: InferredFact,
}

/// Run inference over the package's triggers.
pub fn run_inference(
    pkg: &Package,
    triggers: &[FullTrigger],
    upstream: &[InferredFact],
    mode: Mode,
) -> InferenceOutcome {
    let mut graph = ImplicationGraph::new();
    seed_from_facts(&mut graph, upstream);
    for (site, value) in syntactic_annotations(pkg) {
        graph.annotate(site, value, Vec::new(), false);
    }

    match mode {
        Mode::FullInfer => absorb_full_infer(pkg, &mut graph, triggers),
        Mode::NoInfer => absorb_no_infer(pkg, &mut graph, triggers),
    }

    let conflicts = graph.take_conflicts();
    let fact = export_incremental(&graph, &pkg.path, upstream);
    info!(
        pkg = %pkg.path,
        sites = graph.num_sites(),
        conflicts = conflicts.len(),
        exported_edges = fact.edges.len(),
        "inference finished"
    );
    InferenceOutcome { conflicts, fact }
}

fn edge_info(pkg: &Package, t: &FullTrigger) -> EdgeInfo {
    let to_fact = |p: Option<crate::shared::models::Pos>| -> Option<FactPos> {
        p.map(|p| p.to_fact(&pkg.files))
    };
    EdgeInfo {
        producer_kind: t.producer.kind,
        consumer_kind: t.consumer.kind,
        producer_repr: t.producer.repr.clone(),
        consumer_repr: t.consumer.repr.clone(),
        producer_pos: to_fact(t.producer.pos),
        consumer_pos: to_fact(t.consumer.pos),
        scope: t.consumer.scope.clone(),
    }
}

/// The effective producer answer once guards are taken into account.
fn effective_producer(t: &FullTrigger) -> SiteRef {
    if t.producer.needs_guard() {
        if t.consumer.guard_matched {
            SiteRef::Literal(Nilability::Nonnil)
        } else {
            SiteRef::Literal(Nilability::Nilable)
        }
    } else {
        t.producer.site.clone()
    }
}

fn absorb_full_infer(pkg: &Package, graph: &mut ImplicationGraph, triggers: &[FullTrigger]) {
    for t in triggers {
        if t.always_safe {
            continue;
        }
        let info = edge_info(pkg, t);
        match effective_producer(t) {
            SiteRef::Literal(Nilability::Nonnil) => {}
            SiteRef::Literal(_) => match &t.consumer.site {
                None => graph.conflict_at(&info, Vec::new()),
                Some(k) => graph.force_nilable(k.clone(), vec![info.step()]),
            },
            SiteRef::Site(k) => {
                graph.add_edge(k, t.consumer.site.clone(), info, false);
            }
        }
    }
}

fn absorb_no_infer(pkg: &Package, graph: &mut ImplicationGraph, triggers: &[FullTrigger]) {
    for t in triggers {
        if t.always_safe || t.from_duplication {
            continue;
        }
        let info = edge_info(pkg, t);

        // unannotated sites default to non-nil in this mode
        let produced = match effective_producer(t) {
            SiteRef::Literal(v) => v,
            SiteRef::Site(k) => match graph.value(&k) {
                Nilability::Nilable => Nilability::Nilable,
                _ => Nilability::Nonnil,
            },
        };
        if produced != Nilability::Nilable {
            continue;
        }

        let consumer_ok = t
            .consumer
            .site
            .as_ref()
            .map(|k| graph.value(k) == Nilability::Nilable)
            .unwrap_or(false);
        if consumer_ok {
            continue;
        }

        debug!(producer = %t.producer.repr, consumer = %t.consumer.repr, "single-assertion conflict");
        graph.push_conflict(
            Conflict::new(
                ConflictKind::SingleAssertion,
                info.consumer_pos.clone(),
                vec![info.step()],
            )
            .with_scope(info.scope.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::features::contracts::ContractMap;
    use crate::features::functions::analyze_functions;
    use crate::shared::testkit::{stmt_node, TestPkg};

    /// foo returns nil; bar dereferences foo's result.
    fn two_function_pkg() -> TestPkg {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();

        let foo = t.func("foo", &[], &[ptr]);
        let nil_val = t.nil(ptr);
        let ret = t.ret(&[nil_val]);
        let cfg = t.linear_cfg(vec![stmt_node(ret)]);
        t.attach_cfg(foo, cfg);

        let bar = t.func("bar", &[], &[]);
        let call = t.call(foo, &[]);
        let deref = t.deref(call);
        let use_stmt = t.expr_stmt(deref);
        let cfg = t.linear_cfg(vec![stmt_node(use_stmt)]);
        t.attach_cfg(bar, cfg);

        t
    }

    #[test]
    fn test_cross_call_nil_flow_detected() {
        let t = two_function_pkg();
        let config = AnalyzerConfig::default();
        let (triggers, errors) = analyze_functions(&t.pkg, &ContractMap::new(), &config);
        assert!(errors.is_empty());

        let outcome = run_inference(&t.pkg, &triggers, &[], Mode::FullInfer);
        assert_eq!(outcome.conflicts.len(), 1);
        let flow = &outcome.conflicts[0].flow;
        assert!(flow.len() >= 2);
        assert!(flow[0].producer_repr.contains("nil"));
        assert!(flow.last().unwrap().consumer_repr.contains("dereferenced"));
    }

    #[test]
    fn test_no_infer_skips_unannotated() {
        let t = two_function_pkg();
        let config = AnalyzerConfig::default();
        let (triggers, _) = analyze_functions(&t.pkg, &ContractMap::new(), &config);

        // foo's result site is unannotated, so it defaults to non-nil and
        // the literal-nil return is itself the only conflict
        let outcome = run_inference(&t.pkg, &triggers, &[], Mode::NoInfer);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::SingleAssertion);
    }

    #[test]
    fn test_no_infer_respects_nilable_annotation() {
        let mut t = two_function_pkg();
        // annotate foo's result nilable: returning nil is fine, but the
        // dereference of a nilable-annotated result is not
        t.set_doc(crate::shared::models::FuncId(0), &["nilable(result)"]);

        let config = AnalyzerConfig::default();
        let (triggers, _) = analyze_functions(&t.pkg, &ContractMap::new(), &config);
        let outcome = run_inference(&t.pkg, &triggers, &[], Mode::NoInfer);

        assert_eq!(outcome.conflicts.len(), 1);
        assert!(outcome.conflicts[0]
            .flow
            .last()
            .unwrap()
            .consumer_repr
            .contains("dereferenced"));
    }

    #[test]
    fn test_exported_fact_round_trips() {
        let t = two_function_pkg();
        let config = AnalyzerConfig::default();
        let (triggers, _) = analyze_functions(&t.pkg, &ContractMap::new(), &config);
        let outcome = run_inference(&t.pkg, &triggers, &[], Mode::FullInfer);

        let bytes = nilscan_facts::encode_inferred(&outcome.fact).unwrap();
        let decoded = nilscan_facts::decode_inferred(&bytes).unwrap();
        assert_eq!(decoded, outcome.fact);
        // foo's result was determined nilable locally and is exported
        assert!(outcome.fact.determinations.keys().any(|k| matches!(
            k,
            nilscan_facts::SiteKey::Result { func, .. } if func == "foo"
        )));
    }
}
