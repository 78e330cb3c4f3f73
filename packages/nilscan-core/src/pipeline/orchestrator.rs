//! Package orchestrator
//!
//! Executes the sub-analyzer DAG for one package. Every stage runs behind
//! a panic handler; stage errors skip dependents and are joined into a
//! single diagnostic pinned at position 1 of the package, so the analyzer
//! never crashes the driver it runs under.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use nilscan_facts::{FactPos, InferredFact};

use crate::config::AnalyzerConfig;
use crate::features::affiliation::analyze_affiliations;
use crate::features::contracts::collect_contracts;
use crate::features::diagnostics::{emit_diagnostics, export_nolint, Diagnostic};
use crate::features::functions::analyze_functions;
use crate::features::globals::analyze_globals;
use crate::features::inference::{parse_directives, run_inference};
use crate::shared::models::{NilscanError, Package, Result};

use super::dag::{StageDag, StageId, StageState};
use super::pass::Pass;
use super::result::{PackageResult, StageResult};

/// Position 1 of the package: first file, first line.
fn position_one(pkg: &Package) -> Option<FactPos> {
    pkg.files.iter().next().map(|(_, name)| FactPos {
        file: name.to_string(),
        line: 1,
        col: 1,
    })
}

/// Analyze one package end to end.
pub fn run_package(pass: &Pass<'_>) -> PackageResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| run_stages(pass)));
    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            warn!(pkg = %pass.pkg.path, panic = %msg, "package analysis panicked");
            let mut result = PackageResult::default();
            result.errors.push(format!("internal panic: {}", msg));
            result.diagnostics.push(Diagnostic {
                pos: position_one(pass.pkg),
                message: format!("INTERNAL ERROR: analysis panicked: {}", msg),
            });
            result
        }
    }
}

fn run_stages(pass: &Pass<'_>) -> PackageResult {
    let pkg = pass.pkg;
    let mut result = PackageResult::default();

    if let Err(e) = pass.config.validate() {
        result.errors.push(e.to_string());
        result.diagnostics.push(Diagnostic {
            pos: position_one(pkg),
            message: format!("INTERNAL ERROR: invalid configuration: {}", e),
        });
        return result;
    }

    // nolint ranges are exported even when the package is out of scope, so
    // suppression at definition sites keeps working downstream
    result.nolint_fact = Some(export_nolint(pkg));
    if let Some(fact) = &result.nolint_fact {
        if let Err(e) = pass.facts.store_nolint(fact) {
            result.errors.push(e.to_string());
        }
    }

    if !pass.config.pkg_in_scope(&pkg.path) {
        debug!(pkg = %pkg.path, "package out of scope");
        return result;
    }

    let upstream_inferred = match pass.upstream_inferred() {
        Ok(f) => f,
        Err(e) => {
            result.errors.push(e.to_string());
            Vec::new()
        }
    };
    let upstream_nolint = match pass.upstream_nolint() {
        Ok(f) => f,
        Err(e) => {
            result.errors.push(e.to_string());
            Vec::new()
        }
    };

    let mut dag = match StageDag::new() {
        Ok(d) => d,
        Err(e) => {
            result.errors.push(e.to_string());
            return result;
        }
    };

    let mut results: FxHashMap<StageId, StageResult> = FxHashMap::default();
    let mut stage_errors: Vec<String> = Vec::new();
    let mut inferred: Option<InferredFact> = None;
    let mut effective = pass.config.clone();

    for &stage in dag.execution_order().to_vec().iter() {
        if !dag.deps_succeeded(stage) {
            dag.mark(stage, StageState::Skipped);
            continue;
        }
        dag.mark(stage, StageState::Running);
        let start = Instant::now();

        let run = catch_unwind(AssertUnwindSafe(|| {
            execute_stage(stage, pass, &effective, &results, &upstream_inferred)
        }));
        let outcome: Result<StageOutput> = match run {
            Ok(r) => r,
            Err(payload) => {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic payload".to_string()
                };
                Err(NilscanError::internal(format!(
                    "panic in {} stage: {}",
                    stage.name(),
                    msg
                )))
            }
        };

        match outcome {
            Ok(output) => {
                dag.record(stage, start.elapsed(), None);
                debug!(pkg = %pkg.path, stage = stage.name(), elapsed = ?start.elapsed(), "stage finished");
                for e in output.degraded {
                    result.errors.push(e);
                }
                if stage == StageId::Directives {
                    if let Ok(d) = output.result.as_directives() {
                        // per-file opt-ins widen the configured toggles
                        effective.experimental_struct_init = effective.experimental_struct_init
                            || !d.struct_init_files.is_empty();
                        effective.experimental_anon_funcs = effective.experimental_anon_funcs
                            || !d.anon_func_files.is_empty();
                    }
                }
                if let Some(fact) = output.fact {
                    inferred = Some(fact);
                }
                results.insert(stage, output.result);
            }
            Err(e) => {
                warn!(pkg = %pkg.path, stage = stage.name(), error = %e, "stage failed");
                dag.record(stage, start.elapsed(), Some(e.to_string()));
                stage_errors.push(format!("{}: {}", stage.name(), e));
            }
        }
    }

    if let Some(StageResult::Diagnostics(diags)) = results.remove(&StageId::Diagnostics) {
        result.diagnostics = diags;
    }
    if !stage_errors.is_empty() {
        result.diagnostics.push(Diagnostic {
            pos: position_one(pkg),
            message: format!("INTERNAL ERROR(S): {}", stage_errors.join("; ")),
        });
        result.errors.extend(stage_errors);
    }
    result.inferred_fact = inferred;

    if let Some(fact) = &result.inferred_fact {
        if let Err(e) = pass.facts.store_inferred(fact) {
            result.errors.push(e.to_string());
        }
    }

    info!(
        pkg = %pkg.path,
        diagnostics = result.diagnostics.len(),
        errors = result.errors.len(),
        "package analysis finished"
    );
    result
}

struct StageOutput {
    result: StageResult,
    /// Per-function errors that degraded without failing the stage
    degraded: Vec<String>,
    /// Only the inference stage produces a fact
    fact: Option<InferredFact>,
}

impl StageOutput {
    fn of(result: StageResult) -> Self {
        Self {
            result,
            degraded: Vec::new(),
            fact: None,
        }
    }
}

fn execute_stage(
    stage: StageId,
    pass: &Pass<'_>,
    effective: &AnalyzerConfig,
    results: &FxHashMap<StageId, StageResult>,
    upstream_inferred: &[InferredFact],
) -> Result<StageOutput> {
    let pkg = pass.pkg;
    let prereq = |id: StageId| -> Result<&StageResult> {
        results.get(&id).ok_or_else(|| {
            NilscanError::internal(format!(
                "{} stage ran before its prerequisite {}",
                stage.name(),
                id.name()
            ))
        })
    };

    match stage {
        StageId::Directives => {
            let directives = parse_directives(pkg)?;
            Ok(StageOutput::of(StageResult::Directives(directives)))
        }
        StageId::Contracts => {
            let contracts = collect_contracts(pkg, effective);
            Ok(StageOutput::of(StageResult::Contracts(contracts)))
        }
        StageId::Affiliation => Ok(StageOutput::of(StageResult::Triggers(
            analyze_affiliations(pkg),
        ))),
        StageId::Globals => Ok(StageOutput::of(StageResult::Triggers(analyze_globals(pkg)))),
        StageId::Functions => {
            let contracts = prereq(StageId::Contracts)?.as_contracts()?;
            let (triggers, errors) = analyze_functions(pkg, contracts, effective);
            let mut out = StageOutput::of(StageResult::Triggers(triggers));
            out.degraded = errors.iter().map(|e| e.to_string()).collect();
            Ok(out)
        }
        StageId::Inference => {
            let mode = prereq(StageId::Directives)?.as_directives()?.mode;
            let mut triggers = Vec::new();
            triggers.extend_from_slice(prereq(StageId::Functions)?.as_triggers()?);
            triggers.extend_from_slice(prereq(StageId::Globals)?.as_triggers()?);
            triggers.extend_from_slice(prereq(StageId::Affiliation)?.as_triggers()?);
            let outcome = run_inference(pkg, &triggers, upstream_inferred, mode);
            let mut out = StageOutput::of(StageResult::Conflicts(outcome.conflicts));
            out.fact = Some(outcome.fact);
            Ok(out)
        }
        StageId::Diagnostics => {
            let conflicts = prereq(StageId::Inference)?.as_conflicts()?.to_vec();
            let upstream_nolint = pass.upstream_nolint()?;
            let diags = emit_diagnostics(pkg, effective, conflicts, &upstream_nolint);
            Ok(StageOutput::of(StageResult::Diagnostics(diags)))
        }
    }
}
