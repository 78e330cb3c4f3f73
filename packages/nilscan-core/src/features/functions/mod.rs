//! Per-function analysis coordinator
//!
//! Runs backprop for every function declaration in the package on a rayon
//! pool. Each task gets its own deadline token; results flow back over a
//! channel tagged with the function's stable index (source declaration
//! order, with literals following their parent depth-first) and are
//! re-ordered before flattening, because trigger ordering downstream is
//! expected to be source-stable. Panics inside a worker become errors for
//! that function only.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;

use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::features::assertion::FullTrigger;
use crate::features::backprop::run_backprop;
use crate::features::contracts::ContractMap;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{FuncId, NilscanError, Package};

/// Outcome of one function's analysis.
#[derive(Debug)]
pub struct FuncOutcome {
    pub index: u32,
    pub func: FuncId,
    pub triggers: Vec<FullTrigger>,
    pub error: Option<NilscanError>,
}

/// Analyze every in-scope function, returning triggers flattened in stable
/// index order plus the per-function errors that occurred.
pub fn analyze_functions(
    pkg: &Package,
    contracts: &ContractMap,
    config: &AnalyzerConfig,
) -> (Vec<FullTrigger>, Vec<NilscanError>) {
    let targets: Vec<(u32, FuncId)> = pkg
        .func_ids()
        .filter(|f| {
            let info = pkg.func(*f);
            if info.cfg.is_none() {
                return false;
            }
            if info.is_anonymous() && !config.experimental_anon_funcs {
                return false;
            }
            config.file_in_scope(pkg.files.name(info.file))
        })
        .enumerate()
        .map(|(i, f)| (i as u32, f))
        .collect();

    debug!(pkg = %pkg.path, functions = targets.len(), "starting per-function analysis");

    let (tx, rx) = mpsc::channel::<FuncOutcome>();
    let run_one = |index: u32, func: FuncId| -> FuncOutcome {
        let cancel = CancelToken::with_timeout(config.backprop_timeout());
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            run_backprop(pkg, func, contracts, config, &cancel)
        }));
        match outcome {
            Ok(Ok(triggers)) => FuncOutcome {
                index,
                func,
                triggers,
                error: None,
            },
            Ok(Err(e)) => FuncOutcome {
                index,
                func,
                triggers: Vec::new(),
                error: Some(e.with_func_index(index)),
            },
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                FuncOutcome {
                    index,
                    func,
                    triggers: Vec::new(),
                    error: Some(
                        NilscanError::internal(format!(
                            "panic while analyzing `{}`: {}",
                            pkg.func(func).name,
                            msg
                        ))
                        .with_func_index(index),
                    ),
                }
            }
        }
    };

    let execute = |tx: mpsc::Sender<FuncOutcome>| {
        rayon::scope(|scope| {
            for &(index, func) in &targets {
                let tx = tx.clone();
                let run_one = &run_one;
                scope.spawn(move |_| {
                    // a dropped receiver means the coordinator is gone;
                    // nothing useful to do with the result then
                    let _ = tx.send(run_one(index, func));
                });
            }
        });
    };

    if config.worker_threads > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .build()
        {
            Ok(pool) => pool.install(|| execute(tx)),
            Err(e) => {
                warn!(error = %e, "falling back to the global rayon pool");
                execute(tx);
            }
        }
    } else {
        execute(tx);
    }

    let mut outcomes: Vec<FuncOutcome> = rx.into_iter().collect();
    outcomes.sort_by_key(|o| o.index);

    let mut triggers = Vec::new();
    let mut errors = Vec::new();
    for o in outcomes {
        if let Some(e) = o.error {
            warn!(pkg = %pkg.path, func = %pkg.func(o.func).name, error = %e, "function analysis degraded");
            errors.push(e);
        }
        triggers.extend(o.triggers);
    }
    (triggers, errors)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::features::contracts::ContractMap;
    use crate::shared::testkit::{stmt_node, TestPkg};
    use nilscan_facts::ConsumerKind;

    fn pkg_with_two_funcs() -> TestPkg {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();

        // func first() { var a *int; _ = *a }
        let f1 = t.func("first", &[], &[]);
        let a = t.local("a", ptr);
        let d1 = t.var_decl(&[a], ptr, &[]);
        let a_read = t.ident(a);
        let deref1 = t.deref(a_read);
        let u1 = t.expr_stmt(deref1);
        let cfg1 = t.linear_cfg(vec![stmt_node(d1), stmt_node(u1)]);
        t.attach_cfg(f1, cfg1);

        // func second() { var b *int; _ = *b }
        let f2 = t.func("second", &[], &[]);
        let b = t.local("b", ptr);
        let d2 = t.var_decl(&[b], ptr, &[]);
        let b_read = t.ident(b);
        let deref2 = t.deref(b_read);
        let u2 = t.expr_stmt(deref2);
        let cfg2 = t.linear_cfg(vec![stmt_node(d2), stmt_node(u2)]);
        t.attach_cfg(f2, cfg2);

        t
    }

    #[test]
    fn test_triggers_flattened_in_declaration_order() {
        let t = pkg_with_two_funcs();
        let (triggers, errors) = analyze_functions(
            &t.pkg,
            &ContractMap::new(),
            &AnalyzerConfig::default(),
        );
        assert!(errors.is_empty());

        let derefs: Vec<_> = triggers
            .iter()
            .filter(|tr| tr.consumer.kind == ConsumerKind::Deref && !tr.always_safe)
            .collect();
        assert_eq!(derefs.len(), 2);
        // declaration order: `a` before `b`
        assert!(derefs[0].producer.repr.contains('a'));
        assert!(derefs[1].producer.repr.contains('b'));
    }

    #[test]
    fn test_timeout_degrades_single_function() {
        let t = pkg_with_two_funcs();
        let config = AnalyzerConfig {
            backprop_timeout_ms: 1,
            ..AnalyzerConfig::default()
        };
        // with a 1ms budget a function may or may not finish; either way
        // the call returns, and any errors carry function indices
        let (_, errors) = analyze_functions(&t.pkg, &ContractMap::new(), &config);
        for e in errors {
            assert_eq!(e.kind, crate::shared::models::ErrorKind::Timeout);
            assert!(e.func_index.is_some());
        }
    }

    #[test]
    fn test_out_of_scope_files_skipped() {
        let t = pkg_with_two_funcs();
        let config = AnalyzerConfig::default();
        let config = AnalyzerConfig {
            exclude_files: vec!["example.com/p/main.go".into()],
            ..config
        };
        let (triggers, errors) = analyze_functions(&t.pkg, &ContractMap::new(), &config);
        assert!(triggers.is_empty());
        assert!(errors.is_empty());
    }
}
