//! Backprop fixpoint benchmark
//!
//! Measures the per-function engine on a deep loop CFG shuffling pointer
//! fields, the shape that stresses fixed-point convergence.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use nilscan_core::config::AnalyzerConfig;
use nilscan_core::features::backprop::run_backprop;
use nilscan_core::features::contracts::ContractMap;
use nilscan_core::shared::cancel::CancelToken;
use nilscan_core::shared::models::{Cfg, FuncId};
use nilscan_core::shared::testkit::{stmt_node, TestPkg};

/// A function with a loop of `depth` blocks, each swapping two pointer
/// fields, ending in a dereference.
fn deep_loop_fixture(depth: usize) -> (TestPkg, FuncId) {
    let mut t = TestPkg::new("example.com/bench");
    let int = t.ty_int();
    let ptr = t.ty_ptr(int);
    let (pair_ty, fields) = t.ty_struct("Pair", &[("f", ptr), ("g", ptr)]);
    let pair_ptr = t.ty_ptr(pair_ty);
    let a = t.param_var("a", pair_ptr);
    let b = t.param_var("b", pair_ptr);
    let f = t.func("churn", &[a, b], &[]);

    let mut cfg = Cfg::new();
    let mut prev = cfg.entry;
    let mut body_blocks = Vec::new();
    for _ in 0..depth {
        let blk = cfg.add_block();
        let a_read = t.ident(a);
        let af = t.select(a_read, fields[0]);
        let b_read = t.ident(b);
        let bg = t.select(b_read, fields[1]);
        let swap = t.assign(&[af], &[bg]);
        cfg.block_mut(blk).nodes.push(stmt_node(swap));
        cfg.add_edge(prev, blk);
        body_blocks.push(blk);
        prev = blk;
    }
    // loop back to the first body block, then exit through a deref
    if let Some(first) = body_blocks.first() {
        cfg.add_edge(prev, *first);
    }
    let exit = cfg.add_block();
    let a_read = t.ident(a);
    let af = t.select(a_read, fields[0]);
    let deref = t.deref(af);
    let use_stmt = t.expr_stmt(deref);
    cfg.block_mut(exit).nodes.push(stmt_node(use_stmt));
    cfg.block_mut(exit).is_return = true;
    cfg.add_edge(prev, exit);
    t.attach_cfg(f, cfg);

    (t, f)
}

fn bench_backprop(c: &mut Criterion) {
    let mut group = c.benchmark_group("backprop_fixpoint");
    for depth in [4usize, 16, 64] {
        let (t, f) = deep_loop_fixture(depth);
        let config = AnalyzerConfig::default();
        let contracts = ContractMap::new();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |bench, _| {
            bench.iter(|| {
                run_backprop(&t.pkg, f, &contracts, &config, &CancelToken::new())
                    .expect("backprop succeeds")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_backprop);
criterion_main!(benches);
