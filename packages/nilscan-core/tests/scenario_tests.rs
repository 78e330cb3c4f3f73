//! End-to-end scenarios
//!
//! Each test builds a small package through the fixture builder, runs the
//! whole pipeline and asserts on the rendered diagnostics.

use pretty_assertions::assert_eq;

use nilscan_core::pipeline::{MemoryFactStore, Pass};
use nilscan_core::shared::models::Cfg;
use nilscan_core::shared::testkit::{expr_node, stmt_node, TestPkg};
use nilscan_core::{run_package, AnalyzerConfig};

fn analyze(t: &TestPkg) -> nilscan_core::PackageResult {
    let store = MemoryFactStore::new();
    let config = AnalyzerConfig::default();
    let pass = Pass::new(&t.pkg, &config, Vec::new(), &store);
    run_package(&pass)
}

/// var p *int; if cond { p = new(int) }; _ = *p
#[test]
fn test_local_possibly_nil_dereference() {
    let mut t = TestPkg::new("example.com/p");
    let int = t.ty_int();
    let ptr = t.ty_ptr(int);
    let boolean = t.ty_bool();
    let f = t.func("main", &[], &[]);
    let p = t.local("p", ptr);
    let cond_var = t.local("cond", boolean);

    let decl = t.var_decl(&[p], ptr, &[]);
    let cond = t.ident(cond_var);
    let p_lhs = t.ident(p);
    let alloc = t.new_of(int);
    let assign = t.assign(&[p_lhs], &[alloc]);
    let p_read = t.ident(p);
    let deref = t.deref(p_read);
    let use_stmt = t.expr_stmt(deref);

    let cfg = t.diamond_cfg(
        vec![stmt_node(decl)],
        cond,
        vec![stmt_node(assign)],
        vec![],
        vec![stmt_node(use_stmt)],
    );
    t.attach_cfg(f, cfg);

    let result = analyze(&t);
    assert_eq!(result.diagnostics.len(), 1);
    let msg = &result.diagnostics[0].message;
    assert!(msg.starts_with("Potential nil panic detected."));
    assert!(msg.contains("unassigned variable `p`"));
    assert!(msg.contains("dereferenced"));
}

/// func foo() *int { return nil }; func bar() { _ = *foo() }
#[test]
fn test_cross_call_return() {
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

    let result = analyze(&t);
    assert_eq!(result.diagnostics.len(), 1);
    let msg = &result.diagnostics[0].message;
    // the nil path cites the literal nil flowing out of foo, then the deref
    assert!(msg.contains("literal `nil`"));
    assert!(msg.contains("result 0 of `foo()`"));
    assert!(msg.contains("dereferenced"));
}

/// var x *int; assertNotNil(t, x); _ = *x
#[test]
fn test_testing_assertion_trust() {
    let mut t = TestPkg::new("example.com/p");
    let int = t.ty_int();
    let ptr = t.ty_ptr(int);

    let helper_arg = t.param_var("v", ptr);
    let helper = t.func("assertNotNil", &[helper_arg], &[]);

    let f = t.func("main", &[], &[]);
    let x = t.local("x", ptr);
    let decl = t.var_decl(&[x], ptr, &[]);
    let x_arg = t.ident(x);
    let call = t.call(helper, &[x_arg]);
    let call_stmt = t.expr_stmt(call);
    let x_read = t.ident(x);
    let deref = t.deref(x_read);
    let use_stmt = t.expr_stmt(deref);
    let cfg = t.linear_cfg(vec![
        stmt_node(decl),
        stmt_node(call_stmt),
        stmt_node(use_stmt),
    ]);
    t.attach_cfg(f, cfg);

    let result = analyze(&t);
    assert_eq!(result.diagnostics, vec![]);
}

/// var m map[int]*int; for _, v := range m { _ = *v }
#[test]
fn test_range_with_guard() {
    let mut t = TestPkg::new("example.com/p");
    let int = t.ty_int();
    let ptr = t.ty_ptr(int);
    let m_ty = t.ty_map(int, ptr);
    let f = t.func("main", &[], &[]);
    let m = t.local("m", m_ty);
    let v = t.local("v", ptr);

    let decl = t.var_decl(&[m], m_ty, &[]);
    let m_read = t.ident(m);
    let v_bind = t.ident(v);
    let bind = t.range_bind(None, Some(v_bind), m_read);
    let v_read = t.ident(v);
    let deref = t.deref(v_read);
    let body_stmt = t.expr_stmt(deref);

    let mut cfg = Cfg::new();
    let header = cfg.add_block();
    let body = cfg.add_block();
    let exit = cfg.add_block();
    cfg.block_mut(cfg.entry).nodes.push(stmt_node(decl));
    cfg.add_edge(cfg.entry, header);
    cfg.block_mut(header).nodes.push(stmt_node(bind));
    cfg.add_edge(header, body);
    cfg.add_edge(header, exit);
    cfg.block_mut(body).nodes.push(stmt_node(body_stmt));
    cfg.add_edge(body, header);
    cfg.block_mut(exit).is_return = true;
    t.attach_cfg(f, cfg);

    let result = analyze(&t);
    assert_eq!(result.diagnostics, vec![]);
}

/// func passThrough(p *int) *int { if p == nil { return nil }; return p }
/// a := &i; _ = *passThrough(a)
#[test]
fn test_inferred_contract_pass_through() {
    let mut t = TestPkg::new("example.com/p");
    let int = t.ty_int();
    let ptr = t.ty_ptr(int);

    let p = t.param_var("p", ptr);
    let pass = t.func("passThrough", &[p], &[ptr]);
    let p_read = t.ident(p);
    let cond = t.eq_nil(p_read);
    let nil_ret = t.nil(ptr);
    let ret_nil = t.ret(&[nil_ret]);
    let p_read2 = t.ident(p);
    let ret_p = t.ret(&[p_read2]);
    let mut callee_cfg = Cfg::new();
    let then_b = callee_cfg.add_block();
    let else_b = callee_cfg.add_block();
    callee_cfg
        .block_mut(callee_cfg.entry)
        .nodes
        .push(expr_node(cond));
    callee_cfg.add_edge(callee_cfg.entry, then_b);
    callee_cfg.add_edge(callee_cfg.entry, else_b);
    callee_cfg.block_mut(then_b).nodes.push(stmt_node(ret_nil));
    callee_cfg.block_mut(then_b).is_return = true;
    callee_cfg.block_mut(else_b).nodes.push(stmt_node(ret_p));
    callee_cfg.block_mut(else_b).is_return = true;
    t.attach_cfg(pass, callee_cfg);

    let caller = t.func("use", &[], &[]);
    let i = t.local("i", int);
    let a = t.local("a", ptr);
    let i_decl = t.var_decl(&[i], int, &[]);
    let i_read = t.ident(i);
    let addr = t.addr_of(i_read);
    let a_lhs = t.ident(a);
    let define = t.define(&[a_lhs], &[addr]);
    let a_read = t.ident(a);
    let call = t.call(pass, &[a_read]);
    let deref = t.deref(call);
    let use_stmt = t.expr_stmt(deref);
    let cfg = t.linear_cfg(vec![
        stmt_node(i_decl),
        stmt_node(define),
        stmt_node(use_stmt),
    ]);
    t.attach_cfg(caller, cfg);

    let result = analyze(&t);
    assert_eq!(result.diagnostics, vec![]);
}

/// A tight loop assigning a pointer between two fields terminates and
/// reports at most the bounded flows of the loop body.
#[test]
fn test_fixed_point_convergence() {
    let mut t = TestPkg::new("example.com/p");
    let int = t.ty_int();
    let ptr = t.ty_ptr(int);
    let (pair_ty, fields) = t.ty_struct("Pair", &[("f", ptr), ("g", ptr)]);
    let pair_ptr = t.ty_ptr(pair_ty);
    let a = t.param_var("a", pair_ptr);
    let b = t.param_var("b", pair_ptr);
    let f = t.func("churn", &[a, b], &[]);

    let a1 = t.ident(a);
    let af_l = t.select(a1, fields[0]);
    let b1 = t.ident(b);
    let bg_r = t.select(b1, fields[1]);
    let s1 = t.assign(&[af_l], &[bg_r]);
    let b2 = t.ident(b);
    let bg_l = t.select(b2, fields[1]);
    let a2 = t.ident(a);
    let af_r = t.select(a2, fields[0]);
    let s2 = t.assign(&[bg_l], &[af_r]);

    let mut cfg = Cfg::new();
    let body = cfg.add_block();
    let exit = cfg.add_block();
    cfg.add_edge(cfg.entry, body);
    cfg.block_mut(body).nodes.push(stmt_node(s1));
    cfg.block_mut(body).nodes.push(stmt_node(s2));
    cfg.add_edge(body, body);
    cfg.add_edge(body, exit);
    cfg.block_mut(exit).is_return = true;
    t.attach_cfg(f, cfg);

    // must terminate (no timeout error) and emit a bounded diagnostic count
    let result = analyze(&t);
    assert!(result.errors.is_empty());
    assert!(result.diagnostics.len() <= 8);
}

/// Exported facts never carry an edge whose both endpoints live upstream.
#[test]
fn test_fact_incrementality_invariant() {
    // package a defines Load and a consumer-free chain
    let mut a = TestPkg::new("example.com/a");
    let ptr = a.ty_ptr_int();
    let load = a.func("Load", &[], &[ptr]);
    let nil_val = a.nil(ptr);
    let ret = a.ret(&[nil_val]);
    let cfg = a.linear_cfg(vec![stmt_node(ret)]);
    a.attach_cfg(load, cfg);

    let store = MemoryFactStore::new();
    let config = AnalyzerConfig::default();
    let pass_a = Pass::new(&a.pkg, &config, Vec::new(), &store);
    let result_a = run_package(&pass_a);
    let fact_a = result_a.inferred_fact.expect("a exports a fact");

    // package b wraps a.Load
    let mut b = TestPkg::new("example.com/b");
    let ptr_b = b.ty_ptr_int();
    let load_b = b.extern_func("example.com/a", "Load", &[], &[ptr_b]);
    let wrap = b.func("Wrap", &[], &[ptr_b]);
    let call = b.call(load_b, &[]);
    let ret = b.ret(&[call]);
    let cfg = b.linear_cfg(vec![stmt_node(ret)]);
    b.attach_cfg(wrap, cfg);

    let pass_b = Pass::new(&b.pkg, &config, vec!["example.com/a".into()], &store);
    let result_b = run_package(&pass_b);
    let fact_b = result_b.inferred_fact.expect("b exports a fact");

    for edge in &fact_b.edges {
        let from_upstream = !edge.from.declared_in("example.com/b");
        let to_upstream = edge
            .to
            .as_ref()
            .map(|t| !t.declared_in("example.com/b"))
            .unwrap_or(false);
        assert!(
            !(from_upstream && to_upstream),
            "edge with both endpoints upstream exported: {:?}",
            edge
        );
    }
    // sanity: a's own fact mentions its nilable result
    assert!(fact_a.determinations.keys().any(|k| k.pkg() == "example.com/a"));
}

/// Adding a nolint range can only shrink the diagnostic count.
#[test]
fn test_nolint_monotonicity_end_to_end() {
    let build = |suppress: bool| {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let f = t.func("main", &[], &[]);
        let p = t.local("p", ptr);
        let decl = t.var_decl(&[p], ptr, &[]);
        let p_read = t.ident(p);
        let deref = t.deref(p_read);
        let use_stmt = t.expr_stmt(deref);
        let cfg = t.linear_cfg(vec![stmt_node(decl), stmt_node(use_stmt)]);
        t.attach_cfg(f, cfg);
        if suppress {
            for line in 1..64 {
                t.add_nolint_line(line);
            }
        }
        analyze(&t).diagnostics.len()
    };

    let without = build(false);
    let with = build(true);
    assert!(with <= without);
    assert_eq!(without, 1);
    assert_eq!(with, 0);
}
