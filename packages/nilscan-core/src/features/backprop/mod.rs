//! Per-function backpropagation
//!
//! The per-function half of the analysis: reverse dataflow over the
//! preprocessed CFG deriving, for each program point, the set of
//! expressions that must be non-nil, each obligation paired with the
//! producer that explains where the value came from. Output is the
//! function's full trigger list; the inference engine consumes them
//! package-wide.

pub mod engine;
pub mod state;

pub use engine::{classify_expr_producer, run_backprop};
pub use state::{AssertionNode, AssertionState, Step};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::features::assertion::SiteRef;
    use crate::features::contracts::{collect_contracts, ContractMap};
    use crate::shared::cancel::CancelToken;
    use crate::shared::models::{Cfg, FuncId};
    use crate::shared::testkit::{expr_node, stmt_node, TestPkg};
    use nilscan_facts::{ConsumerKind, ProducerKind, SiteKey};

    fn run(t: &TestPkg, f: FuncId) -> Vec<crate::features::assertion::FullTrigger> {
        run_backprop(
            &t.pkg,
            f,
            &ContractMap::new(),
            &AnalyzerConfig::default(),
            &CancelToken::new(),
        )
        .unwrap()
    }

    /// var p *int; if cond { p = new(int) }; _ = *p
    #[test]
    fn test_unassigned_local_reaches_deref() {
        let mut t = TestPkg::new("example.com/p");
        let int = t.ty_int();
        let ptr = t.ty_ptr(int);
        let boolean = t.ty_bool();
        let p = t.local("p", ptr);
        let cond_var = t.local("cond", boolean);
        let f = t.func("main", &[], &[]);

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

        let triggers = run(&t, f);
        let nilable: Vec<_> = triggers
            .iter()
            .filter(|t| !t.always_safe)
            .filter(|t| t.producer.kind == ProducerKind::UnassignedLocal)
            .collect();
        assert_eq!(nilable.len(), 1);
        assert_eq!(nilable[0].consumer.kind, ConsumerKind::Deref);
        assert!(nilable[0].producer.repr.contains('p'));
    }

    /// _ = *foo() where foo is an external function
    #[test]
    fn test_call_return_feeds_deref() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let foo = t.func("foo", &[], &[ptr]);
        let f = t.func("bar", &[], &[]);

        let call = t.call(foo, &[]);
        let deref = t.deref(call);
        let use_stmt = t.expr_stmt(deref);
        let cfg = t.linear_cfg(vec![stmt_node(use_stmt)]);
        t.attach_cfg(f, cfg);

        let triggers = run(&t, f);
        let hits: Vec<_> = triggers
            .iter()
            .filter(|t| {
                matches!(&t.producer.site, SiteRef::Site(SiteKey::Result { func, index, .. })
                    if func == "foo" && *index == 0)
            })
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].consumer.kind, ConsumerKind::Deref);
    }

    /// var x *int; assertNotNil(t, x); _ = *x  -- the deref is discharged
    #[test]
    fn test_trusted_assertion_discharges_deref() {
        let mut t = TestPkg::new("example.com/p");
        let int = t.ty_int();
        let ptr = t.ty_ptr(int);
        let x = t.local("x", ptr);
        let helper_arg = t.param_var("v", ptr);
        let helper = t.func("assertNotNil", &[helper_arg], &[]);
        let f = t.func("main", &[], &[]);

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

        let triggers = run(&t, f);
        // no unsafe trigger consumes the dereference
        assert!(!triggers
            .iter()
            .any(|t| !t.always_safe && t.consumer.kind == ConsumerKind::Deref));
    }

    /// var t *int; if errors.As(err, &t) { _ = *t }
    #[test]
    fn test_errors_as_narrows_target_on_true_branch() {
        let mut t = TestPkg::new("example.com/p");
        let err_ty = t.ty_interface("error");
        let int = t.ty_int();
        let ptr = t.ty_ptr(int);
        let target_ptr = t.ty_ptr(ptr);
        let e = t.param_var("err", err_ty);
        let tgt_param = t.param_var("target", target_ptr);
        let boolean = t.ty_bool();
        let errors_as = t.extern_func("errors", "As", &[e, tgt_param], &[boolean]);
        let f = t.func("main", &[], &[]);

        let err_var = t.local("err", err_ty);
        let target = t.local("t", ptr);
        let t_decl = t.var_decl(&[target], ptr, &[]);
        let err_read = t.ident(err_var);
        let t_read = t.ident(target);
        let addr = t.addr_of(t_read);
        let cond = t.call(errors_as, &[err_read, addr]);
        let t_read2 = t.ident(target);
        let deref = t.deref(t_read2);
        let use_stmt = t.expr_stmt(deref);

        let cfg = t.diamond_cfg(
            vec![stmt_node(t_decl)],
            cond,
            vec![stmt_node(use_stmt)],
            vec![],
            vec![],
        );
        t.attach_cfg(f, cfg);

        let triggers = run(&t, f);
        // the dereference only happens under the ok guard
        assert!(!triggers
            .iter()
            .any(|tr| !tr.always_safe && tr.consumer.kind == ConsumerKind::Deref));
    }

    /// var m map[int]*int; for _, v := range m { _ = *v }
    #[test]
    fn test_range_value_trusted_nonnil() {
        let mut t = TestPkg::new("example.com/p");
        let int = t.ty_int();
        let ptr = t.ty_ptr(int);
        let m_ty = t.ty_map(int, ptr);
        let m = t.local("m", m_ty);
        let v = t.local("v", ptr);
        let f = t.func("main", &[], &[]);

        let decl = t.var_decl(&[m], m_ty, &[]);
        let m_read = t.ident(m);
        let v_bind = t.ident(v);
        let bind = t.range_bind(None, Some(v_bind), m_read);
        let v_read = t.ident(v);
        let deref = t.deref(v_read);
        let body_stmt = t.expr_stmt(deref);

        // entry -> header; header -> body, exit; body -> header
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

        let triggers = run(&t, f);
        assert!(!triggers
            .iter()
            .any(|t| !t.always_safe && t.consumer.kind == ConsumerKind::Deref));
    }

    /// _ = *passThrough(a) where a := &i and passThrough has an inferred
    /// nonnil -> nonnil contract
    #[test]
    fn test_contracted_call_follows_argument() {
        let mut t = TestPkg::new("example.com/p");
        let int = t.ty_int();
        let ptr = t.ty_ptr(int);

        // contracted callee: func passThrough(p *int) *int { if p == nil { return nil }; return p }
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
        callee_cfg.block_mut(callee_cfg.entry).nodes.push(expr_node(cond));
        callee_cfg.add_edge(callee_cfg.entry, then_b);
        callee_cfg.add_edge(callee_cfg.entry, else_b);
        callee_cfg.block_mut(then_b).nodes.push(stmt_node(ret_nil));
        callee_cfg.block_mut(then_b).is_return = true;
        callee_cfg.block_mut(else_b).nodes.push(stmt_node(ret_p));
        callee_cfg.block_mut(else_b).is_return = true;
        t.attach_cfg(pass, callee_cfg);

        // caller: i int; a := &i; _ = *passThrough(a)
        let caller = t.func("use", &[], &[]);
        let i = t.local("i", int);
        let a = t.local("a", ptr);
        let i_read = t.ident(i);
        let addr = t.addr_of(i_read);
        let a_lhs = t.ident(a);
        let define = t.define(&[a_lhs], &[addr]);
        let a_read = t.ident(a);
        let call = t.call(pass, &[a_read]);
        let deref = t.deref(call);
        let use_stmt = t.expr_stmt(deref);
        let cfg = t.linear_cfg(vec![stmt_node(define), stmt_node(use_stmt)]);
        t.attach_cfg(caller, cfg);

        let config = AnalyzerConfig::default();
        let contracts = collect_contracts(&t.pkg, &config);
        assert!(contracts.has_nonnil_to_nonnil(pass));

        let triggers =
            run_backprop(&t.pkg, caller, &contracts, &config, &CancelToken::new()).unwrap();

        // the deref obligation followed the argument to a non-nil producer
        let deref_triggers: Vec<_> = triggers
            .iter()
            .filter(|t| t.consumer.kind == ConsumerKind::Deref)
            .collect();
        assert!(!deref_triggers.is_empty());
        assert!(deref_triggers.iter().all(|t| t.always_safe));
        assert!(deref_triggers.iter().any(|t| t.from_duplication));
        // no unconditional dependence on the callee's result site remains
        assert!(!triggers.iter().any(|t| {
            matches!(&t.producer.site, SiteRef::Site(SiteKey::Result { func, .. }) if func == "passThrough")
        }));
    }

    /// A tight loop swapping two pointer fields converges and emits a
    /// bounded trigger set.
    #[test]
    fn test_fixed_point_on_field_swap_loop() {
        let mut t = TestPkg::new("example.com/p");
        let int = t.ty_int();
        let ptr = t.ty_ptr(int);
        let (node_ty, fields) = t.ty_struct("Pair", &[("f", ptr), ("g", ptr)]);
        let node_ptr = t.ty_ptr(node_ty);
        let a = t.param_var("a", node_ptr);
        let b = t.param_var("b", node_ptr);
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

        // entry -> loop; loop -> loop, exit
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

        let triggers = run(&t, f);
        // converged under the round cap; coalescing bounds the output
        assert!(triggers.len() < 64);
        // no trigger pair repeats
        for (i, x) in triggers.iter().enumerate() {
            for y in &triggers[i + 1..] {
                assert!(
                    !(x.producer.kind == y.producer.kind
                        && x.consumer.kind == y.consumer.kind
                        && x.producer_pos(t.ast()) == y.producer_pos(t.ast())
                        && x.consumer_pos(t.ast()) == y.consumer_pos(t.ast())
                        && x.producer.site == y.producer.site
                        && x.consumer.site == y.consumer.site),
                    "duplicate trigger survived coalescing"
                );
            }
        }
    }

    /// Cancellation surfaces as a timeout error.
    #[test]
    fn test_cancelled_backprop_errors() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let x = t.local("x", ptr);
        let f = t.func("main", &[], &[]);
        let x_read = t.ident(x);
        let deref = t.deref(x_read);
        let use_stmt = t.expr_stmt(deref);
        let cfg = t.linear_cfg(vec![stmt_node(use_stmt)]);
        t.attach_cfg(f, cfg);

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_backprop(
            &t.pkg,
            f,
            &ContractMap::new(),
            &AnalyzerConfig::default(),
            &cancel,
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::shared::models::ErrorKind::Timeout);
    }
}
