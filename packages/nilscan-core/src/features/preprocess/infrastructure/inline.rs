//! Single-expression boolean helper inlining
//!
//! `if isNil(p) { ... }` hides the nil check behind a call. When the callee
//! is a declared function whose body is exactly `return <binary-or-unary
//! expression>` returning a single bool, the expression is appended to the
//! condition (`call && body[args/params]`), so the branch learns the same
//! facts a written-out check would teach. The call itself stays in the
//! condition: nil flows inside the callee are still reported there.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::shared::models::{
    AstRead, AstView, BasicKind, BinOp, Callee, Cfg, CfgNode, ExprId, ExprKind, FuncId, Package,
    StmtKind, TypeKind, VarId,
};

/// Body expression of a single-expression boolean function, if `func`
/// qualifies.
fn single_bool_body(pkg: &Package, func: FuncId) -> Option<ExprId> {
    let info = pkg.func(func);
    if info.receiver.is_some() || info.variadic || info.results.len() != 1 {
        return None;
    }
    if !matches!(
        pkg.types.underlying(info.results[0]),
        TypeKind::Basic(BasicKind::Bool)
    ) {
        return None;
    }
    let cfg = pkg.cfg(info.cfg?);
    let entry = cfg.block(cfg.entry);
    if entry.nodes.len() != 1 || !entry.succs.is_empty() {
        return None;
    }
    let CfgNode::Stmt(s) = entry.nodes[0] else {
        return None;
    };
    let StmtKind::Return { results } = &pkg.ast.stmt(s).kind else {
        return None;
    };
    if results.len() != 1 {
        return None;
    }
    let body = pkg.ast.strip_parens(results[0]);
    match pkg.ast.expr(body).kind {
        ExprKind::Binary { .. } | ExprKind::Unary { .. } => Some(body),
        _ => None,
    }
}

/// Rebuild `expr` with formal parameters substituted by call arguments.
/// Nodes without substitutions are reused as-is.
fn substitute(
    pkg: &Package,
    view: &mut AstView<'_>,
    subst: &FxHashMap<VarId, ExprId>,
    expr: ExprId,
) -> ExprId {
    let node = view.expr_node(expr).clone();
    match node.kind {
        ExprKind::Ident(v) => subst.get(&v).copied().unwrap_or(expr),
        ExprKind::Paren(inner) => substitute(pkg, view, subst, inner),
        ExprKind::Unary { op, operand } => {
            let new = substitute(pkg, view, subst, operand);
            if new == operand {
                expr
            } else {
                view.add_synth(ExprKind::Unary { op, operand: new }, node.ty)
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let nl = substitute(pkg, view, subst, lhs);
            let nr = substitute(pkg, view, subst, rhs);
            if nl == lhs && nr == rhs {
                expr
            } else {
                view.add_synth(
                    ExprKind::Binary {
                        op,
                        lhs: nl,
                        rhs: nr,
                    },
                    node.ty,
                )
            }
        }
        ExprKind::Select { base, field } => {
            let nb = substitute(pkg, view, subst, base);
            if nb == base {
                expr
            } else {
                view.add_synth(ExprKind::Select { base: nb, field }, node.ty)
            }
        }
        ExprKind::Index { base, index } => {
            let nb = substitute(pkg, view, subst, base);
            let ni = substitute(pkg, view, subst, index);
            if nb == base && ni == index {
                expr
            } else {
                view.add_synth(
                    ExprKind::Index {
                        base: nb,
                        index: ni,
                    },
                    node.ty,
                )
            }
        }
        ExprKind::Call { callee, ref args } => {
            let new_args: Vec<ExprId> = args
                .iter()
                .map(|a| substitute(pkg, view, subst, *a))
                .collect();
            let new_callee = match callee {
                Callee::Value(e) => Callee::Value(substitute(pkg, view, subst, e)),
                Callee::Method { func, recv } => Callee::Method {
                    func,
                    recv: substitute(pkg, view, subst, recv),
                },
                other => other,
            };
            if new_args == *args && new_callee == callee {
                expr
            } else {
                view.add_synth(
                    ExprKind::Call {
                        callee: new_callee,
                        args: new_args,
                    },
                    node.ty,
                )
            }
        }
        ExprKind::Receive(chan) => {
            let nc = substitute(pkg, view, subst, chan);
            if nc == chan {
                expr
            } else {
                view.add_synth(ExprKind::Receive(nc), node.ty)
            }
        }
        ExprKind::TypeAssert { operand, ty } => {
            let no = substitute(pkg, view, subst, operand);
            if no == operand {
                expr
            } else {
                view.add_synth(ExprKind::TypeAssert { operand: no, ty }, node.ty)
            }
        }
        // literals, composites and function literals carry no formals
        _ => expr,
    }
}

/// Append inlined helper bodies to branch conditions that are direct calls.
pub fn inline_bool_funcs(pkg: &Package, cfg: &mut Cfg, view: &mut AstView<'_>) {
    let mut inlined: FxHashSet<ExprId> = FxHashSet::default();
    for b in cfg.live_blocks().collect::<Vec<_>>() {
        let block = cfg.block(b);
        if block.succs.len() != 2 {
            continue;
        }
        let Some(cond) = block.branch_cond() else {
            continue;
        };
        let cond = view.strip_parens(cond);
        if !inlined.insert(cond) {
            continue;
        }
        let ExprKind::Call { callee, args } = view.expr_node(cond).kind.clone() else {
            continue;
        };
        let Callee::Func(func) = callee else { continue };
        let Some(body) = single_bool_body(pkg, func) else {
            continue;
        };

        let params = &pkg.func(func).params;
        if params.len() != args.len() {
            continue;
        }
        let subst: FxHashMap<VarId, ExprId> =
            params.iter().copied().zip(args.iter().copied()).collect();
        let inlined_body = substitute(pkg, view, &subst, body);
        let cond_ty = view.expr_ty(cond);
        let appended = view.add_synth(
            ExprKind::Binary {
                op: BinOp::LAnd,
                lhs: cond,
                rhs: inlined_body,
            },
            cond_ty,
        );
        if let Some(last) = cfg.block_mut(b).nodes.last_mut() {
            *last = CfgNode::Expr(appended);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testkit::{expr_node, stmt_node, TestPkg};

    /// `func isNil(p *int) bool { return p == nil }`
    fn declare_is_nil(t: &mut TestPkg) -> FuncId {
        let ptr = t.ty_ptr_int();
        let boolean = t.ty_bool();
        let p = t.param_var("p", ptr);
        let f = t.func("isNil", &[p], &[boolean]);
        let p_expr = t.ident(p);
        let cmp = t.eq_nil(p_expr);
        let ret = t.ret(&[cmp]);
        let body = t.linear_cfg(vec![stmt_node(ret)]);
        // a single-expression body has no successors and no return flag set
        let mut body = body;
        body.block_mut(body.entry).is_return = false;
        body.block_mut(body.entry).succs.clear();
        t.attach_cfg(f, body);
        f
    }

    #[test]
    fn test_single_bool_body_recognized() {
        let mut t = TestPkg::new("example.com/p");
        let f = declare_is_nil(&mut t);
        assert!(single_bool_body(&t.pkg, f).is_some());
    }

    #[test]
    fn test_inline_appends_substituted_body() {
        let mut t = TestPkg::new("example.com/p");
        let f = declare_is_nil(&mut t);
        let ptr = t.ty_ptr_int();
        let x = t.local("x", ptr);
        let x_expr = t.ident(x);
        let call = t.call(f, &[x_expr]);

        let mut cfg = Cfg::new();
        let tb = cfg.add_block();
        let fb = cfg.add_block();
        cfg.block_mut(cfg.entry).nodes.push(expr_node(call));
        cfg.add_edge(cfg.entry, tb);
        cfg.add_edge(cfg.entry, fb);
        cfg.block_mut(tb).is_return = true;
        cfg.block_mut(fb).is_return = true;

        let mut view = AstView::new(&t.pkg.ast);
        inline_bool_funcs(&t.pkg, &mut cfg, &mut view);

        let cond = cfg.block(cfg.entry).branch_cond().unwrap();
        assert!(view.is_synth(cond));
        // call && (x == nil)
        match view.expr_node(cond).kind.clone() {
            ExprKind::Binary {
                op: BinOp::LAnd,
                lhs,
                rhs,
            } => {
                assert_eq!(lhs, call);
                match view.expr_node(rhs).kind.clone() {
                    ExprKind::Binary {
                        op: BinOp::Eq,
                        lhs: sub_lhs,
                        ..
                    } => assert_eq!(sub_lhs, x_expr),
                    other => panic!("expected substituted nil check, got {:?}", other),
                }
            }
            other => panic!("expected appended conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_non_matching_callee_untouched() {
        let mut t = TestPkg::new("example.com/p");
        let boolean = t.ty_bool();
        // two-result function does not qualify
        let f = t.func("check", &[], &[boolean, boolean]);
        let call = t.call(f, &[]);

        let mut cfg = Cfg::new();
        let tb = cfg.add_block();
        let fb = cfg.add_block();
        cfg.block_mut(cfg.entry).nodes.push(expr_node(call));
        cfg.add_edge(cfg.entry, tb);
        cfg.add_edge(cfg.entry, fb);

        let mut view = AstView::new(&t.pkg.ast);
        inline_bool_funcs(&t.pkg, &mut cfg, &mut view);
        assert_eq!(cfg.block(cfg.entry).branch_cond(), Some(call));
        assert_eq!(view.num_synth(), 0);
    }
}
