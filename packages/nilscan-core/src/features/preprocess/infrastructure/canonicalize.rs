//! Conditional canonicalization
//!
//! Rewrites every two-successor block until its condition is in canonical
//! form: `succs[0]` is the true branch, no top-level negation, no top-level
//! `&&`/`||`, nil comparisons as `x == nil`, boolean-literal comparisons
//! collapsed. Rewritten conditions are fresh synthetic nodes; the shared
//! AST is never touched. The pass is idempotent.

use crate::shared::models::{
    AstRead, AstView, BinOp, BlockId, Cfg, CfgNode, ExprId, ExprKind, UnOp,
};

pub fn canonicalize(cfg: &mut Cfg, view: &mut AstView<'_>) {
    let mut work: Vec<BlockId> = cfg.live_blocks().collect();
    while let Some(b) = work.pop() {
        canonicalize_block(cfg, view, b, &mut work);
    }
}

fn set_cond(cfg: &mut Cfg, b: BlockId, cond: ExprId) {
    if let Some(last) = cfg.block_mut(b).nodes.last_mut() {
        *last = CfgNode::Expr(cond);
    }
}

fn swap_branches(cfg: &mut Cfg, b: BlockId) {
    cfg.block_mut(b).succs.swap(0, 1);
}

/// Apply rewrites to one block until none fires. Split-off continuation
/// blocks are pushed onto `work`.
fn canonicalize_block(cfg: &mut Cfg, view: &mut AstView<'_>, b: BlockId, work: &mut Vec<BlockId>) {
    loop {
        let block = cfg.block(b);
        if block.succs.len() != 2 {
            return;
        }
        let Some(CfgNode::Expr(cond)) = block.nodes.last().copied() else {
            return;
        };

        let stripped = view.strip_parens(cond);
        if stripped != cond {
            set_cond(cfg, b, stripped);
            continue;
        }

        let cond_ty = view.expr_ty(cond);
        match view.expr_node(cond).kind.clone() {
            ExprKind::Unary {
                op: UnOp::Not,
                operand,
            } => {
                set_cond(cfg, b, operand);
                swap_branches(cfg, b);
            }

            ExprKind::Binary {
                op: BinOp::LAnd,
                lhs,
                rhs,
            } => {
                // evaluate lhs here; rhs in a new block reachable only when
                // lhs held
                let (t, f) = (cfg.block(b).succs[0], cfg.block(b).succs[1]);
                let nb = cfg.add_block();
                cfg.block_mut(nb).nodes.push(CfgNode::Expr(rhs));
                cfg.add_edge(nb, t);
                cfg.add_edge(nb, f);
                cfg.clear_succs(b);
                cfg.add_edge(b, nb);
                cfg.add_edge(b, f);
                set_cond(cfg, b, lhs);
                work.push(nb);
            }

            ExprKind::Binary {
                op: BinOp::LOr,
                lhs,
                rhs,
            } => {
                let (t, f) = (cfg.block(b).succs[0], cfg.block(b).succs[1]);
                let nb = cfg.add_block();
                cfg.block_mut(nb).nodes.push(CfgNode::Expr(rhs));
                cfg.add_edge(nb, t);
                cfg.add_edge(nb, f);
                cfg.clear_succs(b);
                cfg.add_edge(b, t);
                cfg.add_edge(b, nb);
                set_cond(cfg, b, lhs);
                work.push(nb);
            }

            ExprKind::Binary { op, lhs, rhs } if matches!(op, BinOp::Eq | BinOp::Neq) => {
                let lhs_nil = view.is_nil_lit(lhs);
                let rhs_nil = view.is_nil_lit(rhs);

                if lhs_nil && !rhs_nil {
                    // nil == x / nil != x: commute to x on the left
                    let commuted = view.add_synth(
                        ExprKind::Binary {
                            op: BinOp::Eq,
                            lhs: rhs,
                            rhs: lhs,
                        },
                        cond_ty,
                    );
                    set_cond(cfg, b, commuted);
                    if op == BinOp::Neq {
                        swap_branches(cfg, b);
                    }
                } else if op == BinOp::Neq && rhs_nil {
                    // x != nil: rewrite to x == nil with branches swapped
                    let eq = view.add_synth(
                        ExprKind::Binary {
                            op: BinOp::Eq,
                            lhs,
                            rhs,
                        },
                        cond_ty,
                    );
                    set_cond(cfg, b, eq);
                    swap_branches(cfg, b);
                } else if let Some(bv) = view.as_bool_lit(rhs) {
                    // x == true -> x; x == false -> !x with swap, etc.
                    set_cond(cfg, b, lhs);
                    if (op == BinOp::Eq) != bv {
                        swap_branches(cfg, b);
                    }
                } else if let Some(bv) = view.as_bool_lit(lhs) {
                    set_cond(cfg, b, rhs);
                    if (op == BinOp::Eq) != bv {
                        swap_branches(cfg, b);
                    }
                } else {
                    return;
                }
            }

            _ => return,
        }
    }
}
