//! Trusted-function recognition and block splits
//!
//! A statement-position call to a recognized check helper carries meaning
//! the type system cannot express: `assertNotNil(t, x)` guarantees `x` is
//! non-nil on the continuing path, `t.Fatal(...)` never returns. The
//! registry matches (enclosing-path regex, function-name regex) pairs to an
//! action; the split rewrites the block so downstream analysis sees an
//! equivalent conditional with the true branch continuing and a dead
//! failure branch.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::shared::models::{
    AstRead, AstView, BinOp, BlockId, Callee, Cfg, CfgNode, ExprId, ExprKind, FuncId, Package,
    StmtKind, UnOp,
};

/// Which argument a check action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSel {
    Index(usize),
    /// First argument whose type admits nil
    FirstNilable,
    /// First boolean argument
    FirstBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustedAction {
    /// Continuing path has `arg != nil`
    RequireNonnil(ArgSel),
    /// Continuing path has `arg == nil`
    RequireNil(ArgSel),
    /// Continuing path has `arg`
    RequireTrue(ArgSel),
    /// Continuing path has `!arg`
    RequireFalse(ArgSel),
    /// `len(arg) > 0` on the continuing path; implies `arg != nil`
    RequireNonempty(ArgSel),
    /// `errors.As`-style: the call returns ok, and ok implies the value the
    /// selected pointer argument targets is non-nil
    OkProducingCall(ArgSel),
    /// The call never returns; the block is truncated
    NoReturn,
    /// Results of this function are always non-nil (no split; consulted by
    /// the backprop engine at call sites)
    NonnilResult,
}

pub struct TrustedFunc {
    path_re: Regex,
    name_re: Regex,
    pub action: TrustedAction,
}

impl TrustedFunc {
    fn new(path: &str, name: &str, action: TrustedAction) -> Self {
        Self {
            path_re: Regex::new(path).expect("static trusted-path regex"),
            name_re: Regex::new(name).expect("static trusted-name regex"),
            action,
        }
    }

    pub fn matches(&self, pkg_path: &str, func_name: &str) -> bool {
        self.path_re.is_match(pkg_path) && self.name_re.is_match(func_name)
    }
}

static REGISTRY: Lazy<Vec<TrustedFunc>> = Lazy::new(|| {
    use TrustedAction::*;
    vec![
        // testing-assertion family: local helpers by conventional name
        TrustedFunc::new(
            ".*",
            r"(^|\.)(assert|require|expect)NotNil$",
            RequireNonnil(ArgSel::FirstNilable),
        ),
        TrustedFunc::new(
            ".*",
            r"(^|\.)(assert|require|expect)Nil$",
            RequireNil(ArgSel::FirstNilable),
        ),
        TrustedFunc::new(
            ".*",
            r"(^|\.)(assert|require|expect)True$",
            RequireTrue(ArgSel::FirstBool),
        ),
        TrustedFunc::new(
            ".*",
            r"(^|\.)(assert|require|expect)False$",
            RequireFalse(ArgSel::FirstBool),
        ),
        // testify-style suites: bare method names under a testing path
        TrustedFunc::new(
            r"testify|gocheck|gomega",
            r"(^|\.)NotNil$",
            RequireNonnil(ArgSel::FirstNilable),
        ),
        TrustedFunc::new(
            r"testify|gocheck|gomega",
            r"(^|\.)Nil$",
            RequireNil(ArgSel::FirstNilable),
        ),
        TrustedFunc::new(
            r"testify|gocheck|gomega",
            r"(^|\.)True$",
            RequireTrue(ArgSel::FirstBool),
        ),
        TrustedFunc::new(
            r"testify|gocheck|gomega",
            r"(^|\.)False$",
            RequireFalse(ArgSel::FirstBool),
        ),
        TrustedFunc::new(
            r"testify|gocheck",
            r"(^|\.)NoError$",
            RequireNil(ArgSel::FirstNilable),
        ),
        TrustedFunc::new(
            r"testify|gocheck",
            r"(^|\.)NotEmpty$",
            RequireNonempty(ArgSel::FirstNilable),
        ),
        // never-returning terminators
        TrustedFunc::new(
            r"(^|/)testing$|(^|/)log$|testify",
            r"(^|\.)(Fatal|Fatalf|FailNow|Panic|Panicf)$",
            NoReturn,
        ),
        // ok-producing checks: errors.As(err, &target) narrows target
        TrustedFunc::new(
            r"(^|/)x?errors$",
            r"^As$",
            OkProducingCall(ArgSel::Index(1)),
        ),
        // error constructors never return nil
        TrustedFunc::new(r"(^|/)errors$", r"^New$", NonnilResult),
        TrustedFunc::new(r"(^|/)fmt$", r"^Errorf$", NonnilResult),
    ]
});

/// Action for a direct call to `func`, if any entry matches.
pub fn trusted_action(pkg: &Package, func: FuncId) -> Option<TrustedAction> {
    let path = pkg.func_pkg(func);
    let name = &pkg.func(func).name;
    REGISTRY
        .iter()
        .find(|t| t.matches(path, name))
        .map(|t| t.action)
}

/// True when `func` is recognized as always returning non-nil results.
pub fn trusted_nonnil_result(pkg: &Package, func: FuncId) -> bool {
    matches!(trusted_action(pkg, func), Some(TrustedAction::NonnilResult))
}

/// Testing harness handles (`*testing.T` and friends) are passed first to
/// assertion helpers and must not be mistaken for the checked value.
fn is_testing_handle(pkg: &Package, ty: crate::shared::models::TypeId) -> bool {
    let inner = pkg.types.pointee(ty).unwrap_or(ty);
    pkg.types
        .name(inner)
        .map(|n| n.starts_with("testing."))
        .unwrap_or(false)
}

/// Select the checked argument, honoring the action's selector.
fn select_arg(pkg: &Package, args: &[ExprId], sel: ArgSel) -> Option<ExprId> {
    match sel {
        ArgSel::Index(i) => args.get(i).copied(),
        ArgSel::FirstNilable => args.iter().copied().find(|a| {
            let ty = pkg.ast.expr_ty(*a);
            pkg.types.admits_nil(ty) && !is_testing_handle(pkg, ty)
        }),
        ArgSel::FirstBool => args.iter().copied().find(|a| {
            matches!(
                pkg.types.underlying(pkg.ast.expr_ty(*a)),
                crate::shared::models::TypeKind::Basic(crate::shared::models::BasicKind::Bool)
            )
        }),
    }
}

/// Value an ok-producing call narrows: the pointee of the passed pointer
/// argument. `&target` names `target` directly; a plain pointer variable
/// narrows through a synthetic dereference.
fn ok_target(pkg: &Package, view: &mut AstView<'_>, arg: ExprId) -> ExprId {
    let arg = view.strip_parens(arg);
    if let ExprKind::Unary {
        op: UnOp::AddrOf,
        operand,
    } = view.expr_node(arg).kind
    {
        return operand;
    }
    let arg_ty = view.expr_ty(arg);
    let pointee = pkg.types.pointee(arg_ty).unwrap_or(arg_ty);
    view.add_synth(
        ExprKind::Unary {
            op: UnOp::Deref,
            operand: arg,
        },
        pointee,
    )
}

/// Synthetic condition equivalent to the check holding, in natural form;
/// canonicalization normalizes it afterwards.
fn synth_cond(
    pkg: &Package,
    view: &mut AstView<'_>,
    action: TrustedAction,
    arg: ExprId,
) -> Option<ExprId> {
    let arg_ty = view.expr_ty(arg);
    match action {
        TrustedAction::RequireNonnil(_) | TrustedAction::RequireNonempty(_) => {
            let nil = view.add_synth(ExprKind::NilLit, arg_ty);
            Some(view.add_synth(
                ExprKind::Binary {
                    op: BinOp::Neq,
                    lhs: arg,
                    rhs: nil,
                },
                arg_ty,
            ))
        }
        TrustedAction::RequireNil(_) => {
            let nil = view.add_synth(ExprKind::NilLit, arg_ty);
            Some(view.add_synth(
                ExprKind::Binary {
                    op: BinOp::Eq,
                    lhs: arg,
                    rhs: nil,
                },
                arg_ty,
            ))
        }
        TrustedAction::RequireTrue(_) => Some(arg),
        TrustedAction::RequireFalse(_) => Some(view.add_synth(
            ExprKind::Unary {
                op: UnOp::Not,
                operand: arg,
            },
            arg_ty,
        )),
        TrustedAction::OkProducingCall(_) => {
            let target = ok_target(pkg, view, arg);
            let target_ty = view.expr_ty(target);
            let nil = view.add_synth(ExprKind::NilLit, target_ty);
            Some(view.add_synth(
                ExprKind::Binary {
                    op: BinOp::Neq,
                    lhs: target,
                    rhs: nil,
                },
                target_ty,
            ))
        }
        TrustedAction::NoReturn | TrustedAction::NonnilResult => None,
    }
}

/// Split blocks at statement-position trusted calls.
pub fn split_trusted_calls(pkg: &Package, cfg: &mut Cfg, view: &mut AstView<'_>) {
    let mut work: Vec<BlockId> = cfg.live_blocks().collect();
    while let Some(b) = work.pop() {
        if let Some(next) = split_first_trusted(pkg, cfg, view, b) {
            work.push(next);
        }
    }
}

/// Ok-producing calls in branch-condition position: `if errors.As(err, &t)`
/// taking the true branch means `t` is non-nil there. The narrowing fact is
/// appended to the condition (`call && t != nil`), the same way inlined
/// helper bodies are; canonicalization then splits the conjunction so the
/// true branch learns it.
pub fn narrow_ok_producing_conds(pkg: &Package, cfg: &mut Cfg, view: &mut AstView<'_>) {
    for b in cfg.live_blocks().collect::<Vec<_>>() {
        let block = cfg.block(b);
        if block.succs.len() != 2 {
            continue;
        }
        let Some(cond) = block.branch_cond() else {
            continue;
        };
        let cond = view.strip_parens(cond);
        let ExprKind::Call { callee, args } = view.expr_node(cond).kind.clone() else {
            continue;
        };
        let func = match callee {
            Callee::Func(f) => f,
            Callee::Method { func, .. } => func,
            _ => continue,
        };
        let Some(TrustedAction::OkProducingCall(sel)) = trusted_action(pkg, func) else {
            continue;
        };
        let Some(arg) = select_arg(pkg, &args, sel) else {
            continue;
        };
        let Some(narrow) = synth_cond(pkg, view, TrustedAction::OkProducingCall(sel), arg) else {
            continue;
        };
        let cond_ty = view.expr_ty(cond);
        let appended = view.add_synth(
            ExprKind::Binary {
                op: BinOp::LAnd,
                lhs: cond,
                rhs: narrow,
            },
            cond_ty,
        );
        if let Some(last) = cfg.block_mut(b).nodes.last_mut() {
            *last = CfgNode::Expr(appended);
        }
    }
}

/// Split `b` at its first trusted statement call, returning the
/// continuation block to scan next.
fn split_first_trusted(
    pkg: &Package,
    cfg: &mut Cfg,
    view: &mut AstView<'_>,
    b: BlockId,
) -> Option<BlockId> {
    let nodes = &cfg.block(b).nodes;
    let mut found = None;
    for (i, node) in nodes.iter().enumerate() {
        let CfgNode::Stmt(s) = node else { continue };
        let StmtKind::ExprStmt { expr } = &pkg.ast.stmt(*s).kind else {
            continue;
        };
        let expr = pkg.ast.strip_parens(*expr);
        let ExprKind::Call { callee, args } = &pkg.ast.expr(expr).kind else {
            continue;
        };
        let func = match callee {
            Callee::Func(f) => *f,
            Callee::Method { func, .. } => *func,
            _ => continue,
        };
        let Some(action) = trusted_action(pkg, func) else {
            continue;
        };
        if matches!(action, TrustedAction::NonnilResult) {
            continue;
        }
        found = Some((i, action, args.clone()));
        break;
    }
    let (i, action, args) = found?;

    if matches!(action, TrustedAction::NoReturn) {
        // call never returns: drop everything after it and all successors
        cfg.block_mut(b).nodes.truncate(i + 1);
        cfg.clear_succs(b);
        cfg.block_mut(b).is_return = false;
        return None;
    }

    let sel = match action {
        TrustedAction::RequireNonnil(s)
        | TrustedAction::RequireNil(s)
        | TrustedAction::RequireTrue(s)
        | TrustedAction::RequireFalse(s)
        | TrustedAction::RequireNonempty(s)
        | TrustedAction::OkProducingCall(s) => s,
        _ => return None,
    };
    let arg = select_arg(pkg, &args, sel)?;
    let cond = synth_cond(pkg, view, action, arg)?;

    // continuation block takes the remainder and the old successors
    let cont = cfg.add_block();
    let rest: Vec<CfgNode> = cfg.block_mut(b).nodes.split_off(i + 1);
    let was_return = cfg.block(b).is_return;
    cfg.block_mut(cont).nodes = rest;
    cfg.block_mut(cont).is_return = was_return;
    let old_succs = cfg.block(b).succs.clone();
    cfg.clear_succs(b);
    for s in old_succs {
        cfg.add_edge(cont, s);
    }

    // dead failure branch for the negated case
    let dead = cfg.add_block();
    cfg.block_mut(dead).live = false;

    cfg.block_mut(b).is_return = false;
    cfg.block_mut(b).nodes.push(CfgNode::Expr(cond));
    cfg.add_edge(b, cont);
    cfg.add_edge(b, dead);

    Some(cont)
}
