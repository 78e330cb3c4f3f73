//! Contract inference
//!
//! A lightweight nilness abstract interpretation over a value-numbered view
//! of the body, for functions with exactly one nil-admitting parameter and
//! one nil-admitting result.
//!
//! Algorithm:
//! 1. Number every definition site statically, with value 0 reserved for
//!    the parameter's entry value
//! 2. Propagate forward per block a *set* of nilness tables, the
//!    disjunction of reachable states; branches refine tables or drop the
//!    contradicted ones, joins union them
//! 3. At every return, snapshot (parameter nilness, result nilness, result
//!    value identity)
//! 4. `nonnil -> nonnil` holds iff no snapshot is a counterexample: a
//!    state where the parameter is not known nil and the result is neither
//!    known non-nil nor the parameter's own entry value
//!
//! Value numbering keeps the parameter's entry value distinct from later
//! reassignments of the parameter variable, so `p = nil; return p` does not
//! masquerade as "the parameter was nil". A per-block cap on the table set
//! aborts inference for pathological functions, which simply yields no
//! contract.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::features::contracts::domain::Contract;
use crate::features::preprocess::{self, trusted_nonnil_result};
use crate::shared::models::{
    AstRead, BinOp, BlockId, Builtin, Callee, Cfg, CfgNode, ExprId, ExprKind, FuncId, Package,
    StmtKind, UnOp, VarId,
};

/// Value number. `PARAM_ENTRY` is the parameter's value at function entry.
type ValId = u32;
const PARAM_ENTRY: ValId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Nilness {
    Nil,
    Nonnil,
    Unknown,
}

/// One reachable state: variable bindings plus known nilness per value.
/// Only determined values appear in `nil`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
struct Table {
    bind: BTreeMap<VarId, ValId>,
    nil: BTreeMap<ValId, Nilness>,
}

impl Table {
    fn nilness(&self, val: ValId) -> Nilness {
        self.nil.get(&val).copied().unwrap_or(Nilness::Unknown)
    }

    /// Refine `val` to `n`; `None` when the state contradicts the fact and
    /// is unreachable on this edge.
    fn refine(mut self, val: ValId, n: Nilness) -> Option<Table> {
        match (self.nilness(val), n) {
            (Nilness::Nil, Nilness::Nonnil) | (Nilness::Nonnil, Nilness::Nil) => None,
            (_, Nilness::Unknown) => Some(self),
            _ => {
                self.nil.insert(val, n);
                Some(self)
            }
        }
    }
}

/// Snapshot taken at a return instruction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ReturnState {
    param_nil: Nilness,
    ret_nil: Nilness,
    ret_val: Option<ValId>,
}

impl ReturnState {
    fn is_counterexample(&self) -> bool {
        self.param_nil != Nilness::Nil
            && self.ret_nil != Nilness::Nonnil
            && self.ret_val != Some(PARAM_ENTRY)
    }
}

/// Static value numbers per definition site, so re-processing a block in a
/// later round reproduces identical states.
struct DefSites {
    map: FxHashMap<(u32, u32, u32), ValId>,
}

impl DefSites {
    fn number(cfg: &Cfg, pkg: &Package) -> Self {
        let mut map = FxHashMap::default();
        let mut next: ValId = PARAM_ENTRY + 1;
        for (bi, block) in cfg.blocks.iter().enumerate() {
            for (ni, node) in block.nodes.iter().enumerate() {
                let CfgNode::Stmt(s) = node else { continue };
                let slots: u32 = match &pkg.ast.stmt(*s).kind {
                    StmtKind::Assign { lhs, .. } => lhs.len() as u32,
                    StmtKind::VarDecl { vars, .. } => vars.len() as u32,
                    StmtKind::RangeBind { .. } => 2,
                    _ => 0,
                };
                for slot in 0..slots {
                    map.insert((bi as u32, ni as u32, slot), next);
                    next += 1;
                }
            }
        }
        Self { map }
    }

    fn val(&self, block: BlockId, node: u32, slot: u32) -> ValId {
        // numbering covered every def site above
        self.map[&(block.0, node, slot)]
    }
}

struct Inferrer<'a> {
    pkg: &'a Package,
    view: &'a crate::shared::models::AstView<'a>,
    defs: DefSites,
}

impl Inferrer<'_> {
    /// (value identity, nilness) of `expr` under `table`.
    fn eval(&self, table: &Table, expr: ExprId) -> (Option<ValId>, Nilness) {
        let expr = self.view.strip_parens(expr);
        match &self.view.expr_node(expr).kind {
            ExprKind::NilLit => (None, Nilness::Nil),
            ExprKind::Ident(v) => match table.bind.get(v) {
                Some(val) => (Some(*val), table.nilness(*val)),
                None => (None, Nilness::Unknown),
            },
            ExprKind::Unary {
                op: UnOp::AddrOf, ..
            } => (None, Nilness::Nonnil),
            ExprKind::Composite { .. } | ExprKind::FuncLit(_) => (None, Nilness::Nonnil),
            ExprKind::Call { callee, args } => match callee {
                Callee::Builtin(Builtin::New) | Callee::Builtin(Builtin::Make) => {
                    (None, Nilness::Nonnil)
                }
                // append propagates its base operand's nilness
                Callee::Builtin(Builtin::Append) => {
                    let n = args
                        .first()
                        .map(|a| self.eval(table, *a).1)
                        .unwrap_or(Nilness::Unknown);
                    (None, n)
                }
                Callee::Func(f) if trusted_nonnil_result(self.pkg, *f) => (None, Nilness::Nonnil),
                _ => (None, Nilness::Unknown),
            },
            // interface adaptation is transparent for nilness
            ExprKind::TypeAssert { operand, .. } => (None, self.eval(table, *operand).1),
            _ => (None, Nilness::Unknown),
        }
    }

    /// Run one statement over one table. Return snapshots are appended.
    fn transfer(
        &self,
        mut table: Table,
        block: BlockId,
        node: u32,
        kind: &StmtKind,
        returns: &mut BTreeSet<ReturnState>,
    ) -> Table {
        match kind {
            StmtKind::Assign { lhs, rhs, .. } => {
                if lhs.len() == rhs.len() {
                    for (slot, (l, r)) in lhs.iter().zip(rhs.iter()).enumerate() {
                        let l = self.view.strip_parens(*l);
                        let ExprKind::Ident(v) = self.view.expr_node(l).kind else {
                            continue;
                        };
                        let (val, n) = self.eval(&table, *r);
                        let val = val.unwrap_or_else(|| {
                            let fresh = self.defs.val(block, node, slot as u32);
                            if n != Nilness::Unknown {
                                table.nil.insert(fresh, n);
                            } else {
                                table.nil.remove(&fresh);
                            }
                            fresh
                        });
                        table.bind.insert(v, val);
                    }
                } else {
                    // comma-ok and multi-result forms: values are opaque
                    for (slot, l) in lhs.iter().enumerate() {
                        let l = self.view.strip_parens(*l);
                        if let ExprKind::Ident(v) = self.view.expr_node(l).kind {
                            let fresh = self.defs.val(block, node, slot as u32);
                            table.nil.remove(&fresh);
                            table.bind.insert(v, fresh);
                        }
                    }
                }
            }
            StmtKind::VarDecl { vars, ty, init } => {
                if init.len() == vars.len() {
                    for (slot, (v, e)) in vars.iter().zip(init.iter()).enumerate() {
                        let (val, n) = self.eval(&table, *e);
                        let val = val.unwrap_or_else(|| {
                            let fresh = self.defs.val(block, node, slot as u32);
                            if n != Nilness::Unknown {
                                table.nil.insert(fresh, n);
                            } else {
                                table.nil.remove(&fresh);
                            }
                            fresh
                        });
                        table.bind.insert(*v, val);
                    }
                } else {
                    // zero values
                    let zero = if self.pkg.types.admits_nil(*ty) {
                        Nilness::Nil
                    } else {
                        Nilness::Nonnil
                    };
                    for (slot, v) in vars.iter().enumerate() {
                        let fresh = self.defs.val(block, node, slot as u32);
                        table.nil.insert(fresh, zero);
                        table.bind.insert(*v, fresh);
                    }
                }
            }
            StmtKind::RangeBind { key, value, .. } => {
                for (slot, e) in [key, value].into_iter().enumerate() {
                    let Some(e) = e else { continue };
                    let e = self.view.strip_parens(*e);
                    if let ExprKind::Ident(v) = self.view.expr_node(e).kind {
                        let fresh = self.defs.val(block, node, slot as u32);
                        table.nil.remove(&fresh);
                        table.bind.insert(v, fresh);
                    }
                }
            }
            StmtKind::Return { results } => {
                if let Some(r) = results.first() {
                    let (ret_val, ret_nil) = self.eval(&table, *r);
                    returns.insert(ReturnState {
                        param_nil: table.nilness(PARAM_ENTRY),
                        ret_nil,
                        ret_val,
                    });
                }
            }
            StmtKind::ExprStmt { .. } => {}
        }
        table
    }

    /// Split the block's out-set along its branch condition.
    fn branch(&self, cond: ExprId, tables: &BTreeSet<Table>) -> (BTreeSet<Table>, BTreeSet<Table>) {
        let cond = self.view.strip_parens(cond);
        let ExprKind::Binary {
            op: BinOp::Eq,
            lhs,
            rhs,
        } = self.view.expr_node(cond).kind
        else {
            return (tables.clone(), tables.clone());
        };

        let lhs_id = {
            let l = self.view.strip_parens(lhs);
            match self.view.expr_node(l).kind {
                ExprKind::Ident(v) => Some(v),
                _ => None,
            }
        };

        if self.view.is_nil_lit(rhs) {
            // canonical nil check: x == nil
            let Some(v) = lhs_id else {
                return (tables.clone(), tables.clone());
            };
            let mut on_true = BTreeSet::new();
            let mut on_false = BTreeSet::new();
            for t in tables {
                if let Some(val) = t.bind.get(&v).copied() {
                    if let Some(refined) = t.clone().refine(val, Nilness::Nil) {
                        on_true.insert(refined);
                    }
                    if let Some(refined) = t.clone().refine(val, Nilness::Nonnil) {
                        on_false.insert(refined);
                    }
                } else {
                    on_true.insert(t.clone());
                    on_false.insert(t.clone());
                }
            }
            return (on_true, on_false);
        }

        // x == y over two tracked values: the true edge unifies nilness
        let rhs_id = {
            let r = self.view.strip_parens(rhs);
            match self.view.expr_node(r).kind {
                ExprKind::Ident(v) => Some(v),
                _ => None,
            }
        };
        if let (Some(a), Some(b)) = (lhs_id, rhs_id) {
            let mut on_true = BTreeSet::new();
            for t in tables {
                let (va, vb) = match (t.bind.get(&a).copied(), t.bind.get(&b).copied()) {
                    (Some(va), Some(vb)) => (va, vb),
                    _ => {
                        on_true.insert(t.clone());
                        continue;
                    }
                };
                let learned = match (t.nilness(va), t.nilness(vb)) {
                    (Nilness::Unknown, n) | (n, Nilness::Unknown) => n,
                    (x, y) if x == y => x,
                    // contradictory equality: edge unreachable
                    _ => continue,
                };
                let refined = t
                    .clone()
                    .refine(va, learned)
                    .and_then(|t| t.refine(vb, learned));
                if let Some(r) = refined {
                    on_true.insert(r);
                }
            }
            return (on_true, tables.clone());
        }

        (tables.clone(), tables.clone())
    }
}

/// Infer `nonnil -> nonnil` for `func`, if it is eligible and its body
/// admits no counterexample. Exceeding the per-block state cap aborts
/// inference and yields no contract.
pub fn infer_contract(pkg: &Package, func: FuncId, config: &AnalyzerConfig) -> Option<Contract> {
    let info = pkg.func(func);
    if info.receiver.is_some()
        || info.variadic
        || info.params.len() != 1
        || info.results.len() != 1
    {
        return None;
    }
    let param = info.params[0];
    if !pkg.types.admits_nil(pkg.var(param).ty) || !pkg.types.admits_nil(info.results[0]) {
        return None;
    }
    let cfg_id = info.cfg?;

    let pre = preprocess::preprocess(pkg, pkg.cfg(cfg_id));
    let cfg = &pre.cfg;
    let inferrer = Inferrer {
        pkg,
        view: &pre.view,
        defs: DefSites::number(cfg, pkg),
    };

    let mut entry_table = Table::default();
    entry_table.bind.insert(param, PARAM_ENTRY);
    let mut in_states: Vec<BTreeSet<Table>> = vec![BTreeSet::new(); cfg.num_blocks()];
    in_states[cfg.entry.0 as usize].insert(entry_table);

    let mut returns: BTreeSet<ReturnState> = BTreeSet::new();
    let mut work: VecDeque<BlockId> = VecDeque::new();
    work.push_back(cfg.entry);

    let budget = config.max_rounds.saturating_mul(cfg.num_blocks().max(1));
    let mut processed = 0usize;

    while let Some(b) = work.pop_front() {
        processed += 1;
        if processed > budget {
            debug!(func = %info.name, "contract inference exceeded round budget");
            return None;
        }

        let mut tables: BTreeSet<Table> = in_states[b.0 as usize].clone();
        let block = cfg.block(b);
        let cond = block.branch_cond();
        let node_count = block.nodes.len();
        // the branch condition itself has no transfer effect
        let effective = if cond.is_some() {
            node_count.saturating_sub(1)
        } else {
            node_count
        };

        for (ni, cfg_node) in block.nodes.iter().take(effective).enumerate() {
            let CfgNode::Stmt(s) = cfg_node else { continue };
            let kind = pkg.ast.stmt(*s).kind.clone();
            tables = tables
                .into_iter()
                .map(|t| inferrer.transfer(t, b, ni as u32, &kind, &mut returns))
                .collect();
            if tables.len() > config.block_state_cap {
                debug!(func = %info.name, "contract inference exceeded state cap");
                return None;
            }
        }

        let outs: Vec<(BlockId, BTreeSet<Table>)> = match (cond, block.succs.len()) {
            (Some(c), 2) => {
                let (on_true, on_false) = inferrer.branch(c, &tables);
                vec![(block.succs[0], on_true), (block.succs[1], on_false)]
            }
            _ => block
                .succs
                .iter()
                .map(|s| (*s, tables.clone()))
                .collect(),
        };

        for (succ, out) in outs {
            if !cfg.block(succ).live {
                continue;
            }
            let state = &mut in_states[succ.0 as usize];
            let before = state.len();
            state.extend(out);
            if state.len() > config.block_state_cap {
                debug!(func = %info.name, "contract inference exceeded state cap");
                return None;
            }
            if state.len() != before {
                work.push_back(succ);
            }
        }
    }

    if returns.is_empty() {
        return None;
    }
    if returns.iter().any(ReturnState::is_counterexample) {
        return None;
    }
    Some(Contract::nonnil_to_nonnil())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testkit::{expr_node, stmt_node, TestPkg};

    fn config() -> AnalyzerConfig {
        AnalyzerConfig::default()
    }

    /// `func passThrough(p *int) *int { if p == nil { return nil }; return p }`
    #[test]
    fn test_pass_through_inferred() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let p = t.param_var("p", ptr);
        let f = t.func("passThrough", &[p], &[ptr]);

        let p_read = t.ident(p);
        let cond = t.eq_nil(p_read);
        let nil_ret_val = t.nil(ptr);
        let ret_nil = t.ret(&[nil_ret_val]);
        let p_read2 = t.ident(p);
        let ret_p = t.ret(&[p_read2]);

        let mut cfg = Cfg::new();
        let then_b = cfg.add_block();
        let else_b = cfg.add_block();
        cfg.block_mut(cfg.entry).nodes.push(expr_node(cond));
        cfg.add_edge(cfg.entry, then_b);
        cfg.add_edge(cfg.entry, else_b);
        cfg.block_mut(then_b).nodes.push(stmt_node(ret_nil));
        cfg.block_mut(then_b).is_return = true;
        cfg.block_mut(else_b).nodes.push(stmt_node(ret_p));
        cfg.block_mut(else_b).is_return = true;
        t.attach_cfg(f, cfg);

        assert_eq!(
            infer_contract(&t.pkg, f, &config()),
            Some(Contract::nonnil_to_nonnil())
        );
    }

    /// `func alwaysNil(p *int) *int { return nil }` has a counterexample.
    #[test]
    fn test_always_nil_not_inferred() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let p = t.param_var("p", ptr);
        let f = t.func("alwaysNil", &[p], &[ptr]);
        let nil_val = t.nil(ptr);
        let ret = t.ret(&[nil_val]);
        let cfg = t.linear_cfg(vec![stmt_node(ret)]);
        t.attach_cfg(f, cfg);

        assert_eq!(infer_contract(&t.pkg, f, &config()), None);
    }

    /// The identity function is nonnil -> nonnil without any branch.
    #[test]
    fn test_identity_inferred() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let p = t.param_var("p", ptr);
        let f = t.func("id", &[p], &[ptr]);
        let p_read = t.ident(p);
        let ret = t.ret(&[p_read]);
        let cfg = t.linear_cfg(vec![stmt_node(ret)]);
        t.attach_cfg(f, cfg);

        assert_eq!(
            infer_contract(&t.pkg, f, &config()),
            Some(Contract::nonnil_to_nonnil())
        );
    }

    /// Reassigning the parameter does not count as "the parameter was nil".
    #[test]
    fn test_reassigned_param_not_inferred() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let p = t.param_var("p", ptr);
        let f = t.func("clobber", &[p], &[ptr]);
        let p_lhs = t.ident(p);
        let nil_val = t.nil(ptr);
        let clobber = t.assign(&[p_lhs], &[nil_val]);
        let p_read = t.ident(p);
        let ret = t.ret(&[p_read]);
        let cfg = t.linear_cfg(vec![stmt_node(clobber), stmt_node(ret)]);
        t.attach_cfg(f, cfg);

        // returns nil for a non-nil argument: counterexample
        assert_eq!(infer_contract(&t.pkg, f, &config()), None);
    }

    /// `func fresh(p *int) *int { return new(int) }` always returns non-nil.
    #[test]
    fn test_fresh_allocation_inferred() {
        let mut t = TestPkg::new("example.com/p");
        let int = t.ty_int();
        let ptr = t.ty_ptr(int);
        let p = t.param_var("p", ptr);
        let f = t.func("fresh", &[p], &[ptr]);
        let alloc = t.new_of(int);
        let ret = t.ret(&[alloc]);
        let cfg = t.linear_cfg(vec![stmt_node(ret)]);
        t.attach_cfg(f, cfg);

        assert_eq!(
            infer_contract(&t.pkg, f, &config()),
            Some(Contract::nonnil_to_nonnil())
        );
    }

    /// Two-parameter functions are out of scope.
    #[test]
    fn test_two_params_not_eligible() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let a = t.param_var("a", ptr);
        let b = t.param_var("b", ptr);
        let f = t.func("pick", &[a, b], &[ptr]);
        let a_read = t.ident(a);
        let ret = t.ret(&[a_read]);
        let cfg = t.linear_cfg(vec![stmt_node(ret)]);
        t.attach_cfg(f, cfg);

        assert_eq!(infer_contract(&t.pkg, f, &config()), None);
    }
}
