//! Backpropagation engine
//!
//! Walks a preprocessed CFG in reverse, maintaining the assertion state of
//! outstanding non-nil obligations. Uses insert obligations; assignments
//! transfer them onto the assigned expression; declarations, conditionals
//! and function entry resolve them against producers, emitting full
//! triggers.
//!
//! Algorithm:
//! 1. Seed every block's entry state empty; order blocks successors-first
//! 2. Per block: merge successor states (branch refinement for canonical
//!    nil checks, guard matches kept only when common), then step the
//!    block's nodes in reverse source order
//! 3. Repeat over the whole function until no state changes, or the entry
//!    trigger set is unchanged for the configured stable rounds
//! 4. Resolve the entry state: surviving obligations pair with parameter /
//!    receiver / field / global producers and escape as entry triggers
//!
//! Back-edges make step 3 a fixed point; a hard round cap and the
//! cancellation token bound it. Trigger emission is idempotent under
//! coalescing, so re-stepping a block in a later round cannot inflate the
//! output.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::features::assertion::{coalesce, Consumer, FullTrigger, Producer};
use crate::features::contracts::ContractMap;
use crate::features::preprocess::{self, trusted_nonnil_result};
use crate::shared::cancel::CancelToken;
use crate::shared::models::{
    AstRead, AstView, BinOp, BlockId, Builtin, Callee, Cfg, CfgNode, CompositeKey, ExprId,
    ExprKey, ExprKind, FuncId, NilscanError, Package, Pos, Result, StmtId, StmtKind, TypeKind,
    UnOp, VarId, VarKind,
};

use super::state::{apply_steps, key_type, AssertionState, Step};

/// Run backprop for one function, returning its full triggers.
pub fn run_backprop(
    pkg: &Package,
    func: FuncId,
    contracts: &ContractMap,
    config: &AnalyzerConfig,
    cancel: &CancelToken,
) -> Result<Vec<FullTrigger>> {
    let info = pkg.func(func);
    let Some(cfg_id) = info.cfg else {
        return Ok(Vec::new());
    };
    let pre = preprocess::preprocess(pkg, pkg.cfg(cfg_id));
    let mut engine = Engine {
        pkg,
        func,
        cfg: &pre.cfg,
        view: &pre.view,
        contracts,
        config,
        triggers: Vec::new(),
    };
    engine.run(cancel)
}

struct Engine<'a> {
    pkg: &'a Package,
    func: FuncId,
    cfg: &'a Cfg,
    view: &'a AstView<'a>,
    contracts: &'a ContractMap,
    config: &'a AnalyzerConfig,
    triggers: Vec<FullTrigger>,
}

impl Engine<'_> {
    fn run(&mut self, cancel: &CancelToken) -> Result<Vec<FullTrigger>> {
        let order: Vec<BlockId> = {
            // backward analysis: successors before the block
            let mut rpo = self.cfg.reverse_postorder();
            rpo.reverse();
            rpo
        };

        let mut states: FxHashMap<BlockId, AssertionState> = FxHashMap::default();
        let mut last_signature: Option<Vec<String>> = None;
        let mut stable_rounds = 0usize;
        let mut round = 0usize;

        loop {
            round += 1;
            if cancel.is_cancelled() {
                return Err(NilscanError::timeout(format!(
                    "backprop cancelled in `{}` after {} rounds",
                    self.pkg.func(self.func).name,
                    round - 1
                )));
            }
            if round > self.config.max_rounds {
                warn!(
                    func = %self.pkg.func(self.func).name,
                    rounds = round - 1,
                    "backprop hit the round cap before stabilizing"
                );
                break;
            }

            let mut changed = false;
            for &b in &order {
                let new_state = self.step_block(b, &states);
                if states.get(&b) != Some(&new_state) {
                    states.insert(b, new_state);
                    changed = true;
                }
            }

            self.triggers = coalesce(std::mem::take(&mut self.triggers), self.view);

            let signature = self.signature(states.get(&self.cfg.entry));
            if last_signature.as_ref() == Some(&signature) {
                stable_rounds += 1;
            } else {
                stable_rounds = 0;
                last_signature = Some(signature);
            }

            if !changed {
                break;
            }
            if stable_rounds >= self.config.stable_round_limit {
                debug!(
                    func = %self.pkg.func(self.func).name,
                    round,
                    "entry triggers stable, declaring convergence"
                );
                break;
            }
        }

        // obligations alive at function entry escape as entry triggers
        let mut entry_state = states.remove(&self.cfg.entry).unwrap_or_default();
        let entry_triggers = self.resolve_entry(&mut entry_state);
        self.triggers.extend(entry_triggers);
        let mut out = coalesce(std::mem::take(&mut self.triggers), self.view);
        // the synthetic overlay dies with this call; positions must outlive it
        crate::features::assertion::trigger::bake_positions(&mut out, self.view);
        let scope = self.pkg.func(self.func).name.clone();
        for t in &mut out {
            t.consumer.scope.get_or_insert_with(|| scope.clone());
        }
        Ok(out)
    }

    /// Stable signature of the triggers that would currently escape at the
    /// function entry.
    fn signature(&self, entry: Option<&AssertionState>) -> Vec<String> {
        let mut parts: Vec<String> = self
            .triggers
            .iter()
            .map(|t| {
                format!(
                    "{:?}|{:?}|{:?}|{:?}",
                    t.producer.kind,
                    t.consumer.kind,
                    t.producer_pos(self.view),
                    t.consumer_pos(self.view)
                )
            })
            .collect();
        if let Some(state) = entry {
            for (key, node) in state.iter() {
                parts.push(format!("{:?}#{}", key, node.consumers.len()));
            }
        }
        parts.sort();
        parts
    }

    // ── block stepping ─────────────────────────────────────────────────

    fn step_block(&mut self, b: BlockId, states: &FxHashMap<BlockId, AssertionState>) -> AssertionState {
        let mut state = self.merge_succs(b, states);
        let block = self.cfg.block(b);
        for node in block.nodes.iter().rev() {
            match node {
                CfgNode::Expr(e) => self.consume_expr(*e, &mut state),
                CfgNode::Stmt(s) => self.step_stmt(*s, &mut state),
            }
        }
        state
    }

    /// Merge successor entry-states, applying branch refinement for
    /// canonical nil checks.
    fn merge_succs(
        &mut self,
        b: BlockId,
        states: &FxHashMap<BlockId, AssertionState>,
    ) -> AssertionState {
        let block = self.cfg.block(b);
        let live_succs: Vec<BlockId> = block
            .succs
            .iter()
            .copied()
            .filter(|s| self.cfg.block(*s).live)
            .collect();

        if block.succs.len() == 2 {
            if let Some(cond) = block.branch_cond() {
                if let Some(key) = self.nil_check_key(cond) {
                    let mut on_true = block
                        .succs
                        .first()
                        .and_then(|s| states.get(s))
                        .cloned()
                        .unwrap_or_default();
                    let mut on_false = block
                        .succs
                        .get(1)
                        .and_then(|s| states.get(s))
                        .cloned()
                        .unwrap_or_default();

                    // true branch: the expression is nil here, so every
                    // outstanding obligation on it trips
                    if let Some(node) = on_true.take(&key) {
                        let lhs = self.nil_check_lhs(cond);
                        for c in node.consumers {
                            let producer = self.checked_nil_producer(lhs);
                            self.emit(producer, c, false);
                        }
                    }
                    // false branch: known non-nil, obligations discharged
                    on_false.take(&key);

                    on_true.merge(&on_false);
                    return on_true;
                }
            }
        }

        let mut merged = AssertionState::new();
        for s in live_succs {
            if let Some(st) = states.get(&s) {
                merged.merge(st);
            }
        }
        merged
    }

    /// Key of `x` when `cond` is the canonical nil check `x == nil`.
    fn nil_check_key(&self, cond: ExprId) -> Option<ExprKey> {
        let cond = self.view.strip_parens(cond);
        if let ExprKind::Binary {
            op: BinOp::Eq,
            lhs,
            rhs,
        } = self.view.expr_node(cond).kind
        {
            if self.view.is_nil_lit(rhs) {
                return self.view.canon_key(lhs);
            }
        }
        None
    }

    fn nil_check_lhs(&self, cond: ExprId) -> ExprId {
        let cond = self.view.strip_parens(cond);
        if let ExprKind::Binary { lhs, .. } = self.view.expr_node(cond).kind {
            self.view.strip_parens(lhs)
        } else {
            cond
        }
    }

    fn checked_nil_producer(&self, expr: ExprId) -> Producer {
        Producer::new(
            nilscan_facts::ProducerKind::LiteralNil,
            crate::features::assertion::SiteRef::Literal(nilscan_facts::Nilability::Nilable),
            Some(expr),
            "value known nil from this check".into(),
        )
    }

    // ── statement stepping ─────────────────────────────────────────────

    fn step_stmt(&mut self, s: StmtId, state: &mut AssertionState) {
        let kind = self.pkg.ast.stmt(s).kind.clone();
        let pos = self.pkg.ast.stmt(s).pos;
        match kind {
            StmtKind::ExprStmt { expr } => self.consume_expr(expr, state),

            StmtKind::Return { results } => {
                for (i, r) in results.iter().enumerate() {
                    if self
                        .pkg
                        .types
                        .admits_nil(self.view.expr_ty(*r))
                    {
                        let consumer = Consumer::return_at(self.pkg, self.func, i, *r);
                        self.add_obligation(*r, consumer, state);
                    }
                    self.consume_expr(*r, state);
                }
            }

            StmtKind::Assign { lhs, rhs, .. } => self.step_assign(&lhs, &rhs, state),

            StmtKind::VarDecl { vars, ty, init } => {
                if init.len() == vars.len() {
                    for (v, e) in vars.iter().zip(init.iter()) {
                        self.transfer_subtree(ExprKey::Var(*v), Some(*e), state);
                        self.consume_expr(*e, state);
                    }
                } else {
                    // zero values
                    for v in &vars {
                        let taken = state.take_subtree(&ExprKey::Var(*v));
                        for (steps, node) in taken {
                            if steps.is_empty() {
                                if self.pkg.types.admits_nil(ty) {
                                    let producer =
                                        Producer::unassigned_local(self.pkg, *v, None).at(pos);
                                    for c in node.consumers {
                                        self.emit(producer.clone(), c, false);
                                    }
                                }
                                // non-nilable zero values discharge safely
                            } else {
                                self.resolve_steps(&steps, node.consumers, None);
                            }
                        }
                    }
                }
            }

            StmtKind::RangeBind {
                key,
                value,
                operand,
            } => {
                for bound in [key, value].into_iter().flatten() {
                    if let Some(bkey) = self.view.canon_key(bound) {
                        let taken = state.take_subtree(&bkey);
                        for (steps, node) in taken {
                            if steps.is_empty() {
                                // elements yielded by a range are trusted
                                // non-nil absent contrary evidence
                                let producer = Producer::deep_read(operand);
                                for c in node.consumers {
                                    self.emit(producer.clone(), c, false);
                                }
                            } else {
                                self.resolve_steps(&steps, node.consumers, Some(operand));
                            }
                        }
                    }
                }
                self.consume_expr(operand, state);
            }
        }
    }

    fn step_assign(&mut self, lhs: &[ExprId], rhs: &[ExprId], state: &mut AssertionState) {
        if lhs.len() == rhs.len() {
            for (l, r) in lhs.iter().zip(rhs.iter()) {
                if let Some(lkey) = self.view.canon_key(*l) {
                    self.transfer_subtree(lkey, Some(*r), state);
                }
                self.emit_site_assign(*l, *r, state);
                self.consume_lvalue(*l, state);
                self.consume_expr(*r, state);
            }
            return;
        }

        if lhs.len() == 2 && rhs.len() == 1 && self.is_comma_ok_rhs(rhs[0]) {
            // v, ok = m[k] / <-ch / x.(T): the read is guarded by ok
            let v = lhs[0];
            if let Some(vkey) = self.view.canon_key(v) {
                let taken = state.take_subtree(&vkey);
                for (steps, node) in taken {
                    if steps.is_empty() {
                        let producer = Producer::ok_read(rhs[0]);
                        for c in node.consumers {
                            self.emit(producer.clone(), c.with_guard_matched(), false);
                        }
                    } else {
                        self.resolve_steps(&steps, node.consumers, Some(rhs[0]));
                    }
                }
            }
            // the ok bool can carry no nil obligation; drop anything stale
            if let Some(okkey) = self.view.canon_key(lhs[1]) {
                state.take_subtree(&okkey);
            }
            self.emit_site_assign(v, rhs[0], state);
            self.consume_lvalue(v, state);
            self.consume_expr(rhs[0], state);
            return;
        }

        // multi-result call: a, b = f()
        if rhs.len() == 1 {
            let call = self.view.strip_parens(rhs[0]);
            if let ExprKind::Call { callee, .. } = &self.view.expr_node(call).kind {
                let func = match callee {
                    Callee::Func(f) => Some(*f),
                    Callee::Method { func, .. } => Some(*func),
                    _ => None,
                };
                for (i, l) in lhs.iter().enumerate() {
                    if let Some(lkey) = self.view.canon_key(*l) {
                        let taken = state.take_subtree(&lkey);
                        for (steps, node) in taken {
                            if steps.is_empty() {
                                let producer = match func {
                                    Some(f) if trusted_nonnil_result(self.pkg, f) => {
                                        Producer::trusted_result(call)
                                    }
                                    Some(f) => Producer::func_return(self.pkg, f, i, call),
                                    None => Producer::literal_nonnil(call, "result of indirect call"),
                                };
                                for c in node.consumers {
                                    self.emit(producer.clone(), c, false);
                                }
                            } else {
                                self.resolve_steps(&steps, node.consumers, Some(call));
                            }
                        }
                    }
                    self.emit_site_assign(*l, rhs[0], state);
                    self.consume_lvalue(*l, state);
                }
                self.consume_expr(rhs[0], state);
            }
        }
    }

    fn is_comma_ok_rhs(&self, e: ExprId) -> bool {
        let e = self.view.strip_parens(e);
        matches!(
            self.view.expr_node(e).kind,
            ExprKind::Index { .. } | ExprKind::Receive(_) | ExprKind::TypeAssert { .. }
        )
    }

    /// Assignments into fields and globals consume the assigned value
    /// against the site.
    fn emit_site_assign(&mut self, l: ExprId, r: ExprId, state: &mut AssertionState) {
        if !self.pkg.types.admits_nil(self.view.expr_ty(r)) {
            return;
        }
        let l = self.view.strip_parens(l);
        match self.view.expr_node(l).kind.clone() {
            ExprKind::Select { field, .. } => {
                let consumer = Consumer::field_assign(self.pkg, field, r);
                self.add_obligation(r, consumer, state);
            }
            ExprKind::Ident(v) if self.pkg.var(v).kind == VarKind::Global => {
                let consumer = Consumer::global_assign(self.pkg, v, r);
                self.add_obligation(r, consumer, state);
            }
            _ => {}
        }
    }

    // ── obligation plumbing ────────────────────────────────────────────

    /// Record that `e` must be non-nil for `consumer`. Stable expressions
    /// are tracked; everything else resolves against a producer here.
    fn add_obligation(&mut self, e: ExprId, consumer: Consumer, state: &mut AssertionState) {
        let e = self.view.strip_parens(e);
        if let Some(key) = self.view.canon_key(e) {
            state.insert(key, consumer);
            return;
        }

        // contracted single-in/single-out call: the consumer's fate follows
        // the argument, not the callee's result site
        if let ExprKind::Call { callee, args } = self.view.expr_node(e).kind.clone() {
            let func = match callee {
                Callee::Func(f) => Some(f),
                Callee::Method { func, .. } => Some(func),
                _ => None,
            };
            if let Some(f) = func {
                if self.contracts.has_nonnil_to_nonnil(f) && args.len() == 1 {
                    self.add_obligation(args[0], consumer.clone().via_contract(), state);
                    return;
                }
            }
        }

        let producer = self.producer_of(e);
        self.emit(producer, consumer, false);
    }

    /// Producer for an unstable expression (or a fallback for a stable one
    /// resolved at function entry).
    fn producer_of(&self, e: ExprId) -> Producer {
        let e = self.view.strip_parens(e);
        match classify_expr_producer(self.pkg, self.view, e) {
            Some(p) => p,
            None => match self.view.expr_node(e).kind {
                ExprKind::Ident(v) => self.var_producer(v, None),
                _ => Producer::literal_nonnil(e, "boolean expression"),
            },
        }
    }

    fn var_producer(&self, v: VarId, pos: Option<Pos>) -> Producer {
        match self.pkg.var(v).kind {
            VarKind::Global => {
                Producer::global_read_unpositioned(self.pkg, v)
            }
            VarKind::Param => {
                let idx = self.pkg.param_index(self.func, v).unwrap_or(0);
                Producer::param_in(self.pkg, self.func, idx, None).at(pos.or(self.func_pos()))
            }
            VarKind::Receiver => {
                Producer::receiver_in(self.pkg, self.func, None).at(pos.or(self.func_pos()))
            }
            VarKind::Local => Producer::unassigned_local(self.pkg, v, None).at(pos),
        }
    }

    fn func_pos(&self) -> Option<Pos> {
        let info = self.pkg.func(self.func);
        Some(Pos::new(info.file, info.span.start_line, info.span.start_col))
    }

    /// Resolve obligations whose key extends beyond the transferred or
    /// resolved prefix by `steps`. The outermost step names what produced
    /// the value.
    fn resolve_steps(&mut self, steps: &[Step], consumers: Vec<Consumer>, origin: Option<ExprId>) {
        let Some(outer) = steps.last() else { return };
        let producer = match outer {
            Step::Field(f) => match origin {
                Some(e) => Producer::field_read(self.pkg, *f, e),
                None => Producer::field_read_unpositioned(self.pkg, *f),
            },
            Step::Index | Step::Deref => match origin {
                Some(e) => Producer::deep_read(e),
                None => Producer::deep_read_unpositioned(),
            },
        };
        for c in consumers {
            self.emit(producer.clone(), c, false);
        }
    }

    /// Move every obligation rooted at `lkey` onto `rhs` (or resolve it
    /// when `rhs` is unstable).
    fn transfer_subtree(&mut self, lkey: ExprKey, rhs: Option<ExprId>, state: &mut AssertionState) {
        let taken = state.take_subtree(&lkey);
        if taken.is_empty() {
            return;
        }
        let rkey = rhs.and_then(|r| self.view.canon_key(r));

        for (steps, node) in taken {
            if let Some(rk) = &rkey {
                let new_key = apply_steps(rk.clone(), &steps);
                for c in node.consumers {
                    state.insert(new_key.clone(), c);
                }
                continue;
            }
            let Some(r) = rhs else {
                self.resolve_steps(&steps, node.consumers, None);
                continue;
            };
            if steps.is_empty() {
                for c in node.consumers {
                    self.add_obligation(r, c, state);
                }
                continue;
            }
            // composite literals route field obligations to components
            let r_stripped = self.view.strip_parens(r);
            if let ExprKind::Composite { ty, elems } = self.view.expr_node(r_stripped).kind.clone()
            {
                if let Step::Field(f) = steps[steps.len() - 1] {
                    let elem = elems.iter().find_map(|(k, e)| match k {
                        CompositeKey::Field(ef) if *ef == f => Some(*e),
                        _ => None,
                    });
                    match elem {
                        Some(e) if steps.len() == 1 => {
                            for c in node.consumers {
                                self.add_obligation(e, c, state);
                            }
                            continue;
                        }
                        None if steps.len() == 1 => {
                            // omitted field: zero value
                            if self.pkg.types.admits_nil(self.pkg.field(f).ty) {
                                let producer = Producer::new(
                                    nilscan_facts::ProducerKind::LiteralNil,
                                    crate::features::assertion::SiteRef::Literal(
                                        nilscan_facts::Nilability::Nilable,
                                    ),
                                    Some(r_stripped),
                                    format!(
                                        "field `{}` omitted from literal",
                                        self.pkg.field(f).name
                                    ),
                                );
                                for c in node.consumers {
                                    self.emit(producer.clone(), c, false);
                                }
                            }
                            continue;
                        }
                        _ => {}
                    }
                    let _ = ty;
                }
            }
            self.resolve_steps(&steps, node.consumers, Some(r));
        }
    }

    // ── expression consumption ─────────────────────────────────────────

    /// Walk an expression, inserting the obligations its evaluation
    /// creates.
    fn consume_expr(&mut self, e: ExprId, state: &mut AssertionState) {
        let e = self.view.strip_parens(e);
        match self.view.expr_node(e).kind.clone() {
            ExprKind::Unary {
                op: UnOp::Deref,
                operand,
            } => {
                self.add_obligation(operand, Consumer::deref(e), state);
                self.consume_expr(operand, state);
            }
            ExprKind::Select { base, field } => {
                if self.pkg.types.admits_nil(self.view.expr_ty(base)) {
                    self.add_obligation(base, Consumer::field_access(self.pkg, field, e), state);
                }
                self.consume_expr(base, state);
            }
            ExprKind::Index { base, index } => {
                // reading a nil map yields a zero value; indexing a nil
                // slice panics
                let base_ty = self.view.expr_ty(base);
                if !self.pkg.types.is_map(base_ty) && self.pkg.types.admits_nil(base_ty) {
                    self.add_obligation(base, Consumer::index(e), state);
                }
                self.consume_expr(base, state);
                self.consume_expr(index, state);
            }
            ExprKind::Call { callee, args } => {
                match callee {
                    Callee::Func(f) => self.consume_call_args(f, &args, state),
                    Callee::Method { func, recv } => {
                        self.add_obligation(recv, Consumer::method_recv(self.pkg, func, recv), state);
                        self.consume_expr(recv, state);
                        self.consume_call_args(func, &args, state);
                    }
                    Callee::Value(v) => {
                        if self.pkg.types.admits_nil(self.view.expr_ty(v)) {
                            self.add_obligation(v, Consumer::call_expr(e), state);
                        }
                        self.consume_expr(v, state);
                        for a in &args {
                            self.consume_expr(*a, state);
                        }
                    }
                    Callee::Builtin(_) => {
                        for a in &args {
                            self.consume_expr(*a, state);
                        }
                    }
                }
            }
            ExprKind::Composite { ty, elems } => {
                for (_, elem) in &elems {
                    self.consume_expr(*elem, state);
                }
                if self.config.experimental_struct_init {
                    self.check_struct_init(e, ty, &elems);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.consume_expr(lhs, state);
                self.consume_expr(rhs, state);
            }
            ExprKind::Unary { operand, .. } => self.consume_expr(operand, state),
            ExprKind::TypeAssert { operand, .. } => self.consume_expr(operand, state),
            ExprKind::Receive(chan) => self.consume_expr(chan, state),
            ExprKind::Ident(_)
            | ExprKind::NilLit
            | ExprKind::BoolLit(_)
            | ExprKind::IntLit(_)
            | ExprKind::StrLit(_)
            | ExprKind::FuncLit(_)
            | ExprKind::Paren(_) => {}
        }
    }

    fn consume_call_args(&mut self, f: FuncId, args: &[ExprId], state: &mut AssertionState) {
        let params = self.pkg.func(f).params.clone();
        for (k, a) in args.iter().enumerate() {
            if !self.pkg.types.admits_nil(self.view.expr_ty(*a)) {
                self.consume_expr(*a, state);
                continue;
            }
            if params.get(k).is_some() {
                self.add_obligation(*a, Consumer::call_arg(self.pkg, f, k, *a), state);
            }
            self.consume_expr(*a, state);
        }
    }

    /// Obligations created by writing through an lvalue.
    fn consume_lvalue(&mut self, l: ExprId, state: &mut AssertionState) {
        let l = self.view.strip_parens(l);
        match self.view.expr_node(l).kind.clone() {
            ExprKind::Select { base, field } => {
                if self.pkg.types.admits_nil(self.view.expr_ty(base)) {
                    self.add_obligation(base, Consumer::field_access(self.pkg, field, l), state);
                }
                self.consume_expr(base, state);
            }
            ExprKind::Index { base, index } => {
                // writing through a nil map or slice panics
                if self.pkg.types.admits_nil(self.view.expr_ty(base)) {
                    self.add_obligation(base, Consumer::deep_assign(l), state);
                }
                self.consume_expr(base, state);
                self.consume_expr(index, state);
            }
            ExprKind::Unary {
                op: UnOp::Deref,
                operand,
            } => {
                self.add_obligation(operand, Consumer::deref(l), state);
                self.consume_expr(operand, state);
            }
            _ => {}
        }
    }

    /// Experimental struct-init checking: composite literals that omit a
    /// nilable field claim a nil value for that field's site.
    fn check_struct_init(
        &mut self,
        e: ExprId,
        ty: crate::shared::models::TypeId,
        elems: &[(CompositeKey, ExprId)],
    ) {
        let TypeKind::Struct { fields, .. } = self.pkg.types.underlying(ty).clone() else {
            return;
        };
        for f in fields {
            if !self.pkg.types.admits_nil(self.pkg.field(f).ty) {
                continue;
            }
            let present = elems
                .iter()
                .any(|(k, _)| matches!(k, CompositeKey::Field(ef) if *ef == f));
            if present {
                continue;
            }
            let producer = Producer::new(
                nilscan_facts::ProducerKind::LiteralNil,
                crate::features::assertion::SiteRef::Literal(nilscan_facts::Nilability::Nilable),
                Some(e),
                format!("field `{}` omitted from literal", self.pkg.field(f).name),
            );
            let consumer = Consumer::field_assign(self.pkg, f, e);
            self.emit(producer, consumer, false);
        }
    }

    /// Resolve the entry-block state: every surviving obligation pairs with
    /// the producer its key names at function entry.
    fn resolve_entry(&mut self, state: &mut AssertionState) -> Vec<FullTrigger> {
        let mut out = Vec::new();
        for (key, node) in state.drain() {
            let (root, steps) = super::state::decompose(&key);
            if steps.is_empty() {
                let producer = self.var_producer(root, None);
                for c in node.consumers {
                    out.push(self.make_trigger(producer.clone(), c, false));
                }
                continue;
            }
            let producer = match steps[steps.len() - 1] {
                Step::Field(f) => Producer::field_read_unpositioned(self.pkg, f),
                Step::Index => {
                    let base_key = {
                        let base_steps = &steps[..steps.len() - 1];
                        apply_steps(ExprKey::Var(root), base_steps)
                    };
                    let is_map = key_type(self.pkg, &base_key)
                        .map(|t| self.pkg.types.is_map(t))
                        .unwrap_or(false);
                    if is_map {
                        Producer::map_index_unpositioned()
                    } else {
                        Producer::deep_read_unpositioned()
                    }
                }
                Step::Deref => Producer::deep_read_unpositioned(),
            };
            for c in node.consumers {
                out.push(self.make_trigger(producer.clone(), c, false));
            }
        }
        out
    }

    // ── trigger emission ───────────────────────────────────────────────

    fn make_trigger(&self, producer: Producer, consumer: Consumer, dup: bool) -> FullTrigger {
        let safe = producer.site.literal() == Some(nilscan_facts::Nilability::Nonnil)
            && !producer.needs_guard();
        let from_dup = dup || consumer.via_contract;
        let mut t = FullTrigger::new(producer, consumer);
        if from_dup {
            t = t.duplicated();
        }
        if safe {
            t = t.safe();
        }
        t
    }

    fn emit(&mut self, producer: Producer, consumer: Consumer, dup: bool) {
        let t = self.make_trigger(producer, consumer, dup);
        self.triggers.push(t);
    }
}

/// Producer classification shared by the backprop engine and the global
/// initializer analysis. `None` means the expression is a plain identifier
/// whose producer depends on the enclosing function's context.
pub fn classify_expr_producer(
    pkg: &Package,
    ast: &impl AstRead,
    e: ExprId,
) -> Option<Producer> {
    let e = ast.strip_parens(e);
    let producer = match ast.expr_node(e).kind.clone() {
        ExprKind::NilLit => Producer::literal_nil(e),
        ExprKind::Unary {
            op: UnOp::AddrOf, ..
        } => Producer::literal_nonnil(e, "address-of expression"),
        ExprKind::Composite { .. } => Producer::literal_nonnil(e, "composite literal"),
        ExprKind::FuncLit(_) => Producer::literal_nonnil(e, "function literal"),
        ExprKind::BoolLit(_) | ExprKind::IntLit(_) | ExprKind::StrLit(_) => {
            Producer::literal_nonnil(e, "constant")
        }
        ExprKind::Call { callee, .. } => match callee {
            Callee::Func(f) | Callee::Method { func: f, .. } => {
                if trusted_nonnil_result(pkg, f) {
                    Producer::trusted_result(e)
                } else if pkg.func(f).is_interface_method {
                    Producer::interface_return(pkg, f, 0, Some(e))
                } else {
                    Producer::func_return(pkg, f, 0, e)
                }
            }
            Callee::Builtin(Builtin::New | Builtin::Make | Builtin::Append) => {
                Producer::literal_nonnil(e, "freshly allocated value")
            }
            Callee::Builtin(_) => Producer::literal_nonnil(e, "builtin result"),
            Callee::Value(_) => Producer::literal_nonnil(e, "result of indirect call"),
        },
        ExprKind::Select { field, .. } => Producer::field_read(pkg, field, e),
        ExprKind::Index { base, .. } => {
            if pkg.types.is_map(ast.expr_ty(base)) {
                Producer::map_index(e)
            } else {
                Producer::deep_read(e)
            }
        }
        ExprKind::Unary { op: UnOp::Deref, .. } | ExprKind::Receive(_) => Producer::deep_read(e),
        ExprKind::TypeAssert { operand, .. } => {
            return classify_expr_producer(pkg, ast, operand)
        }
        ExprKind::Ident(v) if pkg.var(v).kind == VarKind::Global => {
            Producer::global_read(pkg, v, e)
        }
        ExprKind::Ident(_) => return None,
        ExprKind::Paren(_) | ExprKind::Unary { op: UnOp::Not, .. } | ExprKind::Binary { .. } => {
            Producer::literal_nonnil(e, "boolean expression")
        }
    };
    Some(producer)
}
