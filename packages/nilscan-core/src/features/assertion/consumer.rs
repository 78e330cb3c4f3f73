//! Consumers: uses that require a non-nil value
//!
//! A consumer either targets an annotation site of its own (an argument
//! flows into a parameter site, a returned value into a result site) or is
//! a hard requirement with no site (a dereference must simply not see nil).

use nilscan_facts::{ConsumerKind, SiteKey};
use serde::{Deserialize, Serialize};

use crate::shared::models::{ExprId, FieldId, FuncId, Package, Pos, VarId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    pub kind: ConsumerKind,
    /// Site the consumed value flows into; `None` for terminal uses that
    /// require non-nil on the spot.
    pub site: Option<SiteKey>,
    /// Expression at which the obligation arose; affiliation and
    /// zero-value-global consumers have none
    pub expr: Option<ExprId>,
    /// Position baked in before the per-function AST view is discarded
    pub pos: Option<Pos>,
    /// Enclosing function, for grouping diagnostics without positions
    pub scope: Option<String>,
    pub repr: String,
    /// Set when the backprop engine witnessed a guard check in scope for a
    /// guard-needing producer
    pub guard_matched: bool,
    /// Set when the obligation was rerouted through a contracted call's
    /// argument; the resulting trigger is marked as created by duplication
    pub via_contract: bool,
}

impl Consumer {
    pub fn new(kind: ConsumerKind, site: Option<SiteKey>, expr: ExprId, repr: String) -> Self {
        Self {
            kind,
            site,
            expr: Some(expr),
            pos: None,
            scope: None,
            repr,
            guard_matched: false,
            via_contract: false,
        }
    }

    /// A consumer with no carrier expression (affiliation edges, global
    /// zero values).
    pub fn unpositioned(kind: ConsumerKind, site: Option<SiteKey>, repr: String) -> Self {
        Self {
            kind,
            site,
            expr: None,
            pos: None,
            scope: None,
            repr,
            guard_matched: false,
            via_contract: false,
        }
    }

    pub fn with_guard_matched(mut self) -> Self {
        self.guard_matched = true;
        self
    }

    pub fn via_contract(mut self) -> Self {
        self.via_contract = true;
        self
    }

    // ── terminal uses ──────────────────────────────────────────────────

    pub fn deref(expr: ExprId) -> Self {
        Self::new(ConsumerKind::Deref, None, expr, "dereferenced".into())
    }

    pub fn field_access(pkg: &Package, field: FieldId, expr: ExprId) -> Self {
        Self::new(
            ConsumerKind::FieldAccess,
            None,
            expr,
            format!("accessed for field `{}`", pkg.field(field).name),
        )
    }

    pub fn method_recv(pkg: &Package, func: FuncId, expr: ExprId) -> Self {
        Self::new(
            ConsumerKind::MethodRecv,
            Some(pkg.receiver_site(func)),
            expr,
            format!("used as receiver of `{}`", pkg.func(func).name),
        )
    }

    pub fn index(expr: ExprId) -> Self {
        Self::new(ConsumerKind::Index, None, expr, "indexed".into())
    }

    pub fn call_expr(expr: ExprId) -> Self {
        Self::new(ConsumerKind::CallExpr, None, expr, "called".into())
    }

    // ── site-directed uses ─────────────────────────────────────────────

    pub fn call_arg(pkg: &Package, func: FuncId, index: usize, expr: ExprId) -> Self {
        Self::new(
            ConsumerKind::CallArg { index: index as u8 },
            Some(pkg.param_site(func, index)),
            expr,
            format!("passed as arg {} to `{}()`", index, pkg.func(func).name),
        )
    }

    pub fn return_at(pkg: &Package, func: FuncId, index: usize, expr: ExprId) -> Self {
        Self::new(
            ConsumerKind::ReturnAt { index: index as u8 },
            Some(pkg.result_site(func, index)),
            expr,
            format!("returned as result {} of `{}()`", index, pkg.func(func).name),
        )
    }

    pub fn field_assign(pkg: &Package, field: FieldId, expr: ExprId) -> Self {
        Self::new(
            ConsumerKind::FieldAssign,
            Some(pkg.field_site(field)),
            expr,
            format!("assigned into field `{}`", pkg.field(field).name),
        )
    }

    pub fn global_assign(pkg: &Package, var: VarId, expr: ExprId) -> Self {
        Self::new(
            ConsumerKind::GlobalAssign,
            Some(pkg.global_site(var)),
            expr,
            format!("assigned into global `{}`", pkg.var(var).name),
        )
    }

    pub fn deep_assign(expr: ExprId) -> Self {
        Self::new(
            ConsumerKind::DeepAssign,
            None,
            expr,
            "written through by index".into(),
        )
    }

    pub fn interface_param(pkg: &Package, func: FuncId, index: usize, expr: ExprId) -> Self {
        Self::new(
            ConsumerKind::InterfaceParam { index: index as u8 },
            Some(pkg.param_site(func, index)),
            expr,
            format!(
                "passed as param {} of interface method `{}`",
                index,
                pkg.func(func).name
            ),
        )
    }
}
