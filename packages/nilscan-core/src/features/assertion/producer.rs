//! Producers: where a possibly-nil value comes from
//!
//! A producer pairs a kind with a site reference. The reference is either a
//! literal answer (the producer is unconditionally nil or non-nil) or an
//! annotation site whose determination the inference engine consults later.
//! The human-readable repr is fixed at construction, while names are still
//! at hand.

use nilscan_facts::{Nilability, ProducerKind, SiteKey};
use serde::{Deserialize, Serialize};

use crate::shared::models::{ExprId, FieldId, FuncId, Package, Pos, VarId};

/// Either a known answer or a site to consult.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteRef {
    Literal(Nilability),
    Site(SiteKey),
}

impl SiteRef {
    pub fn site(&self) -> Option<&SiteKey> {
        match self {
            SiteRef::Site(key) => Some(key),
            SiteRef::Literal(_) => None,
        }
    }

    pub fn literal(&self) -> Option<Nilability> {
        match self {
            SiteRef::Literal(v) => Some(*v),
            SiteRef::Site(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub kind: ProducerKind,
    pub site: SiteRef,
    /// Expression the value flows out of, for diagnostic positioning.
    /// Synthetic producers (zero values of declarations) have none.
    pub expr: Option<ExprId>,
    /// Explicit position for producers without a carrier expression
    /// (declaration zero values, parameters at function entry).
    pub pos: Option<Pos>,
    pub repr: String,
}

impl Producer {
    pub fn new(kind: ProducerKind, site: SiteRef, expr: Option<ExprId>, repr: String) -> Self {
        Self {
            kind,
            site,
            expr,
            pos: None,
            repr,
        }
    }

    pub fn at(mut self, pos: Option<Pos>) -> Self {
        self.pos = pos;
        self
    }

    pub fn needs_guard(&self) -> bool {
        self.kind.needs_guard()
    }

    /// Nilability when the guard was not matched: guard-needing producers
    /// degrade to unconditionally nilable.
    pub fn unguarded_answer(&self) -> Option<Nilability> {
        if self.needs_guard() {
            Some(Nilability::Nilable)
        } else {
            self.site.literal()
        }
    }

    // ── constructors ───────────────────────────────────────────────────

    pub fn literal_nil(expr: ExprId) -> Self {
        Self::new(
            ProducerKind::LiteralNil,
            SiteRef::Literal(Nilability::Nilable),
            Some(expr),
            "literal `nil`".into(),
        )
    }

    pub fn literal_nonnil(expr: ExprId, what: &str) -> Self {
        Self::new(
            ProducerKind::LiteralNonnil,
            SiteRef::Literal(Nilability::Nonnil),
            Some(expr),
            what.to_string(),
        )
    }

    pub fn unassigned_local(pkg: &Package, var: VarId, expr: Option<ExprId>) -> Self {
        Self::new(
            ProducerKind::UnassignedLocal,
            SiteRef::Literal(Nilability::Nilable),
            expr,
            format!("unassigned variable `{}`", pkg.var(var).name),
        )
    }

    pub fn func_return(pkg: &Package, func: FuncId, index: usize, expr: ExprId) -> Self {
        Self::new(
            ProducerKind::FuncReturn { index: index as u8 },
            SiteRef::Site(pkg.result_site(func, index)),
            Some(expr),
            format!("result {} of `{}()`", index, pkg.func(func).name),
        )
    }

    pub fn interface_return(pkg: &Package, func: FuncId, index: usize, expr: Option<ExprId>) -> Self {
        Self::new(
            ProducerKind::InterfaceReturn { index: index as u8 },
            SiteRef::Site(pkg.result_site(func, index)),
            expr,
            format!(
                "result {} of interface method `{}`",
                index,
                pkg.func(func).name
            ),
        )
    }

    pub fn contracted_return(pkg: &Package, func: FuncId, index: usize, expr: ExprId) -> Self {
        Self::new(
            ProducerKind::ContractedReturn { index: index as u8 },
            SiteRef::Literal(Nilability::Nonnil),
            Some(expr),
            format!(
                "result {} of `{}()` under its nonnil contract",
                index,
                pkg.func(func).name
            ),
        )
    }

    pub fn field_read(pkg: &Package, field: FieldId, expr: ExprId) -> Self {
        Self::new(
            ProducerKind::FieldRead,
            SiteRef::Site(pkg.field_site(field)),
            Some(expr),
            format!("read of field `{}`", pkg.field(field).name),
        )
    }

    /// Field read resolved at function entry, with no carrier expression.
    pub fn field_read_unpositioned(pkg: &Package, field: FieldId) -> Self {
        Self::new(
            ProducerKind::FieldRead,
            SiteRef::Site(pkg.field_site(field)),
            None,
            format!("read of field `{}`", pkg.field(field).name),
        )
    }

    pub fn global_read(pkg: &Package, var: VarId, expr: ExprId) -> Self {
        Self::new(
            ProducerKind::GlobalRead,
            SiteRef::Site(pkg.global_site(var)),
            Some(expr),
            format!("read of global `{}`", pkg.var(var).name),
        )
    }

    pub fn global_read_unpositioned(pkg: &Package, var: VarId) -> Self {
        Self::new(
            ProducerKind::GlobalRead,
            SiteRef::Site(pkg.global_site(var)),
            None,
            format!("read of global `{}`", pkg.var(var).name),
        )
    }

    pub fn param_in(pkg: &Package, func: FuncId, index: usize, expr: Option<ExprId>) -> Self {
        let name = pkg
            .func(func)
            .params
            .get(index)
            .map(|v| pkg.var(*v).name.clone())
            .unwrap_or_else(|| index.to_string());
        Self::new(
            ProducerKind::ParamIn { index: index as u8 },
            SiteRef::Site(pkg.param_site(func, index)),
            expr,
            format!("parameter `{}`", name),
        )
    }

    pub fn receiver_in(pkg: &Package, func: FuncId, expr: Option<ExprId>) -> Self {
        Self::new(
            ProducerKind::ReceiverIn,
            SiteRef::Site(pkg.receiver_site(func)),
            expr,
            format!("receiver of `{}`", pkg.func(func).name),
        )
    }

    pub fn trusted_result(expr: ExprId) -> Self {
        Self::new(
            ProducerKind::TrustedResult,
            SiteRef::Literal(Nilability::Nonnil),
            Some(expr),
            "value checked by a trusted helper".into(),
        )
    }

    pub fn deep_read(expr: ExprId) -> Self {
        Self::new(
            ProducerKind::DeepRead,
            SiteRef::Literal(Nilability::Nonnil),
            Some(expr),
            "element read".into(),
        )
    }

    pub fn deep_read_unpositioned() -> Self {
        Self::new(
            ProducerKind::DeepRead,
            SiteRef::Literal(Nilability::Nonnil),
            None,
            "element read".into(),
        )
    }

    pub fn map_index(expr: ExprId) -> Self {
        Self::new(
            ProducerKind::MapIndex,
            SiteRef::Literal(Nilability::Nilable),
            Some(expr),
            "map index without ok check".into(),
        )
    }

    pub fn map_index_unpositioned() -> Self {
        Self::new(
            ProducerKind::MapIndex,
            SiteRef::Literal(Nilability::Nilable),
            None,
            "map index without ok check".into(),
        )
    }

    pub fn ok_read(expr: ExprId) -> Self {
        Self::new(
            ProducerKind::OkRead,
            SiteRef::Literal(Nilability::Nonnil),
            Some(expr),
            "comma-ok guarded read".into(),
        )
    }
}
