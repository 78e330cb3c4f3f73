//! Typed AST
//!
//! Expressions and statements live in flat arenas owned by [`AstContext`];
//! every node carries its resolved type and an optional source position.
//! The frontend resolves identifiers to `VarId`s and callees to `FuncId`s
//! before handing the package over, so there is no name lookup anywhere in
//! the analyzer.
//!
//! The preprocessor never mutates existing nodes; synthetic rewrites are
//! appended to the arena as fresh nodes.

use serde::{Deserialize, Serialize};

use super::objects::{FieldId, FuncId, VarId};
use super::span::Pos;
use super::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExprId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StmtId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    Not,
    Deref,
    AddrOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Eq,
    Neq,
    LAnd,
    LOr,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

/// Call target. Builtins the analyzer interprets are explicit; anything
/// else called through a value goes through `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Callee {
    Func(FuncId),
    Method { func: FuncId, recv: ExprId },
    Builtin(Builtin),
    Value(ExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Len,
    Cap,
    Append,
    New,
    Make,
}

/// Key of a composite literal element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompositeKey {
    Field(FieldId),
    Index(u32),
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Ident(VarId),
    NilLit,
    BoolLit(bool),
    IntLit(i64),
    StrLit(String),
    Unary {
        op: UnOp,
        operand: ExprId,
    },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Paren(ExprId),
    Select {
        base: ExprId,
        field: FieldId,
    },
    Index {
        base: ExprId,
        index: ExprId,
    },
    Call {
        callee: Callee,
        args: Vec<ExprId>,
    },
    Composite {
        ty: TypeId,
        elems: Vec<(CompositeKey, ExprId)>,
    },
    FuncLit(FuncId),
    TypeAssert {
        operand: ExprId,
        ty: TypeId,
    },
    Receive(ExprId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub ty: TypeId,
    pub pos: Option<Pos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// n-ary assignment; `v, ok = m[k]` is a two-LHS assign from a single
    /// `Index` RHS, and comma-ok channel receives / type asserts are
    /// analogous. `define` marks `:=` short declarations.
    Assign {
        lhs: Vec<ExprId>,
        rhs: Vec<ExprId>,
        define: bool,
    },
    /// `var x T` / `var x T = e`; an empty `init` leaves the zero value.
    VarDecl {
        vars: Vec<VarId>,
        ty: TypeId,
        init: Vec<ExprId>,
    },
    Return {
        results: Vec<ExprId>,
    },
    ExprStmt {
        expr: ExprId,
    },
    /// Synthetic binding recorded for a `for k, v := range x` header.
    RangeBind {
        key: Option<ExprId>,
        value: Option<ExprId>,
        operand: ExprId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StmtNode {
    pub kind: StmtKind,
    pub pos: Option<Pos>,
}

/// Canonical key of a *stable* expression: one the analyzer can track
/// across program points. A variable, a field chain off a stable base, or
/// an index off a stable base. Everything else (calls, literals, arithmetic)
/// is consumed where it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExprKey {
    Var(VarId),
    Field(Box<ExprKey>, FieldId),
    /// Index expressions are keyed by their base only; two different index
    /// expressions on one base conservatively share an assertion node.
    Index(Box<ExprKey>),
    Deref(Box<ExprKey>),
}

impl ExprKey {
    /// Root variable of the chain.
    pub fn root(&self) -> VarId {
        match self {
            ExprKey::Var(v) => *v,
            ExprKey::Field(base, _) | ExprKey::Index(base) | ExprKey::Deref(base) => base.root(),
        }
    }
}

/// Expression and statement arenas for one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AstContext {
    exprs: Vec<ExprNode>,
    stmts: Vec<StmtNode>,
}

impl AstContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_expr(&mut self, kind: ExprKind, ty: TypeId, pos: Option<Pos>) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(ExprNode { kind, ty, pos });
        id
    }

    pub fn add_stmt(&mut self, kind: StmtKind, pos: Option<Pos>) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(StmtNode { kind, pos });
        id
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.0 as usize]
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }
}

impl AstRead for AstContext {
    fn expr_node(&self, id: ExprId) -> &ExprNode {
        self.expr(id)
    }

    fn stmt_node(&self, id: StmtId) -> &StmtNode {
        self.stmt(id)
    }
}

/// Read access to expressions and statements, shared by the base arena and
/// the preprocessor's synthetic overlay.
pub trait AstRead {
    fn expr_node(&self, id: ExprId) -> &ExprNode;
    fn stmt_node(&self, id: StmtId) -> &StmtNode;

    fn expr_ty(&self, id: ExprId) -> TypeId {
        self.expr_node(id).ty
    }

    fn expr_pos(&self, id: ExprId) -> Option<Pos> {
        self.expr_node(id).pos
    }

    /// Strip any number of `Paren` wrappers.
    fn strip_parens(&self, mut id: ExprId) -> ExprId {
        while let ExprKind::Paren(inner) = &self.expr_node(id).kind {
            id = *inner;
        }
        id
    }

    fn is_nil_lit(&self, id: ExprId) -> bool {
        matches!(self.expr_node(self.strip_parens(id)).kind, ExprKind::NilLit)
    }

    fn as_bool_lit(&self, id: ExprId) -> Option<bool> {
        match self.expr_node(self.strip_parens(id)).kind {
            ExprKind::BoolLit(b) => Some(b),
            _ => None,
        }
    }

    /// Canonical key if the expression is stable, `None` otherwise.
    fn canon_key(&self, id: ExprId) -> Option<ExprKey> {
        let id = self.strip_parens(id);
        match &self.expr_node(id).kind {
            ExprKind::Ident(v) => Some(ExprKey::Var(*v)),
            ExprKind::Select { base, field } => self
                .canon_key(*base)
                .map(|b| ExprKey::Field(Box::new(b), *field)),
            ExprKind::Index { base, .. } => {
                self.canon_key(*base).map(|b| ExprKey::Index(Box::new(b)))
            }
            ExprKind::Unary {
                op: UnOp::Deref,
                operand,
            } => self
                .canon_key(*operand)
                .map(|b| ExprKey::Deref(Box::new(b))),
            _ => None,
        }
    }
}

/// The base arena plus an overlay of synthetic nodes. The preprocessor
/// rewrites conditions by appending fresh nodes here; the shared base is
/// never touched. Synthetic ids continue the base id space, so `ExprId`s
/// stay unambiguous across both.
#[derive(Debug)]
pub struct AstView<'a> {
    base: &'a AstContext,
    synth: Vec<ExprNode>,
    offset: u32,
}

impl<'a> AstView<'a> {
    pub fn new(base: &'a AstContext) -> Self {
        let offset = base.num_exprs() as u32;
        Self {
            base,
            synth: Vec::new(),
            offset,
        }
    }

    /// Append a synthetic expression. Synthetic nodes carry no position of
    /// their own; diagnostics fall back to the positions of their operands.
    pub fn add_synth(&mut self, kind: ExprKind, ty: TypeId) -> ExprId {
        let id = ExprId(self.offset + self.synth.len() as u32);
        self.synth.push(ExprNode { kind, ty, pos: None });
        id
    }

    pub fn is_synth(&self, id: ExprId) -> bool {
        id.0 >= self.offset
    }

    pub fn num_synth(&self) -> usize {
        self.synth.len()
    }
}

impl AstRead for AstView<'_> {
    fn expr_node(&self, id: ExprId) -> &ExprNode {
        if id.0 < self.offset {
            self.base.expr(id)
        } else {
            &self.synth[(id.0 - self.offset) as usize]
        }
    }

    fn stmt_node(&self, id: StmtId) -> &StmtNode {
        self.base.stmt(id)
    }
}
