//! Comparison tokens
//!
//! A tiny algebra over comparison operators used when a branch condition is
//! read backwards (learning the fact on the false branch) or with operands
//! swapped (normalizing `nil == x`).
//!
//! Laws: `converse(converse(t)) == t`, `inverse(inverse(t)) == t`,
//! `converse(Eq) == Eq`, `inverse(Eq) == Ne`.

use crate::shared::models::BinOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompToken {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompToken {
    pub fn from_binop(op: BinOp) -> Option<Self> {
        match op {
            BinOp::Eq => Some(CompToken::Eq),
            BinOp::Neq => Some(CompToken::Ne),
            BinOp::Lt => Some(CompToken::Lt),
            BinOp::Le => Some(CompToken::Le),
            BinOp::Gt => Some(CompToken::Gt),
            BinOp::Ge => Some(CompToken::Ge),
            _ => None,
        }
    }

    pub fn to_binop(self) -> BinOp {
        match self {
            CompToken::Eq => BinOp::Eq,
            CompToken::Ne => BinOp::Neq,
            CompToken::Lt => BinOp::Lt,
            CompToken::Le => BinOp::Le,
            CompToken::Gt => BinOp::Gt,
            CompToken::Ge => BinOp::Ge,
        }
    }

    /// Token observed when the operands are swapped: `a < b` iff `b > a`.
    pub fn converse(self) -> Self {
        match self {
            CompToken::Eq => CompToken::Eq,
            CompToken::Ne => CompToken::Ne,
            CompToken::Lt => CompToken::Gt,
            CompToken::Le => CompToken::Ge,
            CompToken::Gt => CompToken::Lt,
            CompToken::Ge => CompToken::Le,
        }
    }

    /// Token of the negated comparison: `!(a < b)` iff `a >= b`.
    pub fn inverse(self) -> Self {
        match self {
            CompToken::Eq => CompToken::Ne,
            CompToken::Ne => CompToken::Eq,
            CompToken::Lt => CompToken::Ge,
            CompToken::Le => CompToken::Gt,
            CompToken::Gt => CompToken::Le,
            CompToken::Ge => CompToken::Lt,
        }
    }

    pub const ALL: [CompToken; 6] = [
        CompToken::Eq,
        CompToken::Ne,
        CompToken::Lt,
        CompToken::Le,
        CompToken::Gt,
        CompToken::Ge,
    ];
}
