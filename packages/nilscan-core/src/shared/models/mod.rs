//! Shared data model
//!
//! The boundary between the external frontend (parser/type-checker) and the
//! analyzer: spans, types, objects, AST arenas, CFGs and the unified error
//! type. All analysis features build on these.

pub mod ast;
pub mod cfg;
pub mod error;
pub mod objects;
pub mod package;
pub mod span;
pub mod types;

pub use ast::{
    AstContext, AstRead, AstView, BinOp, Builtin, Callee, CompositeKey, ExprId, ExprKey,
    ExprKind, ExprNode, StmtId, StmtKind, StmtNode, UnOp,
};
pub use cfg::{Block, BlockId, Cfg, CfgNode};
pub use error::{ErrorKind, NilscanError, Result};
pub use objects::{
    CfgId, FieldId, FieldInfo, FuncId, FuncInfo, InterfaceImpl, VarId, VarInfo, VarKind,
};
pub use package::Package;
pub use span::{render_opt, FileId, FileSet, Pos, Span};
pub use types::{BasicKind, TypeId, TypeKind, TypeTable};
