//! Declared objects: functions, variables, struct fields
//!
//! The frontend resolves every identifier to one of these before the
//! analyzer runs; within the analyzer an object is always referenced by its
//! arena index, never by name.

use serde::{Deserialize, Serialize};

use super::span::{FileId, Span};
use super::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FuncId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CfgId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    Local,
    Param,
    Receiver,
    Global,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarInfo {
    pub name: String,
    pub ty: TypeId,
    pub kind: VarKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    /// Struct type that declares the field
    pub owner: TypeId,
    /// Declared name of the owning struct, for site identity
    pub owner_name: String,
    pub ty: TypeId,
}

/// A function or method declaration, or a synthesized entry for a function
/// literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncInfo {
    /// Declared name; method names are `Type.Method`, function literals get
    /// `outer$k` synthesized names.
    pub name: String,
    /// Declaring package when it is not the analyzed one. Site identities
    /// always name the declaring package.
    pub pkg: Option<String>,
    pub receiver: Option<VarId>,
    pub params: Vec<VarId>,
    pub results: Vec<TypeId>,
    pub variadic: bool,
    /// Doc comment lines, without comment markers
    pub doc: Vec<String>,
    /// Body CFG; `None` for declarations without bodies (interface methods,
    /// externally linked functions)
    pub cfg: Option<CfgId>,
    pub is_interface_method: bool,
    /// Enclosing declared function for literals
    pub parent: Option<FuncId>,
    pub file: FileId,
    pub span: Span,
}

impl FuncInfo {
    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn num_results(&self) -> usize {
        self.results.len()
    }

    pub fn is_anonymous(&self) -> bool {
        self.parent.is_some()
    }
}

/// One interface-implementation affiliation: the concrete type `impl_type`
/// satisfies `iface`, pairing each interface method with the implementing
/// method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceImpl {
    pub iface: TypeId,
    pub impl_type: TypeId,
    /// (interface method, implementing method) pairs
    pub methods: Vec<(FuncId, FuncId)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_func_info_shape() {
        let f = FuncInfo {
            name: "Load".into(),
            pkg: None,
            receiver: None,
            params: vec![VarId(0)],
            results: vec![TypeId(1)],
            variadic: false,
            doc: vec![],
            cfg: Some(CfgId(0)),
            is_interface_method: false,
            parent: None,
            file: FileId(0),
            span: Span::zero(),
        };
        assert_eq!(f.num_params(), 1);
        assert_eq!(f.num_results(), 1);
        assert!(!f.is_anonymous());
    }
}
