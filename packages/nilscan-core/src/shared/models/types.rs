//! Type model
//!
//! A flat table of type records indexed by `TypeId`. The analyzer only needs
//! to answer a handful of questions about a type: does it admit nil, what
//! does it point at / contain, and which fields does a struct carry.

use serde::{Deserialize, Serialize};

use super::objects::FieldId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicKind {
    Bool,
    Int,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeKind {
    Basic(BasicKind),
    Pointer(TypeId),
    Map(TypeId, TypeId),
    Slice(TypeId),
    Array(TypeId),
    Chan(TypeId),
    Func {
        params: Vec<TypeId>,
        results: Vec<TypeId>,
        variadic: bool,
    },
    Interface {
        name: String,
    },
    Struct {
        name: String,
        fields: Vec<FieldId>,
    },
    Named {
        name: String,
        underlying: TypeId,
    },
}

/// Flat arena of types for one package (plus imported types it mentions).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        id
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0 as usize]
    }

    /// Resolve through `Named` wrappers to the underlying kind.
    pub fn underlying(&self, id: TypeId) -> &TypeKind {
        match self.kind(id) {
            TypeKind::Named { underlying, .. } => self.underlying(*underlying),
            other => other,
        }
    }

    /// True for types whose zero value is nil: pointers, maps, slices,
    /// channels, functions and interfaces.
    pub fn admits_nil(&self, id: TypeId) -> bool {
        matches!(
            self.underlying(id),
            TypeKind::Pointer(_)
                | TypeKind::Map(_, _)
                | TypeKind::Slice(_)
                | TypeKind::Chan(_)
                | TypeKind::Func { .. }
                | TypeKind::Interface { .. }
        )
    }

    /// Element type read out of a map/slice/array/channel, if any.
    pub fn elem(&self, id: TypeId) -> Option<TypeId> {
        match self.underlying(id) {
            TypeKind::Map(_, v) => Some(*v),
            TypeKind::Slice(e) | TypeKind::Array(e) | TypeKind::Chan(e) => Some(*e),
            _ => None,
        }
    }

    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.underlying(id) {
            TypeKind::Pointer(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_map(&self, id: TypeId) -> bool {
        matches!(self.underlying(id), TypeKind::Map(_, _))
    }

    pub fn is_chan(&self, id: TypeId) -> bool {
        matches!(self.underlying(id), TypeKind::Chan(_))
    }

    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.underlying(id), TypeKind::Struct { .. })
    }

    pub fn struct_fields(&self, id: TypeId) -> Option<&[FieldId]> {
        match self.underlying(id) {
            TypeKind::Struct { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Declared name of a struct/interface/named type, if it has one.
    pub fn name(&self, id: TypeId) -> Option<&str> {
        match self.kind(id) {
            TypeKind::Named { name, .. }
            | TypeKind::Struct { name, .. }
            | TypeKind::Interface { name } => Some(name),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
