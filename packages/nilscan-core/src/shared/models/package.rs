//! Package model
//!
//! Everything the frontend hands over for one package: files, types,
//! objects, AST arenas, per-function CFGs and interface affiliations. The
//! analyzer treats all of it as read-only; preprocessing copies what it
//! needs to rewrite.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use nilscan_facts::{RangeSet, SiteKey};

use super::ast::{AstContext, ExprId};
use super::cfg::Cfg;
use super::objects::{CfgId, FieldId, FieldInfo, FuncId, FuncInfo, InterfaceImpl, VarId, VarInfo};
use super::span::{FileId, FileSet};
use super::types::TypeTable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Import path, e.g. `example.com/pkg`
    pub path: String,
    pub files: FileSet,
    /// Package-documentation comment lines per file (mode directives and
    /// per-file feature opt-ins live here)
    pub file_docs: FxHashMap<FileId, Vec<String>>,
    pub types: TypeTable,
    pub ast: AstContext,
    pub funcs: Vec<FuncInfo>,
    pub vars: Vec<VarInfo>,
    pub fields: Vec<FieldInfo>,
    /// Package-level variables
    pub globals: Vec<VarId>,
    /// Initializer expression per global, when one is declared
    pub global_inits: FxHashMap<VarId, ExprId>,
    pub cfgs: Vec<Cfg>,
    pub impls: Vec<InterfaceImpl>,
    /// Suppression ranges scanned from `//nolint` comments by the frontend
    pub nolint_ranges: RangeSet,
}

impl Package {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn func(&self, id: FuncId) -> &FuncInfo {
        &self.funcs[id.0 as usize]
    }

    pub fn var(&self, id: VarId) -> &VarInfo {
        &self.vars[id.0 as usize]
    }

    pub fn field(&self, id: FieldId) -> &FieldInfo {
        &self.fields[id.0 as usize]
    }

    pub fn cfg(&self, id: CfgId) -> &Cfg {
        &self.cfgs[id.0 as usize]
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.funcs.len() as u32).map(FuncId)
    }

    /// Param index of `var` within `func`, if it is one of its parameters.
    pub fn param_index(&self, func: FuncId, var: VarId) -> Option<usize> {
        self.func(func).params.iter().position(|p| *p == var)
    }

    pub fn is_receiver(&self, func: FuncId, var: VarId) -> bool {
        self.func(func).receiver == Some(var)
    }

    // Site identity helpers. Sites are always named from the declaring
    // package, so cross-package references agree on identity.

    /// Package path declaring `func`.
    pub fn func_pkg(&self, func: FuncId) -> &str {
        self.func(func).pkg.as_deref().unwrap_or(&self.path)
    }

    pub fn param_site(&self, func: FuncId, index: usize) -> SiteKey {
        SiteKey::Param {
            pkg: self.func_pkg(func).to_string(),
            func: self.func(func).name.clone(),
            index: index as u8,
        }
    }

    pub fn receiver_site(&self, func: FuncId) -> SiteKey {
        SiteKey::Receiver {
            pkg: self.func_pkg(func).to_string(),
            func: self.func(func).name.clone(),
        }
    }

    pub fn result_site(&self, func: FuncId, index: usize) -> SiteKey {
        SiteKey::Result {
            pkg: self.func_pkg(func).to_string(),
            func: self.func(func).name.clone(),
            index: index as u8,
        }
    }

    pub fn field_site(&self, field: FieldId) -> SiteKey {
        let info = self.field(field);
        SiteKey::Field {
            pkg: self.path.clone(),
            owner: info.owner_name.clone(),
            name: info.name.clone(),
        }
    }

    pub fn global_site(&self, var: VarId) -> SiteKey {
        SiteKey::Global {
            pkg: self.path.clone(),
            name: self.var(var).name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{BasicKind, TypeKind, VarKind};

    #[test]
    fn test_site_helpers_use_package_path() {
        let mut pkg = Package::new("example.com/p");
        let int = pkg.types.add(TypeKind::Basic(BasicKind::Int));
        pkg.vars.push(VarInfo {
            name: "g".into(),
            ty: int,
            kind: VarKind::Global,
        });
        let g = VarId(0);
        pkg.globals.push(g);

        let site = pkg.global_site(g);
        assert_eq!(site.pkg(), "example.com/p");
        assert_eq!(site.to_string(), "example.com/p.g");
    }
}
