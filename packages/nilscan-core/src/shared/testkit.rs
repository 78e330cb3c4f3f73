//! Package fixture builder
//!
//! Tests and benches construct analyzable packages programmatically; this
//! builder keeps those constructions short. Every expression gets a fresh
//! source line so positions stay distinct, which the trigger-coalescing and
//! grouping tests rely on.

use rustc_hash::FxHashMap;

use crate::shared::models::{
    AstContext, AstRead, BasicKind, BinOp, Builtin, Callee, Cfg, CfgId, CfgNode, CompositeKey,
    ExprId, ExprKind, FieldId, FieldInfo, FileId, FuncId, FuncInfo, Package, Pos, Span, StmtId,
    StmtKind, TypeId, TypeKind, UnOp, VarId, VarInfo, VarKind,
};

pub struct TestPkg {
    pub pkg: Package,
    pub main_file: FileId,
    line: u32,
    basic: FxHashMap<BasicKind, TypeId>,
}

impl TestPkg {
    pub fn new(path: &str) -> Self {
        let mut pkg = Package::new(path);
        let main_file = pkg.files.add(format!("{}/main.go", path));
        Self {
            pkg,
            main_file,
            line: 0,
            basic: FxHashMap::default(),
        }
    }

    pub fn ast(&self) -> &AstContext {
        &self.pkg.ast
    }

    fn next_pos(&mut self) -> Pos {
        self.line += 1;
        Pos::new(self.main_file, self.line, 1)
    }

    // ── types ──────────────────────────────────────────────────────────

    pub fn ty_basic(&mut self, kind: BasicKind) -> TypeId {
        if let Some(id) = self.basic.get(&kind) {
            return *id;
        }
        let id = self.pkg.types.add(TypeKind::Basic(kind));
        self.basic.insert(kind, id);
        id
    }

    pub fn ty_bool(&mut self) -> TypeId {
        self.ty_basic(BasicKind::Bool)
    }

    pub fn ty_int(&mut self) -> TypeId {
        self.ty_basic(BasicKind::Int)
    }

    pub fn ty_string(&mut self) -> TypeId {
        self.ty_basic(BasicKind::String)
    }

    pub fn ty_ptr(&mut self, to: TypeId) -> TypeId {
        self.pkg.types.add(TypeKind::Pointer(to))
    }

    pub fn ty_ptr_int(&mut self) -> TypeId {
        let int = self.ty_int();
        self.ty_ptr(int)
    }

    pub fn ty_map(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.pkg.types.add(TypeKind::Map(key, value))
    }

    pub fn ty_slice(&mut self, elem: TypeId) -> TypeId {
        self.pkg.types.add(TypeKind::Slice(elem))
    }

    pub fn ty_chan(&mut self, elem: TypeId) -> TypeId {
        self.pkg.types.add(TypeKind::Chan(elem))
    }

    pub fn ty_interface(&mut self, name: &str) -> TypeId {
        self.pkg.types.add(TypeKind::Interface { name: name.into() })
    }

    /// Declare a struct type and its fields in one shot.
    pub fn ty_struct(&mut self, name: &str, fields: &[(&str, TypeId)]) -> (TypeId, Vec<FieldId>) {
        let struct_id = TypeId(self.pkg.types.len() as u32);
        let mut field_ids = Vec::with_capacity(fields.len());
        for (fname, fty) in fields {
            let id = FieldId(self.pkg.fields.len() as u32);
            self.pkg.fields.push(FieldInfo {
                name: (*fname).into(),
                owner: struct_id,
                owner_name: name.into(),
                ty: *fty,
            });
            field_ids.push(id);
        }
        let added = self.pkg.types.add(TypeKind::Struct {
            name: name.into(),
            fields: field_ids.clone(),
        });
        debug_assert_eq!(added, struct_id);
        (struct_id, field_ids)
    }

    // ── objects ────────────────────────────────────────────────────────

    fn add_var(&mut self, name: &str, ty: TypeId, kind: VarKind) -> VarId {
        let id = VarId(self.pkg.vars.len() as u32);
        self.pkg.vars.push(VarInfo {
            name: name.into(),
            ty,
            kind,
        });
        id
    }

    pub fn local(&mut self, name: &str, ty: TypeId) -> VarId {
        self.add_var(name, ty, VarKind::Local)
    }

    pub fn param_var(&mut self, name: &str, ty: TypeId) -> VarId {
        self.add_var(name, ty, VarKind::Param)
    }

    pub fn receiver_var(&mut self, name: &str, ty: TypeId) -> VarId {
        self.add_var(name, ty, VarKind::Receiver)
    }

    pub fn global(&mut self, name: &str, ty: TypeId) -> VarId {
        let id = self.add_var(name, ty, VarKind::Global);
        self.pkg.globals.push(id);
        id
    }

    pub fn global_with_init(&mut self, name: &str, ty: TypeId, init: ExprId) -> VarId {
        let id = self.global(name, ty);
        self.pkg.global_inits.insert(id, init);
        id
    }

    /// Declare a function; attach its CFG later with [`TestPkg::attach_cfg`].
    pub fn func(&mut self, name: &str, params: &[VarId], results: &[TypeId]) -> FuncId {
        let id = FuncId(self.pkg.funcs.len() as u32);
        let span = Span::new(self.line + 1, 1, self.line + 1, 1);
        self.pkg.funcs.push(FuncInfo {
            name: name.into(),
            pkg: None,
            receiver: None,
            params: params.to_vec(),
            results: results.to_vec(),
            variadic: false,
            doc: Vec::new(),
            cfg: None,
            is_interface_method: false,
            parent: None,
            file: self.main_file,
            span,
        });
        id
    }

    /// Declare a function belonging to another (upstream) package.
    pub fn extern_func(
        &mut self,
        pkg_path: &str,
        name: &str,
        params: &[VarId],
        results: &[TypeId],
    ) -> FuncId {
        let id = self.func(name, params, results);
        self.pkg.funcs[id.0 as usize].pkg = Some(pkg_path.into());
        id
    }

    pub fn method(
        &mut self,
        name: &str,
        recv: VarId,
        params: &[VarId],
        results: &[TypeId],
    ) -> FuncId {
        let id = self.func(name, params, results);
        self.pkg.funcs[id.0 as usize].receiver = Some(recv);
        id
    }

    pub fn interface_method(&mut self, name: &str, params: &[VarId], results: &[TypeId]) -> FuncId {
        let id = self.func(name, params, results);
        self.pkg.funcs[id.0 as usize].is_interface_method = true;
        id
    }

    pub fn set_doc(&mut self, func: FuncId, doc: &[&str]) {
        self.pkg.funcs[func.0 as usize].doc = doc.iter().map(|s| s.to_string()).collect();
    }

    pub fn attach_cfg(&mut self, func: FuncId, cfg: Cfg) -> CfgId {
        let id = CfgId(self.pkg.cfgs.len() as u32);
        self.pkg.cfgs.push(cfg);
        self.pkg.funcs[func.0 as usize].cfg = Some(id);
        id
    }

    /// Suppress diagnostics on one line of the main file.
    pub fn add_nolint_line(&mut self, line: u32) {
        let file = self.pkg.files.name(self.main_file).to_string();
        self.pkg
            .nolint_ranges
            .insert(nilscan_facts::NolintRange::line(file, line));
    }

    pub fn set_file_doc(&mut self, lines: &[&str]) {
        self.pkg
            .file_docs
            .insert(self.main_file, lines.iter().map(|s| s.to_string()).collect());
    }

    // ── expressions ────────────────────────────────────────────────────

    fn expr(&mut self, kind: ExprKind, ty: TypeId) -> ExprId {
        let pos = self.next_pos();
        self.pkg.ast.add_expr(kind, ty, Some(pos))
    }

    pub fn ident(&mut self, v: VarId) -> ExprId {
        let ty = self.pkg.var(v).ty;
        self.expr(ExprKind::Ident(v), ty)
    }

    pub fn nil(&mut self, ty: TypeId) -> ExprId {
        self.expr(ExprKind::NilLit, ty)
    }

    pub fn bool_lit(&mut self, v: bool) -> ExprId {
        let ty = self.ty_bool();
        self.expr(ExprKind::BoolLit(v), ty)
    }

    pub fn int_lit(&mut self, v: i64) -> ExprId {
        let ty = self.ty_int();
        self.expr(ExprKind::IntLit(v), ty)
    }

    pub fn deref(&mut self, e: ExprId) -> ExprId {
        let base_ty = self.pkg.ast.expr_ty(e);
        let ty = self.pkg.types.pointee(base_ty).unwrap_or(base_ty);
        self.expr(
            ExprKind::Unary {
                op: UnOp::Deref,
                operand: e,
            },
            ty,
        )
    }

    pub fn not(&mut self, e: ExprId) -> ExprId {
        let ty = self.ty_bool();
        self.expr(
            ExprKind::Unary {
                op: UnOp::Not,
                operand: e,
            },
            ty,
        )
    }

    pub fn addr_of(&mut self, e: ExprId) -> ExprId {
        let ty = self.pkg.ast.expr_ty(e);
        let ptr = self.ty_ptr(ty);
        self.expr(
            ExprKind::Unary {
                op: UnOp::AddrOf,
                operand: e,
            },
            ptr,
        )
    }

    pub fn binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        let ty = if op.is_comparison() || matches!(op, BinOp::LAnd | BinOp::LOr) {
            self.ty_bool()
        } else {
            self.pkg.ast.expr_ty(lhs)
        };
        self.expr(ExprKind::Binary { op, lhs, rhs }, ty)
    }

    /// `e == nil`
    pub fn eq_nil(&mut self, e: ExprId) -> ExprId {
        let ty = self.pkg.ast.expr_ty(e);
        let nil = self.nil(ty);
        self.binary(BinOp::Eq, e, nil)
    }

    /// `e != nil`
    pub fn ne_nil(&mut self, e: ExprId) -> ExprId {
        let ty = self.pkg.ast.expr_ty(e);
        let nil = self.nil(ty);
        self.binary(BinOp::Neq, e, nil)
    }

    pub fn paren(&mut self, e: ExprId) -> ExprId {
        let ty = self.pkg.ast.expr_ty(e);
        self.expr(ExprKind::Paren(e), ty)
    }

    pub fn select(&mut self, base: ExprId, field: FieldId) -> ExprId {
        let ty = self.pkg.field(field).ty;
        self.expr(ExprKind::Select { base, field }, ty)
    }

    pub fn index(&mut self, base: ExprId, index: ExprId) -> ExprId {
        let base_ty = self.pkg.ast.expr_ty(base);
        let ty = self.pkg.types.elem(base_ty).unwrap_or(base_ty);
        self.expr(ExprKind::Index { base, index }, ty)
    }

    pub fn call(&mut self, func: FuncId, args: &[ExprId]) -> ExprId {
        let ty = match self.pkg.func(func).results.first().copied() {
            Some(t) => t,
            // statement-position call to a void function
            None => self.ty_bool(),
        };
        self.expr(
            ExprKind::Call {
                callee: Callee::Func(func),
                args: args.to_vec(),
            },
            ty,
        )
    }

    pub fn method_call(&mut self, func: FuncId, recv: ExprId, args: &[ExprId]) -> ExprId {
        let ty = match self.pkg.func(func).results.first().copied() {
            Some(t) => t,
            None => self.ty_bool(),
        };
        self.expr(
            ExprKind::Call {
                callee: Callee::Method { func, recv },
                args: args.to_vec(),
            },
            ty,
        )
    }

    pub fn builtin_call(&mut self, builtin: Builtin, args: &[ExprId], ty: TypeId) -> ExprId {
        self.expr(
            ExprKind::Call {
                callee: Callee::Builtin(builtin),
                args: args.to_vec(),
            },
            ty,
        )
    }

    /// `len(e)`
    pub fn len_of(&mut self, e: ExprId) -> ExprId {
        let int = self.ty_int();
        self.builtin_call(Builtin::Len, &[e], int)
    }

    /// `new(T)`, producing `*T`
    pub fn new_of(&mut self, ty: TypeId) -> ExprId {
        let ptr = self.ty_ptr(ty);
        self.builtin_call(Builtin::New, &[], ptr)
    }

    pub fn composite(&mut self, ty: TypeId, elems: &[(CompositeKey, ExprId)]) -> ExprId {
        self.expr(
            ExprKind::Composite {
                ty,
                elems: elems.to_vec(),
            },
            ty,
        )
    }

    pub fn recv_expr(&mut self, chan: ExprId) -> ExprId {
        let chan_ty = self.pkg.ast.expr_ty(chan);
        let ty = self.pkg.types.elem(chan_ty).unwrap_or(chan_ty);
        self.expr(ExprKind::Receive(chan), ty)
    }

    // ── statements ─────────────────────────────────────────────────────

    fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let pos = self.next_pos();
        self.pkg.ast.add_stmt(kind, Some(pos))
    }

    pub fn assign(&mut self, lhs: &[ExprId], rhs: &[ExprId]) -> StmtId {
        self.stmt(StmtKind::Assign {
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
            define: false,
        })
    }

    pub fn define(&mut self, lhs: &[ExprId], rhs: &[ExprId]) -> StmtId {
        self.stmt(StmtKind::Assign {
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
            define: true,
        })
    }

    pub fn var_decl(&mut self, vars: &[VarId], ty: TypeId, init: &[ExprId]) -> StmtId {
        self.stmt(StmtKind::VarDecl {
            vars: vars.to_vec(),
            ty,
            init: init.to_vec(),
        })
    }

    pub fn ret(&mut self, results: &[ExprId]) -> StmtId {
        self.stmt(StmtKind::Return {
            results: results.to_vec(),
        })
    }

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        self.stmt(StmtKind::ExprStmt { expr })
    }

    pub fn range_bind(
        &mut self,
        key: Option<ExprId>,
        value: Option<ExprId>,
        operand: ExprId,
    ) -> StmtId {
        self.stmt(StmtKind::RangeBind {
            key,
            value,
            operand,
        })
    }

    // ── CFG helpers ────────────────────────────────────────────────────

    /// A single-block CFG running `nodes` then returning.
    pub fn linear_cfg(&mut self, nodes: Vec<CfgNode>) -> Cfg {
        let mut cfg = Cfg::new();
        let entry = cfg.entry;
        cfg.block_mut(entry).nodes = nodes;
        cfg.block_mut(entry).is_return = true;
        cfg
    }

    /// An if/else diamond: entry runs `before` and branches on `cond`;
    /// the true branch runs `then_nodes`, the false branch `else_nodes`,
    /// both joining into a block running `after` and returning.
    #[allow(clippy::too_many_arguments)]
    pub fn diamond_cfg(
        &mut self,
        before: Vec<CfgNode>,
        cond: ExprId,
        then_nodes: Vec<CfgNode>,
        else_nodes: Vec<CfgNode>,
        after: Vec<CfgNode>,
    ) -> Cfg {
        let mut cfg = Cfg::new();
        let entry = cfg.entry;
        let then_b = cfg.add_block();
        let else_b = cfg.add_block();
        let join = cfg.add_block();

        cfg.block_mut(entry).nodes = before;
        cfg.block_mut(entry).nodes.push(CfgNode::Expr(cond));
        cfg.add_edge(entry, then_b);
        cfg.add_edge(entry, else_b);

        cfg.block_mut(then_b).nodes = then_nodes;
        cfg.add_edge(then_b, join);
        cfg.block_mut(else_b).nodes = else_nodes;
        cfg.add_edge(else_b, join);

        cfg.block_mut(join).nodes = after;
        cfg.block_mut(join).is_return = true;
        cfg
    }
}

pub fn stmt_node(s: StmtId) -> CfgNode {
    CfgNode::Stmt(s)
}

pub fn expr_node(e: ExprId) -> CfgNode {
    CfgNode::Expr(e)
}
