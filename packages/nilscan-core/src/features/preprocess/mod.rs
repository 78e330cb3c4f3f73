//! CFG preprocessor
//!
//! Normalizes one function's CFG before backpropagation:
//!
//! 1. trusted-call splits (assertion helpers become conditionals, fatal
//!    helpers truncate their block),
//! 2. ok-producing call narrowing (`errors.As(err, &t)` in condition
//!    position teaches the true branch `t != nil`),
//! 3. conditional canonical form (`succs[0]` true, no top-level `!`, `&&`,
//!    `||`, nil comparisons as `x == nil`),
//! 4. single-expression boolean helper inlining, then canonical form again
//!    for the appended conjunctions.
//!
//! Range headers and switch comparisons arrive from CFG construction as
//! synthetic `RangeBind` statements and `x == case` conditions; the
//! preprocessor preserves them untouched.
//!
//! The pass is pure: it operates on a copy of the CFG, and rewritten
//! conditions are appended to a synthetic overlay ([`AstView`]) rather than
//! mutating the shared AST.

pub mod domain;
pub mod infrastructure;

pub use domain::CompToken;
pub use infrastructure::{
    canonicalize, inline_bool_funcs, narrow_ok_producing_conds, split_trusted_calls,
    trusted_action, trusted_nonnil_result, ArgSel, TrustedAction,
};

use crate::shared::models::{AstView, Cfg, Package};

/// A preprocessed CFG plus the synthetic nodes its conditions reference.
#[derive(Debug)]
pub struct Preprocessed<'a> {
    pub cfg: Cfg,
    pub view: AstView<'a>,
}

/// Preprocess `cfg`. The input CFG and the package are left untouched.
pub fn preprocess<'a>(pkg: &'a Package, cfg: &Cfg) -> Preprocessed<'a> {
    let mut out = cfg.clone();
    let mut view = AstView::new(&pkg.ast);

    split_trusted_calls(pkg, &mut out, &mut view);
    narrow_ok_producing_conds(pkg, &mut out, &mut view);
    canonicalize(&mut out, &mut view);
    inline_bool_funcs(pkg, &mut out, &mut view);
    canonicalize(&mut out, &mut view);

    Preprocessed { cfg: out, view }
}
