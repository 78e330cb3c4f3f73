//! Preprocessor passes

pub mod canonicalize;
pub mod inline;
pub mod trusted;

pub use canonicalize::canonicalize;
pub use inline::inline_bool_funcs;
pub use trusted::{
    narrow_ok_producing_conds, split_trusted_calls, trusted_action, trusted_nonnil_result,
    ArgSel, TrustedAction, TrustedFunc,
};
