//! Contract collection passes

pub mod infer;
pub mod parse;

pub use infer::infer_contract;
pub use parse::parse_contracts;
