//! Contract domain types

pub mod contract;

pub use contract::{Contract, ContractMap, ContractVal};
