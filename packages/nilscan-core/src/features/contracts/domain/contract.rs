//! Function contracts
//!
//! A contract relates argument facts to result facts at a call site:
//! `contract(nonnil -> nonnil)` promises a non-nil result whenever the
//! argument is non-nil. Contracts come from doc comments or, for
//! single-in/single-out functions, from inference over the body.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::shared::models::FuncId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractVal {
    Nonnil,
    /// `_`: no requirement / no promise
    Any,
    True,
    False,
}

impl ContractVal {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "nonnil" => Some(ContractVal::Nonnil),
            "_" => Some(ContractVal::Any),
            "true" => Some(ContractVal::True),
            "false" => Some(ContractVal::False),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub ins: Vec<ContractVal>,
    pub outs: Vec<ContractVal>,
}

impl Contract {
    pub fn new(ins: Vec<ContractVal>, outs: Vec<ContractVal>) -> Self {
        Self { ins, outs }
    }

    /// The single-in/single-out `nonnil -> nonnil` shape the inferrer
    /// produces.
    pub fn nonnil_to_nonnil() -> Self {
        Self::new(vec![ContractVal::Nonnil], vec![ContractVal::Nonnil])
    }

    pub fn is_nonnil_to_nonnil(&self) -> bool {
        self.ins == [ContractVal::Nonnil] && self.outs == [ContractVal::Nonnil]
    }
}

/// Contracts per function, handwritten and inferred together.
#[derive(Debug, Clone, Default)]
pub struct ContractMap {
    map: FxHashMap<FuncId, Vec<Contract>>,
}

impl ContractMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, func: FuncId, contract: Contract) {
        self.map.entry(func).or_default().push(contract);
    }

    pub fn get(&self, func: FuncId) -> &[Contract] {
        self.map.get(&func).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_any(&self, func: FuncId) -> bool {
        self.map.contains_key(&func)
    }

    /// Whether call sites of `func` may duplicate triggers under a
    /// `nonnil -> nonnil` contract.
    pub fn has_nonnil_to_nonnil(&self, func: FuncId) -> bool {
        self.get(func).iter().any(Contract::is_nonnil_to_nonnil)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
