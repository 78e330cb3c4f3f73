//! Handwritten contract parsing
//!
//! A function doc comment may carry any number of
//! `contract(in1,in2,... -> out1,out2,...)` lines with values drawn from
//! `{nonnil, _, true, false}`. Arity must match the signature; malformed or
//! mismatched contracts are skipped with a debug log rather than failing
//! the analysis.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::features::contracts::domain::{Contract, ContractVal};
use crate::shared::models::{FuncId, Package};

static CONTRACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"contract\(\s*([^)>]*?)\s*->\s*([^)]*?)\s*\)").expect("static regex"));

fn parse_vals(s: &str) -> Option<Vec<ContractVal>> {
    if s.trim().is_empty() {
        return Some(Vec::new());
    }
    s.split(',').map(ContractVal::parse).collect()
}

/// Contracts declared on `func`'s doc comment.
pub fn parse_contracts(pkg: &Package, func: FuncId) -> Vec<Contract> {
    let info = pkg.func(func);
    let mut out = Vec::new();
    for line in &info.doc {
        for caps in CONTRACT_RE.captures_iter(line) {
            let (Some(ins), Some(outs)) = (parse_vals(&caps[1]), parse_vals(&caps[2])) else {
                debug!(func = %info.name, line = %line, "skipping malformed contract");
                continue;
            };
            let n_ins = info.num_params() + usize::from(info.receiver.is_some());
            if ins.len() != n_ins || outs.len() != info.num_results() {
                debug!(func = %info.name, line = %line, "skipping arity-mismatched contract");
                continue;
            }
            out.push(Contract::new(ins, outs));
        }
    }
    out
}
