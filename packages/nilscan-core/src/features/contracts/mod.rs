//! Function contracts
//!
//! Handwritten `contract(...)` doc comments win outright; functions without
//! one and with a single nil-admitting parameter and result go through the
//! nilness inferrer. The collected map is shared read-only with the
//! backprop workers, which duplicate call-site triggers for contracted
//! callees.

pub mod domain;
pub mod infrastructure;

pub use domain::{Contract, ContractMap, ContractVal};
pub use infrastructure::{infer_contract, parse_contracts};

use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::shared::models::Package;

/// Collect contracts for every function in the package.
pub fn collect_contracts(pkg: &Package, config: &AnalyzerConfig) -> ContractMap {
    let mut map = ContractMap::new();
    for func in pkg.func_ids() {
        let handwritten = parse_contracts(pkg, func);
        if !handwritten.is_empty() {
            for c in handwritten {
                map.insert(func, c);
            }
            continue;
        }
        if let Some(c) = infer_contract(pkg, func, config) {
            debug!(func = %pkg.func(func).name, "inferred nonnil contract");
            map.insert(func, c);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testkit::{stmt_node, TestPkg};

    #[test]
    fn test_handwritten_contract_wins_over_inference() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let p = t.param_var("p", ptr);
        let f = t.func("weird", &[p], &[ptr]);
        // the body alone would NOT justify nonnil -> nonnil
        let nil_val = t.nil(ptr);
        let ret = t.ret(&[nil_val]);
        let cfg = t.linear_cfg(vec![stmt_node(ret)]);
        t.attach_cfg(f, cfg);
        t.set_doc(f, &["contract(nonnil -> nonnil)"]);

        let map = collect_contracts(&t.pkg, &AnalyzerConfig::default());
        assert!(map.has_nonnil_to_nonnil(f));
    }

    #[test]
    fn test_inference_fills_gaps() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let p = t.param_var("p", ptr);
        let f = t.func("id", &[p], &[ptr]);
        let p_read = t.ident(p);
        let ret = t.ret(&[p_read]);
        let cfg = t.linear_cfg(vec![stmt_node(ret)]);
        t.attach_cfg(f, cfg);

        let map = collect_contracts(&t.pkg, &AnalyzerConfig::default());
        assert!(map.has_nonnil_to_nonnil(f));
    }
}
