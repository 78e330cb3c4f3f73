//! Interface affiliation analysis
//!
//! When a concrete type satisfies an interface, nilability flows both ways
//! across the method set: results are covariant (a nilable implementation
//! result forces the interface result nilable) and parameters are
//! contravariant (a nilable interface parameter forces the implementation
//! parameter nilable). Each affiliation pair contributes one trigger per
//! nil-admitting result and parameter.

use crate::features::assertion::{Consumer, FullTrigger, Producer, SiteRef};
use crate::shared::models::{FuncId, Package};
use nilscan_facts::ConsumerKind;

/// Triggers for every recorded interface-implementation pair.
pub fn analyze_affiliations(pkg: &Package) -> Vec<FullTrigger> {
    let mut out = Vec::new();
    for imp in &pkg.impls {
        for &(iface_m, impl_m) in &imp.methods {
            emit_method_pair(pkg, iface_m, impl_m, &mut out);
        }
    }
    out
}

fn emit_method_pair(pkg: &Package, iface_m: FuncId, impl_m: FuncId, out: &mut Vec<FullTrigger>) {
    let iface_info = pkg.func(iface_m);
    let impl_info = pkg.func(impl_m);

    // covariant results: impl result nilable => interface result nilable
    let n_results = iface_info.num_results().min(impl_info.num_results());
    for k in 0..n_results {
        if !pkg.types.admits_nil(iface_info.results[k]) {
            continue;
        }
        let producer = Producer::new(
            nilscan_facts::ProducerKind::FuncReturn { index: k as u8 },
            SiteRef::Site(pkg.result_site(impl_m, k)),
            None,
            format!("result {} of `{}`", k, impl_info.name),
        );
        let consumer = Consumer::unpositioned(
            ConsumerKind::ReturnAt { index: k as u8 },
            Some(pkg.result_site(iface_m, k)),
            format!("returned as result {} of interface method `{}`", k, iface_info.name),
        );
        out.push(FullTrigger::new(producer, consumer));
    }

    // contravariant params: interface param nilable => impl param nilable
    let n_params = iface_info.num_params().min(impl_info.num_params());
    for k in 0..n_params {
        let iface_param_ty = pkg.var(iface_info.params[k]).ty;
        if !pkg.types.admits_nil(iface_param_ty) {
            continue;
        }
        let producer = Producer::new(
            nilscan_facts::ProducerKind::ParamIn { index: k as u8 },
            SiteRef::Site(pkg.param_site(iface_m, k)),
            None,
            format!("param {} of interface method `{}`", k, iface_info.name),
        );
        let consumer = Consumer::unpositioned(
            ConsumerKind::InterfaceParam { index: k as u8 },
            Some(pkg.param_site(impl_m, k)),
            format!("received as param {} of `{}`", k, impl_info.name),
        );
        out.push(FullTrigger::new(producer, consumer));
    }
}
