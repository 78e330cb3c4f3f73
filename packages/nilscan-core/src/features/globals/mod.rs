//! Global variable initialization analysis
//!
//! Package-level variables are annotation sites. Every declared initializer
//! produces a trigger pairing the initializer's producer with an
//! assignment-to-global consumer; a global left to its zero value claims an
//! unconditional nil when its type admits one.

use crate::features::assertion::{Consumer, FullTrigger, Producer};
use crate::features::backprop::classify_expr_producer;
use crate::shared::models::Package;
use nilscan_facts::ConsumerKind;

/// Triggers for all package-level variable initializations.
pub fn analyze_globals(pkg: &Package) -> Vec<FullTrigger> {
    let mut out = collect_global_triggers(pkg);
    crate::features::assertion::trigger::bake_positions(&mut out, &pkg.ast);
    out
}

fn collect_global_triggers(pkg: &Package) -> Vec<FullTrigger> {
    let mut out = Vec::new();
    for &g in &pkg.globals {
        if !pkg.types.admits_nil(pkg.var(g).ty) {
            continue;
        }
        match pkg.global_inits.get(&g) {
            Some(&init) => {
                let producer = classify_expr_producer(pkg, &pkg.ast, init)
                    .unwrap_or_else(|| Producer::literal_nonnil(init, "identifier"));
                let consumer = Consumer::global_assign(pkg, g, init);
                out.push(make(producer, consumer));
            }
            None => {
                let producer = Producer::new(
                    nilscan_facts::ProducerKind::LiteralNil,
                    crate::features::assertion::SiteRef::Literal(nilscan_facts::Nilability::Nilable),
                    None,
                    format!("global `{}` left zero-valued", pkg.var(g).name),
                );
                let consumer = Consumer::unpositioned(
                    ConsumerKind::GlobalAssign,
                    Some(pkg.global_site(g)),
                    format!("assigned into global `{}`", pkg.var(g).name),
                );
                out.push(make(producer, consumer));
            }
        }
    }
    out
}

fn make(producer: Producer, consumer: Consumer) -> FullTrigger {
    let safe = producer.site.literal() == Some(nilscan_facts::Nilability::Nonnil)
        && !producer.needs_guard();
    let t = FullTrigger::new(producer, consumer);
    if safe {
        t.safe()
    } else {
        t
    }
}
