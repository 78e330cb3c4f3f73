//! Wire-level fact model shared across packages
//!
//! Everything in this module is part of the cross-package contract: site
//! identities, determinations, residual implication edges and nolint ranges.
//! All types are plain serde values with a total order, so that encoding the
//! same fact twice yields byte-identical output.

pub mod fact;
pub mod kinds;
pub mod nolint;
pub mod site;

pub use fact::{FactPos, FlowStep, ImplicationEdge, InferredFact, SiteDetermination};
pub use kinds::{ConsumerKind, ProducerKind};
pub use nolint::{NolintFact, NolintRange, RangeSet};
pub use site::{Nilability, SiteKey};
