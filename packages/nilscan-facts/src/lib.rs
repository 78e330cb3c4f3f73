//! nilscan-facts - Cross-package fact model and codec
//!
//! The analyzer runs once per package and hands its results to downstream
//! packages as *facts*. This crate owns everything that crosses that
//! boundary:
//!
//! - **Site identity** ([`SiteKey`]) and nilability values
//! - **Producer/consumer kinds** as closed sum types
//! - **Inferred map facts** ([`InferredFact`]): determinations plus residual
//!   implication edges, trimmed to the incremental delta
//! - **Nolint facts** ([`NolintFact`]): suppression ranges
//! - A **deterministic codec** (msgpack payload in a length-framed,
//!   digest-checked envelope)
//!
//! The analysis engine in `nilscan-core` builds on these types; nothing in
//! this crate depends on the AST or CFG.

pub mod codec;
pub mod domain;
pub mod error;

pub use codec::{decode_inferred, decode_nolint, encode_inferred, encode_nolint, FactTag};
pub use domain::{
    ConsumerKind, FactPos, FlowStep, ImplicationEdge, InferredFact, Nilability, NolintFact,
    NolintRange, ProducerKind, RangeSet, SiteDetermination, SiteKey,
};
pub use error::{ErrorKind, FactError, Result};
