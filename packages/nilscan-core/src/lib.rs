//! nilscan-core - whole-program nil-safety analysis
//!
//! Detects potential nil-pointer dereferences in a statically typed,
//! garbage-collected language whose pointer-like types admit nil. The
//! analysis runs once per package:
//!
//! - `features/preprocess` normalizes each function's CFG (conditional
//!   canonical form, trusted-call splits, boolean helper inlining),
//! - `features/contracts` collects handwritten and inferred contracts,
//! - `features/backprop` walks each CFG in reverse deriving non-nil
//!   obligations and emitting producer/consumer *triggers*,
//! - `features/affiliation` and `features/globals` add interface and
//!   package-variable triggers,
//! - `features/inference` solves the implication graph over annotation
//!   sites, surfacing conflicts and exporting incremental facts,
//! - `features/diagnostics` groups, renders and filters the findings.
//!
//! The parser/type-checker is an external collaborator: `shared/models`
//! defines the typed AST, type table and CFG it must produce. Facts and
//! site identities live in the `nilscan-facts` crate.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_without_default)]
#![allow(clippy::module_inception)]

/// Shared models and utilities
pub mod shared;

/// Feature modules (the analysis stages)
pub mod features;

/// Pipeline orchestration
pub mod pipeline;

/// Configuration system
pub mod config;

pub use config::{AnalyzerConfig, Preset};
pub use pipeline::{run_package, FactStore, MemoryFactStore, PackageResult, Pass};
pub use shared::models::{NilscanError, Package, Result};
