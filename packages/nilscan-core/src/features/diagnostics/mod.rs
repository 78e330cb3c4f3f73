//! Diagnostic engine
//!
//! Accumulates conflicts from the inference engine, optionally groups the
//! ones sharing a nil path, renders messages and applies nolint
//! suppression.

pub mod conflict;
pub mod grouping;
pub mod nolint;
pub mod render;

pub use conflict::{Conflict, ConflictKind};
pub use grouping::group_conflicts;
pub use nolint::{collect_ranges, export_nolint, filter_diagnostics};
pub use render::{render_conflict, Diagnostic};

use nilscan_facts::NolintFact;

use crate::config::AnalyzerConfig;
use crate::shared::models::Package;

/// Turn conflicts into the package's final diagnostics.
pub fn emit_diagnostics(
    pkg: &Package,
    config: &AnalyzerConfig,
    conflicts: Vec<Conflict>,
    upstream_nolint: &[NolintFact],
) -> Vec<Diagnostic> {
    let conflicts = if config.group_error_messages {
        group_conflicts(conflicts)
    } else {
        conflicts
    };
    let diags = conflicts
        .iter()
        .map(|c| render_conflict(c, config))
        .collect();
    let ranges = collect_ranges(pkg, upstream_nolint);
    filter_diagnostics(diags, &ranges)
}
