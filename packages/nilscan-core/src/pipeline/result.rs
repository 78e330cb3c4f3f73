//! Stage results and the package result
//!
//! Stage results travel through the coordinator as one closed variant
//! type; a stage retrieves a prerequisite's payload through the typed
//! accessors, so a wiring mistake surfaces as an internal error rather
//! than a panic.

use nilscan_facts::{InferredFact, NolintFact};

use crate::features::assertion::FullTrigger;
use crate::features::contracts::ContractMap;
use crate::features::diagnostics::{Conflict, Diagnostic};
use crate::features::inference::PackageDirectives;
use crate::shared::models::{NilscanError, Result};

/// Payload produced by one stage.
#[derive(Debug)]
pub enum StageResult {
    Directives(PackageDirectives),
    Contracts(ContractMap),
    Triggers(Vec<FullTrigger>),
    Conflicts(Vec<Conflict>),
    Diagnostics(Vec<Diagnostic>),
}

impl StageResult {
    pub fn as_directives(&self) -> Result<&PackageDirectives> {
        match self {
            StageResult::Directives(d) => Ok(d),
            other => Err(mismatch("directives", other)),
        }
    }

    pub fn as_contracts(&self) -> Result<&ContractMap> {
        match self {
            StageResult::Contracts(c) => Ok(c),
            other => Err(mismatch("contracts", other)),
        }
    }

    pub fn as_triggers(&self) -> Result<&[FullTrigger]> {
        match self {
            StageResult::Triggers(t) => Ok(t),
            other => Err(mismatch("triggers", other)),
        }
    }

    pub fn as_conflicts(&self) -> Result<&[Conflict]> {
        match self {
            StageResult::Conflicts(c) => Ok(c),
            other => Err(mismatch("conflicts", other)),
        }
    }
}

fn mismatch(wanted: &str, got: &StageResult) -> NilscanError {
    NilscanError::internal(format!(
        "stage result mismatch: wanted {}, got {:?}",
        wanted,
        std::mem::discriminant(got)
    ))
}

/// Everything one package analysis hands back to the driver.
#[derive(Debug, Default)]
pub struct PackageResult {
    pub diagnostics: Vec<Diagnostic>,
    pub inferred_fact: Option<InferredFact>,
    pub nolint_fact: Option<NolintFact>,
    /// Per-function and per-stage errors that degraded but did not abort
    pub errors: Vec<String>,
}

impl PackageResult {
    pub fn has_findings(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
