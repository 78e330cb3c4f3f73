//! Analysis pass context
//!
//! One `Pass` per analyzed package: the package model, the validated
//! configuration and a handle to the fact store for upstream imports and
//! the final export. The AST and CFGs inside are shared read-only across
//! every sub-analyzer.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use nilscan_facts::{InferredFact, NolintFact};

use crate::config::AnalyzerConfig;
use crate::shared::models::{Package, Result};

/// Fact exchange keyed by (package path, fact type).
pub trait FactStore: Send + Sync {
    fn load_inferred(&self, pkg: &str) -> Result<Option<InferredFact>>;
    fn load_nolint(&self, pkg: &str) -> Result<Option<NolintFact>>;
    fn store_inferred(&self, fact: &InferredFact) -> Result<()>;
    fn store_nolint(&self, fact: &NolintFact) -> Result<()>;
}

/// In-memory store for tests and single-process drivers. Facts are kept in
/// their encoded form, so round-trip determinism is exercised on every
/// exchange.
#[derive(Default)]
pub struct MemoryFactStore {
    inferred: Mutex<FxHashMap<String, Vec<u8>>>,
    nolint: Mutex<FxHashMap<String, Vec<u8>>>,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FactStore for MemoryFactStore {
    fn load_inferred(&self, pkg: &str) -> Result<Option<InferredFact>> {
        match self.inferred.lock().get(pkg) {
            Some(bytes) => Ok(Some(nilscan_facts::decode_inferred(bytes)?)),
            None => Ok(None),
        }
    }

    fn load_nolint(&self, pkg: &str) -> Result<Option<NolintFact>> {
        match self.nolint.lock().get(pkg) {
            Some(bytes) => Ok(Some(nilscan_facts::decode_nolint(bytes)?)),
            None => Ok(None),
        }
    }

    fn store_inferred(&self, fact: &InferredFact) -> Result<()> {
        let bytes = nilscan_facts::encode_inferred(fact)?;
        self.inferred.lock().insert(fact.pkg.clone(), bytes);
        Ok(())
    }

    fn store_nolint(&self, fact: &NolintFact) -> Result<()> {
        let bytes = nilscan_facts::encode_nolint(fact)?;
        self.nolint.lock().insert(fact.pkg.clone(), bytes);
        Ok(())
    }
}

/// Context for one package analysis.
pub struct Pass<'a> {
    pub pkg: &'a Package,
    pub config: &'a AnalyzerConfig,
    /// Import paths of this package's direct and transitive dependencies,
    /// in a stable order
    pub deps: Vec<String>,
    pub facts: &'a dyn FactStore,
}

impl<'a> Pass<'a> {
    pub fn new(
        pkg: &'a Package,
        config: &'a AnalyzerConfig,
        deps: Vec<String>,
        facts: &'a dyn FactStore,
    ) -> Self {
        Self {
            pkg,
            config,
            deps,
            facts,
        }
    }

    /// Upstream inferred maps, in dependency order.
    pub fn upstream_inferred(&self) -> Result<Vec<InferredFact>> {
        let mut out = Vec::new();
        for dep in &self.deps {
            if let Some(fact) = self.facts.load_inferred(dep)? {
                out.push(fact);
            }
        }
        Ok(out)
    }

    /// Upstream nolint ranges, in dependency order.
    pub fn upstream_nolint(&self) -> Result<Vec<NolintFact>> {
        let mut out = Vec::new();
        for dep in &self.deps {
            if let Some(fact) = self.facts.load_nolint(dep)? {
                out.push(fact);
            }
        }
        Ok(out)
    }
}
