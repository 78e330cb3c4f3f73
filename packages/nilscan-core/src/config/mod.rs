//! Analyzer configuration
//!
//! One validated structure drives the whole pipeline. Most callers take a
//! preset; individual knobs can be overridden before `validate()`.
//!
//! ```rust,ignore
//! use nilscan_core::config::{AnalyzerConfig, Preset};
//!
//! let config = AnalyzerConfig::preset(Preset::Default)
//!     .with_backprop_timeout_ms(2_000)
//!     .validated()?;
//! ```

pub mod error;

pub use error::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    /// Production defaults
    Default,
    /// Experimental checks on, grouping off
    Strict,
    /// Tight resource caps for editor-latency use
    Fast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Only analyze packages whose import path starts with one of these;
    /// empty means all packages
    pub include_pkgs: Vec<String>,
    /// Skip packages whose import path starts with one of these
    pub exclude_pkgs: Vec<String>,
    /// Only analyze files whose name starts with one of these; empty means
    /// all files
    pub include_files: Vec<String>,
    /// Skip files whose name starts with one of these
    pub exclude_files: Vec<String>,

    /// Render positions and reprs in a human-oriented layout
    pub pretty_print: bool,
    /// Merge conflicts that share a nil path into one diagnostic
    pub group_error_messages: bool,
    /// Render full file paths instead of basenames
    pub print_full_path: bool,

    /// Check composite literals for omitted nilable fields
    pub experimental_struct_init: bool,
    /// Analyze function literals
    pub experimental_anon_funcs: bool,

    /// Per-function backprop wall-clock budget, milliseconds
    pub backprop_timeout_ms: u64,
    /// Consecutive rounds with an unchanged trigger set before the
    /// fixed point is declared
    pub stable_round_limit: usize,
    /// Hard cap on backprop rounds per function
    pub max_rounds: usize,
    /// Cap on the nilness-table set per block during contract inference
    pub block_state_cap: usize,
    /// Worker threads for per-function analysis; 0 picks the rayon default
    pub worker_threads: usize,
}

impl AnalyzerConfig {
    pub fn preset(preset: Preset) -> Self {
        let base = Self {
            include_pkgs: Vec::new(),
            exclude_pkgs: Vec::new(),
            include_files: Vec::new(),
            exclude_files: Vec::new(),
            pretty_print: true,
            group_error_messages: false,
            print_full_path: false,
            experimental_struct_init: false,
            experimental_anon_funcs: false,
            backprop_timeout_ms: 10_000,
            stable_round_limit: 5,
            max_rounds: 100,
            block_state_cap: 64,
            worker_threads: 0,
        };
        match preset {
            Preset::Default => base,
            Preset::Strict => Self {
                experimental_struct_init: true,
                experimental_anon_funcs: true,
                ..base
            },
            Preset::Fast => Self {
                group_error_messages: true,
                backprop_timeout_ms: 1_000,
                max_rounds: 25,
                block_state_cap: 16,
                ..base
            },
        }
    }

    // Builder-style overrides

    pub fn with_include_pkgs(mut self, prefixes: Vec<String>) -> Self {
        self.include_pkgs = prefixes;
        self
    }

    pub fn with_exclude_pkgs(mut self, prefixes: Vec<String>) -> Self {
        self.exclude_pkgs = prefixes;
        self
    }

    pub fn with_backprop_timeout_ms(mut self, ms: u64) -> Self {
        self.backprop_timeout_ms = ms;
        self
    }

    pub fn with_stable_round_limit(mut self, limit: usize) -> Self {
        self.stable_round_limit = limit;
        self
    }

    pub fn with_grouping(mut self, enabled: bool) -> Self {
        self.group_error_messages = enabled;
        self
    }

    pub fn with_struct_init(mut self, enabled: bool) -> Self {
        self.experimental_struct_init = enabled;
        self
    }

    pub fn with_anon_funcs(mut self, enabled: bool) -> Self {
        self.experimental_anon_funcs = enabled;
        self
    }

    pub fn backprop_timeout(&self) -> Duration {
        Duration::from_millis(self.backprop_timeout_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.stable_round_limit == 0 {
            return Err(ConfigError::StableRoundLimit(0));
        }
        if self.stable_round_limit > self.max_rounds {
            return Err(ConfigError::RoundLimitOrder {
                limit: self.stable_round_limit,
                max: self.max_rounds,
            });
        }
        if self.backprop_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.block_state_cap < 2 {
            return Err(ConfigError::BlockStateCap(self.block_state_cap));
        }
        for p in &self.include_pkgs {
            if self.exclude_pkgs.contains(p) {
                return Err(ConfigError::ConflictingPrefix(p.clone()));
            }
        }
        Ok(())
    }

    pub fn validated(self) -> ConfigResult<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Whether a package import path is in scope.
    pub fn pkg_in_scope(&self, path: &str) -> bool {
        if self.exclude_pkgs.iter().any(|p| path.starts_with(p)) {
            return false;
        }
        self.include_pkgs.is_empty() || self.include_pkgs.iter().any(|p| path.starts_with(p))
    }

    /// Whether a file name is in scope.
    pub fn file_in_scope(&self, name: &str) -> bool {
        if self.exclude_files.iter().any(|p| name.starts_with(p)) {
            return false;
        }
        self.include_files.is_empty() || self.include_files.iter().any(|p| name.starts_with(p))
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::preset(Preset::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for preset in [Preset::Default, Preset::Strict, Preset::Fast] {
            assert!(AnalyzerConfig::preset(preset).validate().is_ok());
        }
    }

    #[test]
    fn test_zero_stable_rounds_rejected() {
        let config = AnalyzerConfig::default().with_stable_round_limit(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StableRoundLimit(0))
        ));
    }

    #[test]
    fn test_round_limit_order_enforced() {
        let mut config = AnalyzerConfig::default();
        config.stable_round_limit = 200;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RoundLimitOrder { .. })
        ));
    }

    #[test]
    fn test_pkg_scope_prefixes() {
        let config = AnalyzerConfig::default()
            .with_include_pkgs(vec!["example.com/app".into()])
            .with_exclude_pkgs(vec!["example.com/app/vendor".into()]);

        assert!(config.pkg_in_scope("example.com/app/server"));
        assert!(!config.pkg_in_scope("example.com/app/vendor/dep"));
        assert!(!config.pkg_in_scope("other.org/lib"));
    }

    #[test]
    fn test_conflicting_prefix_rejected() {
        let config = AnalyzerConfig::default()
            .with_include_pkgs(vec!["a".into()])
            .with_exclude_pkgs(vec!["a".into()]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConflictingPrefix(_))
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = AnalyzerConfig::preset(Preset::Strict);
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalyzerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
