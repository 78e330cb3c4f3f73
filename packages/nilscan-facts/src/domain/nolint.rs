//! Nolint suppression ranges
//!
//! Suppression comments are collected per package and exported as a fact so
//! that a range annotated in an upstream package still suppresses a
//! diagnostic whose position resolves there from a downstream package.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An inclusive line range within one file where diagnostics are suppressed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NolintRange {
    pub file: String,
    pub line_from: u32,
    pub line_to: u32,
}

impl NolintRange {
    pub fn new(file: impl Into<String>, line_from: u32, line_to: u32) -> Self {
        Self {
            file: file.into(),
            line_from,
            line_to,
        }
    }

    /// Single-line range.
    pub fn line(file: impl Into<String>, line: u32) -> Self {
        Self::new(file, line, line)
    }

    pub fn contains(&self, file: &str, line: u32) -> bool {
        self.file == file && self.line_from <= line && line <= self.line_to
    }
}

/// An ordered set of suppression ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSet {
    ranges: BTreeSet<NolintRange>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, range: NolintRange) -> bool {
        self.ranges.insert(range)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NolintRange> {
        self.ranges.iter()
    }

    /// True when some range covers (file, line).
    pub fn suppresses(&self, file: &str, line: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(file, line))
    }

    /// Ranges present in `self` but not in `other`.
    pub fn diff(&self, other: &RangeSet) -> RangeSet {
        RangeSet {
            ranges: self.ranges.difference(&other.ranges).cloned().collect(),
        }
    }

    /// Union in place.
    pub fn merge(&mut self, other: &RangeSet) {
        for r in &other.ranges {
            self.ranges.insert(r.clone());
        }
    }
}

impl FromIterator<NolintRange> for RangeSet {
    fn from_iter<I: IntoIterator<Item = NolintRange>>(iter: I) -> Self {
        RangeSet {
            ranges: iter.into_iter().collect(),
        }
    }
}

/// Per-package nolint fact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NolintFact {
    pub pkg: String,
    pub ranges: RangeSet,
}

impl NolintFact {
    pub fn new(pkg: impl Into<String>) -> Self {
        Self {
            pkg: pkg.into(),
            ranges: RangeSet::new(),
        }
    }
}
