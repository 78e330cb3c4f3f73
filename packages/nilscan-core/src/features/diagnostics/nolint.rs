//! Nolint filtering
//!
//! Suppression ranges are scanned by the frontend and exchanged across
//! packages as facts, so a `//nolint` at a definition site upstream also
//! silences diagnostics positioned there from downstream analyses.

use nilscan_facts::{NolintFact, RangeSet};

use crate::features::diagnostics::render::Diagnostic;
use crate::shared::models::Package;

/// The effective suppression set: this package's ranges plus upstream.
pub fn collect_ranges(pkg: &Package, upstream: &[NolintFact]) -> RangeSet {
    let mut ranges = pkg.nolint_ranges.clone();
    for fact in upstream {
        ranges.merge(&fact.ranges);
    }
    ranges
}

/// Drop diagnostics whose position falls inside a suppression range.
/// Positionless diagnostics are never suppressed.
pub fn filter_diagnostics(diags: Vec<Diagnostic>, ranges: &RangeSet) -> Vec<Diagnostic> {
    diags
        .into_iter()
        .filter(|d| match &d.pos {
            Some(p) => !ranges.suppresses(&p.file, p.line),
            None => true,
        })
        .collect()
}

/// This package's exported nolint fact.
pub fn export_nolint(pkg: &Package) -> NolintFact {
    NolintFact {
        pkg: pkg.path.clone(),
        ranges: pkg.nolint_ranges.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nilscan_facts::{FactPos, NolintRange};

    fn diag(file: &str, line: u32) -> Diagnostic {
        Diagnostic {
            pos: Some(FactPos {
                file: file.into(),
                line,
                col: 1,
            }),
            message: "Potential nil panic detected.".into(),
        }
    }

    #[test]
    fn test_suppression_inside_range() {
        let ranges: RangeSet = [NolintRange::new("main.go", 10, 12)].into_iter().collect();
        let out = filter_diagnostics(vec![diag("main.go", 11), diag("main.go", 13)], &ranges);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pos.as_ref().unwrap().line, 13);
    }

    #[test]
    fn test_upstream_ranges_apply() {
        let pkg = Package::new("example.com/b");
        let mut upstream = NolintFact::new("example.com/a");
        upstream.ranges.insert(NolintRange::line("a/def.go", 7));

        let ranges = collect_ranges(&pkg, &[upstream]);
        let out = filter_diagnostics(vec![diag("a/def.go", 7)], &ranges);
        assert!(out.is_empty());
    }

    #[test]
    fn test_adding_range_is_monotone() {
        let diags = vec![diag("main.go", 1), diag("main.go", 2), diag("main.go", 3)];
        let mut ranges = RangeSet::new();
        let before = filter_diagnostics(diags.clone(), &ranges).len();
        ranges.insert(NolintRange::line("main.go", 2));
        let after = filter_diagnostics(diags, &ranges).len();
        assert!(after <= before);
    }

    #[test]
    fn test_positionless_diagnostics_kept() {
        let ranges: RangeSet = [NolintRange::new("main.go", 1, 100)].into_iter().collect();
        let d = Diagnostic {
            pos: None,
            message: "internal".into(),
        };
        let out = filter_diagnostics(vec![d], &ranges);
        assert_eq!(out.len(), 1);
    }
}
