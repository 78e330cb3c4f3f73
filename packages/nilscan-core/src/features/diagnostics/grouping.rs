//! Conflict grouping
//!
//! When enabled, conflicts sharing one nil path collapse into a single
//! canonical conflict; the other dereference sites are appended as
//! "similar" positions. The first conflict seen for a path is canonical,
//! preserving source order.

use rustc_hash::FxHashMap;

use crate::features::diagnostics::conflict::Conflict;

pub fn group_conflicts(conflicts: Vec<Conflict>) -> Vec<Conflict> {
    let mut canon: Vec<Conflict> = Vec::new();
    let mut by_key: FxHashMap<String, usize> = FxHashMap::default();

    for c in conflicts {
        let key = c.group_key();
        match by_key.get(&key) {
            Some(&idx) => canon[idx].similar.push(c.pos.clone()),
            None => {
                by_key.insert(key, canon.len());
                canon.push(c);
            }
        }
    }
    canon
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::diagnostics::conflict::ConflictKind;
    use nilscan_facts::{FactPos, FlowStep};

    fn pos(line: u32) -> FactPos {
        FactPos {
            file: "main.go".into(),
            line,
            col: 1,
        }
    }

    fn conflict_at(deref_line: u32, source_line: u32, source: &str) -> Conflict {
        Conflict::new(
            ConflictKind::Overconstraint,
            Some(pos(deref_line)),
            vec![FlowStep {
                pos: Some(pos(source_line)),
                producer_repr: source.into(),
                consumer_repr: "dereferenced".into(),
            }],
        )
    }

    #[test]
    fn test_same_path_merges() {
        let conflicts = vec![
            conflict_at(10, 3, "unassigned variable `p`"),
            conflict_at(20, 3, "unassigned variable `p`"),
            conflict_at(30, 3, "unassigned variable `p`"),
        ];
        let grouped = group_conflicts(conflicts);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].pos, Some(pos(10)));
        assert_eq!(grouped[0].similar, vec![Some(pos(20)), Some(pos(30))]);
    }

    #[test]
    fn test_distinct_paths_stay_separate() {
        let conflicts = vec![
            conflict_at(10, 3, "unassigned variable `p`"),
            conflict_at(20, 4, "unassigned variable `q`"),
        ];
        let grouped = group_conflicts(conflicts);
        assert_eq!(grouped.len(), 2);
        assert!(grouped.iter().all(|c| c.similar.is_empty()));
    }
}
