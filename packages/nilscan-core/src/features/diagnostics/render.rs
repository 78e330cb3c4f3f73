//! Diagnostic rendering
//!
//! Each conflict renders to one diagnostic whose message lists the nil
//! flow, one line per step. Positions honor the full-path toggle; missing
//! positions render as `<no pos info>`.

use serde::{Deserialize, Serialize};

use nilscan_facts::FactPos;

use crate::config::AnalyzerConfig;
use crate::features::diagnostics::conflict::Conflict;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub pos: Option<FactPos>,
    pub message: String,
}

fn render_pos(pos: &Option<FactPos>, full_path: bool) -> String {
    match pos {
        Some(p) => {
            let file = if full_path {
                p.file.as_str()
            } else {
                p.file.rsplit('/').next().unwrap_or(&p.file)
            };
            format!("{}:{}:{}", file, p.line, p.col)
        }
        None => "<no pos info>".to_string(),
    }
}

/// Render one conflict into its user-facing diagnostic. With pretty
/// printing off, the flow collapses onto one line for log-oriented
/// consumers.
pub fn render_conflict(conflict: &Conflict, config: &AnalyzerConfig) -> Diagnostic {
    let (step_sep, step_prefix) = if config.pretty_print {
        ("\n", "\t- ")
    } else {
        ("; ", "")
    };
    let mut message =
        String::from("Potential nil panic detected. Observed nil flow from source to dereference point:");
    for step in &conflict.flow {
        message.push_str(step_sep);
        message.push_str(&format!(
            "{}{}: {} {}",
            step_prefix,
            render_pos(&step.pos, config.print_full_path),
            step.producer_repr,
            step.consumer_repr
        ));
    }
    if !conflict.similar.is_empty() {
        let sites: Vec<String> = conflict
            .similar
            .iter()
            .map(|p| render_pos(p, config.print_full_path))
            .collect();
        message.push_str(step_sep);
        message.push_str(&format!(
            "{}(same nil source also reaches: {})",
            step_prefix,
            sites.join(", ")
        ));
    }
    Diagnostic {
        pos: conflict.pos.clone(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::diagnostics::conflict::ConflictKind;
    use nilscan_facts::FlowStep;

    fn pos(line: u32) -> FactPos {
        FactPos {
            file: "example.com/p/main.go".into(),
            line,
            col: 2,
        }
    }

    fn conflict() -> Conflict {
        Conflict::new(
            ConflictKind::Overconstraint,
            Some(pos(9)),
            vec![
                FlowStep {
                    pos: Some(pos(3)),
                    producer_repr: "literal `nil`".into(),
                    consumer_repr: "returned as result 0 of `foo()`".into(),
                },
                FlowStep {
                    pos: Some(pos(9)),
                    producer_repr: "result 0 of `foo()`".into(),
                    consumer_repr: "dereferenced".into(),
                },
            ],
        )
    }

    #[test]
    fn test_message_shape() {
        let d = render_conflict(&conflict(), &AnalyzerConfig::default());
        let mut lines = d.message.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Potential nil panic detected. Observed nil flow from source to dereference point:"
        );
        assert_eq!(
            lines.next().unwrap(),
            "\t- main.go:3:2: literal `nil` returned as result 0 of `foo()`"
        );
        assert_eq!(
            lines.next().unwrap(),
            "\t- main.go:9:2: result 0 of `foo()` dereferenced"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_compact_rendering() {
        let config = AnalyzerConfig {
            pretty_print: false,
            ..AnalyzerConfig::default()
        };
        let d = render_conflict(&conflict(), &config);
        assert!(!d.message.contains('\n'));
        assert!(d
            .message
            .contains("main.go:3:2: literal `nil` returned as result 0 of `foo()`; "));
    }

    #[test]
    fn test_full_path_toggle() {
        let config = AnalyzerConfig {
            print_full_path: true,
            ..AnalyzerConfig::default()
        };
        let d = render_conflict(&conflict(), &config);
        assert!(d.message.contains("example.com/p/main.go:3:2"));
    }

    #[test]
    fn test_missing_position_renders_placeholder() {
        let mut c = conflict();
        c.flow[0].pos = None;
        let d = render_conflict(&c, &AnalyzerConfig::default());
        assert!(d.message.contains("\t- <no pos info>: literal `nil`"));
    }

    #[test]
    fn test_similar_sites_appended() {
        let mut c = conflict();
        c.similar.push(Some(pos(20)));
        c.similar.push(None);
        let d = render_conflict(&c, &AnalyzerConfig::default());
        assert!(d
            .message
            .contains("(same nil source also reaches: main.go:20:2, <no pos info>)"));
    }
}
