//! Output reconciliation: events plus original text become annotated lines.
//!
//! Code events re-split into physical lines and classify by the language's
//! comment prefix. Captures render through one recursive function per
//! [`Observed`] variant, every rendered line prefixed with the comment
//! marker, `Promise<…>` wrapping asynchronous outcomes. Rendering is
//! best-effort and never aborts an evaluation.

use itertools::Itertools;

use crate::engine::events::{CaptureEvent, ErrorRepr, EventKind, Observed, Repr};
use crate::language::CommentStyle;
use crate::snippet::{AnnotatedLine, LineClass};

/// Convert the ordered event list into the final annotated sequence.
pub fn reconcile(events: &[CaptureEvent], style: CommentStyle) -> Vec<AnnotatedLine> {
    let mut out: Vec<AnnotatedLine> = Vec::new();
    for event in events {
        match &event.kind {
            EventKind::Code(text) => {
                for (i, physical) in text.split('\n').enumerate() {
                    let class = if physical.trim_start().starts_with(style.prefix) {
                        LineClass::Comment
                    } else {
                        LineClass::Code
                    };
                    out.push(AnnotatedLine {
                        text: physical.to_string(),
                        class,
                        line: event.line + i,
                    });
                }
            }
            EventKind::Capture { observed, rendered } => {
                if !rendered {
                    continue;
                }
                let class = if observed.is_error() {
                    LineClass::Error
                } else {
                    LineClass::Result
                };
                for physical in render_observed(observed).split('\n') {
                    out.push(AnnotatedLine {
                        text: format!("{} {}", style.prefix, physical),
                        class,
                        line: event.line,
                    });
                }
            }
            EventKind::Violation => out.push(AnnotatedLine {
                text: format!("{} expected an error, but none was raised", style.prefix),
                class: LineClass::Error,
                line: event.line,
            }),
        }
    }

    // Blank trimming applies to the final sequence only; interior blanks stay.
    let first = out.iter().position(|l| !l.text.trim().is_empty());
    let last = out.iter().rposition(|l| !l.text.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => out.drain(..).skip(first).take(last - first + 1).collect(),
        _ => Vec::new(),
    }
}

/// Render one capture outcome; recursion handles the `Promise` wrapping.
pub fn render_observed(observed: &Observed) -> String {
    match observed {
        Observed::Result(repr) => render_repr(repr),
        Observed::Error(repr) => render_error(repr),
        Observed::Promise(inner) => format!("Promise<{}>", render_observed(inner)),
    }
}

/// Deterministic structural rendering of a captured value.
pub fn render_repr(repr: &Repr) -> String {
    match repr {
        Repr::Nil => "nil".to_string(),
        Repr::Bool(b) => b.to_string(),
        Repr::Int(i) => i.to_string(),
        Repr::Num(n) => render_number(*n),
        Repr::Str(s) => quote(s),
        Repr::Seq(items) => format!("[{}]", items.iter().map(render_repr).join(", ")),
        Repr::Map(entries) => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(k, v)| format!("{k}: {}", render_repr(v)))
                .join(", ")
        ),
        Repr::Function => "function".to_string(),
        Repr::Coroutine => "coroutine".to_string(),
        Repr::Opaque(name) => format!("<{name}>"),
        Repr::Elided => "...".to_string(),
    }
}

/// `Error("message"[, {key: value, ...}])`.
pub fn render_error(repr: &ErrorRepr) -> String {
    if repr.fields.is_empty() {
        format!("Error({})", quote(&repr.message))
    } else {
        format!(
            "Error({}, {{{}}})",
            quote(&repr.message),
            repr.fields
                .iter()
                .map(|(k, v)| format!("{k}: {}", render_repr(v)))
                .join(", ")
        )
    }
}

fn render_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::comment_style;

    fn style() -> CommentStyle {
        comment_style("lua").unwrap()
    }

    #[test]
    fn scalars_render_like_an_inspector() {
        assert_eq!(render_repr(&Repr::Int(4)), "4");
        assert_eq!(render_repr(&Repr::Num(2.5)), "2.5");
        assert_eq!(render_repr(&Repr::Num(2.0)), "2.0");
        assert_eq!(render_repr(&Repr::Str("ok".into())), "\"ok\"");
        assert_eq!(render_repr(&Repr::Nil), "nil");
    }

    #[test]
    fn containers_render_with_stable_shapes() {
        assert_eq!(
            render_repr(&Repr::Seq(vec![Repr::Int(1), Repr::Int(2)])),
            "[1, 2]"
        );
        assert_eq!(
            render_repr(&Repr::Map(vec![
                ("a".into(), Repr::Int(1)),
                ("b".into(), Repr::Str("x".into())),
            ])),
            "{a: 1, b: \"x\"}"
        );
    }

    #[test]
    fn promises_wrap_their_inner_outcome() {
        let observed = Observed::Promise(Box::new(Observed::Result(Repr::Str("ok".into()))));
        assert_eq!(render_observed(&observed), "Promise<\"ok\">");
        assert!(!observed.sync());
    }

    #[test]
    fn errors_render_message_and_fields() {
        assert_eq!(
            render_error(&ErrorRepr {
                message: "boom".into(),
                fields: vec![],
            }),
            "Error(\"boom\")"
        );
        assert_eq!(
            render_error(&ErrorRepr {
                message: "denied".into(),
                fields: vec![("code".into(), Repr::Int(403))],
            }),
            "Error(\"denied\", {code: 403})"
        );
    }

    #[test]
    fn code_events_split_and_classify() {
        let events = vec![CaptureEvent {
            line: 3,
            kind: EventKind::Code("local x = 1\n-- a note".to_string()),
        }];
        let lines = reconcile(&events, style());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].class, LineClass::Code);
        assert_eq!(lines[0].line, 3);
        assert_eq!(lines[1].class, LineClass::Comment);
        assert_eq!(lines[1].line, 4);
    }

    #[test]
    fn captures_render_as_prefixed_comments() {
        let events = vec![CaptureEvent {
            line: 2,
            kind: EventKind::Capture {
                observed: Observed::Result(Repr::Int(4)),
                rendered: true,
            },
        }];
        let lines = reconcile(&events, style());
        assert_eq!(lines[0].text, "-- 4");
        assert_eq!(lines[0].class, LineClass::Result);
    }

    #[test]
    fn unrendered_captures_are_silent() {
        let events = vec![
            CaptureEvent {
                line: 1,
                kind: EventKind::Code("local x = 1".to_string()),
            },
            CaptureEvent {
                line: 2,
                kind: EventKind::Capture {
                    observed: Observed::Result(Repr::Int(4)),
                    rendered: false,
                },
            },
        ];
        assert_eq!(reconcile(&events, style()).len(), 1);
    }

    #[test]
    fn violations_always_render() {
        let events = vec![CaptureEvent {
            line: 5,
            kind: EventKind::Violation,
        }];
        let lines = reconcile(&events, style());
        assert_eq!(lines[0].class, LineClass::Error);
        assert!(lines[0].text.contains("expected an error"));
    }

    #[test]
    fn edge_blanks_trim_but_interior_blanks_stay() {
        let events = vec![
            CaptureEvent {
                line: 1,
                kind: EventKind::Code("".to_string()),
            },
            CaptureEvent {
                line: 2,
                kind: EventKind::Code("local a = 1\n\nlocal b = 2".to_string()),
            },
            CaptureEvent {
                line: 5,
                kind: EventKind::Code("   ".to_string()),
            },
        ];
        let lines = reconcile(&events, style());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].text, "");
    }
}
