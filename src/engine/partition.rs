//! Clumping partitioner: groups scanned lines into evaluation clumps.
//!
//! Code lines accumulate until a directive seals them. `result:`/`throws:`
//! first seal the buffer as an implicit plain clump, then open a capture
//! clump that only `log:` or `null:` may close. `setup:` and end of input
//! seal plain clumps. Whitespace-only trailing clumps are dropped.

use tracing::warn;

use crate::error::AuthoringError;
use crate::engine::scanner::{DirectiveKind, ScannedLine};

/// Evaluation mode of a clump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run for effect; every line is re-emitted.
    Plain,
    /// The designated expression must succeed.
    Result,
    /// The designated expression must raise.
    Error,
}

/// How a clump line participates in execution and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    /// Executed, never shown (`hide:` payload).
    Hidden,
    /// Shown, never executed (`verbatim:` payload).
    Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClumpLine {
    pub text: String,
    /// 1-based source line (line offset included).
    pub line: usize,
    pub vis: Visibility,
}

/// Contiguous code lines sharing one evaluation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clump {
    pub mode: Mode,
    pub lines: Vec<ClumpLine>,
    /// False when sealed by `null:` — the capture still runs and its
    /// contract is still asserted, but nothing is rendered.
    pub rendered: bool,
    /// Designated-expression override from the sealing directive's payload.
    pub designated: Option<(String, usize)>,
    /// Line of the opening directive, or of the first buffered line.
    pub opened_at: usize,
}

struct OpenCapture {
    mode: Mode,
    opened_at: usize,
}

/// Partition the tagged line stream into clumps.
pub fn partition(stream: Vec<ScannedLine>) -> Result<Vec<Clump>, AuthoringError> {
    let mut clumps: Vec<Clump> = Vec::new();
    let mut buf: Vec<ClumpLine> = Vec::new();
    let mut open: Option<OpenCapture> = None;

    let seal_plain = |buf: &mut Vec<ClumpLine>, clumps: &mut Vec<Clump>| {
        if buf.is_empty() {
            return;
        }
        let opened_at = buf[0].line;
        clumps.push(Clump {
            mode: Mode::Plain,
            lines: std::mem::take(buf),
            rendered: true,
            designated: None,
            opened_at,
        });
    };

    for item in stream {
        match item {
            ScannedLine::Code { text, line } => buf.push(ClumpLine {
                text,
                line,
                vis: Visibility::Shown,
            }),
            ScannedLine::Directive(d) => match d.kind {
                DirectiveKind::Hide => buf.push(ClumpLine {
                    text: d.payload.unwrap_or_default(),
                    line: d.line,
                    vis: Visibility::Hidden,
                }),
                DirectiveKind::Verbatim => buf.push(ClumpLine {
                    text: d.payload.unwrap_or_default(),
                    line: d.line,
                    vis: Visibility::Verbatim,
                }),
                DirectiveKind::Result | DirectiveKind::Throws => {
                    if let Some(o) = &open {
                        return Err(AuthoringError::NestedClump {
                            tag: d.kind.tag().to_string(),
                            line: d.line,
                            opened_at: o.opened_at,
                        });
                    }
                    if d.payload.is_some() {
                        warn!(line = d.line, tag = d.kind.tag(), "ignoring payload on opening directive");
                    }
                    seal_plain(&mut buf, &mut clumps);
                    open = Some(OpenCapture {
                        mode: if d.kind == DirectiveKind::Result {
                            Mode::Result
                        } else {
                            Mode::Error
                        },
                        opened_at: d.line,
                    });
                }
                DirectiveKind::Log | DirectiveKind::Null => {
                    let Some(o) = open.take() else {
                        return Err(AuthoringError::UnmatchedClose {
                            tag: d.kind.tag().to_string(),
                            line: d.line,
                        });
                    };
                    clumps.push(Clump {
                        mode: o.mode,
                        lines: std::mem::take(&mut buf),
                        rendered: d.kind == DirectiveKind::Log,
                        designated: d.payload.map(|p| (p, d.line)),
                        opened_at: o.opened_at,
                    });
                }
                DirectiveKind::Setup => {
                    if let Some(o) = &open {
                        return Err(AuthoringError::BadSeal {
                            tag: d.kind.tag().to_string(),
                            line: d.line,
                            opened_at: o.opened_at,
                        });
                    }
                    if d.payload.is_some() {
                        warn!(line = d.line, "ignoring payload on `setup:`");
                    }
                    seal_plain(&mut buf, &mut clumps);
                }
            },
        }
    }

    if let Some(o) = open {
        return Err(AuthoringError::UnclosedClump {
            opened_at: o.opened_at,
        });
    }
    seal_plain(&mut buf, &mut clumps);

    // Trailing whitespace-only clumps carry nothing worth executing or showing.
    while clumps
        .last()
        .is_some_and(|c| c.lines.iter().all(|l| l.text.trim().is_empty()))
    {
        clumps.pop();
    }

    Ok(clumps)
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scanner::scan;
    use crate::language::comment_style;

    fn clumps_of(src: &str) -> Result<Vec<Clump>, AuthoringError> {
        let lines: Vec<String> = src.lines().map(str::to_string).collect();
        partition(scan(&lines, 1, comment_style("lua").unwrap())?)
    }

    #[test]
    fn directive_free_input_is_one_plain_clump() {
        let clumps = clumps_of("local x = 1\nx = x + 1").unwrap();
        assert_eq!(clumps.len(), 1);
        assert_eq!(clumps[0].mode, Mode::Plain);
        assert_eq!(clumps[0].lines.len(), 2);
    }

    #[test]
    fn result_open_seals_preceding_code_as_plain() {
        let clumps = clumps_of("local x = 1\n--@result:\nx\n--@log:").unwrap();
        assert_eq!(clumps.len(), 2);
        assert_eq!(clumps[0].mode, Mode::Plain);
        assert_eq!(clumps[1].mode, Mode::Result);
        assert!(clumps[1].rendered);
        assert_eq!(clumps[1].opened_at, 2);
    }

    #[test]
    fn null_seals_without_rendering() {
        let clumps = clumps_of("--@throws:\nerror(\"x\")\n--@null:").unwrap();
        assert_eq!(clumps.len(), 1);
        assert_eq!(clumps[0].mode, Mode::Error);
        assert!(!clumps[0].rendered);
    }

    #[test]
    fn log_payload_becomes_designated_override() {
        let clumps = clumps_of("--@result:\nlocal x = 2\n--@log: x * 3").unwrap();
        assert_eq!(clumps[0].designated, Some(("x * 3".to_string(), 3)));
    }

    #[test]
    fn nested_open_cites_the_inner_line() {
        let err = clumps_of("--@result:\n1 + 1\n--@throws:").unwrap_err();
        assert_eq!(
            err,
            AuthoringError::NestedClump {
                tag: "throws".to_string(),
                line: 3,
                opened_at: 1,
            }
        );
    }

    #[test]
    fn close_without_open_is_fatal() {
        let err = clumps_of("local x = 1\n--@log:").unwrap_err();
        assert_eq!(
            err,
            AuthoringError::UnmatchedClose {
                tag: "log".to_string(),
                line: 2,
            }
        );
    }

    #[test]
    fn setup_cannot_seal_a_capture_clump() {
        let err = clumps_of("--@result:\n1\n--@setup:").unwrap_err();
        assert!(matches!(err, AuthoringError::BadSeal { line: 3, opened_at: 1, .. }));
    }

    #[test]
    fn capture_clump_open_at_end_of_input_is_fatal() {
        let err = clumps_of("--@result:\n1 + 1").unwrap_err();
        assert_eq!(err, AuthoringError::UnclosedClump { opened_at: 1 });
    }

    #[test]
    fn hide_payload_joins_as_hidden_line() {
        let clumps = clumps_of("local x = 1\n--@hide: x = x * 10").unwrap();
        assert_eq!(clumps[0].lines[1].vis, Visibility::Hidden);
        assert_eq!(clumps[0].lines[1].text, "x = x * 10");
        assert_eq!(clumps[0].lines[1].line, 2);
    }

    #[test]
    fn bare_hide_joins_as_an_empty_hidden_line() {
        let clumps = clumps_of("local x = 1\n--@hide:\nlocal y = 2").unwrap();
        assert_eq!(clumps[0].lines[1].vis, Visibility::Hidden);
        assert_eq!(clumps[0].lines[1].text, "");
        assert_eq!(clumps[0].lines[1].line, 2);
    }

    #[test]
    fn verbatim_payload_joins_as_verbatim_line() {
        let clumps = clumps_of("--@verbatim: local secret = \"***\"").unwrap();
        assert_eq!(clumps[0].lines[0].vis, Visibility::Verbatim);
    }

    #[test]
    fn setup_seals_a_plain_clump_boundary() {
        let clumps = clumps_of("local x = 1\n--@setup:\nlocal y = 2").unwrap();
        assert_eq!(clumps.len(), 2);
        assert!(clumps.iter().all(|c| c.mode == Mode::Plain));
    }

    #[test]
    fn trailing_blank_clumps_are_dropped() {
        let clumps = clumps_of("local x = 1\n--@setup:\n   \n").unwrap();
        assert_eq!(clumps.len(), 1);
    }
}
