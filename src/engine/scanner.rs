//! Directive scanner: splits raw snippet lines into a tagged stream.
//!
//! A trimmed line beginning with the reserved marker (`--@` for Lua) is a
//! directive; everything else — ordinary comments included — is a code line.
//! Unknown tags and marker lines without a `:` separator are fatal authoring
//! errors naming the offending line.

use crate::error::AuthoringError;
use crate::language::CommentStyle;

/// Directive tags understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Payload is executed but never shown.
    Hide,
    /// Payload is shown but never executed.
    Verbatim,
    /// Seals the open capture clump and renders the captured value.
    Log,
    /// Seals the open capture clump and discards the rendering.
    Null,
    /// Opens a clump whose designated expression must succeed.
    Result,
    /// Opens a clump whose designated expression must raise.
    Throws,
    /// Seals buffered code as a plain clump run for effect only.
    Setup,
}

impl DirectiveKind {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "hide" => Some(Self::Hide),
            "verbatim" => Some(Self::Verbatim),
            "log" => Some(Self::Log),
            "null" => Some(Self::Null),
            "result" => Some(Self::Result),
            "throws" => Some(Self::Throws),
            "setup" => Some(Self::Setup),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Hide => "hide",
            Self::Verbatim => "verbatim",
            Self::Log => "log",
            Self::Null => "null",
            Self::Result => "result",
            Self::Throws => "throws",
            Self::Setup => "setup",
        }
    }
}

/// A parsed directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub payload: Option<String>,
    /// 1-based source line (line offset included).
    pub line: usize,
}

/// One element of the tagged line stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannedLine {
    Code { text: String, line: usize },
    Directive(Directive),
}

/// Scan snippet lines into the tagged stream consumed by the partitioner.
///
/// `first_line` is the absolute 1-based number of `lines[0]`.
pub fn scan(
    lines: &[String],
    first_line: usize,
    style: CommentStyle,
) -> Result<Vec<ScannedLine>, AuthoringError> {
    lines
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let line = first_line + i;
            let Some(rest) = raw.trim_start().strip_prefix(style.marker) else {
                return Ok(ScannedLine::Code {
                    text: raw.clone(),
                    line,
                });
            };
            let Some((tag, payload)) = rest.split_once(':') else {
                return Err(AuthoringError::MalformedDirective { line });
            };
            let tag = tag.trim();
            let kind = DirectiveKind::parse(tag).ok_or_else(|| {
                AuthoringError::UnknownDirective {
                    tag: tag.to_string(),
                    line,
                }
            })?;
            let payload = payload.trim();
            Ok(ScannedLine::Directive(Directive {
                kind,
                payload: (!payload.is_empty()).then(|| payload.to_string()),
                line,
            }))
        })
        .collect()
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::comment_style;

    fn scan_src(src: &str) -> Result<Vec<ScannedLine>, AuthoringError> {
        let lines: Vec<String> = src.lines().map(str::to_string).collect();
        scan(&lines, 1, comment_style("lua").unwrap())
    }

    #[test]
    fn code_and_plain_comments_pass_through() {
        let out = scan_src("local x = 1\n-- just a note\nreturn x").unwrap();
        assert_eq!(out.len(), 3);
        assert!(matches!(&out[1], ScannedLine::Code { text, line: 2 } if text == "-- just a note"));
    }

    #[test]
    fn directives_parse_with_payloads() {
        let out = scan_src("--@result:\n--@log: x + 1").unwrap();
        assert_eq!(
            out[0],
            ScannedLine::Directive(Directive {
                kind: DirectiveKind::Result,
                payload: None,
                line: 1,
            })
        );
        assert_eq!(
            out[1],
            ScannedLine::Directive(Directive {
                kind: DirectiveKind::Log,
                payload: Some("x + 1".to_string()),
                line: 2,
            })
        );
    }

    #[test]
    fn indented_directives_are_recognised() {
        let out = scan_src("  --@setup:").unwrap();
        assert!(matches!(
            &out[0],
            ScannedLine::Directive(Directive { kind: DirectiveKind::Setup, .. })
        ));
    }

    #[test]
    fn unknown_tag_is_fatal_and_names_the_line() {
        let err = scan_src("local x = 1\n--@frobnicate:").unwrap_err();
        assert_eq!(
            err,
            AuthoringError::UnknownDirective {
                tag: "frobnicate".to_string(),
                line: 2,
            }
        );
    }

    #[test]
    fn missing_separator_is_fatal() {
        let err = scan_src("--@result").unwrap_err();
        assert_eq!(err, AuthoringError::MalformedDirective { line: 1 });
    }
}
