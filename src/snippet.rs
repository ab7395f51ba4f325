//! Snippet construction, evaluation caching, and the output contract.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::warn;

use crate::config::EvalConfig;
use crate::engine;
use crate::error::Result;
use crate::language;

/// Classification of one output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineClass {
    Code,
    Comment,
    Result,
    Error,
    Unknown,
}

/// Final output unit consumed by page rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedLine {
    pub text: String,
    pub class: LineClass,
    /// 1-based source line (line offset included).
    pub line: usize,
}

/// One executable code sample embedded in documentation source.
///
/// Construction normalises the text once: leading/trailing blank lines are
/// stripped and common indentation removed. Evaluation is idempotent — the
/// annotated output is cached after the first successful run and re-invoking
/// [`Snippet::annotate`] is a no-op returning the cached sequence.
#[derive(Debug)]
pub struct Snippet {
    lines: Vec<String>,
    language: String,
    filename: Option<String>,
    /// Absolute 1-based number of `lines[0]` (line offset included).
    first_line: usize,
    cache: RwLock<Option<Arc<[AnnotatedLine]>>>,
    /// Serializes evaluation so one snippet can never run twice concurrently.
    gate: tokio::sync::Mutex<()>,
}

impl Snippet {
    pub fn new(
        source: &str,
        language: impl Into<String>,
        filename: Option<String>,
        line_offset: usize,
    ) -> Self {
        let raw: Vec<&str> = source.lines().collect();
        let start = raw
            .iter()
            .position(|l| !l.trim().is_empty())
            .unwrap_or(raw.len());
        let end = raw
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map_or(start, |i| i + 1);
        let window = &raw[start..end];

        let indent = window
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
            .min()
            .unwrap_or(0);
        let lines = window
            .iter()
            .map(|l| {
                if l.trim().is_empty() {
                    String::new()
                } else {
                    l.chars().skip(indent).collect()
                }
            })
            .collect();

        Self {
            lines,
            language: language.into(),
            filename,
            first_line: line_offset + start + 1,
            cache: RwLock::new(None),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Absolute 1-based number of the first retained line.
    pub fn first_line(&self) -> usize {
        self.first_line
    }

    /// The cached annotated output, if the snippet has been evaluated.
    pub fn annotated(&self) -> Option<Arc<[AnnotatedLine]>> {
        self.cache.read().expect("annotation cache poisoned").clone()
    }

    /// Evaluate the snippet and return its annotated output.
    ///
    /// Unrecognized languages are emitted as `unknown` without execution.
    /// Failures are not cached; a later call re-evaluates.
    #[tracing::instrument(skip_all, fields(file = self.filename.as_deref().unwrap_or("<inline>")))]
    pub async fn annotate(&self, config: &EvalConfig) -> Result<Arc<[AnnotatedLine]>> {
        let _gate = self.gate.lock().await;
        if let Some(done) = self.annotated() {
            return Ok(done);
        }

        let annotated: Arc<[AnnotatedLine]> = match language::comment_style(&self.language) {
            None => {
                warn!(language = %self.language, "unrecognized language; emitting without execution");
                self.lines
                    .iter()
                    .enumerate()
                    .map(|(i, text)| AnnotatedLine {
                        text: text.clone(),
                        class: LineClass::Unknown,
                        line: self.first_line + i,
                    })
                    .collect::<Vec<_>>()
                    .into()
            }
            Some(style) => {
                let lines = self.lines.clone();
                let first_line = self.first_line;
                let config = config.clone();
                tokio::task::spawn_blocking(move || {
                    engine::evaluate(&lines, first_line, style, &config)
                })
                .await??
                .into()
            }
        };

        *self.cache.write().expect("annotation cache poisoned") = Some(annotated.clone());
        Ok(annotated)
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_strips_edge_blanks_and_dedents() {
        let s = Snippet::new("\n\n    local x = 1\n    x = x + 1\n\n", "lua", None, 0);
        assert_eq!(s.lines(), &["local x = 1", "x = x + 1"]);
        assert_eq!(s.first_line(), 3);
    }

    #[test]
    fn line_offset_shifts_numbering() {
        let s = Snippet::new("local x = 1", "lua", None, 10);
        assert_eq!(s.first_line(), 11);
    }

    #[test]
    fn interior_blank_lines_survive_normalisation() {
        let s = Snippet::new("  local a = 1\n\n  local b = 2", "lua", None, 0);
        assert_eq!(s.lines(), &["local a = 1", "", "local b = 2"]);
    }

    #[test]
    fn nothing_is_cached_before_evaluation() {
        let s = Snippet::new("local x = 1", "lua", None, 0);
        assert!(s.annotated().is_none());
    }
}
