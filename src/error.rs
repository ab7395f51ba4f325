//! Error taxonomy for snippet evaluation.
//!
//! Failures fall into two fatal classes:
//! - [`AuthoringError`] — the snippet author wrote an invalid directive
//!   sequence. Detected before anything executes; the snippet produces no
//!   partial output.
//! - [`RuntimeFailure`] — the synthesized program failed outside a designated
//!   capture (or while awaiting a `result` capture). Also fatal, also no
//!   partial output.
//!
//! A `throws` clump that completes without raising is *not* an error: it is
//! recorded as a violation event and rendered into the output, and whether a
//! build treats that as fatal is the caller's policy.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type surfaced by snippet evaluation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Authoring(#[from] AuthoringError),

    #[error(transparent)]
    Runtime(#[from] RuntimeFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sandbox initialisation failed: {0}")]
    Sandbox(#[from] mlua::Error),

    #[error("evaluation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Fatal mistakes in the directive structure of a snippet.
///
/// Every variant carries the 1-based source line (line offset included) the
/// author needs to look at.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthoringError {
    #[error("line {line}: unknown directive `{tag}`")]
    UnknownDirective { tag: String, line: usize },

    #[error("line {line}: directive is missing its `:` separator")]
    MalformedDirective { line: usize },

    #[error(
        "line {line}: `{tag}:` cannot open while the capture clump from line {opened_at} is still open"
    )]
    NestedClump {
        tag: String,
        line: usize,
        opened_at: usize,
    },

    #[error("line {line}: `{tag}:` closes nothing; no capture clump is open")]
    UnmatchedClose { tag: String, line: usize },

    #[error("line {line}: `{tag}:` cannot seal the capture clump opened on line {opened_at}; close it with `log:` or `null:`")]
    BadSeal {
        tag: String,
        line: usize,
        opened_at: usize,
    },

    #[error("line {opened_at}: capture clump is never closed")]
    UnclosedClump { opened_at: usize },

    #[error("line {line}: capture clump contains no expression to capture")]
    NothingToCapture { line: usize },
}

impl AuthoringError {
    /// The 1-based source line this error points the author at.
    pub fn line(&self) -> usize {
        match self {
            Self::UnknownDirective { line, .. }
            | Self::MalformedDirective { line }
            | Self::NestedClump { line, .. }
            | Self::UnmatchedClose { line, .. }
            | Self::BadSeal { line, .. }
            | Self::NothingToCapture { line } => *line,
            Self::UnclosedClump { opened_at } => *opened_at,
        }
    }
}

/// Fatal failure of the synthesized program outside a designated capture.
#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct RuntimeFailure {
    /// 1-based source line of the executing statement (line offset included).
    pub line: usize,
    pub message: String,
    #[source]
    pub cause: Option<mlua::Error>,
}

impl RuntimeFailure {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(line: usize, message: impl Into<String>, cause: mlua::Error) -> Self {
        Self {
            line,
            message: message.into(),
            cause: Some(cause),
        }
    }
}
