//! Snippet evaluation pipeline.
//!
//! Sub-modules, leaves first:
//! - [`scanner`]    — splits raw lines into a tagged directive/code stream.
//! - [`partition`]  — groups the stream into clumps with evaluation modes.
//! - [`instrument`] — REPL-style unit grouping and program synthesis.
//! - [`sandbox`]    — explicit-binding execution environment.
//! - [`executor`]   — runs the program once, maps failures to source lines.
//! - [`events`]     — capture events and value snapshots.
//! - [`render`]     — reconciles events into annotated output lines.
//!
//! Data flows strictly scanner → partition → instrument → executor → render.

pub mod events;
pub mod executor;
pub mod instrument;
pub mod partition;
pub mod render;
pub mod sandbox;
pub mod scanner;

use tracing::debug;

use crate::config::EvalConfig;
use crate::error::Result;
use crate::language::CommentStyle;
use crate::snippet::AnnotatedLine;

pub use events::{CaptureEvent, EventKind, Observed};

/// Run the full pipeline over one snippet's lines.
///
/// Blocking: executes Lua to completion. Callers on an async runtime go
/// through [`crate::Snippet::annotate`], which moves this onto a blocking
/// thread.
pub fn evaluate(
    lines: &[String],
    first_line: usize,
    style: CommentStyle,
    config: &EvalConfig,
) -> Result<Vec<AnnotatedLine>> {
    let stream = scanner::scan(lines, first_line, style)?;
    let clumps = partition::partition(stream)?;
    debug!(clumps = clumps.len(), "partitioned snippet");
    if clumps.is_empty() {
        return Ok(Vec::new());
    }

    let lua = mlua::Lua::new();
    let program = instrument::synthesize(&lua, &clumps)?;
    let events = executor::run(&lua, &program, config)?;
    Ok(render::reconcile(&events, style))
}

/// Validate directives, clump structure, and program synthesis without
/// executing anything.
///
/// Synthesis catches what partitioning alone cannot: capture clumps with no
/// expression and snippet syntax errors. Returns the clump count on success;
/// used by `litrun check`.
pub fn check(lines: &[String], first_line: usize, style: CommentStyle) -> Result<usize> {
    let stream = scanner::scan(lines, first_line, style)?;
    let clumps = partition::partition(stream)?;
    if !clumps.is_empty() {
        let lua = mlua::Lua::new();
        instrument::synthesize(&lua, &clumps)?;
    }
    Ok(clumps.len())
}
