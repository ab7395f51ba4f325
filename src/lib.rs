//! litrun — literate code-example execution and annotation engine.
//!
//! For each executable code sample embedded in documentation source, litrun
//! parses author directives out of comment lines, partitions the sample into
//! evaluation clumps, instruments one designated expression per capture
//! clump, runs the synthesized program in a sandboxed Lua state seeded with
//! an explicit binding set, and reconciles the observed results back into
//! the original lines as classified comments — "literate" output ready for
//! page rendering.
//!
//! ```no_run
//! use litrun::{EvalConfig, Snippet};
//!
//! # async fn demo() -> litrun::Result<()> {
//! let snippet = Snippet::new("--@result:\n2 + 2\n--@log:", "lua", None, 0);
//! let lines = snippet.annotate(&EvalConfig::new()).await?;
//! assert_eq!(lines[1].text, "-- 4");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod language;
pub mod snippet;

pub use config::{ContextHook, EvalConfig, PageState};
pub use error::{AuthoringError, EngineError, Result, RuntimeFailure};
pub use snippet::{AnnotatedLine, LineClass, Snippet};
