//! Runs the synthesized program once and maps failures to source lines.
//!
//! The program executes to completion before any event is observable; a
//! failure outside a designated capture aborts the whole evaluation as a
//! [`RuntimeFailure`] carrying the 1-based source line of the executing
//! unit and wrapping the original cause.

use std::sync::OnceLock;

use mlua::Lua;
use regex::Regex;
use tracing::debug;

use crate::config::EvalConfig;
use crate::engine::events::{strip_position_prefix, CaptureEvent};
use crate::engine::instrument::Program;
use crate::engine::{render, sandbox};
use crate::error::{EngineError, RuntimeFailure};

/// Chunk name of the synthesized program; the `=` prefix keeps Lua error
/// positions in the bare `snippet:line:` form.
const CHUNK_NAME: &str = "=snippet";

/// Execute the program in a fresh sandbox and return the ordered event list.
pub fn run(lua: &Lua, program: &Program, config: &EvalConfig) -> Result<Vec<CaptureEvent>, EngineError> {
    let sandbox = sandbox::build(lua, program, config)?;
    debug!(
        generated_bytes = program.source.len(),
        "executing synthesized program"
    );

    let outcome = lua
        .load(&program.source)
        .set_name(CHUNK_NAME)
        .set_environment(sandbox.env.clone())
        .exec();

    // A raise while awaiting a `result` capture is recorded before the
    // program unwinds; it wins over the generic unwind error.
    if let Some((line, repr)) = sandbox.fatal.lock().expect("fatal slot lock poisoned").take() {
        let message = format!(
            "captured expression raised while being awaited: {}",
            render::render_error(&repr)
        );
        return Err(match outcome {
            Err(cause) => RuntimeFailure::with_cause(line, message, cause),
            Ok(()) => RuntimeFailure::new(line, message),
        }
        .into());
    }

    match outcome {
        Ok(()) => {
            sandbox::store_page(lua, &sandbox.env, config);
            let events = std::mem::take(
                &mut *sandbox.events.lock().expect("event sink lock poisoned"),
            );
            debug!(events = events.len(), "program settled");
            Ok(events)
        }
        Err(e) => Err(map_lua_failure(e, &program.line_map).into()),
    }
}

/// Translate an error unwinding out of the program into a source-attributed
/// failure using the generated-line map.
fn map_lua_failure(error: mlua::Error, line_map: &[(usize, usize)]) -> RuntimeFailure {
    let haystack = match &error {
        mlua::Error::CallbackError { traceback, cause } => {
            format!("{cause}\n{traceback}")
        }
        other => other.to_string(),
    };
    let line = generated_line(&haystack)
        .map(|gen| source_line_for(line_map, gen))
        .unwrap_or_else(|| line_map.first().map(|&(_, s)| s).unwrap_or(1));

    let message = strip_position_prefix(
        haystack
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("snippet execution failed"),
    );
    RuntimeFailure::with_cause(line, message, error)
}

fn generated_line(message: &str) -> Option<usize> {
    static POSITION: OnceLock<Regex> = OnceLock::new();
    let re = POSITION
        .get_or_init(|| Regex::new(r#"snippet["\]]*:(\d+):"#).expect("valid regex"));
    re.captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn source_line_for(line_map: &[(usize, usize)], generated: usize) -> usize {
    line_map
        .iter()
        .take_while(|&&(gen, _)| gen <= generated)
        .last()
        .map(|&(_, src)| src)
        .unwrap_or(1)
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_line_lookup_picks_the_last_unit_at_or_before() {
        let map = [(2, 1), (5, 3), (9, 7)];
        assert_eq!(source_line_for(&map, 2), 1);
        assert_eq!(source_line_for(&map, 6), 3);
        assert_eq!(source_line_for(&map, 40), 7);
        assert_eq!(source_line_for(&map, 1), 1);
    }

    #[test]
    fn generated_line_is_extracted_from_lua_positions() {
        assert_eq!(generated_line("snippet:12: attempt to call a nil value"), Some(12));
        assert_eq!(
            generated_line("[string \"snippet\"]:3: boom"),
            Some(3)
        );
        assert_eq!(generated_line("no position here"), None);
    }
}
