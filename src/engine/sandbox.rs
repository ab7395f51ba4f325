//! Sandboxed execution environment seeded with an explicit binding set.
//!
//! A fresh environment table sees exactly:
//! - a whitelisted slice of the Lua standard library,
//! - `log`/`print` routed to the host's structured logging,
//! - `require` scoped to the configured modules root,
//! - the caller's `page` state table,
//! - whatever the context-augmentation hook injects,
//! - the engine's capture callbacks (`__code`, `__cap`, `__miss`, `__fail`).
//!
//! No other globals are visible to snippet code.

use std::sync::{Arc, Mutex};

use mlua::{Lua, LuaSerdeExt, MultiValue, Table, Value};
use tracing::{info, warn};

use crate::config::EvalConfig;
use crate::engine::events::{
    error_repr, repr_of, summarize_values, CaptureEvent, ErrorRepr, EventKind, Observed,
};
use crate::engine::instrument::Program;

/// Standard-library names copied into the environment. Intentionally omits
/// `os`, `io`, `load`, and the debug library: snippets are trusted, but
/// their output must stay deterministic and self-contained.
const STDLIB_WHITELIST: &[&str] = &[
    "assert",
    "error",
    "getmetatable",
    "ipairs",
    "next",
    "pairs",
    "pcall",
    "rawequal",
    "rawget",
    "rawlen",
    "rawset",
    "select",
    "setmetatable",
    "tonumber",
    "tostring",
    "type",
    "xpcall",
    "coroutine",
    "math",
    "string",
    "table",
    "utf8",
];

/// Ordered event sink filled by the capture callbacks.
pub type EventSink = Arc<Mutex<Vec<CaptureEvent>>>;

/// Set when a raise happens while awaiting a `result` capture; takes
/// precedence over whatever error unwinds out of the program.
pub type FatalSlot = Arc<Mutex<Option<(usize, ErrorRepr)>>>;

pub struct Sandbox {
    pub env: Table,
    pub events: EventSink,
    pub fatal: FatalSlot,
}

/// Build the environment table and register the capture callbacks.
pub fn build(lua: &Lua, program: &Program, config: &EvalConfig) -> mlua::Result<Sandbox> {
    let env = lua.create_table()?;
    let globals = lua.globals();
    for name in STDLIB_WHITELIST {
        env.set(*name, globals.get::<Value>(*name)?)?;
    }

    let log = lua.create_function(|_, values: MultiValue| {
        let values: Vec<Value> = values.into_iter().collect();
        info!(target: "snippet", "{}", summarize_values(&values));
        Ok(())
    })?;
    env.set("log", log.clone())?;
    env.set("print", log)?;

    env.set("require", make_require(lua, config, env.clone())?)?;

    if let Some(page) = &config.page {
        let seed = page.lock().expect("page state lock poisoned").clone();
        env.set("page", lua.to_value(&seed)?)?;
    }

    if let Some(hook) = &config.augment {
        hook(lua, &env)?;
    }

    let events: EventSink = Arc::new(Mutex::new(Vec::new()));
    let fatal: FatalSlot = Arc::new(Mutex::new(None));

    let texts = program.texts.clone();
    let sink = events.clone();
    env.set(
        "__code",
        lua.create_function(move |_, idx: usize| {
            let (text, line) = texts
                .get(idx.wrapping_sub(1))
                .ok_or_else(|| mlua::Error::RuntimeError(format!("bad code index {idx}")))?;
            sink.lock()
                .expect("event sink lock poisoned")
                .push(CaptureEvent {
                    line: *line,
                    kind: EventKind::Code(text.clone()),
                });
            Ok(())
        })?,
    )?;

    let sink = events.clone();
    env.set(
        "__cap",
        lua.create_function(
            move |_, (line, show, kind, sync, value): (usize, bool, String, bool, Value)| {
                let observed = match kind.as_str() {
                    "result" => Observed::Result(repr_of(&value)),
                    "error" => Observed::Error(error_repr(&value)),
                    other => {
                        return Err(mlua::Error::RuntimeError(format!(
                            "bad capture kind `{other}`"
                        )))
                    }
                };
                let observed = if sync {
                    observed
                } else {
                    Observed::Promise(Box::new(observed))
                };
                sink.lock()
                    .expect("event sink lock poisoned")
                    .push(CaptureEvent {
                        line,
                        kind: EventKind::Capture {
                            observed,
                            rendered: show,
                        },
                    });
                Ok(())
            },
        )?,
    )?;

    let sink = events.clone();
    env.set(
        "__miss",
        lua.create_function(move |_, line: usize| {
            sink.lock()
                .expect("event sink lock poisoned")
                .push(CaptureEvent {
                    line,
                    kind: EventKind::Violation,
                });
            Ok(())
        })?,
    )?;

    let slot = fatal.clone();
    env.set(
        "__fail",
        lua.create_function(move |_, (line, value): (usize, Value)| -> mlua::Result<()> {
            *slot.lock().expect("fatal slot lock poisoned") = Some((line, error_repr(&value)));
            Err(mlua::Error::RuntimeError(
                "raise while awaiting a result capture".to_string(),
            ))
        })?,
    )?;

    Ok(Sandbox { env, events, fatal })
}

/// `require(name)` scoped to the configured modules root, with a per-run
/// module cache. Traversal outside the root is rejected.
fn make_require(lua: &Lua, config: &EvalConfig, env: Table) -> mlua::Result<mlua::Function> {
    let root = config.modules_root.clone();
    let cache = lua.create_table()?;
    lua.create_function(move |lua, name: String| {
        let Some(root) = root.as_ref() else {
            return Err(mlua::Error::RuntimeError(
                "module resolution is not configured for this snippet".to_string(),
            ));
        };
        if name.contains("..") || name.starts_with('/') || name.starts_with('\\') {
            return Err(mlua::Error::RuntimeError(format!(
                "module name `{name}` escapes the modules root"
            )));
        }
        if let Ok(cached) = cache.raw_get::<Value>(name.as_str()) {
            if cached != Value::Nil {
                return Ok(cached);
            }
        }

        let mut path = root.join(&name);
        if path.extension().is_none() {
            path.set_extension("lua");
        }
        let source = std::fs::read_to_string(&path).map_err(|e| {
            mlua::Error::RuntimeError(format!("module `{name}`: {e}"))
        })?;
        info!(module = %name, path = %path.display(), "loading snippet module");

        let value = lua
            .load(&source)
            .set_name(format!("=module '{name}'"))
            .set_environment(env.clone())
            .eval::<Value>()?;
        cache.raw_set(name.as_str(), value.clone())?;
        Ok(value)
    })
}

/// Read the (possibly mutated) page table back into the caller's state.
///
/// Best-effort: a page holding non-serializable values keeps its previous
/// contents and logs a warning.
pub fn store_page(lua: &Lua, env: &Table, config: &EvalConfig) {
    let Some(page) = &config.page else { return };
    let value = match env.get::<Value>("page") {
        Ok(v) => v,
        Err(e) => {
            warn!("page table unreadable after run: {e}");
            return;
        }
    };
    match lua.from_value::<serde_json::Value>(value) {
        Ok(json) => *page.lock().expect("page state lock poisoned") = json,
        Err(e) => warn!("page state not serializable; keeping previous value: {e}"),
    }
}
