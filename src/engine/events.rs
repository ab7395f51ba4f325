//! Capture events and the tagged representation of observed values.
//!
//! Values are reduced to a [`Repr`] tree at capture time, inside the
//! executing program, so the reconciler never touches live Lua handles.
//! Outcomes use one tagged variant per shape — `Result`, `Error`, and
//! `Promise` wrapping either — instead of runtime type tests; rendering is
//! one recursive function per variant (see [`crate::engine::render`]).

use std::sync::OnceLock;

use itertools::Itertools;
use mlua::{Table, Value};
use regex::Regex;

/// Depth at which nested tables are elided.
const MAX_DEPTH: usize = 6;

/// Structural snapshot of a Lua value, deterministic by construction
/// (sorted keys, cycle and depth guards).
#[derive(Debug, Clone, PartialEq)]
pub enum Repr {
    Nil,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    /// Table with only a contiguous array part.
    Seq(Vec<Repr>),
    /// Any other table: rendered key text plus value, sorted by key.
    Map(Vec<(String, Repr)>),
    Function,
    Coroutine,
    /// Userdata and friends; carries the Lua type name.
    Opaque(String),
    /// Depth or cycle cut-off.
    Elided,
}

/// Snapshot of a raised error value.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRepr {
    pub message: String,
    /// Remaining keys of a table-shaped error, sorted.
    pub fields: Vec<(String, Repr)>,
}

/// Outcome of a designated capture.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Result(Repr),
    Error(ErrorRepr),
    /// The value was awaitable; the inner outcome settled asynchronously.
    Promise(Box<Observed>),
}

impl Observed {
    /// True when the value was available without suspension.
    pub fn sync(&self) -> bool {
        !matches!(self, Observed::Promise(_))
    }

    /// True for error outcomes, through any `Promise` wrapping.
    pub fn is_error(&self) -> bool {
        match self {
            Observed::Result(_) => false,
            Observed::Error(_) => true,
            Observed::Promise(inner) => inner.is_error(),
        }
    }
}

/// One ordered record of an executed unit's outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    /// 1-based source line (line offset included).
    pub line: usize,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Verbatim original text of a re-emitted unit; may span lines.
    Code(String),
    /// A designated capture settled.
    Capture { observed: Observed, rendered: bool },
    /// A `throws` clump's expression completed without raising.
    Violation,
}

/// Reduce a Lua value to its structural snapshot.
pub fn repr_of(value: &Value) -> Repr {
    repr_at(value, 0, &mut Vec::new())
}

fn repr_at(value: &Value, depth: usize, seen: &mut Vec<*const std::ffi::c_void>) -> Repr {
    match value {
        Value::Nil => Repr::Nil,
        Value::Boolean(b) => Repr::Bool(*b),
        Value::Integer(i) => Repr::Int(*i),
        Value::Number(n) => Repr::Num(*n),
        Value::String(s) => Repr::Str(s.to_string_lossy().to_string()),
        Value::Table(t) => {
            if depth >= MAX_DEPTH {
                return Repr::Elided;
            }
            let ptr = value.to_pointer();
            if seen.contains(&ptr) {
                return Repr::Elided;
            }
            seen.push(ptr);
            let repr = table_repr(t, depth, seen);
            seen.pop();
            repr
        }
        Value::Function(_) => Repr::Function,
        Value::Thread(_) => Repr::Coroutine,
        other => Repr::Opaque(other.type_name().to_string()),
    }
}

fn table_repr(table: &Table, depth: usize, seen: &mut Vec<*const std::ffi::c_void>) -> Repr {
    let len = table.raw_len();
    let array: Vec<Repr> = (1..=len)
        .map(|i| {
            let v = table.raw_get::<Value>(i).unwrap_or(Value::Nil);
            repr_at(&v, depth + 1, seen)
        })
        .collect();

    let mut entries: Vec<(String, Repr)> = Vec::new();
    for pair in table.clone().pairs::<Value, Value>() {
        let Ok((key, value)) = pair else { continue };
        if let Value::Integer(i) = key {
            if i >= 1 && (i as usize) <= len {
                continue;
            }
        }
        entries.push((key_text(&key), repr_at(&value, depth + 1, seen)));
    }

    if entries.is_empty() {
        return Repr::Seq(array);
    }

    entries.extend(
        array
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("[{}]", i + 1), v)),
    );
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Repr::Map(entries)
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => {
            let s = s.to_string_lossy().to_string();
            if is_identifier(&s) {
                s
            } else {
                format!("[{:?}]", s)
            }
        }
        Value::Integer(i) => format!("[{}]", i),
        Value::Number(n) => format!("[{}]", n),
        Value::Boolean(b) => format!("[{}]", b),
        other => format!("[<{}>]", other.type_name()),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Snapshot a raised error value.
///
/// String errors lose the Lua position prefix (`chunk:12:`); table errors
/// take their `message` field plus remaining keys in sorted order.
pub fn error_repr(value: &Value) -> ErrorRepr {
    match value {
        Value::String(s) => ErrorRepr {
            message: strip_position_prefix(&s.to_string_lossy()),
            fields: Vec::new(),
        },
        Value::Table(t) => {
            let message = match t.raw_get::<Value>("message").unwrap_or(Value::Nil) {
                Value::String(s) => s.to_string_lossy().to_string(),
                Value::Nil => String::from("unspecified error"),
                other => crate::engine::render::render_repr(&repr_of(&other)),
            };
            let mut fields: Vec<(String, Repr)> = Vec::new();
            for pair in t.clone().pairs::<Value, Value>() {
                let Ok((key, value)) = pair else { continue };
                if matches!(&key, Value::String(s) if s.to_string_lossy() == "message") {
                    continue;
                }
                fields.push((key_text(&key), repr_of(&value)));
            }
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            ErrorRepr { message, fields }
        }
        other => ErrorRepr {
            message: crate::engine::render::render_repr(&repr_of(other)),
            fields: Vec::new(),
        },
    }
}

/// Drop the `chunk:line:` prefix Lua prepends to string errors.
pub fn strip_position_prefix(message: &str) -> String {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let re = PREFIX
        .get_or_init(|| Regex::new(r#"^(?:\[string [^\]]*\]|\S+):\d+:\s*"#).expect("valid regex"));
    re.replace(message, "").into_owned()
}

/// Human-readable one-line summary of a value list, used by the `log`
/// binding.
pub fn summarize_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| crate::engine::render::render_repr(&repr_of(v)))
        .join(" ")
}

// ── tests ─────────────────────────────────────────────────────────────────────
