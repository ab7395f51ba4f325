//! Expression instrumentation and program synthesis.
//!
//! Clump lines are grouped into units the way a REPL reads input: text
//! accumulates until the Lua parser accepts it, with the parser's
//! `incomplete_input` flag driving continuation. `return <text>` is tried
//! first so a trailing bare expression — not a valid Lua statement on its
//! own — classifies as the capturable kind, exactly as interactive Lua does.
//!
//! Synthesis then re-emits every unit preceded by a code event carrying its
//! verbatim text (hidden units skip the event, verbatim units skip the
//! execution) and rewrites the designated expression of a capture clump into
//! the capture primitive. The result is one program: a header defining the
//! coroutine driver, then the clump bodies in source order.

use tracing::debug;

use crate::engine::partition::{Clump, ClumpLine, Mode, Visibility};
use crate::error::{AuthoringError, EngineError, RuntimeFailure};

/// A fully synthesized program plus the side tables the executor needs.
#[derive(Debug)]
pub struct Program {
    pub source: String,
    /// Verbatim unit texts with their source lines, indexed by the 1-based
    /// argument of the generated `__code(n)` calls.
    pub texts: Vec<(String, usize)>,
    /// `(generated line, source line)` pairs in ascending generated order,
    /// one per executed unit, for fault attribution.
    pub line_map: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    /// Complete chunk; re-emitted unchanged.
    Statement,
    /// Accepted only under `return`; evaluation is captured or discarded.
    Expression,
}

#[derive(Debug)]
struct Unit {
    text: String,
    line: usize,
    kind: UnitKind,
    vis: Visibility,
}

enum Tried {
    Statement,
    Expression,
    Incomplete,
    Invalid(String),
}

fn try_unit(lua: &mlua::Lua, text: &str) -> Tried {
    // Blank or comment-only text parses as an empty `return`; keep it a
    // statement so it can never be designated.
    if text
        .lines()
        .all(|l| l.trim().is_empty() || l.trim_start().starts_with("--"))
    {
        return Tried::Statement;
    }
    match lua.load(format!("return {text}")).into_function() {
        Ok(_) => Tried::Expression,
        Err(mlua::Error::SyntaxError {
            incomplete_input: true,
            ..
        }) => Tried::Incomplete,
        Err(_) => match lua.load(text).into_function() {
            Ok(_) => Tried::Statement,
            Err(mlua::Error::SyntaxError {
                incomplete_input: true,
                ..
            }) => Tried::Incomplete,
            Err(mlua::Error::SyntaxError { message, .. }) => Tried::Invalid(message),
            Err(e) => Tried::Invalid(e.to_string()),
        },
    }
}

/// Group a clump's lines into units.
fn group_units(lua: &mlua::Lua, clump: &Clump) -> Result<Vec<Unit>, EngineError> {
    let mut units = Vec::new();
    let mut acc: Vec<&ClumpLine> = Vec::new();
    let mut last_error: Option<String> = None;

    for cl in &clump.lines {
        match cl.vis {
            Visibility::Hidden | Visibility::Verbatim => {
                if !acc.is_empty() {
                    return Err(syntax_failure(acc[0].line, last_error));
                }
                let kind = if cl.vis == Visibility::Hidden {
                    match try_unit(lua, &cl.text) {
                        Tried::Statement => UnitKind::Statement,
                        Tried::Expression => UnitKind::Expression,
                        Tried::Incomplete => {
                            return Err(syntax_failure(
                                cl.line,
                                Some("hidden statement is incomplete".to_string()),
                            ))
                        }
                        Tried::Invalid(msg) => return Err(syntax_failure(cl.line, Some(msg))),
                    }
                } else {
                    UnitKind::Statement
                };
                units.push(Unit {
                    text: cl.text.clone(),
                    line: cl.line,
                    kind,
                    vis: cl.vis,
                });
            }
            Visibility::Shown => {
                acc.push(cl);
                let text = acc
                    .iter()
                    .map(|c| c.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                let tried = try_unit(lua, &text);
                match tried {
                    Tried::Statement | Tried::Expression => {
                        units.push(Unit {
                            text,
                            line: acc[0].line,
                            kind: if matches!(tried, Tried::Expression) {
                                UnitKind::Expression
                            } else {
                                UnitKind::Statement
                            },
                            vis: Visibility::Shown,
                        });
                        acc.clear();
                        last_error = None;
                    }
                    Tried::Incomplete => {}
                    Tried::Invalid(msg) => last_error = Some(msg),
                }
            }
        }
    }

    if !acc.is_empty() {
        return Err(syntax_failure(acc[0].line, last_error));
    }
    Ok(units)
}

fn syntax_failure(line: usize, detail: Option<String>) -> EngineError {
    RuntimeFailure::new(
        line,
        format!(
            "syntax error in snippet: {}",
            detail.unwrap_or_else(|| "incomplete statement".to_string())
        ),
    )
    .into()
}

struct Emitter {
    out: String,
    gen_line: usize,
    line_map: Vec<(usize, usize)>,
    texts: Vec<(String, usize)>,
}

impl Emitter {
    fn new() -> Self {
        Self {
            out: String::new(),
            gen_line: 1,
            line_map: Vec::new(),
            texts: Vec::new(),
        }
    }

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
        self.gen_line += 1 + text.matches('\n').count();
    }

    /// Emit executable text, recording its generated position for fault
    /// attribution.
    fn exec(&mut self, text: &str, src_line: usize) {
        self.line_map.push((self.gen_line, src_line));
        self.raw(text);
    }

    /// Emit a `__code(n)` call carrying the unit's verbatim text.
    fn code_event(&mut self, text: &str, src_line: usize) {
        self.texts.push((text.to_string(), src_line));
        let call = format!("__code({})", self.texts.len());
        self.raw(&call);
    }
}

const HEADER: &str = "\
local __drive = function(__t)
local __last
while coroutine.status(__t) == \"suspended\" do
local __ok, __v = coroutine.resume(__t)
if not __ok then return false, __v end
if __v ~= nil then __last = __v end
end
return true, __last
end";

/// Rewrite every clump into one executable program.
pub fn synthesize(lua: &mlua::Lua, clumps: &[Clump]) -> Result<Program, EngineError> {
    let mut em = Emitter::new();
    em.raw(HEADER);

    for clump in clumps {
        let units = group_units(lua, clump)?;
        let designated = designated_index(lua, clump, &units)?;

        for (i, unit) in units.iter().enumerate() {
            let is_designated = designated == Some(Designated::Unit(i));
            match unit.vis {
                Visibility::Verbatim => em.code_event(&unit.text, unit.line),
                Visibility::Hidden => emit_plain(&mut em, unit),
                Visibility::Shown => {
                    em.code_event(&unit.text, unit.line);
                    if is_designated {
                        emit_capture(&mut em, clump, &unit.text, unit.line);
                    } else {
                        emit_plain(&mut em, unit);
                    }
                }
            }
        }

        if let Some(Designated::Override(text, line)) = &designated {
            emit_capture(&mut em, clump, text, *line);
        }
    }

    debug!(
        generated_lines = em.gen_line - 1,
        units = em.line_map.len(),
        "synthesized snippet program"
    );
    Ok(Program {
        source: em.out,
        texts: em.texts,
        line_map: em.line_map,
    })
}

#[derive(PartialEq)]
enum Designated {
    Unit(usize),
    Override(String, usize),
}

fn designated_index(
    lua: &mlua::Lua,
    clump: &Clump,
    units: &[Unit],
) -> Result<Option<Designated>, EngineError> {
    if clump.mode == Mode::Plain {
        return Ok(None);
    }
    if let Some((text, line)) = &clump.designated {
        if !matches!(try_unit(lua, text), Tried::Expression) {
            return Err(RuntimeFailure::new(
                *line,
                format!("designated expression `{text}` does not parse as an expression"),
            )
            .into());
        }
        return Ok(Some(Designated::Override(text.clone(), *line)));
    }
    let last_expr = units
        .iter()
        .rposition(|u| u.kind == UnitKind::Expression && u.vis == Visibility::Shown);
    match last_expr {
        Some(i) => Ok(Some(Designated::Unit(i))),
        None => Err(AuthoringError::NothingToCapture {
            line: clump.opened_at,
        }
        .into()),
    }
}

/// Re-emit a non-designated unit unchanged (expressions evaluate for effect).
fn emit_plain(em: &mut Emitter, unit: &Unit) {
    match unit.kind {
        UnitKind::Statement => em.exec(&unit.text, unit.line),
        UnitKind::Expression => {
            em.exec(&format!("do local _ = ({}\n) end", unit.text), unit.line)
        }
    }
}

/// Replace the designated expression with the capture primitive.
fn emit_capture(em: &mut Emitter, clump: &Clump, text: &str, line: usize) {
    let show = clump.rendered;
    em.line_map.push((em.gen_line, line));
    match clump.mode {
        Mode::Result => {
            em.raw("do");
            em.raw(&format!("local __v = ({text}"));
            em.raw(")");
            em.raw("if type(__v) == \"thread\" then");
            em.raw("local __ok, __r = __drive(__v)");
            em.raw(&format!(
                "if __ok then __cap({line}, {show}, \"result\", false, __r) else __fail({line}, __r) end"
            ));
            em.raw("else");
            em.raw(&format!("__cap({line}, {show}, \"result\", true, __v)"));
            em.raw("end");
            em.raw("end");
        }
        Mode::Error => {
            em.raw("do");
            em.raw(&format!("local __ok, __v = pcall(function() return ({text}"));
            em.raw(") end)");
            em.raw("if not __ok then");
            em.raw(&format!("__cap({line}, {show}, \"error\", true, __v)"));
            em.raw("elseif type(__v) == \"thread\" then");
            em.raw("local __k, __r = __drive(__v)");
            em.raw(&format!(
                "if __k then __miss({line}) else __cap({line}, {show}, \"error\", false, __r) end"
            ));
            em.raw("else");
            em.raw(&format!("__miss({line})"));
            em.raw("end");
            em.raw("end");
        }
        Mode::Plain => unreachable!("plain clumps have no designated expression"),
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::partition::partition;
    use crate::engine::scanner::scan;
    use crate::language::comment_style;

    fn synthesize_src(src: &str) -> Result<Program, EngineError> {
        let lines: Vec<String> = src.lines().map(str::to_string).collect();
        let clumps = partition(scan(&lines, 1, comment_style("lua").unwrap())?)?;
        let lua = mlua::Lua::new();
        synthesize(&lua, &clumps)
    }

    #[test]
    fn statements_are_reemitted_with_code_events() {
        let program = synthesize_src("local x = 1\nx = x + 1").unwrap();
        assert_eq!(program.texts.len(), 2);
        assert!(program.source.contains("__code(1)"));
        assert!(program.source.contains("local x = 1"));
        assert!(!program.source.contains("__cap("));
    }

    #[test]
    fn multiline_constructs_group_into_one_unit() {
        let program = synthesize_src("local t = {\n  a = 1,\n}").unwrap();
        assert_eq!(program.texts.len(), 1);
        assert_eq!(program.texts[0].0, "local t = {\n  a = 1,\n}");
    }

    #[test]
    fn last_expression_is_designated() {
        let program = synthesize_src("--@result:\nlocal x = 2\nx + 2\n--@log:").unwrap();
        assert!(program.source.contains("__cap(3, true, \"result\""));
    }

    #[test]
    fn call_statements_are_capturable() {
        let program = synthesize_src("--@result:\ntostring(4)\n--@log:").unwrap();
        assert!(program.source.contains("__cap(2, true, \"result\""));
    }

    #[test]
    fn throws_clump_uses_error_capture() {
        let program = synthesize_src("--@throws:\nerror(\"x\")\n--@log:").unwrap();
        assert!(program.source.contains("pcall(function() return (error(\"x\")"));
        assert!(program.source.contains("__miss(2)"));
    }

    #[test]
    fn null_sealed_capture_is_not_rendered() {
        let program = synthesize_src("--@result:\n1 + 1\n--@null:").unwrap();
        assert!(program.source.contains("__cap(2, false, \"result\""));
    }

    #[test]
    fn payload_override_wins() {
        let program = synthesize_src("--@result:\nlocal x = 2\n--@log: x * 3").unwrap();
        assert!(program.source.contains("local __v = (x * 3"));
    }

    #[test]
    fn statement_only_capture_clump_is_an_authoring_error() {
        let err = synthesize_src("--@result:\nlocal x = 2\n--@log:").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Authoring(AuthoringError::NothingToCapture { line: 1 })
        ));
    }

    #[test]
    fn unterminated_construct_is_a_syntax_failure_naming_its_line() {
        let err = synthesize_src("local x = 1\nlocal t = {").unwrap_err();
        let EngineError::Runtime(failure) = err else {
            panic!("expected runtime failure");
        };
        assert_eq!(failure.line, 2);
        assert!(failure.message.contains("syntax error"));
    }

    #[test]
    fn line_map_tracks_source_lines() {
        let program = synthesize_src("local x = 1\nx = x + 1").unwrap();
        let sources: Vec<usize> = program.line_map.iter().map(|&(_, s)| s).collect();
        assert_eq!(sources, vec![1, 2]);
    }
}
