//! C-like Source Parser (spec §6): `deinline`'s documented input is "an
//! already-emitted C-like file", not a trace. This recovers a `Program` from
//! exactly the subset of C the emitter in `crate::emit` produces — globals,
//! prototypes (skipped, redundant with the definitions), procedure and frame
//! bodies, and the `draw` dispatch (skipped, regenerated from frame count).
//! Anything outside that grammar is a parse error rather than a guess.

use std::collections::HashMap;
use std::fmt;

use crate::program::{Frame, Program, SENTINEL_NON_CALL, VOID_ARG};

#[derive(Debug)]
pub enum Error {
    Malformed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Malformed(detail) => write!(f, "malformed emitted source: {detail}"),
        }
    }
}

impl std::error::Error for Error {}

fn is_prototype_line(line: &str) -> bool {
    line.starts_with("void ") && line.ends_with(");")
}

fn definition_header(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("void ")?.strip_suffix(" {")?;
    let (name, params) = rest.split_once('(')?;
    let params = params.strip_suffix(')')?;
    Some((name, params))
}

/// Splits an argument or parameter list on top-level commas; commas nested
/// inside a cast's own parens don't split.
fn split_top_level(list: &str) -> Vec<String> {
    if list.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (index, ch) in list.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(list[start..index].trim().to_string());
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim().to_string());
    parts
}

/// Recovers the token a cast wrapper (`(TYPE)(INNER)`, the one decoration
/// `emit::render_call_args` ever applies) was built from, so re-emission
/// doesn't double-cast. Tokens that aren't cast-shaped pass through
/// untouched.
fn strip_cast(token: &str) -> &str {
    let Some(rest) = token.strip_prefix('(') else {
        return token;
    };
    let Some(type_end) = rest.find(')') else {
        return token;
    };
    let after_type = &rest[type_end + 1..];
    match after_type.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) if !inner.is_empty() => inner,
        _ => token,
    }
}

/// A single `name(args);` line, or `None` if the line isn't call-shaped
/// (a declaration or assignment the emitter wrote out verbatim).
fn parse_call_line(line: &str) -> Option<(String, Vec<String>)> {
    let body = line.strip_suffix(';')?;
    if !body.ends_with(')') {
        return None;
    }
    let open = body.find('(')?;
    let name = &body[..open];
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let params = &body[open + 1..body.len() - 1];
    let args = if params.trim().is_empty() {
        vec![VOID_ARG.to_string()]
    } else {
        split_top_level(params).iter().map(|a| strip_cast(a).to_string()).collect()
    };
    Some((name.to_string(), args))
}

fn parse_body(program: &mut Program, lines: &[&str]) -> Frame {
    let mut frame = Frame::new();
    for raw in lines {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((name, args)) = parse_call_line(trimmed) {
            let unit = program.alphabet.intern(&name);
            frame.push(unit, args);
        } else {
            let unit = program.alphabet.intern(trimmed);
            frame.push(unit, vec![SENTINEL_NON_CALL.to_string()]);
        }
    }
    frame
}

fn frame_index_from_name(name: &str) -> Option<usize> {
    name.strip_prefix("frame_")?.parse().ok()
}

/// Parses an emitted source file's text back into a `Program`.
///
/// # Errors
/// Returns `Error::Malformed` if a non-blank line outside the globals
/// section isn't a recognized prototype, definition header, or closing
/// brace in the position the emitter always puts one.
pub fn parse_program(text: &str) -> Result<Program, Error> {
    let lines: Vec<&str> = text.lines().collect();
    let mut index = 0usize;

    let mut globals = Vec::new();
    while index < lines.len() {
        let line = lines[index];
        if line.trim().is_empty() {
            index += 1;
            continue;
        }
        if is_prototype_line(line.trim()) {
            break;
        }
        globals.push(line.to_string());
        index += 1;
    }

    while index < lines.len() {
        let line = lines[index].trim();
        if line.is_empty() || is_prototype_line(line) {
            index += 1;
            continue;
        }
        break;
    }

    let mut program = Program::new();
    program.globals = globals;

    let mut frames_by_index: HashMap<usize, Frame> = HashMap::new();
    let mut max_frame_index: Option<usize> = None;

    while index < lines.len() {
        let line = lines[index].trim();
        if line.is_empty() {
            index += 1;
            continue;
        }
        if line == "void draw(int frame_index) {" {
            break;
        }
        let Some((name, params)) = definition_header(line) else {
            return Err(Error::Malformed(format!("expected a function definition, found: {line}")));
        };
        index += 1;
        let body_start = index;
        while index < lines.len() && lines[index].trim() != "}" {
            index += 1;
        }
        if index >= lines.len() {
            return Err(Error::Malformed(format!("unterminated body for {name}")));
        }
        let body_lines = &lines[body_start..index];
        index += 1;

        let unit = program.alphabet.intern(name);
        if let Some(frame_index) = frame_index_from_name(name) {
            let frame = parse_body(&mut program, body_lines);
            frames_by_index.insert(frame_index, frame);
            max_frame_index = Some(max_frame_index.map_or(frame_index, |m| m.max(frame_index)));
        } else {
            if !params.is_empty() && params != "void" {
                let formals: Vec<String> = split_top_level(params)
                    .into_iter()
                    .filter_map(|param| param.rsplit(' ').next().map(str::to_string))
                    .collect();
                program.formals.insert(unit, formals);
            }
            let frame = parse_body(&mut program, body_lines);
            program.procedures.insert(unit, frame);
        }
    }

    if let Some(max_index) = max_frame_index {
        for frame_index in 0..=max_index {
            program.frames.push(frames_by_index.remove(&frame_index).unwrap_or_default());
        }
    }

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit;

    #[test]
    fn round_trips_a_minimal_program() {
        let mut program = Program::new();
        let frame = program.begin_frame();
        let unit = program.alphabet.intern("glClear");
        program.frames[frame].push(unit, vec![VOID_ARG.to_string()]);

        let reparsed = parse_program(&emit::emit(&program)).unwrap();

        assert_eq!(reparsed.frames.len(), 1);
        let name = reparsed.alphabet.name(reparsed.frames[0].symbols[0]);
        assert_eq!(name, "glClear");
        assert_eq!(reparsed.frames[0].args[0], vec![VOID_ARG.to_string()]);
    }

    #[test]
    fn round_trips_a_synthesized_procedure_with_formals_and_a_call_site() {
        let mut program = Program::new();
        let proc_unit = program.alphabet.intern("subframe_0");
        program.formals.insert(proc_unit, vec!["param_uint_0".to_string()]);
        let mut proc_body = Frame::new();
        let bind_unit = program.alphabet.intern("glBindTexture");
        proc_body.push(bind_unit, vec!["GL_TEXTURE_2D".to_string(), "param_uint_0".to_string()]);
        program.procedures.insert(proc_unit, proc_body);

        let frame = program.begin_frame();
        program.frames[frame].push(proc_unit, vec!["42".to_string()]);

        let reparsed = parse_program(&emit::emit(&program)).unwrap();

        let reparsed_unit = reparsed.alphabet.code_unit_of("subframe_0").unwrap();
        assert_eq!(
            reparsed.formals.get(&reparsed_unit).unwrap(),
            &vec!["param_uint_0".to_string()]
        );
        let body = &reparsed.procedures[&reparsed_unit];
        assert_eq!(reparsed.alphabet.name(body.symbols[0]), "glBindTexture");
        assert_eq!(
            body.args[0],
            vec!["GL_TEXTURE_2D".to_string(), "param_uint_0".to_string()]
        );
        assert_eq!(reparsed.frames[0].symbols[0], reparsed_unit);
        assert_eq!(reparsed.frames[0].args[0], vec!["42".to_string()]);
    }

    #[test]
    fn round_trips_raw_passthrough_declarations() {
        let mut program = Program::new();
        let frame = program.begin_frame();
        let decl_unit = program
            .alphabet
            .intern("GLfloat farr0[3] = {1.0f, 2.0f, 3.0f};");
        program.frames[frame].push(decl_unit, vec![SENTINEL_NON_CALL.to_string()]);
        let call_unit = program.alphabet.intern("glUniform3fv");
        program.frames[frame].push(
            call_unit,
            vec!["0".to_string(), "1".to_string(), "farr0".to_string()],
        );

        let reparsed = parse_program(&emit::emit(&program)).unwrap();

        let texts: Vec<&str> = reparsed.frames[0]
            .symbols
            .iter()
            .map(|&unit| reparsed.alphabet.name(unit))
            .collect();
        assert!(texts.contains(&"GLfloat farr0[3] = {1.0f, 2.0f, 3.0f};"));
        assert!(texts.contains(&"glUniform3fv"));
    }

    #[test]
    fn strips_a_cast_wrapper_back_to_its_inner_token() {
        assert_eq!(strip_cast("(void *)(42)"), "42");
        assert_eq!(strip_cast("(void*)0x1234"), "(void*)0x1234");
        assert_eq!(strip_cast("farr0"), "farr0");
    }

    #[test]
    fn rejects_text_outside_the_emitted_grammar() {
        let err = parse_program("int main() {\n    return 0;\n}\n").unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }
}
