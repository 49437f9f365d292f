//! Emitter (spec §4.I): serializes a [`Program`] to a single C-like source
//! file — global declarations, function prototypes, function bodies, and a
//! `draw` dispatch procedure that switches on a frame index.

use std::fmt;
use std::path::Path;

use crate::deinline::mangled::{self, TypeTag};
use crate::program::{Frame, Program, SENTINEL_NON_CALL, VOID_ARG};

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Formal types for a handful of original leaf functions that have no
/// emitted prototype of their own (the target replay environment's GL
/// headers already declare them), seeded per spec §4.I's "known
/// cast-sensitive leaves (draw/vertex/tex/EXT)" table. Anything not listed
/// here renders its actual tokens undecorated.
fn cast_sensitive_leaf_types(function: &str) -> Option<&'static [TypeTag]> {
    match function {
        "glDrawArrays" => Some(&[TypeTag::Enum, TypeTag::Int, TypeTag::Int]),
        "glDrawElements" => Some(&[TypeTag::Enum, TypeTag::Int, TypeTag::Enum, TypeTag::Ptr]),
        "glVertexAttribPointer" | "glVertexAttribPointerData" => Some(&[
            TypeTag::UInt,
            TypeTag::Int,
            TypeTag::Enum,
            TypeTag::Bool,
            TypeTag::Int,
            TypeTag::Ptr,
        ]),
        "glTexImage2D" => Some(&[
            TypeTag::Enum,
            TypeTag::Int,
            TypeTag::Int,
            TypeTag::Int,
            TypeTag::Int,
            TypeTag::Int,
            TypeTag::Enum,
            TypeTag::Enum,
            TypeTag::Ptr,
        ]),
        "glDiscardFramebufferEXT" => Some(&[TypeTag::Enum, TypeTag::Int, TypeTag::Ptr]),
        _ => None,
    }
}

fn formal_types_for(program: &Program, unit: u16, function: &str) -> Vec<TypeTag> {
    if let Some(formals) = program.formals.get(&unit) {
        formals
            .iter()
            .map(|name| mangled::type_of_formal_name(name).unwrap_or(TypeTag::Ident))
            .collect()
    } else {
        cast_sensitive_leaf_types(function).map(<[TypeTag]>::to_vec).unwrap_or_default()
    }
}

/// `memcpy` is a reserved leaf with no type-cast metadata (spec §4.H step
/// 5): never decorate its arguments.
const NO_CAST_LEAVES: &[&str] = &["memcpy"];

fn render_call_args(function: &str, args: &[String], formal_types: &[TypeTag]) -> String {
    if args.len() == 1 && args[0] == VOID_ARG {
        return String::new();
    }
    if NO_CAST_LEAVES.contains(&function) {
        return args.join(", ");
    }
    args.iter()
        .enumerate()
        .map(|(index, token)| match formal_types.get(index) {
            Some(&declared) if declared != mangled::derive_type(token) => {
                format!("({})({token})", declared.c_type())
            }
            _ => token.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_instruction(program: &Program, unit: u16, args: &[String]) -> String {
    let text = program.alphabet.name(unit);
    if args.len() == 1 && args[0] == SENTINEL_NON_CALL {
        return text.to_string();
    }
    let formal_types = formal_types_for(program, unit, text);
    format!("{text}({});", render_call_args(text, args, &formal_types))
}

fn emit_body(program: &Program, frame: &Frame, out: &mut String) {
    for (unit, args) in frame.symbols.iter().zip(frame.args.iter()) {
        out.push_str("    ");
        out.push_str(&render_instruction(program, *unit, args));
        out.push('\n');
    }
}

fn procedure_signature(program: &Program, unit: u16) -> String {
    let name = program.alphabet.name(unit);
    match program.formals.get(&unit) {
        Some(formals) if !formals.is_empty() => {
            let params = formals
                .iter()
                .map(|formal| {
                    let tag = mangled::type_of_formal_name(formal).unwrap_or(TypeTag::Ident);
                    format!("{} {formal}", tag.c_type())
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("void {name}({params})")
        }
        _ => format!("void {name}(void)"),
    }
}

fn emit_globals(program: &Program, out: &mut String) {
    if program.globals.is_empty() {
        return;
    }
    for line in &program.globals {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
}

fn frame_function_name(frame_index: usize) -> String {
    format!("frame_{frame_index}")
}

fn emit_prototypes(program: &Program, out: &mut String) {
    for frame_index in 0..program.frames.len() {
        out.push_str(&format!("void {}(void);\n", frame_function_name(frame_index)));
    }
    let mut procedure_units: Vec<u16> = program.procedures.keys().copied().collect();
    procedure_units.sort_unstable();
    for unit in procedure_units {
        out.push_str(&procedure_signature(program, unit));
        out.push_str(";\n");
    }
    out.push('\n');
}

fn emit_procedures(program: &Program, out: &mut String) {
    let mut procedure_units: Vec<u16> = program.procedures.keys().copied().collect();
    procedure_units.sort_unstable();
    for unit in procedure_units {
        out.push_str(&procedure_signature(program, unit));
        out.push_str(" {\n");
        emit_body(program, &program.procedures[&unit], out);
        out.push_str("}\n\n");
    }

    for (frame_index, frame) in program.frames.iter().enumerate() {
        out.push_str(&format!("void {}(void) {{\n", frame_function_name(frame_index)));
        emit_body(program, frame, out);
        out.push_str("}\n\n");
    }
}

fn emit_dispatch(program: &Program, out: &mut String) {
    out.push_str("void draw(int frame_index) {\n");
    out.push_str("    switch (frame_index) {\n");
    for frame_index in 0..program.frames.len() {
        out.push_str(&format!(
            "        case {frame_index}: {}(); break;\n",
            frame_function_name(frame_index)
        ));
    }
    out.push_str("        default: return;\n");
    out.push_str("    }\n");
    out.push_str("}\n");
}

/// Serializes the full program in spec §4.I's fixed order: globals,
/// prototypes, definitions, dispatch.
#[must_use]
pub fn emit(program: &Program) -> String {
    let mut out = String::new();
    emit_globals(program, &mut out);
    emit_prototypes(program, &mut out);
    emit_procedures(program, &mut out);
    emit_dispatch(program, &mut out);
    out
}

/// Serializes and writes `program` to `path` in one operation (spec §6
/// "Emitted source (output)": a single text file).
pub fn write_to(program: &Program, path: &Path) -> Result<(), Error> {
    std::fs::write(path, emit(program))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_frame_emits_empty_arg_list() {
        let mut program = Program::new();
        let frame = program.begin_frame();
        let unit = program.alphabet.intern("glClear");
        program.frames[frame].push(unit, vec![VOID_ARG.to_string()]);
        let text = emit(&program);
        assert!(text.contains("glClear();"));
        assert!(text.contains("void frame_0(void);"));
        assert!(text.contains("case 0: frame_0(); break;"));
    }

    #[test]
    fn synthesized_procedure_gets_a_typed_prototype() {
        let mut program = Program::new();
        let unit = program.alphabet.intern("subframe_0");
        program.formals.insert(unit, vec!["param_uint_0".to_string()]);
        let mut body = Frame::new();
        let call_unit = program.alphabet.intern("glBindTexture");
        body.push(call_unit, vec!["GL_TEXTURE_2D".to_string(), "param_uint_0".to_string()]);
        program.procedures.insert(unit, body);

        let text = emit(&program);
        assert!(text.contains("void subframe_0(GLuint param_uint_0);"));
        assert!(text.contains("glBindTexture(GL_TEXTURE_2D, param_uint_0);"));
    }

    #[test]
    fn mismatched_actual_type_gets_a_cast() {
        let rendered = render_call_args("subframe_0", &["42".to_string()], &[TypeTag::Ptr]);
        assert_eq!(rendered, "(void *)(42)");
    }

    #[test]
    fn raw_passthrough_lines_render_verbatim() {
        let mut program = Program::new();
        let frame = program.begin_frame();
        let unit = program.alphabet.intern("GLfloat farr0[3] = {1.0f, 2.0f, 3.0f};");
        program.frames[frame].push(unit, vec![SENTINEL_NON_CALL.to_string()]);
        let text = emit(&program);
        assert!(text.contains("GLfloat farr0[3] = {1.0f, 2.0f, 3.0f};"));
    }
}
