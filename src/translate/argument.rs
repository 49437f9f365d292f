//! Argument → token decision tree (spec §4.E.3). First match wins.

use crate::assets::AssetKind;
use crate::program::VOID_ARG;
use crate::trace::{Payload, TypeTag};

use super::{IndexElemWidth, TranslateContext};

/// The token plus whatever side effects (global declarations, preamble
/// lines to run before the call) producing it required.
#[derive(Debug, Default)]
pub struct Emission {
    pub token: String,
    /// Raw lines appended to `program.globals` (process-lifetime storage).
    pub global_lines: Vec<String>,
    /// Raw lines emitted as passthrough instructions immediately before the
    /// call in the current frame (asset open calls, local declarations).
    pub preamble_lines: Vec<String>,
}

impl Emission {
    fn token(token: impl Into<String>) -> Self {
        Emission {
            token: token.into(),
            ..Default::default()
        }
    }
}

fn format_float(value: f32) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}f")
    } else {
        format!("{value}f")
    }
}

fn int_array_c_type(width: IndexElemWidth) -> &'static str {
    match width {
        IndexElemWidth::U8 => "GLubyte",
        IndexElemWidth::U16 => "GLushort",
        IndexElemWidth::U32 => "GLuint",
    }
}

/// Implements spec §4.E.3's eight ordered cases.
pub fn translate_argument(
    ctx: &mut TranslateContext,
    function: &str,
    arg_index: usize,
    arg: &crate::trace::Argument,
) -> Result<Emission, super::Error> {
    let group = ctx.registry.parameter_group(function, arg_index).map(str::to_string);

    // Case 1: float array payload.
    if let Payload::FloatArr(values) = &arg.payload {
        if arg.is_array {
            let byte_len = values.len() * 4;
            if byte_len >= ctx.options.float_asset_threshold {
                let variable = ctx.fresh_global_name("asset_f");
                let buffer = format!("{variable}_buf");
                let lines = ctx.assets.allocate(
                    AssetKind::Float,
                    &variable,
                    &buffer,
                    "GLfloat",
                    &arg.payload.as_bytes(),
                )?;
                return Ok(Emission {
                    token: buffer,
                    preamble_lines: lines,
                    global_lines: Vec::new(),
                });
            }
            let local = ctx.fresh_local_name("farr");
            let literal = values
                .iter()
                .map(|v| format_float(*v))
                .collect::<Vec<_>>()
                .join(", ");
            return Ok(Emission {
                token: local.clone(),
                preamble_lines: vec![format!(
                    "GLfloat {local}[{}] = {{{literal}}};",
                    values.len()
                )],
                global_lines: Vec::new(),
            });
        }
    }

    // Case 2: raw-byte payload, array.
    if let Payload::RawBytes(bytes) = &arg.payload {
        if arg.is_array {
            if bytes.len() >= ctx.options.int_asset_threshold {
                let variable = if function == "glVertexAttribPointerData" {
                    let attrib_index = ctx.pending_attrib_index.unwrap_or(0);
                    format!("attrib_{attrib_index}_asset")
                } else {
                    ctx.fresh_global_name("asset_i")
                };
                let buffer = format!("{variable}_buf");
                let lines = ctx
                    .assets
                    .allocate(AssetKind::Int, &variable, &buffer, "void", bytes)?;
                return Ok(Emission {
                    token: buffer,
                    preamble_lines: lines,
                    global_lines: Vec::new(),
                });
            }
            let local = ctx.fresh_local_name("barr");
            let literal = bytes
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Ok(Emission {
                token: local.clone(),
                preamble_lines: vec![format!(
                    "unsigned char {local}[{}] = {{{literal}}};",
                    bytes.len()
                )],
                global_lines: Vec::new(),
            });
        }
    }

    // Case 3: is_array with int/int64/bool/char payload.
    if arg.is_array {
        let is_index_buffer = function == "glDrawElements" && arg_index == 3;
        match &arg.payload {
            Payload::IntArr(values) => {
                let width = if is_index_buffer {
                    ctx.pending_index_width.unwrap_or(IndexElemWidth::U32)
                } else {
                    IndexElemWidth::U32
                };
                let c_type = int_array_c_type(width);
                let byte_len = values.len() * width.byte_width();
                if byte_len >= ctx.options.int_asset_threshold {
                    let variable = ctx.fresh_global_name("idx_asset");
                    let buffer = format!("{variable}_buf");
                    let lines = ctx
                        .assets
                        .allocate(AssetKind::Int, &variable, &buffer, c_type, &arg.payload.as_bytes())?;
                    return Ok(Emission {
                        token: buffer,
                        preamble_lines: lines,
                        global_lines: Vec::new(),
                    });
                }
                let name = ctx.fresh_global_name("g_idx");
                let literal = values
                    .iter()
                    .map(i32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Ok(Emission {
                    token: name.clone(),
                    global_lines: vec![format!(
                        "static {c_type} {name}[{}] = {{{literal}}};",
                        values.len()
                    )],
                    preamble_lines: Vec::new(),
                });
            }
            Payload::CharArr(bytes) => {
                let local = ctx.fresh_local_name("cbuf");
                let initializer = if bytes.is_empty() {
                    format!("char {local}[256] = {{0}};")
                } else {
                    let escaped: String = bytes.iter().map(|&b| b as char).collect();
                    format!("char {local}[] = \"{escaped}\";")
                };
                return Ok(Emission {
                    token: local.clone(),
                    preamble_lines: vec![initializer],
                    global_lines: Vec::new(),
                });
            }
            // A genuine void* out-param (e.g. an `EGLImage*` return slot):
            // a 1-slot local is all the call site needs to write through.
            Payload::Int64Arr(_) => {
                let local = ctx.fresh_local_name("voidp");
                return Ok(Emission {
                    token: local.clone(),
                    preamble_lines: vec![format!("void *{local} = NULL;")],
                    global_lines: Vec::new(),
                });
            }
            // A `GLboolean*` out-param: sized to the payload, not a bare
            // void* (the values themselves aren't known at capture time,
            // only how many the call writes).
            Payload::BoolArr(values) => {
                let name = ctx.fresh_global_name("g_bool");
                return Ok(Emission {
                    token: name.clone(),
                    global_lines: vec![format!("static GLboolean {name}[{}];", values.len().max(1))],
                    preamble_lines: Vec::new(),
                });
            }
            _ => {}
        }
    }

    // Case 4: non-array character payload (shader source special case).
    if let Payload::CharArr(bytes) = &arg.payload {
        if !arg.is_array {
            let variable = ctx.fresh_global_name("asset_c");
            let buffer = format!("{variable}_buf");
            let lines = ctx
                .assets
                .allocate(AssetKind::Char, &variable, &buffer, "char", bytes)?;
            return Ok(Emission {
                token: format!("&{variable}"),
                preamble_lines: lines,
                global_lines: Vec::new(),
            });
        }
    }

    // Case 5: scalar int64.
    if let Payload::Int64Arr(values) = &arg.payload {
        let value = values.first().copied().unwrap_or(0);
        if let Some(expr) = ctx.symbols.lookup("global", None, value as u32) {
            return Ok(Emission::token(expr.to_string()));
        }
        return Ok(Emission::token(format!("(void*)0x{value:x}")));
    }

    // Case 6: scalar int.
    if let Payload::IntArr(values) = &arg.payload {
        let value = values.first().copied().unwrap_or(0);
        if let Some(expr) = ctx.symbols.lookup(group.as_deref().unwrap_or("global"), None, value as u32) {
            return Ok(Emission::token(expr.to_string()));
        }
        return Ok(match arg.type_tag {
            TypeTag::Enum => {
                if let Some(name) = ctx.registry.resolve_enum(group.as_deref(), value as u32) {
                    Emission::token(name.to_string())
                } else {
                    *ctx.missing_enum_warnings += 1;
                    tracing::warn!(
                        "{function}: unresolved enum 0x{value:x} at argument {arg_index}, emitting literal"
                    );
                    Emission::token(format!("0x{value:x}"))
                }
            }
            TypeTag::Void => Emission::token(format!("(void*)0x{value:x}")),
            _ => Emission::token(value.to_string()),
        });
    }

    // Case 7: scalar float.
    if let Payload::FloatArr(values) = &arg.payload {
        let value = values.first().copied().unwrap_or(0.0);
        return Ok(Emission::token(format_float(value)));
    }

    // Case 8: scalar bool.
    if let Payload::BoolArr(values) = &arg.payload {
        let value = values.first().copied().unwrap_or(false);
        if let Some(expr) = ctx.symbols.lookup("global", None, u32::from(value)) {
            return Ok(Emission::token(expr.to_string()));
        }
        return Ok(Emission::token(if value { "GL_TRUE" } else { "GL_FALSE" }.to_string()));
    }

    Err(super::Error::UnsupportedShape {
        function: function.to_string(),
        detail: format!("argument {arg_index} has no applicable decision-tree case"),
    })
}

/// A no-argument call's sole token.
#[must_use]
pub fn void_call_args() -> Vec<String> {
    vec![VOID_ARG.to_string()]
}
