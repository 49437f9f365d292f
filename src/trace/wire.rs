//! `RecordDecoder` and the crate's reference wire codec.
//!
//! The trace payload schema itself is owned by the capture ecosystem
//! (out of scope, spec §6); this module defines the trait boundary and
//! ships one concrete, self-contained codec (`LiteDecoder`) so the crate is
//! testable without a protobuf toolchain. A real deployment substitutes its
//! own `RecordDecoder` impl over the real wire schema.

use std::collections::HashMap;
use std::fmt;

use super::record::{Argument, Payload, Record, TypeTag};

#[derive(Debug)]
pub enum DecodeError {
    Truncated,
    UnknownPayloadKind(u8),
    UnknownTypeTag(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated => write!(f, "payload ended before expected"),
            DecodeError::UnknownPayloadKind(k) => write!(f, "unknown payload kind {k}"),
            DecodeError::UnknownTypeTag(t) => write!(f, "unknown type tag {t}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Resolves a trace's numeric function opcodes to names. A record's opcode
/// is "resolved to a name" as part of decoding (spec §3); the table that
/// performs that resolution is owned by this crate rather than by the
/// external wire schema, so it is kept separate and swappable.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    by_id: HashMap<u32, String>,
}

impl FunctionTable {
    #[must_use]
    pub fn new() -> Self {
        FunctionTable {
            by_id: HashMap::new(),
        }
    }

    pub fn insert(&mut self, id: u32, name: impl Into<String>) -> &mut Self {
        self.by_id.insert(id, name.into());
        self
    }

    /// A table preloaded with every function name the fix-up catalogue
    /// (`translate::fixups`) and insertion table reference by name, at
    /// stable ids. Real deployments load the real id→name mapping from the
    /// capture transport instead.
    #[must_use]
    pub fn standard() -> Self {
        const NAMES: &[&str] = &[
            "glActiveTexture",
            "glAttachShader",
            "glBindAttribLocation",
            "glBindBuffer",
            "glBindFramebuffer",
            "glBindRenderbuffer",
            "glBindTexture",
            "glBlendEquation",
            "glBlendFunc",
            "glBufferData",
            "glBufferSubData",
            "glClear",
            "glClearColor",
            "glCompileShader",
            "glCompressedTexImage2D",
            "glCompressedTexSubImage2D",
            "glCreateProgram",
            "glCreateShader",
            "glDeleteBuffers",
            "glDeleteFramebuffers",
            "glDeleteProgram",
            "glDeleteRenderbuffers",
            "glDeleteShader",
            "glDeleteTextures",
            "glDisable",
            "glDiscardFramebufferEXT",
            "glDrawArrays",
            "glDrawElements",
            "glEnable",
            "glEnableVertexAttribArray",
            "glFramebufferRenderbuffer",
            "glFramebufferTexture2D",
            "glGenBuffers",
            "glGenFramebuffers",
            "glGenRenderbuffers",
            "glGenTextures",
            "glGetActiveUniform",
            "glGetAttachedShaders",
            "glGetAttribLocation",
            "glGetError",
            "glGetProgramInfoLog",
            "glGetShaderInfoLog",
            "glGetShaderPrecisionFormat",
            "glGetTexParameterfv",
            "glGetTexParameteriv",
            "glGetUniformLocation",
            "glGetVertexAttribfv",
            "glGetVertexAttribiv",
            "glGetVertexAttribPointerv",
            "glInvalidateFramebuffer",
            "glLinkProgram",
            "glRenderbufferStorage",
            "glScissor",
            "glShaderSource",
            "glTexImage2D",
            "glTexImage3D",
            "glTexParameteri",
            "glTexSubImage2D",
            "glTexSubImage3D",
            "glUniform1i",
            "glUniformMatrix4fv",
            "glUseProgram",
            "glVertexAttrib1fv",
            "glVertexAttrib2fv",
            "glVertexAttrib3fv",
            "glVertexAttrib4fv",
            "glVertexAttribPointer",
            "glVertexAttribPointerData",
            "glViewport",
            "eglCreateContext",
            "eglMakeCurrent",
            "eglSwapBuffers",
        ];
        let mut table = FunctionTable::new();
        for (id, name) in NAMES.iter().enumerate() {
            table.insert(id as u32, *name);
        }
        table
    }

    #[must_use]
    pub fn resolve(&self, id: u32) -> String {
        self.by_id
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("fn_{id}"))
    }
}

/// Decodes one already-length-delimited record payload.
pub trait RecordDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Record, DecodeError>;
}

/// The crate's reference wire codec (see module docs). Layout:
///
/// ```text
/// u32le opcode
/// u32le context_id
/// u8    arg_count
/// arg_count * {
///     u8    payload_kind   (0 int, 1 int64, 2 float, 3 bool, 4 char, 5 raw)
///     u8    type_tag       (0 enum, 1 void, 2 int, 3 float, 4 bool, 5 char)
///     u8    is_array
///     u32le elem_count
///     elem_count * element (width depends on payload_kind)
/// }
/// u8    has_return
/// has_return * { same per-arg layout as above, minus is_array (always false) }
/// ```
pub struct LiteDecoder {
    pub functions: FunctionTable,
}

impl LiteDecoder {
    #[must_use]
    pub fn new(functions: FunctionTable) -> Self {
        LiteDecoder { functions }
    }

    #[must_use]
    pub fn with_standard_functions() -> Self {
        LiteDecoder::new(FunctionTable::standard())
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn decode_type_tag(&mut self) -> Result<TypeTag, DecodeError> {
        match self.u8()? {
            0 => Ok(TypeTag::Enum),
            1 => Ok(TypeTag::Void),
            2 => Ok(TypeTag::Int),
            3 => Ok(TypeTag::Float),
            4 => Ok(TypeTag::Bool),
            5 => Ok(TypeTag::Char),
            other => Err(DecodeError::UnknownTypeTag(other)),
        }
    }

    fn decode_argument(&mut self, has_is_array: bool) -> Result<Argument, DecodeError> {
        let kind = self.u8()?;
        let type_tag = self.decode_type_tag()?;
        let is_array = if has_is_array { self.u8()? != 0 } else { false };
        let count = self.u32()? as usize;
        let payload = match kind {
            0 => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(i32::from_le_bytes(self.take(4)?.try_into().unwrap()));
                }
                Payload::IntArr(v)
            }
            1 => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(i64::from_le_bytes(self.take(8)?.try_into().unwrap()));
                }
                Payload::Int64Arr(v)
            }
            2 => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(f32::from_le_bytes(self.take(4)?.try_into().unwrap()));
                }
                Payload::FloatArr(v)
            }
            3 => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(self.u8()? != 0);
                }
                Payload::BoolArr(v)
            }
            4 => Payload::CharArr(self.take(count)?.to_vec()),
            5 => Payload::RawBytes(self.take(count)?.to_vec()),
            other => return Err(DecodeError::UnknownPayloadKind(other)),
        };
        Ok(Argument {
            payload,
            type_tag,
            is_array,
        })
    }
}

impl RecordDecoder for LiteDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Record, DecodeError> {
        let mut cur = Cursor::new(bytes);
        let opcode = cur.u32()?;
        let context_id = cur.u32()?;
        let arg_count = cur.u8()? as usize;
        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            args.push(cur.decode_argument(true)?);
        }
        let has_return = cur.u8()? != 0;
        let return_value = if has_return {
            Some(cur.decode_argument(false)?)
        } else {
            None
        };
        Ok(Record {
            function: self.functions.resolve(opcode),
            context_id,
            args,
            return_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_minimal(opcode: u32, context: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(opcode.to_le_bytes());
        out.extend(context.to_le_bytes());
        out.push(0); // arg_count
        out.push(0); // has_return
        out
    }

    #[test]
    fn decodes_a_no_argument_call() {
        let decoder = LiteDecoder::with_standard_functions();
        let bytes = encode_minimal(0, 1);
        let record = decoder.decode(&bytes).unwrap();
        assert_eq!(record.function, "glActiveTexture");
        assert_eq!(record.context_id, 1);
        assert!(record.args.is_empty());
        assert!(record.return_value.is_none());
    }

    #[test]
    fn unknown_opcode_falls_back_to_fn_id() {
        let decoder = LiteDecoder::with_standard_functions();
        let bytes = encode_minimal(999_999, 0);
        let record = decoder.decode(&bytes).unwrap();
        assert_eq!(record.function, "fn_999999");
    }

    #[test]
    fn truncated_payload_errors() {
        let decoder = LiteDecoder::with_standard_functions();
        let bytes = vec![0u8; 3];
        assert!(matches!(
            decoder.decode(&bytes),
            Err(DecodeError::Truncated)
        ));
    }
}
