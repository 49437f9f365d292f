//! Pure data/lookup helpers for the fix-up catalogue (spec §4.E.2). The
//! stateful parts (shadow state, symbol tables, asset allocation) live in
//! the driver in `translate::mod`; this module holds the catalogue's closed
//! lookup tables so they read as a table of cases, the way
//! `original_source/glparse.py`'s fix-up chain is organized.

/// `GL_DITHER`, the one enum `glEnable`/`glDisable` threads a runtime state
/// pointer for (spec §4.E.2).
pub const GL_DITHER: u32 = 0x0BD0;

/// Calls dropped entirely regardless of argument shape.
pub const UNCONDITIONALLY_DROPPED: &[&str] = &[
    "glGetActiveUniform",
    "glDiscardFramebufferEXT",
    "glGetTexParameterfv",
    "glGetTexParameteriv",
    "glGetVertexAttribfv",
];

/// `glVertexAttrib{1,2,3,4}fv`, dropped only when called with no array data.
pub const DROPPED_WHEN_SCALAR: &[&str] = &[
    "glVertexAttrib1fv",
    "glVertexAttrib2fv",
    "glVertexAttrib3fv",
    "glVertexAttrib4fv",
];

/// Functions whose texture/pixel payload argument index may legitimately
/// arrive as NULL (capture taken without texture data).
pub const NULLABLE_TEXTURE_DATA_FUNCTIONS: &[&str] = &[
    "glTexImage2D",
    "glTexSubImage2D",
    "glCompressedTexImage2D",
    "glCompressedTexSubImage2D",
    "glTexImage3D",
    "glTexSubImage3D",
];

/// `glVertexAttribPointer`/`glVertexAttribPointerData`'s whitelisted GL
/// element type enums; anything else aborts translation.
pub const VERTEX_ATTRIB_TYPE_WHITELIST: &[u32] = &[
    0x1400, // GL_BYTE
    0x1401, // GL_UNSIGNED_BYTE
    0x1402, // GL_SHORT
    0x1403, // GL_UNSIGNED_SHORT
    0x140C, // GL_FIXED
    0x1406, // GL_FLOAT
];

/// `glDrawElements`' index-type enum -> emitted element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexElemWidth {
    U8,
    U16,
    U32,
}

impl IndexElemWidth {
    #[must_use]
    pub fn byte_width(self) -> usize {
        match self {
            IndexElemWidth::U8 => 1,
            IndexElemWidth::U16 => 2,
            IndexElemWidth::U32 => 4,
        }
    }

    #[must_use]
    pub fn from_gl_enum(value: u32) -> Option<Self> {
        match value {
            0x1401 => Some(IndexElemWidth::U8),  // GL_UNSIGNED_BYTE
            0x1403 => Some(IndexElemWidth::U16), // GL_UNSIGNED_SHORT
            0x1405 => Some(IndexElemWidth::U32), // GL_UNSIGNED_INT
            _ => None,
        }
    }
}

/// How a trace-dropped out-parameter's argument shape gets patched back
/// (spec §4.E.2: "synthesize missing array-ness or size arguments the
/// capture dropped").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayNessFixup {
    /// The capture sent a scalar where the real call takes a pointer.
    MarkArray,
    /// As `MarkArray`, and the capture also mistyped the pointer as a plain
    /// int instead of `void*`.
    MarkArrayAsVoid,
}

/// Per-function, per-argument-index array-ness patches the trace capture
/// drops (spec §4.E.2's illustrative catalogue): `glGetVertexAttribiv`'s
/// result slot, `glGetVertexAttribPointerv`'s pointer-to-pointer slot (sent
/// as a plain int), the `(length, buffer)` out-param pairs of
/// `glGet{Shader,Program}InfoLog` and `glGetAttachedShaders`, the
/// `(range, precision)` pair of `glGetShaderPrecisionFormat`, and the
/// attachment-enum array of `glInvalidateFramebuffer`.
#[must_use]
pub fn array_ness_fixup(function: &str, arg_index: usize) -> Option<ArrayNessFixup> {
    match (function, arg_index) {
        ("glGetVertexAttribiv", 2) => Some(ArrayNessFixup::MarkArray),
        ("glGetVertexAttribPointerv", 2) => Some(ArrayNessFixup::MarkArrayAsVoid),
        ("glGetShaderInfoLog", 2 | 3) => Some(ArrayNessFixup::MarkArray),
        ("glGetProgramInfoLog", 2 | 3) => Some(ArrayNessFixup::MarkArray),
        ("glGetAttachedShaders", 2 | 3) => Some(ArrayNessFixup::MarkArray),
        ("glGetShaderPrecisionFormat", 2 | 3) => Some(ArrayNessFixup::MarkArray),
        ("glInvalidateFramebuffer", 2) => Some(ArrayNessFixup::MarkArray),
        _ => None,
    }
}

#[must_use]
pub fn is_unconditionally_dropped(function: &str) -> bool {
    UNCONDITIONALLY_DROPPED.contains(&function)
}

#[must_use]
pub fn is_dropped_scalar_vertex_attrib(function: &str, last_arg_is_array: bool) -> bool {
    DROPPED_WHEN_SCALAR.contains(&function) && !last_arg_is_array
}

#[must_use]
pub fn allows_null_texture_data(function: &str) -> bool {
    NULLABLE_TEXTURE_DATA_FUNCTIONS.contains(&function)
}

#[must_use]
pub fn is_whitelisted_vertex_attrib_type(value: u32) -> bool {
    VERTEX_ATTRIB_TYPE_WHITELIST.contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_width_maps_known_gl_enums() {
        assert_eq!(IndexElemWidth::from_gl_enum(0x1401), Some(IndexElemWidth::U8));
        assert_eq!(IndexElemWidth::from_gl_enum(0x1403), Some(IndexElemWidth::U16));
        assert_eq!(IndexElemWidth::from_gl_enum(0x1405), Some(IndexElemWidth::U32));
        assert_eq!(IndexElemWidth::from_gl_enum(0xDEAD), None);
    }

    #[test]
    fn vertex_attrib_fv_is_dropped_only_when_scalar() {
        assert!(is_dropped_scalar_vertex_attrib("glVertexAttrib1fv", false));
        assert!(!is_dropped_scalar_vertex_attrib("glVertexAttrib1fv", true));
        assert!(!is_dropped_scalar_vertex_attrib("glClear", false));
    }
}
