//! `translation_insertions` (spec §4.E.3 "Insertions"): after a token is
//! chosen for a return value or argument, these entries claim the emitted
//! identifier as an id in a target symbol-table namespace.

/// Where the inserted id's trace-side value comes from.
#[derive(Debug, Clone, Copy)]
pub enum InsertionSource {
    /// The record's return value.
    Return,
    /// A specific argument index (used when the id is threaded back through
    /// an argument rather than the return slot, e.g. `eglCreateContext`).
    Arg(usize),
}

/// A single scalar-id insertion: `namespace[ scope? ][ trace_id ] = token`.
#[derive(Debug, Clone, Copy)]
pub struct Insertion {
    pub source: InsertionSource,
    pub namespace: &'static str,
    /// Argument index supplying the scope (e.g. the program id for
    /// `attribs@program`/`uniforms@program`), if the namespace is scoped.
    pub scope_arg: Option<usize>,
}

/// Looks up the insertion rule for a function, if it has one. Transcribed
/// (condensed to the scalar cases) from `original_source/glparse.py`'s
/// `translation_insertions` table.
#[must_use]
pub fn insertion_for(function: &str) -> Option<Insertion> {
    match function {
        "glCreateShader" => Some(Insertion {
            source: InsertionSource::Return,
            namespace: "shaders",
            scope_arg: None,
        }),
        "glCreateProgram" => Some(Insertion {
            source: InsertionSource::Return,
            namespace: "programs",
            scope_arg: None,
        }),
        "glGetAttribLocation" => Some(Insertion {
            source: InsertionSource::Return,
            namespace: "attribs",
            scope_arg: Some(0),
        }),
        "glGetUniformLocation" => Some(Insertion {
            source: InsertionSource::Return,
            namespace: "uniforms",
            scope_arg: Some(0),
        }),
        "eglCreateContext" => Some(Insertion {
            source: InsertionSource::Arg(1),
            namespace: "contexts",
            scope_arg: None,
        }),
        _ => None,
    }
}

/// Functions whose single non-scalar out-parameter (e.g. `glGenTextures`)
/// populates a namespace element-by-element; handled separately from the
/// scalar table above because each array element gets its own id.
#[must_use]
pub fn array_insertion_namespace(function: &str) -> Option<&'static str> {
    match function {
        "glGenTextures" => Some("textures"),
        "glGenBuffers" => Some("buffers"),
        "glGenFramebuffers" => Some("framebuffers"),
        "glGenRenderbuffers" => Some("renderbuffers"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_shader_inserts_its_return_value() {
        let insertion = insertion_for("glCreateShader").unwrap();
        assert!(matches!(insertion.source, InsertionSource::Return));
        assert_eq!(insertion.namespace, "shaders");
    }

    #[test]
    fn gen_textures_is_an_array_insertion() {
        assert_eq!(array_insertion_namespace("glGenTextures"), Some("textures"));
        assert_eq!(array_insertion_namespace("glClear"), None);
    }
}
