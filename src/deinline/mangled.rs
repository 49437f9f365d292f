//! Shared mangled-name/token grammar (spec Glossary): the emitter and the
//! deinliner both recover a coarse C type from an argument token's surface
//! form, and decide whether a token names a process-lifetime global.
//!
//! Storage class (`global_`/`local_`/`param_`) is not literally spelled
//! into every token this crate emits (`g1`, `farr3`, ...), so membership in
//! the known-globals set stands in for the textual prefix test the
//! grammar's own `( global_ | local_ | param_ )` alternative describes.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Int,
    UInt,
    Float,
    Bool,
    Enum,
    Ptr,
    PtrPtr,
    CharPtr,
    Ident,
}

impl TypeTag {
    #[must_use]
    pub fn word(self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::UInt => "uint",
            TypeTag::Float => "float",
            TypeTag::Bool => "bool",
            TypeTag::Enum => "enum",
            TypeTag::Ptr => "ptr",
            TypeTag::PtrPtr => "ptrptr",
            TypeTag::CharPtr => "str",
            TypeTag::Ident => "id",
        }
    }

    /// Inverse of [`TypeTag::word`], used to recover a synthesized
    /// procedure's declared formal type from its `param_<word>_<index>`
    /// name for the emitter's cast decoration.
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "int" => TypeTag::Int,
            "uint" => TypeTag::UInt,
            "float" => TypeTag::Float,
            "bool" => TypeTag::Bool,
            "enum" => TypeTag::Enum,
            "ptr" => TypeTag::Ptr,
            "ptrptr" => TypeTag::PtrPtr,
            "str" => TypeTag::CharPtr,
            "id" => TypeTag::Ident,
            _ => return None,
        })
    }

    #[must_use]
    pub fn c_type(self) -> &'static str {
        match self {
            TypeTag::Int => "GLint",
            TypeTag::UInt => "GLuint",
            TypeTag::Float => "GLfloat",
            TypeTag::Bool => "GLboolean",
            TypeTag::Enum => "GLenum",
            TypeTag::Ptr => "void *",
            TypeTag::PtrPtr => "void **",
            TypeTag::CharPtr => "const char *",
            TypeTag::Ident => "void *",
        }
    }
}

/// Strips a single leading address-of or dereference operator, if present.
#[must_use]
pub fn strip_operator(token: &str) -> (Option<char>, &str) {
    let mut chars = token.chars();
    match chars.next() {
        Some(c @ ('&' | '*')) => (Some(c), chars.as_str()),
        _ => (None, token),
    }
}

/// Recovers a coarse type for a token (spec §4.H step 4, §4.I cast
/// decoration).
#[must_use]
pub fn derive_type(token: &str) -> TypeTag {
    let (op, rest) = strip_operator(token);
    if op == Some('&') {
        return TypeTag::Ptr;
    }
    if rest.starts_with("(void**)") {
        return TypeTag::PtrPtr;
    }
    if rest.starts_with("(void*)") {
        return TypeTag::Ptr;
    }
    if rest.starts_with('"') {
        return TypeTag::CharPtr;
    }
    if rest == "GL_TRUE" || rest == "GL_FALSE" {
        return TypeTag::Bool;
    }
    if rest.starts_with("GL_") {
        return TypeTag::Enum;
    }
    if let Some(hex) = rest.strip_prefix("0x") {
        if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return TypeTag::UInt;
        }
    }
    if let Some(mantissa) = rest.strip_suffix('f') {
        if mantissa.parse::<f32>().is_ok() {
            return TypeTag::Float;
        }
    }
    if rest.parse::<i64>().is_ok() {
        return TypeTag::Int;
    }
    TypeTag::Ident
}

/// Whether `token` (after stripping `&`/trailing `[k]`) names a declared
/// process-lifetime global.
#[must_use]
pub fn is_known_global(token: &str, known_globals: &HashSet<String>) -> bool {
    let (_, rest) = strip_operator(token);
    let name = rest.split('[').next().unwrap_or(rest);
    known_globals.contains(name)
}

/// Builds a synthesized procedure's formal-parameter name (spec §4.H step
/// 4): `param_<mangled_type>_<index>`.
#[must_use]
pub fn formal_name(tag: TypeTag, index: usize) -> String {
    format!("param_{}_{index}", tag.word())
}

/// Recovers the declared type of a `param_<mangled_type>_<index>` name.
#[must_use]
pub fn type_of_formal_name(name: &str) -> Option<TypeTag> {
    let rest = name.strip_prefix("param_")?;
    let word = rest.rsplit_once('_').map_or(rest, |(word, _index)| word);
    TypeTag::from_word(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_classify_by_surface_form() {
        assert_eq!(derive_type("42"), TypeTag::Int);
        assert_eq!(derive_type("0x1f"), TypeTag::UInt);
        assert_eq!(derive_type("3.0f"), TypeTag::Float);
        assert_eq!(derive_type("GL_TRIANGLES"), TypeTag::Enum);
        assert_eq!(derive_type("GL_TRUE"), TypeTag::Bool);
        assert_eq!(derive_type("&id"), TypeTag::Ptr);
        assert_eq!(derive_type("(void*)0x0"), TypeTag::Ptr);
        assert_eq!(derive_type("id"), TypeTag::Ident);
    }

    #[test]
    fn known_global_membership_strips_operators_and_indices() {
        let mut globals = HashSet::new();
        globals.insert("g1".to_string());
        assert!(is_known_global("g1", &globals));
        assert!(is_known_global("&g1", &globals));
        assert!(is_known_global("g1[0]", &globals));
        assert!(!is_known_global("g2", &globals));
    }

    #[test]
    fn formal_names_embed_the_derived_type_word() {
        assert_eq!(formal_name(TypeTag::Int, 0), "param_int_0");
        assert_eq!(formal_name(TypeTag::Ptr, 2), "param_ptr_2");
    }

    #[test]
    fn formal_name_type_recovery_roundtrips() {
        for tag in [TypeTag::Int, TypeTag::UInt, TypeTag::Float, TypeTag::Bool, TypeTag::Enum, TypeTag::Ptr, TypeTag::PtrPtr, TypeTag::CharPtr, TypeTag::Ident] {
            let name = formal_name(tag, 5);
            assert_eq!(type_of_formal_name(&name), Some(tag));
        }
    }
}
