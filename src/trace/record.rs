//! Record and Argument sum types (spec §3, §9 "dynamic tagged records").

/// Scalar/array payload carried by one argument. Exactly one variant is
/// populated per argument, matching the source's one-of-many-vectors shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    IntArr(Vec<i32>),
    Int64Arr(Vec<i64>),
    FloatArr(Vec<f32>),
    BoolArr(Vec<bool>),
    /// A character-string vector, stored as raw bytes (no embedded NUL
    /// assumed; callers append one when emitting a C string literal).
    CharArr(Vec<u8>),
    RawBytes(Vec<u8>),
}

impl Payload {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Payload::IntArr(v) => v.len(),
            Payload::Int64Arr(v) => v.len(),
            Payload::FloatArr(v) => v.len(),
            Payload::BoolArr(v) => v.len(),
            Payload::CharArr(v) => v.len(),
            Payload::RawBytes(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte size of the payload as it would be written to an asset file.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self {
            Payload::IntArr(v) => v.len() * 4,
            Payload::Int64Arr(v) => v.len() * 8,
            Payload::FloatArr(v) => v.len() * 4,
            Payload::BoolArr(v) => v.len(),
            Payload::CharArr(v) => v.len(),
            Payload::RawBytes(v) => v.len(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            Payload::IntArr(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Payload::Int64Arr(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Payload::FloatArr(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Payload::BoolArr(v) => v.iter().map(|&b| u8::from(b)).collect(),
            Payload::CharArr(v) | Payload::RawBytes(v) => v.clone(),
        }
    }
}

/// The type tag carried alongside a payload, independent of which payload
/// variant is populated (a `RawBytes` payload can still be tagged `CHAR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Enum,
    Void,
    Int,
    Float,
    Bool,
    Char,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub payload: Payload,
    pub type_tag: TypeTag,
    pub is_array: bool,
}

impl Argument {
    #[must_use]
    pub fn scalar(payload: Payload, type_tag: TypeTag) -> Self {
        Argument {
            payload,
            type_tag,
            is_array: false,
        }
    }

    #[must_use]
    pub fn array(payload: Payload, type_tag: TypeTag) -> Self {
        Argument {
            payload,
            type_tag,
            is_array: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub function: String,
    pub context_id: u32,
    pub args: Vec<Argument>,
    pub return_value: Option<Argument>,
}
