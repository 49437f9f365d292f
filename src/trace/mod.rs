pub mod reader;
pub mod record;
pub mod wire;

pub use reader::{Error, TraceReader};
pub use record::{Argument, Payload, Record, TypeTag};
pub use wire::{DecodeError, FunctionTable, LiteDecoder, RecordDecoder};
