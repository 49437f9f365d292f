//! Crate-level error aggregation.
//!
//! Each module owns an `Error` enum describing its own failure modes; this
//! type composes them at the points where control crosses a module boundary,
//! the same way the teacher's `read::Error` wraps `bits::Error`.

use std::fmt;

use crate::{assets, deinline, emit, registry, trace, translate};

#[derive(Debug)]
pub enum Error {
    Registry(registry::Error),
    Trace(trace::Error),
    Assets(assets::Error),
    Translate(translate::Error),
    Deinline(deinline::Error),
    Emit(emit::Error),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Registry(e) => write!(f, "registry error: {e}"),
            Error::Trace(e) => write!(f, "trace error: {e}"),
            Error::Assets(e) => write!(f, "asset store error: {e}"),
            Error::Translate(e) => write!(f, "translate error: {e}"),
            Error::Deinline(e) => write!(f, "deinline error: {e}"),
            Error::Emit(e) => write!(f, "emit error: {e}"),
            Error::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Registry(e) => Some(e),
            Error::Trace(e) => Some(e),
            Error::Assets(e) => Some(e),
            Error::Translate(e) => Some(e),
            Error::Deinline(e) => Some(e),
            Error::Emit(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<registry::Error> for Error {
    fn from(e: registry::Error) -> Self {
        Error::Registry(e)
    }
}

impl From<trace::Error> for Error {
    fn from(e: trace::Error) -> Self {
        Error::Trace(e)
    }
}

impl From<assets::Error> for Error {
    fn from(e: assets::Error) -> Self {
        Error::Assets(e)
    }
}

impl From<translate::Error> for Error {
    fn from(e: translate::Error) -> Self {
        Error::Translate(e)
    }
}

impl From<deinline::Error> for Error {
    fn from(e: deinline::Error) -> Self {
        Error::Deinline(e)
    }
}

impl From<emit::Error> for Error {
    fn from(e: emit::Error) -> Self {
        Error::Emit(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
