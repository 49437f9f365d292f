//! Translates recorded GL/EGL traces into replayable source, and deinlines
//! the emitted code by factoring out repeated call sequences into procedures.

pub mod assets;
pub mod cli;
pub mod deinline;
pub mod emit;
pub mod error;
pub mod program;
pub mod registry;
pub mod shadow;
pub mod symbols;
pub mod trace;
pub mod translate;

pub use error::Error;
