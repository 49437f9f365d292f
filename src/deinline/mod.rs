//! The deinliner (spec §4.G, §4.H): a dictionary-compression pass over an
//! [`Program`], factoring repeated call sequences into synthesized
//! procedures via a sliding-window suffix-array histogram.

use std::collections::HashSet;
use std::fmt;

use crate::program::Program;

pub mod histogram;
pub mod mangled;
pub mod parse;
pub mod replacer;

#[derive(Debug)]
pub enum Error {
    Replacer(replacer::Error),
    Parse(parse::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Replacer(err) => write!(f, "{err}"),
            Error::Parse(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Replacer(err) => Some(err),
            Error::Parse(err) => Some(err),
        }
    }
}

impl From<replacer::Error> for Error {
    fn from(err: replacer::Error) -> Self {
        Error::Replacer(err)
    }
}

impl From<parse::Error> for Error {
    fn from(err: parse::Error) -> Self {
        Error::Parse(err)
    }
}

/// Sliding-window parameters (spec §4.G "Sliding window", §6 CLI surface).
#[derive(Debug, Clone)]
pub struct DeinlineOptions {
    /// Initial window size, in frames.
    pub window_size: usize,
    /// How far `start` advances once a window is exhausted.
    pub start_stride: usize,
    /// How much `size` grows once a window is exhausted.
    pub size_stride: usize,
    /// Hard cap on outer-loop iterations (spec §9: the deinliner runs to a
    /// fixed point or this cap, whichever comes first).
    pub iteration_cap: usize,
}

impl Default for DeinlineOptions {
    fn default() -> Self {
        DeinlineOptions {
            window_size: 64,
            start_stride: 32,
            size_stride: 32,
            iteration_cap: 10_000,
        }
    }
}

/// Pulls every declared global's bare name out of `program.globals`'
/// declaration lines, for the replacer's known-global aliasing check.
fn known_globals_from(program: &Program) -> HashSet<String> {
    program
        .globals
        .iter()
        .filter_map(|decl| extract_global_name(decl))
        .collect()
}

fn extract_global_name(decl: &str) -> Option<String> {
    let decl = decl.trim().trim_end_matches(';');
    let head = decl.split('=').next().unwrap_or(decl).trim();
    let head = head.split('[').next().unwrap_or(head).trim();
    head.split_whitespace()
        .last()
        .map(|token| token.trim_start_matches('*').to_string())
}

/// Runs the sliding-window outer loop to a fixed point (or the iteration
/// cap), outlining every profitable substring it finds. Returns the number
/// of procedures synthesized.
pub fn deinline(program: &mut Program, options: &DeinlineOptions) -> Result<usize, Error> {
    let mut extractions = 0;
    let mut start = 0usize;
    let mut size = options.window_size.max(1);
    let mut iterations = 0usize;

    while start < program.frames.len() && iterations < options.iteration_cap {
        iterations += 1;

        let end = (start + size).min(program.frames.len());
        let window: Vec<&[u16]> = program.frames[start..end].iter().map(|f| f.symbols.as_slice()).collect();

        let Some(winner) = histogram::find_winner(&window) else {
            start += options.start_stride.max(1);
            size += options.size_stride;
            continue;
        };

        let known_globals = known_globals_from(program);
        if replacer::apply(program, &winner, &known_globals)? {
            extractions += 1;
            // Re-scan the same window: shrinking it may expose a further
            // profitable substring before the window advances.
            continue;
        }

        start += options.start_stride.max(1);
        size += options.size_stride;
    }

    Ok(extractions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_line(program: &mut Program, frame: usize, name: &str, args: Vec<&str>) {
        let unit = program.alphabet.intern(name);
        program.frames[frame].push(unit, args.into_iter().map(str::to_string).collect());
    }

    #[test]
    fn extracts_a_repeated_call_sequence_across_frames() {
        let mut program = Program::new();
        for _ in 0..3 {
            let frame = program.begin_frame();
            push_line(&mut program, frame, "glBindTexture", vec!["GL_TEXTURE_2D", "t1"]);
            push_line(&mut program, frame, "glTexParameteri", vec!["GL_TEXTURE_2D", "GL_TEXTURE_MIN_FILTER"]);
            push_line(&mut program, frame, "glDrawArrays", vec!["GL_TRIANGLES", "0", "3"]);
        }

        let before = program.total_code_units();
        let options = DeinlineOptions {
            window_size: 3,
            start_stride: 1,
            size_stride: 0,
            iteration_cap: 100,
        };
        let extractions = deinline(&mut program, &options).unwrap();
        assert!(extractions >= 1);
        assert!(program.total_code_units() <= before);
        assert_eq!(program.procedures.len(), extractions);
    }

    #[test]
    fn empty_program_terminates_immediately() {
        let mut program = Program::new();
        let extractions = deinline(&mut program, &DeinlineOptions::default()).unwrap();
        assert_eq!(extractions, 0);
    }

    #[test]
    fn global_name_extraction_handles_arrays_and_scalars() {
        assert_eq!(extract_global_name("static unsigned int g1;"), Some("g1".to_string()));
        assert_eq!(
            extract_global_name("static GLushort g_idx1[3] = {0, 1, 2};"),
            Some("g_idx1".to_string())
        );
    }

    #[test]
    fn single_instruction_frames_never_extract() {
        let mut program = Program::new();
        for _ in 0..3 {
            let frame = program.begin_frame();
            push_line(&mut program, frame, "glClear", vec!["GL_COLOR_BUFFER_BIT"]);
        }
        let extractions = deinline(&mut program, &DeinlineOptions::default()).unwrap();
        assert_eq!(extractions, 0);
    }
}
