//! Command-line surface (spec §6 "CLI surface"): `translate-trace` decodes a
//! trace into emitted source; `deinline` takes that emitted source back in
//! and factors out repeated call sequences.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::deinline::{self, parse, DeinlineOptions};
use crate::emit;
use crate::error::Error;
use crate::program::Program;
use crate::registry::{self, Registry};
use crate::trace::{LiteDecoder, TraceReader};
use crate::translate::{TranslateOptions, Translator};

#[derive(Debug, Parser)]
#[command(name = "glreplay", about = "Translates GL/EGL traces into replayable source and deinlines it")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode a trace and emit replayable source plus assets.
    TranslateTrace(TranslateTraceArgs),
    /// Deinline an already-emitted C-like source file.
    Deinline(DeinlineArgs),
}

#[derive(Debug, Parser)]
pub struct TranslateTraceArgs {
    /// Path to the recorded trace (optionally gzip-compressed).
    #[arg(long)]
    pub trace: PathBuf,
    /// API description document driving the Enumerant Registry.
    #[arg(long)]
    pub registry: PathBuf,
    /// Feature profile to restrict the registry to (e.g. "gles2").
    #[arg(long)]
    pub feature: Option<String>,
    /// Directory receiving the emitted source file and asset files.
    #[arg(long)]
    pub out_dir: PathBuf,
    /// Comma-separated context ids to keep; records on other contexts are
    /// dropped.
    #[arg(long, value_delimiter = ',')]
    pub context_filter: Option<Vec<u32>>,
    #[arg(long, default_value_t = 4096)]
    pub float_asset_threshold: usize,
    #[arg(long, default_value_t = 4096)]
    pub int_asset_threshold: usize,
    #[arg(long)]
    pub assets_for_shaders: bool,
    #[arg(long)]
    pub force_null_texture_data: bool,
    #[arg(long)]
    pub max_frame_count: Option<usize>,
    #[arg(long)]
    pub max_draw_count: Option<usize>,
    #[arg(long)]
    pub emit_error_log_epilogue: bool,
    /// Skip malformed records after the first good one instead of stopping
    /// (spec §9 open question: "truncated traces").
    #[arg(long)]
    pub skip_malformed: bool,
}

#[derive(Debug, Parser)]
pub struct DeinlineArgs {
    /// Path to an already-emitted C-like source file (`translate-trace`'s
    /// output).
    #[arg(long)]
    pub input: PathBuf,
    /// Directory receiving the deinlined source file.
    #[arg(long)]
    pub out_dir: PathBuf,
    #[arg(long, default_value_t = 64)]
    pub window_size: usize,
    #[arg(long, default_value_t = 32)]
    pub start_stride: usize,
    #[arg(long, default_value_t = 32)]
    pub size_stride: usize,
    #[arg(long, default_value_t = 10_000)]
    pub iteration_cap: usize,
}

fn load_registry(path: &PathBuf, feature: Option<&str>, cache_dir: &std::path::Path) -> Result<Registry, Error> {
    let document = fs::read_to_string(path)?;
    Ok(registry::cache::load_or_parse(&document, feature, cache_dir)?)
}

fn translate(args: &TranslateTraceArgs) -> Result<Program, Error> {
    let cache_dir = args.out_dir.join(".registry-cache");
    let registry = load_registry(&args.registry, args.feature.as_deref(), &cache_dir)?;

    let options = TranslateOptions {
        context_filter: args
            .context_filter
            .as_ref()
            .map(|ids| ids.iter().copied().collect::<HashSet<_>>()),
        float_asset_threshold: args.float_asset_threshold,
        int_asset_threshold: args.int_asset_threshold,
        assets_for_shaders: args.assets_for_shaders,
        force_null_texture_data: args.force_null_texture_data,
        max_frame_count: args.max_frame_count,
        max_draw_count: args.max_draw_count,
        emit_error_log_epilogue: args.emit_error_log_epilogue,
        assets_dir: args.out_dir.join("assets"),
    };

    let decoder = Box::new(LiteDecoder::with_standard_functions());
    let reader = TraceReader::open(&args.trace, decoder)?.with_skip_malformed(args.skip_malformed);

    let mut translator = Translator::new(registry, options);
    for record in reader {
        translator.handle_record(record?)?;
    }
    Ok(translator.into_program())
}

/// Runs the parsed command to completion.
pub fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Command::TranslateTrace(args) => {
            fs::create_dir_all(&args.out_dir)?;
            let program = translate(&args)?;
            let out_path = args.out_dir.join("replay.c");
            emit::write_to(&program, &out_path)?;
            tracing::info!("wrote {} ({} frame(s))", out_path.display(), program.frames.len());
        }
        Command::Deinline(args) => {
            fs::create_dir_all(&args.out_dir)?;
            let source = fs::read_to_string(&args.input)?;
            let mut program = parse::parse_program(&source).map_err(deinline::Error::from)?;
            let options = DeinlineOptions {
                window_size: args.window_size,
                start_stride: args.start_stride,
                size_stride: args.size_stride,
                iteration_cap: args.iteration_cap,
            };
            let extractions = deinline::deinline(&mut program, &options)?;
            tracing::info!("deinlined {extractions} procedure(s)");
            let out_path = args.out_dir.join("replay.c");
            emit::write_to(&program, &out_path)?;
            tracing::info!("wrote {}", out_path.display());
        }
    }
    Ok(())
}
