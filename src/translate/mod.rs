//! Trace Translator (spec §4.E): the driver that turns decoded records into
//! a `Program`, consulting the Enumerant Registry, Symbol Tables, Asset
//! Store, and Shadow State along the way.

mod argument;
mod fixups;
mod insertions;

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::assets::{self, AssetStore};
use crate::program::{Program, SENTINEL_NON_CALL};
use crate::registry::Registry;
use crate::shadow::{Rect, ShadowState};
use crate::symbols::SymbolTables;
use crate::trace::{Argument, Payload, Record, TypeTag};

pub use fixups::IndexElemWidth;

#[derive(Debug)]
pub enum Error {
    UnsupportedShape { function: String, detail: String },
    UnknownElementType { function: String, value: u32 },
    Assets(assets::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedShape { function, detail } => {
                write!(f, "{function}: unsupported argument shape ({detail})")
            }
            Error::UnknownElementType { function, value } => {
                write!(f, "{function}: unknown element type 0x{value:x}")
            }
            Error::Assets(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Assets(e) => Some(e),
            _ => None,
        }
    }
}

impl From<assets::Error> for Error {
    fn from(e: assets::Error) -> Self {
        Error::Assets(e)
    }
}

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub context_filter: Option<HashSet<u32>>,
    pub float_asset_threshold: usize,
    pub int_asset_threshold: usize,
    pub assets_for_shaders: bool,
    pub force_null_texture_data: bool,
    pub max_frame_count: Option<usize>,
    pub max_draw_count: Option<usize>,
    pub emit_error_log_epilogue: bool,
    pub assets_dir: PathBuf,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        TranslateOptions {
            context_filter: None,
            float_asset_threshold: 4096,
            int_asset_threshold: 4096,
            assets_for_shaders: false,
            force_null_texture_data: false,
            max_frame_count: None,
            max_draw_count: None,
            emit_error_log_epilogue: false,
            assets_dir: PathBuf::from("assets"),
        }
    }
}

/// Per-argument translation state, borrowed fresh for each `translate_argument`
/// call (spec §4.E.3).
pub(crate) struct TranslateContext<'a> {
    pub registry: &'a Registry,
    pub symbols: &'a mut SymbolTables,
    pub assets: &'a mut AssetStore,
    pub options: &'a TranslateOptions,
    pub missing_enum_warnings: &'a mut usize,
    pub local_counter: &'a mut u32,
    pub global_counter: &'a mut u32,
    pub pending_index_width: Option<IndexElemWidth>,
    pub pending_attrib_index: Option<u32>,
}

impl TranslateContext<'_> {
    fn fresh_local_name(&mut self, prefix: &str) -> String {
        *self.local_counter += 1;
        format!("{prefix}{}", self.local_counter)
    }

    fn fresh_global_name(&mut self, prefix: &str) -> String {
        *self.global_counter += 1;
        format!("{prefix}{}", self.global_counter)
    }
}

fn raw_int(arg: &Argument, index: usize) -> Option<i64> {
    match &arg.payload {
        Payload::IntArr(v) => v.get(index).map(|&x| i64::from(x)),
        Payload::Int64Arr(v) => v.get(index).copied(),
        _ => None,
    }
}

pub struct Translator {
    options: TranslateOptions,
    registry: Registry,
    symbols: SymbolTables,
    assets: AssetStore,
    shadow: ShadowState,
    program: Program,
    local_counter: u32,
    global_counter: u32,
    missing_enum_warnings: usize,
    active_context: Option<u32>,
    draw_count: usize,
    finished: bool,
}

impl Translator {
    #[must_use]
    pub fn new(registry: Registry, options: TranslateOptions) -> Self {
        let mut symbols = SymbolTables::new();
        symbols.populate_global(&registry);
        let assets = AssetStore::new(options.assets_dir.clone());
        Translator {
            options,
            registry,
            symbols,
            assets,
            shadow: ShadowState::new(),
            program: Program::new(),
            local_counter: 0,
            global_counter: 0,
            missing_enum_warnings: 0,
            active_context: None,
            draw_count: 0,
            finished: false,
        }
    }

    #[must_use]
    pub fn into_program(self) -> Program {
        if self.missing_enum_warnings > 0 {
            tracing::warn!(
                "{} argument(s) emitted as hex literals for unresolved enums",
                self.missing_enum_warnings
            );
        }
        self.program
    }

    fn push_raw_line(&mut self, line: impl Into<String>) {
        if self.program.current_frame_index().is_none() {
            self.program.begin_frame();
        }
        let unit = self.program.alphabet.intern(&line.into());
        let frame = self.program.frames.last_mut().expect("frame just ensured");
        frame.push(unit, vec![SENTINEL_NON_CALL.to_string()]);
    }

    fn end_frame_and_maybe_stop(&mut self) {
        if let Some(max) = self.options.max_frame_count {
            if self.program.frames.len() >= max {
                self.finished = true;
                return;
            }
        }
        self.program.begin_frame();
    }

    /// Consumes one decoded record (spec §4.E "Per-record control flow").
    pub fn handle_record(&mut self, record: Record) -> Result<(), Error> {
        if self.finished {
            return Ok(());
        }
        if let Some(filter) = &self.options.context_filter {
            if !filter.contains(&record.context_id) {
                return Ok(());
            }
        }

        let last_is_array = record.args.last().is_some_and(|a| a.is_array);
        if fixups::is_unconditionally_dropped(&record.function)
            || fixups::is_dropped_scalar_vertex_attrib(&record.function, last_is_array)
        {
            tracing::warn!("{}: dropped by fix-up catalogue", record.function);
            return Ok(());
        }

        if record.function == "eglSwapBuffers" {
            self.end_frame_and_maybe_stop();
            return Ok(());
        }

        self.translate_and_emit(record)
    }

    fn translate_and_emit(&mut self, mut record: Record) -> Result<(), Error> {
        if record.function == "glUseProgram" {
            if let Some(id) = record.args.first().and_then(|a| raw_int(a, 0)) {
                self.symbols.swap_active_uniforms(id as u32);
            }
        }

        if record.function == "eglMakeCurrent" {
            if let Some(id) = record.args.last().and_then(|a| raw_int(a, 0)) {
                let new_context = id as u32;
                if let Some(previous) = self.active_context {
                    if previous != new_context {
                        self.symbols.evict_context(previous);
                    }
                }
                self.symbols.restore_context(new_context);
                self.active_context = Some(new_context);
            }
        }

        if record.function == "glShaderSource" {
            if let Some(arg) = record.args.get_mut(2) {
                arg.is_array = false;
            }
        }

        for index in 0..record.args.len() {
            if let Some(fixup) = fixups::array_ness_fixup(&record.function, index) {
                let arg = &mut record.args[index];
                arg.is_array = true;
                if fixup == fixups::ArrayNessFixup::MarkArrayAsVoid {
                    arg.type_tag = TypeTag::Void;
                }
            }
        }

        let mut pending_index_width = None;
        if record.function == "glDrawElements" {
            self.draw_count += 1;
            if let Some(max) = self.options.max_draw_count {
                if self.draw_count > max {
                    return Ok(());
                }
            }
            if let Some(type_value) = record.args.get(2).and_then(|a| raw_int(a, 0)) {
                pending_index_width = Some(fixups::IndexElemWidth::from_gl_enum(type_value as u32).ok_or(
                    Error::UnknownElementType {
                        function: record.function.clone(),
                        value: type_value as u32,
                    },
                )?);
            }
        }

        if matches!(record.function.as_str(), "glVertexAttribPointer" | "glVertexAttribPointerData") {
            if let Some(type_value) = record.args.get(2).and_then(|a| raw_int(a, 0)) {
                if !fixups::is_whitelisted_vertex_attrib_type(type_value as u32) {
                    return Err(Error::UnsupportedShape {
                        function: record.function.clone(),
                        detail: format!("element type 0x{type_value:x} is not whitelisted"),
                    });
                }
            }
        }

        if fixups::allows_null_texture_data(&record.function) || self.options.force_null_texture_data {
            if let Some(arg) = record.args.last_mut() {
                let absent = matches!(&arg.payload, Payload::RawBytes(b) if b.is_empty())
                    && arg.is_array;
                if (absent || self.options.force_null_texture_data) && fixups::allows_null_texture_data(&record.function) {
                    tracing::warn!(
                        "{}: texture data payload missing, rewriting to NULL",
                        record.function
                    );
                    *arg = Argument::scalar(Payload::Int64Arr(vec![0]), TypeTag::Void);
                }
            }
        }

        let emitted_function = self.rewrite_function_name(&record);

        let attrib_index = if record.function == "glVertexAttribPointerData" {
            record.args.first().and_then(|a| raw_int(a, 0)).map(|v| v as u32)
        } else {
            None
        };

        let mut token_args = Vec::with_capacity(record.args.len().max(1));
        let mut extra_global_lines = Vec::new();
        let mut extra_preamble_lines = Vec::new();

        for (index, arg) in record.args.iter().enumerate() {
            let mut ctx = TranslateContext {
                registry: &self.registry,
                symbols: &mut self.symbols,
                assets: &mut self.assets,
                options: &self.options,
                missing_enum_warnings: &mut self.missing_enum_warnings,
                local_counter: &mut self.local_counter,
                global_counter: &mut self.global_counter,
                pending_index_width,
                pending_attrib_index: attrib_index,
            };
            let emission = argument::translate_argument(&mut ctx, &record.function, index, arg)?;
            token_args.push(emission.token);
            extra_global_lines.extend(emission.global_lines);
            extra_preamble_lines.extend(emission.preamble_lines);
        }

        if record.function == "glViewport" {
            if let (Some(x), Some(y), Some(w), Some(h)) = (
                record.args.first().and_then(|a| raw_int(a, 0)),
                record.args.get(1).and_then(|a| raw_int(a, 0)),
                record.args.get(2).and_then(|a| raw_int(a, 0)),
                record.args.get(3).and_then(|a| raw_int(a, 0)),
            ) {
                self.shadow.set_viewport(Rect {
                    x: x as i32,
                    y: y as i32,
                    w: w as i32,
                    h: h as i32,
                });
            }
        }
        if record.function == "glScissor" {
            if let (Some(x), Some(y), Some(w), Some(h)) = (
                record.args.first().and_then(|a| raw_int(a, 0)),
                record.args.get(1).and_then(|a| raw_int(a, 0)),
                record.args.get(2).and_then(|a| raw_int(a, 0)),
                record.args.get(3).and_then(|a| raw_int(a, 0)),
            ) {
                self.shadow.set_scissor(Rect {
                    x: x as i32,
                    y: y as i32,
                    w: w as i32,
                    h: h as i32,
                });
            }
        }
        if record.function == "glBindFramebuffer" {
            if let Some(id) = record.args.get(1).and_then(|a| raw_int(a, 0)) {
                self.shadow.bind_framebuffer(id as u32);
            }
        }

        self.program.globals.extend(extra_global_lines);
        for line in extra_preamble_lines {
            self.push_raw_line(line);
        }

        if token_args.is_empty() {
            token_args = argument::void_call_args();
        }

        let return_insertion = insertions::insertion_for(&record.function);
        let mut assigned_global: Option<String> = None;
        if let Some(insertion) = return_insertion {
            let trace_id = match insertion.source {
                insertions::InsertionSource::Return => {
                    record.return_value.as_ref().and_then(|r| raw_int(r, 0))
                }
                insertions::InsertionSource::Arg(i) => record.args.get(i).and_then(|a| raw_int(a, 0)),
            };
            if let Some(trace_id) = trace_id {
                self.global_counter += 1;
                let global_name = format!("g{}", self.global_counter);
                self.program
                    .globals
                    .push(format!("static unsigned int {global_name};"));
                let scope = insertion
                    .scope_arg
                    .and_then(|i| record.args.get(i))
                    .and_then(|a| raw_int(a, 0))
                    .map(|v| v as u32);
                self.symbols
                    .insert(insertion.namespace, scope, trace_id as u32, global_name.clone());
                assigned_global = Some(global_name);
            }
        } else if let Some(namespace) = insertions::array_insertion_namespace(&record.function) {
            if let Some(Payload::IntArr(ids)) = record.return_value.as_ref().map(|r| &r.payload) {
                for (i, &id) in ids.iter().enumerate() {
                    let global_name = {
                        self.global_counter += 1;
                        format!("g{}", self.global_counter)
                    };
                    self.program
                        .globals
                        .push(format!("static unsigned int {global_name}[1];"));
                    self.symbols.insert(namespace, None, id as u32, format!("{global_name}[0]"));
                    if i == 0 {
                        assigned_global = Some(global_name);
                    }
                }
            }
        }

        let call_line = if let Some(global) = &assigned_global {
            format!("{global} = {emitted_function}({});", token_args.join(", "))
        } else {
            format!("{emitted_function}({});", token_args.join(", "))
        };
        self.push_raw_line(call_line);

        if record.function == "glBindFramebuffer" {
            let restore_suffix = if self.shadow.is_default_framebuffer() {
                "Scaled"
            } else {
                ""
            };
            self.push_raw_line(format!(
                "glViewport{restore_suffix}({}, {}, {}, {});",
                self.shadow.viewport.x, self.shadow.viewport.y, self.shadow.viewport.w, self.shadow.viewport.h
            ));
            self.push_raw_line(format!(
                "glScissor{restore_suffix}({}, {}, {}, {});",
                self.shadow.scissor.x, self.shadow.scissor.y, self.shadow.scissor.w, self.shadow.scissor.h
            ));
        }

        if self.options.emit_error_log_epilogue {
            self.push_raw_line("LOGI(\"0x%x\", glGetError());".to_string());
        }

        Ok(())
    }

    /// Function-name rewrites driven by shadow state or a fixed runtime
    /// contract, independent of argument translation (spec §4.E.2).
    fn rewrite_function_name(&self, record: &Record) -> String {
        match record.function.as_str() {
            "glViewport" | "glScissor" if self.shadow.is_default_framebuffer() => {
                format!("{}Scaled", record.function)
            }
            "glEnable" | "glDisable"
                if record.args.first().and_then(|a| raw_int(a, 0)) == Some(i64::from(fixups::GL_DITHER)) =>
            {
                format!("{}Overridable", record.function)
            }
            "eglCreateContext" => "eglCreateContextOverridden".to_string(),
            "eglMakeCurrent" => "eglMakeCurrentOverridden".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Argument, Payload, TypeTag};
    use std::collections::HashMap;

    fn minimal_record(function: &str, context: u32, args: Vec<Argument>, ret: Option<Argument>) -> Record {
        Record {
            function: function.to_string(),
            context_id: context,
            args,
            return_value: ret,
        }
    }

    #[test]
    fn minimal_translate_scenario() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = TranslateOptions::default();
        options.assets_dir = tmp.path().join("assets");
        let mut registry = Registry::default();
        registry.parameter_groups.insert(
            "glDeleteShader".to_string(),
            HashMap::from([(0usize, "shaders".to_string())]),
        );
        let mut translator = Translator::new(registry, options);

        translator
            .handle_record(minimal_record(
                "glCreateShader",
                0,
                vec![Argument::scalar(Payload::IntArr(vec![0x8B31]), TypeTag::Enum)],
                Some(Argument::scalar(Payload::IntArr(vec![42]), TypeTag::Int)),
            ))
            .unwrap();
        translator
            .handle_record(minimal_record(
                "glDeleteShader",
                0,
                vec![Argument::scalar(Payload::IntArr(vec![42]), TypeTag::Int)],
                None,
            ))
            .unwrap();
        translator
            .handle_record(minimal_record("eglSwapBuffers", 0, vec![], None))
            .unwrap();

        let program = translator.into_program();
        assert_eq!(program.globals.len(), 1);
        assert!(program.globals[0].contains("static unsigned int g1;"));
        assert_eq!(program.frames.len(), 2); // closed frame 0, plus the fresh frame opened after it
        let frame0 = &program.frames[0];
        let texts: Vec<&str> = frame0
            .symbols
            .iter()
            .map(|&unit| program.alphabet.name(unit))
            .collect();
        assert!(texts.iter().any(|t| t.contains("g1 = glCreateShader")));
        assert!(texts.iter().any(|t| t.contains("glDeleteShader(g1)")));
    }

    #[test]
    fn index_buffer_type_split_scenario() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = TranslateOptions::default();
        options.assets_dir = tmp.path().join("assets");
        let mut translator = Translator::new(Registry::default(), options);

        translator
            .handle_record(minimal_record(
                "glDrawElements",
                0,
                vec![
                    Argument::scalar(Payload::IntArr(vec![0x0004]), TypeTag::Enum), // GL_TRIANGLES
                    Argument::scalar(Payload::IntArr(vec![3]), TypeTag::Int),
                    Argument::scalar(Payload::IntArr(vec![0x1403]), TypeTag::Enum), // GL_UNSIGNED_SHORT
                    Argument::array(Payload::IntArr(vec![0, 1, 2]), TypeTag::Int),
                ],
                None,
            ))
            .unwrap();

        let program = translator.into_program();
        assert!(program
            .globals
            .iter()
            .any(|g| g.contains("GLushort") && g.contains("{0, 1, 2}")));
    }

    #[test]
    fn asset_dedup_scenario() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = TranslateOptions::default();
        options.assets_dir = tmp.path().join("assets");
        options.int_asset_threshold = 16;
        let mut translator = Translator::new(Registry::default(), options);
        let payload = vec![7u8; 4096];

        for _ in 0..2 {
            translator
                .handle_record(minimal_record(
                    "glBufferData",
                    0,
                    vec![
                        Argument::scalar(Payload::IntArr(vec![0x8892]), TypeTag::Enum),
                        Argument::scalar(Payload::IntArr(vec![4096]), TypeTag::Int),
                        Argument::array(Payload::RawBytes(payload.clone()), TypeTag::Void),
                        Argument::scalar(Payload::IntArr(vec![0x88E4]), TypeTag::Enum),
                    ],
                    None,
                ))
                .unwrap();
            translator
                .handle_record(minimal_record("eglSwapBuffers", 0, vec![], None))
                .unwrap();
        }

        let assets_dir = tmp.path().join("assets");
        let entries: Vec<_> = std::fs::read_dir(&assets_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn dropped_array_ness_is_resynthesized_for_catalogued_functions() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = TranslateOptions::default();
        options.assets_dir = tmp.path().join("assets");
        let mut translator = Translator::new(Registry::default(), options);

        // The capture sent a plain scalar int for the result slot; the
        // fix-up must mark it as an array so it renders as an addressable
        // out-param buffer instead of a bare integer.
        translator
            .handle_record(minimal_record(
                "glGetVertexAttribiv",
                0,
                vec![
                    Argument::scalar(Payload::IntArr(vec![0]), TypeTag::Int),
                    Argument::scalar(Payload::IntArr(vec![0x8645]), TypeTag::Enum),
                    Argument::scalar(Payload::IntArr(vec![0]), TypeTag::Int),
                ],
                None,
            ))
            .unwrap();

        let program = translator.into_program();
        assert!(program.globals.iter().any(|g| g.contains("g_idx") || g.contains("GLuint")));
    }
}
