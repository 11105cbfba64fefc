// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Replay source emission
//!
//! Turns call records into lines of the replay program. The emitted text is
//! recompiled and re-executed as source, so literal formatting must
//! round-trip bit-exactly (float signs, NaN, infinities).

use gles::{enum_name, ContextId, EntryPoint};

use crate::binary_data::BinaryDataStore;
use crate::call::{CallRecord, ParamValue};

/// Calls per generated function before the emitter splits it into numbered
/// parts. Exists purely to keep generated-function size within compiler
/// limits; splitting never changes execution order.
pub const MAX_CALLS_PER_FUNCTION: usize = 1000;

/// Strings at most this long (and single-line) are inlined as quoted
/// literals.
pub const MAX_INLINE_STRING_LEN: usize = 64;

/// Strings at most this long are hoisted to named multi-line constants;
/// anything longer goes to the binary arena.
pub const MAX_HOISTED_STRING_LEN: usize = 16 * 1024;

/// One emitted function: a name and its body text.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedFunction {
    pub name: String,
    pub body: String,
}

/// Format a float for replay source.
///
/// Infinities print as signed `INFINITY`, NaN as `NAN`, and zero always
/// carries an explicit decimal point so the `+0.0`/`-0.0` sign survives
/// recompilation.
pub fn format_float(value: f32) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "INFINITY".to_string()
        } else {
            "-INFINITY".to_string()
        }
    } else if value == 0.0 {
        if value.is_sign_negative() {
            "-0.000000".to_string()
        } else {
            "0.000000".to_string()
        }
    } else {
        // Shortest representation that round-trips exactly.
        format!("{value:?}")
    }
}

/// Serializes call records to replay text, hoisting long strings and
/// accounting for the scratch-buffer high-water mark.
pub struct ReplayEmitter {
    max_calls_per_function: usize,
    string_constants: Vec<String>,
    max_scratch_size: usize,
}

impl ReplayEmitter {
    pub fn new() -> Self {
        Self {
            max_calls_per_function: MAX_CALLS_PER_FUNCTION,
            string_constants: Vec::new(),
            max_scratch_size: 0,
        }
    }

    #[cfg(test)]
    fn with_split_threshold(max_calls_per_function: usize) -> Self {
        Self {
            max_calls_per_function,
            ..Self::new()
        }
    }

    /// Worst-case scratch buffer size observed across all emitted calls,
    /// reported to the harness via the init function.
    pub fn max_scratch_size(&self) -> usize {
        self.max_scratch_size
    }

    /// Emit one call as a line of replay source.
    pub fn emit_call(&mut self, record: &CallRecord, binary: &mut BinaryDataStore) -> String {
        match record.entry {
            EntryPoint::Comment => {
                return format!("// {}", record.name());
            }
            EntryPoint::ValidationCheckpoint => {
                let state = record
                    .params
                    .first()
                    .and_then(|p| match &p.value {
                        ParamValue::String(s) => Some(s.as_str()),
                        _ => None,
                    })
                    .unwrap_or("");
                return format!(
                    "VALIDATE_CHECKPOINT({});",
                    self.format_string(state, binary)
                );
            }
            EntryPoint::UpdateResourceHandle => {
                let Some(ParamValue::Handle { ty, id }) = record.param("handle") else {
                    unreachable!("UpdateResourceHandle record without a handle parameter");
                };
                let index = match record.param("readIndex") {
                    Some(ParamValue::Uint(i)) => *i,
                    _ => 0,
                };
                return format!("UpdateResourceHandle({}, {id}, {index});", ty.map_name());
            }
            _ => {}
        }

        let mut args = Vec::with_capacity(record.params.len());
        for param in &record.params {
            args.push(self.format_param(&param.value, binary));
        }

        let prefix = match &record.return_value {
            ParamValue::Handle { ty, id } => format!("{}[{id}] = ", ty.map_name()),
            _ => String::new(),
        };

        format!("{prefix}{}({});", record.entry.name(), args.join(", "))
    }

    fn format_param(&mut self, value: &ParamValue, binary: &mut BinaryDataStore) -> String {
        match value {
            ParamValue::Void => String::new(),
            ParamValue::Boolean(true) => "GL_TRUE".to_string(),
            ParamValue::Boolean(false) => "GL_FALSE".to_string(),
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Uint(v) => format!("{v}u"),
            ParamValue::Int64(v) => v.to_string(),
            ParamValue::Uint64(v) => format!("{v}u"),
            ParamValue::Float(v) => format_float(*v),
            ParamValue::Enum { group, value } => match enum_name(*group, *value) {
                Some(name) => name.to_string(),
                None => format!("0x{value:X}"),
            },
            ParamValue::Bitfield(v) => format!("0x{v:X}"),
            ParamValue::Handle { ty, id } => {
                if *id == 0 {
                    "0".to_string()
                } else {
                    format!("{}[{id}]", ty.map_name())
                }
            }
            ParamValue::EnumArray { group, values } => {
                let elems: Vec<String> = values
                    .iter()
                    .map(|v| match enum_name(*group, *v) {
                        Some(name) => name.to_string(),
                        None => format!("0x{v:X}"),
                    })
                    .collect();
                format!("(const GLenum[]){{{}}}", elems.join(", "))
            }
            ParamValue::String(s) => self.format_string(s, binary),
            ParamValue::BinaryData { offset, .. } => format!("GetBinaryData({offset})"),
            ParamValue::HandleArray {
                ty,
                ids,
                client_array,
            } => {
                if *client_array {
                    // Out array awaiting late resolution through the scratch
                    // readback buffer.
                    let size = ids.len() * std::mem::size_of::<u32>();
                    if size > self.max_scratch_size {
                        self.max_scratch_size = size;
                    }
                    "(GLuint *)gReadBuffer".to_string()
                } else {
                    let elems: Vec<String> = ids
                        .iter()
                        .map(|id| {
                            if *id == 0 {
                                "0".to_string()
                            } else {
                                format!("{}[{id}]", ty.map_name())
                            }
                        })
                        .collect();
                    format!("(const GLuint[]){{{}}}", elems.join(", "))
                }
            }
            ParamValue::ScratchBuffer { size } => {
                if *size > self.max_scratch_size {
                    self.max_scratch_size = *size;
                }
                "gReadBuffer".to_string()
            }
        }
    }

    fn format_string(&mut self, s: &str, binary: &mut BinaryDataStore) -> String {
        if s.len() <= MAX_INLINE_STRING_LEN && !s.contains('\n') {
            format!("\"{}\"", escape_string(s))
        } else if s.len() <= MAX_HOISTED_STRING_LEN {
            let name = format!("kString{}", self.string_constants.len());
            self.string_constants.push(s.to_string());
            name
        } else {
            let offset = binary.append(s.as_bytes());
            format!("(const char *)GetBinaryData({offset})")
        }
    }

    /// Source text for all hoisted string constants, emitted once ahead of
    /// the functions referencing them.
    pub fn string_constants_source(&self) -> String {
        let mut out = String::new();
        for (i, s) in self.string_constants.iter().enumerate() {
            out.push_str(&format!("const char kString{i}[] =\n"));
            let mut lines = s.split('\n').peekable();
            while let Some(line) = lines.next() {
                let terminator = if lines.peek().is_some() { "\\n" } else { "" };
                out.push_str(&format!("    \"{}{}\"\n", escape_string(line), terminator));
            }
            out.push_str(";\n");
        }
        out
    }

    /// Serialize `calls` into one named function, splitting into numbered
    /// parts with an in-order dispatcher when the call count exceeds the
    /// split threshold.
    pub fn write_call_function(
        &mut self,
        name: &str,
        calls: &[CallRecord],
        binary: &mut BinaryDataStore,
    ) -> Vec<EmittedFunction> {
        if calls.len() <= self.max_calls_per_function {
            return vec![EmittedFunction {
                name: name.to_string(),
                body: self.function_body(calls, binary),
            }];
        }

        let mut functions = Vec::new();
        let mut dispatcher = String::new();
        for (i, chunk) in calls.chunks(self.max_calls_per_function).enumerate() {
            let part_name = format!("{name}Part{}", i + 1);
            dispatcher.push_str(&format!("    {part_name}();\n"));
            functions.push(EmittedFunction {
                name: part_name,
                body: self.function_body(chunk, binary),
            });
        }
        functions.push(EmittedFunction {
            name: name.to_string(),
            body: dispatcher,
        });
        functions
    }

    fn function_body(&mut self, calls: &[CallRecord], binary: &mut BinaryDataStore) -> String {
        let mut body = String::new();
        for call in calls {
            body.push_str("    ");
            body.push_str(&self.emit_call(call, binary));
            body.push('\n');
        }
        body
    }
}

impl Default for ReplayEmitter {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Reorder a frame's calls so each context's calls between two sync points
/// are contiguous, with explicit make-current records at group boundaries.
///
/// Per-context issuance order is preserved across sync points. Calls a side
/// context issued before its first sync point are hoisted to the very start
/// of the frame. The frame ends current on `main_context`.
pub fn interleave_context_calls(
    calls: Vec<CallRecord>,
    main_context: ContextId,
) -> Vec<CallRecord> {
    let contexts: Vec<ContextId> = {
        let mut seen = Vec::new();
        for call in &calls {
            if !seen.contains(&call.context) {
                seen.push(call.context);
            }
        }
        seen
    };
    if contexts.len() <= 1 {
        return calls;
    }

    let mut result: Vec<CallRecord> = Vec::with_capacity(calls.len() + 8);
    let mut current: Option<ContextId> = None;
    let mut flush = |ctx: ContextId, group: &mut Vec<CallRecord>, out: &mut Vec<CallRecord>| {
        if group.is_empty() {
            return;
        }
        if current != Some(ctx) {
            out.push(CallRecord::make_current(ctx));
            current = Some(ctx);
        }
        out.append(group);
    };

    // Hoist each side context's pre-first-sync-point prefix to frame start.
    let mut remaining: Vec<CallRecord> = Vec::with_capacity(calls.len());
    let mut hoisted: Vec<(ContextId, Vec<CallRecord>)> =
        contexts.iter().map(|&c| (c, Vec::new())).collect();
    let mut past_first_sync: Vec<ContextId> = vec![main_context];
    for call in calls {
        let ctx = call.context;
        if ctx != main_context && !past_first_sync.contains(&ctx) {
            let is_sync = call.is_sync_point;
            if is_sync {
                past_first_sync.push(ctx);
                remaining.push(call);
            } else if let Some((_, group)) = hoisted.iter_mut().find(|(c, _)| *c == ctx) {
                group.push(call);
            }
        } else {
            remaining.push(call);
        }
    }
    for (ctx, mut group) in hoisted {
        flush(ctx, &mut group, &mut result);
    }

    // Group the remainder: buffer per context, flushing all buffers at each
    // sync point so cross-sync-point ordering is preserved.
    let mut buffers: Vec<(ContextId, Vec<CallRecord>)> =
        contexts.iter().map(|&c| (c, Vec::new())).collect();
    for call in remaining {
        let ctx = call.context;
        let is_sync = call.is_sync_point;
        buffers
            .iter_mut()
            .find(|(c, _)| *c == ctx)
            .expect("context seen in first pass")
            .1
            .push(call);
        if is_sync {
            // Other contexts' pending groups first, the syncing context last
            // so the sync call sits at its group boundary.
            for (c, group) in buffers.iter_mut() {
                if *c != ctx {
                    let mut taken = std::mem::take(group);
                    flush(*c, &mut taken, &mut result);
                }
            }
            if let Some((_, group)) = buffers.iter_mut().find(|(c, _)| *c == ctx) {
                let mut taken = std::mem::take(group);
                flush(ctx, &mut taken, &mut result);
            }
        }
    }
    for (c, group) in buffers.iter_mut() {
        let mut taken = std::mem::take(group);
        flush(*c, &mut taken, &mut result);
    }

    drop(flush);
    if current != Some(main_context) {
        result.push(CallRecord::make_current(main_context));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::Param;
    use gles::{gl, EnumGroup, ResourceType};

    #[test]
    fn test_float_formatting_special_cases() {
        assert_eq!(format_float(0.0), "0.000000");
        assert_eq!(format_float(-0.0), "-0.000000");
        assert_eq!(format_float(f32::INFINITY), "INFINITY");
        assert_eq!(format_float(f32::NEG_INFINITY), "-INFINITY");
        assert_eq!(format_float(f32::NAN), "NAN");
        assert!(format_float(0.0).contains('.'));
    }

    #[test]
    fn test_float_formatting_round_trips() {
        for v in [1.5f32, -2.25, 1.0e-10, 3.4e38, 0.1] {
            let text = format_float(v);
            let back: f32 = text.parse().unwrap();
            assert_eq!(back.to_bits(), v.to_bits(), "{v} -> {text}");
        }
    }

    fn clear_call(ctx: u32) -> CallRecord {
        CallRecord::new(
            EntryPoint::Clear,
            ContextId(ctx),
            vec![Param::new(
                "mask",
                ParamValue::Bitfield(gl::GL_COLOR_BUFFER_BIT),
            )],
        )
    }

    #[test]
    fn test_emit_basic_call() {
        let mut emitter = ReplayEmitter::new();
        let mut binary = BinaryDataStore::new();
        let call = CallRecord::new(
            EntryPoint::DrawArrays,
            ContextId(1),
            vec![
                Param::new(
                    "mode",
                    ParamValue::Enum {
                        group: EnumGroup::DrawMode,
                        value: gl::GL_TRIANGLES,
                    },
                ),
                Param::new("first", ParamValue::Int(0)),
                Param::new("count", ParamValue::Int(3)),
            ],
        );
        assert_eq!(
            emitter.emit_call(&call, &mut binary),
            "glDrawArrays(GL_TRIANGLES, 0, 3);"
        );
    }

    #[test]
    fn test_emit_handle_lookup_and_return_assignment() {
        let mut emitter = ReplayEmitter::new();
        let mut binary = BinaryDataStore::new();
        let mut call = CallRecord::new(
            EntryPoint::CreateShader,
            ContextId(1),
            vec![Param::new(
                "type",
                ParamValue::Enum {
                    group: EnumGroup::ShaderType,
                    value: gl::GL_VERTEX_SHADER,
                },
            )],
        );
        call.return_value = ParamValue::Handle {
            ty: ResourceType::ShaderProgram,
            id: 4,
        };
        assert_eq!(
            emitter.emit_call(&call, &mut binary),
            "gShaderProgramMap[4] = glCreateShader(GL_VERTEX_SHADER);"
        );
    }

    #[test]
    fn test_emit_comment() {
        let mut emitter = ReplayEmitter::new();
        let mut binary = BinaryDataStore::new();
        let call = CallRecord::comment(ContextId(1), "invalid glDrawArrays dropped");
        assert_eq!(
            emitter.emit_call(&call, &mut binary),
            "// invalid glDrawArrays dropped"
        );
    }

    #[test]
    fn test_string_hoisting_tiers() {
        let mut emitter = ReplayEmitter::new();
        let mut binary = BinaryDataStore::new();

        let short = emitter.format_string("hello", &mut binary);
        assert_eq!(short, "\"hello\"");

        let multi = emitter.format_string("void main() {\n}\n", &mut binary);
        assert_eq!(multi, "kString0");
        assert!(emitter.string_constants_source().contains("kString0"));

        let huge = "x".repeat(MAX_HOISTED_STRING_LEN + 1);
        let huge_ref = emitter.format_string(&huge, &mut binary);
        assert!(huge_ref.starts_with("(const char *)GetBinaryData("));
        assert!(!binary.is_empty());
    }

    #[test]
    fn test_function_splitting_preserves_order() {
        let mut emitter = ReplayEmitter::with_split_threshold(2);
        let mut binary = BinaryDataStore::new();
        let calls: Vec<CallRecord> = (0..5).map(|_| clear_call(1)).collect();
        let functions = emitter.write_call_function("ReplayFrame1", &calls, &mut binary);

        // Three parts plus the dispatcher.
        assert_eq!(functions.len(), 4);
        assert_eq!(functions[0].name, "ReplayFrame1Part1");
        assert_eq!(functions[3].name, "ReplayFrame1");
        let dispatcher = &functions[3].body;
        let p1 = dispatcher.find("ReplayFrame1Part1").unwrap();
        let p2 = dispatcher.find("ReplayFrame1Part2").unwrap();
        let p3 = dispatcher.find("ReplayFrame1Part3").unwrap();
        assert!(p1 < p2 && p2 < p3);
    }

    #[test]
    fn test_interleave_hoists_side_context_prefix() {
        let main = ContextId(1);
        let side = ContextId(2);

        let mut sync = clear_call(2);
        sync.is_sync_point = true;

        let calls = vec![
            clear_call(1),
            clear_call(2), // side context, before its first sync point
            clear_call(1),
            sync,
            clear_call(1),
        ];
        let result = interleave_context_calls(calls, main);

        // Hoisted group first: make side current, its prefix call.
        assert_eq!(result[0].entry, EntryPoint::MakeCurrent);
        assert_eq!(result[0].context, side);
        assert_eq!(result[1].context, side);
        // The last group runs on main, so the frame already ends current
        // there with no trailing switch record.
        assert_eq!(result.last().unwrap().entry, EntryPoint::Clear);
        assert_eq!(result.last().unwrap().context, main);
    }

    #[test]
    fn test_interleave_appends_switch_when_frame_ends_on_side_context() {
        let main = ContextId(1);
        let side = ContextId(2);

        let mut sync = clear_call(2);
        sync.is_sync_point = true;

        // The side context owns the tail of the frame.
        let calls = vec![clear_call(1), sync, clear_call(2)];
        let result = interleave_context_calls(calls, main);

        let last = result.last().unwrap();
        assert_eq!(last.entry, EntryPoint::MakeCurrent);
        assert_eq!(last.context, main);
        let second_last = &result[result.len() - 2];
        assert_eq!(second_last.entry, EntryPoint::Clear);
        assert_eq!(second_last.context, side);
    }

    #[test]
    fn test_interleave_single_context_is_identity() {
        let calls = vec![clear_call(1), clear_call(1)];
        let result = interleave_context_calls(calls.clone(), ContextId(1));
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|c| c.entry == EntryPoint::Clear));
    }

    #[test]
    fn test_scratch_size_high_water_mark() {
        let mut emitter = ReplayEmitter::new();
        let mut binary = BinaryDataStore::new();
        let call = CallRecord::new(
            EntryPoint::ReadPixels,
            ContextId(1),
            vec![Param::new("pixels", ParamValue::ScratchBuffer { size: 4096 })],
        );
        emitter.emit_call(&call, &mut binary);
        assert_eq!(emitter.max_scratch_size(), 4096);
    }
}
