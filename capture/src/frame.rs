// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Frame call log
//!
//! Per-frame accumulation of call records. Every intercepted call passes
//! through a fixed skip table and a fixed override table before it lands in
//! the log; the override table is where non-portable calls get rewritten
//! into replayable equivalents and where resource lifecycle bookkeeping
//! hooks in.

use std::collections::HashMap;

use gles::{BufferId, EntryPoint, GlobalState, MapAccess, ResourceType};

use crate::call::{CallRecord, ParamValue};
use crate::coherent::CoherentBufferTracker;
use crate::tracker::{ResourceTracker, ShaderProgramKind};
use crate::Result;

/// Diagnostic lines logged per distinct entry point for invalid calls.
/// Further repeats are counted silently.
pub const MAX_INVALID_CALL_LOGS_PER_ENTRY: u32 = 3;

/// User-supplied predicate over (frame index, call index within frame)
/// selecting calls after which a state checkpoint is appended.
pub type ValidationPredicate = Box<dyn Fn(u32, usize) -> bool + Send>;

/// Entry points never recorded.
///
/// Debug markers and labels have no rendering effect. The "active count"
/// queries return values that differ across drivers. Swap and make-current
/// are driven by the replay harness itself.
fn should_skip(entry: EntryPoint) -> bool {
    matches!(
        entry,
        EntryPoint::DebugMessageCallback
            | EntryPoint::DebugMessageControl
            | EntryPoint::DebugMessageInsert
            | EntryPoint::PushDebugGroup
            | EntryPoint::PopDebugGroup
            | EntryPoint::ObjectLabel
            | EntryPoint::ObjectPtrLabel
            | EntryPoint::GetObjectLabel
            | EntryPoint::InsertEventMarker
            | EntryPoint::PushGroupMarker
            | EntryPoint::PopGroupMarker
            | EntryPoint::GetError
            | EntryPoint::GetAttachedShaders
            | EntryPoint::GetQueryObjectuiv
            | EntryPoint::EglSwapBuffers
            | EntryPoint::EglMakeCurrent
    )
}

/// Resource type created by a gen-style batch call.
pub fn gen_resource_type(entry: EntryPoint) -> Option<ResourceType> {
    match entry {
        EntryPoint::GenBuffers => Some(ResourceType::Buffer),
        EntryPoint::GenTextures => Some(ResourceType::Texture),
        EntryPoint::GenRenderbuffers => Some(ResourceType::Renderbuffer),
        EntryPoint::GenFramebuffers => Some(ResourceType::Framebuffer),
        EntryPoint::GenSamplers => Some(ResourceType::Sampler),
        EntryPoint::GenVertexArrays => Some(ResourceType::VertexArray),
        EntryPoint::GenTransformFeedbacks => Some(ResourceType::TransformFeedback),
        EntryPoint::GenProgramPipelines => Some(ResourceType::ProgramPipeline),
        EntryPoint::GenQueries => Some(ResourceType::Query),
        EntryPoint::GenSemaphores => Some(ResourceType::Semaphore),
        EntryPoint::CreateMemoryObjects => Some(ResourceType::MemoryObject),
        _ => None,
    }
}

/// Resource type destroyed by a delete-style batch call.
pub fn delete_resource_type(entry: EntryPoint) -> Option<ResourceType> {
    match entry {
        EntryPoint::DeleteBuffers => Some(ResourceType::Buffer),
        EntryPoint::DeleteTextures => Some(ResourceType::Texture),
        EntryPoint::DeleteRenderbuffers => Some(ResourceType::Renderbuffer),
        EntryPoint::DeleteFramebuffers => Some(ResourceType::Framebuffer),
        EntryPoint::DeleteSamplers => Some(ResourceType::Sampler),
        EntryPoint::DeleteVertexArrays => Some(ResourceType::VertexArray),
        EntryPoint::DeleteTransformFeedbacks => Some(ResourceType::TransformFeedback),
        EntryPoint::DeleteProgramPipelines => Some(ResourceType::ProgramPipeline),
        EntryPoint::DeleteQueries => Some(ResourceType::Query),
        EntryPoint::DeleteSemaphores => Some(ResourceType::Semaphore),
        EntryPoint::DeleteMemoryObjects => Some(ResourceType::MemoryObject),
        _ => None,
    }
}

/// Accumulates one frame's call records.
///
/// The dispatch layer appends the resolved bound-object id as a trailing
/// named parameter on target-relative calls (`buffer` on buffer calls,
/// `texture` on texture calls) so the override table can do lifecycle
/// bookkeeping without a binding shadow of its own.
pub struct FrameCallLog {
    calls: Vec<CallRecord>,
    frame_index: u32,
    invalid_counts: HashMap<EntryPoint, u32>,
    validation: Option<ValidationPredicate>,
    /// Shader id -> last source uploaded, kept for binary-load rewriting.
    shader_sources: HashMap<u32, String>,
    /// Program id -> attached shader ids.
    program_shaders: HashMap<u32, Vec<u32>>,
}

impl FrameCallLog {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            frame_index: 0,
            invalid_counts: HashMap::new(),
            validation: None,
            shader_sources: HashMap::new(),
            program_shaders: HashMap::new(),
        }
    }

    pub fn set_validation_predicate(&mut self, predicate: ValidationPredicate) {
        self.validation = Some(predicate);
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Record one intercepted call.
    ///
    /// Invalid calls (the dispatch layer saw a GL error) are replaced with a
    /// comment record and never replayed. Valid calls run through the skip
    /// and override tables, then land in the log finalized.
    pub fn capture_call(
        &mut self,
        record: CallRecord,
        valid: bool,
        tracker: &mut ResourceTracker,
        coherent: Option<&CoherentBufferTracker>,
        state: Option<&GlobalState>,
    ) -> Result<()> {
        if !valid {
            self.log_invalid_call(&record);
            let comment = format!("invalid call to {} dropped", record.name());
            let mut comment = CallRecord::comment(record.context, comment);
            comment.finalize();
            self.calls.push(comment);
            return Ok(());
        }
        if should_skip(record.entry) {
            return Ok(());
        }

        for mut rewritten in self.apply_overrides(record, tracker, coherent)? {
            rewritten.finalize();
            self.calls.push(rewritten);
        }

        if let (Some(predicate), Some(state)) = (&self.validation, state) {
            if predicate(self.frame_index, self.calls.len()) {
                let context = self
                    .calls
                    .last()
                    .map(|c| c.context)
                    .unwrap_or(gles::ContextId(0));
                let serialized = serde_json::to_string(state)?;
                let mut checkpoint = CallRecord::new(
                    EntryPoint::ValidationCheckpoint,
                    context,
                    vec![crate::call::Param::new(
                        "state",
                        ParamValue::String(serialized),
                    )],
                );
                checkpoint.finalize();
                self.calls.push(checkpoint);
            }
        }
        Ok(())
    }

    /// Close the current frame, yielding its calls and advancing the frame
    /// index.
    pub fn end_frame(&mut self) -> Vec<CallRecord> {
        self.frame_index += 1;
        std::mem::take(&mut self.calls)
    }

    fn log_invalid_call(&mut self, record: &CallRecord) {
        let count = self.invalid_counts.entry(record.entry).or_insert(0);
        *count += 1;
        if *count <= MAX_INVALID_CALL_LOGS_PER_ENTRY {
            log::warn!(
                "dropping invalid call to {} (occurrence {count})",
                record.name()
            );
        }
    }

    /// The fixed override table. Returns the record(s) to append in place of
    /// the intercepted one. Coherent-mapping lifecycle hooks in here too:
    /// ranges register on a coherent map, release on unmap or delete, and
    /// shadow writes copy out at synchronization points.
    fn apply_overrides(
        &mut self,
        mut record: CallRecord,
        tracker: &mut ResourceTracker,
        coherent: Option<&CoherentBufferTracker>,
    ) -> Result<Vec<CallRecord>> {
        let context = record.context;

        if let Some(ty) = gen_resource_type(record.entry) {
            // One handle-table update per created handle, reading the id the
            // driver actually assigned out of the scratch readback buffer.
            let mut followups = Vec::new();
            if let Some(ParamValue::HandleArray { ids, .. }) = record.param("ids") {
                for (i, &id) in ids.clone().iter().enumerate() {
                    tracker.set_genned_resource(context, ty, id);
                    tracker.note_handle(ty, id);
                    followups.push(CallRecord::update_resource_handle(context, ty, id, i));
                }
            }
            let mut out = vec![record];
            out.extend(followups);
            return Ok(out);
        }

        if let Some(ty) = delete_resource_type(record.entry) {
            if let Some(ParamValue::HandleArray { ids, .. }) = record.param("ids") {
                for &id in ids.clone().iter() {
                    tracker.set_deleted_resource(context, ty, id);
                    if ty == ResourceType::Buffer {
                        tracker.set_buffer_mapped(id, false);
                        if let Some(coherent) = coherent {
                            coherent.remove_buffer(BufferId(id))?;
                        }
                    }
                }
            }
            return Ok(vec![record]);
        }

        Ok(match record.entry {
            EntryPoint::CreateShader | EntryPoint::CreateProgram => {
                if let ParamValue::Handle { id, .. } = record.return_value {
                    let kind = if record.entry == EntryPoint::CreateShader {
                        ShaderProgramKind::Shader
                    } else {
                        ShaderProgramKind::Program
                    };
                    tracker.set_genned_resource(context, ResourceType::ShaderProgram, id);
                    tracker.note_handle(ResourceType::ShaderProgram, id);
                    tracker.set_shader_program_kind(id, kind);
                }
                vec![record]
            }
            EntryPoint::DeleteShader | EntryPoint::DeleteProgram => {
                let name = if record.entry == EntryPoint::DeleteShader {
                    "shader"
                } else {
                    "program"
                };
                if let Some((_, id)) = resolved_handle(&record, name) {
                    tracker.set_deleted_resource(context, ResourceType::ShaderProgram, id);
                    self.program_shaders.remove(&id);
                }
                vec![record]
            }
            EntryPoint::ShaderSource => {
                if let (Some((_, id)), Some(ParamValue::String(source))) =
                    (resolved_handle(&record, "shader"), record.param("source"))
                {
                    self.shader_sources.insert(id, source.clone());
                }
                vec![record]
            }
            EntryPoint::AttachShader => {
                if let (Some((_, program)), Some((_, shader))) = (
                    resolved_handle(&record, "program"),
                    resolved_handle(&record, "shader"),
                ) {
                    self.program_shaders.entry(program).or_default().push(shader);
                }
                vec![record]
            }
            EntryPoint::DetachShader => {
                if let (Some((_, program)), Some((_, shader))) = (
                    resolved_handle(&record, "program"),
                    resolved_handle(&record, "shader"),
                ) {
                    if let Some(shaders) = self.program_shaders.get_mut(&program) {
                        shaders.retain(|&s| s != shader);
                    }
                }
                vec![record]
            }
            EntryPoint::ProgramBinary => self.rewrite_program_binary(record),
            EntryPoint::FenceSync | EntryPoint::EglCreateSync => {
                if let ParamValue::Handle { ty, id } = record.return_value {
                    tracker.note_handle(ty, id);
                }
                vec![record]
            }
            EntryPoint::DeleteSync | EntryPoint::EglDestroySync => {
                if let Some((_, id)) = resolved_handle(&record, "sync") {
                    tracker.set_deleted_sync(id);
                }
                vec![record]
            }
            EntryPoint::EglCreateImage | EntryPoint::EglCreateSurface => {
                if let ParamValue::Handle { ty, id } = record.return_value {
                    tracker.set_genned_resource(context, ty, id);
                    tracker.note_handle(ty, id);
                }
                vec![record]
            }
            EntryPoint::EglDestroyImage | EntryPoint::EglDestroySurface => {
                if let Some((ty, id)) = resolved_handle(&record, "handle") {
                    tracker.set_deleted_resource(context, ty, id);
                }
                vec![record]
            }
            EntryPoint::MapBufferRange => {
                if let Some((_, id)) = resolved_handle(&record, "buffer") {
                    record.rewrite_param(
                        "buffer",
                        ParamValue::Handle {
                            ty: ResourceType::Buffer,
                            id,
                        },
                    );
                    tracker.set_buffer_mapped(id, true);
                    let access = map_access(&record);
                    if access.map(|a| a.contains(MapAccess::WRITE)) == Some(true) {
                        tracker.set_modified_resource(context, ResourceType::Buffer, id);
                    }
                    // A coherent persistent mapping has no unmap boundary to
                    // hook; put its pages under surveillance now.
                    if let (Some(coherent), Some(access)) = (coherent, access) {
                        if access.is_coherent_persistent()
                            && !coherent.is_tracking(BufferId(id))
                        {
                            if let (ParamValue::Uint64(addr), Some(len)) =
                                (&record.return_value, map_length(&record))
                            {
                                coherent.add_buffer(BufferId(id), *addr as usize, len)?;
                            }
                        }
                    }
                }
                vec![record]
            }
            EntryPoint::UnmapBuffer => {
                if let Some((_, id)) = resolved_handle(&record, "buffer") {
                    record.rewrite_param(
                        "buffer",
                        ParamValue::Handle {
                            ty: ResourceType::Buffer,
                            id,
                        },
                    );
                    tracker.set_buffer_mapped(id, false);
                    if let Some(coherent) = coherent {
                        coherent.sync_shadow_to_real(BufferId(id));
                        coherent.remove_buffer(BufferId(id))?;
                    }
                }
                vec![record]
            }
            EntryPoint::BufferStorage => {
                if let Some((_, id)) = resolved_handle(&record, "buffer") {
                    tracker.set_buffer_immutable(id);
                    tracker.set_modified_resource(context, ResourceType::Buffer, id);
                }
                vec![record]
            }
            EntryPoint::BufferData
            | EntryPoint::BufferSubData
            | EntryPoint::CopyBufferSubData
            | EntryPoint::FlushMappedBufferRange => {
                if let Some((_, id)) = resolved_handle(&record, "buffer") {
                    tracker.set_modified_resource(context, ResourceType::Buffer, id);
                    if let Some(coherent) = coherent {
                        coherent.sync_shadow_to_real(BufferId(id));
                    }
                }
                vec![record]
            }
            EntryPoint::DispatchCompute | EntryPoint::Finish => {
                // GPU-visible synchronization points; pending shadow writes
                // must land in the real mappings before the GPU reads them.
                if let Some(coherent) = coherent {
                    for id in coherent.tracked_ids() {
                        coherent.sync_shadow_to_real(id);
                    }
                }
                vec![record]
            }
            EntryPoint::TexImage2D
            | EntryPoint::TexSubImage2D
            | EntryPoint::TexImage3D
            | EntryPoint::TexSubImage3D
            | EntryPoint::CompressedTexImage2D
            | EntryPoint::CompressedTexSubImage2D
            | EntryPoint::TexStorage2D
            | EntryPoint::TexStorage3D
            | EntryPoint::TexParameteri
            | EntryPoint::TexParameterf
            | EntryPoint::GenerateMipmap => {
                if let Some((_, id)) = resolved_handle(&record, "texture") {
                    tracker.set_modified_resource(context, ResourceType::Texture, id);
                }
                vec![record]
            }
            _ => vec![record],
        })
    }

    /// Binary program formats are not portable across driver builds; replace
    /// the load with a relink from the cached shader sources.
    fn rewrite_program_binary(&mut self, record: CallRecord) -> Vec<CallRecord> {
        let context = record.context;
        let Some((_, program)) = resolved_handle(&record, "program") else {
            return vec![record];
        };
        let shaders = self.program_shaders.get(&program).cloned().unwrap_or_default();
        if shaders.is_empty() || !shaders.iter().all(|s| self.shader_sources.contains_key(s)) {
            log::warn!(
                "glProgramBinary for program {program} without cached sources, keeping a comment"
            );
            return vec![CallRecord::comment(
                context,
                format!("glProgramBinary({program}) dropped, no cached sources"),
            )];
        }

        let mut out = vec![CallRecord::comment(
            context,
            format!("glProgramBinary({program}) rewritten as link from source"),
        )];
        for shader in shaders {
            let source = self.shader_sources[&shader].clone();
            out.push(CallRecord::new(
                EntryPoint::ShaderSource,
                context,
                vec![
                    crate::call::Param::new(
                        "shader",
                        ParamValue::Handle {
                            ty: ResourceType::ShaderProgram,
                            id: shader,
                        },
                    ),
                    crate::call::Param::new("count", ParamValue::Int(1)),
                    crate::call::Param::new("source", ParamValue::String(source)),
                ],
            ));
            out.push(CallRecord::new(
                EntryPoint::CompileShader,
                context,
                vec![crate::call::Param::new(
                    "shader",
                    ParamValue::Handle {
                        ty: ResourceType::ShaderProgram,
                        id: shader,
                    },
                )],
            ));
        }
        out.push(CallRecord::new(
            EntryPoint::LinkProgram,
            context,
            vec![crate::call::Param::new(
                "program",
                ParamValue::Handle {
                    ty: ResourceType::ShaderProgram,
                    id: program,
                },
            )],
        ));
        out
    }
}

impl Default for FrameCallLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a parameter that names a resource, whether the dispatch layer
/// already tagged it as a handle or left it a raw integer. Untagged values
/// fall back to the type the parameter name implies; generic `handle`
/// params are typed by their entry point.
fn resolved_handle(record: &CallRecord, name: &str) -> Option<(ResourceType, u32)> {
    match record.param(name)? {
        ParamValue::Handle { ty, id } => Some((*ty, *id)),
        ParamValue::Uint(id) => untagged_param_type(record.entry, name).map(|ty| (ty, *id)),
        _ => None,
    }
}

fn untagged_param_type(entry: EntryPoint, name: &str) -> Option<ResourceType> {
    match name {
        "buffer" => Some(ResourceType::Buffer),
        "texture" => Some(ResourceType::Texture),
        "shader" | "program" => Some(ResourceType::ShaderProgram),
        "sync" => Some(ResourceType::Sync),
        "handle" => match entry {
            EntryPoint::EglDestroyImage => Some(ResourceType::EglImage),
            EntryPoint::EglDestroySurface => Some(ResourceType::EglSurface),
            _ => None,
        },
        _ => None,
    }
}

/// The byte length of a map call, if present.
fn map_length(record: &CallRecord) -> Option<usize> {
    match record.param("length")? {
        ParamValue::Int(len) if *len > 0 => Some(*len as usize),
        ParamValue::Int64(len) if *len > 0 => Some(*len as usize),
        _ => None,
    }
}

/// The access bitfield of a map call, if present.
pub fn map_access(record: &CallRecord) -> Option<MapAccess> {
    match record.param("access")? {
        ParamValue::Bitfield(bits) => MapAccess::from_bits(*bits),
        _ => None,
    }
}
