// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Capture session
//!
//! Owns one capture from first intercepted call to final flush: the frame
//! log, the lifecycle tracker, the binary arena and the emitter, plus the
//! mid-execution synthesis results when capture began mid-session. The
//! session decides what gets written at each frame boundary and assembles
//! the setup/reset/init functions on the last frame of the window.

use std::io;

use serde::{Deserialize, Serialize};

use gles::{
    ContextId, ContextSnapshot, EntryPoint, GlobalState, ResourceType, ShareGroupSnapshot,
    SharingScope,
};

use crate::binary_data::BinaryDataStore;
use crate::call::{CallRecord, Param, ParamValue};
use crate::coherent::CoherentBufferTracker;
use crate::emit::{interleave_context_calls, EmittedFunction, ReplayEmitter};
use crate::frame::FrameCallLog;
use crate::mec::{self, MecResult};
use crate::tracker::{ResourceTracker, ShaderProgramKind};
use crate::Result;

/// Sink for the generated replay program. The on-disk container format
/// lives outside this crate; anything implementing this trait can persist a
/// capture.
pub trait ReplayWriter {
    /// Text emitted once, ahead of all functions (hoisted string constants).
    fn write_preamble(&mut self, text: &str) -> io::Result<()>;
    fn write_function(&mut self, function: &EmittedFunction) -> io::Result<()>;
    fn write_binary_block(&mut self, data: &[u8]) -> io::Result<()>;
    fn write_metadata(&mut self, json: &str) -> io::Result<()>;
}

/// Writer keeping everything in memory, for tests and tooling.
#[derive(Default)]
pub struct InMemoryWriter {
    pub preamble: String,
    pub functions: Vec<EmittedFunction>,
    pub binary: Vec<u8>,
    pub metadata: Option<String>,
}

impl InMemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(&self, name: &str) -> Option<&EmittedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl ReplayWriter for InMemoryWriter {
    fn write_preamble(&mut self, text: &str) -> io::Result<()> {
        self.preamble.push_str(text);
        Ok(())
    }

    fn write_function(&mut self, function: &EmittedFunction) -> io::Result<()> {
        self.functions.push(function.clone());
        Ok(())
    }

    fn write_binary_block(&mut self, data: &[u8]) -> io::Result<()> {
        self.binary.extend_from_slice(data);
        Ok(())
    }

    fn write_metadata(&mut self, json: &str) -> io::Result<()> {
        self.metadata = Some(json.to_string());
        Ok(())
    }
}

/// Inclusive frame range to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureWindow {
    pub first_frame: u32,
    pub last_frame: u32,
}

impl CaptureWindow {
    pub fn new(first_frame: u32, last_frame: u32) -> Self {
        assert!(first_frame <= last_frame, "inverted capture window");
        Self {
            first_frame,
            last_frame,
        }
    }

    /// A window that stays closed until [`CaptureSession::trigger_capture`]
    /// opens it.
    pub fn armed() -> Self {
        Self {
            first_frame: u32::MAX,
            last_frame: u32::MAX,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.first_frame == u32::MAX
    }

    pub fn contains(&self, frame: u32) -> bool {
        frame >= self.first_frame && frame <= self.last_frame
    }
}

/// Session configuration, handed in by the (external) CLI/environment
/// loading layer.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub window: CaptureWindow,
    pub surface_width: i32,
    pub surface_height: i32,
    pub color_space: String,
    pub context_major_version: u32,
    pub context_minor_version: u32,
    pub compressed: bool,
}

/// The JSON metadata document written alongside the capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub first_frame: u32,
    pub last_frame: u32,
    pub frame_count: u32,
    pub surface_width: i32,
    pub surface_height: i32,
    pub color_space: String,
    pub context_major_version: u32,
    pub context_minor_version: u32,
    pub compressed: bool,
}

/// All resource types, for reset assembly iteration.
const ALL_RESOURCE_TYPES: &[ResourceType] = &[
    ResourceType::Buffer,
    ResourceType::Renderbuffer,
    ResourceType::ShaderProgram,
    ResourceType::Sampler,
    ResourceType::Sync,
    ResourceType::Texture,
    ResourceType::Semaphore,
    ResourceType::MemoryObject,
    ResourceType::EglImage,
    ResourceType::EglSurface,
    ResourceType::EglSync,
    ResourceType::Framebuffer,
    ResourceType::ProgramPipeline,
    ResourceType::TransformFeedback,
    ResourceType::VertexArray,
    ResourceType::EglFence,
    ResourceType::Query,
];

/// One capture from start to flush.
pub struct CaptureSession<W: ReplayWriter> {
    config: SessionConfig,
    writer: W,
    main_context: ContextId,
    log: FrameCallLog,
    tracker: ResourceTracker,
    binary: BinaryDataStore,
    emitter: ReplayEmitter,
    coherent: Option<CoherentBufferTracker>,
    mec: Option<MecResult>,
    frames_recorded: u32,
    index_written: bool,
}

impl<W: ReplayWriter> CaptureSession<W> {
    pub fn new(config: SessionConfig, main_context: ContextId, writer: W) -> Self {
        Self {
            config,
            writer,
            main_context,
            log: FrameCallLog::new(),
            tracker: ResourceTracker::new(),
            binary: BinaryDataStore::new(),
            emitter: ReplayEmitter::new(),
            coherent: None,
            mec: None,
            frames_recorded: 0,
            index_written: false,
        }
    }

    /// Attach a coherent buffer tracker. The platform glue that installs the
    /// fault handler constructs it; the call log registers and releases
    /// mappings on it as they are observed.
    pub fn set_coherent_tracker(&mut self, tracker: CoherentBufferTracker) {
        self.coherent = Some(tracker);
    }

    pub fn coherent_tracker(&self) -> Option<&CoherentBufferTracker> {
        self.coherent.as_ref()
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ResourceTracker {
        &mut self.tracker
    }

    pub fn log_mut(&mut self) -> &mut FrameCallLog {
        &mut self.log
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Open an armed window for `frame_count` frames, starting at the next
    /// frame boundary. Ignored when the window was configured with a fixed
    /// range or a trigger already fired.
    pub fn trigger_capture(&mut self, frame_count: u32) {
        assert!(frame_count > 0, "zero-length capture trigger");
        if !self.config.window.is_armed() {
            return;
        }
        let first = self.log.frame_index() + 1;
        self.config.window = CaptureWindow::new(first, first + frame_count - 1);
        log::debug!(
            "capture triggered: frames {}..={}",
            first,
            self.config.window.last_frame
        );
    }

    /// Begin capture against an already-running session. Synthesizes the
    /// state-reconstruction calls and seeds the tracker; must complete
    /// before ordinary interception resumes on any context.
    pub fn begin_mid_execution(
        &mut self,
        group: &ShareGroupSnapshot,
        contexts: &[ContextSnapshot],
    ) {
        let result = mec::synthesize(
            group,
            contexts,
            self.main_context,
            &mut self.tracker,
            &mut self.binary,
        );
        self.mec = Some(result);
    }

    /// Record one intercepted call.
    pub fn capture_call(
        &mut self,
        record: CallRecord,
        valid: bool,
        state: Option<&GlobalState>,
    ) -> Result<()> {
        self.log
            .capture_call(record, valid, &mut self.tracker, self.coherent.as_ref(), state)
    }

    /// Close the current frame at a swap boundary.
    pub fn end_frame(&mut self) -> Result<()> {
        let frame = self.log.frame_index();
        let mut calls = self.log.end_frame();

        let in_window = self.config.window.contains(frame);
        if in_window {
            // Patch records for writes into coherent mappings observed this
            // frame, applied after the frame's own calls.
            if let Some(coherent) = &self.coherent {
                for id in coherent.tracked_ids() {
                    let patches =
                        coherent.capture_dirty_snapshot(self.main_context, id, &mut self.binary)?;
                    calls.extend(patches);
                }
            }

            let calls = interleave_context_calls(calls, self.main_context);
            let name = format!("ReplayFrame{frame}");
            for function in self.emitter.write_call_function(&name, &calls, &mut self.binary) {
                self.writer.write_function(&function)?;
            }
            self.frames_recorded += 1;
        }

        // Protection persists while the window is open (the per-frame
        // snapshot re-protects exactly the dirty pages); it is released when
        // the window closes and re-armed when it opens.
        if let Some(coherent) = &self.coherent {
            let next_in_window = self.config.window.contains(frame + 1);
            if in_window && !next_in_window {
                coherent.end_frame()?;
            } else if !in_window && next_in_window {
                coherent.begin_frame()?;
            }
        }

        if frame == self.config.window.last_frame {
            self.finish()?;
        }
        Ok(())
    }

    /// A context this session captures is being destroyed. Flush whatever
    /// has been recorded rather than abandoning it.
    pub fn on_context_destroyed(&mut self) -> Result<()> {
        self.finish()
    }

    /// Emit setup/reset/init functions, flush the binary arena and write the
    /// metadata index. Idempotent, and a no-op when no frame was recorded.
    pub fn finish(&mut self) -> Result<()> {
        if self.index_written || self.frames_recorded == 0 {
            return Ok(());
        }
        self.index_written = true;

        if let Some(mec) = self.mec.take() {
            let (active, inactive) = partition_active(mec.shared_setup, &self.tracker);
            for function in self
                .emitter
                .write_call_function("SetupReplay", &active, &mut self.binary)
            {
                self.writer.write_function(&function)?;
            }
            if !inactive.is_empty() {
                for function in self.emitter.write_call_function(
                    "SetupReplayInactive",
                    &inactive,
                    &mut self.binary,
                ) {
                    self.writer.write_function(&function)?;
                }
            }
            for (context, setup) in &mec.context_setup {
                let name = format!("SetupReplayContext{}", context.value());
                for function in self.emitter.write_call_function(&name, setup, &mut self.binary) {
                    self.writer.write_function(&function)?;
                }
            }

            let shared_reset = assemble_shared_reset(&self.tracker, self.main_context);
            for function in self
                .emitter
                .write_call_function("ResetReplay", &shared_reset, &mut self.binary)
            {
                self.writer.write_function(&function)?;
            }
            for (context, state_reset) in &mec.context_reset {
                let mut reset = assemble_context_reset(&self.tracker, *context);
                reset.extend(state_reset.iter().cloned());
                let name = format!("ResetReplayContext{}", context.value());
                for function in self.emitter.write_call_function(&name, &reset, &mut self.binary) {
                    self.writer.write_function(&function)?;
                }
            }
        } else {
            let shared_reset = assemble_shared_reset(&self.tracker, self.main_context);
            for function in self
                .emitter
                .write_call_function("ResetReplay", &shared_reset, &mut self.binary)
            {
                self.writer.write_function(&function)?;
            }
            let contexts: Vec<ContextId> = self.tracker.contexts().collect();
            for context in contexts {
                let reset = assemble_context_reset(&self.tracker, context);
                if reset.is_empty() {
                    continue;
                }
                let name = format!("ResetReplayContext{}", context.value());
                for function in self.emitter.write_call_function(&name, &reset, &mut self.binary) {
                    self.writer.write_function(&function)?;
                }
            }
        }

        let init = self.init_function();
        self.writer.write_function(&init)?;

        self.writer.write_preamble(&self.emitter.string_constants_source())?;
        let mut flush_result = Ok(());
        self.binary.for_each_block(|block| {
            if flush_result.is_ok() {
                flush_result = self.writer.write_binary_block(block);
            }
        });
        flush_result?;

        let metadata = CaptureMetadata {
            first_frame: self.config.window.first_frame,
            last_frame: self.config.window.last_frame,
            frame_count: self.frames_recorded,
            surface_width: self.config.surface_width,
            surface_height: self.config.surface_height,
            color_space: self.config.color_space.clone(),
            context_major_version: self.config.context_major_version,
            context_minor_version: self.config.context_minor_version,
            compressed: self.config.compressed,
        };
        self.writer
            .write_metadata(&serde_json::to_string_pretty(&metadata)?)?;
        Ok(())
    }

    /// The initialization function: worst-case scratch size plus per-type
    /// maximum handle, so the harness can presize its tables.
    fn init_function(&self) -> EmittedFunction {
        let mut body = format!(
            "    AllocateReadBuffer({});\n",
            self.emitter.max_scratch_size()
        );
        for &ty in ALL_RESOURCE_TYPES {
            let max = self.tracker.max_handle(ty);
            if max > 0 {
                body.push_str(&format!(
                    "    AllocateResourceMap({}, {});\n",
                    ty.map_name(),
                    max + 1
                ));
            }
        }
        EmittedFunction {
            name: "InitReplay".to_string(),
            body,
        }
    }
}

/// Split setup calls into the active function and the parallel inactive
/// variant holding calls for resources never referenced by the captured
/// frame range.
fn partition_active(
    calls: Vec<CallRecord>,
    tracker: &ResourceTracker,
) -> (Vec<CallRecord>, Vec<CallRecord>) {
    calls
        .into_iter()
        .partition(|c| c.is_active && !references_inactive_resource(c, tracker))
}

fn references_inactive_resource(record: &CallRecord, tracker: &ResourceTracker) -> bool {
    let handle_inactive = |value: &ParamValue| match value {
        ParamValue::Handle { ty, id } => tracker.is_setup_inactive(*ty, *id),
        _ => false,
    };
    handle_inactive(&record.return_value) || record.params.iter().any(|p| handle_inactive(&p.value))
}

/// Reset calls for shared resource types: delete what the frames created,
/// regen what they deleted, restore what they modified.
fn assemble_shared_reset(tracker: &ResourceTracker, main: ContextId) -> Vec<CallRecord> {
    let mut calls = Vec::new();
    for &ty in ALL_RESOURCE_TYPES {
        if ty.sharing_scope() != SharingScope::Shared {
            continue;
        }
        append_type_reset(tracker, main, ty, &mut calls);
    }

    // Sync objects: recreate only, they carry no contents.
    for &id in tracker.sync_regen_list() {
        let mut fence = CallRecord::with_return(
            EntryPoint::FenceSync,
            main,
            vec![
                Param::new(
                    "condition",
                    ParamValue::Enum {
                        group: gles::EnumGroup::SyncCondition,
                        value: gles::gl::GL_SYNC_GPU_COMMANDS_COMPLETE,
                    },
                ),
                Param::new("flags", ParamValue::Bitfield(0)),
            ],
            ParamValue::Handle {
                ty: ResourceType::Sync,
                id,
            },
        );
        fence.finalize();
        calls.push(fence);
    }
    calls
}

/// Reset calls for one context's per-context resource types.
fn assemble_context_reset(tracker: &ResourceTracker, context: ContextId) -> Vec<CallRecord> {
    let mut calls = Vec::new();
    for &ty in ALL_RESOURCE_TYPES {
        if ty.sharing_scope() != SharingScope::PerContext {
            continue;
        }
        append_type_reset(tracker, context, ty, &mut calls);
    }
    calls
}

fn append_type_reset(
    tracker: &ResourceTracker,
    context: ContextId,
    ty: ResourceType,
    calls: &mut Vec<CallRecord>,
) {
    let Some(resource) = tracker.resource(context, ty) else {
        return;
    };

    let deletable: Vec<u32> = resource.to_delete().iter().copied().collect();
    if !deletable.is_empty() {
        calls.extend(delete_calls(tracker, context, ty, &deletable));
    }
    for &id in resource.to_regen() {
        if let Some(regen) = resource.regen_calls(id) {
            calls.extend(regen.iter().cloned());
        }
    }
    for &id in resource.to_restore() {
        if let Some(restore) = resource.restore_calls(id) {
            calls.extend(restore.iter().cloned());
        }
    }
}

/// Delete calls for a batch of ids of one type. Shader/program ids share a
/// numeric space and need their kind tag to pick the right entry point.
fn delete_calls(
    tracker: &ResourceTracker,
    context: ContextId,
    ty: ResourceType,
    ids: &[u32],
) -> Vec<CallRecord> {
    match ty {
        ResourceType::ShaderProgram => ids
            .iter()
            .map(|&id| {
                let entry = match tracker.shader_program_kind(id) {
                    Some(ShaderProgramKind::Program) => EntryPoint::DeleteProgram,
                    _ => EntryPoint::DeleteShader,
                };
                let name = if entry == EntryPoint::DeleteProgram {
                    "program"
                } else {
                    "shader"
                };
                let mut record = CallRecord::new(
                    entry,
                    context,
                    vec![Param::new(name, ParamValue::Handle { ty, id })],
                );
                record.finalize();
                record
            })
            .collect(),
        ResourceType::Sync => ids
            .iter()
            .map(|&id| {
                let mut record = CallRecord::new(
                    EntryPoint::DeleteSync,
                    context,
                    vec![Param::new("sync", ParamValue::Handle { ty, id })],
                );
                record.finalize();
                record
            })
            .collect(),
        _ => {
            let entry = match ty {
                ResourceType::Buffer => EntryPoint::DeleteBuffers,
                ResourceType::Texture => EntryPoint::DeleteTextures,
                ResourceType::Renderbuffer => EntryPoint::DeleteRenderbuffers,
                ResourceType::Framebuffer => EntryPoint::DeleteFramebuffers,
                ResourceType::Sampler => EntryPoint::DeleteSamplers,
                ResourceType::VertexArray => EntryPoint::DeleteVertexArrays,
                ResourceType::TransformFeedback => EntryPoint::DeleteTransformFeedbacks,
                ResourceType::ProgramPipeline => EntryPoint::DeleteProgramPipelines,
                ResourceType::Query => EntryPoint::DeleteQueries,
                ResourceType::Semaphore => EntryPoint::DeleteSemaphores,
                ResourceType::MemoryObject => EntryPoint::DeleteMemoryObjects,
                ResourceType::EglImage => EntryPoint::EglDestroyImage,
                ResourceType::EglSurface => EntryPoint::EglDestroySurface,
                ResourceType::EglSync | ResourceType::EglFence => EntryPoint::EglDestroySync,
                ResourceType::ShaderProgram | ResourceType::Sync => unreachable!(),
            };
            if matches!(
                entry,
                EntryPoint::EglDestroyImage | EntryPoint::EglDestroySurface | EntryPoint::EglDestroySync
            ) {
                return ids
                    .iter()
                    .map(|&id| {
                        let mut record = CallRecord::new(
                            entry,
                            context,
                            vec![Param::new("handle", ParamValue::Handle { ty, id })],
                        );
                        record.finalize();
                        record
                    })
                    .collect();
            }
            let mut record = CallRecord::new(
                entry,
                context,
                vec![
                    Param::new("n", ParamValue::Int(ids.len() as i32)),
                    Param::new(
                        "ids",
                        ParamValue::HandleArray {
                            ty,
                            ids: ids.to_vec(),
                            client_array: false,
                        },
                    ),
                ],
            );
            record.finalize();
            vec![record]
        }
    }
}
