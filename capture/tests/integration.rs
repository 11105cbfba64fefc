// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the capture engine
//!
//! This file contains end-to-end tests for:
//! - Full capture sessions (frame recording, window handling, teardown)
//! - Mid-execution capture feeding the lifecycle tracker
//! - Coherent buffer dirty tracking across frame boundaries
//! - Replay text output (setup, reset, init, metadata)

use std::sync::Arc;

use capture::coherent::{CoherentBufferTracker, PageProtection};
use capture::{
    CallRecord, CaptureSession, CaptureWindow, InMemoryWriter, Param, ParamValue, SessionConfig,
};
use gles::{
    gl, BufferId, BufferSnapshot, ContextId, ContextSnapshot, EntryPoint, EnumGroup, MapAccess,
    ResourceType, ShareGroupSnapshot,
};

// ============================================================================
// Helpers
// ============================================================================

fn config(first_frame: u32, last_frame: u32) -> SessionConfig {
    SessionConfig {
        window: CaptureWindow::new(first_frame, last_frame),
        surface_width: 1280,
        surface_height: 720,
        color_space: "srgb".to_string(),
        context_major_version: 3,
        context_minor_version: 2,
        compressed: false,
    }
}

fn session(first_frame: u32, last_frame: u32) -> CaptureSession<InMemoryWriter> {
    let _ = env_logger::builder().is_test(true).try_init();
    CaptureSession::new(config(first_frame, last_frame), ContextId(1), InMemoryWriter::new())
}

fn gen_buffers(context: u32, ids: Vec<u32>) -> CallRecord {
    CallRecord::new(
        EntryPoint::GenBuffers,
        ContextId(context),
        vec![
            Param::new("n", ParamValue::Int(ids.len() as i32)),
            Param::new(
                "ids",
                ParamValue::HandleArray {
                    ty: ResourceType::Buffer,
                    ids,
                    client_array: true,
                },
            ),
        ],
    )
}

fn delete_buffers(context: u32, ids: Vec<u32>) -> CallRecord {
    CallRecord::new(
        EntryPoint::DeleteBuffers,
        ContextId(context),
        vec![
            Param::new("n", ParamValue::Int(ids.len() as i32)),
            Param::new(
                "ids",
                ParamValue::HandleArray {
                    ty: ResourceType::Buffer,
                    ids,
                    client_array: false,
                },
            ),
        ],
    )
}

fn buffer_data(context: u32, buffer: u32, bytes: i32) -> CallRecord {
    CallRecord::new(
        EntryPoint::BufferData,
        ContextId(context),
        vec![
            Param::new(
                "target",
                ParamValue::Enum {
                    group: EnumGroup::BufferTarget,
                    value: gl::GL_ARRAY_BUFFER,
                },
            ),
            Param::new("size", ParamValue::Int(bytes)),
            Param::new(
                "usage",
                ParamValue::Enum {
                    group: EnumGroup::BufferUsage,
                    value: gl::GL_STATIC_DRAW,
                },
            ),
            Param::new("buffer", ParamValue::Uint(buffer)),
        ],
    )
}

fn map_buffer_writable(context: u32, buffer: u32, length: i32) -> CallRecord {
    CallRecord::new(
        EntryPoint::MapBufferRange,
        ContextId(context),
        vec![
            Param::new(
                "target",
                ParamValue::Enum {
                    group: EnumGroup::BufferTarget,
                    value: gl::GL_ARRAY_BUFFER,
                },
            ),
            Param::new("offset", ParamValue::Int(0)),
            Param::new("length", ParamValue::Int(length)),
            Param::new("access", ParamValue::Bitfield(gl::GL_MAP_WRITE_BIT)),
            Param::new("buffer", ParamValue::Uint(buffer)),
        ],
    )
}

fn clear(context: u32) -> CallRecord {
    CallRecord::new(
        EntryPoint::Clear,
        ContextId(context),
        vec![Param::new(
            "mask",
            ParamValue::Bitfield(gl::GL_COLOR_BUFFER_BIT),
        )],
    )
}

struct NoopProtection;

impl PageProtection for NoopProtection {
    fn protect(&self, _addr: usize, _len: usize) -> capture::Result<()> {
        Ok(())
    }

    fn unprotect(&self, _addr: usize, _len: usize) -> capture::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Capture teardown scenarios
// ============================================================================

#[test]
fn test_teardown_before_end_frame_writes_output_once() {
    // Create a buffer, upload data, map it writable, then tear the context
    // down before any end-of-frame.
    let mut session = session(0, 10);
    session.capture_call(gen_buffers(1, vec![5]), true, None).unwrap();
    session.capture_call(buffer_data(1, 5, 256), true, None).unwrap();
    session
        .capture_call(map_buffer_writable(1, 5, 256), true, None)
        .unwrap();

    // One complete frame recorded before destruction.
    session.end_frame().unwrap();
    session.on_context_destroyed().unwrap();

    assert!(session.writer().metadata.is_some());
    assert!(session.writer().function("ReplayFrame0").is_some());
    let count = session.writer().functions.len();

    // Destroying again must not duplicate anything.
    session.on_context_destroyed().unwrap();
    assert_eq!(session.writer().functions.len(), count);
}

#[test]
fn test_teardown_with_zero_frames_writes_nothing() {
    let mut session = session(0, 10);
    session.capture_call(gen_buffers(1, vec![5]), true, None).unwrap();
    // No end_frame before destruction.
    session.on_context_destroyed().unwrap();

    assert!(session.writer().metadata.is_none());
    assert!(session.writer().functions.is_empty());
    assert!(session.writer().binary.is_empty());
}

// ============================================================================
// Resource lifecycle end to end
// ============================================================================

#[test]
fn test_resource_created_and_deleted_within_frame_needs_no_reset() {
    let mut session = session(0, 0);
    session.capture_call(gen_buffers(1, vec![9]), true, None).unwrap();
    session.capture_call(buffer_data(1, 9, 64), true, None).unwrap();
    session.capture_call(delete_buffers(1, vec![9]), true, None).unwrap();
    session.end_frame().unwrap();

    let reset = session.writer().function("ResetReplay").unwrap();
    assert!(!reset.body.contains("glGenBuffers"));
    assert!(!reset.body.contains("glDeleteBuffers"));
}

#[test]
fn test_frame_created_resource_deleted_in_reset() {
    let mut session = session(0, 0);
    session.capture_call(gen_buffers(1, vec![9]), true, None).unwrap();
    session.end_frame().unwrap();

    // Survives the frame, so the reset function must delete it.
    let reset = session.writer().function("ResetReplay").unwrap();
    assert!(reset.body.contains("glDeleteBuffers"));
    assert!(reset.body.contains("gBufferMap[9]"));
}

#[test]
fn test_starting_resource_deleted_in_frame_regenerated_in_reset() {
    let mut session = session(0, 0);
    let mut group = ShareGroupSnapshot::default();
    group.buffers.push(BufferSnapshot {
        id: BufferId(4),
        data: vec![1, 2, 3, 4, 5, 6, 7, 8],
        usage: gl::GL_STATIC_DRAW,
        immutable: false,
        storage_flags: 0,
        mapped: None,
    });
    session.begin_mid_execution(&group, &[ContextSnapshot::new(ContextId(1))]);

    session.capture_call(delete_buffers(1, vec![4]), true, None).unwrap();
    session.end_frame().unwrap();

    let setup = session.writer().function("SetupReplay").unwrap();
    assert!(setup.body.contains("glGenBuffers"));
    assert!(setup.body.contains("glBufferData"));

    let reset = session.writer().function("ResetReplay").unwrap();
    assert!(reset.body.contains("glGenBuffers"));
    assert!(reset.body.contains("UpdateResourceHandle(gBufferMap, 4, 0);"));
}

// ============================================================================
// Frames outside the capture window
// ============================================================================

#[test]
fn test_frames_outside_window_not_emitted_but_tracked() {
    let mut session = session(1, 1);

    // Frame 0 is outside the window; its gen must still be tracked so the
    // reset function can delete the buffer.
    session.capture_call(gen_buffers(1, vec![2]), true, None).unwrap();
    session.end_frame().unwrap();

    session.capture_call(clear(1), true, None).unwrap();
    session.end_frame().unwrap();

    assert!(session.writer().function("ReplayFrame0").is_none());
    assert!(session.writer().function("ReplayFrame1").is_some());
    let reset = session.writer().function("ResetReplay").unwrap();
    assert!(reset.body.contains("glDeleteBuffers"));
}

// ============================================================================
// Coherent buffers across frames
// ============================================================================

#[test]
fn test_coherent_writes_become_patch_records() {
    let page = 4096;
    let mut backing = vec![7u8; page * 2];
    let addr = backing.as_mut_ptr() as usize;

    let mut session = session(0, 1);
    let tracker = CoherentBufferTracker::new(Arc::new(NoopProtection), page, false);
    tracker.add_buffer(BufferId(3), addr, page * 2).unwrap();
    session.set_coherent_tracker(tracker);

    // The app writes into the mapping; the fault handler marks the page.
    assert!(session.coherent_tracker().unwrap().handle_fault(addr + 10));

    session.capture_call(clear(1), true, None).unwrap();
    session.end_frame().unwrap();

    let frame = session.writer().function("ReplayFrame0").unwrap();
    assert!(frame.body.contains("glBufferSubData"));
    assert!(frame.body.contains("gBufferMap[3]"));

    // Nothing dirty next frame, so no patches.
    session.capture_call(clear(1), true, None).unwrap();
    session.end_frame().unwrap();
    let frame = session.writer().function("ReplayFrame1").unwrap();
    assert!(!frame.body.contains("glBufferSubData"));
}

#[test]
fn test_coherent_map_lifecycle_through_session() {
    let page = 4096;
    let mut session = session(0, 1);
    session.set_coherent_tracker(CoherentBufferTracker::new(
        Arc::new(NoopProtection),
        page,
        false,
    ));

    session.capture_call(gen_buffers(1, vec![9]), true, None).unwrap();

    // A coherent persistent map registers its range without any explicit
    // registration call from the platform glue.
    let mut map = map_buffer_writable(1, 9, 256);
    map.rewrite_param(
        "access",
        ParamValue::Bitfield(
            (MapAccess::WRITE | MapAccess::PERSISTENT | MapAccess::COHERENT).bits(),
        ),
    );
    map.return_value = ParamValue::Uint64((page * 40) as u64);
    session.capture_call(map, true, None).unwrap();
    assert_eq!(
        session.coherent_tracker().unwrap().tracked_ids(),
        vec![BufferId(9)]
    );

    // Deleting the buffer releases the surveillance.
    session
        .capture_call(delete_buffers(1, vec![9]), true, None)
        .unwrap();
    assert!(session.coherent_tracker().unwrap().tracked_ids().is_empty());
}

// ============================================================================
// Multi-context output
// ============================================================================

#[test]
fn test_side_context_calls_grouped_with_make_current() {
    let mut session = session(0, 0);
    session.capture_call(clear(1), true, None).unwrap();
    session.capture_call(clear(2), true, None).unwrap();
    session.capture_call(clear(1), true, None).unwrap();
    session.end_frame().unwrap();

    let frame = session.writer().function("ReplayFrame0").unwrap();
    assert!(frame.body.contains("SetCurrentContext(2u);"));
    // The frame ends current on the main context.
    let last_switch = frame.body.rfind("SetCurrentContext").unwrap();
    assert!(frame.body[last_switch..].contains("(1u)"));
}

// ============================================================================
// Output shape
// ============================================================================

#[test]
fn test_invalid_call_emitted_as_comment() {
    let mut session = session(0, 0);
    session.capture_call(clear(1), false, None).unwrap();
    session.end_frame().unwrap();

    let frame = session.writer().function("ReplayFrame0").unwrap();
    assert!(frame.body.contains("// invalid call to glClear dropped"));
    assert!(!frame.body.contains("glClear("));
}

#[test]
fn test_init_function_reports_handle_table_sizes() {
    let mut session = session(0, 0);
    session.capture_call(gen_buffers(1, vec![31]), true, None).unwrap();
    session.end_frame().unwrap();

    let init = session.writer().function("InitReplay").unwrap();
    assert!(init.body.contains("AllocateResourceMap(gBufferMap, 32)"));
    assert!(init.body.contains("AllocateReadBuffer("));
}

#[test]
fn test_metadata_document_round_trips() {
    let mut session = session(2, 3);
    session.capture_call(clear(1), true, None).unwrap();
    session.end_frame().unwrap(); // frame 0, outside window
    session.capture_call(clear(1), true, None).unwrap();
    session.end_frame().unwrap(); // frame 1, outside window
    session.capture_call(clear(1), true, None).unwrap();
    session.end_frame().unwrap(); // frame 2
    session.capture_call(clear(1), true, None).unwrap();
    session.end_frame().unwrap(); // frame 3, closes the window

    let metadata: capture::CaptureMetadata =
        serde_json::from_str(session.writer().metadata.as_ref().unwrap()).unwrap();
    assert_eq!(metadata.first_frame, 2);
    assert_eq!(metadata.last_frame, 3);
    assert_eq!(metadata.frame_count, 2);
    assert_eq!(metadata.surface_width, 1280);
    assert_eq!(metadata.color_space, "srgb");
}

#[test]
fn test_binary_arena_flushed_with_aligned_size() {
    let mut session = session(0, 0);
    let mut group = ShareGroupSnapshot::default();
    group.buffers.push(BufferSnapshot {
        id: BufferId(1),
        data: vec![0xCD; 33],
        usage: gl::GL_STATIC_DRAW,
        immutable: false,
        storage_flags: 0,
        mapped: None,
    });
    session.begin_mid_execution(&group, &[ContextSnapshot::new(ContextId(1))]);
    session.capture_call(clear(1), true, None).unwrap();
    session.end_frame().unwrap();

    let binary = &session.writer().binary;
    assert!(!binary.is_empty());
    assert_eq!(binary.len() % capture::BINARY_ALIGNMENT, 0);
    assert_eq!(&binary[..33], &[0xCD; 33][..]);
}
