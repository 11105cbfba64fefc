// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Mid-execution capture
//!
//! Walks a live share group and synthesizes the call sequence that would
//! recreate its current state from a pristine context, while seeding the
//! resource lifecycle tracker with starting sets and per-resource
//! regen/restore call lists.
//!
//! Synthesis runs in dependency order: buffers and textures before the
//! objects that reference them, shaders before programs, bindings last.
//! Every field is diffed against the actual GLES default for its object
//! type; only divergent fields get a call. A state combination with no
//! known replay mapping is a capture engine defect and aborts.

mod buffers;
mod framebuffers;
mod programs;
mod state;
mod textures;

use gles::{ContextId, ContextSnapshot, EntryPoint, EnumGroup, GLenum, ResourceType};
use gles::ShareGroupSnapshot;

use crate::binary_data::BinaryDataStore;
use crate::call::{CallRecord, Param, ParamValue};
use crate::tracker::ResourceTracker;

/// Everything one mid-execution capture pass produces.
pub struct MecResult {
    /// Recreates all shared objects, issued once on the main context.
    pub shared_setup: Vec<CallRecord>,
    /// Per-context object and state setup, main context included.
    pub context_setup: Vec<(ContextId, Vec<CallRecord>)>,
    /// Per-context reset calls for state the replayed frames themselves can
    /// perturb, issued once per loop iteration.
    pub context_reset: Vec<(ContextId, Vec<CallRecord>)>,
}

/// Synthesize setup calls for a live share group and seed `tracker`.
///
/// Runs to completion before ordinary interception resumes; both paths
/// mutate the same tracker and that is only safe because of this ordering.
pub fn synthesize(
    group: &ShareGroupSnapshot,
    contexts: &[ContextSnapshot],
    main: ContextId,
    tracker: &mut ResourceTracker,
    binary: &mut BinaryDataStore,
) -> MecResult {
    let main_snapshot = contexts
        .iter()
        .find(|c| c.id == main)
        .unwrap_or_else(|| panic!("main context {} missing from snapshot set", main.value()));

    let mut shared_setup = Vec::new();
    shared_setup.extend(buffers::synthesize(
        group,
        main,
        main_snapshot.pixel_unpack_buffer,
        tracker,
        binary,
    ));
    shared_setup.extend(textures::synthesize(group, main, tracker, binary));
    shared_setup.extend(framebuffers::synthesize_renderbuffers(group, main, tracker));
    shared_setup.extend(programs::synthesize(group, main, tracker, binary));
    shared_setup.extend(textures::synthesize_samplers(group, main, tracker));
    shared_setup.extend(synthesize_syncs(group, main, tracker));

    let mut context_setup = Vec::new();
    let mut context_reset = Vec::new();
    for snapshot in contexts {
        let mut setup = Vec::new();
        setup.extend(framebuffers::synthesize(snapshot, tracker));
        setup.extend(state::synthesize_vertex_arrays(snapshot, tracker));
        let (global_setup, global_reset) = state::synthesize_global(snapshot);
        setup.extend(global_setup);
        context_setup.push((snapshot.id, setup));
        context_reset.push((snapshot.id, global_reset));
    }

    MecResult {
        shared_setup,
        context_setup,
        context_reset,
    }
}

/// Fence syncs have no contents; recreation is the whole story.
fn synthesize_syncs(
    group: &ShareGroupSnapshot,
    main: ContextId,
    tracker: &mut ResourceTracker,
) -> Vec<CallRecord> {
    let mut calls = Vec::new();
    for sync in &group.syncs {
        let id = sync.id.value();
        tracker.set_starting_sync(id);
        tracker.note_handle(ResourceType::Sync, id);
        let mut record = CallRecord::with_return(
            EntryPoint::FenceSync,
            main,
            vec![
                p_enum("condition", EnumGroup::SyncCondition, sync.condition),
                p_bitfield("flags", sync.flags),
            ],
            ParamValue::Handle {
                ty: ResourceType::Sync,
                id,
            },
        );
        record.finalize();
        calls.push(record);
    }
    calls
}

// ---------------------------------------------------------------------------
// Record construction helpers shared by the synthesis passes.
// ---------------------------------------------------------------------------

pub(crate) fn call(entry: EntryPoint, context: ContextId, params: Vec<Param>) -> CallRecord {
    let mut record = CallRecord::new(entry, context, params);
    record.finalize();
    record
}

pub(crate) fn p_enum(name: &'static str, group: EnumGroup, value: GLenum) -> Param {
    Param::new(name, ParamValue::Enum { group, value })
}

pub(crate) fn p_int(name: &'static str, value: i32) -> Param {
    Param::new(name, ParamValue::Int(value))
}

pub(crate) fn p_uint(name: &'static str, value: u32) -> Param {
    Param::new(name, ParamValue::Uint(value))
}

pub(crate) fn p_float(name: &'static str, value: f32) -> Param {
    Param::new(name, ParamValue::Float(value))
}

pub(crate) fn p_bool(name: &'static str, value: bool) -> Param {
    Param::new(name, ParamValue::Boolean(value))
}

pub(crate) fn p_bitfield(name: &'static str, value: u32) -> Param {
    Param::new(name, ParamValue::Bitfield(value))
}

pub(crate) fn p_handle(name: &'static str, ty: ResourceType, id: u32) -> Param {
    Param::new(name, ParamValue::Handle { ty, id })
}

/// Append bytes to the binary arena and reference them from a parameter.
pub(crate) fn p_data(name: &'static str, binary: &mut BinaryDataStore, bytes: &[u8]) -> Param {
    let offset = binary.append(bytes);
    Param::new(
        name,
        ParamValue::BinaryData {
            offset,
            len: bytes.len() as u64,
        },
    )
}

/// A gen-style batch record plus its handle-table update, the shape every
/// synthesized object creation starts with.
pub(crate) fn gen_one(
    entry: EntryPoint,
    context: ContextId,
    ty: ResourceType,
    id: u32,
) -> Vec<CallRecord> {
    let record = call(
        entry,
        context,
        vec![
            p_int("n", 1),
            Param::new(
                "ids",
                ParamValue::HandleArray {
                    ty,
                    ids: vec![id],
                    client_array: true,
                },
            ),
        ],
    );
    let mut update = CallRecord::update_resource_handle(context, ty, id, 0);
    update.finalize();
    vec![record, update]
}
