// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Resource lifecycle tracker
//!
//! Classifies every resource-ID transition into the minimal set of
//! operations needed to return the resource to its loop-start condition
//! after a replay iteration.
//!
//! Per-ID state machine:
//!
//! ```text
//! Unseen ──(present at tracking start)──▶ Starting
//! Unseen ──(genned after start)─────────▶ New (+ ToDelete)
//! Starting ──(delete)──▶ ToRegen (+ ToRestore if it had content),
//!                        removed from any pending ToDelete
//! New ──(delete)──▶ removed entirely (nets to "never existed")
//! Starting ──(re-gen after delete)──▶ also ToDelete
//! ```
//!
//! The tracker is owned by the capturing session and threaded explicitly
//! into both the interception path and the mid-execution synthesizer; there
//! is no global state. Both paths mutating shared-scope instances is safe
//! because mid-execution capture runs to completion before interception
//! resumes.

use std::collections::{BTreeSet, HashMap, HashSet};

use gles::{ContextId, ResourceType, SharingScope};

use crate::call::CallRecord;

/// Whether a shader/program-union ID names a shader or a program object.
/// The two share one numeric ID space; the delete call differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderProgramKind {
    Shader,
    Program,
}

/// Set algebra over one resource type within one sharing scope.
#[derive(Debug, Default)]
pub struct TrackedResource {
    starting: BTreeSet<u32>,
    new_resources: BTreeSet<u32>,
    to_delete: BTreeSet<u32>,
    to_regen: BTreeSet<u32>,
    to_restore: BTreeSet<u32>,
    regen_calls: HashMap<u32, Vec<CallRecord>>,
    restore_calls: HashMap<u32, Vec<CallRecord>>,
}

impl TrackedResource {
    /// Record an ID that existed when tracking began (seeded by
    /// mid-execution capture).
    pub fn set_starting_resource(&mut self, id: u32) {
        debug_assert!(
            !self.new_resources.contains(&id),
            "starting resource {id} already classified as new"
        );
        self.starting.insert(id);
    }

    /// Record an ID produced by a gen/create call during capture.
    pub fn set_genned_resource(&mut self, id: u32) {
        if id == 0 {
            return;
        }
        if self.starting.contains(&id) {
            // A starting ID coming back to life: the recreated object must
            // be deleted at loop reset before the regen sequence reinstates
            // the original.
            self.to_delete.insert(id);
        } else {
            self.new_resources.insert(id);
            self.to_delete.insert(id);
        }
    }

    /// Record a delete of an ID. Deleting ID 0 is always a no-op.
    pub fn set_deleted_resource(&mut self, id: u32) {
        if id == 0 {
            return;
        }
        if self.new_resources.remove(&id) {
            // Never existed at loop start; nothing to reset.
            self.to_delete.remove(&id);
        } else if self.starting.contains(&id) {
            self.to_regen.insert(id);
            if self.restore_calls.contains_key(&id) {
                self.to_restore.insert(id);
            }
            self.to_delete.remove(&id);
        }
        // Deletes of IDs capture never saw are the application deleting
        // something created before a mid-session start that MEC skipped;
        // ignored by design.
    }

    /// Record a content modification. Only meaningful for starting-derived
    /// IDs; idempotent.
    pub fn set_modified_resource(&mut self, id: u32) {
        if self.starting.contains(&id) {
            self.to_restore.insert(id);
        }
    }

    /// Calls that recreate a deleted starting resource from scratch.
    pub fn regen_calls_mut(&mut self, id: u32) -> &mut Vec<CallRecord> {
        self.regen_calls.entry(id).or_default()
    }

    /// Calls that repopulate a modified starting resource's contents.
    pub fn restore_calls_mut(&mut self, id: u32) -> &mut Vec<CallRecord> {
        self.restore_calls.entry(id).or_default()
    }

    pub fn starting(&self) -> &BTreeSet<u32> {
        &self.starting
    }

    pub fn new_resources(&self) -> &BTreeSet<u32> {
        &self.new_resources
    }

    pub fn to_delete(&self) -> &BTreeSet<u32> {
        &self.to_delete
    }

    pub fn to_regen(&self) -> &BTreeSet<u32> {
        &self.to_regen
    }

    pub fn to_restore(&self) -> &BTreeSet<u32> {
        &self.to_restore
    }

    pub fn regen_calls(&self, id: u32) -> Option<&[CallRecord]> {
        self.regen_calls.get(&id).map(Vec::as_slice)
    }

    pub fn restore_calls(&self, id: u32) -> Option<&[CallRecord]> {
        self.restore_calls.get(&id).map(Vec::as_slice)
    }

    /// `new ∩ starting = ∅` must hold at all times.
    #[cfg(test)]
    fn check_invariants(&self) {
        assert!(self.new_resources.is_disjoint(&self.starting));
        assert!(self.to_regen.is_subset(&self.starting));
    }
}

/// Per-session aggregate: one [`TrackedResource`] per shared resource type,
/// one per (context, type) for per-context types, plus the per-type special
/// cases.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    shared: HashMap<ResourceType, TrackedResource>,
    per_context: HashMap<(ContextId, ResourceType), TrackedResource>,
    /// Buffers currently mapped (map/unmap pairs are re-issued at reset).
    buffer_mapped: HashSet<u32>,
    /// Buffers allocated with immutable storage (storage call, not data call).
    buffer_immutable: HashSet<u32>,
    shader_program_kinds: HashMap<u32, ShaderProgramKind>,
    /// Fence syncs have no contents; regen is an ID-only list.
    sync_regen: BTreeSet<u32>,
    /// (type, id) pairs whose setup calls were marked inactive.
    inactive_setup: HashSet<(ResourceType, u32)>,
    /// Largest handle observed per type, for presizing replay handle tables.
    max_handles: HashMap<ResourceType, u32>,
    contexts: BTreeSet<ContextId>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tracking instance for `ty`, routed by the fixed sharing table.
    /// `context` is ignored for shared types.
    pub fn resource_mut(&mut self, context: ContextId, ty: ResourceType) -> &mut TrackedResource {
        self.contexts.insert(context);
        match ty.sharing_scope() {
            SharingScope::Shared => self.shared.entry(ty).or_default(),
            SharingScope::PerContext => self.per_context.entry((context, ty)).or_default(),
        }
    }

    pub fn resource(&self, context: ContextId, ty: ResourceType) -> Option<&TrackedResource> {
        match ty.sharing_scope() {
            SharingScope::Shared => self.shared.get(&ty),
            SharingScope::PerContext => self.per_context.get(&(context, ty)),
        }
    }

    /// Record a genned handle and keep the per-type maximum current.
    pub fn set_genned_resource(&mut self, context: ContextId, ty: ResourceType, id: u32) {
        self.note_handle(ty, id);
        self.resource_mut(context, ty).set_genned_resource(id);
    }

    pub fn set_deleted_resource(&mut self, context: ContextId, ty: ResourceType, id: u32) {
        self.resource_mut(context, ty).set_deleted_resource(id);
    }

    pub fn set_modified_resource(&mut self, context: ContextId, ty: ResourceType, id: u32) {
        self.resource_mut(context, ty).set_modified_resource(id);
    }

    /// Track the largest handle seen per type (MEC also feeds this for
    /// starting resources).
    pub fn note_handle(&mut self, ty: ResourceType, id: u32) {
        let max = self.max_handles.entry(ty).or_insert(0);
        if id > *max {
            *max = id;
        }
    }

    pub fn max_handle(&self, ty: ResourceType) -> u32 {
        self.max_handles.get(&ty).copied().unwrap_or(0)
    }

    // ========================================================================
    // Buffer special cases
    // ========================================================================

    pub fn set_buffer_mapped(&mut self, id: u32, mapped: bool) {
        if mapped {
            self.buffer_mapped.insert(id);
        } else {
            self.buffer_mapped.remove(&id);
        }
    }

    pub fn is_buffer_mapped(&self, id: u32) -> bool {
        self.buffer_mapped.contains(&id)
    }

    pub fn set_buffer_immutable(&mut self, id: u32) {
        self.buffer_immutable.insert(id);
    }

    pub fn is_buffer_immutable(&self, id: u32) -> bool {
        self.buffer_immutable.contains(&id)
    }

    // ========================================================================
    // Shader/program union
    // ========================================================================

    pub fn set_shader_program_kind(&mut self, id: u32, kind: ShaderProgramKind) {
        self.shader_program_kinds.insert(id, kind);
    }

    pub fn shader_program_kind(&self, id: u32) -> Option<ShaderProgramKind> {
        self.shader_program_kinds.get(&id).copied()
    }

    // ========================================================================
    // Fence syncs
    // ========================================================================

    /// Record a fence sync created before capture began.
    pub fn set_starting_sync(&mut self, id: u32) {
        self.sync_regen.insert(id);
    }

    /// A delete for a sync outside the tracked starting set is the app
    /// deleting something capture never saw; silently ignored.
    pub fn set_deleted_sync(&mut self, id: u32) {
        self.sync_regen.remove(&id);
    }

    pub fn sync_regen_list(&self) -> &BTreeSet<u32> {
        &self.sync_regen
    }

    // ========================================================================
    // Setup activity flags
    // ========================================================================

    /// Mark a resource's setup calls inactive (the resource is never
    /// referenced by the active frame range).
    ///
    /// A (type, id) pair must not already be tracked; calling this twice for
    /// the same pair is a capture engine defect, not a silent double-toggle.
    pub fn mark_setup_inactive(&mut self, ty: ResourceType, id: u32) {
        let inserted = self.inactive_setup.insert((ty, id));
        assert!(
            inserted,
            "setup calls for {ty:?} id {id} already marked inactive"
        );
    }

    pub fn is_setup_inactive(&self, ty: ResourceType, id: u32) -> bool {
        self.inactive_setup.contains(&(ty, id))
    }

    /// Contexts observed by the tracker, for per-context reset emission.
    pub fn contexts(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.contexts.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undeleted_ids_stay_out_of_regen() {
        let mut res = TrackedResource::default();
        res.set_starting_resource(1);
        res.set_starting_resource(2);
        res.set_genned_resource(3);

        res.check_invariants();
        assert!(res.to_regen().is_empty());
        assert!(res.starting().contains(&1));
        assert!(res.new_resources().contains(&3));
    }

    #[test]
    fn test_new_then_deleted_nets_to_nothing() {
        let mut res = TrackedResource::default();
        res.set_genned_resource(5);
        assert!(res.to_delete().contains(&5));

        res.set_deleted_resource(5);
        res.check_invariants();
        assert!(!res.to_regen().contains(&5));
        assert!(!res.to_delete().contains(&5));
        assert!(!res.new_resources().contains(&5));
    }

    #[test]
    fn test_starting_deleted_then_regenned() {
        let mut res = TrackedResource::default();
        res.set_starting_resource(7);
        res.set_deleted_resource(7);
        assert!(res.to_regen().contains(&7));
        assert!(!res.to_delete().contains(&7));

        res.set_genned_resource(7);
        res.check_invariants();
        assert!(res.to_regen().contains(&7));
        assert!(res.to_delete().contains(&7));
    }

    #[test]
    fn test_delete_of_starting_with_content_marks_restore() {
        let mut res = TrackedResource::default();
        res.set_starting_resource(4);
        res.restore_calls_mut(4)
            .push(CallRecord::comment(ContextId(0), "restore data"));
        res.set_deleted_resource(4);
        assert!(res.to_restore().contains(&4));
    }

    #[test]
    fn test_modify_non_starting_is_noop() {
        let mut res = TrackedResource::default();
        res.set_genned_resource(9);
        res.set_modified_resource(9);
        assert!(res.to_restore().is_empty());

        res.set_starting_resource(2);
        res.set_modified_resource(2);
        res.set_modified_resource(2); // idempotent
        assert_eq!(res.to_restore().len(), 1);
    }

    #[test]
    fn test_delete_id_zero_is_noop() {
        let mut res = TrackedResource::default();
        res.set_deleted_resource(0);
        assert!(res.to_regen().is_empty());
        assert!(res.to_delete().is_empty());
    }

    #[test]
    fn test_sharing_scope_routing() {
        let mut tracker = ResourceTracker::new();
        let ctx1 = ContextId(1);
        let ctx2 = ContextId(2);

        // Shared type: one instance regardless of context.
        tracker.set_genned_resource(ctx1, ResourceType::Buffer, 10);
        assert!(tracker
            .resource(ctx2, ResourceType::Buffer)
            .unwrap()
            .new_resources()
            .contains(&10));

        // Per-context type: distinct instances.
        tracker.set_genned_resource(ctx1, ResourceType::VertexArray, 3);
        assert!(tracker.resource(ctx2, ResourceType::VertexArray).is_none());
    }

    #[test]
    fn test_max_handle_tracking() {
        let mut tracker = ResourceTracker::new();
        tracker.set_genned_resource(ContextId(1), ResourceType::Texture, 8);
        tracker.set_genned_resource(ContextId(1), ResourceType::Texture, 3);
        assert_eq!(tracker.max_handle(ResourceType::Texture), 8);
        assert_eq!(tracker.max_handle(ResourceType::Buffer), 0);
    }

    #[test]
    #[should_panic(expected = "already marked inactive")]
    fn test_double_mark_inactive_is_rejected() {
        let mut tracker = ResourceTracker::new();
        tracker.mark_setup_inactive(ResourceType::Texture, 4);
        tracker.mark_setup_inactive(ResourceType::Texture, 4);
    }

    #[test]
    fn test_sync_regen_ignores_unknown_deletes() {
        let mut tracker = ResourceTracker::new();
        tracker.set_starting_sync(2);
        tracker.set_deleted_sync(99); // never tracked; ignored
        tracker.set_deleted_sync(2);
        assert!(tracker.sync_regen_list().is_empty());
    }
}
