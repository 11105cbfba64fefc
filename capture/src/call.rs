// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Call record model
//!
//! One [`CallRecord`] per intercepted (or synthesized) API invocation.
//! Parameter values are a proper sum type so the formatting dispatch in
//! [`crate::emit`] is exhaustive; there is no parallel type-code field to
//! fall out of sync with.

use gles::{ContextId, EntryPoint, EnumGroup, GLbitfield, GLenum, ResourceType};

/// A parameter (or return) value. Exactly one payload is populated; a value
/// is either an inline scalar or backed by captured bytes, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// No value (void returns).
    Void,
    Boolean(bool),
    Int(i32),
    Uint(u32),
    Int64(i64),
    Uint64(u64),
    Float(f32),
    /// An enum with a known group, formatted symbolically when possible.
    Enum { group: EnumGroup, value: GLenum },
    Bitfield(GLbitfield),
    /// A resource handle, formatted as a handle-table lookup.
    Handle { ty: ResourceType, id: u32 },
    /// An inline string (shader sources, labels).
    String(String),
    /// Bulk bytes stored in the binary arena. Plain integer offset, never a
    /// pointer: the arena's backing storage is chunked.
    BinaryData { offset: u64, len: u64 },
    /// An array of enum values (draw-buffer lists and the like).
    EnumArray { group: EnumGroup, values: Vec<GLenum> },
    /// An array of resource handles. `client_array` marks a pointer the
    /// application owns whose contents are resolved late (gen-style out
    /// arrays read back after the call returns).
    HandleArray {
        ty: ResourceType,
        ids: Vec<u32>,
        client_array: bool,
    },
    /// An out-parameter or bulk destination routed through the replay
    /// harness's pre-sized scratch buffer.
    ScratchBuffer { size: usize },
}

impl ParamValue {
    /// Whether the value references captured bytes rather than carrying an
    /// inline scalar.
    pub fn is_data_backed(&self) -> bool {
        matches!(self, ParamValue::BinaryData { .. })
    }
}

/// One named, typed parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub value: ParamValue,
}

impl Param {
    pub fn new(name: &'static str, value: ParamValue) -> Self {
        Self { name, value }
    }
}

/// One captured invocation.
///
/// Mutable only until [`CallRecord::finalize`] is called by the owning
/// capture step; after that the parameter list is frozen for emission.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub entry: EntryPoint,
    pub params: Vec<Param>,
    pub return_value: ParamValue,
    /// Context the call was issued on.
    pub context: ContextId,
    /// Included in the emitted setup function when set; inactive records
    /// belong to resources never referenced by the captured frame range.
    pub is_active: bool,
    /// Marks a cross-context ordering boundary for replay interleaving.
    pub is_sync_point: bool,
    /// Display name overriding the entry point's (comment records).
    pub custom_name: Option<String>,
    finalized: bool,
}

impl CallRecord {
    /// A call record with parameters, ready for further rewriting.
    pub fn new(entry: EntryPoint, context: ContextId, params: Vec<Param>) -> Self {
        Self {
            entry,
            params,
            return_value: ParamValue::Void,
            context,
            is_active: true,
            is_sync_point: false,
            custom_name: None,
            finalized: false,
        }
    }

    /// A call record with a captured return value.
    pub fn with_return(
        entry: EntryPoint,
        context: ContextId,
        params: Vec<Param>,
        return_value: ParamValue,
    ) -> Self {
        let mut record = Self::new(entry, context, params);
        record.return_value = return_value;
        record
    }

    /// A human-readable comment record (invalid calls, annotations).
    pub fn comment(context: ContextId, text: impl Into<String>) -> Self {
        let mut record = Self::new(EntryPoint::Comment, context, Vec::new());
        record.custom_name = Some(text.into());
        record
    }

    /// The synthetic "make this context current" record inserted at
    /// interleaving group boundaries.
    pub fn make_current(context: ContextId) -> Self {
        Self::new(
            EntryPoint::MakeCurrent,
            context,
            vec![Param::new("context", ParamValue::Uint(context.value()))],
        )
    }

    /// The synthetic "update handle table slot" record appended after a
    /// gen-style call. `scratch_index` is the slot in the readback scratch
    /// buffer holding the handle the driver actually assigned.
    pub fn update_resource_handle(
        context: ContextId,
        ty: ResourceType,
        id: u32,
        scratch_index: usize,
    ) -> Self {
        Self::new(
            EntryPoint::UpdateResourceHandle,
            context,
            vec![
                Param::new("handle", ParamValue::Handle { ty, id }),
                Param::new("readIndex", ParamValue::Uint(scratch_index as u32)),
            ],
        )
    }

    /// Display name for diagnostics and emission.
    pub fn name(&self) -> &str {
        self.custom_name
            .as_deref()
            .unwrap_or_else(|| self.entry.name())
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Rewrite a parameter's value in place.
    ///
    /// Used to re-tag a raw integer as a resource handle (or similar) before
    /// the record is finalized. Rewriting a finalized record is a capture
    /// engine defect.
    pub fn rewrite_param(&mut self, name: &str, value: ParamValue) {
        assert!(
            !self.finalized,
            "rewriting parameter '{}' of finalized call {}",
            name,
            self.entry.name()
        );
        let param = self
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .unwrap_or_else(|| {
                panic!("no parameter '{}' on {}", name, self.entry.name());
            });
        param.value = value;
    }

    /// Append a trailing parameter (override steps add the returned handle
    /// as an explicit argument).
    pub fn push_param(&mut self, name: &'static str, value: ParamValue) {
        assert!(
            !self.finalized,
            "appending parameter '{}' to finalized call {}",
            name,
            self.entry.name()
        );
        self.params.push(Param::new(name, value));
    }

    /// Freeze the record for emission.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}
