// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Shared GLES protocol types
//!
//! These types form the boundary between the (external) call dispatch and
//! validation layer and the capture engine. The dispatch layer hands the
//! engine typed entry-point identities, GL enum values, resource handles and
//! live-state snapshots; everything here is plain data with no behavior
//! beyond lookup tables and defaults.
//!
//! The snapshot structs in [`state`] are the "live-state oracle": the
//! dispatch layer populates them from the real object model, and the capture
//! engine diffs them against their [`Default`] values (which encode the GLES
//! context-creation defaults).

mod entry;
mod sharing;
mod state;
mod types;

pub use entry::EntryPoint;
pub use sharing::{ResourceType, SharingScope, SHARED_RESOURCE_TYPES};
pub use state::{
    AttachmentPoint, AttachmentSnapshot, BlendState, BufferSnapshot, ContextId, ContextSnapshot,
    DepthStencilState, FramebufferSnapshot, GlobalState, MapRange, PixelStoreState,
    ProgramSnapshot, RasterizerState, RenderbufferSnapshot, SamplerParams, SamplerSnapshot,
    ShaderKind, ShaderSnapshot, ShareGroupSnapshot, SyncSnapshot, TexLevelSnapshot,
    TextureParams, TextureSnapshot, TextureUnitBinding, UniformBlockSnapshot, UniformSnapshot,
    UniformValue, VertexArraySnapshot, VertexAttribSnapshot,
};
pub use types::{
    enum_name, BufferId, EnumGroup, FramebufferId, GLbitfield, GLenum, MapAccess, MemoryObjectId,
    ProgramPipelineId, QueryId, RenderbufferId, SamplerId, SemaphoreId, ShaderProgramId, SyncId,
    TextureId, TransformFeedbackId, VertexArrayId,
};

// Re-export the GL constant namespace wholesale; callers reference
// `gles::gl::GL_ARRAY_BUFFER` etc.
pub use types::gl;
