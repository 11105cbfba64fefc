// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Resource types and share-group scoping
//!
//! Whether a resource type is shared across a share group or owned by a
//! single context follows the GLES/EGL object-sharing rules. The table is
//! fixed; it is not a runtime configuration knob.

/// Every resource type the capture engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Buffer,
    Renderbuffer,
    /// Shaders and programs occupy one numeric ID space.
    ShaderProgram,
    Sampler,
    Sync,
    Texture,
    Semaphore,
    MemoryObject,
    EglImage,
    EglSurface,
    EglSync,
    Framebuffer,
    ProgramPipeline,
    TransformFeedback,
    VertexArray,
    /// EGL fence objects (distinct from GL fence syncs).
    EglFence,
    Query,
}

/// Tracking scope for a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingScope {
    /// One tracking instance for the whole share group.
    Shared,
    /// One tracking instance per (context, type).
    PerContext,
}

/// The resource types tracked at share-group scope, in the order the
/// mid-execution synthesizer visits them.
pub const SHARED_RESOURCE_TYPES: &[ResourceType] = &[
    ResourceType::Buffer,
    ResourceType::Texture,
    ResourceType::Renderbuffer,
    ResourceType::ShaderProgram,
    ResourceType::Sampler,
    ResourceType::Sync,
    ResourceType::Semaphore,
    ResourceType::MemoryObject,
    ResourceType::EglImage,
    ResourceType::EglSurface,
    ResourceType::EglSync,
];

impl ResourceType {
    /// Share-group scoping for this type, per the GLES/EGL sharing rules.
    pub fn sharing_scope(self) -> SharingScope {
        match self {
            ResourceType::Buffer
            | ResourceType::Renderbuffer
            | ResourceType::ShaderProgram
            | ResourceType::Sampler
            | ResourceType::Sync
            | ResourceType::Texture
            | ResourceType::Semaphore
            | ResourceType::MemoryObject
            | ResourceType::EglImage
            | ResourceType::EglSurface
            | ResourceType::EglSync => SharingScope::Shared,
            ResourceType::Framebuffer
            | ResourceType::ProgramPipeline
            | ResourceType::TransformFeedback
            | ResourceType::VertexArray
            | ResourceType::EglFence
            | ResourceType::Query => SharingScope::PerContext,
        }
    }

    /// Handle-table identifier used in emitted replay source
    /// (`gBufferMap`, `gTextureMap`, ...).
    pub fn map_name(self) -> &'static str {
        match self {
            ResourceType::Buffer => "gBufferMap",
            ResourceType::Renderbuffer => "gRenderbufferMap",
            ResourceType::ShaderProgram => "gShaderProgramMap",
            ResourceType::Sampler => "gSamplerMap",
            ResourceType::Sync => "gSyncMap",
            ResourceType::Texture => "gTextureMap",
            ResourceType::Semaphore => "gSemaphoreMap",
            ResourceType::MemoryObject => "gMemoryObjectMap",
            ResourceType::EglImage => "gEglImageMap",
            ResourceType::EglSurface => "gEglSurfaceMap",
            ResourceType::EglSync => "gEglSyncMap",
            ResourceType::Framebuffer => "gFramebufferMap",
            ResourceType::ProgramPipeline => "gProgramPipelineMap",
            ResourceType::TransformFeedback => "gTransformFeedbackMap",
            ResourceType::VertexArray => "gVertexArrayMap",
            ResourceType::EglFence => "gEglFenceMap",
            ResourceType::Query => "gQueryMap",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharing_table() {
        assert_eq!(ResourceType::Buffer.sharing_scope(), SharingScope::Shared);
        assert_eq!(ResourceType::Texture.sharing_scope(), SharingScope::Shared);
        assert_eq!(ResourceType::Sync.sharing_scope(), SharingScope::Shared);
        assert_eq!(
            ResourceType::Framebuffer.sharing_scope(),
            SharingScope::PerContext
        );
        assert_eq!(
            ResourceType::VertexArray.sharing_scope(),
            SharingScope::PerContext
        );
        assert_eq!(
            ResourceType::EglFence.sharing_scope(),
            SharingScope::PerContext
        );
    }

    #[test]
    fn test_shared_types_list_is_consistent() {
        for ty in SHARED_RESOURCE_TYPES {
            assert_eq!(ty.sharing_scope(), SharingScope::Shared);
        }
    }
}
