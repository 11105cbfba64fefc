// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Entry-point identity
//!
//! The set of entry points is closed and known at build time; the capture
//! engine drives its skip/override/tracking behavior off exhaustive `match`
//! statements over this enum rather than any dynamic dispatch.

/// One GLES/EGL entry point, plus the handful of synthetic records the
/// capture engine emits itself (comments, context switches, handle-table
/// updates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryPoint {
    // Object generation / deletion
    GenBuffers,
    DeleteBuffers,
    GenTextures,
    DeleteTextures,
    GenRenderbuffers,
    DeleteRenderbuffers,
    GenFramebuffers,
    DeleteFramebuffers,
    GenSamplers,
    DeleteSamplers,
    GenVertexArrays,
    DeleteVertexArrays,
    GenTransformFeedbacks,
    DeleteTransformFeedbacks,
    GenProgramPipelines,
    DeleteProgramPipelines,
    GenQueries,
    DeleteQueries,
    GenSemaphores,
    DeleteSemaphores,
    CreateMemoryObjects,
    DeleteMemoryObjects,

    // Buffers
    BindBuffer,
    BindBufferBase,
    BindBufferRange,
    BufferData,
    BufferSubData,
    BufferStorage,
    MapBufferRange,
    UnmapBuffer,
    FlushMappedBufferRange,
    CopyBufferSubData,

    // Textures
    ActiveTexture,
    BindTexture,
    TexImage2D,
    TexSubImage2D,
    TexImage3D,
    TexSubImage3D,
    CompressedTexImage2D,
    CompressedTexSubImage2D,
    TexStorage2D,
    TexStorage3D,
    TexParameteri,
    TexParameterf,
    GenerateMipmap,
    PixelStorei,

    // Renderbuffers / framebuffers
    BindRenderbuffer,
    RenderbufferStorage,
    RenderbufferStorageMultisample,
    BindFramebuffer,
    FramebufferTexture2D,
    FramebufferTextureLayer,
    FramebufferRenderbuffer,
    DrawBuffers,
    ReadBuffer,
    BlitFramebuffer,
    InvalidateFramebuffer,
    CheckFramebufferStatus,

    // Shaders / programs
    CreateShader,
    ShaderSource,
    CompileShader,
    DeleteShader,
    CreateProgram,
    AttachShader,
    DetachShader,
    BindAttribLocation,
    LinkProgram,
    UseProgram,
    DeleteProgram,
    ProgramBinary,
    UniformBlockBinding,
    Uniform1i,
    Uniform1iv,
    Uniform2iv,
    Uniform3iv,
    Uniform4iv,
    Uniform1f,
    Uniform1fv,
    Uniform2fv,
    Uniform3fv,
    Uniform4fv,
    Uniform1uiv,
    UniformMatrix2fv,
    UniformMatrix3fv,
    UniformMatrix4fv,

    // Samplers
    BindSampler,
    SamplerParameteri,
    SamplerParameterf,

    // Sync
    FenceSync,
    DeleteSync,
    ClientWaitSync,
    WaitSync,

    // Vertex arrays
    BindVertexArray,
    VertexAttribPointer,
    EnableVertexAttribArray,
    DisableVertexAttribArray,
    VertexAttribDivisor,
    VertexAttrib4f,

    // Context state
    Enable,
    Disable,
    BlendFunc,
    BlendFuncSeparate,
    BlendEquation,
    BlendEquationSeparate,
    BlendColor,
    ColorMask,
    DepthFunc,
    DepthMask,
    DepthRangef,
    StencilFunc,
    StencilFuncSeparate,
    StencilOp,
    StencilOpSeparate,
    StencilMask,
    StencilMaskSeparate,
    CullFace,
    FrontFace,
    PolygonOffset,
    LineWidth,
    SampleCoverage,
    Viewport,
    Scissor,
    ClearColor,
    ClearDepthf,
    ClearStencil,
    Hint,

    // Draw / execution
    Clear,
    DrawArrays,
    DrawElements,
    DrawArraysInstanced,
    DrawElementsInstanced,
    DispatchCompute,
    Finish,
    Flush,
    ReadPixels,

    // Queries
    BeginQuery,
    EndQuery,
    GetQueryObjectuiv,
    GetError,
    GetAttachedShaders,

    // Debug / markers (always skipped by the capture engine)
    DebugMessageCallback,
    DebugMessageControl,
    DebugMessageInsert,
    PushDebugGroup,
    PopDebugGroup,
    ObjectLabel,
    ObjectPtrLabel,
    GetObjectLabel,
    InsertEventMarker,
    PushGroupMarker,
    PopGroupMarker,

    // EGL
    EglCreateImage,
    EglDestroyImage,
    EglCreateSync,
    EglDestroySync,
    EglCreateSurface,
    EglDestroySurface,
    EglMakeCurrent,
    EglSwapBuffers,

    // Synthetic records produced by the capture engine itself
    Comment,
    MakeCurrent,
    UpdateResourceHandle,
    ValidationCheckpoint,
}

impl EntryPoint {
    /// The replay-source spelling of this entry point.
    pub fn name(self) -> &'static str {
        match self {
            EntryPoint::GenBuffers => "glGenBuffers",
            EntryPoint::DeleteBuffers => "glDeleteBuffers",
            EntryPoint::GenTextures => "glGenTextures",
            EntryPoint::DeleteTextures => "glDeleteTextures",
            EntryPoint::GenRenderbuffers => "glGenRenderbuffers",
            EntryPoint::DeleteRenderbuffers => "glDeleteRenderbuffers",
            EntryPoint::GenFramebuffers => "glGenFramebuffers",
            EntryPoint::DeleteFramebuffers => "glDeleteFramebuffers",
            EntryPoint::GenSamplers => "glGenSamplers",
            EntryPoint::DeleteSamplers => "glDeleteSamplers",
            EntryPoint::GenVertexArrays => "glGenVertexArrays",
            EntryPoint::DeleteVertexArrays => "glDeleteVertexArrays",
            EntryPoint::GenTransformFeedbacks => "glGenTransformFeedbacks",
            EntryPoint::DeleteTransformFeedbacks => "glDeleteTransformFeedbacks",
            EntryPoint::GenProgramPipelines => "glGenProgramPipelines",
            EntryPoint::DeleteProgramPipelines => "glDeleteProgramPipelines",
            EntryPoint::GenQueries => "glGenQueries",
            EntryPoint::DeleteQueries => "glDeleteQueries",
            EntryPoint::GenSemaphores => "glGenSemaphoresEXT",
            EntryPoint::DeleteSemaphores => "glDeleteSemaphoresEXT",
            EntryPoint::CreateMemoryObjects => "glCreateMemoryObjectsEXT",
            EntryPoint::DeleteMemoryObjects => "glDeleteMemoryObjectsEXT",
            EntryPoint::BindBuffer => "glBindBuffer",
            EntryPoint::BindBufferBase => "glBindBufferBase",
            EntryPoint::BindBufferRange => "glBindBufferRange",
            EntryPoint::BufferData => "glBufferData",
            EntryPoint::BufferSubData => "glBufferSubData",
            EntryPoint::BufferStorage => "glBufferStorageEXT",
            EntryPoint::MapBufferRange => "glMapBufferRange",
            EntryPoint::UnmapBuffer => "glUnmapBuffer",
            EntryPoint::FlushMappedBufferRange => "glFlushMappedBufferRange",
            EntryPoint::CopyBufferSubData => "glCopyBufferSubData",
            EntryPoint::ActiveTexture => "glActiveTexture",
            EntryPoint::BindTexture => "glBindTexture",
            EntryPoint::TexImage2D => "glTexImage2D",
            EntryPoint::TexSubImage2D => "glTexSubImage2D",
            EntryPoint::TexImage3D => "glTexImage3D",
            EntryPoint::TexSubImage3D => "glTexSubImage3D",
            EntryPoint::CompressedTexImage2D => "glCompressedTexImage2D",
            EntryPoint::CompressedTexSubImage2D => "glCompressedTexSubImage2D",
            EntryPoint::TexStorage2D => "glTexStorage2D",
            EntryPoint::TexStorage3D => "glTexStorage3D",
            EntryPoint::TexParameteri => "glTexParameteri",
            EntryPoint::TexParameterf => "glTexParameterf",
            EntryPoint::GenerateMipmap => "glGenerateMipmap",
            EntryPoint::PixelStorei => "glPixelStorei",
            EntryPoint::BindRenderbuffer => "glBindRenderbuffer",
            EntryPoint::RenderbufferStorage => "glRenderbufferStorage",
            EntryPoint::RenderbufferStorageMultisample => "glRenderbufferStorageMultisample",
            EntryPoint::BindFramebuffer => "glBindFramebuffer",
            EntryPoint::FramebufferTexture2D => "glFramebufferTexture2D",
            EntryPoint::FramebufferTextureLayer => "glFramebufferTextureLayer",
            EntryPoint::FramebufferRenderbuffer => "glFramebufferRenderbuffer",
            EntryPoint::DrawBuffers => "glDrawBuffers",
            EntryPoint::ReadBuffer => "glReadBuffer",
            EntryPoint::BlitFramebuffer => "glBlitFramebuffer",
            EntryPoint::InvalidateFramebuffer => "glInvalidateFramebuffer",
            EntryPoint::CheckFramebufferStatus => "glCheckFramebufferStatus",
            EntryPoint::CreateShader => "glCreateShader",
            EntryPoint::ShaderSource => "glShaderSource",
            EntryPoint::CompileShader => "glCompileShader",
            EntryPoint::DeleteShader => "glDeleteShader",
            EntryPoint::CreateProgram => "glCreateProgram",
            EntryPoint::AttachShader => "glAttachShader",
            EntryPoint::DetachShader => "glDetachShader",
            EntryPoint::BindAttribLocation => "glBindAttribLocation",
            EntryPoint::LinkProgram => "glLinkProgram",
            EntryPoint::UseProgram => "glUseProgram",
            EntryPoint::DeleteProgram => "glDeleteProgram",
            EntryPoint::ProgramBinary => "glProgramBinary",
            EntryPoint::UniformBlockBinding => "glUniformBlockBinding",
            EntryPoint::Uniform1i => "glUniform1i",
            EntryPoint::Uniform1iv => "glUniform1iv",
            EntryPoint::Uniform2iv => "glUniform2iv",
            EntryPoint::Uniform3iv => "glUniform3iv",
            EntryPoint::Uniform4iv => "glUniform4iv",
            EntryPoint::Uniform1f => "glUniform1f",
            EntryPoint::Uniform1fv => "glUniform1fv",
            EntryPoint::Uniform2fv => "glUniform2fv",
            EntryPoint::Uniform3fv => "glUniform3fv",
            EntryPoint::Uniform4fv => "glUniform4fv",
            EntryPoint::Uniform1uiv => "glUniform1uiv",
            EntryPoint::UniformMatrix2fv => "glUniformMatrix2fv",
            EntryPoint::UniformMatrix3fv => "glUniformMatrix3fv",
            EntryPoint::UniformMatrix4fv => "glUniformMatrix4fv",
            EntryPoint::BindSampler => "glBindSampler",
            EntryPoint::SamplerParameteri => "glSamplerParameteri",
            EntryPoint::SamplerParameterf => "glSamplerParameterf",
            EntryPoint::FenceSync => "glFenceSync",
            EntryPoint::DeleteSync => "glDeleteSync",
            EntryPoint::ClientWaitSync => "glClientWaitSync",
            EntryPoint::WaitSync => "glWaitSync",
            EntryPoint::BindVertexArray => "glBindVertexArray",
            EntryPoint::VertexAttribPointer => "glVertexAttribPointer",
            EntryPoint::EnableVertexAttribArray => "glEnableVertexAttribArray",
            EntryPoint::DisableVertexAttribArray => "glDisableVertexAttribArray",
            EntryPoint::VertexAttribDivisor => "glVertexAttribDivisor",
            EntryPoint::VertexAttrib4f => "glVertexAttrib4f",
            EntryPoint::Enable => "glEnable",
            EntryPoint::Disable => "glDisable",
            EntryPoint::BlendFunc => "glBlendFunc",
            EntryPoint::BlendFuncSeparate => "glBlendFuncSeparate",
            EntryPoint::BlendEquation => "glBlendEquation",
            EntryPoint::BlendEquationSeparate => "glBlendEquationSeparate",
            EntryPoint::BlendColor => "glBlendColor",
            EntryPoint::ColorMask => "glColorMask",
            EntryPoint::DepthFunc => "glDepthFunc",
            EntryPoint::DepthMask => "glDepthMask",
            EntryPoint::DepthRangef => "glDepthRangef",
            EntryPoint::StencilFunc => "glStencilFunc",
            EntryPoint::StencilFuncSeparate => "glStencilFuncSeparate",
            EntryPoint::StencilOp => "glStencilOp",
            EntryPoint::StencilOpSeparate => "glStencilOpSeparate",
            EntryPoint::StencilMask => "glStencilMask",
            EntryPoint::StencilMaskSeparate => "glStencilMaskSeparate",
            EntryPoint::CullFace => "glCullFace",
            EntryPoint::FrontFace => "glFrontFace",
            EntryPoint::PolygonOffset => "glPolygonOffset",
            EntryPoint::LineWidth => "glLineWidth",
            EntryPoint::SampleCoverage => "glSampleCoverage",
            EntryPoint::Viewport => "glViewport",
            EntryPoint::Scissor => "glScissor",
            EntryPoint::ClearColor => "glClearColor",
            EntryPoint::ClearDepthf => "glClearDepthf",
            EntryPoint::ClearStencil => "glClearStencil",
            EntryPoint::Hint => "glHint",
            EntryPoint::Clear => "glClear",
            EntryPoint::DrawArrays => "glDrawArrays",
            EntryPoint::DrawElements => "glDrawElements",
            EntryPoint::DrawArraysInstanced => "glDrawArraysInstanced",
            EntryPoint::DrawElementsInstanced => "glDrawElementsInstanced",
            EntryPoint::DispatchCompute => "glDispatchCompute",
            EntryPoint::Finish => "glFinish",
            EntryPoint::Flush => "glFlush",
            EntryPoint::ReadPixels => "glReadPixels",
            EntryPoint::BeginQuery => "glBeginQuery",
            EntryPoint::EndQuery => "glEndQuery",
            EntryPoint::GetQueryObjectuiv => "glGetQueryObjectuiv",
            EntryPoint::GetError => "glGetError",
            EntryPoint::GetAttachedShaders => "glGetAttachedShaders",
            EntryPoint::DebugMessageCallback => "glDebugMessageCallbackKHR",
            EntryPoint::DebugMessageControl => "glDebugMessageControlKHR",
            EntryPoint::DebugMessageInsert => "glDebugMessageInsertKHR",
            EntryPoint::PushDebugGroup => "glPushDebugGroupKHR",
            EntryPoint::PopDebugGroup => "glPopDebugGroupKHR",
            EntryPoint::ObjectLabel => "glObjectLabelKHR",
            EntryPoint::ObjectPtrLabel => "glObjectPtrLabelKHR",
            EntryPoint::GetObjectLabel => "glGetObjectLabelKHR",
            EntryPoint::InsertEventMarker => "glInsertEventMarkerEXT",
            EntryPoint::PushGroupMarker => "glPushGroupMarkerEXT",
            EntryPoint::PopGroupMarker => "glPopGroupMarkerEXT",
            EntryPoint::EglCreateImage => "eglCreateImage",
            EntryPoint::EglDestroyImage => "eglDestroyImage",
            EntryPoint::EglCreateSync => "eglCreateSync",
            EntryPoint::EglDestroySync => "eglDestroySync",
            EntryPoint::EglCreateSurface => "eglCreatePbufferSurface",
            EntryPoint::EglDestroySurface => "eglDestroySurface",
            EntryPoint::EglMakeCurrent => "eglMakeCurrent",
            EntryPoint::EglSwapBuffers => "eglSwapBuffers",
            EntryPoint::Comment => "Comment",
            EntryPoint::MakeCurrent => "SetCurrentContext",
            EntryPoint::UpdateResourceHandle => "UpdateResourceHandle",
            EntryPoint::ValidationCheckpoint => "ValidateSerializedState",
        }
    }

    /// Whether this record is synthesized by the capture engine rather than
    /// intercepted from the application.
    pub fn is_synthetic(self) -> bool {
        matches!(
            self,
            EntryPoint::Comment
                | EntryPoint::MakeCurrent
                | EntryPoint::UpdateResourceHandle
                | EntryPoint::ValidationCheckpoint
        )
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_names() {
        assert_eq!(EntryPoint::GenBuffers.name(), "glGenBuffers");
        assert_eq!(EntryPoint::EglSwapBuffers.name(), "eglSwapBuffers");
        assert_eq!(EntryPoint::MakeCurrent.name(), "SetCurrentContext");
    }

    #[test]
    fn test_synthetic_classification() {
        assert!(EntryPoint::Comment.is_synthetic());
        assert!(EntryPoint::UpdateResourceHandle.is_synthetic());
        assert!(!EntryPoint::DrawArrays.is_synthetic());
    }
}
