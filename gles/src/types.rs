// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! GL scalar types, enum constants and handle newtypes
//!
//! Only the constants the capture engine actually formats or diffs are
//! defined here; this is not a full GLES header.

use serde::{Deserialize, Serialize};

/// GL enum value.
pub type GLenum = u32;
/// GL bitfield value.
pub type GLbitfield = u32;

/// GL constants, named as in the C headers so emitted replay source and
/// engine code read the same way.
pub mod gl {
    #![allow(clippy::unreadable_literal)]

    use super::GLenum;

    // Buffer targets
    pub const GL_ARRAY_BUFFER: GLenum = 0x8892;
    pub const GL_ELEMENT_ARRAY_BUFFER: GLenum = 0x8893;
    pub const GL_PIXEL_PACK_BUFFER: GLenum = 0x88EB;
    pub const GL_PIXEL_UNPACK_BUFFER: GLenum = 0x88EC;
    pub const GL_UNIFORM_BUFFER: GLenum = 0x8A11;
    pub const GL_TRANSFORM_FEEDBACK_BUFFER: GLenum = 0x8C8E;
    pub const GL_COPY_READ_BUFFER: GLenum = 0x8F36;
    pub const GL_COPY_WRITE_BUFFER: GLenum = 0x8F37;
    pub const GL_SHADER_STORAGE_BUFFER: GLenum = 0x90D2;

    // Buffer usage
    pub const GL_STREAM_DRAW: GLenum = 0x88E0;
    pub const GL_STATIC_DRAW: GLenum = 0x88E4;
    pub const GL_DYNAMIC_DRAW: GLenum = 0x88E8;

    // Map access bits
    pub const GL_MAP_READ_BIT: GLenum = 0x0001;
    pub const GL_MAP_WRITE_BIT: GLenum = 0x0002;
    pub const GL_MAP_INVALIDATE_RANGE_BIT: GLenum = 0x0004;
    pub const GL_MAP_INVALIDATE_BUFFER_BIT: GLenum = 0x0008;
    pub const GL_MAP_FLUSH_EXPLICIT_BIT: GLenum = 0x0010;
    pub const GL_MAP_UNSYNCHRONIZED_BIT: GLenum = 0x0020;
    pub const GL_MAP_PERSISTENT_BIT: GLenum = 0x0040;
    pub const GL_MAP_COHERENT_BIT: GLenum = 0x0080;
    pub const GL_DYNAMIC_STORAGE_BIT: GLenum = 0x0100;

    // Texture targets
    pub const GL_TEXTURE_2D: GLenum = 0x0DE1;
    pub const GL_TEXTURE_3D: GLenum = 0x806F;
    pub const GL_TEXTURE_2D_ARRAY: GLenum = 0x8C1A;
    pub const GL_TEXTURE_CUBE_MAP: GLenum = 0x8513;
    pub const GL_TEXTURE_CUBE_MAP_POSITIVE_X: GLenum = 0x8515;
    pub const GL_TEXTURE_EXTERNAL_OES: GLenum = 0x8D65;

    // Texture units
    pub const GL_TEXTURE0: GLenum = 0x84C0;

    // Texture parameters
    pub const GL_TEXTURE_MIN_FILTER: GLenum = 0x2801;
    pub const GL_TEXTURE_MAG_FILTER: GLenum = 0x2800;
    pub const GL_TEXTURE_WRAP_S: GLenum = 0x2802;
    pub const GL_TEXTURE_WRAP_T: GLenum = 0x2803;
    pub const GL_TEXTURE_WRAP_R: GLenum = 0x8072;
    pub const GL_TEXTURE_MIN_LOD: GLenum = 0x813A;
    pub const GL_TEXTURE_MAX_LOD: GLenum = 0x813B;
    pub const GL_TEXTURE_BASE_LEVEL: GLenum = 0x813C;
    pub const GL_TEXTURE_MAX_LEVEL: GLenum = 0x813D;
    pub const GL_TEXTURE_SWIZZLE_R: GLenum = 0x8E42;
    pub const GL_TEXTURE_SWIZZLE_G: GLenum = 0x8E43;
    pub const GL_TEXTURE_SWIZZLE_B: GLenum = 0x8E44;
    pub const GL_TEXTURE_SWIZZLE_A: GLenum = 0x8E45;
    pub const GL_TEXTURE_COMPARE_MODE: GLenum = 0x884C;
    pub const GL_TEXTURE_COMPARE_FUNC: GLenum = 0x884D;

    // Filters / wraps
    pub const GL_NEAREST: GLenum = 0x2600;
    pub const GL_LINEAR: GLenum = 0x2601;
    pub const GL_NEAREST_MIPMAP_NEAREST: GLenum = 0x2700;
    pub const GL_LINEAR_MIPMAP_NEAREST: GLenum = 0x2701;
    pub const GL_NEAREST_MIPMAP_LINEAR: GLenum = 0x2702;
    pub const GL_LINEAR_MIPMAP_LINEAR: GLenum = 0x2703;
    pub const GL_REPEAT: GLenum = 0x2901;
    pub const GL_CLAMP_TO_EDGE: GLenum = 0x812F;
    pub const GL_MIRRORED_REPEAT: GLenum = 0x8370;

    // Pixel formats / types
    pub const GL_RGBA: GLenum = 0x1908;
    pub const GL_RGB: GLenum = 0x1907;
    pub const GL_RGBA8: GLenum = 0x8058;
    pub const GL_RGB8: GLenum = 0x8051;
    pub const GL_DEPTH_COMPONENT16: GLenum = 0x81A5;
    pub const GL_DEPTH24_STENCIL8: GLenum = 0x88F0;
    pub const GL_UNSIGNED_BYTE: GLenum = 0x1401;
    pub const GL_FLOAT: GLenum = 0x1406;
    pub const GL_UNSIGNED_INT: GLenum = 0x1405;
    pub const GL_UNSIGNED_SHORT: GLenum = 0x1403;
    pub const GL_PALETTE4_RGBA8_OES: GLenum = 0x8B91;
    pub const GL_PALETTE8_RGBA8_OES: GLenum = 0x8B96;

    // Pixel store
    pub const GL_UNPACK_ALIGNMENT: GLenum = 0x0CF5;
    pub const GL_PACK_ALIGNMENT: GLenum = 0x0D05;
    pub const GL_UNPACK_ROW_LENGTH: GLenum = 0x0CF2;
    pub const GL_UNPACK_SKIP_ROWS: GLenum = 0x0CF3;
    pub const GL_UNPACK_SKIP_PIXELS: GLenum = 0x0CF4;

    // Framebuffer
    pub const GL_FRAMEBUFFER: GLenum = 0x8D40;
    pub const GL_READ_FRAMEBUFFER: GLenum = 0x8CA8;
    pub const GL_DRAW_FRAMEBUFFER: GLenum = 0x8CA9;
    pub const GL_RENDERBUFFER: GLenum = 0x8D41;
    pub const GL_COLOR_ATTACHMENT0: GLenum = 0x8CE0;
    pub const GL_DEPTH_ATTACHMENT: GLenum = 0x8D00;
    pub const GL_STENCIL_ATTACHMENT: GLenum = 0x8D20;
    pub const GL_DEPTH_STENCIL_ATTACHMENT: GLenum = 0x821A;
    pub const GL_BACK: GLenum = 0x0405;
    pub const GL_NONE: GLenum = 0;

    // Shader types
    pub const GL_VERTEX_SHADER: GLenum = 0x8B31;
    pub const GL_FRAGMENT_SHADER: GLenum = 0x8B30;
    pub const GL_COMPUTE_SHADER: GLenum = 0x91B9;

    // Capabilities
    pub const GL_BLEND: GLenum = 0x0BE2;
    pub const GL_CULL_FACE: GLenum = 0x0B44;
    pub const GL_DEPTH_TEST: GLenum = 0x0B71;
    pub const GL_DITHER: GLenum = 0x0BD0;
    pub const GL_POLYGON_OFFSET_FILL: GLenum = 0x8037;
    pub const GL_SAMPLE_ALPHA_TO_COVERAGE: GLenum = 0x809E;
    pub const GL_SAMPLE_COVERAGE: GLenum = 0x80A0;
    pub const GL_SCISSOR_TEST: GLenum = 0x0C11;
    pub const GL_STENCIL_TEST: GLenum = 0x0B90;
    pub const GL_RASTERIZER_DISCARD: GLenum = 0x8C89;

    // Blend factors / equations
    pub const GL_ZERO: GLenum = 0;
    pub const GL_ONE: GLenum = 1;
    pub const GL_SRC_COLOR: GLenum = 0x0300;
    pub const GL_ONE_MINUS_SRC_COLOR: GLenum = 0x0301;
    pub const GL_SRC_ALPHA: GLenum = 0x0302;
    pub const GL_ONE_MINUS_SRC_ALPHA: GLenum = 0x0303;
    pub const GL_DST_ALPHA: GLenum = 0x0304;
    pub const GL_ONE_MINUS_DST_ALPHA: GLenum = 0x0305;
    pub const GL_DST_COLOR: GLenum = 0x0306;
    pub const GL_ONE_MINUS_DST_COLOR: GLenum = 0x0307;
    pub const GL_FUNC_ADD: GLenum = 0x8006;
    pub const GL_FUNC_SUBTRACT: GLenum = 0x800A;
    pub const GL_FUNC_REVERSE_SUBTRACT: GLenum = 0x800B;
    pub const GL_MIN: GLenum = 0x8007;
    pub const GL_MAX: GLenum = 0x8008;

    // Depth / stencil funcs and ops
    pub const GL_NEVER: GLenum = 0x0200;
    pub const GL_LESS: GLenum = 0x0201;
    pub const GL_EQUAL: GLenum = 0x0202;
    pub const GL_LEQUAL: GLenum = 0x0203;
    pub const GL_GREATER: GLenum = 0x0204;
    pub const GL_NOTEQUAL: GLenum = 0x0205;
    pub const GL_GEQUAL: GLenum = 0x0206;
    pub const GL_ALWAYS: GLenum = 0x0207;
    pub const GL_KEEP: GLenum = 0x1E00;
    pub const GL_REPLACE: GLenum = 0x1E01;
    pub const GL_INCR: GLenum = 0x1E02;
    pub const GL_DECR: GLenum = 0x1E03;
    pub const GL_INVERT: GLenum = 0x150A;
    pub const GL_INCR_WRAP: GLenum = 0x8507;
    pub const GL_DECR_WRAP: GLenum = 0x8508;

    // Face culling / winding
    pub const GL_FRONT: GLenum = 0x0404;
    pub const GL_FRONT_AND_BACK: GLenum = 0x0408;
    pub const GL_CW: GLenum = 0x0900;
    pub const GL_CCW: GLenum = 0x0901;

    // Draw modes
    pub const GL_POINTS: GLenum = 0x0000;
    pub const GL_LINES: GLenum = 0x0001;
    pub const GL_LINE_LOOP: GLenum = 0x0002;
    pub const GL_LINE_STRIP: GLenum = 0x0003;
    pub const GL_TRIANGLES: GLenum = 0x0004;
    pub const GL_TRIANGLE_STRIP: GLenum = 0x0005;
    pub const GL_TRIANGLE_FAN: GLenum = 0x0006;

    // Clear bits
    pub const GL_COLOR_BUFFER_BIT: GLenum = 0x4000;
    pub const GL_DEPTH_BUFFER_BIT: GLenum = 0x0100;
    pub const GL_STENCIL_BUFFER_BIT: GLenum = 0x0400;

    // Sync
    pub const GL_SYNC_GPU_COMMANDS_COMPLETE: GLenum = 0x9117;
}

bitflags::bitflags! {
    /// `glMapBufferRange` access bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MapAccess: u32 {
        const READ = gl::GL_MAP_READ_BIT;
        const WRITE = gl::GL_MAP_WRITE_BIT;
        const INVALIDATE_RANGE = gl::GL_MAP_INVALIDATE_RANGE_BIT;
        const INVALIDATE_BUFFER = gl::GL_MAP_INVALIDATE_BUFFER_BIT;
        const FLUSH_EXPLICIT = gl::GL_MAP_FLUSH_EXPLICIT_BIT;
        const UNSYNCHRONIZED = gl::GL_MAP_UNSYNCHRONIZED_BIT;
        const PERSISTENT = gl::GL_MAP_PERSISTENT_BIT;
        const COHERENT = gl::GL_MAP_COHERENT_BIT;
    }
}

impl MapAccess {
    /// True when writes through this mapping may happen at any time without
    /// a map/unmap boundary to hook.
    pub fn is_coherent_persistent(self) -> bool {
        self.contains(MapAccess::PERSISTENT | MapAccess::COHERENT)
    }
}

/// Enum group a parameter belongs to, used to pick a symbolic name when
/// formatting replay source. `None` means "print the raw value".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumGroup {
    /// No known group; formatted as a hex literal.
    Unknown,
    BufferTarget,
    BufferUsage,
    TextureTarget,
    TextureParameter,
    TextureFilter,
    TextureWrap,
    PixelFormat,
    PixelType,
    FramebufferTarget,
    AttachmentPoint,
    ShaderType,
    Capability,
    BlendFactor,
    BlendEquation,
    CompareFunc,
    StencilOp,
    CullFaceMode,
    FrontFace,
    DrawMode,
    PixelStoreParameter,
    SyncCondition,
}

macro_rules! enum_names {
    ($value:expr, [$($name:ident),+ $(,)?]) => {
        match $value {
            $(x if x == gl::$name => Some(stringify!($name)),)+
            _ => None,
        }
    };
}

/// Symbolic name for a GL enum value within a known group, or `None` when
/// the value has no registered name (callers fall back to hex).
pub fn enum_name(group: EnumGroup, value: GLenum) -> Option<&'static str> {
    match group {
        EnumGroup::Unknown => None,
        EnumGroup::BufferTarget => enum_names!(
            value,
            [
                GL_ARRAY_BUFFER,
                GL_ELEMENT_ARRAY_BUFFER,
                GL_PIXEL_PACK_BUFFER,
                GL_PIXEL_UNPACK_BUFFER,
                GL_UNIFORM_BUFFER,
                GL_TRANSFORM_FEEDBACK_BUFFER,
                GL_COPY_READ_BUFFER,
                GL_COPY_WRITE_BUFFER,
                GL_SHADER_STORAGE_BUFFER,
            ]
        ),
        EnumGroup::BufferUsage => {
            enum_names!(value, [GL_STREAM_DRAW, GL_STATIC_DRAW, GL_DYNAMIC_DRAW])
        }
        EnumGroup::TextureTarget => enum_names!(
            value,
            [
                GL_TEXTURE_2D,
                GL_TEXTURE_3D,
                GL_TEXTURE_2D_ARRAY,
                GL_TEXTURE_CUBE_MAP,
                GL_TEXTURE_CUBE_MAP_POSITIVE_X,
                GL_TEXTURE_EXTERNAL_OES,
            ]
        ),
        EnumGroup::TextureParameter => enum_names!(
            value,
            [
                GL_TEXTURE_MIN_FILTER,
                GL_TEXTURE_MAG_FILTER,
                GL_TEXTURE_WRAP_S,
                GL_TEXTURE_WRAP_T,
                GL_TEXTURE_WRAP_R,
                GL_TEXTURE_MIN_LOD,
                GL_TEXTURE_MAX_LOD,
                GL_TEXTURE_BASE_LEVEL,
                GL_TEXTURE_MAX_LEVEL,
                GL_TEXTURE_SWIZZLE_R,
                GL_TEXTURE_SWIZZLE_G,
                GL_TEXTURE_SWIZZLE_B,
                GL_TEXTURE_SWIZZLE_A,
                GL_TEXTURE_COMPARE_MODE,
                GL_TEXTURE_COMPARE_FUNC,
            ]
        ),
        EnumGroup::TextureFilter => enum_names!(
            value,
            [
                GL_NEAREST,
                GL_LINEAR,
                GL_NEAREST_MIPMAP_NEAREST,
                GL_LINEAR_MIPMAP_NEAREST,
                GL_NEAREST_MIPMAP_LINEAR,
                GL_LINEAR_MIPMAP_LINEAR,
            ]
        ),
        EnumGroup::TextureWrap => {
            enum_names!(value, [GL_REPEAT, GL_CLAMP_TO_EDGE, GL_MIRRORED_REPEAT])
        }
        EnumGroup::PixelFormat => enum_names!(
            value,
            [
                GL_RGBA,
                GL_RGB,
                GL_RGBA8,
                GL_RGB8,
                GL_DEPTH_COMPONENT16,
                GL_DEPTH24_STENCIL8,
                GL_PALETTE4_RGBA8_OES,
                GL_PALETTE8_RGBA8_OES,
            ]
        ),
        EnumGroup::PixelType => enum_names!(
            value,
            [GL_UNSIGNED_BYTE, GL_FLOAT, GL_UNSIGNED_INT, GL_UNSIGNED_SHORT]
        ),
        EnumGroup::FramebufferTarget => enum_names!(
            value,
            [GL_FRAMEBUFFER, GL_READ_FRAMEBUFFER, GL_DRAW_FRAMEBUFFER, GL_RENDERBUFFER]
        ),
        EnumGroup::AttachmentPoint => enum_names!(
            value,
            [
                GL_COLOR_ATTACHMENT0,
                GL_DEPTH_ATTACHMENT,
                GL_STENCIL_ATTACHMENT,
                GL_DEPTH_STENCIL_ATTACHMENT,
            ]
        ),
        EnumGroup::ShaderType => {
            enum_names!(value, [GL_VERTEX_SHADER, GL_FRAGMENT_SHADER, GL_COMPUTE_SHADER])
        }
        EnumGroup::Capability => enum_names!(
            value,
            [
                GL_BLEND,
                GL_CULL_FACE,
                GL_DEPTH_TEST,
                GL_DITHER,
                GL_POLYGON_OFFSET_FILL,
                GL_SAMPLE_ALPHA_TO_COVERAGE,
                GL_SAMPLE_COVERAGE,
                GL_SCISSOR_TEST,
                GL_STENCIL_TEST,
                GL_RASTERIZER_DISCARD,
            ]
        ),
        EnumGroup::BlendFactor => enum_names!(
            value,
            [
                GL_ZERO,
                GL_ONE,
                GL_SRC_COLOR,
                GL_ONE_MINUS_SRC_COLOR,
                GL_SRC_ALPHA,
                GL_ONE_MINUS_SRC_ALPHA,
                GL_DST_ALPHA,
                GL_ONE_MINUS_DST_ALPHA,
                GL_DST_COLOR,
                GL_ONE_MINUS_DST_COLOR,
            ]
        ),
        EnumGroup::BlendEquation => enum_names!(
            value,
            [GL_FUNC_ADD, GL_FUNC_SUBTRACT, GL_FUNC_REVERSE_SUBTRACT, GL_MIN, GL_MAX]
        ),
        EnumGroup::CompareFunc => enum_names!(
            value,
            [
                GL_NEVER, GL_LESS, GL_EQUAL, GL_LEQUAL, GL_GREATER, GL_NOTEQUAL, GL_GEQUAL,
                GL_ALWAYS,
            ]
        ),
        EnumGroup::StencilOp => enum_names!(
            value,
            [
                GL_KEEP,
                GL_ZERO,
                GL_REPLACE,
                GL_INCR,
                GL_DECR,
                GL_INVERT,
                GL_INCR_WRAP,
                GL_DECR_WRAP,
            ]
        ),
        EnumGroup::CullFaceMode => enum_names!(value, [GL_FRONT, GL_BACK, GL_FRONT_AND_BACK]),
        EnumGroup::FrontFace => enum_names!(value, [GL_CW, GL_CCW]),
        EnumGroup::DrawMode => enum_names!(
            value,
            [
                GL_POINTS,
                GL_LINES,
                GL_LINE_LOOP,
                GL_LINE_STRIP,
                GL_TRIANGLES,
                GL_TRIANGLE_STRIP,
                GL_TRIANGLE_FAN,
            ]
        ),
        EnumGroup::PixelStoreParameter => enum_names!(
            value,
            [
                GL_UNPACK_ALIGNMENT,
                GL_PACK_ALIGNMENT,
                GL_UNPACK_ROW_LENGTH,
                GL_UNPACK_SKIP_ROWS,
                GL_UNPACK_SKIP_PIXELS,
            ]
        ),
        EnumGroup::SyncCondition => enum_names!(value, [GL_SYNC_GPU_COMMANDS_COMPLETE]),
    }
}

macro_rules! handle_id {
    ($(#[$doc:meta] $name:ident),+ $(,)?) => {
        $(
            #[$doc]
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
                Serialize, Deserialize,
            )]
            pub struct $name(pub u32);

            impl $name {
                /// Raw numeric handle value.
                pub fn value(self) -> u32 {
                    self.0
                }
            }

            impl From<u32> for $name {
                fn from(value: u32) -> Self {
                    Self(value)
                }
            }
        )+
    };
}

handle_id! {
    /// Buffer object handle.
    BufferId,
    /// Texture object handle.
    TextureId,
    /// Renderbuffer object handle.
    RenderbufferId,
    /// Shader or program object handle (one numeric ID space for both).
    ShaderProgramId,
    /// Sampler object handle.
    SamplerId,
    /// Fence sync object handle.
    SyncId,
    /// Framebuffer object handle.
    FramebufferId,
    /// Program pipeline object handle.
    ProgramPipelineId,
    /// Transform feedback object handle.
    TransformFeedbackId,
    /// Vertex array object handle.
    VertexArrayId,
    /// Query object handle.
    QueryId,
    /// Semaphore object handle.
    SemaphoreId,
    /// Memory object handle.
    MemoryObjectId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_name_lookup() {
        assert_eq!(
            enum_name(EnumGroup::DrawMode, gl::GL_TRIANGLES),
            Some("GL_TRIANGLES")
        );
        assert_eq!(
            enum_name(EnumGroup::BufferTarget, gl::GL_ARRAY_BUFFER),
            Some("GL_ARRAY_BUFFER")
        );
        assert_eq!(enum_name(EnumGroup::DrawMode, 0xFFFF), None);
        assert_eq!(enum_name(EnumGroup::Unknown, gl::GL_TRIANGLES), None);
    }

    #[test]
    fn test_map_access_coherent() {
        let coherent = MapAccess::WRITE | MapAccess::PERSISTENT | MapAccess::COHERENT;
        assert!(coherent.is_coherent_persistent());
        assert!(!(MapAccess::WRITE | MapAccess::PERSISTENT).is_coherent_persistent());
    }

    #[test]
    fn test_map_access_serde_round_trip() {
        let access = MapAccess::WRITE | MapAccess::PERSISTENT;
        let json = serde_json::to_string(&access).unwrap();
        let back: MapAccess = serde_json::from_str(&json).unwrap();
        assert_eq!(back, access);
    }
}
