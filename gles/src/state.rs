// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Live-state snapshots
//!
//! The dispatch layer materializes these structs from the real object model
//! and hands them to the capture engine. The `Default` impls encode the
//! GLES context-creation defaults, which is what mid-execution capture
//! diffs against: a field that equals its default needs no setup call.
//!
//! Defaults here are the *actual* spec defaults for each object type, not
//! zero-initialized values (a fresh sampler's wrap mode is `GL_REPEAT`, a
//! fresh context's blend destination factor is `GL_ZERO` but its source
//! factor is `GL_ONE`).

use serde::{Deserialize, Serialize};

use crate::types::{gl, GLenum, MapAccess};
use crate::types::{
    BufferId, FramebufferId, RenderbufferId, SamplerId, ShaderProgramId, SyncId, TextureId,
    VertexArrayId,
};

/// Identity of one GL context within a share group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ContextId(pub u32);

impl ContextId {
    pub fn value(self) -> u32 {
        self.0
    }
}

/// An active `glMapBufferRange` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRange {
    pub offset: usize,
    pub length: usize,
    pub access: MapAccess,
}

/// One live buffer object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferSnapshot {
    pub id: BufferId,
    /// Full current contents.
    pub data: Vec<u8>,
    pub usage: GLenum,
    /// Set when the buffer was allocated with immutable storage; replay must
    /// use the storage call, not the data call.
    pub immutable: bool,
    /// Storage flags for immutable buffers.
    pub storage_flags: GLenum,
    /// Present when the buffer is currently mapped.
    pub mapped: Option<MapRange>,
}

/// One mip level (or layer-complete level for array/3D targets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TexLevelSnapshot {
    pub level: i32,
    pub internal_format: GLenum,
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    pub format: GLenum,
    pub pixel_type: GLenum,
    /// `None` for levels whose contents cannot be read back (the readback
    /// path is capability-gated); such levels are allocated but left empty.
    pub data: Option<Vec<u8>>,
    pub compressed: bool,
}

/// Texture parameter state. Defaults per the GLES spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureParams {
    pub min_filter: GLenum,
    pub mag_filter: GLenum,
    pub wrap_s: GLenum,
    pub wrap_t: GLenum,
    pub wrap_r: GLenum,
    pub base_level: i32,
    pub max_level: i32,
    pub swizzle_r: GLenum,
    pub swizzle_g: GLenum,
    pub swizzle_b: GLenum,
    pub swizzle_a: GLenum,
    pub compare_mode: GLenum,
    pub compare_func: GLenum,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            min_filter: gl::GL_NEAREST_MIPMAP_LINEAR,
            mag_filter: gl::GL_LINEAR,
            wrap_s: gl::GL_REPEAT,
            wrap_t: gl::GL_REPEAT,
            wrap_r: gl::GL_REPEAT,
            base_level: 0,
            max_level: 1000,
            swizzle_r: 0x1903, // GL_RED
            swizzle_g: 0x1904, // GL_GREEN
            swizzle_b: 0x1905, // GL_BLUE
            swizzle_a: 0x1906, // GL_ALPHA
            compare_mode: gl::GL_NONE,
            compare_func: gl::GL_LEQUAL,
        }
    }
}

/// One live texture object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureSnapshot {
    pub id: TextureId,
    pub target: GLenum,
    /// Texture unit the texture is bound under, if bound.
    pub bound_unit: Option<u32>,
    pub params: TextureParams,
    pub immutable: bool,
    /// Level count for immutable textures.
    pub immutable_levels: i32,
    pub levels: Vec<TexLevelSnapshot>,
}

/// Shader stage of an ID in the shader/program union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaderKind {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderKind {
    pub fn gl_enum(self) -> GLenum {
        match self {
            ShaderKind::Vertex => gl::GL_VERTEX_SHADER,
            ShaderKind::Fragment => gl::GL_FRAGMENT_SHADER,
            ShaderKind::Compute => gl::GL_COMPUTE_SHADER,
        }
    }
}

/// One live shader object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderSnapshot {
    pub id: ShaderProgramId,
    pub kind: ShaderKind,
    pub source: String,
    pub compiled: bool,
}

/// A uniform's current value, by GLSL base type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UniformValue {
    Int(Vec<i32>),
    Uint(Vec<u32>),
    Float(Vec<f32>),
    /// Column-major matrix data; `dim` is 2, 3 or 4.
    Matrix { dim: i32, data: Vec<f32> },
}

/// One active uniform in a linked program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformSnapshot {
    pub name: String,
    pub location: i32,
    pub value: UniformValue,
}

/// One uniform block binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformBlockSnapshot {
    pub index: u32,
    pub name: String,
    pub binding: u32,
}

/// One live program object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSnapshot {
    pub id: ShaderProgramId,
    pub linked: bool,
    /// Shaders still attached; used for deferred-link reconstruction of
    /// programs that have never been linked.
    pub attached_shaders: Vec<ShaderProgramId>,
    /// Post-link source per stage, used for the relink-from-source dance
    /// (program binaries are not portable and never captured).
    pub stage_sources: Vec<(ShaderKind, String)>,
    pub attrib_bindings: Vec<(String, u32)>,
    pub uniforms: Vec<UniformSnapshot>,
    pub uniform_blocks: Vec<UniformBlockSnapshot>,
}

/// One live renderbuffer object. Contents are explicitly not restored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderbufferSnapshot {
    pub id: RenderbufferId,
    pub internal_format: GLenum,
    pub width: i32,
    pub height: i32,
    pub samples: i32,
}

/// What a framebuffer attachment points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentPoint {
    Texture {
        id: TextureId,
        level: i32,
        /// `Some` for layered attachments.
        layer: Option<i32>,
    },
    Renderbuffer {
        id: RenderbufferId,
    },
}

/// One framebuffer attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSnapshot {
    /// `GL_COLOR_ATTACHMENT0 + n`, depth, stencil or depth-stencil.
    pub attachment: GLenum,
    pub point: AttachmentPoint,
}

/// One live framebuffer object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramebufferSnapshot {
    pub id: FramebufferId,
    pub attachments: Vec<AttachmentSnapshot>,
    /// Draw buffer set when it differs from the single-attachment default.
    pub draw_buffers: Vec<GLenum>,
    pub read_buffer: GLenum,
}

impl FramebufferSnapshot {
    /// Default draw-buffer state of a fresh application framebuffer.
    pub fn default_draw_buffers() -> Vec<GLenum> {
        vec![gl::GL_COLOR_ATTACHMENT0]
    }
}

/// Sampler parameter state. Same defaults as [`TextureParams`] except the
/// LOD clamp fields, which samplers expose directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerParams {
    pub min_filter: GLenum,
    pub mag_filter: GLenum,
    pub wrap_s: GLenum,
    pub wrap_t: GLenum,
    pub wrap_r: GLenum,
    pub min_lod: f32,
    pub max_lod: f32,
    pub compare_mode: GLenum,
    pub compare_func: GLenum,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            min_filter: gl::GL_NEAREST_MIPMAP_LINEAR,
            mag_filter: gl::GL_LINEAR,
            wrap_s: gl::GL_REPEAT,
            wrap_t: gl::GL_REPEAT,
            wrap_r: gl::GL_REPEAT,
            min_lod: -1000.0,
            max_lod: 1000.0,
            compare_mode: gl::GL_NONE,
            compare_func: gl::GL_LEQUAL,
        }
    }
}

/// One live sampler object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerSnapshot {
    pub id: SamplerId,
    pub params: SamplerParams,
    /// Texture units this sampler is bound to.
    pub bound_units: Vec<u32>,
}

/// One live fence sync object. Syncs have no contents, only existence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub id: SyncId,
    pub condition: GLenum,
    pub flags: GLenum,
}

/// One vertex attribute's array configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexAttribSnapshot {
    pub index: u32,
    pub enabled: bool,
    pub size: i32,
    pub attrib_type: GLenum,
    pub normalized: bool,
    pub stride: i32,
    pub offset: usize,
    pub buffer: BufferId,
    pub divisor: u32,
}

/// One live vertex array object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexArraySnapshot {
    pub id: VertexArrayId,
    pub element_buffer: Option<BufferId>,
    pub attribs: Vec<VertexAttribSnapshot>,
}

/// Blend unit state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendState {
    pub enabled: bool,
    pub src_rgb: GLenum,
    pub dst_rgb: GLenum,
    pub src_alpha: GLenum,
    pub dst_alpha: GLenum,
    pub equation_rgb: GLenum,
    pub equation_alpha: GLenum,
    pub color: [f32; 4],
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src_rgb: gl::GL_ONE,
            dst_rgb: gl::GL_ZERO,
            src_alpha: gl::GL_ONE,
            dst_alpha: gl::GL_ZERO,
            equation_rgb: gl::GL_FUNC_ADD,
            equation_alpha: gl::GL_FUNC_ADD,
            color: [0.0; 4],
        }
    }
}

/// Depth and stencil unit state. Front and back stencil state are tracked
/// separately because the separate entry points exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_func: GLenum,
    pub depth_mask: bool,
    pub depth_range: [f32; 2],
    pub stencil_test: bool,
    pub stencil_front_func: GLenum,
    pub stencil_front_ref: i32,
    pub stencil_front_value_mask: u32,
    pub stencil_front_write_mask: u32,
    pub stencil_front_ops: [GLenum; 3],
    pub stencil_back_func: GLenum,
    pub stencil_back_ref: i32,
    pub stencil_back_value_mask: u32,
    pub stencil_back_write_mask: u32,
    pub stencil_back_ops: [GLenum; 3],
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_func: gl::GL_LESS,
            depth_mask: true,
            depth_range: [0.0, 1.0],
            stencil_test: false,
            stencil_front_func: gl::GL_ALWAYS,
            stencil_front_ref: 0,
            stencil_front_value_mask: u32::MAX,
            stencil_front_write_mask: u32::MAX,
            stencil_front_ops: [gl::GL_KEEP; 3],
            stencil_back_func: gl::GL_ALWAYS,
            stencil_back_ref: 0,
            stencil_back_value_mask: u32::MAX,
            stencil_back_write_mask: u32::MAX,
            stencil_back_ops: [gl::GL_KEEP; 3],
        }
    }
}

/// Rasterizer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterizerState {
    pub cull_face: bool,
    pub cull_mode: GLenum,
    pub front_face: GLenum,
    pub polygon_offset_fill: bool,
    pub polygon_offset_factor: f32,
    pub polygon_offset_units: f32,
    pub line_width: f32,
    pub rasterizer_discard: bool,
    pub sample_coverage_enabled: bool,
    pub sample_coverage_value: f32,
    pub sample_coverage_invert: bool,
    pub sample_alpha_to_coverage: bool,
    pub dither: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            cull_face: false,
            cull_mode: gl::GL_BACK,
            front_face: gl::GL_CCW,
            polygon_offset_fill: false,
            polygon_offset_factor: 0.0,
            polygon_offset_units: 0.0,
            line_width: 1.0,
            rasterizer_discard: false,
            sample_coverage_enabled: false,
            sample_coverage_value: 1.0,
            sample_coverage_invert: false,
            sample_alpha_to_coverage: false,
            dither: true,
        }
    }
}

/// Pixel-store unpack/pack state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelStoreState {
    pub unpack_alignment: i32,
    pub pack_alignment: i32,
    pub unpack_row_length: i32,
    pub unpack_skip_rows: i32,
    pub unpack_skip_pixels: i32,
}

impl Default for PixelStoreState {
    fn default() -> Self {
        Self {
            unpack_alignment: 4,
            pack_alignment: 4,
            unpack_row_length: 0,
            unpack_skip_rows: 0,
            unpack_skip_pixels: 0,
        }
    }
}

/// What is bound under one texture unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextureUnitBinding {
    pub unit: u32,
    pub target: GLenum,
    pub texture: TextureId,
    pub sampler: SamplerId,
}

/// Context-global state, diffed field by field against `Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    pub blend: BlendState,
    pub depth_stencil: DepthStencilState,
    pub rasterizer: RasterizerState,
    pub pixel_store: PixelStoreState,
    /// `[x, y, w, h]`; the snapshot always carries the real values since the
    /// context-creation default depends on the surface.
    pub viewport: [i32; 4],
    pub scissor_test: bool,
    pub scissor: [i32; 4],
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: i32,
    pub color_mask: [bool; 4],
    pub active_texture_unit: u32,
    pub array_buffer: BufferId,
    pub current_program: ShaderProgramId,
    pub vertex_array: VertexArrayId,
    pub renderbuffer: RenderbufferId,
    pub draw_framebuffer: FramebufferId,
    pub read_framebuffer: FramebufferId,
    /// Only non-default units appear here.
    pub texture_units: Vec<TextureUnitBinding>,
    /// Current generic vertex-attrib values that differ from `(0,0,0,1)`.
    pub vertex_attrib_defaults: Vec<(u32, [f32; 4])>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            blend: BlendState::default(),
            depth_stencil: DepthStencilState::default(),
            rasterizer: RasterizerState::default(),
            pixel_store: PixelStoreState::default(),
            viewport: [0; 4],
            scissor_test: false,
            scissor: [0; 4],
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            color_mask: [true; 4],
            active_texture_unit: 0,
            array_buffer: BufferId(0),
            current_program: ShaderProgramId(0),
            vertex_array: VertexArrayId(0),
            renderbuffer: RenderbufferId(0),
            draw_framebuffer: FramebufferId(0),
            read_framebuffer: FramebufferId(0),
            texture_units: Vec::new(),
            vertex_attrib_defaults: Vec::new(),
        }
    }
}

/// All shared objects of one share group, in one place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareGroupSnapshot {
    pub buffers: Vec<BufferSnapshot>,
    pub textures: Vec<TextureSnapshot>,
    pub renderbuffers: Vec<RenderbufferSnapshot>,
    pub shaders: Vec<ShaderSnapshot>,
    pub programs: Vec<ProgramSnapshot>,
    pub samplers: Vec<SamplerSnapshot>,
    pub syncs: Vec<SyncSnapshot>,
}

/// One context's full live state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub id: ContextId,
    pub global: GlobalState,
    pub framebuffers: Vec<FramebufferSnapshot>,
    pub vertex_arrays: Vec<VertexArraySnapshot>,
    /// Buffer currently bound to `GL_PIXEL_UNPACK_BUFFER`, which must be
    /// unbound before synthesized uploads.
    pub pixel_unpack_buffer: BufferId,
}

impl ContextSnapshot {
    /// An empty context snapshot at API defaults.
    pub fn new(id: ContextId) -> Self {
        Self {
            id,
            global: GlobalState::default(),
            framebuffers: Vec::new(),
            vertex_arrays: Vec::new(),
            pixel_unpack_buffer: BufferId(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_defaults_are_not_zero() {
        // Diffing against a zero-initialized value instead of the real
        // defaults would emit spurious (or miss required) setup calls.
        let params = SamplerParams::default();
        assert_eq!(params.wrap_s, gl::GL_REPEAT);
        assert_eq!(params.min_filter, gl::GL_NEAREST_MIPMAP_LINEAR);
        assert_eq!(params.max_lod, 1000.0);
    }

    #[test]
    fn test_blend_defaults() {
        let blend = BlendState::default();
        assert!(!blend.enabled);
        assert_eq!(blend.src_rgb, gl::GL_ONE);
        assert_eq!(blend.dst_rgb, gl::GL_ZERO);
        assert_eq!(blend.equation_rgb, gl::GL_FUNC_ADD);
    }

    #[test]
    fn test_global_state_default_roundtrip() {
        let state = GlobalState::default();
        let json = serde_json::to_string(&state).unwrap();
        let back: GlobalState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
