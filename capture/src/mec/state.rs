// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Vertex array and context-global state synthesis.
//!
//! Global state is diffed field by field against the GLES context-creation
//! defaults. The subset the replayed frames can perturb themselves (program
//! binding, vertex-array binding, blend function/equation, color mask,
//! blend color) additionally gets a reset call recorded with the loop-start
//! value, so each loop iteration restores it without replaying the whole
//! setup.

use gles::{
    gl, ContextId, ContextSnapshot, EntryPoint, EnumGroup, GLenum, GlobalState, ResourceType,
    VertexArraySnapshot,
};

use super::{call, gen_one, p_bool, p_enum, p_float, p_handle, p_int, p_uint};
use crate::call::CallRecord;
use crate::tracker::ResourceTracker;

pub(super) fn synthesize_vertex_arrays(
    snapshot: &ContextSnapshot,
    tracker: &mut ResourceTracker,
) -> Vec<CallRecord> {
    let context = snapshot.id;
    let mut calls = Vec::new();
    for vao in &snapshot.vertex_arrays {
        let id = vao.id.value();
        tracker
            .resource_mut(context, ResourceType::VertexArray)
            .set_starting_resource(id);
        tracker.note_handle(ResourceType::VertexArray, id);

        let setup = synthesize_one_vao(vao, context);
        let vaos = tracker.resource_mut(context, ResourceType::VertexArray);
        *vaos.regen_calls_mut(id) = setup.clone();
        calls.extend(setup);
    }
    calls
}

fn synthesize_one_vao(vao: &VertexArraySnapshot, context: ContextId) -> Vec<CallRecord> {
    let id = vao.id.value();
    let mut setup = gen_one(
        EntryPoint::GenVertexArrays,
        context,
        ResourceType::VertexArray,
        id,
    );
    setup.push(bind_vertex_array(context, id));
    if let Some(element_buffer) = vao.element_buffer {
        setup.push(bind_buffer(
            context,
            gl::GL_ELEMENT_ARRAY_BUFFER,
            element_buffer.value(),
        ));
    }
    for attrib in &vao.attribs {
        if attrib.buffer.value() != 0 {
            setup.push(bind_buffer(context, gl::GL_ARRAY_BUFFER, attrib.buffer.value()));
        }
        setup.push(call(
            EntryPoint::VertexAttribPointer,
            context,
            vec![
                p_uint("index", attrib.index),
                p_int("size", attrib.size),
                p_enum("type", EnumGroup::PixelType, attrib.attrib_type),
                p_bool("normalized", attrib.normalized),
                p_int("stride", attrib.stride),
                p_int("offset", attrib.offset as i32),
            ],
        ));
        if attrib.enabled {
            setup.push(call(
                EntryPoint::EnableVertexAttribArray,
                context,
                vec![p_uint("index", attrib.index)],
            ));
        }
        if attrib.divisor != 0 {
            setup.push(call(
                EntryPoint::VertexAttribDivisor,
                context,
                vec![p_uint("index", attrib.index), p_uint("divisor", attrib.divisor)],
            ));
        }
    }
    setup
}

/// Diff the context-global state against the creation defaults. Returns the
/// setup calls and the per-loop reset calls.
pub(super) fn synthesize_global(
    snapshot: &ContextSnapshot,
) -> (Vec<CallRecord>, Vec<CallRecord>) {
    let context = snapshot.id;
    let state = &snapshot.global;
    let defaults = GlobalState::default();
    let mut setup = Vec::new();

    // Capabilities.
    let mut cap = |enabled: bool, default: bool, capability: GLenum| {
        if enabled != default {
            setup.push(enable_disable(context, capability, enabled));
        }
    };
    cap(state.blend.enabled, defaults.blend.enabled, gl::GL_BLEND);
    cap(
        state.depth_stencil.depth_test,
        defaults.depth_stencil.depth_test,
        gl::GL_DEPTH_TEST,
    );
    cap(
        state.depth_stencil.stencil_test,
        defaults.depth_stencil.stencil_test,
        gl::GL_STENCIL_TEST,
    );
    cap(state.scissor_test, defaults.scissor_test, gl::GL_SCISSOR_TEST);
    cap(
        state.rasterizer.cull_face,
        defaults.rasterizer.cull_face,
        gl::GL_CULL_FACE,
    );
    cap(
        state.rasterizer.polygon_offset_fill,
        defaults.rasterizer.polygon_offset_fill,
        gl::GL_POLYGON_OFFSET_FILL,
    );
    cap(
        state.rasterizer.rasterizer_discard,
        defaults.rasterizer.rasterizer_discard,
        gl::GL_RASTERIZER_DISCARD,
    );
    cap(
        state.rasterizer.sample_coverage_enabled,
        defaults.rasterizer.sample_coverage_enabled,
        gl::GL_SAMPLE_COVERAGE,
    );
    cap(
        state.rasterizer.sample_alpha_to_coverage,
        defaults.rasterizer.sample_alpha_to_coverage,
        gl::GL_SAMPLE_ALPHA_TO_COVERAGE,
    );
    cap(state.rasterizer.dither, defaults.rasterizer.dither, gl::GL_DITHER);
    drop(cap);

    // Blend unit.
    let b = &state.blend;
    let bd = &defaults.blend;
    if (b.src_rgb, b.dst_rgb, b.src_alpha, b.dst_alpha)
        != (bd.src_rgb, bd.dst_rgb, bd.src_alpha, bd.dst_alpha)
    {
        setup.push(blend_func_separate(context, b));
    }
    if (b.equation_rgb, b.equation_alpha) != (bd.equation_rgb, bd.equation_alpha) {
        setup.push(blend_equation_separate(context, b));
    }
    if b.color != bd.color {
        setup.push(blend_color(context, b.color));
    }
    if state.color_mask != defaults.color_mask {
        setup.push(color_mask(context, state.color_mask));
    }

    // Depth and stencil.
    let d = &state.depth_stencil;
    let dd = &defaults.depth_stencil;
    if d.depth_func != dd.depth_func {
        setup.push(call(
            EntryPoint::DepthFunc,
            context,
            vec![p_enum("func", EnumGroup::CompareFunc, d.depth_func)],
        ));
    }
    if d.depth_mask != dd.depth_mask {
        setup.push(call(
            EntryPoint::DepthMask,
            context,
            vec![p_bool("flag", d.depth_mask)],
        ));
    }
    if d.depth_range != dd.depth_range {
        setup.push(call(
            EntryPoint::DepthRangef,
            context,
            vec![p_float("n", d.depth_range[0]), p_float("f", d.depth_range[1])],
        ));
    }
    for (face, func, reference, value_mask, write_mask, ops, dfunc, dref, dvmask, dwmask, dops) in [
        (
            gl::GL_FRONT,
            d.stencil_front_func,
            d.stencil_front_ref,
            d.stencil_front_value_mask,
            d.stencil_front_write_mask,
            d.stencil_front_ops,
            dd.stencil_front_func,
            dd.stencil_front_ref,
            dd.stencil_front_value_mask,
            dd.stencil_front_write_mask,
            dd.stencil_front_ops,
        ),
        (
            gl::GL_BACK,
            d.stencil_back_func,
            d.stencil_back_ref,
            d.stencil_back_value_mask,
            d.stencil_back_write_mask,
            d.stencil_back_ops,
            dd.stencil_back_func,
            dd.stencil_back_ref,
            dd.stencil_back_value_mask,
            dd.stencil_back_write_mask,
            dd.stencil_back_ops,
        ),
    ] {
        if (func, reference, value_mask) != (dfunc, dref, dvmask) {
            setup.push(call(
                EntryPoint::StencilFuncSeparate,
                context,
                vec![
                    p_enum("face", EnumGroup::CullFaceMode, face),
                    p_enum("func", EnumGroup::CompareFunc, func),
                    p_int("ref", reference),
                    p_uint("mask", value_mask),
                ],
            ));
        }
        if write_mask != dwmask {
            setup.push(call(
                EntryPoint::StencilMaskSeparate,
                context,
                vec![
                    p_enum("face", EnumGroup::CullFaceMode, face),
                    p_uint("mask", write_mask),
                ],
            ));
        }
        if ops != dops {
            setup.push(call(
                EntryPoint::StencilOpSeparate,
                context,
                vec![
                    p_enum("face", EnumGroup::CullFaceMode, face),
                    p_enum("sfail", EnumGroup::StencilOp, ops[0]),
                    p_enum("dpfail", EnumGroup::StencilOp, ops[1]),
                    p_enum("dppass", EnumGroup::StencilOp, ops[2]),
                ],
            ));
        }
    }

    // Rasterizer.
    let r = &state.rasterizer;
    let rd = &defaults.rasterizer;
    if r.cull_mode != rd.cull_mode {
        setup.push(call(
            EntryPoint::CullFace,
            context,
            vec![p_enum("mode", EnumGroup::CullFaceMode, r.cull_mode)],
        ));
    }
    if r.front_face != rd.front_face {
        setup.push(call(
            EntryPoint::FrontFace,
            context,
            vec![p_enum("mode", EnumGroup::FrontFace, r.front_face)],
        ));
    }
    if (r.polygon_offset_factor, r.polygon_offset_units)
        != (rd.polygon_offset_factor, rd.polygon_offset_units)
    {
        setup.push(call(
            EntryPoint::PolygonOffset,
            context,
            vec![
                p_float("factor", r.polygon_offset_factor),
                p_float("units", r.polygon_offset_units),
            ],
        ));
    }
    if r.line_width != rd.line_width {
        setup.push(call(
            EntryPoint::LineWidth,
            context,
            vec![p_float("width", r.line_width)],
        ));
    }
    if (r.sample_coverage_value, r.sample_coverage_invert)
        != (rd.sample_coverage_value, rd.sample_coverage_invert)
    {
        setup.push(call(
            EntryPoint::SampleCoverage,
            context,
            vec![
                p_float("value", r.sample_coverage_value),
                p_bool("invert", r.sample_coverage_invert),
            ],
        ));
    }

    // Pixel store.
    let p = &state.pixel_store;
    let pd = &defaults.pixel_store;
    let mut store = |pname: GLenum, value: i32, default: i32| {
        if value != default {
            setup.push(call(
                EntryPoint::PixelStorei,
                context,
                vec![
                    p_enum("pname", EnumGroup::PixelStoreParameter, pname),
                    p_int("param", value),
                ],
            ));
        }
    };
    store(gl::GL_UNPACK_ALIGNMENT, p.unpack_alignment, pd.unpack_alignment);
    store(gl::GL_PACK_ALIGNMENT, p.pack_alignment, pd.pack_alignment);
    store(gl::GL_UNPACK_ROW_LENGTH, p.unpack_row_length, pd.unpack_row_length);
    store(gl::GL_UNPACK_SKIP_ROWS, p.unpack_skip_rows, pd.unpack_skip_rows);
    store(gl::GL_UNPACK_SKIP_PIXELS, p.unpack_skip_pixels, pd.unpack_skip_pixels);
    drop(store);

    // Viewport always carries real values; the creation default depends on
    // the surface.
    setup.push(call(
        EntryPoint::Viewport,
        context,
        vec![
            p_int("x", state.viewport[0]),
            p_int("y", state.viewport[1]),
            p_int("width", state.viewport[2]),
            p_int("height", state.viewport[3]),
        ],
    ));
    if state.scissor != defaults.scissor {
        setup.push(call(
            EntryPoint::Scissor,
            context,
            vec![
                p_int("x", state.scissor[0]),
                p_int("y", state.scissor[1]),
                p_int("width", state.scissor[2]),
                p_int("height", state.scissor[3]),
            ],
        ));
    }
    if state.clear_color != defaults.clear_color {
        setup.push(call(
            EntryPoint::ClearColor,
            context,
            vec![
                p_float("red", state.clear_color[0]),
                p_float("green", state.clear_color[1]),
                p_float("blue", state.clear_color[2]),
                p_float("alpha", state.clear_color[3]),
            ],
        ));
    }
    if state.clear_depth != defaults.clear_depth {
        setup.push(call(
            EntryPoint::ClearDepthf,
            context,
            vec![p_float("d", state.clear_depth)],
        ));
    }
    if state.clear_stencil != defaults.clear_stencil {
        setup.push(call(
            EntryPoint::ClearStencil,
            context,
            vec![p_int("s", state.clear_stencil)],
        ));
    }

    // Texture unit bindings, then restore the active unit.
    for unit in &state.texture_units {
        setup.push(call(
            EntryPoint::ActiveTexture,
            context,
            vec![p_enum(
                "texture",
                EnumGroup::TextureTarget,
                gl::GL_TEXTURE0 + unit.unit,
            )],
        ));
        if unit.texture.value() != 0 {
            setup.push(call(
                EntryPoint::BindTexture,
                context,
                vec![
                    p_enum("target", EnumGroup::TextureTarget, unit.target),
                    p_handle("texture", ResourceType::Texture, unit.texture.value()),
                ],
            ));
        }
        if unit.sampler.value() != 0 {
            setup.push(call(
                EntryPoint::BindSampler,
                context,
                vec![
                    p_uint("unit", unit.unit),
                    p_handle("sampler", ResourceType::Sampler, unit.sampler.value()),
                ],
            ));
        }
    }
    setup.push(call(
        EntryPoint::ActiveTexture,
        context,
        vec![p_enum(
            "texture",
            EnumGroup::TextureTarget,
            gl::GL_TEXTURE0 + state.active_texture_unit,
        )],
    ));

    // Generic vertex attribute values.
    for (index, value) in &state.vertex_attrib_defaults {
        setup.push(call(
            EntryPoint::VertexAttrib4f,
            context,
            vec![
                p_uint("index", *index),
                p_float("x", value[0]),
                p_float("y", value[1]),
                p_float("z", value[2]),
                p_float("w", value[3]),
            ],
        ));
    }

    // Object bindings last, after everything they reference exists.
    if state.array_buffer.value() != 0 {
        setup.push(bind_buffer(context, gl::GL_ARRAY_BUFFER, state.array_buffer.value()));
    }
    if state.renderbuffer.value() != 0 {
        setup.push(call(
            EntryPoint::BindRenderbuffer,
            context,
            vec![
                p_enum("target", EnumGroup::FramebufferTarget, gl::GL_RENDERBUFFER),
                p_handle(
                    "renderbuffer",
                    ResourceType::Renderbuffer,
                    state.renderbuffer.value(),
                ),
            ],
        ));
    }
    if state.draw_framebuffer == state.read_framebuffer {
        if state.draw_framebuffer.value() != 0 {
            setup.push(bind_framebuffer(
                context,
                gl::GL_FRAMEBUFFER,
                state.draw_framebuffer.value(),
            ));
        }
    } else {
        setup.push(bind_framebuffer(
            context,
            gl::GL_DRAW_FRAMEBUFFER,
            state.draw_framebuffer.value(),
        ));
        setup.push(bind_framebuffer(
            context,
            gl::GL_READ_FRAMEBUFFER,
            state.read_framebuffer.value(),
        ));
    }
    setup.push(use_program(context, state.current_program.value()));
    setup.push(bind_vertex_array(context, state.vertex_array.value()));

    // Reset calls: state the replayed frames can perturb, restored once per
    // loop iteration with the loop-start values.
    let reset = vec![
        use_program(context, state.current_program.value()),
        bind_vertex_array(context, state.vertex_array.value()),
        blend_func_separate(context, b),
        blend_equation_separate(context, b),
        color_mask(context, state.color_mask),
        blend_color(context, b.color),
    ];

    (setup, reset)
}

fn enable_disable(context: ContextId, capability: GLenum, enabled: bool) -> CallRecord {
    call(
        if enabled {
            EntryPoint::Enable
        } else {
            EntryPoint::Disable
        },
        context,
        vec![p_enum("cap", EnumGroup::Capability, capability)],
    )
}

fn blend_func_separate(context: ContextId, b: &gles::BlendState) -> CallRecord {
    call(
        EntryPoint::BlendFuncSeparate,
        context,
        vec![
            p_enum("srcRGB", EnumGroup::BlendFactor, b.src_rgb),
            p_enum("dstRGB", EnumGroup::BlendFactor, b.dst_rgb),
            p_enum("srcAlpha", EnumGroup::BlendFactor, b.src_alpha),
            p_enum("dstAlpha", EnumGroup::BlendFactor, b.dst_alpha),
        ],
    )
}

fn blend_equation_separate(context: ContextId, b: &gles::BlendState) -> CallRecord {
    call(
        EntryPoint::BlendEquationSeparate,
        context,
        vec![
            p_enum("modeRGB", EnumGroup::BlendEquation, b.equation_rgb),
            p_enum("modeAlpha", EnumGroup::BlendEquation, b.equation_alpha),
        ],
    )
}

fn blend_color(context: ContextId, color: [f32; 4]) -> CallRecord {
    call(
        EntryPoint::BlendColor,
        context,
        vec![
            p_float("red", color[0]),
            p_float("green", color[1]),
            p_float("blue", color[2]),
            p_float("alpha", color[3]),
        ],
    )
}

fn color_mask(context: ContextId, mask: [bool; 4]) -> CallRecord {
    call(
        EntryPoint::ColorMask,
        context,
        vec![
            p_bool("red", mask[0]),
            p_bool("green", mask[1]),
            p_bool("blue", mask[2]),
            p_bool("alpha", mask[3]),
        ],
    )
}

fn use_program(context: ContextId, id: u32) -> CallRecord {
    call(
        EntryPoint::UseProgram,
        context,
        vec![p_handle("program", ResourceType::ShaderProgram, id)],
    )
}

fn bind_vertex_array(context: ContextId, id: u32) -> CallRecord {
    call(
        EntryPoint::BindVertexArray,
        context,
        vec![p_handle("array", ResourceType::VertexArray, id)],
    )
}

fn bind_buffer(context: ContextId, target: GLenum, id: u32) -> CallRecord {
    call(
        EntryPoint::BindBuffer,
        context,
        vec![
            p_enum("target", EnumGroup::BufferTarget, target),
            p_handle("buffer", ResourceType::Buffer, id),
        ],
    )
}

fn bind_framebuffer(context: ContextId, target: GLenum, id: u32) -> CallRecord {
    call(
        EntryPoint::BindFramebuffer,
        context,
        vec![
            p_enum("target", EnumGroup::FramebufferTarget, target),
            p_handle("framebuffer", ResourceType::Framebuffer, id),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gles::{BufferId, ShaderProgramId, VertexArrayId, VertexAttribSnapshot};

    #[test]
    fn test_default_state_emits_only_viewport_bindings_and_active_unit() {
        let snapshot = ContextSnapshot::new(ContextId(1));
        let (setup, _) = synthesize_global(&snapshot);
        let entries: Vec<EntryPoint> = setup.iter().map(|c| c.entry).collect();
        assert_eq!(
            entries,
            vec![
                EntryPoint::Viewport,
                EntryPoint::ActiveTexture,
                EntryPoint::UseProgram,
                EntryPoint::BindVertexArray,
            ]
        );
    }

    #[test]
    fn test_enabled_blend_diffed() {
        let mut snapshot = ContextSnapshot::new(ContextId(1));
        snapshot.global.blend.enabled = true;
        snapshot.global.blend.src_rgb = gl::GL_SRC_ALPHA;
        snapshot.global.blend.dst_rgb = gl::GL_ONE_MINUS_SRC_ALPHA;
        let (setup, _) = synthesize_global(&snapshot);

        assert!(setup.iter().any(|c| c.entry == EntryPoint::Enable));
        assert!(setup
            .iter()
            .any(|c| c.entry == EntryPoint::BlendFuncSeparate));
    }

    #[test]
    fn test_disabled_dither_diffed() {
        // Dither defaults to enabled; diffing against zero-initialized state
        // would miss the Disable call.
        let mut snapshot = ContextSnapshot::new(ContextId(1));
        snapshot.global.rasterizer.dither = false;
        let (setup, _) = synthesize_global(&snapshot);
        let disable = setup
            .iter()
            .find(|c| c.entry == EntryPoint::Disable)
            .unwrap();
        assert_eq!(
            disable.param("cap"),
            Some(&crate::call::ParamValue::Enum {
                group: EnumGroup::Capability,
                value: gl::GL_DITHER
            })
        );
    }

    #[test]
    fn test_reset_calls_carry_loop_start_values() {
        let mut snapshot = ContextSnapshot::new(ContextId(1));
        snapshot.global.current_program = ShaderProgramId(6);
        let (_, reset) = synthesize_global(&snapshot);

        let use_prog = reset
            .iter()
            .find(|c| c.entry == EntryPoint::UseProgram)
            .unwrap();
        assert_eq!(
            use_prog.param("program"),
            Some(&crate::call::ParamValue::Handle {
                ty: ResourceType::ShaderProgram,
                id: 6
            })
        );
        assert!(reset.iter().any(|c| c.entry == EntryPoint::ColorMask));
        assert!(reset.iter().any(|c| c.entry == EntryPoint::BlendColor));
    }

    #[test]
    fn test_vao_synthesis_binds_attrib_buffers() {
        let mut snapshot = ContextSnapshot::new(ContextId(1));
        snapshot.vertex_arrays.push(VertexArraySnapshot {
            id: VertexArrayId(2),
            element_buffer: Some(BufferId(4)),
            attribs: vec![VertexAttribSnapshot {
                index: 0,
                enabled: true,
                size: 3,
                attrib_type: gl::GL_FLOAT,
                normalized: false,
                stride: 12,
                offset: 0,
                buffer: BufferId(5),
                divisor: 1,
            }],
        });
        let mut tracker = ResourceTracker::new();
        let calls = synthesize_vertex_arrays(&snapshot, &mut tracker);

        assert!(calls
            .iter()
            .any(|c| c.entry == EntryPoint::VertexAttribPointer));
        assert!(calls
            .iter()
            .any(|c| c.entry == EntryPoint::EnableVertexAttribArray));
        assert!(calls
            .iter()
            .any(|c| c.entry == EntryPoint::VertexAttribDivisor));
        // Element buffer bound while the VAO is bound.
        let vao_bind = calls
            .iter()
            .position(|c| c.entry == EntryPoint::BindVertexArray)
            .unwrap();
        let ebo_bind = calls
            .iter()
            .position(|c| {
                c.entry == EntryPoint::BindBuffer
                    && c.param("target")
                        == Some(&crate::call::ParamValue::Enum {
                            group: EnumGroup::BufferTarget,
                            value: gl::GL_ELEMENT_ARRAY_BUFFER,
                        })
            })
            .unwrap();
        assert!(vao_bind < ebo_bind);
    }
}
