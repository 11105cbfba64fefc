// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Texture and sampler object synthesis.

use gles::{
    gl, ContextId, EntryPoint, EnumGroup, GLenum, ResourceType, ShareGroupSnapshot,
    TexLevelSnapshot, TextureParams, TextureSnapshot,
};

use super::{call, gen_one, p_data, p_enum, p_float, p_handle, p_int, p_uint};
use crate::binary_data::BinaryDataStore;
use crate::call::CallRecord;
use crate::tracker::ResourceTracker;

pub(super) fn synthesize(
    group: &ShareGroupSnapshot,
    main: ContextId,
    tracker: &mut ResourceTracker,
    binary: &mut BinaryDataStore,
) -> Vec<CallRecord> {
    let mut calls = Vec::new();
    for texture in &group.textures {
        let id = texture.id.value();
        tracker
            .resource_mut(main, ResourceType::Texture)
            .set_starting_resource(id);
        tracker.note_handle(ResourceType::Texture, id);

        let setup = synthesize_one(texture, main, binary);
        let restore = restore_calls(texture, main, binary);

        let textures = tracker.resource_mut(main, ResourceType::Texture);
        *textures.regen_calls_mut(id) = setup.clone();
        *textures.restore_calls_mut(id) = restore;

        calls.extend(setup);
    }
    calls
}

/// Gen, bind under the right unit, apply non-default parameters, allocate
/// and upload every non-empty level.
fn synthesize_one(
    texture: &TextureSnapshot,
    main: ContextId,
    binary: &mut BinaryDataStore,
) -> Vec<CallRecord> {
    let id = texture.id.value();
    let mut setup = gen_one(EntryPoint::GenTextures, main, ResourceType::Texture, id);
    if let Some(unit) = texture.bound_unit {
        setup.push(active_texture(main, unit));
    }
    setup.push(bind_texture(main, texture.target, id));
    setup.extend(param_diff_calls(main, texture.target, &texture.params));

    if texture.immutable {
        // Storage allocation is regen-only; immutability means the call can
        // never be issued a second time against the same object.
        let level0 = texture
            .levels
            .first()
            .unwrap_or_else(|| panic!("immutable texture {id} with no level data"));
        setup.push(if level0.depth > 1 {
            call(
                EntryPoint::TexStorage3D,
                main,
                vec![
                    p_enum("target", EnumGroup::TextureTarget, texture.target),
                    p_int("levels", texture.immutable_levels),
                    p_enum("internalformat", EnumGroup::PixelFormat, level0.internal_format),
                    p_int("width", level0.width),
                    p_int("height", level0.height),
                    p_int("depth", level0.depth),
                ],
            )
        } else {
            call(
                EntryPoint::TexStorage2D,
                main,
                vec![
                    p_enum("target", EnumGroup::TextureTarget, texture.target),
                    p_int("levels", texture.immutable_levels),
                    p_enum("internalformat", EnumGroup::PixelFormat, level0.internal_format),
                    p_int("width", level0.width),
                    p_int("height", level0.height),
                ],
            )
        });
    }

    for level in &texture.levels {
        setup.extend(level_upload(main, texture, level, texture.immutable, binary));
    }
    setup
}

/// Content-only repopulation: bind, then sub-image every readable level.
fn restore_calls(
    texture: &TextureSnapshot,
    main: ContextId,
    binary: &mut BinaryDataStore,
) -> Vec<CallRecord> {
    let mut calls = vec![bind_texture(main, texture.target, texture.id.value())];
    for level in &texture.levels {
        calls.extend(level_upload(main, texture, level, true, binary));
    }
    calls
}

/// The upload call(s) for one level. `sub_image` selects the sub-image form
/// (immutable storage and restores; the full image form respecifies).
fn level_upload(
    main: ContextId,
    texture: &TextureSnapshot,
    level: &TexLevelSnapshot,
    sub_image: bool,
    binary: &mut BinaryDataStore,
) -> Vec<CallRecord> {
    let Some(data) = &level.data else {
        // Readback is capability-gated; unreadable levels are allocated via
        // the storage/image call but left empty.
        if sub_image || level.compressed {
            return Vec::new();
        }
        return vec![tex_image(main, texture.target, level, None)];
    };

    if level.compressed {
        let payload = if is_paletted(level.internal_format) {
            // The readback path expands paletted formats to RGBA8; pack the
            // pixels back into the palette format's bit layout so the
            // replayed upload round-trips.
            pack_paletted(level.internal_format, data)
        } else {
            data.clone()
        };
        let param = p_data("data", binary, &payload);
        let entry = if sub_image {
            EntryPoint::CompressedTexSubImage2D
        } else {
            EntryPoint::CompressedTexImage2D
        };
        return vec![if sub_image {
            call(
                entry,
                main,
                vec![
                    p_enum("target", EnumGroup::TextureTarget, texture.target),
                    p_int("level", level.level),
                    p_int("xoffset", 0),
                    p_int("yoffset", 0),
                    p_int("width", level.width),
                    p_int("height", level.height),
                    p_enum("format", EnumGroup::PixelFormat, level.internal_format),
                    p_int("imageSize", payload.len() as i32),
                    param,
                ],
            )
        } else {
            call(
                entry,
                main,
                vec![
                    p_enum("target", EnumGroup::TextureTarget, texture.target),
                    p_int("level", level.level),
                    p_enum("internalformat", EnumGroup::PixelFormat, level.internal_format),
                    p_int("width", level.width),
                    p_int("height", level.height),
                    p_int("border", 0),
                    p_int("imageSize", payload.len() as i32),
                    param,
                ],
            )
        }];
    }

    if sub_image {
        let entry = if level.depth > 1 {
            EntryPoint::TexSubImage3D
        } else {
            EntryPoint::TexSubImage2D
        };
        let mut params = vec![
            p_enum("target", EnumGroup::TextureTarget, texture.target),
            p_int("level", level.level),
            p_int("xoffset", 0),
            p_int("yoffset", 0),
        ];
        if level.depth > 1 {
            params.push(p_int("zoffset", 0));
        }
        params.push(p_int("width", level.width));
        params.push(p_int("height", level.height));
        if level.depth > 1 {
            params.push(p_int("depth", level.depth));
        }
        params.push(p_enum("format", EnumGroup::PixelFormat, level.format));
        params.push(p_enum("type", EnumGroup::PixelType, level.pixel_type));
        params.push(p_data("pixels", binary, data));
        vec![call(entry, main, params)]
    } else {
        vec![tex_image(main, texture.target, level, Some((data, binary)))]
    }
}

fn tex_image(
    main: ContextId,
    target: GLenum,
    level: &TexLevelSnapshot,
    data: Option<(&Vec<u8>, &mut BinaryDataStore)>,
) -> CallRecord {
    let entry = if level.depth > 1 {
        EntryPoint::TexImage3D
    } else {
        EntryPoint::TexImage2D
    };
    let mut params = vec![
        p_enum("target", EnumGroup::TextureTarget, target),
        p_int("level", level.level),
        p_enum("internalformat", EnumGroup::PixelFormat, level.internal_format),
        p_int("width", level.width),
        p_int("height", level.height),
    ];
    if level.depth > 1 {
        params.push(p_int("depth", level.depth));
    }
    params.push(p_int("border", 0));
    params.push(p_enum("format", EnumGroup::PixelFormat, level.format));
    params.push(p_enum("type", EnumGroup::PixelType, level.pixel_type));
    match data {
        Some((bytes, binary)) => params.push(p_data("pixels", binary, bytes)),
        None => params.push(crate::call::Param::new(
            "pixels",
            crate::call::ParamValue::Uint(0),
        )),
    }
    call(entry, main, params)
}

fn param_diff_calls(main: ContextId, target: GLenum, params: &TextureParams) -> Vec<CallRecord> {
    let defaults = TextureParams::default();
    let mut calls = Vec::new();
    let mut diff_i = |pname: GLenum, value: GLenum, default: GLenum| {
        if value != default {
            calls.push(call(
                EntryPoint::TexParameteri,
                main,
                vec![
                    p_enum("target", EnumGroup::TextureTarget, target),
                    p_enum("pname", EnumGroup::TextureParameter, pname),
                    p_int("param", value as i32),
                ],
            ));
        }
    };
    diff_i(gl::GL_TEXTURE_MIN_FILTER, params.min_filter, defaults.min_filter);
    diff_i(gl::GL_TEXTURE_MAG_FILTER, params.mag_filter, defaults.mag_filter);
    diff_i(gl::GL_TEXTURE_WRAP_S, params.wrap_s, defaults.wrap_s);
    diff_i(gl::GL_TEXTURE_WRAP_T, params.wrap_t, defaults.wrap_t);
    diff_i(gl::GL_TEXTURE_WRAP_R, params.wrap_r, defaults.wrap_r);
    diff_i(
        gl::GL_TEXTURE_BASE_LEVEL,
        params.base_level as GLenum,
        defaults.base_level as GLenum,
    );
    diff_i(
        gl::GL_TEXTURE_MAX_LEVEL,
        params.max_level as GLenum,
        defaults.max_level as GLenum,
    );
    diff_i(gl::GL_TEXTURE_SWIZZLE_R, params.swizzle_r, defaults.swizzle_r);
    diff_i(gl::GL_TEXTURE_SWIZZLE_G, params.swizzle_g, defaults.swizzle_g);
    diff_i(gl::GL_TEXTURE_SWIZZLE_B, params.swizzle_b, defaults.swizzle_b);
    diff_i(gl::GL_TEXTURE_SWIZZLE_A, params.swizzle_a, defaults.swizzle_a);
    diff_i(gl::GL_TEXTURE_COMPARE_MODE, params.compare_mode, defaults.compare_mode);
    diff_i(gl::GL_TEXTURE_COMPARE_FUNC, params.compare_func, defaults.compare_func);
    drop(diff_i);
    calls
}

fn active_texture(main: ContextId, unit: u32) -> CallRecord {
    call(
        EntryPoint::ActiveTexture,
        main,
        vec![p_enum(
            "texture",
            EnumGroup::TextureTarget,
            gl::GL_TEXTURE0 + unit,
        )],
    )
}

fn bind_texture(main: ContextId, target: GLenum, id: u32) -> CallRecord {
    call(
        EntryPoint::BindTexture,
        main,
        vec![
            p_enum("target", EnumGroup::TextureTarget, target),
            p_handle("texture", ResourceType::Texture, id),
        ],
    )
}

fn is_paletted(internal_format: GLenum) -> bool {
    matches!(
        internal_format,
        gl::GL_PALETTE4_RGBA8_OES | gl::GL_PALETTE8_RGBA8_OES
    )
}

/// Re-compress RGBA8 pixels into a paletted format's bit layout: the RGBA8
/// palette table first, then packed indices. Aborts if the image uses more
/// distinct colors than the palette can hold, which cannot happen for data
/// that was originally paletted.
fn pack_paletted(internal_format: GLenum, rgba: &[u8]) -> Vec<u8> {
    assert_eq!(rgba.len() % 4, 0, "paletted source must be RGBA8");
    let (capacity, bits) = match internal_format {
        gl::GL_PALETTE4_RGBA8_OES => (16usize, 4u32),
        gl::GL_PALETTE8_RGBA8_OES => (256, 8),
        _ => unreachable!("no palette layout for format 0x{internal_format:X}"),
    };

    let mut palette: Vec<[u8; 4]> = Vec::new();
    let mut indices: Vec<u8> = Vec::with_capacity(rgba.len() / 4);
    for pixel in rgba.chunks_exact(4) {
        let color = [pixel[0], pixel[1], pixel[2], pixel[3]];
        let index = match palette.iter().position(|&c| c == color) {
            Some(i) => i,
            None => {
                assert!(
                    palette.len() < capacity,
                    "palette overflow re-compressing format 0x{internal_format:X}"
                );
                palette.push(color);
                palette.len() - 1
            }
        };
        indices.push(index as u8);
    }

    let mut out = Vec::with_capacity(capacity * 4 + indices.len());
    for i in 0..capacity {
        out.extend_from_slice(palette.get(i).unwrap_or(&[0; 4]));
    }
    if bits == 4 {
        for pair in indices.chunks(2) {
            let hi = pair[0] << 4;
            let lo = pair.get(1).copied().unwrap_or(0);
            out.push(hi | lo);
        }
    } else {
        out.extend_from_slice(&indices);
    }
    out
}

/// Expand a packed paletted image back to RGBA8 (the readback direction).
#[cfg(test)]
fn unpack_paletted(internal_format: GLenum, packed: &[u8], pixels: usize) -> Vec<u8> {
    let (capacity, bits) = match internal_format {
        gl::GL_PALETTE4_RGBA8_OES => (16usize, 4u32),
        gl::GL_PALETTE8_RGBA8_OES => (256, 8),
        _ => unreachable!(),
    };
    let table = &packed[..capacity * 4];
    let data = &packed[capacity * 4..];
    let mut out = Vec::with_capacity(pixels * 4);
    for i in 0..pixels {
        let index = if bits == 4 {
            let byte = data[i / 2];
            if i % 2 == 0 {
                (byte >> 4) as usize
            } else {
                (byte & 0x0F) as usize
            }
        } else {
            data[i] as usize
        };
        out.extend_from_slice(&table[index * 4..index * 4 + 4]);
    }
    out
}

/// Sampler synthesis. Same parameter diffing as textures, plus rebinding to
/// every unit the sampler was attached to.
pub(super) fn synthesize_samplers(
    group: &ShareGroupSnapshot,
    main: ContextId,
    tracker: &mut ResourceTracker,
) -> Vec<CallRecord> {
    let mut calls = Vec::new();
    let defaults = gles::SamplerParams::default();
    for sampler in &group.samplers {
        let id = sampler.id.value();
        tracker
            .resource_mut(main, ResourceType::Sampler)
            .set_starting_resource(id);
        tracker.note_handle(ResourceType::Sampler, id);

        let mut setup = gen_one(EntryPoint::GenSamplers, main, ResourceType::Sampler, id);
        let p = &sampler.params;
        let mut diff_i = |pname: GLenum, value: GLenum, default: GLenum| {
            if value != default {
                setup.push(call(
                    EntryPoint::SamplerParameteri,
                    main,
                    vec![
                        p_handle("sampler", ResourceType::Sampler, id),
                        p_enum("pname", EnumGroup::TextureParameter, pname),
                        p_int("param", value as i32),
                    ],
                ));
            }
        };
        diff_i(gl::GL_TEXTURE_MIN_FILTER, p.min_filter, defaults.min_filter);
        diff_i(gl::GL_TEXTURE_MAG_FILTER, p.mag_filter, defaults.mag_filter);
        diff_i(gl::GL_TEXTURE_WRAP_S, p.wrap_s, defaults.wrap_s);
        diff_i(gl::GL_TEXTURE_WRAP_T, p.wrap_t, defaults.wrap_t);
        diff_i(gl::GL_TEXTURE_WRAP_R, p.wrap_r, defaults.wrap_r);
        diff_i(gl::GL_TEXTURE_COMPARE_MODE, p.compare_mode, defaults.compare_mode);
        diff_i(gl::GL_TEXTURE_COMPARE_FUNC, p.compare_func, defaults.compare_func);
        drop(diff_i);
        if p.min_lod != defaults.min_lod {
            setup.push(sampler_parameter_f(main, id, gl::GL_TEXTURE_MIN_LOD, p.min_lod));
        }
        if p.max_lod != defaults.max_lod {
            setup.push(sampler_parameter_f(main, id, gl::GL_TEXTURE_MAX_LOD, p.max_lod));
        }
        for &unit in &sampler.bound_units {
            setup.push(call(
                EntryPoint::BindSampler,
                main,
                vec![
                    p_uint("unit", unit),
                    p_handle("sampler", ResourceType::Sampler, id),
                ],
            ));
        }

        let samplers = tracker.resource_mut(main, ResourceType::Sampler);
        *samplers.regen_calls_mut(id) = setup.clone();
        calls.extend(setup);
    }
    calls
}

fn sampler_parameter_f(main: ContextId, id: u32, pname: GLenum, value: f32) -> CallRecord {
    call(
        EntryPoint::SamplerParameterf,
        main,
        vec![
            p_handle("sampler", ResourceType::Sampler, id),
            p_enum("pname", EnumGroup::TextureParameter, pname),
            p_float("param", value),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gles::{SamplerId, SamplerParams, SamplerSnapshot, TextureId};

    fn texture(id: u32) -> TextureSnapshot {
        TextureSnapshot {
            id: TextureId(id),
            target: gl::GL_TEXTURE_2D,
            bound_unit: Some(2),
            params: TextureParams::default(),
            immutable: false,
            immutable_levels: 0,
            levels: vec![TexLevelSnapshot {
                level: 0,
                internal_format: gl::GL_RGBA8,
                width: 2,
                height: 2,
                depth: 1,
                format: gl::GL_RGBA,
                pixel_type: gl::GL_UNSIGNED_BYTE,
                data: Some(vec![0xFF; 16]),
                compressed: false,
            }],
        }
    }

    #[test]
    fn test_default_params_emit_no_parameter_calls() {
        let mut group = ShareGroupSnapshot::default();
        group.textures.push(texture(1));
        let mut tracker = ResourceTracker::new();
        let mut binary = BinaryDataStore::new();
        let calls = synthesize(&group, ContextId(1), &mut tracker, &mut binary);
        assert!(!calls.iter().any(|c| c.entry == EntryPoint::TexParameteri));
    }

    #[test]
    fn test_non_default_param_diffed() {
        let mut tex = texture(1);
        tex.params.wrap_s = gl::GL_CLAMP_TO_EDGE;
        let mut group = ShareGroupSnapshot::default();
        group.textures.push(tex);
        let mut tracker = ResourceTracker::new();
        let mut binary = BinaryDataStore::new();
        let calls = synthesize(&group, ContextId(1), &mut tracker, &mut binary);
        let params: Vec<_> = calls
            .iter()
            .filter(|c| c.entry == EntryPoint::TexParameteri)
            .collect();
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_immutable_storage_only_in_regen() {
        let mut tex = texture(5);
        tex.immutable = true;
        tex.immutable_levels = 1;
        let mut group = ShareGroupSnapshot::default();
        group.textures.push(tex);
        let mut tracker = ResourceTracker::new();
        let mut binary = BinaryDataStore::new();
        synthesize(&group, ContextId(1), &mut tracker, &mut binary);

        let textures = tracker.resource(ContextId(1), ResourceType::Texture).unwrap();
        let regen = textures.regen_calls(5).unwrap();
        assert!(regen.iter().any(|c| c.entry == EntryPoint::TexStorage2D));
        let restore = textures.restore_calls(5).unwrap();
        assert!(!restore.iter().any(|c| c.entry == EntryPoint::TexStorage2D));
        assert!(restore.iter().any(|c| c.entry == EntryPoint::TexSubImage2D));
    }

    #[test]
    fn test_bound_unit_selected_before_bind() {
        let mut group = ShareGroupSnapshot::default();
        group.textures.push(texture(1));
        let mut tracker = ResourceTracker::new();
        let mut binary = BinaryDataStore::new();
        let calls = synthesize(&group, ContextId(1), &mut tracker, &mut binary);
        let active = calls
            .iter()
            .position(|c| c.entry == EntryPoint::ActiveTexture)
            .unwrap();
        let bind = calls
            .iter()
            .position(|c| c.entry == EntryPoint::BindTexture)
            .unwrap();
        assert!(active < bind);
    }

    #[test]
    fn test_paletted_round_trip() {
        // Two distinct colors in a 2x2 image.
        let rgba = vec![
            10, 20, 30, 40, //
            10, 20, 30, 40, //
            50, 60, 70, 80, //
            10, 20, 30, 40,
        ];
        for format in [gl::GL_PALETTE4_RGBA8_OES, gl::GL_PALETTE8_RGBA8_OES] {
            let packed = pack_paletted(format, &rgba);
            let back = unpack_paletted(format, &packed, 4);
            assert_eq!(back, rgba, "format 0x{format:X}");
        }
    }

    #[test]
    fn test_sampler_lod_diffed_as_float_call() {
        let mut group = ShareGroupSnapshot::default();
        group.samplers.push(SamplerSnapshot {
            id: SamplerId(3),
            params: SamplerParams {
                max_lod: 4.0,
                ..SamplerParams::default()
            },
            bound_units: vec![1],
        });
        let mut tracker = ResourceTracker::new();
        let calls = synthesize_samplers(&group, ContextId(1), &mut tracker);
        assert!(calls.iter().any(|c| c.entry == EntryPoint::SamplerParameterf));
        assert!(calls.iter().any(|c| c.entry == EntryPoint::BindSampler));
    }
}
