// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Renderbuffer and framebuffer object synthesis.
//!
//! Renderbuffer contents are explicitly not restored, only their storage
//! allocation. Framebuffers are per-context objects; each attachment and
//! any non-default draw-buffer set becomes a call.

use gles::{
    gl, AttachmentPoint, ContextId, ContextSnapshot, EntryPoint, EnumGroup, FramebufferSnapshot,
    ResourceType, ShareGroupSnapshot,
};

use super::{call, gen_one, p_enum, p_handle, p_int};
use crate::call::{CallRecord, Param, ParamValue};
use crate::tracker::ResourceTracker;

pub(super) fn synthesize_renderbuffers(
    group: &ShareGroupSnapshot,
    main: ContextId,
    tracker: &mut ResourceTracker,
) -> Vec<CallRecord> {
    let mut calls = Vec::new();
    for rb in &group.renderbuffers {
        let id = rb.id.value();
        tracker
            .resource_mut(main, ResourceType::Renderbuffer)
            .set_starting_resource(id);
        tracker.note_handle(ResourceType::Renderbuffer, id);

        let mut setup = gen_one(
            EntryPoint::GenRenderbuffers,
            main,
            ResourceType::Renderbuffer,
            id,
        );
        setup.push(call(
            EntryPoint::BindRenderbuffer,
            main,
            vec![
                p_enum("target", EnumGroup::FramebufferTarget, gl::GL_RENDERBUFFER),
                p_handle("renderbuffer", ResourceType::Renderbuffer, id),
            ],
        ));
        setup.push(if rb.samples > 0 {
            call(
                EntryPoint::RenderbufferStorageMultisample,
                main,
                vec![
                    p_enum("target", EnumGroup::FramebufferTarget, gl::GL_RENDERBUFFER),
                    p_int("samples", rb.samples),
                    p_enum("internalformat", EnumGroup::PixelFormat, rb.internal_format),
                    p_int("width", rb.width),
                    p_int("height", rb.height),
                ],
            )
        } else {
            call(
                EntryPoint::RenderbufferStorage,
                main,
                vec![
                    p_enum("target", EnumGroup::FramebufferTarget, gl::GL_RENDERBUFFER),
                    p_enum("internalformat", EnumGroup::PixelFormat, rb.internal_format),
                    p_int("width", rb.width),
                    p_int("height", rb.height),
                ],
            )
        });

        let renderbuffers = tracker.resource_mut(main, ResourceType::Renderbuffer);
        *renderbuffers.regen_calls_mut(id) = setup.clone();
        calls.extend(setup);
    }
    calls
}

pub(super) fn synthesize(
    snapshot: &ContextSnapshot,
    tracker: &mut ResourceTracker,
) -> Vec<CallRecord> {
    let context = snapshot.id;
    let mut calls = Vec::new();
    for fb in &snapshot.framebuffers {
        let id = fb.id.value();
        tracker
            .resource_mut(context, ResourceType::Framebuffer)
            .set_starting_resource(id);
        tracker.note_handle(ResourceType::Framebuffer, id);

        let setup = synthesize_one(fb, context);
        let framebuffers = tracker.resource_mut(context, ResourceType::Framebuffer);
        *framebuffers.regen_calls_mut(id) = setup.clone();
        calls.extend(setup);
    }
    calls
}

fn synthesize_one(fb: &FramebufferSnapshot, context: ContextId) -> Vec<CallRecord> {
    let id = fb.id.value();
    let mut setup = gen_one(
        EntryPoint::GenFramebuffers,
        context,
        ResourceType::Framebuffer,
        id,
    );
    setup.push(call(
        EntryPoint::BindFramebuffer,
        context,
        vec![
            p_enum("target", EnumGroup::FramebufferTarget, gl::GL_FRAMEBUFFER),
            p_handle("framebuffer", ResourceType::Framebuffer, id),
        ],
    ));

    for attachment in &fb.attachments {
        setup.push(match attachment.point {
            AttachmentPoint::Texture {
                id: tex,
                level,
                layer: Some(layer),
            } => call(
                EntryPoint::FramebufferTextureLayer,
                context,
                vec![
                    p_enum("target", EnumGroup::FramebufferTarget, gl::GL_FRAMEBUFFER),
                    p_enum("attachment", EnumGroup::AttachmentPoint, attachment.attachment),
                    p_handle("texture", ResourceType::Texture, tex.value()),
                    p_int("level", level),
                    p_int("layer", layer),
                ],
            ),
            AttachmentPoint::Texture {
                id: tex,
                level,
                layer: None,
            } => call(
                EntryPoint::FramebufferTexture2D,
                context,
                vec![
                    p_enum("target", EnumGroup::FramebufferTarget, gl::GL_FRAMEBUFFER),
                    p_enum("attachment", EnumGroup::AttachmentPoint, attachment.attachment),
                    p_enum("textarget", EnumGroup::TextureTarget, gl::GL_TEXTURE_2D),
                    p_handle("texture", ResourceType::Texture, tex.value()),
                    p_int("level", level),
                ],
            ),
            AttachmentPoint::Renderbuffer { id: rb } => call(
                EntryPoint::FramebufferRenderbuffer,
                context,
                vec![
                    p_enum("target", EnumGroup::FramebufferTarget, gl::GL_FRAMEBUFFER),
                    p_enum("attachment", EnumGroup::AttachmentPoint, attachment.attachment),
                    p_enum(
                        "renderbuffertarget",
                        EnumGroup::FramebufferTarget,
                        gl::GL_RENDERBUFFER,
                    ),
                    p_handle("renderbuffer", ResourceType::Renderbuffer, rb.value()),
                ],
            ),
        });
    }

    if fb.draw_buffers != FramebufferSnapshot::default_draw_buffers() {
        setup.push(call(
            EntryPoint::DrawBuffers,
            context,
            vec![
                p_int("n", fb.draw_buffers.len() as i32),
                Param::new(
                    "bufs",
                    ParamValue::EnumArray {
                        group: EnumGroup::AttachmentPoint,
                        values: fb.draw_buffers.clone(),
                    },
                ),
            ],
        ));
    }
    if fb.read_buffer != gl::GL_COLOR_ATTACHMENT0 {
        setup.push(call(
            EntryPoint::ReadBuffer,
            context,
            vec![p_enum("src", EnumGroup::AttachmentPoint, fb.read_buffer)],
        ));
    }
    setup
}

#[cfg(test)]
mod tests {
    use super::*;
    use gles::{AttachmentSnapshot, FramebufferId, RenderbufferId, RenderbufferSnapshot, TextureId};

    #[test]
    fn test_multisampled_renderbuffer_storage() {
        let mut group = ShareGroupSnapshot::default();
        group.renderbuffers.push(RenderbufferSnapshot {
            id: RenderbufferId(2),
            internal_format: gl::GL_DEPTH24_STENCIL8,
            width: 64,
            height: 64,
            samples: 4,
        });
        let mut tracker = ResourceTracker::new();
        let calls = synthesize_renderbuffers(&group, ContextId(1), &mut tracker);
        assert!(calls
            .iter()
            .any(|c| c.entry == EntryPoint::RenderbufferStorageMultisample));
    }

    fn fb(id: u32) -> FramebufferSnapshot {
        FramebufferSnapshot {
            id: FramebufferId(id),
            attachments: vec![AttachmentSnapshot {
                attachment: gl::GL_COLOR_ATTACHMENT0,
                point: AttachmentPoint::Texture {
                    id: TextureId(3),
                    level: 0,
                    layer: None,
                },
            }],
            draw_buffers: FramebufferSnapshot::default_draw_buffers(),
            read_buffer: gl::GL_COLOR_ATTACHMENT0,
        }
    }

    #[test]
    fn test_framebuffer_attachment_emitted() {
        let mut snapshot = ContextSnapshot::new(ContextId(1));
        snapshot.framebuffers.push(fb(5));
        let mut tracker = ResourceTracker::new();
        let calls = synthesize(&snapshot, &mut tracker);

        assert!(calls
            .iter()
            .any(|c| c.entry == EntryPoint::FramebufferTexture2D));
        // Default draw buffers need no call.
        assert!(!calls.iter().any(|c| c.entry == EntryPoint::DrawBuffers));
        // Framebuffers are per-context.
        assert!(tracker
            .resource(ContextId(1), ResourceType::Framebuffer)
            .unwrap()
            .starting()
            .contains(&5));
        assert!(tracker
            .resource(ContextId(2), ResourceType::Framebuffer)
            .is_none());
    }

    #[test]
    fn test_non_default_draw_buffers_emitted() {
        let mut snapshot = ContextSnapshot::new(ContextId(1));
        let mut framebuffer = fb(5);
        framebuffer.draw_buffers = vec![gl::GL_COLOR_ATTACHMENT0, gl::GL_COLOR_ATTACHMENT0 + 1];
        snapshot.framebuffers.push(framebuffer);
        let mut tracker = ResourceTracker::new();
        let calls = synthesize(&snapshot, &mut tracker);
        assert!(calls.iter().any(|c| c.entry == EntryPoint::DrawBuffers));
    }
}
