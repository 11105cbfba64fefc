// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Buffer object synthesis.

use gles::{gl, ContextId, EntryPoint, EnumGroup, ResourceType, ShareGroupSnapshot};

use super::{call, gen_one, p_data, p_enum, p_handle, p_int};
use crate::binary_data::BinaryDataStore;
use crate::call::CallRecord;
use crate::tracker::ResourceTracker;

/// Recreate every live buffer: gen, allocate (immutable storage or mutable
/// data), upload full contents, and reproduce any live mapping.
///
/// A buffer bound to `GL_PIXEL_UNPACK_BUFFER` would make the synthesized
/// uploads read from it instead of client memory, so it is unbound first and
/// rebound afterwards.
pub(super) fn synthesize(
    group: &ShareGroupSnapshot,
    main: ContextId,
    pixel_unpack_buffer: gles::BufferId,
    tracker: &mut ResourceTracker,
    binary: &mut BinaryDataStore,
) -> Vec<CallRecord> {
    let mut calls = Vec::new();
    if group.buffers.is_empty() {
        return calls;
    }

    let unpack_bound = pixel_unpack_buffer.value() != 0;
    if unpack_bound {
        calls.push(bind_buffer(main, gl::GL_PIXEL_UNPACK_BUFFER, 0));
    }

    for buffer in &group.buffers {
        let id = buffer.id.value();
        tracker
            .resource_mut(main, ResourceType::Buffer)
            .set_starting_resource(id);
        tracker.note_handle(ResourceType::Buffer, id);
        if buffer.immutable {
            tracker.set_buffer_immutable(id);
        }

        let mut setup = gen_one(EntryPoint::GenBuffers, main, ResourceType::Buffer, id);
        setup.push(bind_buffer(main, gl::GL_ARRAY_BUFFER, id));
        if buffer.immutable {
            setup.push(call(
                EntryPoint::BufferStorage,
                main,
                vec![
                    p_enum("target", EnumGroup::BufferTarget, gl::GL_ARRAY_BUFFER),
                    p_int("size", buffer.data.len() as i32),
                    p_data("data", binary, &buffer.data),
                    super::p_bitfield("flags", buffer.storage_flags),
                ],
            ));
        } else {
            setup.push(call(
                EntryPoint::BufferData,
                main,
                vec![
                    p_enum("target", EnumGroup::BufferTarget, gl::GL_ARRAY_BUFFER),
                    p_int("size", buffer.data.len() as i32),
                    p_data("data", binary, &buffer.data),
                    p_enum("usage", EnumGroup::BufferUsage, buffer.usage),
                ],
            ));
        }

        if let Some(map) = buffer.mapped {
            setup.push(call(
                EntryPoint::MapBufferRange,
                main,
                vec![
                    p_enum("target", EnumGroup::BufferTarget, gl::GL_ARRAY_BUFFER),
                    p_int("offset", map.offset as i32),
                    p_int("length", map.length as i32),
                    super::p_bitfield("access", map.access.bits()),
                    p_handle("buffer", ResourceType::Buffer, id),
                ],
            ));
            tracker.set_buffer_mapped(id, true);
        }

        // Regen recreates the object from scratch; restore only repopulates
        // contents of the still-existing object.
        let buffers = tracker.resource_mut(main, ResourceType::Buffer);
        *buffers.regen_calls_mut(id) = setup.clone();
        *buffers.restore_calls_mut(id) = vec![
            bind_buffer(main, gl::GL_ARRAY_BUFFER, id),
            buffer_sub_data(main, 0, &buffer.data, binary),
        ];

        calls.extend(setup);
    }

    if unpack_bound {
        calls.push(bind_buffer(
            main,
            gl::GL_PIXEL_UNPACK_BUFFER,
            pixel_unpack_buffer.value(),
        ));
    }
    calls
}

fn bind_buffer(context: ContextId, target: u32, id: u32) -> CallRecord {
    call(
        EntryPoint::BindBuffer,
        context,
        vec![
            p_enum("target", EnumGroup::BufferTarget, target),
            p_handle("buffer", ResourceType::Buffer, id),
        ],
    )
}

fn buffer_sub_data(
    context: ContextId,
    offset: usize,
    data: &[u8],
    binary: &mut BinaryDataStore,
) -> CallRecord {
    call(
        EntryPoint::BufferSubData,
        context,
        vec![
            p_enum("target", EnumGroup::BufferTarget, gl::GL_ARRAY_BUFFER),
            p_int("offset", offset as i32),
            p_int("size", data.len() as i32),
            p_data("data", binary, data),
        ],
    )
}
