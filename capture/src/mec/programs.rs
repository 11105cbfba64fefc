// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Shader and program object synthesis.
//!
//! Program binaries are never captured (they are not portable across driver
//! builds), so a linked program is reconstructed by compiling its post-link
//! stage sources into temporary shaders, linking, then discarding the
//! temporaries. Uniform values are reapplied after the link because linking
//! resets them.

use gles::{
    ContextId, EntryPoint, EnumGroup, ProgramSnapshot, ResourceType, ShareGroupSnapshot,
    UniformValue,
};

use super::{call, p_data, p_enum, p_handle, p_int, p_uint};
use crate::binary_data::BinaryDataStore;
use crate::call::{CallRecord, Param, ParamValue};
use crate::tracker::{ResourceTracker, ShaderProgramKind};

pub(super) fn synthesize(
    group: &ShareGroupSnapshot,
    main: ContextId,
    tracker: &mut ResourceTracker,
    binary: &mut BinaryDataStore,
) -> Vec<CallRecord> {
    let mut calls = Vec::new();

    for shader in &group.shaders {
        let id = shader.id.value();
        tracker
            .resource_mut(main, ResourceType::ShaderProgram)
            .set_starting_resource(id);
        tracker.note_handle(ResourceType::ShaderProgram, id);
        tracker.set_shader_program_kind(id, ShaderProgramKind::Shader);

        let mut setup = vec![create_shader(main, id, shader.kind.gl_enum())];
        setup.push(shader_source(main, id, &shader.source));
        if shader.compiled {
            setup.push(compile_shader(main, id));
        }

        let shaders = tracker.resource_mut(main, ResourceType::ShaderProgram);
        *shaders.regen_calls_mut(id) = setup.clone();
        calls.extend(setup);
    }

    // Temporary shader ids live above every handle observed so far.
    let mut next_temp = tracker.max_handle(ResourceType::ShaderProgram) + 1;

    for program in &group.programs {
        let id = program.id.value();
        tracker
            .resource_mut(main, ResourceType::ShaderProgram)
            .set_starting_resource(id);
        tracker.note_handle(ResourceType::ShaderProgram, id);
        tracker.set_shader_program_kind(id, ShaderProgramKind::Program);

        let setup = if program.linked {
            synthesize_linked(program, main, &mut next_temp, tracker, binary)
        } else {
            synthesize_unlinked(program, main)
        };
        let restore = if program.linked {
            uniform_restore(program, main, binary)
        } else {
            Vec::new()
        };

        let programs = tracker.resource_mut(main, ResourceType::ShaderProgram);
        *programs.regen_calls_mut(id) = setup.clone();
        *programs.restore_calls_mut(id) = restore;
        calls.extend(setup);
    }
    calls
}

fn synthesize_linked(
    program: &ProgramSnapshot,
    main: ContextId,
    next_temp: &mut u32,
    tracker: &mut ResourceTracker,
    binary: &mut BinaryDataStore,
) -> Vec<CallRecord> {
    let id = program.id.value();
    let mut setup = vec![create_program(main, id)];

    let mut temps = Vec::new();
    for (kind, source) in &program.stage_sources {
        let temp = *next_temp;
        *next_temp += 1;
        tracker.note_handle(ResourceType::ShaderProgram, temp);
        temps.push(temp);

        setup.push(create_shader(main, temp, kind.gl_enum()));
        setup.push(shader_source(main, temp, source));
        setup.push(compile_shader(main, temp));
        setup.push(call(
            EntryPoint::AttachShader,
            main,
            vec![
                p_handle("program", ResourceType::ShaderProgram, id),
                p_handle("shader", ResourceType::ShaderProgram, temp),
            ],
        ));
    }

    for (name, index) in &program.attrib_bindings {
        setup.push(call(
            EntryPoint::BindAttribLocation,
            main,
            vec![
                p_handle("program", ResourceType::ShaderProgram, id),
                p_uint("index", *index),
                Param::new("name", ParamValue::String(name.clone())),
            ],
        ));
    }

    setup.push(call(
        EntryPoint::LinkProgram,
        main,
        vec![p_handle("program", ResourceType::ShaderProgram, id)],
    ));

    for temp in temps {
        setup.push(call(
            EntryPoint::DetachShader,
            main,
            vec![
                p_handle("program", ResourceType::ShaderProgram, id),
                p_handle("shader", ResourceType::ShaderProgram, temp),
            ],
        ));
        setup.push(call(
            EntryPoint::DeleteShader,
            main,
            vec![p_handle("shader", ResourceType::ShaderProgram, temp)],
        ));
    }

    setup.extend(uniform_restore(program, main, binary));
    setup
}

/// A program that was never linked only carries its attachments; the traced
/// application will issue the link itself later.
fn synthesize_unlinked(program: &ProgramSnapshot, main: ContextId) -> Vec<CallRecord> {
    let id = program.id.value();
    let mut setup = vec![create_program(main, id)];
    for shader in &program.attached_shaders {
        setup.push(call(
            EntryPoint::AttachShader,
            main,
            vec![
                p_handle("program", ResourceType::ShaderProgram, id),
                p_handle("shader", ResourceType::ShaderProgram, shader.value()),
            ],
        ));
    }
    setup
}

/// Reapply current uniform values and block bindings. Also the restore list
/// for a modified program: state, not structure.
fn uniform_restore(
    program: &ProgramSnapshot,
    main: ContextId,
    binary: &mut BinaryDataStore,
) -> Vec<CallRecord> {
    let id = program.id.value();
    if program.uniforms.is_empty() && program.uniform_blocks.is_empty() {
        return Vec::new();
    }
    let mut calls = vec![call(
        EntryPoint::UseProgram,
        main,
        vec![p_handle("program", ResourceType::ShaderProgram, id)],
    )];
    for uniform in &program.uniforms {
        calls.push(uniform_call(main, uniform.location, &uniform.value, binary));
    }
    for block in &program.uniform_blocks {
        calls.push(call(
            EntryPoint::UniformBlockBinding,
            main,
            vec![
                p_handle("program", ResourceType::ShaderProgram, id),
                p_uint("uniformBlockIndex", block.index),
                p_uint("uniformBlockBinding", block.binding),
            ],
        ));
    }
    calls
}

fn uniform_call(
    main: ContextId,
    location: i32,
    value: &UniformValue,
    binary: &mut BinaryDataStore,
) -> CallRecord {
    match value {
        UniformValue::Int(data) => match data.len() {
            1 => call(
                EntryPoint::Uniform1i,
                main,
                vec![p_int("location", location), p_int("v0", data[0])],
            ),
            n => {
                let (entry, components) = match n {
                    2 => (EntryPoint::Uniform2iv, 2),
                    3 => (EntryPoint::Uniform3iv, 3),
                    4 => (EntryPoint::Uniform4iv, 4),
                    _ if n % 4 == 0 => (EntryPoint::Uniform4iv, 4),
                    _ => unreachable!("no uniform call for {n} int components"),
                };
                vector_uniform(entry, main, location, n / components, &int_bytes(data), binary)
            }
        },
        UniformValue::Uint(data) => vector_uniform(
            EntryPoint::Uniform1uiv,
            main,
            location,
            data.len(),
            &uint_bytes(data),
            binary,
        ),
        UniformValue::Float(data) => match data.len() {
            1 => call(
                EntryPoint::Uniform1f,
                main,
                vec![p_int("location", location), super::p_float("v0", data[0])],
            ),
            n => {
                let (entry, components) = match n {
                    2 => (EntryPoint::Uniform2fv, 2),
                    3 => (EntryPoint::Uniform3fv, 3),
                    4 => (EntryPoint::Uniform4fv, 4),
                    _ if n % 4 == 0 => (EntryPoint::Uniform4fv, 4),
                    _ => unreachable!("no uniform call for {n} float components"),
                };
                vector_uniform(entry, main, location, n / components, &float_bytes(data), binary)
            }
        },
        UniformValue::Matrix { dim, data } => {
            let entry = match dim {
                2 => EntryPoint::UniformMatrix2fv,
                3 => EntryPoint::UniformMatrix3fv,
                4 => EntryPoint::UniformMatrix4fv,
                _ => unreachable!("no uniform call for {dim}x{dim} matrices"),
            };
            let count = data.len() as i32 / (dim * dim);
            call(
                entry,
                main,
                vec![
                    p_int("location", location),
                    p_int("count", count),
                    super::p_bool("transpose", false),
                    p_data("value", binary, &float_bytes(data)),
                ],
            )
        }
    }
}

fn vector_uniform(
    entry: EntryPoint,
    main: ContextId,
    location: i32,
    count: usize,
    bytes: &[u8],
    binary: &mut BinaryDataStore,
) -> CallRecord {
    call(
        entry,
        main,
        vec![
            p_int("location", location),
            p_int("count", count as i32),
            p_data("value", binary, bytes),
        ],
    )
}

fn create_shader(main: ContextId, id: u32, kind: u32) -> CallRecord {
    let mut record = CallRecord::with_return(
        EntryPoint::CreateShader,
        main,
        vec![p_enum("type", EnumGroup::ShaderType, kind)],
        ParamValue::Handle {
            ty: ResourceType::ShaderProgram,
            id,
        },
    );
    record.finalize();
    record
}

fn create_program(main: ContextId, id: u32) -> CallRecord {
    let mut record = CallRecord::with_return(
        EntryPoint::CreateProgram,
        main,
        Vec::new(),
        ParamValue::Handle {
            ty: ResourceType::ShaderProgram,
            id,
        },
    );
    record.finalize();
    record
}

fn shader_source(main: ContextId, id: u32, source: &str) -> CallRecord {
    call(
        EntryPoint::ShaderSource,
        main,
        vec![
            p_handle("shader", ResourceType::ShaderProgram, id),
            p_int("count", 1),
            Param::new("source", ParamValue::String(source.to_string())),
        ],
    )
}

fn compile_shader(main: ContextId, id: u32) -> CallRecord {
    call(
        EntryPoint::CompileShader,
        main,
        vec![p_handle("shader", ResourceType::ShaderProgram, id)],
    )
}

fn int_bytes(data: &[i32]) -> Vec<u8> {
    data.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn uint_bytes(data: &[u32]) -> Vec<u8> {
    data.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn float_bytes(data: &[f32]) -> Vec<u8> {
    data.iter().flat_map(|v| v.to_le_bytes()).collect()
}
