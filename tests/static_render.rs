use std::cell::RefCell;
use std::rc::Rc;

use dynacoe::prelude::*;
use dynacoe::video::backends::UniformValue;

type Log = Rc<RefCell<Vec<Diagnostic>>>;

struct Scene {
    renderer: ShaderRenderer<HeadlessDevice>,
    target: SharedFramebuffer,
    log: Log,
    state: StaticState,
}

fn triangle() -> Vec<f32> {
    let mut vertices = [StaticVertex::default(); 3];
    vertices[1].position = [1.0, 0.0, 0.0];
    vertices[2].position = [0.0, 1.0, 0.0];
    vertices[2].uv = [0.0, 1.0];
    vertices[2].user_data = [1.0, 2.0, 3.0, 4.0];
    StaticVertex::flatten(&vertices)
}

fn setup_with(params: VideoParams) -> Scene {
    let device = HeadlessDevice::new(&params);
    let mut renderer = ShaderRenderer::new(device, params).unwrap();

    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    renderer.set_diagnostic_hook(Some(Box::new(move |d: &Diagnostic| {
        sink.borrow_mut().push(*d)
    })));

    let target = Framebuffer::new(PixelArrayBackend::new(), 32, 32).into_shared();
    renderer.attach_target(Some(target.clone()));

    let vertices = renderer.add_buffer(&triangle());
    let material = renderer.add_buffer(&[0.5; MATERIAL_FLOATS]);

    let mut model = [0.0; MODEL_FLOATS];
    model[..16].copy_from_slice(&IDENTITY);
    model[16..].copy_from_slice(&IDENTITY);
    model[12] = 3.0;
    let model = renderer.add_buffer(&model);

    let program = renderer.program_built_in(BuiltInShaderMode::BasicShader);
    let state = StaticState::new(vertices, vec![0, 1, 2], program, material, model);

    Scene {
        renderer,
        target,
        log,
        state,
    }
}

fn setup() -> Scene {
    setup_with(VideoParams::default())
}

fn kinds(log: &Log) -> Vec<DiagnosticKind> {
    log.borrow().iter().map(|v| v.kind).collect()
}

fn vec4s(value: Option<&UniformValue>) -> Vec<[f32; 4]> {
    match value {
        Some(UniformValue::Vector4Array(v)) => v.clone(),
        other => panic!("not a vector array: {:?}", other),
    }
}

#[test]
fn built_in_draw() {
    let mut s = setup();
    assert!(s.renderer.is_valid());
    assert_eq!(s.renderer.render_static(&s.state).unwrap(), 3);
    assert!(kinds(&s.log).is_empty());

    let draw = s.renderer.device().draws().last().unwrap().clone();
    assert_eq!(draw.indices, vec![0, 1, 2]);
    assert_eq!(draw.vertices[2], triangle()[24..].to_vec());
    assert_eq!(draw.sample, None);

    let mut model = IDENTITY;
    model[12] = 3.0;
    assert_eq!(draw.uniform("model"), Some(&UniformValue::Matrix4(model)));
    assert_eq!(draw.uniform("normalMatrix"), Some(&UniformValue::Matrix4(IDENTITY)));
    assert_eq!(draw.uniform("view"), Some(&UniformValue::Matrix4(IDENTITY)));
    assert_eq!(draw.uniform("projection"), Some(&UniformValue::Matrix4(IDENTITY)));
    assert_eq!(draw.uniform("hasSampleBuffer"), Some(&UniformValue::I32(0)));

    let material = vec4s(draw.uniform("material"));
    assert_eq!(material.len(), MATERIAL_FLOATS / 4);
    assert_eq!(material[11], [0.5; 4]);

    let slots = vec4s(draw.uniform("textureSlots"));
    assert_eq!(slots.len(), s.renderer.max_simultaneous_textures());
    assert!(slots.iter().all(|v| *v == [-1.0, -1.0, 0.0, 0.0]));
}

#[test]
fn viewing_and_projection() {
    let mut s = setup();
    let viewing = s.renderer.static_viewing_matrix_id();
    let projection = s.renderer.static_projection_matrix_id();

    assert_eq!(s.renderer.buffer_size(viewing), Some(VIEWING_FLOATS));
    assert_eq!(s.renderer.buffer_size(projection), Some(PROJECTION_FLOATS));

    s.renderer.update_buffer(viewing, 12, &[1.0, 2.0, 3.0]).unwrap();
    s.renderer.update_buffer(projection, 0, &[2.0]).unwrap();
    s.renderer.render_static(&s.state).unwrap();

    let mut view = IDENTITY;
    view[12] = 1.0;
    view[13] = 2.0;
    view[14] = 3.0;

    let mut proj = IDENTITY;
    proj[0] = 2.0;

    let draw = s.renderer.device().draws().last().unwrap();
    assert_eq!(draw.uniform("view"), Some(&UniformValue::Matrix4(view)));
    assert_eq!(draw.uniform("viewNormal"), Some(&UniformValue::Matrix4(IDENTITY)));
    assert_eq!(draw.uniform("projection"), Some(&UniformValue::Matrix4(proj)));

    // The shared buffers can not be removed.
    s.renderer.remove_buffer(viewing);
    s.renderer.remove_buffer(projection);
    assert_eq!(s.renderer.buffer_size(viewing), Some(VIEWING_FLOATS));
    assert_eq!(
        kinds(&s.log),
        vec![DiagnosticKind::InvalidHandle, DiagnosticKind::InvalidHandle]
    );
}

#[test]
fn invalid_input_draws_nothing() {
    let mut s = setup();

    let mut state = s.state.clone();
    state.indices.clear();
    assert_eq!(s.renderer.render_static(&state).unwrap(), 0);

    let mut state = s.state.clone();
    state.indices = vec![0, 1, 3];
    assert_eq!(s.renderer.render_static(&state).unwrap(), 0);

    let foreign = {
        let params = VideoParams::default();
        let other = ShaderRenderer::new(HeadlessDevice::new(&params), params).unwrap();
        other.program_built_in(BuiltInShaderMode::LightMaterial)
    };

    let mut state = s.state.clone();
    state.program = foreign;
    assert_eq!(s.renderer.render_static(&state).unwrap(), 0);

    let material = s.state.material_data;
    s.renderer.remove_buffer(material);
    assert_eq!(s.renderer.render_static(&s.state).unwrap(), 0);

    assert!(s.renderer.device().draws().is_empty());
    assert_eq!(
        kinds(&s.log),
        vec![
            DiagnosticKind::EmptyIndices,
            DiagnosticKind::IndexOutOfRange,
            DiagnosticKind::UnknownProgram,
            DiagnosticKind::InvalidHandle,
        ]
    );

    s.renderer.attach_target(None);
    let mut state = s.state.clone();
    state.material_data = s.renderer.add_buffer(&[0.0; MATERIAL_FLOATS]);
    assert_eq!(s.renderer.render_static(&state).unwrap(), 0);
    assert_eq!(kinds(&s.log).last(), Some(&DiagnosticKind::NoTarget));
}

#[test]
fn user_programs() {
    let mut s = setup();

    let vs = "void main() {\n    gl_Position = vec4(position, 1.0);\n}";
    let fs = "void main() {\n#error missing output\n}";

    match s.renderer.program_add(vs, fs) {
        Err(VideoError::ShaderCompile(log)) => {
            assert!(log.contains("[Fragment Shader]"));
            assert!(log.contains("ERROR: 0:2: missing output"));
            assert!(!log.contains("[Vertex Shader]"));
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }

    let fs = "#version 140\nvoid main() {}";
    let program = s.renderer.program_add(vs, fs).unwrap();
    assert_ne!(program, s.renderer.program_built_in(BuiltInShaderMode::BasicShader));

    let mut state = s.state.clone();
    state.program = program;
    assert_eq!(s.renderer.render_static(&state).unwrap(), 3);

    // Built-in and user programs see the same uniforms.
    let draw = s.renderer.device().draws().last().unwrap();
    assert!(draw.uniform("lightPositions").is_some());
    assert!(draw.uniform("textureSlots").is_some());
}

#[test]
fn texture_slots() {
    let mut s = setup();
    let texture = s.renderer.add_texture(8, 4, Some(&[255; 8 * 4 * 4])).unwrap();

    let mut state = s.state.clone();
    state.textures = vec![(2, texture), (99, texture)];
    s.renderer.render_static(&state).unwrap();

    let (w, h) = s.renderer.atlas_dimensions();
    let (x, y) = s.renderer.map_tex_coords(texture, 0.0, 0.0).unwrap();

    let draw = s.renderer.device().draws().last().unwrap();
    let slots = vec4s(draw.uniform("textureSlots"));
    assert_eq!(slots[0], [-1.0, -1.0, 0.0, 0.0]);
    assert_eq!(slots[2], [x, y, 8.0 / w as f32, 4.0 / h as f32]);
    assert_eq!(draw.textures, vec![("atlas", s.renderer.atlas_object())]);

    assert_eq!(kinds(&s.log), vec![DiagnosticKind::InvalidHandle]);
}

#[test]
fn lights() {
    let mut s = setup();
    let program = s.renderer.program_built_in(BuiltInShaderMode::LightMaterial);
    s.state.program = program;

    let spot = s.renderer.add_light(LightType::Spot);
    let point = s.renderer.add_light(LightType::Point);
    let dir = s.renderer.add_light(LightType::Directional);
    s.renderer
        .update_light_attributes(point, &[1.0, 2.0, 3.0, 0.5, 0.5, 0.5, 2.0]);
    s.renderer.enable_light(dir, false);
    assert_eq!(s.renderer.num_lights(), 3);

    s.renderer.render_static(&s.state).unwrap();

    let draw = s.renderer.device().draws().last().unwrap().clone();
    let positions = vec4s(draw.uniform("lightPositions"));
    let colors = vec4s(draw.uniform("lightColors"));

    assert_eq!(positions.len(), s.renderer.max_enabled_lights());
    assert_eq!(positions[0], [1.0, 2.0, 3.0, 2.0]);
    assert_eq!(colors[0], [0.5, 0.5, 0.5, LightType::Point.code()]);
    assert_eq!(colors[1], [1.0, 1.0, 1.0, LightType::Spot.code()]);
    assert_eq!(colors[2][3], -1.0);

    s.renderer.remove_light(spot);
    s.renderer.remove_light(spot);
    s.renderer.enable_light(spot, true);
    assert_eq!(s.renderer.num_lights(), 2);
    assert_eq!(
        kinds(&s.log),
        vec![DiagnosticKind::InvalidHandle, DiagnosticKind::InvalidHandle]
    );
}

#[test]
fn too_many_lights() {
    let mut s = setup();
    let max = s.renderer.max_enabled_lights();
    for _ in 0..max + 1 {
        s.renderer.add_light(LightType::Point);
    }

    assert_eq!(s.renderer.render_static(&s.state).unwrap(), 3);
    assert_eq!(kinds(&s.log), vec![DiagnosticKind::TooManyLights]);

    let draw = s.renderer.device().draws().last().unwrap();
    let colors = vec4s(draw.uniform("lightColors"));
    assert!(colors.iter().all(|v| v[3] == LightType::Point.code()));
}

#[test]
fn configured_limits() {
    let mut s = setup_with(VideoParams {
        max_lights: 40,
        max_texture_bindings: 40,
        ..VideoParams::default()
    });

    assert_eq!(s.renderer.max_enabled_lights(), 40);
    assert_eq!(s.renderer.max_simultaneous_textures(), 40);

    for _ in 0..40 {
        s.renderer.add_light(LightType::Point);
    }

    let texture = s.renderer.add_texture(2, 2, None).unwrap();
    let mut state = s.state.clone();
    state.textures = vec![(35, texture)];

    assert_eq!(s.renderer.render_static(&state).unwrap(), 3);
    assert!(kinds(&s.log).is_empty());

    let draw = s.renderer.device().draws().last().unwrap();
    let colors = vec4s(draw.uniform("lightColors"));
    assert_eq!(colors.len(), 40);
    assert!(colors.iter().all(|v| v[3] == LightType::Point.code()));

    let slots = vec4s(draw.uniform("textureSlots"));
    assert_eq!(slots.len(), 40);
    assert!(slots[35][0] >= 0.0);

    // The programs declare arrays as large as the uniforms they receive.
    let program = s.renderer.device().program(draw.program).unwrap();
    assert!(program.vs.contains("#define MAX_LIGHTS 40\n#define TEXTURE_SLOTS 40\n"));
    assert!(program.fs.contains("#define MAX_LIGHTS 40\n#define TEXTURE_SLOTS 40\n"));

    s.renderer.add_light(LightType::Point);
    s.renderer.render_static(&state).unwrap();
    assert_eq!(kinds(&s.log), vec![DiagnosticKind::TooManyLights]);
}

#[test]
fn sample_buffer() {
    let mut s = setup();

    let mut state = s.state.clone();
    state.sample_buffer = Some(s.target.clone());
    s.renderer.render_static(&state).unwrap();

    let draw = s.renderer.device().draws().last().unwrap();
    assert_eq!(draw.uniform("hasSampleBuffer"), Some(&UniformValue::I32(0)));
    assert_eq!(kinds(&s.log), vec![DiagnosticKind::UnsupportedFramebuffer]);

    let other = Framebuffer::new(PixelArrayBackend::new(), 16, 8).into_shared();
    state.sample_buffer = Some(other.clone());
    s.renderer.render_static(&state).unwrap();

    let draw = s.renderer.device().draws().last().unwrap();
    assert_eq!(draw.uniform("hasSampleBuffer"), Some(&UniformValue::I32(1)));
    assert_eq!(draw.sample.map(|v| v.width), Some(16));
    assert_eq!(draw.target.width, 32);
    assert_eq!(kinds(&s.log).len(), 1);
}

#[test]
fn buffer_access() {
    let mut s = setup();
    let id = s.renderer.add_buffer(&[0.0; 4]);

    s.renderer.update_buffer(id, 1, &[1.0, 2.0, 3.0]).unwrap();
    match s.renderer.update_buffer(id, 2, &[1.0, 2.0, 3.0]) {
        Err(VideoError::OutOfRange { offset, end, len, .. }) => {
            assert_eq!((offset, end, len), (2, 5, 4));
        }
        other => panic!("unexpected {:?}", other),
    }

    let mut out = [0.0; 2];
    s.renderer.read_buffer(id, 2, &mut out).unwrap();
    assert_eq!(out, [2.0, 3.0]);
    assert!(s.renderer.read_buffer(id, 3, &mut out).is_err());

    s.renderer.remove_buffer(id);
    assert_eq!(s.renderer.buffer_size(id), None);
    assert!(s.renderer.read_buffer(id, 0, &mut out).is_err());
    assert!(kinds(&s.log).is_empty());
}

#[test]
fn frames_reuse_device_buffers() {
    let params = VideoParams::default();
    let preclaimed = params.preclaimed_buffers;
    let depth = params.buffer_pool_depth;
    let mut s = setup_with(params);

    for frame in 0..10 {
        let mut vertices = triangle();
        vertices[0] = frame as f32;
        s.renderer.update_buffer(s.state.vertices, 0, &vertices).unwrap();
        s.renderer.render_static(&s.state).unwrap();
        s.renderer.clear_rendered_data().unwrap();

        let draw = s.renderer.device().draws().last().unwrap();
        assert_eq!(draw.vertices[0][0], frame as f32);

        // Five logical buffers: viewing, projection, vertices, material and model.
        let stats = s.renderer.device().stats();
        assert!(stats.buffers_alive <= preclaimed + 5 * depth);
    }

    let stats = s.renderer.device().stats();
    assert_eq!(stats.frames, 10);
    assert_eq!(stats.clears, 10);
}
