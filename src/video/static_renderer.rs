//! Immediate draws of GPU-resident geometry with built-in or user programs.

use crate::utils::{HandlePool, Table};

use super::backends::{
    Device, DrawCall, ProgramLog, ProgramObject, TargetBinding, UniformValue, UniformVar,
    VertexLayout,
};
use super::diagnostic::{DiagnosticKind, Diagnostics};
use super::errors::*;
use super::light::LightManager;
use super::render_buffer::RenderBufferPool;
use super::settings::VideoParams;
use super::shaders::{self, StaticLimits};
use super::texture_atlas::TextureManager;
use super::types::{
    BuiltInShaderMode, DrawingMode, ProgramId, RenderBufferId, StaticState, IDENTITY,
    MATERIAL_FLOATS, MODEL_FLOATS, STATIC_VERTEX_FLOATS, VIEWING_FLOATS,
};

const UNUSED_SLOT: [f32; 4] = [-1.0, -1.0, 0.0, 0.0];

#[derive(Debug, Clone, Copy)]
struct Program {
    object: ProgramObject,
    built_in: Option<BuiltInShaderMode>,
}

pub struct StaticRenderer {
    programs: Table<ProgramId, Program>,
    basic: ProgramId,
    light: ProgramId,
    viewing: RenderBufferId,
    projection: RenderBufferId,
    limits: StaticLimits,
}

impl StaticRenderer {
    /// Compiles the built-in programs and allocates the viewing and projection buffers. Fails
    /// if a built-in program does not build.
    pub fn new<D: Device>(
        device: &mut D,
        objects: &mut HandlePool<ProgramObject>,
        buffers: &mut RenderBufferPool,
        params: &VideoParams,
    ) -> Result<Self> {
        let mut programs = Table::new();
        let limits = StaticLimits {
            lights: params.max_lights,
            slots: params.max_texture_bindings,
        };

        let mut built_in = |mode: BuiltInShaderMode, vs: &str, fs: &str| -> Result<ProgramId> {
            let object = Self::build(device, objects, limits, vs, fs).map_err(|log| {
                error!("[StaticRenderer] Built-in program {:?} failed.\n{}", mode, log);
                Error::BuiltInProgram(format!("{:?}", mode), log.to_string())
            })?;

            Ok(programs.insert(Program {
                object,
                built_in: Some(mode),
            }))
        };

        let basic = built_in(
            BuiltInShaderMode::BasicShader,
            shaders::BASIC_VS,
            shaders::BASIC_FS,
        )?;

        let light = built_in(
            BuiltInShaderMode::LightMaterial,
            shaders::LIGHT_VS,
            shaders::LIGHT_FS,
        )?;

        let mut viewing = [0.0; VIEWING_FLOATS];
        viewing[..16].copy_from_slice(&IDENTITY);
        viewing[16..].copy_from_slice(&IDENTITY);

        Ok(StaticRenderer {
            programs,
            basic,
            light,
            viewing: buffers.add(&viewing),
            projection: buffers.add(&IDENTITY),
            limits,
        })
    }

    /// Builds a user program. The sources see the same uniforms and helpers as the built-ins.
    pub fn add_program<D: Device>(
        &mut self,
        device: &mut D,
        objects: &mut HandlePool<ProgramObject>,
        vs: &str,
        fs: &str,
    ) -> Result<ProgramId> {
        let object = Self::build(device, objects, self.limits, vs, fs).map_err(|log| {
            error!("[StaticRenderer] Failed to build program.\n{}", log);
            Error::ShaderCompile(log.to_string())
        })?;

        Ok(self.programs.insert(Program {
            object,
            built_in: None,
        }))
    }

    pub fn built_in(&self, mode: BuiltInShaderMode) -> ProgramId {
        match mode {
            BuiltInShaderMode::BasicShader => self.basic,
            BuiltInShaderMode::LightMaterial => self.light,
        }
    }

    /// Returns the mode of a built-in program, `None` for user programs and unknown ids.
    pub fn mode(&self, id: ProgramId) -> Option<BuiltInShaderMode> {
        self.programs.get(id).and_then(|v| v.built_in)
    }

    #[inline]
    pub fn contains(&self, id: ProgramId) -> bool {
        self.programs.is_alive(id)
    }

    #[inline]
    pub fn viewing_matrix(&self) -> RenderBufferId {
        self.viewing
    }

    #[inline]
    pub fn projection_matrix(&self) -> RenderBufferId {
        self.projection
    }

    /// Issues one draw of `state`. Caller mistakes are reported and draw nothing.
    pub fn render<D: Device>(
        &self,
        device: &mut D,
        buffers: &mut RenderBufferPool,
        atlas: &mut TextureManager,
        lights: &LightManager,
        diagnostics: &mut Diagnostics,
        mode: DrawingMode,
        state: &StaticState,
        sample: Option<TargetBinding>,
    ) -> Result<u32> {
        const OP: &str = "render_static";

        if state.indices.is_empty() {
            diagnostics.report(OP, DiagnosticKind::EmptyIndices);
            return Ok(0);
        }

        let program = match self.programs.get(state.program) {
            Some(v) => *v,
            None => {
                diagnostics.report(OP, DiagnosticKind::UnknownProgram);
                return Ok(0);
            }
        };

        let (vertex_count, material, model) = match (
            buffers.size(state.vertices),
            buffers.data(state.material_data),
            buffers.data(state.model_data),
        ) {
            (Some(len), Some(material), Some(model)) => (
                len / STATIC_VERTEX_FLOATS,
                Self::vec4s(material, MATERIAL_FLOATS),
                Self::matrices(model),
            ),
            _ => {
                diagnostics.report(OP, DiagnosticKind::InvalidHandle);
                return Ok(0);
            }
        };

        if state.indices.iter().any(|&i| i as usize >= vertex_count) {
            diagnostics.report(OP, DiagnosticKind::IndexOutOfRange);
            return Ok(0);
        }

        let atlas_object = atlas.sync(device)?;

        let mut slots = vec![UNUSED_SLOT; self.limits.slots];
        let (w, h) = (atlas.width() as f32, atlas.height() as f32);
        for &(slot, texture) in &state.textures {
            match (slots.get_mut(slot as usize), atlas.bounds(texture)) {
                (Some(v), Some(area)) => {
                    *v = [
                        area.x as f32 / w,
                        area.y as f32 / h,
                        area.width as f32 / w,
                        area.height as f32 / h,
                    ];
                }
                _ => diagnostics.report(OP, DiagnosticKind::InvalidHandle),
            }
        }

        let view = Self::matrices(buffers.data(self.viewing).unwrap_or(&[]));
        let projection = Self::matrices(buffers.data(self.projection).unwrap_or(&[])).0;
        let (light_positions, light_colors) = lights.uniforms();

        let uniforms: Vec<UniformVar> = vec![
            ("material", UniformValue::Vector4Array(material)),
            ("model", UniformValue::Matrix4(model.0)),
            ("normalMatrix", UniformValue::Matrix4(model.1)),
            ("view", UniformValue::Matrix4(view.0)),
            ("viewNormal", UniformValue::Matrix4(view.1)),
            ("projection", UniformValue::Matrix4(projection)),
            ("textureSlots", UniformValue::Vector4Array(slots)),
            ("lightPositions", light_positions),
            ("lightColors", light_colors),
            ("hasSampleBuffer", UniformValue::I32(sample.is_some() as i32)),
        ];

        let vertices = buffers.bind(device, state.vertices)?;
        let textures = [("atlas", atlas_object)];

        let call = DrawCall {
            program: program.object,
            mode,
            layout: VertexLayout::Static,
            vertices,
            indices: &state.indices,
            uniforms: &uniforms,
            textures: &textures,
            sample,
        };

        Ok(unsafe { device.draw(&call) }?)
    }

    fn build<D: Device>(
        device: &mut D,
        objects: &mut HandlePool<ProgramObject>,
        limits: StaticLimits,
        vs: &str,
        fs: &str,
    ) -> ::std::result::Result<ProgramObject, ProgramLog> {
        let vs = shaders::static_source(vs, true, limits);
        let fs = shaders::static_source(fs, false, limits);

        let object = objects.create();
        match unsafe { device.create_program(object, &vs, &fs) } {
            Ok(()) => Ok(object),
            Err(log) => {
                objects.free(object);
                Err(log)
            }
        }
    }

    /// Splits `data` into `len / 4` vectors, zero-padded.
    fn vec4s(data: &[f32], len: usize) -> Vec<[f32; 4]> {
        let mut out = vec![[0.0; 4]; len / 4];
        for (i, v) in data.iter().take(len).enumerate() {
            out[i / 4][i % 4] = *v;
        }

        out
    }

    /// Reads two consecutive matrices, falling back to identity where `data` is short.
    fn matrices(data: &[f32]) -> ([f32; 16], [f32; 16]) {
        let mut pair = [0.0; MODEL_FLOATS];
        pair[..16].copy_from_slice(&IDENTITY);
        pair[16..].copy_from_slice(&IDENTITY);

        let n = data.len().min(MODEL_FLOATS);
        pair[..n].copy_from_slice(&data[..n]);

        let (mut first, mut second) = ([0.0; 16], [0.0; 16]);
        first.copy_from_slice(&pair[..16]);
        second.copy_from_slice(&pair[16..]);
        (first, second)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matrices() {
        let mut data = [0.0; 20];
        data[0] = 2.0;

        let (first, second) = StaticRenderer::matrices(&data);
        assert_eq!(first[0], 2.0);
        assert_eq!(first[5], 0.0);
        assert_eq!(&second[..4], &[0.0; 4][..]);
        assert_eq!(second[5], 1.0);

        assert_eq!(StaticRenderer::matrices(&[]), (IDENTITY, IDENTITY));
    }

    #[test]
    fn vec4s() {
        let v = StaticRenderer::vec4s(&[1.0, 2.0, 3.0, 4.0, 5.0], MATERIAL_FLOATS);
        assert_eq!(v.len(), 12);
        assert_eq!(v[0], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(v[1], [5.0, 0.0, 0.0, 0.0]);
    }
}
