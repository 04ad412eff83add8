//! A programmable-pipeline renderer over any `Device`.

use std::rc::Rc;

use crate::utils::HandlePool;

use super::backends::{Device, ProgramObject, TargetBinding, TextureObject};
use super::diagnostic::{DiagnosticHook, DiagnosticKind, Diagnostics};
use super::errors::*;
use super::framebuffer::SharedFramebuffer;
use super::light::LightManager;
use super::render_buffer::RenderBufferPool;
use super::renderer::Renderer;
use super::renderer2d::Renderer2D;
use super::settings::VideoParams;
use super::shaders;
use super::static_renderer::StaticRenderer;
use super::texture_atlas::TextureManager;
use super::types::*;

pub struct ShaderRenderer<D: Device> {
    device: D,
    params: VideoParams,
    diagnostics: Diagnostics,
    mode: DrawingMode,

    programs: HandlePool<ProgramObject>,

    atlas: TextureManager,
    buffers: RenderBufferPool,
    renderer2d: Renderer2D,
    sprite: ProgramObject,
    statics: StaticRenderer,
    lights: LightManager,

    target: Option<SharedFramebuffer>,
    bound: Option<TargetBinding>,
    last_2d: Option<Render2DStaticParameters>,
}

impl<D: Device> ShaderRenderer<D> {
    /// Creates a renderer drawing through `device`. Fails if a built-in program does not
    /// build, in which case the engine can not run.
    pub fn new(mut device: D, mut params: VideoParams) -> Result<Self> {
        params.validate();

        let max = device.info().max_texture_size;
        if max > 0 && params.atlas_max_size > max {
            params.atlas_max_size = max;
            params.validate();
        }

        let mut textures: HandlePool<TextureObject> = HandlePool::new();
        let mut programs = HandlePool::new();

        let atlas = TextureManager::new(&params, textures.create());
        let mut buffers = RenderBufferPool::new(&mut device, &params)?;
        let renderer2d = Renderer2D::new(&params, buffers.claim_object(), textures.create());

        let sprite = programs.create();
        unsafe { device.create_program(sprite, shaders::SPRITE_VS, shaders::SPRITE_FS) }
            .map_err(|log| {
                error!("[ShaderRenderer] The 2D program failed.\n{}", log);
                Error::BuiltInProgram("Sprite".to_owned(), log.to_string())
            })?;

        let statics = StaticRenderer::new(&mut device, &mut programs, &mut buffers, &params)?;
        let lights = LightManager::new(params.max_lights);

        info!(
            "[ShaderRenderer] Ready on {} {} ({}).",
            device.info().name,
            device.info().version,
            device.info().language
        );

        Ok(ShaderRenderer {
            device,
            params,
            diagnostics: Diagnostics::default(),
            mode: DrawingMode::default(),

            programs,

            atlas,
            buffers,
            renderer2d,
            sprite,
            statics,
            lights,

            target: None,
            bound: None,
            last_2d: None,
        })
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[inline]
    pub fn params(&self) -> &VideoParams {
        &self.params
    }

    /// The atlas width and height in texels.
    pub fn atlas_dimensions(&self) -> (u32, u32) {
        (self.atlas.width(), self.atlas.height())
    }

    /// The device texture holding the atlas.
    pub fn atlas_object(&self) -> TextureObject {
        self.atlas.object()
    }

    /// Maps texture-local coordinates into atlas space.
    pub fn map_tex_coords(&self, id: TextureId, u: f32, v: f32) -> Option<(f32, f32)> {
        Some((
            self.atlas.map_tex_coords_to_real_coords_x(u, id)?,
            self.atlas.map_tex_coords_to_real_coords_y(v, id)?,
        ))
    }

    fn is_framebuffer_supported(&self, kind: FramebufferKind) -> bool {
        self.device.info().framebuffers.contains(&kind)
    }

    fn binding(target: &SharedFramebuffer) -> TargetBinding {
        let fb = target.borrow();
        TargetBinding {
            kind: fb.kind(),
            handle: fb.handle(),
            width: fb.width(),
            height: fb.height(),
        }
    }

    /// Binds the attached target if it changed since the last draw.
    fn bind_target(&mut self) -> Result<Option<TargetBinding>> {
        let binding = match self.target {
            Some(ref target) => Self::binding(target),
            None => return Ok(None),
        };

        if self.bound != Some(binding) {
            unsafe { self.device.bind_target(binding)? };
            self.bound = Some(binding);
        }

        Ok(Some(binding))
    }

    fn flush_2d(&mut self, params: &Render2DStaticParameters) -> Result<u32> {
        if self.renderer2d.queued() == 0 {
            return Ok(0);
        }

        if self.bind_target()?.is_none() {
            self.renderer2d.clear_queue();
            self.diagnostics
                .report("render_2d_vertices", DiagnosticKind::NoTarget);
            return Ok(0);
        }

        self.renderer2d.render(
            &mut self.device,
            &mut self.atlas,
            self.sprite,
            self.mode,
            params,
        )
    }

    fn default_2d_params(&self) -> Render2DStaticParameters {
        match self.target {
            Some(ref target) => {
                let fb = target.borrow();
                Render2DStaticParameters::new(fb.width() as f32, fb.height() as f32)
            }
            None => Render2DStaticParameters::new(1.0, 1.0),
        }
    }

    fn invalid(&mut self, operation: &'static str, valid: bool) {
        if !valid {
            self.diagnostics
                .report(operation, DiagnosticKind::InvalidHandle);
        }
    }
}

impl<D: Device> Renderer for ShaderRenderer<D> {
    fn name(&self) -> String {
        format!("ShaderRenderer ({})", self.device.info().name)
    }

    fn version(&self) -> String {
        self.device.info().version.clone()
    }

    fn is_valid(&self) -> bool {
        self.statics.contains(self.statics.built_in(BuiltInShaderMode::BasicShader))
    }

    fn is_supported(&self, capability: Capability) -> bool {
        match capability {
            Capability::Lighting | Capability::UserShaders => true,
        }
    }

    fn set_drawing_mode(
        &mut self,
        polygon: Polygon,
        dimension: Dimension,
        alpha_rule: AlphaRule,
    ) -> Result<()> {
        let mode = DrawingMode {
            polygon,
            dimension,
            alpha_rule,
        };

        if mode == self.mode {
            return Ok(());
        }

        if self.renderer2d.queued() > 0 {
            let params = self.last_2d.unwrap_or_else(|| self.default_2d_params());
            self.flush_2d(&params)?;
        }

        self.mode = mode;
        Ok(())
    }

    fn drawing_mode(&self) -> DrawingMode {
        self.mode
    }

    fn add_2d_object(&mut self) -> Object2DId {
        self.renderer2d.add_object()
    }

    fn remove_2d_object(&mut self, id: Object2DId) {
        let valid = self.renderer2d.remove_object(id);
        self.invalid("remove_2d_object", valid);
    }

    fn set_2d_object_parameters(&mut self, id: Object2DId, params: &Render2DObjectParameters) {
        let valid = self.renderer2d.set_object(id, params);
        self.invalid("set_2d_object_parameters", valid);
    }

    fn add_2d_vertex(&mut self, vertex: Vertex2D) -> Vertex2DId {
        self.renderer2d.add_vertex(vertex, &self.atlas)
    }

    fn remove_2d_vertex(&mut self, id: Vertex2DId) {
        let valid = self.renderer2d.remove_vertex(id);
        self.invalid("remove_2d_vertex", valid);
    }

    fn set_2d_vertex(&mut self, id: Vertex2DId, vertex: Vertex2D) {
        let valid = self.renderer2d.set_vertex(id, vertex, &self.atlas);
        self.invalid("set_2d_vertex", valid);
    }

    fn get_2d_vertex(&self, id: Vertex2DId) -> Option<Vertex2D> {
        self.renderer2d.vertex(id)
    }

    fn queue_2d_vertices(&mut self, ids: &[Vertex2DId]) {
        if self.renderer2d.queue(ids) > 0 {
            self.diagnostics
                .report("queue_2d_vertices", DiagnosticKind::InvalidHandle);
        }
    }

    fn render_2d_vertices(&mut self, params: &Render2DStaticParameters) -> Result<u32> {
        self.last_2d = Some(*params);
        self.flush_2d(params)
    }

    fn clear_2d_queue(&mut self) {
        self.renderer2d.clear_queue();
    }

    fn render_static(&mut self, state: &StaticState) -> Result<u32> {
        if self.bind_target()?.is_none() {
            self.diagnostics
                .report("render_static", DiagnosticKind::NoTarget);
            return Ok(0);
        }

        if self.lights.sync() {
            self.diagnostics
                .report("render_static", DiagnosticKind::TooManyLights);
        }

        let sample = match state.sample_buffer {
            Some(ref fb) => {
                let binding = Self::binding(fb);
                let same = self.target.as_ref().map_or(false, |v| Rc::ptr_eq(v, fb));

                if same || !self.is_framebuffer_supported(binding.kind) {
                    self.diagnostics
                        .report("render_static", DiagnosticKind::UnsupportedFramebuffer);
                    None
                } else {
                    Some(binding)
                }
            }
            None => None,
        };

        self.statics.render(
            &mut self.device,
            &mut self.buffers,
            &mut self.atlas,
            &self.lights,
            &mut self.diagnostics,
            self.mode,
            state,
            sample,
        )
    }

    fn clear_rendered_data(&mut self) -> Result<()> {
        if self.bind_target()?.is_some() {
            unsafe { self.device.clear()? };
        }

        self.buffers.advance(&mut self.device)?;
        unsafe { self.device.advance()? };
        Ok(())
    }

    fn static_viewing_matrix_id(&self) -> RenderBufferId {
        self.statics.viewing_matrix()
    }

    fn static_projection_matrix_id(&self) -> RenderBufferId {
        self.statics.projection_matrix()
    }

    fn add_texture(&mut self, width: u32, height: u32, data: Option<&[u8]>) -> Result<TextureId> {
        self.atlas.add(width, height, data)
    }

    fn update_texture(&mut self, id: TextureId, data: &[u8]) -> Result<()> {
        self.atlas.update(id, data)
    }

    fn remove_texture(&mut self, id: TextureId) {
        let valid = self.atlas.remove(id);
        self.invalid("remove_texture", valid);
    }

    fn get_texture(&self, id: TextureId) -> Option<Vec<u8>> {
        self.atlas.pixels(id)
    }

    fn set_texture_filter(&mut self, filter: TexFilter) {
        self.atlas.set_filter(filter);
    }

    fn texture_filter(&self) -> TexFilter {
        self.atlas.filter()
    }

    fn texture_width(&self, id: TextureId) -> Option<u32> {
        self.atlas.texture_width(id)
    }

    fn texture_height(&self, id: TextureId) -> Option<u32> {
        self.atlas.texture_height(id)
    }

    fn max_simultaneous_textures(&self) -> usize {
        self.params.max_texture_bindings
    }

    fn add_buffer(&mut self, data: &[f32]) -> RenderBufferId {
        self.buffers.add(data)
    }

    fn update_buffer(&mut self, id: RenderBufferId, offset: usize, data: &[f32]) -> Result<()> {
        self.buffers.update(id, offset, data)
    }

    fn read_buffer(&self, id: RenderBufferId, offset: usize, out: &mut [f32]) -> Result<()> {
        self.buffers.read(id, offset, out)
    }

    fn buffer_size(&self, id: RenderBufferId) -> Option<usize> {
        self.buffers.size(id)
    }

    fn remove_buffer(&mut self, id: RenderBufferId) {
        let reserved = id == self.statics.viewing_matrix() || id == self.statics.projection_matrix();
        let valid = !reserved && self.buffers.remove(id);
        self.invalid("remove_buffer", valid);
    }

    fn program_language(&self) -> String {
        self.device.info().language.clone()
    }

    fn program_add(&mut self, vs: &str, fs: &str) -> Result<ProgramId> {
        self.statics
            .add_program(&mut self.device, &mut self.programs, vs, fs)
    }

    fn program_built_in(&self, mode: BuiltInShaderMode) -> ProgramId {
        self.statics.built_in(mode)
    }

    fn add_light(&mut self, kind: LightType) -> LightId {
        self.lights.add(kind)
    }

    fn update_light_attributes(&mut self, id: LightId, attributes: &[f32; LIGHT_ATTRIBUTE_FLOATS]) {
        let valid = self.lights.update_attributes(id, attributes);
        self.invalid("update_light_attributes", valid);
    }

    fn enable_light(&mut self, id: LightId, enabled: bool) {
        let valid = self.lights.enable(id, enabled);
        self.invalid("enable_light", valid);
    }

    fn remove_light(&mut self, id: LightId) {
        let valid = self.lights.remove(id);
        self.invalid("remove_light", valid);
    }

    fn max_enabled_lights(&self) -> usize {
        self.lights.max_enabled()
    }

    fn num_lights(&self) -> usize {
        self.lights.len()
    }

    fn attach_target(&mut self, target: Option<SharedFramebuffer>) {
        match target {
            Some(fb) => {
                if let Some(ref current) = self.target {
                    if Rc::ptr_eq(current, &fb) {
                        return;
                    }
                }

                let kind = fb.borrow().kind();
                if !self.is_framebuffer_supported(kind) {
                    self.diagnostics
                        .report("attach_target", DiagnosticKind::UnsupportedFramebuffer);
                    return;
                }

                self.target = Some(fb);
            }
            None => {
                self.target = None;
                self.bound = None;
            }
        }
    }

    fn target(&self) -> Option<SharedFramebuffer> {
        self.target.clone()
    }

    fn supported_framebuffers(&self) -> Vec<FramebufferKind> {
        self.device.info().framebuffers.clone()
    }

    fn set_diagnostic_hook(&mut self, hook: Option<DiagnosticHook>) {
        self.diagnostics.set_hook(hook);
    }
}
