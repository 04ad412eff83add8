//! The contract between the engine and a rendering backend.
//!
//! A renderer owns every GPU resource behind handles. Mistakes with handles or targets never
//! stop the render loop: the call does nothing and a diagnostic is reported instead. Errors
//! are only returned where the caller can act on them, e.g. a texture that does not fit or a
//! program that does not compile.

use super::diagnostic::DiagnosticHook;
use super::errors::*;
use super::framebuffer::SharedFramebuffer;
use super::types::*;

pub trait Renderer {
    /// The name of the backend.
    fn name(&self) -> String;

    fn version(&self) -> String;

    /// Whether the backend is ready to render.
    fn is_valid(&self) -> bool;

    fn is_supported(&self, capability: Capability) -> bool;

    /// Switches the drawing mode. Vertices queued under the previous mode are drawn first.
    fn set_drawing_mode(
        &mut self,
        polygon: Polygon,
        dimension: Dimension,
        alpha_rule: AlphaRule,
    ) -> Result<()>;

    fn drawing_mode(&self) -> DrawingMode;

    /// Adds a 2D object with identity transform.
    fn add_2d_object(&mut self) -> Object2DId;

    fn remove_2d_object(&mut self, id: Object2DId);

    fn set_2d_object_parameters(&mut self, id: Object2DId, params: &Render2DObjectParameters);

    fn add_2d_vertex(&mut self, vertex: Vertex2D) -> Vertex2DId;

    fn remove_2d_vertex(&mut self, id: Vertex2DId);

    fn set_2d_vertex(&mut self, id: Vertex2DId, vertex: Vertex2D);

    /// Returns the vertex with the texture coordinates it was set with.
    fn get_2d_vertex(&self, id: Vertex2DId) -> Option<Vertex2D>;

    /// Appends vertices to the next 2D draw.
    fn queue_2d_vertices(&mut self, ids: &[Vertex2DId]);

    /// Draws every queued vertex in one call and empties the queue. Returns the number of
    /// indices drawn.
    fn render_2d_vertices(&mut self, params: &Render2DStaticParameters) -> Result<u32>;

    /// Drops queued vertices without drawing them.
    fn clear_2d_queue(&mut self);

    /// Draws one mesh object immediately. Returns the number of indices drawn.
    fn render_static(&mut self, state: &StaticState) -> Result<u32>;

    /// Clears the target and starts a new frame.
    fn clear_rendered_data(&mut self) -> Result<()>;

    /// A buffer of 32 floats: the view matrix followed by its normal matrix.
    fn static_viewing_matrix_id(&self) -> RenderBufferId;

    /// A buffer of 16 floats holding the projection matrix.
    fn static_projection_matrix_id(&self) -> RenderBufferId;

    /// Adds a `width` x `height` RGBA texture. Without `data` its pixels are undefined.
    fn add_texture(&mut self, width: u32, height: u32, data: Option<&[u8]>) -> Result<TextureId>;

    fn update_texture(&mut self, id: TextureId, data: &[u8]) -> Result<()>;

    /// Flags a texture for removal. Its space is reused by later, equal or smaller textures.
    fn remove_texture(&mut self, id: TextureId);

    fn get_texture(&self, id: TextureId) -> Option<Vec<u8>>;

    fn set_texture_filter(&mut self, filter: TexFilter);

    fn texture_filter(&self) -> TexFilter;

    fn texture_width(&self, id: TextureId) -> Option<u32>;

    fn texture_height(&self, id: TextureId) -> Option<u32>;

    /// The number of texture slots a static draw can reference.
    fn max_simultaneous_textures(&self) -> usize;

    fn add_buffer(&mut self, data: &[f32]) -> RenderBufferId;

    /// Overwrites floats starting at `offset`, failing with `OutOfRange` on overrun.
    fn update_buffer(&mut self, id: RenderBufferId, offset: usize, data: &[f32]) -> Result<()>;

    fn read_buffer(&self, id: RenderBufferId, offset: usize, out: &mut [f32]) -> Result<()>;

    fn buffer_size(&self, id: RenderBufferId) -> Option<usize>;

    fn remove_buffer(&mut self, id: RenderBufferId);

    /// The shading language `program_add` expects.
    fn program_language(&self) -> String;

    /// Builds a user program. The error carries the compile and link logs.
    fn program_add(&mut self, vs: &str, fs: &str) -> Result<ProgramId>;

    fn program_built_in(&self, mode: BuiltInShaderMode) -> ProgramId;

    /// Adds an enabled light at the origin, white with intensity 1.
    fn add_light(&mut self, kind: LightType) -> LightId;

    /// Sets position (3 floats), color (3 floats) and intensity.
    fn update_light_attributes(&mut self, id: LightId, attributes: &[f32; LIGHT_ATTRIBUTE_FLOATS]);

    fn enable_light(&mut self, id: LightId, enabled: bool);

    fn remove_light(&mut self, id: LightId);

    /// At least 32.
    fn max_enabled_lights(&self) -> usize;

    fn num_lights(&self) -> usize;

    /// Directs later draws into `target`. Unsupported kinds are ignored; `None` makes later
    /// draws have no visible effect.
    fn attach_target(&mut self, target: Option<SharedFramebuffer>);

    fn target(&self) -> Option<SharedFramebuffer>;

    fn supported_framebuffers(&self) -> Vec<FramebufferKind>;

    fn set_diagnostic_hook(&mut self, hook: Option<DiagnosticHook>);
}
