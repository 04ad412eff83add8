//! Plain data exchanged between callers and the renderer.

use serde::{Deserialize, Serialize};

use super::framebuffer::SharedFramebuffer;

/// The minimum number of lights every backend can enable at once.
pub const MINIMUM_LIGHT_COUNT: usize = 32;
/// The minimum number of texture slots a static draw can reference.
pub const MINIMUM_TEXTURE_BINDING_COUNT: usize = 32;

/// Floats per packed 2D vertex.
pub const VERTEX_2D_FLOATS: usize = 10;
/// Floats per 2D object block.
pub const OBJECT_2D_FLOATS: usize = 16;
/// Floats per static vertex.
pub const STATIC_VERTEX_FLOATS: usize = 12;
/// Floats of a static material block: ambient, diffuse, specular and eight
/// user vectors.
pub const MATERIAL_FLOATS: usize = 48;
/// Floats of a model block: the model matrix and its normal matrix.
pub const MODEL_FLOATS: usize = 32;
/// Floats of the static viewing block: view matrix and view normal matrix.
pub const VIEWING_FLOATS: usize = 32;
/// Floats of the static projection block.
pub const PROJECTION_FLOATS: usize = 16;
/// Floats accepted by `update_light_attributes`: position, color, intensity.
pub const LIGHT_ATTRIBUTE_FLOATS: usize = 7;

/// Components of a `width` x `height` RGBA image, `None` if the count overflows.
pub fn rgba_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
}

impl_handle!(TextureId);
impl_handle!(RenderBufferId);
impl_handle!(ProgramId);
impl_handle!(LightId);

/// Identifies a 2D vertex slot. Slots are recycled last-in first-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Vertex2DId(pub u32);

/// Identifies a 2D object, i.e. a per-instance transform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Object2DId(pub u32);

/// A dynamic 2D vertex as the caller sees it.
///
/// `uv` is relative to `texture`; the renderer maps it into atlas space
/// internally and reports the local value back from `get_2d_vertex`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex2D {
    pub x: f32,
    pub y: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
    pub tex_x: f32,
    pub tex_y: f32,
    pub texture: Option<TextureId>,
    pub object: Option<Object2DId>,
}

impl Vertex2D {
    pub fn new(x: f32, y: f32) -> Self {
        Vertex2D {
            x,
            y,
            r: 1.0,
            g: 1.0,
            b: 1.0,
            a: 1.0,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, r: f32, g: f32, b: f32, a: f32) -> Self {
        self.r = r;
        self.g = g;
        self.b = b;
        self.a = a;
        self
    }

    pub fn with_texture(mut self, texture: TextureId, u: f32, v: f32) -> Self {
        self.texture = Some(texture);
        self.tex_x = u;
        self.tex_y = v;
        self
    }

    pub fn with_object(mut self, object: Object2DId) -> Self {
        self.object = Some(object);
        self
    }
}

/// A vertex of static geometry, 12 floats.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StaticVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub user_data: [f32; 4],
}

impl StaticVertex {
    pub fn flatten(vertices: &[StaticVertex]) -> Vec<f32> {
        let mut out = Vec::with_capacity(vertices.len() * STATIC_VERTEX_FLOATS);
        for v in vertices {
            out.extend_from_slice(&v.position);
            out.extend_from_slice(&v.normal);
            out.extend_from_slice(&v.uv);
            out.extend_from_slice(&v.user_data);
        }

        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TexFilter {
    Linear,
    NoFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polygon {
    Triangle,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    D2,
    D3,
}

/// How fragments combine with what is already in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlphaRule {
    /// Standard alpha blending.
    Allow,
    /// Nothing reaches the color buffer.
    PassThrough,
    /// Blending disabled.
    Opaque,
    /// Additive blending.
    Translucent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    Lighting,
    UserShaders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltInShaderMode {
    BasicShader,
    LightMaterial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    Point,
    Directional,
    Spot,
}

impl LightType {
    /// The code stored in the first float of a light block. Lights are sorted
    /// by it before they are handed to the GPU.
    pub fn code(self) -> f32 {
        match self {
            LightType::Point => 0.05,
            LightType::Directional => 0.15,
            LightType::Spot => 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FramebufferKind {
    /// Raw `w * h * 4` RGBA bytes, no padding.
    RgbaPixelArray,
    /// A GPU render target object.
    GLFBPacket,
    Unknown,
}

/// The complete draw-mode state of a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrawingMode {
    pub polygon: Polygon,
    pub dimension: Dimension,
    pub alpha_rule: AlphaRule,
}

impl Default for DrawingMode {
    fn default() -> Self {
        DrawingMode {
            polygon: Polygon::Triangle,
            dimension: Dimension::D2,
            alpha_rule: AlphaRule::Allow,
        }
    }
}

/// Per-flush parameters of the 2D path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Render2DStaticParameters {
    pub context_width: f32,
    pub context_height: f32,
    /// Column-major 4x4 transform applied after each object's transform.
    pub context_transform: [f32; 16],
}

impl Render2DStaticParameters {
    pub fn new(context_width: f32, context_height: f32) -> Self {
        Render2DStaticParameters {
            context_width,
            context_height,
            context_transform: IDENTITY,
        }
    }
}

/// Per-object parameters of the 2D path: a column-major 4x4 transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Render2DObjectParameters {
    pub data: [f32; 16],
}

impl Default for Render2DObjectParameters {
    fn default() -> Self {
        Render2DObjectParameters { data: IDENTITY }
    }
}

pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

/// Describes one draw of static geometry. Built per mesh object per frame.
#[derive(Clone)]
pub struct StaticState {
    /// Buffer of `StaticVertex` data.
    pub vertices: RenderBufferId,
    /// Triangle or line indices into `vertices`.
    pub indices: Vec<u32>,
    /// Buffer of `MATERIAL_FLOATS` floats.
    pub material_data: RenderBufferId,
    pub program: ProgramId,
    /// `(slot, texture)` pairs, slots below `MINIMUM_TEXTURE_BINDING_COUNT`.
    pub textures: Vec<(u32, TextureId)>,
    /// Buffer of `MODEL_FLOATS` floats.
    pub model_data: RenderBufferId,
    /// A framebuffer whose contents the program may sample.
    pub sample_buffer: Option<SharedFramebuffer>,
}

impl StaticState {
    pub fn new(
        vertices: RenderBufferId,
        indices: Vec<u32>,
        program: ProgramId,
        material_data: RenderBufferId,
        model_data: RenderBufferId,
    ) -> Self {
        StaticState {
            vertices,
            indices,
            material_data,
            program,
            textures: Vec::new(),
            model_data,
            sample_buffer: None,
        }
    }
}
