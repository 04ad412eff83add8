//! The backend of renderer, which should be responsible for only one thing:
//! submitting draw-calls using low-level video APIs.

pub mod headless;
mod utils;

#[cfg(not(target_arch = "wasm32"))]
pub mod gl;

use std::fmt;

use crate::errors::*;

use super::framebuffer::FramebufferHandle;
use super::types::{DrawingMode, FramebufferKind, TexFilter};

impl_handle!(BufferObject);
impl_handle!(TextureObject);
impl_handle!(ProgramObject);

/// Static facts about a device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub version: String,
    /// The shading language accepted by `create_program`.
    pub language: String,
    pub max_texture_size: u32,
    pub max_texture_units: u32,
    pub framebuffers: Vec<FramebufferKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    RGBA8,
    RGBA32F,
}

impl TextureFormat {
    pub fn texel_len(self) -> usize {
        match self {
            TextureFormat::RGBA8 => 4,
            TextureFormat::RGBA32F => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureParams {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: TexFilter,
}

/// Texel data, bytes for `RGBA8` and floats for `RGBA32F`.
#[derive(Debug, Clone, Copy)]
pub enum TextureData<'a> {
    Bytes(&'a [u8]),
    Floats(&'a [f32]),
}

impl<'a> TextureData<'a> {
    pub fn is_empty(&self) -> bool {
        match *self {
            TextureData::Bytes(v) => v.is_empty(),
            TextureData::Floats(v) => v.is_empty(),
        }
    }
}

/// A sub-rectangle of a texture, in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The vertex layouts the built-in pipelines understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// `pos: vec2, color: vec4, uv: vec2, useTex: float, object: float`.
    Dynamic2D,
    /// `position: vec3, normal: vec3, uv: vec2, userData: vec4`.
    Static,
}

impl VertexLayout {
    /// Returns `(name, offset, size)` of every attribute, in floats.
    pub fn attributes(self) -> &'static [(&'static str, usize, usize)] {
        match self {
            VertexLayout::Dynamic2D => &[
                ("pos", 0, 2),
                ("color", 2, 4),
                ("uv", 6, 2),
                ("useTex", 8, 1),
                ("object", 9, 1),
            ],
            VertexLayout::Static => &[
                ("position", 0, 3),
                ("normal", 3, 3),
                ("uv", 6, 2),
                ("userData", 8, 4),
            ],
        }
    }

    /// Floats per vertex.
    pub fn stride(self) -> usize {
        match self {
            VertexLayout::Dynamic2D => 10,
            VertexLayout::Static => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    I32(i32),
    F32(f32),
    Vector4([f32; 4]),
    Matrix4([f32; 16]),
    Vector4Array(Vec<[f32; 4]>),
}

pub type UniformVar = (&'static str, UniformValue);

/// A bound render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetBinding {
    pub kind: FramebufferKind,
    pub handle: FramebufferHandle,
    pub width: u32,
    pub height: u32,
}

/// Everything a device needs to issue one draw.
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub program: ProgramObject,
    pub mode: DrawingMode,
    pub layout: VertexLayout,
    pub vertices: BufferObject,
    pub indices: &'a [u32],
    pub uniforms: &'a [UniformVar],
    /// `(sampler uniform, texture)` pairs, bound to consecutive units.
    pub textures: &'a [(&'static str, TextureObject)],
    /// A framebuffer sampled through the `sampleBuffer` uniform.
    pub sample: Option<TargetBinding>,
}

/// Compile and link logs of a failed program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLog {
    pub vertex: String,
    pub fragment: String,
    pub link: String,
}

impl ProgramLog {
    pub fn is_empty(&self) -> bool {
        self.vertex.is_empty() && self.fragment.is_empty() && self.link.is_empty()
    }
}

impl fmt::Display for ProgramLog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.vertex.is_empty() {
            writeln!(f, "[Vertex Shader]\n{}", self.vertex)?;
        }

        if !self.fragment.is_empty() {
            writeln!(f, "[Fragment Shader]\n{}", self.fragment)?;
        }

        if !self.link.is_empty() {
            writeln!(f, "[Link]\n{}", self.link)?;
        }

        Ok(())
    }
}

pub trait Device {
    fn info(&self) -> &DeviceInfo;

    /// Creates a buffer object filled with `data`. Calling it again on a live
    /// handle re-specifies the whole storage.
    unsafe fn create_buffer(&mut self, handle: BufferObject, data: &[f32]) -> Result<()>;

    /// Overwrites floats starting at float `offset`.
    unsafe fn update_buffer(
        &mut self,
        handle: BufferObject,
        offset: usize,
        data: &[f32],
    ) -> Result<()>;

    unsafe fn delete_buffer(&mut self, handle: BufferObject) -> Result<()>;

    /// Creates a texture. Without `data` the contents are undefined.
    unsafe fn create_texture(
        &mut self,
        handle: TextureObject,
        params: TextureParams,
        data: Option<TextureData>,
    ) -> Result<()>;

    unsafe fn update_texture(
        &mut self,
        handle: TextureObject,
        area: TextureArea,
        data: TextureData,
    ) -> Result<()>;

    unsafe fn update_texture_filter(
        &mut self,
        handle: TextureObject,
        filter: TexFilter,
    ) -> Result<()>;

    /// Compiles and links a program. The error keeps vertex, fragment and
    /// link logs apart.
    unsafe fn create_program(
        &mut self,
        handle: ProgramObject,
        vs: &str,
        fs: &str,
    ) -> ::std::result::Result<(), ProgramLog>;

    /// Directs the following draws into `target`.
    unsafe fn bind_target(&mut self, target: TargetBinding) -> Result<()>;

    /// Clears color and depth of the bound target.
    unsafe fn clear(&mut self) -> Result<()>;

    /// Issues one draw, returning the number of indices submitted.
    unsafe fn draw(&mut self, call: &DrawCall) -> Result<u32>;

    /// Advance one frame.
    unsafe fn advance(&mut self) -> Result<()>;
}

pub use self::headless::HeadlessDevice;

#[cfg(not(target_arch = "wasm32"))]
pub use self::gl::device::GLDevice;
