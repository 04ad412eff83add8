//! Draw dispatch behind the `Renderer` contract.
//!
//! `ShaderRenderer` implements the contract over any `Device`. Two devices ship with the
//! crate: `GLDevice` for an OpenGL 3.3 core context created by the embedder, and
//! `HeadlessDevice` which keeps every resource in memory and records draws.
//!
//! 2D geometry is retained: vertices and objects live in the renderer until removed, and a
//! frame only queues ids. Static geometry lives in render buffers and is drawn immediately.
//! Every texture is packed into one atlas, so a frame never switches texture bindings.

pub mod backends;
pub mod diagnostic;
pub mod errors;
pub mod framebuffer;
pub mod light;
pub mod render_buffer;
pub mod renderer;
pub mod renderer2d;
pub mod settings;
pub mod shader_renderer;
pub mod shaders;
pub mod static_renderer;
pub mod texture_atlas;
pub mod types;

pub mod prelude {
    pub use super::backends::headless::HeadlessDevice;
    #[cfg(not(target_arch = "wasm32"))]
    pub use super::backends::gl::device::GLDevice;
    pub use super::backends::Device;
    pub use super::diagnostic::{Diagnostic, DiagnosticHook, DiagnosticKind};
    pub use super::errors::Error as VideoError;
    pub use super::framebuffer::{
        Framebuffer, FramebufferBackend, PixelArrayBackend, SharedFramebuffer,
    };
    pub use super::renderer::Renderer;
    pub use super::settings::VideoParams;
    pub use super::shader_renderer::ShaderRenderer;
    pub use super::types::*;
}
