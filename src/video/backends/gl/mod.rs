pub mod capabilities;
pub mod device;
pub mod framebuffer;
pub mod types;

pub use self::framebuffer::GLFramebufferBackend;
