use std::ptr;

use gl;
use gl::types::*;

use crate::errors::*;

use super::super::super::framebuffer::{FramebufferBackend, FramebufferHandle};
use super::super::super::types::{rgba_len, FramebufferKind};
use super::device::check;

/// A `GLFBPacket` framebuffer: a color texture and a depth renderbuffer attached to a
/// framebuffer object. The GL context must be current whenever it is touched.
pub struct GLFramebufferBackend {
    fbo: GLuint,
    texture: GLuint,
    depth: GLuint,
    filtered: bool,
}

impl GLFramebufferBackend {
    pub unsafe fn new() -> Result<Self> {
        let mut backend = GLFramebufferBackend {
            fbo: 0,
            texture: 0,
            depth: 0,
            filtered: true,
        };

        gl::GenFramebuffers(1, &mut backend.fbo);
        gl::GenTextures(1, &mut backend.texture);
        gl::GenRenderbuffers(1, &mut backend.depth);
        check()?;

        if backend.fbo == 0 || backend.texture == 0 || backend.depth == 0 {
            bail!("[GL] Failed to create framebuffer objects.");
        }

        Ok(backend)
    }

    unsafe fn allocate(&mut self, width: u32, height: u32) -> Result<()> {
        let saved = Bindings::capture();
        let status = self.specify(width, height);
        saved.restore();

        let status = status?;
        check()?;

        if status != gl::FRAMEBUFFER_COMPLETE {
            bail!("[GL] Framebuffer is incomplete ({:#x}).", status);
        }

        Ok(())
    }

    unsafe fn specify(&mut self, width: u32, height: u32) -> Result<GLenum> {
        gl::BindTexture(gl::TEXTURE_2D, self.texture);
        gl::TexImage2D(
            gl::TEXTURE_2D,
            0,
            gl::RGBA8 as GLint,
            width as GLsizei,
            height as GLsizei,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            ptr::null(),
        );
        self.apply_filter()?;

        gl::BindRenderbuffer(gl::RENDERBUFFER, self.depth);
        gl::RenderbufferStorage(
            gl::RENDERBUFFER,
            gl::DEPTH_COMPONENT24,
            width as GLsizei,
            height as GLsizei,
        );

        gl::BindFramebuffer(gl::FRAMEBUFFER, self.fbo);
        gl::FramebufferTexture2D(
            gl::FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::TEXTURE_2D,
            self.texture,
            0,
        );
        gl::FramebufferRenderbuffer(
            gl::FRAMEBUFFER,
            gl::DEPTH_ATTACHMENT,
            gl::RENDERBUFFER,
            self.depth,
        );

        let status = gl::CheckFramebufferStatus(gl::FRAMEBUFFER);
        check()?;
        Ok(status)
    }

    /// Sets the filter of the color texture, which must be bound on the active unit.
    unsafe fn apply_filter(&self) -> Result<()> {
        let filter = if self.filtered { gl::LINEAR } else { gl::NEAREST };
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, filter as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, filter as GLint);
        check()
    }
}

/// The bindings a backend call touches. `GLDevice` caches its bindings, so
/// they are put back as found once the call is done.
struct Bindings {
    framebuffer: GLint,
    read_framebuffer: GLint,
    renderbuffer: GLint,
    texture: GLint,
}

impl Bindings {
    unsafe fn capture() -> Self {
        let mut v = Bindings {
            framebuffer: 0,
            read_framebuffer: 0,
            renderbuffer: 0,
            texture: 0,
        };

        gl::GetIntegerv(gl::DRAW_FRAMEBUFFER_BINDING, &mut v.framebuffer);
        gl::GetIntegerv(gl::READ_FRAMEBUFFER_BINDING, &mut v.read_framebuffer);
        gl::GetIntegerv(gl::RENDERBUFFER_BINDING, &mut v.renderbuffer);
        gl::GetIntegerv(gl::TEXTURE_BINDING_2D, &mut v.texture);
        v
    }

    unsafe fn restore(&self) {
        gl::BindFramebuffer(gl::DRAW_FRAMEBUFFER, self.framebuffer as GLuint);
        gl::BindFramebuffer(gl::READ_FRAMEBUFFER, self.read_framebuffer as GLuint);
        gl::BindRenderbuffer(gl::RENDERBUFFER, self.renderbuffer as GLuint);
        gl::BindTexture(gl::TEXTURE_2D, self.texture as GLuint);
    }
}

impl FramebufferBackend for GLFramebufferBackend {
    fn kind(&self) -> FramebufferKind {
        FramebufferKind::GLFBPacket
    }

    fn handle(&self) -> FramebufferHandle {
        FramebufferHandle {
            object: u64::from(self.fbo),
            texture: u64::from(self.texture),
        }
    }

    fn on_resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }

        match unsafe { self.allocate(width, height) } {
            Ok(_) => true,
            Err(err) => {
                warn!("[GLFramebuffer] resize to {}x{} failed: {}", width, height, err);
                false
            }
        }
    }

    fn on_filter_change(&mut self, filtered: bool) {
        self.filtered = filtered;

        let result = unsafe {
            let saved = Bindings::capture();
            gl::BindTexture(gl::TEXTURE_2D, self.texture);
            let result = self.apply_filter();
            saved.restore();
            result
        };

        if let Err(err) = result {
            warn!("[GLFramebuffer] filter change failed: {}", err);
        }
    }

    fn raw_data(&self, width: u32, height: u32, out: &mut [u8]) -> bool {
        let row = width as usize * 4;
        match rgba_len(width, height) {
            Some(len) if out.len() >= len => {}
            _ => return false,
        }

        let result = unsafe {
            let saved = Bindings::capture();
            gl::BindFramebuffer(gl::READ_FRAMEBUFFER, self.fbo);
            gl::ReadPixels(
                0,
                0,
                width as GLsizei,
                height as GLsizei,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                out.as_mut_ptr() as *mut _,
            );
            saved.restore();
            check()
        };

        if let Err(err) = result {
            warn!("[GLFramebuffer] read back failed: {}", err);
            return false;
        }

        // GL rows start at the bottom.
        let (mut top, mut bottom) = (0, height as usize);
        while top + 1 < bottom {
            bottom -= 1;
            let (head, tail) = out.split_at_mut(bottom * row);
            head[top * row..(top + 1) * row].swap_with_slice(&mut tail[..row]);
            top += 1;
        }

        true
    }
}

impl Drop for GLFramebufferBackend {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteFramebuffers(1, &self.fbo);
            gl::DeleteTextures(1, &self.texture);
            gl::DeleteRenderbuffers(1, &self.depth);
        }
    }
}
