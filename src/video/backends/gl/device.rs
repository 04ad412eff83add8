use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr;

use gl;
use gl::types::*;
use smallvec::SmallVec;

use crate::errors::*;

use super::super::super::types::{Dimension, DrawingMode, FramebufferKind, TexFilter};
use super::super::utils::DataVec;
use super::super::{
    BufferObject, Device, DeviceInfo, DrawCall, ProgramLog, ProgramObject, TargetBinding,
    TextureArea, TextureData, TextureObject, TextureParams, UniformValue,
};
use super::capabilities::Capabilities;
use super::types;

#[derive(Debug)]
struct GLProgramData {
    id: GLuint,
    uniforms: RefCell<HashMap<&'static str, GLint>>,
    attributes: RefCell<HashMap<&'static str, GLint>>,
}

impl GLProgramData {
    unsafe fn uniform_location(&self, name: &'static str) -> Result<GLint> {
        let mut uniforms = self.uniforms.borrow_mut();
        match uniforms.get(name).cloned() {
            Some(location) => Ok(location),
            None => {
                let c_name = CString::new(name.as_bytes())?;
                let location = gl::GetUniformLocation(self.id, c_name.as_ptr());
                check()?;

                uniforms.insert(name, location);
                Ok(location)
            }
        }
    }

    unsafe fn attribute_location(&self, name: &'static str) -> Result<GLint> {
        let mut attributes = self.attributes.borrow_mut();
        match attributes.get(name).cloned() {
            Some(location) => Ok(location),
            None => {
                let c_name = CString::new(name.as_bytes())?;
                let location = gl::GetAttribLocation(self.id, c_name.as_ptr());
                check()?;

                attributes.insert(name, location);
                Ok(location)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GLBufferData {
    id: GLuint,
    len: usize,
}

#[derive(Debug, Clone, Copy)]
struct GLTextureData {
    id: GLuint,
    params: TextureParams,
}

struct GLMutableState {
    blend: Option<(GLenum, GLenum)>,
    color_write: bool,
    depth_test: bool,
    view: (u32, u32),
    vaos: HashMap<(ProgramObject, BufferObject), GLuint>,
    binded_target: Option<TargetBinding>,
    binded_program: Option<ProgramObject>,
    binded_vao: Option<(ProgramObject, BufferObject)>,
    binded_texture_index: usize,
    binded_textures: SmallVec<[Option<GLuint>; 8]>,
}

/// A device issuing OpenGL calls on the context current in this thread.
pub struct GLDevice {
    info: DeviceInfo,
    capabilities: Capabilities,
    preamble: &'static str,
    state: GLMutableState,
    buffers: DataVec<GLBufferData>,
    textures: DataVec<GLTextureData>,
    programs: DataVec<GLProgramData>,
    indices: GLuint,
}

impl GLDevice {
    /// Loads the GL symbols through `loader` and creates a device on the current context.
    pub unsafe fn load_with<F>(loader: F) -> Result<Self>
    where
        F: FnMut(&str) -> *const c_void,
    {
        gl::load_with(loader);
        Self::new()
    }

    /// Creates a device on the current context, whose symbols must be loaded already.
    pub unsafe fn new() -> Result<Self> {
        let capabilities = Capabilities::parse()?;
        info!("GLDevice {:#?}", capabilities);
        capabilities.check()?;

        let (language, preamble) = capabilities.shading_language();
        let info = DeviceInfo {
            name: format!("OpenGL ({})", capabilities.renderer),
            version: format!("{:?}", capabilities.version),
            language: language.to_owned(),
            max_texture_size: capabilities.max_texture_size,
            max_texture_units: capabilities.max_combined_texture_image_units,
            framebuffers: vec![FramebufferKind::GLFBPacket],
        };

        let mut indices = 0;
        gl::GenBuffers(1, &mut indices);
        if indices == 0 {
            bail!("[GL] Failed to create the index stream buffer.");
        }

        let state = GLMutableState {
            blend: None,
            color_write: true,
            depth_test: false,
            view: (0, 0),
            vaos: HashMap::new(),
            binded_target: None,
            binded_program: None,
            binded_vao: None,
            binded_texture_index: 0,
            binded_textures: SmallVec::new(),
        };

        let mut device = GLDevice {
            info,
            capabilities,
            preamble,
            state,
            buffers: DataVec::new(),
            textures: DataVec::new(),
            programs: DataVec::new(),
            indices,
        };

        Self::reset_render_state(&mut device.state)?;
        Ok(device)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}

impl Device for GLDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    unsafe fn create_buffer(&mut self, handle: BufferObject, data: &[f32]) -> Result<()> {
        let id = match self.buffers.get(handle) {
            Some(buf) => buf.id,
            None => {
                let mut id = 0;
                gl::GenBuffers(1, &mut id);
                if id == 0 {
                    bail!("[GL] Failed to create buffer object.");
                }
                id
            }
        };

        let value = if data.is_empty() {
            ptr::null()
        } else {
            data.as_ptr() as *const c_void
        };

        gl::BindBuffer(gl::ARRAY_BUFFER, id);
        gl::BufferData(
            gl::ARRAY_BUFFER,
            (data.len() * 4) as isize,
            value,
            gl::DYNAMIC_DRAW,
        );
        check()?;

        self.buffers.create(
            handle,
            GLBufferData {
                id,
                len: data.len(),
            },
        );

        Ok(())
    }

    unsafe fn update_buffer(
        &mut self,
        handle: BufferObject,
        offset: usize,
        data: &[f32],
    ) -> Result<()> {
        let buf = self
            .buffers
            .get(handle)
            .ok_or_else(|| format_err!("{:?} is invalid.", handle))?;

        if offset + data.len() > buf.len {
            bail!("Trying to update buffer data out of bounds.");
        }

        if data.is_empty() {
            return Ok(());
        }

        gl::BindBuffer(gl::ARRAY_BUFFER, buf.id);
        gl::BufferSubData(
            gl::ARRAY_BUFFER,
            (offset * 4) as isize,
            (data.len() * 4) as isize,
            data.as_ptr() as *const c_void,
        );
        check()
    }

    unsafe fn delete_buffer(&mut self, handle: BufferObject) -> Result<()> {
        let buf = self
            .buffers
            .free(handle)
            .ok_or_else(|| format_err!("{:?} is invalid.", handle))?;

        // Removes deprecated `VertexArrayObject`s.
        let binded = &mut self.state.binded_vao;
        self.state.vaos.retain(|&(p, b), vao| {
            if b == handle {
                if *binded == Some((p, b)) {
                    *binded = None;
                }

                gl::DeleteVertexArrays(1, vao as *mut GLuint);
                false
            } else {
                true
            }
        });

        gl::DeleteBuffers(1, &buf.id);
        check()
    }

    unsafe fn create_texture(
        &mut self,
        handle: TextureObject,
        params: TextureParams,
        data: Option<TextureData>,
    ) -> Result<()> {
        if params.width > self.capabilities.max_texture_size
            || params.height > self.capabilities.max_texture_size
        {
            bail!(
                "Texture {}x{} exceeds the max size {}.",
                params.width,
                params.height,
                self.capabilities.max_texture_size
            );
        }

        let id = match self.textures.get(handle) {
            Some(texture) => texture.id,
            None => {
                let mut id = 0;
                gl::GenTextures(1, &mut id);
                if id == 0 {
                    bail!("[GL] Failed to create texture object.");
                }
                id
            }
        };

        Self::bind_texture(&mut self.state, 0, id)?;
        Self::bind_texture_params(params.filter)?;

        let (internal_format, format, pixel_type) =
            types::texture_format(params.format, &self.capabilities);

        let value = match data {
            Some(TextureData::Bytes(v)) if !v.is_empty() => v.as_ptr() as *const c_void,
            Some(TextureData::Floats(v)) if !v.is_empty() => v.as_ptr() as *const c_void,
            _ => ptr::null(),
        };

        gl::TexImage2D(
            gl::TEXTURE_2D,
            0,
            internal_format as GLint,
            params.width as GLsizei,
            params.height as GLsizei,
            0,
            format,
            pixel_type,
            value,
        );
        check()?;

        self.textures.create(handle, GLTextureData { id, params });
        Ok(())
    }

    unsafe fn update_texture(
        &mut self,
        handle: TextureObject,
        area: TextureArea,
        data: TextureData,
    ) -> Result<()> {
        let texture = *self
            .textures
            .get(handle)
            .ok_or_else(|| format_err!("{:?} is invalid.", handle))?;

        if area.x + area.width > texture.params.width
            || area.y + area.height > texture.params.height
        {
            bail!("Trying to update texture data out of bounds.");
        }

        let (_, format, pixel_type) =
            types::texture_format(texture.params.format, &self.capabilities);

        let len = area.width as usize * area.height as usize * 4;
        let value = match data {
            TextureData::Bytes(v) if v.len() >= len => v.as_ptr() as *const c_void,
            TextureData::Floats(v) if v.len() >= len => v.as_ptr() as *const c_void,
            _ => bail!("Texture data is shorter than the updated area."),
        };

        Self::bind_texture(&mut self.state, 0, texture.id)?;
        gl::TexSubImage2D(
            gl::TEXTURE_2D,
            0,
            area.x as GLint,
            area.y as GLint,
            area.width as GLsizei,
            area.height as GLsizei,
            format,
            pixel_type,
            value,
        );

        check()
    }

    unsafe fn update_texture_filter(
        &mut self,
        handle: TextureObject,
        filter: TexFilter,
    ) -> Result<()> {
        let texture = self
            .textures
            .get_mut(handle)
            .ok_or_else(|| format_err!("{:?} is invalid.", handle))?;

        texture.params.filter = filter;
        let id = texture.id;

        Self::bind_texture(&mut self.state, 0, id)?;
        Self::bind_texture_params(filter)
    }

    unsafe fn create_program(
        &mut self,
        handle: ProgramObject,
        vs: &str,
        fs: &str,
    ) -> ::std::result::Result<(), ProgramLog> {
        let mut log = ProgramLog::default();

        let vs = self.compile(gl::VERTEX_SHADER, vs).map_err(|v| log.vertex = v);
        let fs = self.compile(gl::FRAGMENT_SHADER, fs).map_err(|v| log.fragment = v);

        let (vs, fs) = match (vs, fs) {
            (Ok(vs), Ok(fs)) => (vs, fs),
            (vs, fs) => {
                for id in vs.into_iter().chain(fs) {
                    gl::DeleteShader(id);
                }

                return Err(log);
            }
        };

        let id = Self::link(vs, fs);

        gl::DetachShader(id, vs);
        gl::DeleteShader(vs);
        gl::DetachShader(id, fs);
        gl::DeleteShader(fs);

        let mut status = GLint::from(gl::FALSE);
        gl::GetProgramiv(id, gl::LINK_STATUS, &mut status);
        if status != GLint::from(gl::TRUE) {
            log.link = Self::info_log(id, gl::GetProgramiv, gl::GetProgramInfoLog);
            gl::DeleteProgram(id);
            return Err(log);
        }

        if let Err(err) = check() {
            gl::DeleteProgram(id);
            log.link = err.to_string();
            return Err(log);
        }

        self.programs.create(
            handle,
            GLProgramData {
                id,
                uniforms: RefCell::new(HashMap::new()),
                attributes: RefCell::new(HashMap::new()),
            },
        );

        Ok(())
    }

    unsafe fn bind_target(&mut self, target: TargetBinding) -> Result<()> {
        if target.kind != FramebufferKind::GLFBPacket {
            bail!("Framebuffer kind {:?} is not supported.", target.kind);
        }

        if self.state.binded_target == Some(target) {
            return Ok(());
        }

        gl::BindFramebuffer(gl::FRAMEBUFFER, target.handle.object as GLuint);
        Self::set_viewport(&mut self.state, (target.width, target.height))?;

        self.state.binded_target = Some(target);
        check()
    }

    unsafe fn clear(&mut self) -> Result<()> {
        if self.state.binded_target.is_none() {
            bail!("No render target is bound.");
        }

        // Clears need writable color and depth.
        if !self.state.color_write {
            gl::ColorMask(1, 1, 1, 1);
            self.state.color_write = true;
        }

        gl::ClearColor(0.0, 0.0, 0.0, 0.0);
        gl::ClearDepth(1.0);
        gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        check()
    }

    unsafe fn draw(&mut self, call: &DrawCall) -> Result<u32> {
        if self.state.binded_target.is_none() {
            bail!("No render target is bound.");
        }

        let program = self
            .programs
            .get(call.program)
            .ok_or_else(|| format_err!("{:?} is invalid.", call.program))?;

        if self.state.binded_program != Some(call.program) {
            gl::UseProgram(program.id);
            check()?;
            self.state.binded_program = Some(call.program);
        }

        Self::apply_mode(&mut self.state, call.mode)?;

        for &(name, ref value) in call.uniforms {
            let location = program.uniform_location(name)?;
            if location != -1 {
                Self::bind_uniform_variable(location, value)?;
            }
        }

        let mut index = 0;
        for &(name, texture) in call.textures {
            let texture = self
                .textures
                .get(texture)
                .ok_or_else(|| format_err!("{:?} is invalid.", texture))?;

            let location = program.uniform_location(name)?;
            if location != -1 {
                Self::bind_uniform_variable(location, &UniformValue::I32(index as i32))?;
                Self::bind_texture(&mut self.state, index, texture.id)?;
                index += 1;
            }
        }

        if let Some(sample) = call.sample {
            let location = program.uniform_location("sampleBuffer")?;
            if location != -1 {
                Self::bind_uniform_variable(location, &UniformValue::I32(index as i32))?;
                Self::bind_texture(&mut self.state, index, sample.handle.texture as GLuint)?;
            }
        }

        let buffer = *self
            .buffers
            .get(call.vertices)
            .ok_or_else(|| format_err!("{:?} is invalid.", call.vertices))?;

        let stride = call.layout.stride();
        if let Some(&max) = call.indices.iter().max() {
            if (max as usize + 1) * stride > buffer.len {
                bail!("Index {} is out of the vertex buffer.", max);
            }
        }

        let k = (call.program, call.vertices);
        if self.state.binded_vao != Some(k) {
            if let Some(vao) = self.state.vaos.get(&k).cloned() {
                gl::BindVertexArray(vao);
            } else {
                let mut vao = 0;
                gl::GenVertexArrays(1, &mut vao);
                gl::BindVertexArray(vao);
                gl::BindBuffer(gl::ARRAY_BUFFER, buffer.id);

                for &(name, offset, size) in call.layout.attributes() {
                    let location = program.attribute_location(name)?;
                    if location == -1 {
                        continue;
                    }

                    gl::EnableVertexAttribArray(location as GLuint);
                    gl::VertexAttribPointer(
                        location as GLuint,
                        size as GLint,
                        gl::FLOAT,
                        gl::FALSE,
                        (stride * 4) as GLsizei,
                        (offset * 4) as *const c_void,
                    );
                }

                self.state.vaos.insert(k, vao);
            }

            check()?;
            self.state.binded_vao = Some(k);
        }

        gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, self.indices);
        gl::BufferData(
            gl::ELEMENT_ARRAY_BUFFER,
            (call.indices.len() * 4) as isize,
            call.indices.as_ptr() as *const c_void,
            gl::STREAM_DRAW,
        );

        gl::DrawElements(
            call.mode.polygon.into(),
            call.indices.len() as GLsizei,
            gl::UNSIGNED_INT,
            ptr::null(),
        );

        check()?;
        Ok(call.indices.len() as u32)
    }

    unsafe fn advance(&mut self) -> Result<()> {
        gl::Flush();
        check()
    }
}

impl Drop for GLDevice {
    fn drop(&mut self) {
        unsafe {
            for vao in self.state.vaos.values() {
                gl::DeleteVertexArrays(1, vao);
            }

            for v in self.buffers.iter() {
                gl::DeleteBuffers(1, &v.id);
            }

            for v in self.textures.iter() {
                gl::DeleteTextures(1, &v.id);
            }

            for v in self.programs.iter() {
                gl::DeleteProgram(v.id);
            }

            gl::DeleteBuffers(1, &self.indices);
        }
    }
}

impl GLDevice {
    unsafe fn reset_render_state(state: &mut GLMutableState) -> Result<()> {
        gl::Disable(gl::CULL_FACE);
        gl::FrontFace(gl::CCW);

        gl::Disable(gl::DEPTH_TEST);
        gl::DepthMask(gl::TRUE);
        gl::DepthFunc(gl::LEQUAL);
        state.depth_test = false;

        gl::Disable(gl::BLEND);
        state.blend = None;

        gl::ColorMask(1, 1, 1, 1);
        state.color_write = true;

        gl::Disable(gl::SCISSOR_TEST);
        gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
        gl::PixelStorei(gl::PACK_ALIGNMENT, 1);
        gl::BindFramebuffer(gl::FRAMEBUFFER, 0);

        check()
    }

    /// Translates a drawing mode into blend, color mask and depth state.
    unsafe fn apply_mode(state: &mut GLMutableState, mode: DrawingMode) -> Result<()> {
        let blend = types::blend_factors(mode.alpha_rule);
        if state.blend != blend {
            if let Some((src, dst)) = blend {
                if state.blend.is_none() {
                    gl::Enable(gl::BLEND);
                }

                gl::BlendFunc(src, dst);
                gl::BlendEquation(gl::FUNC_ADD);
            } else {
                gl::Disable(gl::BLEND);
            }

            state.blend = blend;
        }

        let color_write = types::color_write(mode.alpha_rule);
        if state.color_write != color_write {
            let v = color_write as GLboolean;
            gl::ColorMask(v, v, v, v);
            state.color_write = color_write;
        }

        let depth_test = mode.dimension == Dimension::D3;
        if state.depth_test != depth_test {
            if depth_test {
                gl::Enable(gl::DEPTH_TEST);
            } else {
                gl::Disable(gl::DEPTH_TEST);
            }

            state.depth_test = depth_test;
        }

        check()
    }

    unsafe fn set_viewport(state: &mut GLMutableState, size: (u32, u32)) -> Result<()> {
        if state.view != size {
            gl::Viewport(0, 0, size.0 as GLsizei, size.1 as GLsizei);
            state.view = size;
            check()?;
        }

        Ok(())
    }

    unsafe fn bind_uniform_variable(location: GLint, variable: &UniformValue) -> Result<()> {
        match *variable {
            UniformValue::I32(v) => gl::Uniform1i(location, v),
            UniformValue::F32(v) => gl::Uniform1f(location, v),
            UniformValue::Vector4(v) => gl::Uniform4f(location, v[0], v[1], v[2], v[3]),
            UniformValue::Matrix4(ref v) => {
                gl::UniformMatrix4fv(location, 1, gl::FALSE, v.as_ptr())
            }
            UniformValue::Vector4Array(ref v) => {
                if !v.is_empty() {
                    gl::Uniform4fv(location, v.len() as GLsizei, v[0].as_ptr());
                }
            }
        }

        check()
    }

    unsafe fn bind_texture(state: &mut GLMutableState, index: usize, id: GLuint) -> Result<()> {
        if state.binded_texture_index != index {
            state.binded_texture_index = index;
            gl::ActiveTexture(gl::TEXTURE0 + index as GLuint);
        }

        if state.binded_textures.len() <= index {
            state.binded_textures.resize(index + 1, None);
        }

        if state.binded_textures[index] != Some(id) {
            state.binded_textures[index] = Some(id);
            gl::BindTexture(gl::TEXTURE_2D, id);
        }

        check()
    }

    unsafe fn bind_texture_params(filter: TexFilter) -> Result<()> {
        let filter: GLenum = filter.into();
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, filter as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, filter as GLint);
        check()
    }

    unsafe fn compile(&self, shader: GLenum, src: &str) -> ::std::result::Result<GLuint, String> {
        let src = if src.trim_start().starts_with("#version") {
            src.to_owned()
        } else {
            format!("{}{}", self.preamble, src)
        };

        let c_str = CString::new(src.into_bytes()).map_err(|e| e.to_string())?;

        let id = gl::CreateShader(shader);
        gl::ShaderSource(id, 1, &c_str.as_ptr(), ptr::null());
        gl::CompileShader(id);

        let mut status = GLint::from(gl::FALSE);
        gl::GetShaderiv(id, gl::COMPILE_STATUS, &mut status);

        if status != GLint::from(gl::TRUE) {
            let log = Self::info_log(id, gl::GetShaderiv, gl::GetShaderInfoLog);
            gl::DeleteShader(id);
            Err(log)
        } else {
            Ok(id)
        }
    }

    unsafe fn link(vs: GLuint, fs: GLuint) -> GLuint {
        let program = gl::CreateProgram();
        gl::AttachShader(program, vs);
        gl::AttachShader(program, fs);
        gl::LinkProgram(program);
        program
    }

    unsafe fn info_log(
        id: GLuint,
        param: unsafe fn(GLuint, GLenum, *mut GLint),
        log: unsafe fn(GLuint, GLsizei, *mut GLsizei, *mut GLchar),
    ) -> String {
        let mut len = 0;
        param(id, gl::INFO_LOG_LENGTH, &mut len);
        if len <= 1 {
            return "Unknown error.".to_owned();
        }

        let mut buf = vec![0u8; len as usize];
        let mut written = 0;
        log(id, len, &mut written, buf.as_mut_ptr() as *mut GLchar);
        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

pub(crate) unsafe fn check() -> Result<()> {
    match gl::GetError() {
        gl::NO_ERROR => Ok(()),

        gl::INVALID_ENUM => {
            bail!("[GL] An unacceptable value is specified for an enumerated argument.")
        }

        gl::INVALID_VALUE => bail!("[GL] A numeric argument is out of range."),

        gl::INVALID_OPERATION => {
            bail!("[GL] The specified operation is not allowed in the current state.")
        }

        gl::INVALID_FRAMEBUFFER_OPERATION => bail!(
            r"[GL] The command is trying to render to or read from the framebufferwhile the \
            currently bound framebuffer is not framebuffer complete."
        ),

        gl::OUT_OF_MEMORY => bail!("[GL] There is not enough memory left to execute the command."),
        _ => bail!("[GL] Oops, Unknown OpenGL error."),
    }
}
