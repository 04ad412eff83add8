//! A device without GPU. Objects live in main memory and every draw is
//! recorded, so callers can inspect exactly what would have been submitted.
//!
//! Shader sources are not compiled. A stage fails if it has no `main` or if
//! one of its lines starts with `#error`; linking fails if either stage holds
//! a `#pragma link_error` line. Line numbers in logs follow `#line` the way
//! GLSL does.

use crate::errors::*;

use super::super::settings::VideoParams;
use super::super::types::{DrawingMode, TexFilter};
use super::utils::DataVec;
use super::*;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramObject,
    pub mode: DrawingMode,
    pub layout: VertexLayout,
    pub indices: Vec<u32>,
    /// The floats of every referenced vertex, in index order.
    pub vertices: Vec<Vec<f32>>,
    pub uniforms: Vec<UniformVar>,
    pub textures: Vec<(&'static str, TextureObject)>,
    pub target: TargetBinding,
    pub sample: Option<TargetBinding>,
}

impl DrawRecord {
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms
            .iter()
            .find(|&&(n, _)| n == name)
            .map(|&(_, ref v)| v)
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessTexture {
    pub params: TextureParams,
    pub bytes: Vec<u8>,
    pub floats: Vec<f32>,
}

impl HeadlessTexture {
    fn new(params: TextureParams) -> Self {
        let texels = params.width as usize * params.height as usize;
        let (bytes, floats) = match params.format {
            TextureFormat::RGBA8 => (vec![0; texels * 4], Vec::new()),
            TextureFormat::RGBA32F => (Vec::new(), vec![0.0; texels * 4]),
        };

        HeadlessTexture {
            params,
            bytes,
            floats,
        }
    }

    /// Returns the RGBA8 texel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.params.width || y >= self.params.height || self.bytes.is_empty() {
            return None;
        }

        let i = (y as usize * self.params.width as usize + x as usize) * 4;
        let mut v = [0; 4];
        v.copy_from_slice(&self.bytes[i..i + 4]);
        Some(v)
    }

    /// Nearest-texel lookup at normalized coordinates.
    pub fn sample(&self, u: f32, v: f32) -> Option<[u8; 4]> {
        let x = (u * self.params.width as f32).floor();
        let y = (v * self.params.height as f32).floor();
        if x < 0.0 || y < 0.0 {
            return None;
        }

        self.pixel(x as u32, y as u32)
    }

    /// Returns the four floats of the RGBA32F texel at `(x, y)`.
    pub fn texel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.params.width || y >= self.params.height || self.floats.is_empty() {
            return None;
        }

        let i = (y as usize * self.params.width as usize + x as usize) * 4;
        let mut v = [0.0; 4];
        v.copy_from_slice(&self.floats[i..i + 4]);
        Some(v)
    }

    fn write(&mut self, area: TextureArea, data: TextureData) -> Result<()> {
        if area.x + area.width > self.params.width || area.y + area.height > self.params.height
        {
            bail!("Trying to update texture data out of bounds.");
        }

        let row = area.width as usize * 4;
        for r in 0..area.height as usize {
            let dst = (((area.y as usize + r) * self.params.width as usize) + area.x as usize) * 4;
            let src = r * row;

            match data {
                TextureData::Bytes(v) if self.params.format == TextureFormat::RGBA8 => {
                    if v.len() < src + row {
                        bail!("Texture data is shorter than the updated area.");
                    }

                    self.bytes[dst..dst + row].copy_from_slice(&v[src..src + row]);
                }
                TextureData::Floats(v) if self.params.format == TextureFormat::RGBA32F => {
                    if v.len() < src + row {
                        bail!("Texture data is shorter than the updated area.");
                    }

                    self.floats[dst..dst + row].copy_from_slice(&v[src..src + row]);
                }
                _ => bail!("Texture data does not match format {:?}.", self.params.format),
            }
        }

        Ok(())
    }
}

/// Counters of device activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub buffers_alive: usize,
    pub buffers_created: usize,
    pub buffer_updates: usize,
    pub textures_alive: usize,
    pub texture_uploads: usize,
    pub programs_alive: usize,
    pub clears: usize,
    pub frames: usize,
}

/// The sources a program was created from, preludes included.
#[derive(Debug, Clone)]
pub struct HeadlessProgram {
    pub vs: String,
    pub fs: String,
}

pub struct HeadlessDevice {
    info: DeviceInfo,
    stats: HeadlessStats,
    buffers: DataVec<Vec<f32>>,
    textures: DataVec<HeadlessTexture>,
    programs: DataVec<HeadlessProgram>,
    target: Option<TargetBinding>,
    draws: Vec<DrawRecord>,
}

impl HeadlessDevice {
    pub fn new(params: &VideoParams) -> Self {
        HeadlessDevice {
            info: DeviceInfo {
                name: "Headless".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                language: "GLSL 1.40".to_owned(),
                max_texture_size: params.atlas_max_size,
                max_texture_units: params.max_texture_bindings as u32,
                framebuffers: params.framebuffers.clone(),
            },
            stats: HeadlessStats::default(),
            buffers: DataVec::new(),
            textures: DataVec::new(),
            programs: DataVec::new(),
            target: None,
            draws: Vec::new(),
        }
    }

    /// Every draw issued so far.
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    pub fn target(&self) -> Option<TargetBinding> {
        self.target
    }

    pub fn buffer(&self, handle: BufferObject) -> Option<&[f32]> {
        self.buffers.get(handle).map(|v| v.as_slice())
    }

    pub fn texture(&self, handle: TextureObject) -> Option<&HeadlessTexture> {
        self.textures.get(handle)
    }

    pub fn program(&self, handle: ProgramObject) -> Option<&HeadlessProgram> {
        self.programs.get(handle)
    }

    fn compile(stage: &str) -> ::std::result::Result<(), String> {
        if !stage.contains("main") {
            return Err("ERROR: 0:0: 'main' : function is not defined".to_owned());
        }

        let mut errors = Vec::new();
        let mut number = 1;
        for line in stage.lines() {
            let line = line.trim();
            if line.starts_with("#line ") {
                if let Ok(v) = line["#line ".len()..].trim().parse::<usize>() {
                    number = v + 1;
                    continue;
                }
            }

            if line.starts_with("#error") {
                errors.push(format!("ERROR: 0:{}: {}", number, line["#error".len()..].trim()));
            }

            number += 1;
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

impl Device for HeadlessDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    unsafe fn create_buffer(&mut self, handle: BufferObject, data: &[f32]) -> Result<()> {
        if self.buffers.create(handle, data.to_vec()).is_none() {
            self.stats.buffers_alive += 1;
            self.stats.buffers_created += 1;
        }

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
            .get_mut(handle)
            .ok_or_else(|| format_err!("{:?} is invalid.", handle))?;

        if offset + data.len() > buf.len() {
            bail!("Trying to update buffer data out of bounds.");
        }

        buf[offset..offset + data.len()].copy_from_slice(data);
        self.stats.buffer_updates += 1;
        Ok(())
    }

    unsafe fn delete_buffer(&mut self, handle: BufferObject) -> Result<()> {
        self.buffers
            .free(handle)
            .ok_or_else(|| format_err!("{:?} is invalid.", handle))?;

        self.stats.buffers_alive -= 1;
        Ok(())
    }

    unsafe fn create_texture(
        &mut self,
        handle: TextureObject,
        params: TextureParams,
        data: Option<TextureData>,
    ) -> Result<()> {
        let mut texture = HeadlessTexture::new(params);
        if let Some(data) = data {
            let area = TextureArea {
                x: 0,
                y: 0,
                width: params.width,
                height: params.height,
            };

            texture.write(area, data)?;
            self.stats.texture_uploads += 1;
        }

        if self.textures.create(handle, texture).is_none() {
            self.stats.textures_alive += 1;
        }

        Ok(())
    }

    unsafe fn update_texture(
        &mut self,
        handle: TextureObject,
        area: TextureArea,
        data: TextureData,
    ) -> Result<()> {
        let texture = self
            .textures
            .get_mut(handle)
            .ok_or_else(|| format_err!("{:?} is invalid.", handle))?;

        texture.write(area, data)?;
        self.stats.texture_uploads += 1;
        Ok(())
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
        Ok(())
    }

    unsafe fn create_program(
        &mut self,
        handle: ProgramObject,
        vs: &str,
        fs: &str,
    ) -> ::std::result::Result<(), ProgramLog> {
        let mut log = ProgramLog::default();
        if let Err(err) = Self::compile(vs) {
            log.vertex = err;
        }

        if let Err(err) = Self::compile(fs) {
            log.fragment = err;
        }

        if log.is_empty() {
            let pragma = |src: &str| src.lines().any(|v| v.trim() == "#pragma link_error");
            if pragma(vs) || pragma(fs) {
                log.link = "ERROR: Linking failed.".to_owned();
            }
        }

        if !log.is_empty() {
            return Err(log);
        }

        let program = HeadlessProgram {
            vs: vs.to_owned(),
            fs: fs.to_owned(),
        };

        if self.programs.create(handle, program).is_none() {
            self.stats.programs_alive += 1;
        }

        Ok(())
    }

    unsafe fn bind_target(&mut self, target: TargetBinding) -> Result<()> {
        if !self.info.framebuffers.contains(&target.kind) {
            bail!("Framebuffer kind {:?} is not supported.", target.kind);
        }

        self.target = Some(target);
        Ok(())
    }

    unsafe fn clear(&mut self) -> Result<()> {
        if self.target.is_none() {
            bail!("No render target is bound.");
        }

        self.stats.clears += 1;
        Ok(())
    }

    unsafe fn draw(&mut self, call: &DrawCall) -> Result<u32> {
        let target = self
            .target
            .ok_or_else(|| format_err!("No render target is bound."))?;

        if self.programs.get(call.program).is_none() {
            bail!("{:?} is invalid.", call.program);
        }

        for &(_, texture) in call.textures {
            if self.textures.get(texture).is_none() {
                bail!("{:?} is invalid.", texture);
            }
        }

        let buf = self
            .buffers
            .get(call.vertices)
            .ok_or_else(|| format_err!("{:?} is invalid.", call.vertices))?;

        let stride = call.layout.stride();
        let mut vertices = Vec::with_capacity(call.indices.len());
        for &i in call.indices {
            let from = i as usize * stride;
            if from + stride > buf.len() {
                bail!("Index {} is out of the vertex buffer.", i);
            }

            vertices.push(buf[from..from + stride].to_vec());
        }

        self.draws.push(DrawRecord {
            program: call.program,
            mode: call.mode,
            layout: call.layout,
            indices: call.indices.to_vec(),
            vertices,
            uniforms: call.uniforms.to_vec(),
            textures: call.textures.to_vec(),
            target,
            sample: call.sample,
        });

        Ok(call.indices.len() as u32)
    }

    unsafe fn advance(&mut self) -> Result<()> {
        self.stats.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::HandlePool;

    #[test]
    fn compile_logs() {
        let mut device = HeadlessDevice::new(&VideoParams::default());
        let mut pool: HandlePool<ProgramObject> = HandlePool::new();

        let vs = "void main() {}";
        let fs = "void main() {\n#error missing color\n}";

        let log = unsafe { device.create_program(pool.create(), vs, fs) }.unwrap_err();
        assert!(log.vertex.is_empty());
        assert_eq!(log.fragment, "ERROR: 0:2: missing color");
        assert!(log.link.is_empty());

        let fs = "#pragma link_error\nvoid main() {}";
        let log = unsafe { device.create_program(pool.create(), vs, fs) }.unwrap_err();
        assert!(!log.link.is_empty());

        assert!(unsafe { device.create_program(pool.create(), vs, vs) }.is_ok());
        assert_eq!(device.stats().programs_alive, 1);
    }

    #[test]
    fn texture_area() {
        let mut device = HeadlessDevice::new(&VideoParams::default());
        let mut pool: HandlePool<TextureObject> = HandlePool::new();
        let handle = pool.create();

        let params = TextureParams {
            width: 4,
            height: 4,
            format: TextureFormat::RGBA8,
            filter: TexFilter::Linear,
        };

        unsafe {
            device.create_texture(handle, params, None).unwrap();

            let area = TextureArea {
                x: 1,
                y: 2,
                width: 2,
                height: 1,
            };

            let bytes = [1, 2, 3, 4, 5, 6, 7, 8];
            device
                .update_texture(handle, area, TextureData::Bytes(&bytes))
                .unwrap();
        }

        let texture = device.texture(handle).unwrap();
        assert_eq!(texture.pixel(1, 2), Some([1, 2, 3, 4]));
        assert_eq!(texture.pixel(2, 2), Some([5, 6, 7, 8]));
        assert_eq!(texture.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(texture.sample(0.3, 0.6), Some([1, 2, 3, 4]));
    }
}
