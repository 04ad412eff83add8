//! The batched 2D path.
//!
//! Vertices are packed into one device buffer, ten floats each:
//!
//! `x, y, r, g, b, a, u, v, useTex, object`
//!
//! where `u, v` are atlas coordinates, `useTex` is `0` for textured and `-1` for untextured
//! vertices and `object` is the row of the vertex's transform in the object texture, or `-1`.
//! The object texture is RGBA32F, four texels wide, one row per object holding the columns of
//! its matrix.

use std::mem;

use super::backends::{
    BufferObject, Device, DrawCall, ProgramObject, TextureArea, TextureData, TextureFormat,
    TextureObject, TextureParams, UniformValue, VertexLayout,
};
use super::errors::*;
use super::settings::VideoParams;
use super::texture_atlas::TextureManager;
use super::types::{
    DrawingMode, Object2DId, Render2DObjectParameters, Render2DStaticParameters, TexFilter,
    Vertex2D, Vertex2DId, IDENTITY, OBJECT_2D_FLOATS, VERTEX_2D_FLOATS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AtlasState {
    width: u32,
    height: u32,
    revision: u64,
}

pub struct Renderer2D {
    vertex_block: usize,
    object_block: usize,

    vertices: Vec<Vertex2D>,
    packed: Vec<f32>,
    alive: Vec<bool>,
    dead_vertices: Vec<u32>,
    next_vertex: usize,
    /// Slot range `[from, to)` changed since the last upload.
    dirty_vertices: Option<(usize, usize)>,

    objects: Vec<f32>,
    objects_alive: Vec<bool>,
    dead_objects: Vec<u32>,
    next_object: usize,
    dirty_objects: bool,

    queue: Vec<u32>,

    vbo: BufferObject,
    vbo_len: usize,
    object_texture: TextureObject,
    object_rows: u32,
    atlas: Option<AtlasState>,
}

impl Renderer2D {
    pub fn new(params: &VideoParams, vbo: BufferObject, object_texture: TextureObject) -> Self {
        let mut renderer = Renderer2D {
            vertex_block: params.vertex_block.max(1),
            object_block: params.object_block.max(1),

            vertices: Vec::new(),
            packed: Vec::new(),
            alive: Vec::new(),
            dead_vertices: Vec::new(),
            next_vertex: 0,
            dirty_vertices: None,

            objects: Vec::new(),
            objects_alive: Vec::new(),
            dead_objects: Vec::new(),
            next_object: 0,
            dirty_objects: true,

            queue: Vec::new(),

            vbo,
            vbo_len: 0,
            object_texture,
            object_rows: 0,
            atlas: None,
        };

        renderer.grow_vertices();
        renderer.grow_objects();
        renderer
    }

    pub fn add_vertex(&mut self, v: Vertex2D, atlas: &TextureManager) -> Vertex2DId {
        let index = match self.dead_vertices.pop() {
            Some(i) => i as usize,
            None => {
                if self.next_vertex == self.vertices.len() {
                    self.grow_vertices();
                }

                self.next_vertex += 1;
                self.next_vertex - 1
            }
        };

        self.alive[index] = true;
        self.write_vertex(index, v, atlas);
        Vertex2DId(index as u32)
    }

    pub fn remove_vertex(&mut self, id: Vertex2DId) -> bool {
        if !self.is_vertex_alive(id) {
            return false;
        }

        self.alive[id.0 as usize] = false;
        self.dead_vertices.push(id.0);
        true
    }

    pub fn set_vertex(&mut self, id: Vertex2DId, v: Vertex2D, atlas: &TextureManager) -> bool {
        if !self.is_vertex_alive(id) {
            return false;
        }

        self.write_vertex(id.0 as usize, v, atlas);
        true
    }

    /// Returns the vertex as it was set, with texture-local coordinates.
    pub fn vertex(&self, id: Vertex2DId) -> Option<Vertex2D> {
        if self.is_vertex_alive(id) {
            Some(self.vertices[id.0 as usize])
        } else {
            None
        }
    }

    #[inline]
    pub fn is_vertex_alive(&self, id: Vertex2DId) -> bool {
        self.alive.get(id.0 as usize).cloned().unwrap_or(false)
    }

    /// The packed floats of a vertex slot.
    pub fn packed_vertex(&self, id: Vertex2DId) -> Option<&[f32]> {
        if self.is_vertex_alive(id) {
            let from = id.0 as usize * VERTEX_2D_FLOATS;
            Some(&self.packed[from..from + VERTEX_2D_FLOATS])
        } else {
            None
        }
    }

    #[inline]
    pub fn vertex_capacity(&self) -> usize {
        self.vertices.len()
    }

    /// Adds an object with identity transform.
    pub fn add_object(&mut self) -> Object2DId {
        let index = match self.dead_objects.pop() {
            Some(i) => i as usize,
            None => {
                if self.next_object == self.objects_alive.len() {
                    self.grow_objects();
                }

                self.next_object += 1;
                self.next_object - 1
            }
        };

        self.objects_alive[index] = true;
        self.write_object(index, &IDENTITY);
        Object2DId(index as u32)
    }

    pub fn remove_object(&mut self, id: Object2DId) -> bool {
        if !self.is_object_alive(id) {
            return false;
        }

        let index = id.0 as usize;
        self.objects_alive[index] = false;
        self.write_object(index, &IDENTITY);
        self.dead_objects.push(id.0);
        true
    }

    pub fn set_object(&mut self, id: Object2DId, params: &Render2DObjectParameters) -> bool {
        if !self.is_object_alive(id) {
            return false;
        }

        self.write_object(id.0 as usize, &params.data);
        true
    }

    pub fn object(&self, id: Object2DId) -> Option<Render2DObjectParameters> {
        if !self.is_object_alive(id) {
            return None;
        }

        let from = id.0 as usize * OBJECT_2D_FLOATS;
        let mut data = [0.0; OBJECT_2D_FLOATS];
        data.copy_from_slice(&self.objects[from..from + OBJECT_2D_FLOATS]);
        Some(Render2DObjectParameters { data })
    }

    #[inline]
    pub fn is_object_alive(&self, id: Object2DId) -> bool {
        self.objects_alive
            .get(id.0 as usize)
            .cloned()
            .unwrap_or(false)
    }

    #[inline]
    pub fn object_capacity(&self) -> usize {
        self.objects_alive.len()
    }

    /// Appends vertices to the pending draw. Returns how many ids were skipped because they
    /// do not name a live vertex.
    pub fn queue(&mut self, ids: &[Vertex2DId]) -> usize {
        let mut skipped = 0;
        self.queue.reserve(ids.len());

        for &id in ids {
            if self.is_vertex_alive(id) {
                self.queue.push(id.0);
            } else {
                skipped += 1;
            }
        }

        skipped
    }

    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Draws every queued vertex in one call and empties the queue. Nothing reaches the device
    /// if the queue is empty.
    pub fn render<D: Device>(
        &mut self,
        device: &mut D,
        atlas: &mut TextureManager,
        program: ProgramObject,
        mode: DrawingMode,
        params: &Render2DStaticParameters,
    ) -> Result<u32> {
        let mut indices = mem::replace(&mut self.queue, Vec::new());
        {
            let alive = &self.alive;
            indices.retain(|&i| alive[i as usize]);
        }

        if indices.is_empty() {
            return Ok(0);
        }

        let atlas_object = atlas.sync(device)?;
        self.rebase(atlas);
        self.upload(device)?;

        let uniforms = [
            ("contextWidth", UniformValue::F32(params.context_width)),
            ("contextHeight", UniformValue::F32(params.context_height)),
            (
                "contextTransform",
                UniformValue::Matrix4(params.context_transform),
            ),
        ];

        let textures = [("atlas", atlas_object), ("objects", self.object_texture)];

        let call = DrawCall {
            program,
            mode,
            layout: VertexLayout::Dynamic2D,
            vertices: self.vbo,
            indices: &indices,
            uniforms: &uniforms,
            textures: &textures,
            sample: None,
        };

        Ok(unsafe { device.draw(&call) }?)
    }

    /// Remaps every textured vertex into atlas space if the atlas changed size or layout since
    /// the last render.
    fn rebase(&mut self, atlas: &TextureManager) {
        let state = AtlasState {
            width: atlas.width(),
            height: atlas.height(),
            revision: atlas.revision(),
        };

        if self.atlas == Some(state) {
            return;
        }

        let mut rebased = 0;
        for index in 0..self.next_vertex {
            if self.alive[index] && self.vertices[index].texture.is_some() {
                let v = self.vertices[index];
                self.write_vertex(index, v, atlas);
                rebased += 1;
            }
        }

        debug!(
            "[Renderer2D] Rebased {} vertices onto a {}x{} atlas.",
            rebased, state.width, state.height
        );

        self.atlas = Some(state);
    }

    fn upload<D: Device>(&mut self, device: &mut D) -> Result<()> {
        if let Some((from, to)) = self.dirty_vertices.take() {
            unsafe {
                if self.vbo_len != self.packed.len() {
                    device.create_buffer(self.vbo, &self.packed)?;
                    self.vbo_len = self.packed.len();
                } else {
                    let (from, to) = (from * VERTEX_2D_FLOATS, to * VERTEX_2D_FLOATS);
                    device.update_buffer(self.vbo, from, &self.packed[from..to])?;
                }
            }
        }

        if self.dirty_objects {
            let rows = self.objects_alive.len() as u32;
            let data = TextureData::Floats(&self.objects);

            unsafe {
                if self.object_rows != rows {
                    let params = TextureParams {
                        width: 4,
                        height: rows,
                        format: TextureFormat::RGBA32F,
                        filter: TexFilter::NoFilter,
                    };

                    device.create_texture(self.object_texture, params, Some(data))?;
                    self.object_rows = rows;
                } else {
                    let area = TextureArea {
                        x: 0,
                        y: 0,
                        width: 4,
                        height: rows,
                    };

                    device.update_texture(self.object_texture, area, data)?;
                }
            }

            self.dirty_objects = false;
        }

        Ok(())
    }

    fn write_vertex(&mut self, index: usize, v: Vertex2D, atlas: &TextureManager) {
        self.vertices[index] = v;

        let mapped = v.texture.and_then(|id| {
            let u = atlas.map_tex_coords_to_real_coords_x(v.tex_x, id)?;
            let t = atlas.map_tex_coords_to_real_coords_y(v.tex_y, id)?;
            Some((u, t))
        });

        let (u, t, use_tex) = match mapped {
            Some((u, t)) => (u, t, 0.0),
            None => (v.tex_x, v.tex_y, -1.0),
        };

        let object = match v.object {
            Some(id) if self.is_object_alive(id) => id.0 as f32,
            _ => -1.0,
        };

        let from = index * VERTEX_2D_FLOATS;
        self.packed[from..from + VERTEX_2D_FLOATS]
            .copy_from_slice(&[v.x, v.y, v.r, v.g, v.b, v.a, u, t, use_tex, object]);

        self.dirty_vertices = Some(match self.dirty_vertices {
            Some((from, to)) => (from.min(index), to.max(index + 1)),
            None => (index, index + 1),
        });
    }

    fn write_object(&mut self, index: usize, data: &[f32; 16]) {
        let from = index * OBJECT_2D_FLOATS;
        self.objects[from..from + OBJECT_2D_FLOATS].copy_from_slice(data);
        self.dirty_objects = true;
    }

    fn grow_vertices(&mut self) {
        let len = self.vertices.len() + self.vertex_block;
        self.vertices.resize(len, Vertex2D::default());
        self.packed.resize(len * VERTEX_2D_FLOATS, 0.0);
        self.alive.resize(len, false);
        self.dirty_vertices = Some((0, len));
    }

    fn grow_objects(&mut self) {
        let len = self.objects_alive.len() + self.object_block;
        self.objects_alive.resize(len, false);

        let from = self.objects.len() / OBJECT_2D_FLOATS;
        self.objects.resize(len * OBJECT_2D_FLOATS, 0.0);
        for index in from..len {
            self.write_object(index, &IDENTITY);
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::backends::HeadlessDevice;
    use super::*;
    use crate::utils::HandlePool;

    fn params() -> VideoParams {
        VideoParams {
            vertex_block: 4,
            object_block: 2,
            ..VideoParams::default()
        }
    }

    fn setup() -> (Renderer2D, TextureManager) {
        let mut buffers: HandlePool<BufferObject> = HandlePool::new();
        let mut textures: HandlePool<TextureObject> = HandlePool::new();

        let renderer = Renderer2D::new(&params(), buffers.create(), textures.create());
        let atlas = TextureManager::new(&params(), textures.create());
        (renderer, atlas)
    }

    #[test]
    fn slots() {
        let (mut r, atlas) = setup();

        let ids: Vec<_> = (0..5)
            .map(|i| r.add_vertex(Vertex2D::new(i as f32, 0.0), &atlas))
            .collect();

        assert_eq!(r.vertex_capacity(), 8);
        assert!(r.remove_vertex(ids[1]));
        assert!(r.remove_vertex(ids[3]));
        assert!(!r.remove_vertex(ids[3]));
        assert_eq!(r.vertex(ids[1]), None);

        assert_eq!(r.add_vertex(Vertex2D::new(9.0, 9.0), &atlas), ids[3]);
        assert_eq!(r.add_vertex(Vertex2D::new(9.0, 9.0), &atlas), ids[1]);
        assert_eq!(r.add_vertex(Vertex2D::new(9.0, 9.0), &atlas), Vertex2DId(5));

        let packed = r.packed_vertex(ids[0]).unwrap();
        assert_eq!(packed, &[0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, -1.0, -1.0][..]);
    }

    #[test]
    fn objects() {
        let (mut r, atlas) = setup();

        let a = r.add_object();
        let b = r.add_object();
        let c = r.add_object();
        assert_eq!(r.object_capacity(), 4);
        assert_eq!(r.object(c).unwrap().data, IDENTITY);

        let mut data = IDENTITY;
        data[12] = 10.0;
        assert!(r.set_object(b, &Render2DObjectParameters { data }));

        let v = r.add_vertex(Vertex2D::new(0.0, 0.0).with_object(b), &atlas);
        assert_eq!(r.packed_vertex(v).unwrap()[9], 1.0);

        assert!(r.remove_object(b));
        assert!(!r.set_object(b, &Render2DObjectParameters { data }));
        assert_eq!(r.add_object(), b);
        assert_eq!(r.object(b).unwrap().data, IDENTITY);
        assert!(r.is_object_alive(a));
    }

    #[test]
    fn queue_skips_dead() {
        let (mut r, atlas) = setup();
        let a = r.add_vertex(Vertex2D::new(0.0, 0.0), &atlas);
        let b = r.add_vertex(Vertex2D::new(1.0, 0.0), &atlas);
        r.remove_vertex(b);

        assert_eq!(r.queue(&[a, b, Vertex2DId(100)]), 2);
        assert_eq!(r.queued(), 1);
        r.clear_queue();
        assert_eq!(r.queued(), 0);
    }

    #[test]
    fn empty_render() {
        let (mut r, mut atlas) = setup();
        let mut device = HeadlessDevice::new(&params());
        let mut programs: HandlePool<ProgramObject> = HandlePool::new();

        let p = Render2DStaticParameters::new(64.0, 64.0);
        let n = r
            .render(&mut device, &mut atlas, programs.create(), DrawingMode::default(), &p)
            .unwrap();

        assert_eq!(n, 0);
        assert_eq!(device.stats(), Default::default());
    }
}
