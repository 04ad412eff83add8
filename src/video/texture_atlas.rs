//! A shelf-packed atlas holding every logical texture in one device texture.
//!
//! Textures are placed left to right on rows. A row wraps once the next texture would reach
//! the max width, and the atlas grows geometrically whenever the cursor runs past its current
//! bounds. Removed textures leave holes until the next insertion repacks the survivors.

use crate::utils::Table;

use super::backends::{
    Device, TextureArea, TextureData, TextureFormat, TextureObject, TextureParams,
};
use super::errors::*;
use super::settings::VideoParams;
use super::types::{rgba_len, TexFilter, TextureId};

const MAX_DIRTY_AREAS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone)]
enum Dirty {
    Clean,
    Areas(Vec<TextureArea>),
    Full,
}

#[derive(Debug, Clone)]
struct Layout {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    cursor_x: u32,
    cursor_y: u32,
    /// The bottom edge of the current row.
    cursor_height: u32,
}

impl Layout {
    fn new(size: u32) -> Self {
        Layout {
            width: size,
            height: size,
            pixels: vec![0; size as usize * size as usize * 4],
            cursor_x: 0,
            cursor_y: 0,
            cursor_height: 0,
        }
    }

    /// Finds room for a `w` x `h` texture, growing the layout if needed. Returns the
    /// placement and whether the layout was resized.
    /// The cursor only moves once the texture fits.
    fn place(&mut self, w: u32, h: u32, max: u32, growth: f32) -> Result<(Placement, bool)> {
        let (mut x, mut y) = (self.cursor_x, self.cursor_y);
        if x > 0 && x.saturating_add(w) >= max {
            y = self.cursor_height + 1;
            x = 0;
        }

        let (req_w, req_h) = (x.saturating_add(w), y.saturating_add(h));
        let mut resized = false;

        if req_w > self.width || req_h > self.height {
            let new_w = Self::grow(self.width, req_w, max, growth);
            let new_h = Self::grow(self.height, req_h, max, growth);

            if req_w > new_w || req_h > new_h {
                return Err(Error::AtlasFull(w, h, max));
            }

            self.resize(new_w, new_h);
            resized = true;
        }

        let placement = Placement {
            x,
            y,
            width: w,
            height: h,
        };

        self.cursor_x = req_w.saturating_add(1);
        self.cursor_y = y;
        self.cursor_height = self.cursor_height.max(req_h);
        Ok((placement, resized))
    }

    fn grow(mut size: u32, required: u32, max: u32, growth: f32) -> u32 {
        while size < required && size < max {
            size = ((size as f32 * growth) as u32).max(size + 1);
        }

        size.min(max)
    }

    fn resize(&mut self, width: u32, height: u32) {
        let mut pixels = vec![0; width as usize * height as usize * 4];
        let row = self.width.min(width) as usize * 4;

        for y in 0..self.height.min(height) as usize {
            let src = y * self.width as usize * 4;
            let dst = y * width as usize * 4;
            pixels[dst..dst + row].copy_from_slice(&self.pixels[src..src + row]);
        }

        self.pixels = pixels;
        self.width = width;
        self.height = height;
    }

    fn write(&mut self, p: Placement, data: &[u8]) {
        let row = p.width as usize * 4;
        for y in 0..p.height as usize {
            let dst = (((p.y as usize + y) * self.width as usize) + p.x as usize) * 4;
            self.pixels[dst..dst + row].copy_from_slice(&data[y * row..(y + 1) * row]);
        }
    }

    fn read(&self, p: Placement, out: &mut Vec<u8>) {
        let row = p.width as usize * 4;
        for y in 0..p.height as usize {
            let src = (((p.y as usize + y) * self.width as usize) + p.x as usize) * 4;
            out.extend_from_slice(&self.pixels[src..src + row]);
        }
    }
}

pub struct TextureManager {
    initial_size: u32,
    max_size: u32,
    growth: f32,
    layout: Layout,
    entries: Table<TextureId, Placement>,
    garbage: usize,
    revision: u64,
    filter: TexFilter,
    filter_dirty: bool,
    object: TextureObject,
    allocated: bool,
    dirty: Dirty,
}

impl TextureManager {
    /// Creates an empty atlas that will live in the device texture `object`.
    pub fn new(params: &VideoParams, object: TextureObject) -> Self {
        TextureManager {
            initial_size: params.atlas_initial_size,
            max_size: params.atlas_max_size,
            growth: params.atlas_growth,
            layout: Layout::new(params.atlas_initial_size),
            entries: Table::new(),
            garbage: 0,
            revision: 0,
            filter: TexFilter::Linear,
            filter_dirty: false,
            object,
            allocated: false,
            dirty: Dirty::Full,
        }
    }

    /// Adds a `width` x `height` texture. Without `data` its pixels are undefined.
    pub fn add(&mut self, width: u32, height: u32, data: Option<&[u8]>) -> Result<TextureId> {
        if width == 0 || height == 0 || width > self.max_size || height > self.max_size {
            return Err(Error::InvalidDimensions(width, height));
        }

        if let Some(data) = data {
            Self::check_len(width, height, data)?;
        }

        if self.garbage > 0 {
            self.repack();
        }

        let (placement, resized) =
            self.layout
                .place(width, height, self.max_size, self.growth)?;

        if resized {
            debug!(
                "[TextureManager] resized to {}x{}.",
                self.layout.width, self.layout.height
            );

            self.revision += 1;
            self.dirty = Dirty::Full;
        }

        if let Some(data) = data {
            self.layout.write(placement, data);
            self.mark(placement);
        }

        Ok(self.entries.insert(placement))
    }

    /// Replaces the pixels of a texture.
    pub fn update(&mut self, id: TextureId, data: &[u8]) -> Result<()> {
        let placement = *self.entries.find(id)?;
        Self::check_len(placement.width, placement.height, data)?;

        self.layout.write(placement, data);
        self.mark(placement);
        Ok(())
    }

    /// Flags a texture for removal. Its space is reclaimed by the next `add`.
    pub fn remove(&mut self, id: TextureId) -> bool {
        if self.entries.remove(id).is_some() {
            self.garbage += 1;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn contains(&self, id: TextureId) -> bool {
        self.entries.is_alive(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads the pixels of a texture back.
    pub fn pixels(&self, id: TextureId) -> Option<Vec<u8>> {
        let placement = *self.entries.get(id)?;
        let mut out = Vec::with_capacity(placement.width as usize * placement.height as usize * 4);
        self.layout.read(placement, &mut out);
        Some(out)
    }

    pub fn texture_width(&self, id: TextureId) -> Option<u32> {
        self.entries.get(id).map(|v| v.width)
    }

    pub fn texture_height(&self, id: TextureId) -> Option<u32> {
        self.entries.get(id).map(|v| v.height)
    }

    /// The rectangle of a texture inside the atlas, in texels.
    pub fn bounds(&self, id: TextureId) -> Option<TextureArea> {
        self.entries.get(id).map(|p| TextureArea {
            x: p.x,
            y: p.y,
            width: p.width,
            height: p.height,
        })
    }

    /// Maps a texture-local horizontal coordinate into atlas space.
    pub fn map_tex_coords_to_real_coords_x(&self, u: f32, id: TextureId) -> Option<f32> {
        let p = self.entries.get(id)?;
        Some((u * p.width as f32 + p.x as f32) / self.layout.width as f32)
    }

    /// Maps a texture-local vertical coordinate into atlas space.
    pub fn map_tex_coords_to_real_coords_y(&self, v: f32, id: TextureId) -> Option<f32> {
        let p = self.entries.get(id)?;
        Some((v * p.height as f32 + p.y as f32) / self.layout.height as f32)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.layout.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.layout.height
    }

    /// Bumped whenever existing textures move, i.e. on resize and repack.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_filter(&mut self, filter: TexFilter) {
        if self.filter != filter {
            self.filter = filter;
            self.filter_dirty = true;
        }
    }

    #[inline]
    pub fn filter(&self) -> TexFilter {
        self.filter
    }

    #[inline]
    pub fn object(&self) -> TextureObject {
        self.object
    }

    /// Uploads pending changes into the device texture.
    pub fn sync<D: Device>(&mut self, device: &mut D) -> Result<TextureObject> {
        let params = TextureParams {
            width: self.layout.width,
            height: self.layout.height,
            format: TextureFormat::RGBA8,
            filter: self.filter,
        };

        let dirty = ::std::mem::replace(&mut self.dirty, Dirty::Clean);
        unsafe {
            match dirty {
                Dirty::Full => {
                    let data = TextureData::Bytes(&self.layout.pixels);
                    device.create_texture(self.object, params, Some(data))?;
                    self.allocated = true;
                    self.filter_dirty = false;
                }
                Dirty::Areas(areas) => {
                    let mut buf = Vec::new();
                    for area in areas {
                        buf.clear();
                        let p = Placement {
                            x: area.x,
                            y: area.y,
                            width: area.width,
                            height: area.height,
                        };

                        self.layout.read(p, &mut buf);
                        device.update_texture(self.object, area, TextureData::Bytes(&buf))?;
                    }
                }
                Dirty::Clean => {}
            }

            if self.filter_dirty && self.allocated {
                device.update_texture_filter(self.object, self.filter)?;
                self.filter_dirty = false;
            }
        }

        Ok(self.object)
    }

    /// Whether `sync` ever created the device texture.
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    fn mark(&mut self, p: Placement) {
        let area = TextureArea {
            x: p.x,
            y: p.y,
            width: p.width,
            height: p.height,
        };

        match self.dirty {
            Dirty::Full => {}
            Dirty::Clean => self.dirty = Dirty::Areas(vec![area]),
            Dirty::Areas(ref mut areas) if areas.len() < MAX_DIRTY_AREAS => areas.push(area),
            Dirty::Areas(_) => self.dirty = Dirty::Full,
        }
    }

    /// Re-places every surviving texture into a fresh layout, in their old row-major order.
    fn repack(&mut self) {
        let mut survivors: Vec<(TextureId, Placement)> =
            self.entries.iter().map(|(k, v)| (k, *v)).collect();
        survivors.sort_by_key(|&(_, p)| (p.y, p.x));

        let mut layout = Layout::new(self.initial_size);
        let mut placed = Vec::with_capacity(survivors.len());
        let mut buf = Vec::new();

        for &(id, old) in &survivors {
            match layout.place(old.width, old.height, self.max_size, self.growth) {
                Ok((p, _)) => {
                    buf.clear();
                    self.layout.read(old, &mut buf);
                    layout.write(p, &buf);
                    placed.push((id, p));
                }
                Err(err) => {
                    warn!("[TextureManager] repack failed, keeping holes: {}", err);
                    return;
                }
            }
        }

        for (id, p) in placed {
            if let Some(v) = self.entries.get_mut(id) {
                *v = p;
            }
        }

        debug!(
            "[TextureManager] repacked {} textures, {} removed, {}x{} -> {}x{}.",
            survivors.len(),
            self.garbage,
            self.layout.width,
            self.layout.height,
            layout.width,
            layout.height
        );

        self.layout = layout;
        self.garbage = 0;
        self.revision += 1;
        self.dirty = Dirty::Full;
    }

    fn check_len(width: u32, height: u32, data: &[u8]) -> Result<()> {
        let len = rgba_len(width, height).unwrap_or(usize::max_value());
        if data.len() < len {
            return Err(Error::OutOfRange {
                name: "texture data".to_owned(),
                offset: 0,
                end: len,
                len: data.len(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::HandlePool;

    fn atlas() -> TextureManager {
        let mut pool: HandlePool<TextureObject> = HandlePool::new();
        TextureManager::new(&VideoParams::default(), pool.create())
    }

    #[test]
    fn shelf_packing() {
        let mut atlas = atlas();
        let a = atlas.add(10, 10, None).unwrap();
        let b = atlas.add(10, 20, None).unwrap();

        assert_eq!(atlas.bounds(a).unwrap().x, 0);
        assert_eq!(atlas.bounds(b).unwrap().x, 11);
        assert_eq!((atlas.width(), atlas.height()), (32, 32));
        assert_eq!(atlas.revision(), 0);

        // 22 + 16 runs past 32 and forces growth.
        let c = atlas.add(16, 4, None).unwrap();
        assert_eq!(atlas.bounds(c).unwrap().x, 22);
        assert!(atlas.width() >= 38);
        assert_eq!(atlas.revision(), 1);
    }

    #[test]
    fn row_wrap() {
        let params = VideoParams {
            atlas_initial_size: 16,
            atlas_max_size: 16,
            ..VideoParams::default()
        };

        let mut pool: HandlePool<TextureObject> = HandlePool::new();
        let mut atlas = TextureManager::new(&params, pool.create());

        atlas.add(8, 4, None).unwrap();
        let b = atlas.add(8, 2, None).unwrap();
        assert_eq!(atlas.bounds(b).unwrap(), TextureArea { x: 0, y: 5, width: 8, height: 2 });

        match atlas.add(16, 16, None) {
            Err(Error::AtlasFull(16, 16, 16)) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }

        assert!(atlas.add(0, 4, None).is_err());
        assert!(atlas.add(17, 1, None).is_err());
    }

    #[test]
    fn failed_add_keeps_the_row() {
        let params = VideoParams {
            atlas_initial_size: 16,
            atlas_max_size: 16,
            ..VideoParams::default()
        };

        let mut pool: HandlePool<TextureObject> = HandlePool::new();
        let mut atlas = TextureManager::new(&params, pool.create());

        atlas.add(4, 4, None).unwrap();
        assert!(atlas.add(12, 16, None).is_err());

        let b = atlas.add(4, 4, None).unwrap();
        assert_eq!(atlas.bounds(b).unwrap(), TextureArea { x: 5, y: 0, width: 4, height: 4 });
    }

    #[test]
    fn large_dimensions() {
        let params = VideoParams {
            atlas_max_size: 65536,
            ..VideoParams::default()
        };

        let mut pool: HandlePool<TextureObject> = HandlePool::new();
        let mut atlas = TextureManager::new(&params, pool.create());

        match atlas.add(65536, 65536, Some(&[0; 16])) {
            Err(Error::OutOfRange { end, .. }) => assert_eq!(end, 65536 * 65536 * 4),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }

        assert_eq!((atlas.width(), atlas.height()), (32, 32));
    }

    #[test]
    fn pixels_survive_growth() {
        let mut atlas = atlas();
        let data: Vec<u8> = (0..4 * 4 * 4).map(|v| v as u8).collect();
        let a = atlas.add(4, 4, Some(&data)).unwrap();

        atlas.add(30, 30, None).unwrap();
        assert!(atlas.width() > 32);
        assert_eq!(atlas.pixels(a).unwrap(), data);
    }

    #[test]
    fn repack_keeps_ids() {
        let mut atlas = atlas();
        let a = atlas.add(8, 8, Some(&[1; 8 * 8 * 4])).unwrap();
        let b = atlas.add(8, 8, Some(&[2; 8 * 8 * 4])).unwrap();
        let c = atlas.add(8, 8, Some(&[3; 8 * 8 * 4])).unwrap();

        assert!(atlas.remove(a));
        assert!(!atlas.remove(a));
        let revision = atlas.revision();

        let d = atlas.add(8, 8, Some(&[4; 8 * 8 * 4])).unwrap();
        assert!(atlas.revision() > revision);
        assert!(!atlas.contains(a));

        assert_eq!(atlas.bounds(b).unwrap().x, 0);
        assert_eq!(atlas.bounds(c).unwrap().x, 9);
        assert_eq!(atlas.pixels(b).unwrap(), vec![2; 8 * 8 * 4]);
        assert_eq!(atlas.pixels(c).unwrap(), vec![3; 8 * 8 * 4]);
        assert_eq!(atlas.pixels(d).unwrap(), vec![4; 8 * 8 * 4]);
    }

    #[test]
    fn coordinate_mapping() {
        let mut atlas = atlas();
        atlas.add(16, 16, None).unwrap();
        let b = atlas.add(8, 8, None).unwrap();

        assert_eq!(atlas.map_tex_coords_to_real_coords_x(0.0, b), Some(17.0 / 32.0));
        assert_eq!(atlas.map_tex_coords_to_real_coords_x(1.0, b), Some(25.0 / 32.0));
        assert_eq!(atlas.map_tex_coords_to_real_coords_y(0.5, b), Some(4.0 / 32.0));
    }
}
