//! Render targets that decouple the renderer (writer) from a display (reader).

use std::cell::RefCell;
use std::rc::Rc;

use super::types::{rgba_len, FramebufferKind};

pub type SharedFramebuffer = Rc<RefCell<Framebuffer>>;

/// An opaque reference to the backend object of a framebuffer.
///
/// For `GLFBPacket` targets `object` is the framebuffer object name and
/// `texture` the color attachment; pixel arrays use process-unique ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FramebufferHandle {
    pub object: u64,
    pub texture: u64,
}

/// The storage behind a `Framebuffer`.
pub trait FramebufferBackend {
    fn kind(&self) -> FramebufferKind;

    fn handle(&self) -> FramebufferHandle;

    /// Reallocates the storage. Returns false if the size is not accepted, in
    /// which case the old storage must stay intact.
    fn on_resize(&mut self, width: u32, height: u32) -> bool;

    fn on_filter_change(&mut self, filtered: bool);

    /// Copies the contents as RGBA rows, top row first.
    fn raw_data(&self, width: u32, height: u32, out: &mut [u8]) -> bool;
}

pub struct Framebuffer {
    backend: Box<dyn FramebufferBackend>,
    width: u32,
    height: u32,
    filtered: bool,
}

impl Framebuffer {
    /// Creates a framebuffer over `backend`, sized `width` x `height`.
    pub fn new<T>(mut backend: T, width: u32, height: u32) -> Self
    where
        T: FramebufferBackend + 'static,
    {
        let (width, height) = if backend.on_resize(width, height) {
            (width, height)
        } else {
            warn!(
                "[Framebuffer] backend refused {}x{}, starts empty.",
                width, height
            );
            (0, 0)
        };

        Framebuffer {
            backend: Box::new(backend),
            width,
            height,
            filtered: true,
        }
    }

    /// Wraps the framebuffer so that renderers can hold on to it.
    pub fn into_shared(self) -> SharedFramebuffer {
        Rc::new(RefCell::new(self))
    }

    /// Resizes the storage in place. The handle identity is kept but the
    /// contents become undefined.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.backend.on_resize(width, height) {
            return false;
        }

        self.width = width;
        self.height = height;
        true
    }

    #[inline]
    pub fn handle(&self) -> FramebufferHandle {
        self.backend.handle()
    }

    #[inline]
    pub fn kind(&self) -> FramebufferKind {
        self.backend.kind()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reads the contents into `out`, which must hold `width * height * 4`
    /// bytes.
    pub fn raw_data(&self, out: &mut [u8]) -> bool {
        match rgba_len(self.width, self.height) {
            Some(len) if out.len() >= len => {}
            _ => return false,
        }

        self.backend.raw_data(self.width, self.height, out)
    }

    /// Hints whether the framebuffer should be sampled with filtering when it
    /// is displayed or read by a program.
    pub fn set_filtered_hint(&mut self, filtered: bool) {
        if self.filtered != filtered {
            self.filtered = filtered;
            self.backend.on_filter_change(filtered);
        }
    }

    #[inline]
    pub fn filtered_hint(&self) -> bool {
        self.filtered
    }

    pub fn backend(&self) -> &dyn FramebufferBackend {
        self.backend.as_ref()
    }
}

/// A framebuffer living in main memory.
pub struct PixelArrayBackend {
    id: u64,
    pixels: Vec<u8>,
    filtered: bool,
}

impl PixelArrayBackend {
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static NEXT: AtomicUsize = AtomicUsize::new(1);

        PixelArrayBackend {
            id: NEXT.fetch_add(1, Ordering::Relaxed) as u64,
            pixels: Vec::new(),
            filtered: true,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }
}

impl Default for PixelArrayBackend {
    fn default() -> Self {
        PixelArrayBackend::new()
    }
}

impl FramebufferBackend for PixelArrayBackend {
    fn kind(&self) -> FramebufferKind {
        FramebufferKind::RgbaPixelArray
    }

    fn handle(&self) -> FramebufferHandle {
        FramebufferHandle {
            object: self.id,
            texture: 0,
        }
    }

    fn on_resize(&mut self, width: u32, height: u32) -> bool {
        match rgba_len(width, height) {
            Some(len) => {
                self.pixels.resize(len, 0);
                true
            }
            None => false,
        }
    }

    fn on_filter_change(&mut self, filtered: bool) {
        self.filtered = filtered;
    }

    fn raw_data(&self, width: u32, height: u32, out: &mut [u8]) -> bool {
        let len = match rgba_len(width, height) {
            Some(len) if self.pixels.len() >= len && out.len() >= len => len,
            _ => return false,
        };

        out[..len].copy_from_slice(&self.pixels[..len]);
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Fixed;

    impl FramebufferBackend for Fixed {
        fn kind(&self) -> FramebufferKind {
            FramebufferKind::Unknown
        }

        fn handle(&self) -> FramebufferHandle {
            FramebufferHandle::default()
        }

        fn on_resize(&mut self, width: u32, height: u32) -> bool {
            width <= 16 && height <= 16
        }

        fn on_filter_change(&mut self, _: bool) {}

        fn raw_data(&self, _: u32, _: u32, _: &mut [u8]) -> bool {
            false
        }
    }

    #[test]
    fn refused_resize() {
        let mut fb = Framebuffer::new(Fixed, 8, 8);
        assert!(!fb.resize(32, 32));
        assert_eq!((fb.width(), fb.height()), (8, 8));
        assert!(fb.resize(16, 4));
        assert_eq!((fb.width(), fb.height()), (16, 4));
    }

    /// Storage owned by a display, accepting any size.
    struct Display;

    impl FramebufferBackend for Display {
        fn kind(&self) -> FramebufferKind {
            FramebufferKind::Unknown
        }

        fn handle(&self) -> FramebufferHandle {
            FramebufferHandle::default()
        }

        fn on_resize(&mut self, _: u32, _: u32) -> bool {
            true
        }

        fn on_filter_change(&mut self, _: bool) {}

        fn raw_data(&self, _: u32, _: u32, _: &mut [u8]) -> bool {
            true
        }
    }

    #[test]
    fn raw_data_of_large_targets() {
        let mut fb = Framebuffer::new(Display, 40_000, 40_000);
        assert!(!fb.raw_data(&mut [0u8; 64]));

        assert!(fb.resize(4, 4));
        assert!(fb.raw_data(&mut [0u8; 64]));
        assert!(!fb.raw_data(&mut [0u8; 63]));
    }

    #[test]
    fn pixel_array_lengths() {
        assert_eq!(rgba_len(40_000, 40_000), Some(6_400_000_000));
        assert_eq!(rgba_len(0, 7), Some(0));

        let mut backend = PixelArrayBackend::new();
        assert!(backend.on_resize(2, 2));
        assert!(!backend.raw_data(2, 2, &mut [0u8; 8]));
        assert!(!backend.raw_data(40_000, 40_000, &mut [0u8; 16]));
    }
}
