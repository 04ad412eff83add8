use std::cell::RefCell;
use std::rc::Rc;

use dynacoe::prelude::*;
use dynacoe::video::framebuffer::FramebufferHandle;

/// A surface owned by the windowing system.
struct Window;

impl FramebufferBackend for Window {
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
        false
    }
}

fn renderer(params: VideoParams) -> (ShaderRenderer<HeadlessDevice>, Rc<RefCell<Vec<Diagnostic>>>) {
    let device = HeadlessDevice::new(&params);
    let mut renderer = ShaderRenderer::new(device, params).unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    renderer.set_diagnostic_hook(Some(Box::new(move |d: &Diagnostic| {
        sink.borrow_mut().push(*d)
    })));

    (renderer, log)
}

#[test]
fn pixel_array() {
    let mut fb = Framebuffer::new(PixelArrayBackend::new(), 2, 2);
    assert_eq!(fb.kind(), FramebufferKind::RgbaPixelArray);

    let mut out = [1u8; 16];
    assert!(fb.raw_data(&mut out));
    assert_eq!(out, [0; 16]);
    assert!(!fb.raw_data(&mut [0u8; 15]));

    assert!(fb.filtered_hint());
    fb.set_filtered_hint(false);
    assert!(!fb.filtered_hint());

    let handle = fb.handle();
    assert!(fb.resize(4, 3));
    assert_eq!((fb.width(), fb.height()), (4, 3));
    assert_eq!(fb.handle(), handle);
    assert!(fb.raw_data(&mut [0u8; 48]));

    let other = Framebuffer::new(PixelArrayBackend::new(), 2, 2);
    assert_ne!(other.handle(), handle);
}

#[test]
fn unsupported_kinds() {
    let (mut r, log) = renderer(VideoParams::default());
    assert_eq!(
        r.supported_framebuffers(),
        vec![FramebufferKind::RgbaPixelArray, FramebufferKind::GLFBPacket]
    );

    let pixels = Framebuffer::new(PixelArrayBackend::new(), 8, 8).into_shared();
    r.attach_target(Some(pixels.clone()));

    r.attach_target(Some(Framebuffer::new(Window, 8, 8).into_shared()));
    assert!(Rc::ptr_eq(&r.target().unwrap(), &pixels));

    let (mut r, log2) = renderer(VideoParams {
        framebuffers: vec![FramebufferKind::GLFBPacket],
        ..VideoParams::default()
    });

    r.attach_target(Some(pixels));
    assert!(r.target().is_none());

    let expected = vec![DiagnosticKind::UnsupportedFramebuffer];
    assert_eq!(log.borrow().iter().map(|v| v.kind).collect::<Vec<_>>(), expected);
    assert_eq!(log2.borrow().iter().map(|v| v.kind).collect::<Vec<_>>(), expected);
    assert_eq!(log.borrow()[0].operation, "attach_target");
}

#[test]
fn resized_targets_are_rebound() {
    let (mut r, _) = renderer(VideoParams::default());
    let params = Render2DStaticParameters::new(1.0, 1.0);

    let target = Framebuffer::new(PixelArrayBackend::new(), 16, 16).into_shared();
    r.attach_target(Some(target.clone()));

    let v = r.add_2d_vertex(Vertex2D::new(0.0, 0.0));
    r.queue_2d_vertices(&[v]);
    r.render_2d_vertices(&params).unwrap();
    assert_eq!(r.device().target().map(|t| t.width), Some(16));

    assert!(target.borrow_mut().resize(48, 24));
    r.queue_2d_vertices(&[v]);
    r.render_2d_vertices(&params).unwrap();

    let draw = r.device().draws().last().unwrap();
    assert_eq!((draw.target.width, draw.target.height), (48, 24));

    r.clear_rendered_data().unwrap();
    assert_eq!(r.device().stats().clears, 1);

    // Without a target a new frame still starts, but nothing is cleared.
    r.attach_target(None);
    r.clear_rendered_data().unwrap();
    assert_eq!(r.device().stats().clears, 1);
    assert_eq!(r.device().stats().frames, 2);
}

#[test]
fn other_targets_leave_the_binding_alone() {
    let (mut r, _) = renderer(VideoParams::default());
    let params = Render2DStaticParameters::new(1.0, 1.0);

    let target = Framebuffer::new(PixelArrayBackend::new(), 16, 16).into_shared();
    r.attach_target(Some(target.clone()));

    let v = r.add_2d_vertex(Vertex2D::new(0.0, 0.0));
    r.queue_2d_vertices(&[v]);
    r.render_2d_vertices(&params).unwrap();

    // Creating, resizing and reading other targets must not redirect draws.
    let mut other = Framebuffer::new(PixelArrayBackend::new(), 8, 8);
    assert!(other.resize(32, 32));
    other.set_filtered_hint(false);
    assert!(other.raw_data(&mut vec![0u8; 32 * 32 * 4]));

    r.queue_2d_vertices(&[v]);
    assert_eq!(r.render_2d_vertices(&params).unwrap(), 1);

    let draws = r.device().draws();
    assert_eq!(draws.len(), 2);
    for draw in draws {
        assert_eq!(draw.target.handle, target.borrow().handle());
        assert_eq!((draw.target.width, draw.target.height), (16, 16));
    }
}
