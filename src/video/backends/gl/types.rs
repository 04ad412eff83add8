use gl;
use gl::types::*;

use super::super::super::types::{AlphaRule, Polygon, TexFilter};
use super::super::TextureFormat;
use super::capabilities::{Capabilities, Version};

impl From<Polygon> for GLenum {
    fn from(polygon: Polygon) -> Self {
        match polygon {
            Polygon::Triangle => gl::TRIANGLES,
            Polygon::Line => gl::LINES,
        }
    }
}

impl From<TexFilter> for GLenum {
    fn from(filter: TexFilter) -> Self {
        match filter {
            TexFilter::Linear => gl::LINEAR,
            TexFilter::NoFilter => gl::NEAREST,
        }
    }
}

/// The blend factors of an alpha rule, `None` if blending is off.
pub fn blend_factors(rule: AlphaRule) -> Option<(GLenum, GLenum)> {
    match rule {
        AlphaRule::Allow => Some((gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA)),
        AlphaRule::Translucent => Some((gl::SRC_ALPHA, gl::ONE)),
        AlphaRule::Opaque | AlphaRule::PassThrough => None,
    }
}

/// Whether an alpha rule writes into the color buffer.
pub fn color_write(rule: AlphaRule) -> bool {
    rule != AlphaRule::PassThrough
}

/// Returns `(internal format, format, pixel type)`.
pub fn texture_format(format: TextureFormat, caps: &Capabilities) -> (GLenum, GLenum, GLenum) {
    let sized = match caps.version {
        Version::GL(_, _) => true,
        Version::ES(major, _) => major >= 3,
    };

    match (format, sized) {
        (TextureFormat::RGBA8, true) => (gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
        (TextureFormat::RGBA8, false) => (gl::RGBA, gl::RGBA, gl::UNSIGNED_BYTE),
        (TextureFormat::RGBA32F, true) => (gl::RGBA32F, gl::RGBA, gl::FLOAT),
        (TextureFormat::RGBA32F, false) => (gl::RGBA, gl::RGBA, gl::FLOAT),
    }
}
