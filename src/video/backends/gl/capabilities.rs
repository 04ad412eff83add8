use gl;
use gl::types::*;
use std::cmp;
use std::ffi;

use crate::errors::*;

/// Describes the OpenGL context profile.
#[derive(Debug, Copy, Clone)]
pub enum Profile {
    /// The context uses only future-compatible functions and definitions.
    Core,
    /// The context includes all immediate mode functions and definitions.
    Compatibility,
}

/// Describes a version.
///
/// A version can only be compared to another version if they belong to the same API.
/// For example, both `Version::GL(3, 0) >= Version::ES(3, 0)` and `Version::ES(3, 0) >=
/// Version::GL(3, 0)` return `false`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Version {
    /// Regular OpenGL.
    GL(u8, u8),
    /// OpenGL embedded system.
    ES(u8, u8),
}

impl PartialOrd for Version {
    #[inline]
    fn partial_cmp(&self, other: &Version) -> Option<cmp::Ordering> {
        let (es1, major1, minor1) = match *self {
            Version::GL(major, minor) => (false, major, minor),
            Version::ES(major, minor) => (true, major, minor),
        };

        let (es2, major2, minor2) = match *other {
            Version::GL(major, minor) => (false, major, minor),
            Version::ES(major, minor) => (true, major, minor),
        };

        if es1 != es2 {
            None
        } else {
            match major1.cmp(&major2) {
                cmp::Ordering::Equal => Some(minor1.cmp(&minor2)),
                v => Some(v),
            }
        }
    }
}

impl Version {
    /// Obtains the OpenGL version of the current context using the loaded functions.
    ///
    /// # Unsafe
    ///
    /// You must ensure that the functions belong to the current context, otherwise you will get
    /// an undefined behavior.
    pub unsafe fn parse() -> Result<Version> {
        let desc = parse_str(gl::VERSION)?;
        Self::from_str(&desc)
    }

    /// Parses a `GL_VERSION` string, e.g. `3.3.0 NVIDIA 390.87` or `OpenGL ES 3.0 Mesa`.
    pub fn from_str(desc: &str) -> Result<Version> {
        let (es, desc) = if desc.starts_with("OpenGL ES-") {
            (true, &desc[13..])
        } else if desc.starts_with("OpenGL ES ") {
            (true, &desc[10..])
        } else {
            (false, desc)
        };

        let desc = desc
            .split(' ')
            .next()
            .ok_or_else(|| format_err!("[GL] Version string is unformaled."))?;

        let mut iter = desc.split('.');
        let mut next = || -> Result<u8> {
            iter.next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| format_err!("[GL] Version string {:?} is unformaled.", desc))
        };

        let major = next()?;
        let minor = next()?;

        if es {
            Ok(Version::ES(major, minor))
        } else {
            Ok(Version::GL(major, minor))
        }
    }
}

macro_rules! extensions {
    ($($string:expr => $field:ident,)+) => {
        /// Contains data about the list of extensions.
        #[derive(Debug, Clone, Copy, Default)]
        pub struct Extensions {
            $(
                pub $field: bool,
            )+
        }

        impl Extensions {
            /// Returns the list of extensions supported by the backend.
            ///
            /// *Safety*: the OpenGL context must be current in the thread, and `version` must
            /// match it.
            pub unsafe fn parse(version: Version) -> Result<Extensions> {
                let strings: Vec<String> =
                    if version >= Version::GL(3, 0) || version >= Version::ES(3, 0) {
                        let mut num_extensions = 0;
                        gl::GetIntegerv(gl::NUM_EXTENSIONS, &mut num_extensions);
                        let mut strings = Vec::with_capacity(num_extensions as usize);
                        for i in 0..num_extensions {
                            let ext = gl::GetStringi(gl::EXTENSIONS, i as GLuint);
                            if !ext.is_null() {
                                let v = ffi::CStr::from_ptr(ext as *const _);
                                strings.push(v.to_string_lossy().into_owned());
                            }
                        }
                        strings
                    } else {
                        let list = parse_str(gl::EXTENSIONS)?;
                        list.split(' ').map(|e| e.to_owned()).collect()
                    };

                let mut extensions = Extensions::default();
                for extension in strings {
                    match &extension[..] {
                        $(
                            $string => extensions.$field = true,
                        )+
                        _ => ()
                    }
                }

                Ok(extensions)
            }
        }
    }
}

extensions! {
    "GL_ARB_vertex_array_object" => gl_arb_vertex_array_object,
    "GL_APPLE_vertex_array_object" => gl_apple_vertex_array_object,
    "GL_OES_vertex_array_object" => gl_oes_vertex_array_object,
    "GL_ARB_framebuffer_object" => gl_arb_framebuffer_object,
    "GL_EXT_framebuffer_object" => gl_ext_framebuffer_object,
    "GL_ARB_texture_float" => gl_arb_texture_float,
    "GL_OES_texture_float" => gl_oes_texture_float,
}

/// Represents the capabilities of the context.
///
/// Contrary to the state, these values never change.
#[derive(Debug)]
pub struct Capabilities {
    pub version: Version,
    pub vendor: String,
    pub renderer: String,
    pub extensions: Extensions,
    pub profile: Option<Profile>,
    /// Maximum width and height of a texture.
    pub max_texture_size: u32,
    /// Maximum number of textures that can be bound to a program.
    pub max_combined_texture_image_units: u32,
}

impl Capabilities {
    pub unsafe fn parse() -> Result<Capabilities> {
        let version = Version::parse()?;
        let extensions = Extensions::parse(version)?;

        Ok(Capabilities {
            version,
            extensions,
            vendor: parse_str(gl::VENDOR)?,
            renderer: parse_str(gl::RENDERER)?,
            profile: Capabilities::parse_profile(version),
            max_texture_size: Capabilities::parse_integer(gl::MAX_TEXTURE_SIZE, 64),
            max_combined_texture_image_units: Capabilities::parse_integer(
                gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS,
                2,
            ),
        })
    }

    /// The shading language programs are written in, and the preamble prepended to sources
    /// that do not declare a `#version` themselves.
    pub fn shading_language(&self) -> (&'static str, &'static str) {
        match self.version {
            Version::ES(_, _) => (
                "GLSL ES 3.00",
                "#version 300 es\nprecision highp float;\nprecision highp sampler2D;\n",
            ),
            Version::GL(_, _) => ("GLSL 1.40", "#version 140\n"),
        }
    }

    /// Checks that the context can run the renderer at all.
    pub fn check(&self) -> Result<()> {
        if self.version < Version::GL(3, 1) && self.version < Version::ES(3, 0) {
            bail!(
                "The OpenGL implementation {:?} does not support texelFetch and integer \
                 textures.",
                self.version
            );
        }

        if self.version < Version::GL(3, 0)
            && self.version < Version::ES(3, 0)
            && !self.extensions.gl_arb_vertex_array_object
            && !self.extensions.gl_apple_vertex_array_object
            && !self.extensions.gl_oes_vertex_array_object
        {
            bail!("The OpenGL implementation does not supports vertex array objects.");
        }

        if self.version < Version::GL(3, 0)
            && self.version < Version::ES(3, 0)
            && !self.extensions.gl_ext_framebuffer_object
            && !self.extensions.gl_arb_framebuffer_object
        {
            bail!("The OpenGL implementation does not supports framebuffer objects.");
        }

        Ok(())
    }

    #[inline]
    unsafe fn parse_integer(id: GLenum, fallback: GLint) -> u32 {
        let mut val = fallback;
        gl::GetIntegerv(id, &mut val);
        val.max(0) as u32
    }

    #[inline]
    unsafe fn parse_profile(version: Version) -> Option<Profile> {
        if version >= Version::GL(3, 2) {
            let mut val = 0;
            gl::GetIntegerv(gl::CONTEXT_PROFILE_MASK, &mut val);
            let val = val as GLenum;
            if (val & gl::CONTEXT_COMPATIBILITY_PROFILE_BIT) != 0 {
                Some(Profile::Compatibility)
            } else if (val & gl::CONTEXT_CORE_PROFILE_BIT) != 0 {
                Some(Profile::Core)
            } else {
                None
            }
        } else {
            None
        }
    }
}

#[inline]
unsafe fn parse_str(id: GLenum) -> Result<String> {
    let s = gl::GetString(id);
    if s.is_null() {
        bail!("[GL] String of {} is null.", id);
    }

    let bytes = ffi::CStr::from_ptr(s as *const _).to_bytes().to_vec();
    String::from_utf8(bytes).map_err(|_| format_err!("[GL] String of {} is unformaled.", id))
}
