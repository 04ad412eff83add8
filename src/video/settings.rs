//! Functions for loading renderer settings.

use serde::{Deserialize, Serialize};

use super::types::{FramebufferKind, MINIMUM_LIGHT_COUNT, MINIMUM_TEXTURE_BINDING_COUNT};

/// Tunables of the shader renderer and its devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoParams {
    /// The initial width and height of the texture atlas.
    pub atlas_initial_size: u32,
    /// The atlas never grows beyond this width and height.
    pub atlas_max_size: u32,
    /// The factor applied to the atlas size on every growth step.
    pub atlas_growth: f32,
    /// 2D vertex storage grows by this many vertices.
    pub vertex_block: usize,
    /// 2D object storage grows by this many objects.
    pub object_block: usize,
    /// Physical device buffers kept per logical render buffer.
    pub buffer_pool_depth: usize,
    /// Frames a submitted buffer may still be in use by the device.
    pub frames_in_flight: u64,
    /// Physical device buffers created up front.
    pub preclaimed_buffers: usize,
    pub max_lights: usize,
    pub max_texture_bindings: usize,
    /// The framebuffer kinds a headless device accepts.
    pub framebuffers: Vec<FramebufferKind>,
}

impl Default for VideoParams {
    fn default() -> Self {
        VideoParams {
            atlas_initial_size: 32,
            atlas_max_size: 2048,
            atlas_growth: 1.2,
            vertex_block: 160,
            object_block: 16,
            buffer_pool_depth: 3,
            frames_in_flight: 2,
            preclaimed_buffers: 10,
            max_lights: MINIMUM_LIGHT_COUNT,
            max_texture_bindings: MINIMUM_TEXTURE_BINDING_COUNT,
            framebuffers: vec![FramebufferKind::RgbaPixelArray, FramebufferKind::GLFBPacket],
        }
    }
}

impl VideoParams {
    /// Parses settings from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ::failure::Error> {
        let mut params: VideoParams = serde_json::from_str(json)?;
        params.validate();
        Ok(params)
    }

    /// Clamps values the renderer cannot work with.
    pub fn validate(&mut self) {
        if self.atlas_initial_size == 0 {
            self.atlas_initial_size = 1;
        }

        if self.atlas_max_size < self.atlas_initial_size {
            warn!(
                "[VideoParams] atlas_max_size {} is below atlas_initial_size {}.",
                self.atlas_max_size, self.atlas_initial_size
            );
            self.atlas_max_size = self.atlas_initial_size;
        }

        if !(self.atlas_growth > 1.0) {
            self.atlas_growth = 1.2;
        }

        self.vertex_block = self.vertex_block.max(1);
        self.object_block = self.object_block.max(1);
        self.buffer_pool_depth = self.buffer_pool_depth.max(1);
        self.max_lights = self.max_lights.max(MINIMUM_LIGHT_COUNT);
        self.max_texture_bindings = self.max_texture_bindings.max(MINIMUM_TEXTURE_BINDING_COUNT);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn json_defaults() {
        let params = VideoParams::from_json(r#"{ "atlas_max_size": 512, "max_lights": 4 }"#)
            .unwrap();

        assert_eq!(params.atlas_max_size, 512);
        assert_eq!(params.max_lights, MINIMUM_LIGHT_COUNT);
        assert_eq!(params.vertex_block, 160);
        assert_eq!(params.buffer_pool_depth, 3);

        assert!(VideoParams::from_json(r#"{ "atlas_max_size": "large" }"#).is_err());
        assert!(VideoParams::from_json("atlas_max_size = 512").is_err());
    }
}
