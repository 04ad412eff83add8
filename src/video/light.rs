use crate::utils::Table;

use super::backends::UniformValue;
use super::types::{LightId, LightType, LIGHT_ATTRIBUTE_FLOATS};

#[derive(Debug, Clone, Copy)]
struct Light {
    kind: LightType,
    enabled: bool,
    /// Position, color and intensity.
    attributes: [f32; LIGHT_ATTRIBUTE_FLOATS],
}

impl Light {
    /// The code written into the light block, zero when disabled.
    fn code(&self) -> f32 {
        if self.enabled {
            self.kind.code()
        } else {
            0.0
        }
    }
}

/// Owns the lights and packs the enabled ones into the uniform arrays `lightPositions`
/// (xyz position, w intensity) and `lightColors` (xyz color, w type code).
pub struct LightManager {
    lights: Table<LightId, Light>,
    max: usize,
    positions: Vec<[f32; 4]>,
    colors: Vec<[f32; 4]>,
    dirty: bool,
}

impl LightManager {
    pub fn new(max: usize) -> Self {
        let mut colors = vec![[0.0; 4]; max];
        if let Some(v) = colors.first_mut() {
            v[3] = -1.0;
        }

        LightManager {
            lights: Table::new(),
            max,
            positions: vec![[0.0; 4]; max],
            colors,
            dirty: false,
        }
    }

    /// Adds an enabled light at the origin with white color and intensity 1.
    pub fn add(&mut self, kind: LightType) -> LightId {
        self.dirty = true;
        self.lights.insert(Light {
            kind,
            enabled: true,
            attributes: [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
        })
    }

    pub fn update_attributes(
        &mut self,
        id: LightId,
        attributes: &[f32; LIGHT_ATTRIBUTE_FLOATS],
    ) -> bool {
        match self.lights.get_mut(id) {
            Some(light) => {
                light.attributes = *attributes;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn enable(&mut self, id: LightId, enabled: bool) -> bool {
        match self.lights.get_mut(id) {
            Some(light) => {
                if light.enabled != enabled {
                    light.enabled = enabled;
                    self.dirty = true;
                }

                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: LightId) -> bool {
        if self.lights.remove(id).is_some() {
            self.dirty = true;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn contains(&self, id: LightId) -> bool {
        self.lights.is_alive(id)
    }

    /// The number of lights, enabled or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    #[inline]
    pub fn max_enabled(&self) -> usize {
        self.max
    }

    /// Repacks the uniform arrays if lights changed. Returns true if more lights are enabled
    /// than fit, in which case the ones with the highest type codes are dropped.
    pub fn sync(&mut self) -> bool {
        if !self.dirty {
            return false;
        }

        let mut enabled: Vec<&Light> = self.lights.values().filter(|v| v.enabled).collect();
        enabled.sort_by(|lhs, rhs| {
            lhs.code()
                .partial_cmp(&rhs.code())
                .unwrap_or(::std::cmp::Ordering::Equal)
        });

        let truncated = enabled.len() > self.max;
        let count = enabled.len().min(self.max);

        for (i, light) in enabled.iter().take(count).enumerate() {
            let a = &light.attributes;
            self.positions[i] = [a[0], a[1], a[2], a[6]];
            self.colors[i] = [a[3], a[4], a[5], light.code()];
        }

        if count < self.max {
            self.positions[count] = [0.0; 4];
            self.colors[count] = [0.0, 0.0, 0.0, -1.0];
        }

        self.dirty = false;
        truncated
    }

    pub fn uniforms(&self) -> (UniformValue, UniformValue) {
        (
            UniformValue::Vector4Array(self.positions.clone()),
            UniformValue::Vector4Array(self.colors.clone()),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(lights: &LightManager) -> Vec<f32> {
        lights
            .colors
            .iter()
            .map(|v| v[3])
            .take_while(|&v| v >= 0.0)
            .collect()
    }

    #[test]
    fn packing() {
        let mut lights = LightManager::new(32);
        assert!(!lights.sync());
        assert!(kinds(&lights).is_empty());

        let spot = lights.add(LightType::Spot);
        let point = lights.add(LightType::Point);
        let dir = lights.add(LightType::Directional);

        lights.update_attributes(point, &[1.0, 2.0, 3.0, 0.5, 0.25, 0.125, 4.0]);
        assert!(!lights.sync());
        assert_eq!(kinds(&lights), vec![0.05, 0.15, 0.25]);
        assert_eq!(lights.positions[0], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(lights.colors[0], [0.5, 0.25, 0.125, 0.05]);

        lights.enable(dir, false);
        lights.sync();
        assert_eq!(kinds(&lights), vec![0.05, 0.25]);

        lights.remove(spot);
        lights.sync();
        assert_eq!(kinds(&lights), vec![0.05]);
        assert_eq!(lights.len(), 2);

        assert!(!lights.update_attributes(spot, &[0.0; 7]));
        assert!(!lights.enable(spot, true));
    }

    #[test]
    fn truncation() {
        let mut lights = LightManager::new(2);
        for _ in 0..3 {
            lights.add(LightType::Point);
        }

        assert!(lights.sync());
        assert_eq!(kinds(&lights).len(), 2);
    }
}
