use dynacoe::math::prelude::*;
use serde::{Deserialize, Serialize};

/// `Transform` stores the position, rotation and scale of a node relative to
/// its parent. Rotation is kept as Euler angles in degrees, applied x, y then z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
    /// Negates the translation, which turns the transform into a camera-style view.
    pub reverse_translation: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            position: Vector3::zero(),
            rotation: Vector3::zero(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            reverse_translation: false,
        }
    }
}

impl Transform {
    /// Returns the matrix representation, `T * Rx * Ry * Rz * S`. Components at
    /// their identity value are left out of the product.
    pub fn matrix(&self) -> Matrix4<f32> {
        let mut m = Matrix4::identity();

        if self.position != Vector3::zero() {
            let position = if self.reverse_translation {
                -self.position
            } else {
                self.position
            };

            m = Matrix4::from_translation(position);
        }

        if self.rotation != Vector3::zero() {
            m = m
                * Matrix4::from_angle_x(Deg(self.rotation.x))
                * Matrix4::from_angle_y(Deg(self.rotation.y))
                * Matrix4::from_angle_z(Deg(self.rotation.z));
        }

        if self.scale != Vector3::new(1.0, 1.0, 1.0) {
            m = m * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z);
        }

        m
    }
}
