//! This module contains the math utils that mainly comes from `cgmath`.

pub mod prelude {
    pub use cgmath::prelude::*;
    pub use cgmath::{Deg, Euler, Matrix3, Matrix4, Quaternion, Rad, Vector2, Vector3, Vector4};
}

pub use cgmath::*;

/// Flattens a matrix into column-major order.
#[inline]
pub fn columns(m: &Matrix4<f32>) -> [f32; 16] {
    let mut out = [0.0; 16];
    for c in 0..4 {
        for r in 0..4 {
            out[c * 4 + r] = m[c][r];
        }
    }

    out
}

/// Builds a matrix from column-major floats.
#[inline]
pub fn from_columns(v: &[f32]) -> Matrix4<f32> {
    let mut m = Matrix4::from_scale(1.0);
    for c in 0..4 {
        for r in 0..4 {
            m[c][r] = v.get(c * 4 + r).cloned().unwrap_or(if c == r { 1.0 } else { 0.0 });
        }
    }

    m
}
