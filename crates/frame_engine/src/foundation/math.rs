//! Math type aliases and projection helpers

use nalgebra::{Matrix4, Vector2, Vector3};

/// 2D vector
pub type Vec2 = Vector2<f32>;
/// 3D vector
pub type Vec3 = Vector3<f32>;
/// 4x4 matrix
pub type Mat4 = Matrix4<f32>;

/// Off-center orthographic projection for y-down pixel coordinates
///
/// Maps `x` in `[0, width]` and `y` in `[0, height]` with left 0, right
/// `width`, bottom `height`, top 0, near -1 and far 1. Depth lands in `[0, 1]`.
pub fn orthographic_projection(width: f32, height: f32) -> Mat4 {
    let (left, right, bottom, top) = (0.0_f32, width, height, 0.0_f32);
    let (near, far) = (-1.0_f32, 1.0_f32);

    #[rustfmt::skip]
    let projection = Mat4::new(
        2.0 / (right - left), 0.0,                  0.0,                 (left + right) / (left - right),
        0.0,                  2.0 / (top - bottom), 0.0,                 (top + bottom) / (bottom - top),
        0.0,                  0.0,                  1.0 / (near - far),  near / (near - far),
        0.0,                  0.0,                  0.0,                 1.0,
    );
    projection
}
