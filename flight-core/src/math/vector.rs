use nalgebra::Vector3;

/// Standard gravity (m/s^2), used to convert between g and SI.
pub const STANDARD_GRAVITY: f32 = 9.80665;

pub fn from_array(v: [f32; 3]) -> Vector3<f32> {
    Vector3::new(v[0], v[1], v[2])
}

/// Unit vector in the direction of `v`.
///
/// A zero-length input divides by zero and comes back as NaN instead of
/// panicking, same as the rest of the math module.
pub fn normalize(v: &Vector3<f32>) -> Vector3<f32> {
    let magnitude = libm::sqrtf(v.dot(v));
    v / magnitude
}

pub fn is_finite(v: &Vector3<f32>) -> bool {
    v.iter().all(|c| c.is_finite())
}

pub fn has_nan(v: &Vector3<f32>) -> bool {
    v.iter().any(|c| c.is_nan())
}
