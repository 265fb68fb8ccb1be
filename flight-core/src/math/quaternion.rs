use nalgebra::{Quaternion, Vector3};

/// Rotates `v` from the body frame into the world frame, `q v q*`.
pub fn rotate(q: &Quaternion<f32>, v: &Vector3<f32>) -> Vector3<f32> {
    let u = q.imag();
    let s = q.w;
    u * (2.0 * u.dot(v)) + v * (s * s - u.dot(&u)) + u.cross(v) * (2.0 * s)
}

/// Rotates `v` from the world frame into the body frame, `q* v q`.
pub fn inverse_rotate(q: &Quaternion<f32>, v: &Vector3<f32>) -> Vector3<f32> {
    rotate(&q.conjugate(), v)
}

/// First order quaternion integration, `q + 0.5 * dt * Ω(ω) q`.
///
/// `angular_velocity` is the body rate in rad/s. The result is not
/// renormalised.
pub fn integrate(q: &Quaternion<f32>, angular_velocity: &Vector3<f32>, dt: f32) -> Quaternion<f32> {
    let (wx, wy, wz) = (angular_velocity.x, angular_velocity.y, angular_velocity.z);
    let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);
    let h = 0.5 * dt;

    // Ω(ω) = [ 0  -wx -wy -wz
    //          wx  0   wz -wy
    //          wy -wz  0   wx
    //          wz  wy -wx  0 ]
    Quaternion::new(
        q0 + h * (-wx * q1 - wy * q2 - wz * q3),
        q1 + h * (wx * q0 + wz * q2 - wy * q3),
        q2 + h * (wy * q0 - wz * q1 + wx * q3),
        q3 + h * (wz * q0 + wy * q1 - wx * q2),
    )
}

/// `w² + x² − y² − z²`, the world-vertical component of the body axis for a
/// unit quaternion.
pub fn vertical_component(q: &Quaternion<f32>) -> f32 {
    q.w * q.w + q.i * q.i - q.j * q.j - q.k * q.k
}

/// Angle between the body axis and vertical, `acos(w² + x² − y² − z²)`.
///
/// This lumps the two lateral axes together and is not a general tilt
/// metric. The lockout windows are tuned against it as is.
pub fn angle_from_vertical(q: &Quaternion<f32>) -> f32 {
    // rounding can push a unit quaternion's term just past ±1; NaN passes through
    libm::acosf(vertical_component(q).clamp(-1.0, 1.0))
}

/// `q / |q|`, NaN for a zero quaternion.
pub fn normalized(q: &Quaternion<f32>) -> Quaternion<f32> {
    let norm = libm::sqrtf(q.w * q.w + q.i * q.i + q.j * q.j + q.k * q.k);
    Quaternion::new(q.w / norm, q.i / norm, q.j / norm, q.k / norm)
}
