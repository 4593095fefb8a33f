/// Physical constants and conversions shared by predict and update
use nalgebra::{Matrix3, Vector3};

use crate::types::RotationMat;

/// Standard gravity added to the world-frame z axis [m/s²]
pub const GRAVITY: f32 = 9.80665;

/// Factor used to turn one milli-g into m/s² (sensor datasheet value)
pub const MG_TO_MS2: f32 = 9.8066 / 1000.0;

/// ISA sea-level pressure [Pa]
pub const SEA_LEVEL_PRESSURE_PA: f32 = 101_325.0;

const BARO_SCALE_M: f32 = 44_330.0;
const BARO_EXPONENT: f32 = 0.1903;

/// World-frame gravity term added by the process model
pub fn gravity_world() -> Vector3<f32> {
    Vector3::new(0.0, 0.0, GRAVITY)
}

/// Convert a milli-g accelerometer reading into m/s²
pub fn mg_to_ms2(accel_mg: Vector3<f32>) -> Vector3<f32> {
    accel_mg * MG_TO_MS2
}

/// Standard barometric formula
///
/// altitude = 44330 · (1 − (p / p0)^0.1903)
///
/// `pressure_pa` at `sea_level_pa` yields exactly zero altitude.
pub fn pressure_to_altitude(pressure_pa: f32, sea_level_pa: f32) -> f32 {
    BARO_SCALE_M * (1.0 - (pressure_pa / sea_level_pa).powf(BARO_EXPONENT))
}

/// Body→world rotation matrix from a vector-first quaternion [x, y, z, w]
pub fn quat_to_rotation_matrix(q: &[f32; 4]) -> RotationMat {
    let [x, y, z, w] = *q;

    Matrix3::new(
        1.0 - 2.0 * y * y - 2.0 * z * z,
        2.0 * x * y - 2.0 * z * w,
        2.0 * x * z + 2.0 * y * w,
        2.0 * x * y + 2.0 * z * w,
        1.0 - 2.0 * x * x - 2.0 * z * z,
        2.0 * y * z - 2.0 * x * w,
        2.0 * x * z - 2.0 * y * w,
        2.0 * y * z + 2.0 * x * w,
        1.0 - 2.0 * x * x - 2.0 * y * y,
    )
}

/// One explicit Euler step of q̇ = ½ q ⊗ (ω, 0), renormalized
///
/// Evaluated in f64 so any finite `|ω|·dt` stays in range. The step is
/// orthogonal to a unit `q`, so the result only fails to exist when the
/// input quaternion is itself degenerate.
pub fn integrate_quat(q: &[f32; 4], gyro: &Vector3<f32>, dt: f32) -> Option<[f32; 4]> {
    let [x, y, z, w] = q.map(f64::from);
    let half_dt = 0.5 * f64::from(dt);
    let (gx, gy, gz) = (
        f64::from(gyro.x) * half_dt,
        f64::from(gyro.y) * half_dt,
        f64::from(gyro.z) * half_dt,
    );

    let stepped = [
        x + w * gx + y * gz - z * gy,
        y + w * gy + z * gx - x * gz,
        z + w * gz + x * gy - y * gx,
        w - x * gx - y * gy - z * gz,
    ];
    let norm = stepped.iter().map(|v| v * v).sum::<f64>().sqrt();
    if !(norm > 0.0) || !norm.is_finite() {
        return None;
    }
    Some(stepped.map(|v| (v / norm) as f32))
}

/// Unit quaternion in the direction of `q`, `None` for zero or non-finite input
///
/// Components are scaled by the largest magnitude first so the sum of squares
/// cannot overflow.
pub fn normalize_quat(q: &[f32; 4]) -> Option<[f32; 4]> {
    if !q.iter().all(|v| v.is_finite()) {
        return None;
    }
    let scale = q.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return None;
    }

    let scaled = q.map(|v| v / scale);
    let norm = scaled.iter().map(|v| v * v).sum::<f32>().sqrt();
    Some(scaled.map(|v| v / norm))
}
