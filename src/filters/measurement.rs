/// Barometer + accelerometer + gyroscope measurement model
///
/// Measurement vector (7D):
/// [0]:   Barometric altitude (m)
/// [1-3]: Body-frame specific force (m/s²)
/// [4-6]: Body-frame angular rate (rad/s)
///
/// The gyro rows are a pass-through: predicted equals measured, so they never
/// contribute to the residual and carry no state sensitivity.
use nalgebra::Vector3;

use crate::config::MeasurementModel;
use crate::physics::{gravity_world, mg_to_ms2, pressure_to_altitude, GRAVITY};
use crate::types::{
    AccelData, GyroData, Jacobian, MeasureVec, RotationMat, IDX_POS, IDX_QUAT,
};

/// Observed measurement z
pub fn observed(
    pressure_pa: f32,
    sea_level_pa: f32,
    accel_mg: &AccelData,
    gyro: &GyroData,
) -> MeasureVec {
    let altitude = pressure_to_altitude(pressure_pa, sea_level_pa);
    let accel = mg_to_ms2(accel_mg.as_vector());

    MeasureVec::from([
        altitude, accel.x, accel.y, accel.z, gyro.x, gyro.y, gyro.z,
    ])
}

/// Body-frame accelerometer reading predicted from a world-frame acceleration
pub fn predicted_specific_force(
    model: MeasurementModel,
    rotation: &RotationMat,
    accel_world: &Vector3<f32>,
) -> Vector3<f32> {
    match model {
        MeasurementModel::Reference => rotation.transpose() * (accel_world + gravity_world()),
        // Inverse of the predict mapping a_world = R·f + g
        MeasurementModel::GravityConsistent => {
            rotation.transpose() * (accel_world - gravity_world())
        }
    }
}

/// Predicted measurement ẑ
pub fn predicted(altitude: f32, specific_force: &Vector3<f32>, gyro: &GyroData) -> MeasureVec {
    MeasureVec::from([
        altitude,
        specific_force.x,
        specific_force.y,
        specific_force.z,
        gyro.x,
        gyro.y,
        gyro.z,
    ])
}

/// Measurement Jacobian H (7×10) around quaternion q = [x, y, z, w]
///
/// Only the closed-form gravity terms are populated; the az row carries the
/// qx/qy partials only. Velocity sensitivity through Δv/dt is not modelled.
pub fn jacobian(model: MeasurementModel, q: &[f32; 4]) -> Jacobian {
    let [qx, qy, qz, qw] = *q;
    let g = match model {
        MeasurementModel::Reference => GRAVITY,
        MeasurementModel::GravityConsistent => -GRAVITY,
    };
    let (ix, iy, iz, iw) = (IDX_QUAT, IDX_QUAT + 1, IDX_QUAT + 2, IDX_QUAT + 3);

    let mut h = Jacobian::zeros();

    // altitude ← pz
    h[(0, IDX_POS + 2)] = 1.0;

    // ax
    h[(1, ix)] = 2.0 * qz * g;
    h[(1, iy)] = -2.0 * qw * g;
    h[(1, iz)] = 2.0 * qx * g;
    h[(1, iw)] = -2.0 * qy * g;

    // ay
    h[(2, ix)] = 2.0 * qw * g;
    h[(2, iy)] = 2.0 * qz * g;
    h[(2, iz)] = 2.0 * qy * g;
    h[(2, iw)] = 2.0 * qx * g;

    // az
    h[(3, ix)] = -4.0 * qx * g;
    h[(3, iy)] = -4.0 * qy * g;

    h
}
