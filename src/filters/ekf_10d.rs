/// 10-Dimensional Extended Kalman Filter (barometer + IMU)
///
/// State Vector (10D):
/// [0-2]: Position (X, Y, Z) in world frame (meters)
/// [3-5]: Velocity (Vx, Vy, Vz) in world frame (m/s)
/// [6-9]: Quaternion (qx, qy, qz, qw), body→world, vector part first
///
/// Predict integrates gyro/accel at IMU rate. Update fuses barometric altitude
/// with re-observed accel and gyro. Covariance is update-only unless
/// `propagate_covariance` is enabled in the config.
///
/// All storage is fixed-size; no call allocates.
use log::{debug, trace, warn};
use nalgebra::{Matrix3, SMatrix, Vector3};
use serde::{Deserialize, Serialize};

use super::cholesky::invert_spd;
use super::measurement;
use crate::config::{CovarianceUpdate, FilterConfig, MeasurementModel};
use crate::error::{FilterError, FilterResult};
use crate::physics::{
    gravity_world, integrate_quat, mg_to_ms2, normalize_quat, quat_to_rotation_matrix,
    SEA_LEVEL_PRESSURE_PA,
};
use crate::types::{
    AccelData, GyroData, KalmanGain, MeasureMat, StateMat, StateVec, IDX_POS, IDX_QUAT, IDX_VEL,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ekf10dState {
    /// Position in world frame [meters]
    pub position: (f32, f32, f32),

    /// Velocity in world frame [m/s]
    pub velocity: (f32, f32, f32),

    /// Quaternion (x, y, z, w)
    pub quaternion: (f32, f32, f32, f32),

    /// Covariance trace for uncertainty
    pub covariance_trace: f32,

    /// Update counters
    pub predict_count: u64,
    pub update_count: u64,
    pub skipped_updates: u64,
}

#[derive(Clone, Debug)]
pub struct Ekf10d {
    /// State vector [10D]
    state: StateVec,

    /// Covariance matrix [10x10]
    covariance: StateMat,

    /// Process noise matrix [10x10]
    process_noise: StateMat,

    /// Measurement noise matrix [7x7]
    measurement_noise: MeasureMat,

    /// Velocity at the end of the last applied update
    velocity_anchor: Vector3<f32>,

    sea_level_pressure_pa: f32,
    propagate_covariance: bool,
    covariance_update: CovarianceUpdate,
    measurement_model: MeasurementModel,

    predict_count: u64,
    update_count: u64,
    skipped_updates: u64,
}

impl Ekf10d {
    /// Create a filter at the origin, at rest, with identity attitude
    pub fn new(config: &FilterConfig) -> FilterResult<Self> {
        config.validate()?;

        let mut filter = Self::from_parts(
            Self::initial_state(),
            config.initial_covariance(),
            config.process_noise(),
            config.measurement_noise(),
        );
        filter.sea_level_pressure_pa = config.sea_level_pressure_pa;
        filter.propagate_covariance = config.propagate_covariance;
        filter.covariance_update = config.covariance_update;
        filter.measurement_model = config.measurement_model;

        debug!(
            "ekf10d: created (propagate_covariance={}, covariance_update={:?}, measurement_model={:?})",
            filter.propagate_covariance, filter.covariance_update, filter.measurement_model
        );
        Ok(filter)
    }

    /// Build from caller-owned matrices without validation
    ///
    /// A measurement noise that is not positive definite is accepted here and
    /// surfaces later as `FilterError::NumericalDegeneracy` from `update`.
    pub fn from_parts(
        state: StateVec,
        covariance: StateMat,
        process_noise: StateMat,
        measurement_noise: MeasureMat,
    ) -> Self {
        Self {
            state,
            covariance,
            process_noise,
            measurement_noise,
            velocity_anchor: state.fixed_rows::<3>(IDX_VEL).into_owned(),
            sea_level_pressure_pa: SEA_LEVEL_PRESSURE_PA,
            propagate_covariance: false,
            covariance_update: CovarianceUpdate::Simple,
            measurement_model: MeasurementModel::Reference,
            predict_count: 0,
            update_count: 0,
            skipped_updates: 0,
        }
    }

    /// Zero position/velocity, identity quaternion [0, 0, 0, 1]
    pub fn initial_state() -> StateVec {
        let mut state = StateVec::zeros();
        state[IDX_QUAT + 3] = 1.0;
        state
    }

    pub fn state(&self) -> &StateVec {
        &self.state
    }

    pub fn covariance(&self) -> &StateMat {
        &self.covariance
    }

    pub fn process_noise(&self) -> &StateMat {
        &self.process_noise
    }

    pub fn measurement_noise(&self) -> &MeasureMat {
        &self.measurement_noise
    }

    pub fn position(&self) -> Vector3<f32> {
        self.state.fixed_rows::<3>(IDX_POS).into_owned()
    }

    pub fn velocity(&self) -> Vector3<f32> {
        self.state.fixed_rows::<3>(IDX_VEL).into_owned()
    }

    /// Quaternion as [x, y, z, w]
    pub fn quaternion(&self) -> [f32; 4] {
        [
            self.state[IDX_QUAT],
            self.state[IDX_QUAT + 1],
            self.state[IDX_QUAT + 2],
            self.state[IDX_QUAT + 3],
        ]
    }

    pub fn set_position(&mut self, position: Vector3<f32>) -> FilterResult<()> {
        if !position.iter().all(|v| v.is_finite()) {
            return Err(FilterError::NonFiniteInput("position"));
        }
        self.state.fixed_rows_mut::<3>(IDX_POS).copy_from(&position);
        Ok(())
    }

    /// Also resets the velocity reference used by the next update
    pub fn set_velocity(&mut self, velocity: Vector3<f32>) -> FilterResult<()> {
        if !velocity.iter().all(|v| v.is_finite()) {
            return Err(FilterError::NonFiniteInput("velocity"));
        }
        self.state.fixed_rows_mut::<3>(IDX_VEL).copy_from(&velocity);
        self.velocity_anchor = velocity;
        Ok(())
    }

    /// Set attitude from [x, y, z, w]; normalized on the way in
    ///
    /// A zero or non-finite quaternion is rejected and the attitude kept.
    pub fn set_quaternion(&mut self, quat: [f32; 4]) -> FilterResult<()> {
        let q = normalize_quat(&quat).ok_or(FilterError::DegenerateQuaternion)?;
        self.write_quaternion(&q);
        Ok(())
    }

    /// Get current state snapshot
    pub fn get_state(&self) -> Ekf10dState {
        let p = self.position();
        let v = self.velocity();
        let [qx, qy, qz, qw] = self.quaternion();

        Ekf10dState {
            position: (p.x, p.y, p.z),
            velocity: (v.x, v.y, v.z),
            quaternion: (qx, qy, qz, qw),
            covariance_trace: self.covariance.trace(),
            predict_count: self.predict_count,
            update_count: self.update_count,
            skipped_updates: self.skipped_updates,
        }
    }

    /// Prediction step
    ///
    /// `dt` in seconds, `gyro` in rad/s, `accel_mg` in milli-g (body frame).
    pub fn predict(&mut self, dt: f32, gyro: GyroData, accel_mg: AccelData) -> FilterResult<()> {
        check_time_step(dt)?;
        if !gyro.is_finite() {
            return Err(FilterError::NonFiniteInput("gyro"));
        }
        if !accel_mg.is_finite() {
            return Err(FilterError::NonFiniteInput("accel"));
        }

        let accel = mg_to_ms2(accel_mg.as_vector());
        let omega = gyro.as_vector();

        // Quaternion: explicit Euler on q̇ = ½ Ω(ω) q, then renormalize
        let quat = integrate_quat(&self.quaternion(), &omega, dt)
            .ok_or(FilterError::DegenerateQuaternion)?;

        // Specific force to world frame, gravity added on z
        let rotation = quat_to_rotation_matrix(&quat);
        let accel_world = rotation * accel + gravity_world();

        // Velocity first, then the new velocity integrates position
        let velocity = self.velocity() + accel_world * dt;
        let position = self.position() + velocity * dt;
        if !velocity.iter().chain(position.iter()).all(|v| v.is_finite()) {
            return Err(FilterError::NonFiniteResult("velocity/position"));
        }

        let covariance = if self.propagate_covariance {
            let f = transition_jacobian(dt, &quat, &accel, &omega);
            let propagated = f * self.covariance * f.transpose() + self.process_noise;
            if !propagated.iter().all(|v| v.is_finite()) {
                return Err(FilterError::NonFiniteResult("covariance"));
            }
            propagated
        } else {
            self.covariance
        };

        self.write_quaternion(&quat);
        self.state.fixed_rows_mut::<3>(IDX_VEL).copy_from(&velocity);
        self.state.fixed_rows_mut::<3>(IDX_POS).copy_from(&position);
        self.covariance = covariance;

        self.predict_count += 1;
        Ok(())
    }

    /// Measurement update
    ///
    /// `dt` is the interval since the previous update [s], `pressure_pa` in Pa,
    /// `accel_mg` in milli-g, `gyro` in rad/s. On any error the state,
    /// covariance and velocity anchor are left untouched.
    pub fn update(
        &mut self,
        dt: f32,
        pressure_pa: f32,
        accel_mg: AccelData,
        gyro: GyroData,
    ) -> FilterResult<()> {
        check_time_step(dt)?;
        if !pressure_pa.is_finite() {
            return Err(FilterError::NonFiniteInput("pressure"));
        }
        if pressure_pa <= 0.0 {
            return Err(FilterError::InvalidPressure(pressure_pa));
        }
        if !gyro.is_finite() {
            return Err(FilterError::NonFiniteInput("gyro"));
        }
        if !accel_mg.is_finite() {
            return Err(FilterError::NonFiniteInput("accel"));
        }

        let quat = self.quaternion();
        let rotation = quat_to_rotation_matrix(&quat);

        // World acceleration implied by the velocity change since the last update
        let accel_world = (self.velocity() - self.velocity_anchor) / dt;
        let specific_force = measurement::predicted_specific_force(
            self.measurement_model,
            &rotation,
            &accel_world,
        );

        let z = measurement::observed(pressure_pa, self.sea_level_pressure_pa, &accel_mg, &gyro);
        let z_hat = measurement::predicted(self.state[IDX_POS + 2], &specific_force, &gyro);
        let residual = z - z_hat;
        // A subnormal dt can blow Δv/dt up to inf
        if !residual.iter().all(|v| v.is_finite()) {
            return Err(FilterError::NonFiniteResult("residual"));
        }

        let h = measurement::jacobian(self.measurement_model, &quat);

        // S = H·P·Hᵀ + R
        let ph_t: KalmanGain = self.covariance * h.transpose();
        let s = h * ph_t + self.measurement_noise;

        let s_inv = match invert_spd(&s) {
            Ok(inv) => inv,
            Err(err) => {
                self.skipped_updates += 1;
                warn!(
                    "ekf10d: update skipped ({}), {} skipped so far",
                    err, self.skipped_updates
                );
                return Err(err.into());
            }
        };

        // K = P·Hᵀ·S⁻¹
        let k: KalmanGain = ph_t * s_inv;

        let state = self.state + k * residual;

        let i_kh = StateMat::identity() - k * h;
        let covariance = match self.covariance_update {
            CovarianceUpdate::Simple => i_kh * self.covariance,
            CovarianceUpdate::Joseph => {
                i_kh * self.covariance * i_kh.transpose()
                    + k * self.measurement_noise * k.transpose()
            }
        };
        if !state.iter().chain(covariance.iter()).all(|v| v.is_finite()) {
            return Err(FilterError::NonFiniteResult("state/covariance"));
        }

        self.state = state;
        self.covariance = covariance;

        self.velocity_anchor = self.velocity();
        self.update_count += 1;

        trace!(
            "ekf10d: update #{} |r|={:.4} alt_residual={:.3}",
            self.update_count,
            residual.norm(),
            residual[0]
        );
        Ok(())
    }

    fn write_quaternion(&mut self, q: &[f32; 4]) {
        for (i, qi) in q.iter().enumerate() {
            self.state[IDX_QUAT + i] = *qi;
        }
    }
}

fn check_time_step(dt: f32) -> FilterResult<()> {
    // NaN fails the comparison
    if !(dt > 0.0) || !dt.is_finite() {
        return Err(FilterError::InvalidTimeStep(dt));
    }
    Ok(())
}

/// State transition Jacobian F = I + dt·A for the predict model
///
/// A couples position to velocity, velocity to attitude through ∂(R(q)·f)/∂q,
/// and attitude to itself through ½Ω(ω).
fn transition_jacobian(
    dt: f32,
    quat: &[f32; 4],
    accel: &Vector3<f32>,
    omega: &Vector3<f32>,
) -> StateMat {
    let mut f = StateMat::identity();

    // ∂p/∂v
    f.fixed_view_mut::<3, 3>(IDX_POS, IDX_VEL)
        .copy_from(&(Matrix3::identity() * dt));

    // ∂v/∂q for q ⊗ f ⊗ q*, vector part v and scalar w
    let v = Vector3::new(quat[0], quat[1], quat[2]);
    let w = quat[3];
    let dv_dqv = (Matrix3::identity() * v.dot(accel) + v * accel.transpose()
        - accel * v.transpose()
        - accel.cross_matrix() * w)
        * 2.0;
    let dv_dqw = (accel * w + v.cross(accel)) * 2.0;

    let mut dv_dq = SMatrix::<f32, 3, 4>::zeros();
    dv_dq.fixed_view_mut::<3, 3>(0, 0).copy_from(&dv_dqv);
    dv_dq.fixed_view_mut::<3, 1>(0, 3).copy_from(&dv_dqw);
    f.fixed_view_mut::<3, 4>(IDX_VEL, IDX_QUAT)
        .copy_from(&(dv_dq * dt));

    // ∂q/∂q = I + ½Ω(ω)·dt
    let (gx, gy, gz) = (omega.x, omega.y, omega.z);
    #[rustfmt::skip]
    let omega_mat = SMatrix::<f32, 4, 4>::new(
        0.0,  gz, -gy,  gx,
        -gz, 0.0,  gx,  gy,
         gy, -gx, 0.0,  gz,
        -gx, -gy, -gz, 0.0,
    );
    let dq_dq = SMatrix::<f32, 4, 4>::identity() + omega_mat * (0.5 * dt);
    f.fixed_view_mut::<4, 4>(IDX_QUAT, IDX_QUAT).copy_from(&dq_dq);

    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{pressure_to_altitude, GRAVITY};
    use crate::types::STATE_DIM;
    use approx::assert_abs_diff_eq;

    const REST_ACCEL: AccelData = AccelData {
        x: 0.0,
        y: 0.0,
        z: -1000.0,
    };

    fn default_filter() -> Ekf10d {
        Ekf10d::new(&FilterConfig::default()).unwrap()
    }

    fn quat_norm(filter: &Ekf10d) -> f32 {
        filter.quaternion().iter().map(|q| q * q).sum::<f32>().sqrt()
    }

    #[test]
    fn test_initial_state() {
        let filter = default_filter();
        assert_eq!(filter.quaternion(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(filter.position(), Vector3::zeros());
        assert_eq!(*filter.covariance(), StateMat::identity());
        assert_eq!(filter.get_state().covariance_trace, 10.0);
    }

    #[test]
    fn test_rest_scenario_velocity_stays_near_zero() {
        let mut filter = default_filter();
        filter
            .predict(0.01, GyroData::default(), REST_ACCEL)
            .unwrap();

        assert!(filter.velocity().norm() < 1e-3);
        assert!(filter.position().norm() < 1e-3);
        assert_eq!(filter.quaternion(), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_quaternion_stays_normalized() {
        let mut filter = default_filter();
        let rates = [
            GyroData::new(0.5, -0.2, 0.1),
            GyroData::new(3.0, 0.0, 0.0),
            GyroData::new(-10.0, 7.5, 2.0),
            GyroData::new(0.0, 0.0, 40.0),
        ];

        for step in 0..400 {
            let gyro = rates[step % rates.len()];
            let accel = AccelData::new(120.0, -40.0, -980.0);
            filter.predict(0.01, gyro, accel).unwrap();
            assert_abs_diff_eq!(quat_norm(&filter), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_constant_yaw_rate_integrates_heading() {
        let mut filter = default_filter();
        // 0.5 rad/s for 1 s
        for _ in 0..100 {
            filter
                .predict(0.01, GyroData::new(0.0, 0.0, 0.5), REST_ACCEL)
                .unwrap();
        }
        let [qx, qy, qz, qw] = filter.quaternion();
        let yaw = 2.0 * qz.atan2(qw);
        assert_abs_diff_eq!(yaw, 0.5, epsilon = 1e-2);
        assert_abs_diff_eq!(qx, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(qy, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_forward_accel_integrates_velocity_then_position() {
        let mut filter = default_filter();
        // 1 g forward on top of the rest reading
        filter
            .predict(0.1, GyroData::default(), AccelData::new(1000.0, 0.0, -1000.0))
            .unwrap();

        let v = filter.velocity();
        assert_abs_diff_eq!(v.x, 0.98066, epsilon = 1e-4);
        // Position uses the already-updated velocity
        assert_abs_diff_eq!(filter.position().x, v.x * 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_predict_leaves_covariance_by_default() {
        let mut filter = default_filter();
        let before = *filter.covariance();
        filter
            .predict(0.01, GyroData::new(0.3, 0.1, 0.0), REST_ACCEL)
            .unwrap();
        assert_eq!(*filter.covariance(), before);
    }

    #[test]
    fn test_predict_propagates_covariance_when_enabled() {
        let config = FilterConfig {
            propagate_covariance: true,
            ..FilterConfig::default()
        };
        let mut filter = Ekf10d::new(&config).unwrap();
        let trace_before = filter.covariance().trace();

        filter
            .predict(0.01, GyroData::default(), REST_ACCEL)
            .unwrap();

        let p = filter.covariance();
        // P00 = 1 + dt²·P33 + Q00
        assert_abs_diff_eq!(p[(0, 0)], 1.1001, epsilon = 1e-5);
        assert_abs_diff_eq!(p[(0, 3)], 0.01, epsilon = 1e-6);
        assert_abs_diff_eq!(*p, p.transpose(), epsilon = 1e-5);
        assert!(p.trace() > trace_before);
    }

    #[test]
    fn test_rejects_bad_time_step() {
        let mut filter = default_filter();
        let before = *filter.state();

        for dt in [0.0, -0.01, f32::NAN, f32::INFINITY] {
            let result = filter.predict(dt, GyroData::default(), REST_ACCEL);
            assert!(matches!(result, Err(FilterError::InvalidTimeStep(_))));
            let result = filter.update(dt, 101_325.0, REST_ACCEL, GyroData::default());
            assert!(matches!(result, Err(FilterError::InvalidTimeStep(_))));
        }
        assert_eq!(*filter.state(), before);
    }

    #[test]
    fn test_rejects_non_finite_samples() {
        let mut filter = default_filter();
        assert_eq!(
            filter.predict(0.01, GyroData::new(f32::NAN, 0.0, 0.0), REST_ACCEL),
            Err(FilterError::NonFiniteInput("gyro"))
        );
        assert_eq!(
            filter.update(0.1, f32::NAN, REST_ACCEL, GyroData::default()),
            Err(FilterError::NonFiniteInput("pressure"))
        );
        assert_eq!(
            filter.update(0.1, 0.0, REST_ACCEL, GyroData::default()),
            Err(FilterError::InvalidPressure(0.0))
        );
    }

    #[test]
    fn test_degenerate_update_is_noop() {
        let mut filter = Ekf10d::from_parts(
            Ekf10d::initial_state(),
            StateMat::identity(),
            StateMat::zeros(),
            MeasureMat::zeros(),
        );
        filter.set_velocity(Vector3::new(0.2, -0.1, 0.05)).unwrap();
        filter
            .predict(0.01, GyroData::new(0.1, 0.2, 0.3), REST_ACCEL)
            .unwrap();

        let state_before = *filter.state();
        let covariance_before = *filter.covariance();

        let result = filter.update(0.01, 100_000.0, AccelData::new(50.0, 20.0, -990.0), GyroData::default());

        assert!(matches!(result, Err(FilterError::NumericalDegeneracy(_))));
        assert_eq!(*filter.state(), state_before);
        assert_eq!(*filter.covariance(), covariance_before);
        assert_eq!(filter.get_state().skipped_updates, 1);
        assert_eq!(filter.get_state().update_count, 0);

        // Anchor still holds the set velocity, not the post-predict one
        assert_eq!(filter.velocity_anchor, Vector3::new(0.2, -0.1, 0.05));
        assert_ne!(filter.velocity_anchor, filter.velocity());
    }

    #[test]
    fn test_skipped_update_keeps_velocity_anchor() {
        // Same motion, one filter loses an update to degeneracy first
        let mut healthy = default_filter();
        let mut skipped = default_filter();
        for filter in [&mut healthy, &mut skipped] {
            filter.set_velocity(Vector3::new(0.2, -0.1, 0.05)).unwrap();
            filter
                .predict(0.01, GyroData::default(), AccelData::new(500.0, 0.0, -1000.0))
                .unwrap();
        }

        // Make S indefinite for one update, then restore
        let measurement_noise = skipped.measurement_noise;
        skipped.measurement_noise = -MeasureMat::identity() * 1e3;
        assert!(matches!(
            skipped.update(0.01, 101_325.0, REST_ACCEL, GyroData::default()),
            Err(FilterError::NumericalDegeneracy(_))
        ));
        skipped.measurement_noise = measurement_noise;

        healthy
            .update(0.01, 101_325.0, REST_ACCEL, GyroData::default())
            .unwrap();
        skipped
            .update(0.01, 101_325.0, REST_ACCEL, GyroData::default())
            .unwrap();

        // Identical Δv/dt means identical accel residual and correction
        assert_eq!(*skipped.state(), *healthy.state());
        assert_eq!(*skipped.covariance(), *healthy.covariance());
    }

    #[test]
    fn test_predict_keeps_unit_quaternion_for_extreme_inputs() {
        let mut filter = default_filter();
        filter
            .predict(1.0, GyroData::new(1e20, 0.0, 0.0), REST_ACCEL)
            .unwrap();
        assert_abs_diff_eq!(quat_norm(&filter), 1.0, epsilon = 1e-5);

        let rates = [
            GyroData::new(1.0, 0.0, 0.0),
            GyroData::new(-3e5, 2e10, 7.0),
            GyroData::new(f32::MAX, f32::MAX, -f32::MAX),
        ];
        for gyro in rates {
            for dt in [1e-3, 1.0, 1e6, 1e30, f32::MAX] {
                let before = *filter.state();
                match filter.predict(dt, gyro, REST_ACCEL) {
                    Ok(()) => {}
                    // Position/velocity overflow is refused as a whole
                    Err(FilterError::NonFiniteResult(_)) => {
                        assert_eq!(*filter.state(), before)
                    }
                    Err(e) => panic!("unexpected error {e}"),
                }
                assert_abs_diff_eq!(quat_norm(&filter), 1.0, epsilon = 1e-5);
                assert!(filter.state().iter().all(|v| v.is_finite()));
            }
        }
    }

    #[test]
    fn test_set_quaternion_rejects_degenerate() {
        let mut filter = default_filter();
        assert_eq!(
            filter.set_quaternion([0.0; 4]),
            Err(FilterError::DegenerateQuaternion)
        );
        assert_eq!(
            filter.set_quaternion([f32::NAN, 0.0, 0.0, 1.0]),
            Err(FilterError::DegenerateQuaternion)
        );
        assert_eq!(filter.quaternion(), [0.0, 0.0, 0.0, 1.0]);

        // Still usable afterwards
        filter
            .predict(0.01, GyroData::new(0.1, 0.0, 0.0), REST_ACCEL)
            .unwrap();
        assert!(filter.state().iter().all(|v| v.is_finite()));

        assert_eq!(
            filter.set_velocity(Vector3::new(f32::INFINITY, 0.0, 0.0)),
            Err(FilterError::NonFiniteInput("velocity"))
        );
        assert_eq!(
            filter.set_position(Vector3::new(0.0, f32::NAN, 0.0)),
            Err(FilterError::NonFiniteInput("position"))
        );
    }

    #[test]
    fn test_set_quaternion_normalizes_large_values() {
        let mut filter = default_filter();
        filter.set_quaternion([0.0, 0.0, 3e38, 3e38]).unwrap();
        assert_abs_diff_eq!(quat_norm(&filter), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_subnormal_update_interval_is_rejected() {
        let mut filter = default_filter();
        filter
            .predict(0.01, GyroData::default(), AccelData::new(1000.0, 0.0, -1000.0))
            .unwrap();
        let state_before = *filter.state();
        let covariance_before = *filter.covariance();

        let tiny_dt = f32::from_bits(1);
        assert_eq!(
            filter.update(tiny_dt, 101_325.0, REST_ACCEL, GyroData::default()),
            Err(FilterError::NonFiniteResult("residual"))
        );
        assert_eq!(*filter.state(), state_before);
        assert_eq!(*filter.covariance(), covariance_before);
        assert_eq!(filter.get_state().update_count, 0);
    }

    #[test]
    fn test_zero_covariance_and_noise_is_degenerate_at_first_pivot() {
        let mut filter = Ekf10d::from_parts(
            Ekf10d::initial_state(),
            StateMat::zeros(),
            StateMat::zeros(),
            MeasureMat::zeros(),
        );
        assert_eq!(
            filter.update(0.01, 101_325.0, REST_ACCEL, GyroData::default()),
            Err(FilterError::NumericalDegeneracy(
                crate::error::CholeskyError::NotPositiveDefinite { pivot: 0 }
            ))
        );
    }

    #[test]
    fn test_zero_residual_gives_zero_correction() {
        let mut filter = default_filter();
        // Reference model predicts (0, 0, +g) at rest with identity attitude
        let az_mg = GRAVITY / (9.8066 / 1000.0);
        let before = *filter.state();

        filter
            .update(0.01, 101_325.0, AccelData::new(0.0, 0.0, az_mg), GyroData::new(0.4, -0.3, 0.2))
            .unwrap();

        assert_abs_diff_eq!(*filter.state(), before, epsilon = 1e-5);
        // Covariance still contracts
        assert!(filter.covariance().trace() < 10.0);
    }

    #[test]
    fn test_altitude_update_splits_by_variance() {
        let mut filter = default_filter();
        let pressure = 100_000.0;
        let altitude = pressure_to_altitude(pressure, 101_325.0);

        filter
            .update(0.01, pressure, REST_ACCEL, GyroData::default())
            .unwrap();

        // P(pz) = 1, R(alt) = 1 => gain 0.5
        assert_abs_diff_eq!(filter.position().z, altitude * 0.5, epsilon = 1e-2);
        assert_abs_diff_eq!(filter.covariance()[(2, 2)], 0.5, epsilon = 1e-5);
        assert_eq!(filter.get_state().update_count, 1);
    }

    #[test]
    fn test_rest_cycle_stays_put() {
        let mut filter = default_filter();
        for _ in 0..10 {
            for _ in 0..10 {
                filter
                    .predict(0.01, GyroData::default(), REST_ACCEL)
                    .unwrap();
            }
            filter
                .update(0.1, 101_325.0, REST_ACCEL, GyroData::default())
                .unwrap();
        }

        assert!(filter.velocity().norm() < 1e-2);
        assert!(filter.position().norm() < 1e-2);
        assert_abs_diff_eq!(filter.quaternion()[3], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_joseph_form_keeps_covariance_symmetric() {
        let config = FilterConfig {
            covariance_update: CovarianceUpdate::Joseph,
            measurement_model: MeasurementModel::GravityConsistent,
            ..FilterConfig::default()
        };
        let mut filter = Ekf10d::new(&config).unwrap();
        filter.set_quaternion([0.1, -0.2, 0.05, 0.97]).unwrap();
        let accel = AccelData::new(30.0, -15.0, -995.0);

        for i in 0..20 {
            filter
                .predict(0.01, GyroData::new(0.05, 0.02, -0.01), accel)
                .unwrap();
            filter
                .update(0.01, 101_300.0 - i as f32, accel, GyroData::default())
                .unwrap();
        }

        let p = filter.covariance();
        assert_abs_diff_eq!(*p, p.transpose(), epsilon = 1e-4);
        for i in 0..STATE_DIM {
            assert!(p[(i, i)] > -1e-6);
        }
        assert_abs_diff_eq!(
            filter.quaternion().iter().map(|q| q * q).sum::<f32>(),
            1.0,
            epsilon = 1e-2
        );
    }

    #[test]
    fn test_consistent_model_has_no_accel_residual_when_tilted() {
        let config = FilterConfig {
            measurement_model: MeasurementModel::GravityConsistent,
            ..FilterConfig::default()
        };
        let mut filter = Ekf10d::new(&config).unwrap();
        filter.set_quaternion([0.08, -0.05, 0.0, 1.0]).unwrap();
        let quat_before = filter.quaternion();

        // Predict and update see the same specific force, so Δv/dt reproduces it
        for _ in 0..5 {
            filter
                .predict(0.01, GyroData::default(), REST_ACCEL)
                .unwrap();
            filter
                .update(0.01, 101_325.0, REST_ACCEL, GyroData::default())
                .unwrap();
        }

        for (after, before) in filter.quaternion().iter().zip(quat_before.iter()) {
            assert_abs_diff_eq!(*after, *before, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_snapshot_serializes() {
        let filter = default_filter();
        let json = serde_json::to_value(filter.get_state()).unwrap();
        assert_eq!(json["quaternion"][3], 1.0);
        assert_eq!(json["skipped_updates"], 0);
    }
}
