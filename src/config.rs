//! Filter configuration
//!
//! Defaults reproduce the reference bench initialisation: unit covariance,
//! 0.1 process noise, unit measurement noise.

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, FilterResult};
use crate::physics::SEA_LEVEL_PRESSURE_PA;
use crate::types::{MeasureMat, MeasureVec, StateMat, StateVec, MEASURE_DIM, STATE_DIM};

/// Covariance correction form used by the update step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceUpdate {
    /// P = (I − K·H)·P, no symmetrization
    #[default]
    Simple,
    /// P = (I − K·H)·P·(I − K·H)ᵀ + K·R·Kᵀ
    Joseph,
}

/// Gravity convention of the accelerometer rows of the measurement model
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementModel {
    /// ẑ = Rᵀ·(Δv/dt + g) with the reference gravity-term Jacobian
    #[default]
    Reference,
    /// ẑ = Rᵀ·(Δv/dt − g), the inverse of the predict mapping, Jacobian
    /// accel rows negated to match
    GravityConsistent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Initial covariance diagonal, state order [p, v, q]
    pub initial_covariance_diag: [f32; STATE_DIM],

    /// Process noise diagonal (only used when `propagate_covariance` is set)
    pub process_noise_diag: [f32; STATE_DIM],

    /// Measurement noise diagonal [altitude m², accel (m/s²)², gyro (rad/s)²]
    pub measurement_noise_diag: [f32; MEASURE_DIM],

    /// Reference pressure for the barometric formula [Pa]
    pub sea_level_pressure_pa: f32,

    /// Fold F·P·Fᵀ + Q into the covariance on every predict
    pub propagate_covariance: bool,

    pub covariance_update: CovarianceUpdate,

    pub measurement_model: MeasurementModel,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            initial_covariance_diag: [1.0; STATE_DIM],
            process_noise_diag: [0.1; STATE_DIM],
            measurement_noise_diag: [1.0; MEASURE_DIM],
            sea_level_pressure_pa: SEA_LEVEL_PRESSURE_PA,
            propagate_covariance: false,
            covariance_update: CovarianceUpdate::Simple,
            measurement_model: MeasurementModel::Reference,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> FilterResult<()> {
        if let Some(v) = self
            .initial_covariance_diag
            .iter()
            .chain(self.process_noise_diag.iter())
            .find(|v| !v.is_finite() || **v < 0.0)
        {
            return Err(FilterError::InvalidConfig(format!(
                "covariance / process noise entries must be finite and >= 0, got {v}"
            )));
        }

        if let Some(v) = self
            .measurement_noise_diag
            .iter()
            .find(|v| !v.is_finite() || **v <= 0.0)
        {
            return Err(FilterError::InvalidConfig(format!(
                "measurement noise entries must be finite and > 0, got {v}"
            )));
        }

        if !self.sea_level_pressure_pa.is_finite() || self.sea_level_pressure_pa <= 0.0 {
            return Err(FilterError::InvalidConfig(format!(
                "sea level pressure must be > 0, got {}",
                self.sea_level_pressure_pa
            )));
        }

        Ok(())
    }

    pub fn initial_covariance(&self) -> StateMat {
        StateMat::from_diagonal(&StateVec::from(self.initial_covariance_diag))
    }

    pub fn process_noise(&self) -> StateMat {
        StateMat::from_diagonal(&StateVec::from(self.process_noise_diag))
    }

    pub fn measurement_noise(&self) -> MeasureMat {
        MeasureMat::from_diagonal(&MeasureVec::from(self.measurement_noise_diag))
    }
}
