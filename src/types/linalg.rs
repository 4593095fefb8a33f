//! Linear algebra type system for the barometric/inertial filter
//!
//! Provides compile-time dimension checking and clean type aliases.
//! Everything here is a fixed-size, stack-resident `nalgebra` matrix.

use nalgebra::{Matrix3, SMatrix, SVector};

// ===== State Dimensions =====
pub const STATE_DIM: usize = 10;

// ===== Measurement Dimensions =====
pub const MEASURE_DIM: usize = 7; // altitude, accel (3), gyro (3)

// ===== State layout =====
pub const IDX_POS: usize = 0;
pub const IDX_VEL: usize = 3;
pub const IDX_QUAT: usize = 6;

// ===== Filter Types =====
pub type StateVec = SVector<f32, STATE_DIM>;
pub type StateMat = SMatrix<f32, STATE_DIM, STATE_DIM>;

// Measurement types
pub type MeasureVec = SVector<f32, MEASURE_DIM>;
pub type MeasureMat = SMatrix<f32, MEASURE_DIM, MEASURE_DIM>;

// Kalman gain / Jacobian types
pub type KalmanGain = SMatrix<f32, STATE_DIM, MEASURE_DIM>; // 10×7
pub type Jacobian = SMatrix<f32, MEASURE_DIM, STATE_DIM>; // 7×10

pub type RotationMat = Matrix3<f32>;
