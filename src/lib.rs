//! Barometer-aided inertial navigation filter
//!
//! A 10-state EKF (position, velocity, attitude quaternion) driven by a 3-axis
//! gyroscope and accelerometer at IMU rate and corrected by barometric
//! altitude plus re-observed accel/gyro.
//!
//! ```no_run
//! use baro_ekf_rs::{AccelData, Ekf10d, FilterConfig, GyroData};
//!
//! let mut ekf = Ekf10d::new(&FilterConfig::default())?;
//! ekf.predict(0.01, GyroData::default(), AccelData::new(0.0, 0.0, -1000.0))?;
//! ekf.update(0.01, 101_325.0, AccelData::new(0.0, 0.0, -1000.0), GyroData::default())?;
//! # Ok::<(), baro_ekf_rs::FilterError>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod filters;
pub mod physics;
pub mod types;

pub use config::{CovarianceUpdate, FilterConfig, MeasurementModel};
pub use error::{CholeskyError, DriverError, FilterError, FilterResult};
pub use filters::{invert_spd, Ekf10d, Ekf10dState};
pub use physics::pressure_to_altitude;
pub use types::{AccelData, GyroData};
