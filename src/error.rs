use thiserror::Error;

/// Cholesky factorization failure
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CholeskyError {
    #[error("Matrix not positive definite (pivot {pivot} <= 0)")]
    NotPositiveDefinite { pivot: usize },
}

/// Filter error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid time step: {0} (must be finite and > 0)")]
    InvalidTimeStep(f32),

    #[error("Non-finite input: {0}")]
    NonFiniteInput(&'static str),

    #[error("Invalid pressure: {0} Pa")]
    InvalidPressure(f32),

    #[error("Innovation covariance degenerate, update skipped: {0}")]
    NumericalDegeneracy(#[from] CholeskyError),

    #[error("Degenerate quaternion (zero or non-finite norm)")]
    DegenerateQuaternion,

    #[error("Step produced a non-finite {0}, filter left unchanged")]
    NonFiniteResult(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Sensor driver errors, generic over the transport error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError<E: std::fmt::Debug> {
    #[error("I2C transport failed: {0:?}")]
    Transport(E),

    #[error("Read length {0} exceeds transaction limit")]
    ReadTooLong(usize),

    #[error("Unexpected chip id 0x{found:02X} (expected 0x{expected:02X})")]
    UnexpectedChipId { expected: u8, found: u8 },
}
