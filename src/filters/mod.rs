pub mod cholesky;
pub mod ekf_10d;
pub mod measurement;

pub use cholesky::invert_spd;
pub use ekf_10d::{Ekf10d, Ekf10dState};
