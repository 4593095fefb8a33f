//! Sensor driver boundary
//!
//! The filter never touches registers. A layer above this module is expected
//! to turn raw register bytes into rad/s, milli-g and Pa before calling
//! `Ekf10d::predict` / `Ekf10d::update`.

pub mod bmi088;

pub use bmi088::Bmi088;

/// Byte transport for an I2C bus
///
/// `write` sends `data` to the bus as one transaction. `write_read` sends `data`
/// then reads `rx.len()` bytes back without releasing the bus. The device
/// address travels in the first byte of `data`.
pub trait I2cTransport {
    type Error: std::fmt::Debug;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    fn write_read(&mut self, data: &[u8], rx: &mut [u8]) -> Result<(), Self::Error>;
}

impl<T: I2cTransport + ?Sized> I2cTransport for &mut T {
    type Error = T::Error;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write(data)
    }

    fn write_read(&mut self, data: &[u8], rx: &mut [u8]) -> Result<(), Self::Error> {
        (**self).write_read(data, rx)
    }
}
