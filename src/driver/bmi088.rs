/// BMI088 register access over an injected I2C transport
///
/// The accelerometer and gyroscope dies answer on separate addresses. Both
/// auto-increment the register pointer, so a burst read of N bytes starting at
/// `start` returns registers start..start+N in one transaction.
use log::trace;

use super::I2cTransport;
use crate::error::DriverError;

/// Accelerometer die, SDO1 pulled low
pub const ACCEL_ADDR_DEFAULT: u8 = 0x18;
/// Accelerometer die, SDO1 pulled high
pub const ACCEL_ADDR_ALT: u8 = 0x19;
/// Gyroscope die, SDO2 pulled low
pub const GYRO_ADDR_DEFAULT: u8 = 0x68;
/// Gyroscope die, SDO2 pulled high
pub const GYRO_ADDR_ALT: u8 = 0x69;

pub const ACC_CHIP_ID_REG: u8 = 0x00;
pub const ACC_CHIP_ID: u8 = 0x1E;
pub const GYRO_CHIP_ID_REG: u8 = 0x00;
pub const GYRO_CHIP_ID: u8 = 0x0F;

/// Largest burst the 16-bit transfer length of the bus layer allows
pub const MAX_READ_LEN: usize = u16::MAX as usize;

pub struct Bmi088<T> {
    transport: T,
    accel_addr: u8,
    gyro_addr: u8,
}

impl<T: I2cTransport> Bmi088<T> {
    /// Side effect free constructor with default addresses
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            accel_addr: ACCEL_ADDR_DEFAULT,
            gyro_addr: GYRO_ADDR_DEFAULT,
        }
    }

    pub fn with_accel_addr(mut self, addr: u8) -> Self {
        self.accel_addr = addr;
        self
    }

    pub fn with_gyro_addr(mut self, addr: u8) -> Self {
        self.gyro_addr = addr;
        self
    }

    pub fn accel_addr(&self) -> u8 {
        self.accel_addr
    }

    pub fn gyro_addr(&self) -> u8 {
        self.gyro_addr
    }

    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn release(self) -> T {
        self.transport
    }

    /// Burst-read `rx.len()` registers from `start_register`
    pub fn read_registers(
        &mut self,
        device_address: u8,
        start_register: u8,
        rx: &mut [u8],
    ) -> Result<(), DriverError<T::Error>> {
        if rx.len() > MAX_READ_LEN {
            return Err(DriverError::ReadTooLong(rx.len()));
        }

        trace!(
            "bmi088: read 0x{:02X}[0x{:02X}..+{}]",
            device_address,
            start_register,
            rx.len()
        );
        self.transport
            .write_read(&[device_address, start_register], rx)
            .map_err(DriverError::Transport)
    }

    /// Write one register
    pub fn write_register(
        &mut self,
        device_address: u8,
        register: u8,
        value: u8,
    ) -> Result<(), DriverError<T::Error>> {
        trace!(
            "bmi088: write 0x{:02X}[0x{:02X}] = 0x{:02X}",
            device_address,
            register,
            value
        );
        self.transport
            .write(&[device_address, register, value])
            .map_err(DriverError::Transport)
    }

    pub fn read_accel_chip_id(&mut self) -> Result<u8, DriverError<T::Error>> {
        let mut id = [0u8; 1];
        self.read_registers(self.accel_addr, ACC_CHIP_ID_REG, &mut id)?;
        Ok(id[0])
    }

    pub fn read_gyro_chip_id(&mut self) -> Result<u8, DriverError<T::Error>> {
        let mut id = [0u8; 1];
        self.read_registers(self.gyro_addr, GYRO_CHIP_ID_REG, &mut id)?;
        Ok(id[0])
    }

    /// Check both dies answer with their expected chip ids
    pub fn verify_chip_ids(&mut self) -> Result<(), DriverError<T::Error>> {
        let found = self.read_accel_chip_id()?;
        if found != ACC_CHIP_ID {
            return Err(DriverError::UnexpectedChipId {
                expected: ACC_CHIP_ID,
                found,
            });
        }

        let found = self.read_gyro_chip_id()?;
        if found != GYRO_CHIP_ID {
            return Err(DriverError::UnexpectedChipId {
                expected: GYRO_CHIP_ID,
                found,
            });
        }

        Ok(())
    }
}
