//! MAX30205 clinical contact thermometer.
//!
//! The part is kept in shutdown and woken for one-shot conversions, which
//! maps onto the request/read cycle the temperature estimator expects.
//! A probe that does not acknowledge its address reads as the disconnected
//! sentinel rather than an error, the same way a one-wire probe reports a
//! missing sensor.

use embedded_hal_async::i2c::{Error, ErrorKind, I2c};
use vitals_common::BusError;
use vitals_common::ports::DISCONNECTED_CELSIUS;

use crate::bus::map_i2c_error;

/// Address with A0..A2 strapped to ground.
pub const DEFAULT_ADDRESS: u8 = 0x48;

pub mod reg {
    pub const TEMPERATURE: u8 = 0x00;
    pub const CONFIG: u8 = 0x01;
}

pub const CONFIG_SHUTDOWN: u8 = 0x01;
pub const CONFIG_ONE_SHOT: u8 = 0x80;

/// One LSB of the temperature register.
pub const CELSIUS_PER_LSB: f32 = 0.003_906_25;

/// Decode the two's complement temperature register (normal data format).
pub fn decode_celsius(raw: [u8; 2]) -> f32 { f32::from(i16::from_be_bytes(raw)) * CELSIUS_PER_LSB }

pub struct Max30205<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Max30205<I> {
    pub const fn new(i2c: I) -> Self { Self::with_address(i2c, DEFAULT_ADDRESS) }

    pub const fn with_address(
        i2c: I,
        address: u8,
    ) -> Self {
        Self { i2c, address }
    }

    /// Start a single conversion; the part returns to shutdown afterwards.
    pub async fn start_one_shot(&mut self) -> Result<(), BusError> {
        self.i2c
            .write(self.address, &[reg::CONFIG, CONFIG_SHUTDOWN | CONFIG_ONE_SHOT])
            .await
            .map_err(map_i2c_error)
    }

    /// Latest conversion result, or [`DISCONNECTED_CELSIUS`] when the probe
    /// does not answer.
    pub async fn read_celsius(&mut self) -> Result<f32, BusError> {
        let mut raw = [0u8; 2];
        match self.i2c.write_read(self.address, &[reg::TEMPERATURE], &mut raw).await {
            Ok(()) => Ok(decode_celsius(raw)),
            Err(e) if matches!(e.kind(), ErrorKind::NoAcknowledge(_)) => Ok(DISCONNECTED_CELSIUS),
            Err(e) => Err(map_i2c_error(e)),
        }
    }

    pub fn release(self) -> I { self.i2c }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{ErrorType, NoAcknowledgeSource, Operation};

    use super::*;

    struct FakeProbe {
        temperature: [u8; 2],
        config: u8,
        fault: Option<ErrorKind>,
    }

    impl FakeProbe {
        fn reading(raw: u16) -> Self {
            Self {
                temperature: raw.to_be_bytes(),
                config: 0,
                fault: None,
            }
        }
    }

    impl ErrorType for FakeProbe {
        type Error = ErrorKind;
    }

    impl I2c for FakeProbe {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if let Some(kind) = self.fault {
                return Err(kind);
            }
            assert_eq!(address, DEFAULT_ADDRESS);
            let mut register = 0;
            for operation in operations.iter_mut() {
                match operation {
                    Operation::Write([first, rest @ ..]) => {
                        register = *first;
                        if let [value] = rest {
                            self.config = *value;
                        }
                    }
                    Operation::Write([]) => {}
                    Operation::Read(buffer) => {
                        assert_eq!(register, reg::TEMPERATURE);
                        buffer.copy_from_slice(&self.temperature);
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode_celsius([0x19, 0x00]), 25.0);
        assert_eq!(decode_celsius([0x25, 0x40]), 37.25);
        assert_eq!(decode_celsius([0x24, 0x01]), 36.0 + CELSIUS_PER_LSB);
        assert_eq!(decode_celsius([0xFF, 0x00]), -1.0, "two's complement");
    }

    #[test]
    fn test_one_shot_sets_config() {
        let mut probe = Max30205::new(FakeProbe::reading(0));
        block_on(probe.start_one_shot()).unwrap();
        assert_eq!(probe.release().config, 0x81);
    }

    #[test]
    fn test_read_body_temperature() {
        let mut probe = Max30205::new(FakeProbe::reading(0x24C0));
        assert_eq!(block_on(probe.read_celsius()), Ok(36.75));
    }

    #[test]
    fn test_nack_reads_as_disconnected() {
        let mut fake = FakeProbe::reading(0x24C0);
        fake.fault = Some(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        let mut probe = Max30205::new(fake);
        assert_eq!(block_on(probe.read_celsius()), Ok(DISCONNECTED_CELSIUS));
        assert_eq!(block_on(probe.start_one_shot()), Err(BusError::Nack));
    }

    #[test]
    fn test_bus_fault_is_an_error() {
        let mut fake = FakeProbe::reading(0x24C0);
        fake.fault = Some(ErrorKind::Bus);
        let mut probe = Max30205::new(fake);
        assert_eq!(block_on(probe.read_celsius()), Err(BusError::InvalidData));
    }
}
