//! Mapping from `embedded-hal` I2C errors to the core's [`BusError`].

use embedded_hal_async::i2c::{Error, ErrorKind};
use vitals_common::BusError;

/// Collapse a driver error to what the core cares about: did the device
/// answer at all.
pub fn map_i2c_error<E: Error>(error: E) -> BusError {
    match error.kind() {
        ErrorKind::NoAcknowledge(_) => BusError::Nack,
        _ => BusError::InvalidData,
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_async::i2c::NoAcknowledgeSource;

    use super::*;

    #[test]
    fn test_nack_maps_to_nack() {
        assert_eq!(
            map_i2c_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
            BusError::Nack
        );
    }

    #[test]
    fn test_other_faults_map_to_invalid_data() {
        assert_eq!(map_i2c_error(ErrorKind::ArbitrationLoss), BusError::InvalidData);
        assert_eq!(map_i2c_error(ErrorKind::Bus), BusError::InvalidData);
    }
}
