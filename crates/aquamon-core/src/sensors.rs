//! Temperature acquisition seam.
//!
//! The agent only needs two readings per sample. Drivers live in the firmware
//! (SHT40 pair) and the simulator (synthetic).

use core::future::Future;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
}

/// One reading from each probe, °C.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReadings {
    pub reading1: f32,
    pub reading2: f32,
}

/// A source of paired temperature readings.
pub trait TemperatureSensor {
    /// Read both probes.
    fn read(&mut self) -> impl Future<Output = Result<TemperatureReadings, SensorError>>;
}
