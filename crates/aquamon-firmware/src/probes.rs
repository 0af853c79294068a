//! The two SHT40 probes, one at each of the sensor's two I2C addresses.

use aquamon_core::{SensorError, TemperatureReadings, TemperatureSensor};
use embedded_hal_async::i2c::I2c;
use log::error;
use sht4x::{Address, Precision, Sht4xAsync};

pub struct Sht40Pair<I> {
    first: Sht4xAsync<I, embassy_time::Delay>,
    second: Sht4xAsync<I, embassy_time::Delay>,
}

impl<I: I2c> Sht40Pair<I> {
    /// `first` is the 0x44 part, `second` the 0x45 part.
    pub fn new(first: I, second: I) -> Self {
        Self {
            first: Sht4xAsync::new_with_address(first, Address::Address0x44),
            second: Sht4xAsync::new_with_address(second, Address::Address0x45),
        }
    }
}

async fn measure<I: I2c>(
    probe: &mut Sht4xAsync<I, embassy_time::Delay>,
    name: &'static str,
) -> Result<f32, SensorError> {
    let measurement = probe
        .measure(Precision::High, &mut embassy_time::Delay)
        .await
        .map_err(|e| {
            error!("{} measurement failed: {:?}", name, e);
            SensorError::ReadFailed {
                sensor: name,
                operation: "measure temperature",
                details: "I2C communication error or sensor not responding",
            }
        })?;
    Ok(measurement.temperature_celsius().to_num::<f32>())
}

impl<I: I2c> TemperatureSensor for Sht40Pair<I> {
    async fn read(&mut self) -> Result<TemperatureReadings, SensorError> {
        let reading1 = measure(&mut self.first, "SHT40@0x44").await?;
        let reading2 = measure(&mut self.second, "SHT40@0x45").await?;
        Ok(TemperatureReadings { reading1, reading2 })
    }
}
