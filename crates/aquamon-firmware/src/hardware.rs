//! Board bring-up: the I2C bus and the power rails feeding the probes.

use axp2101_embedded::AsyncAxp2101;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use esp_hal::{i2c::master::Config as I2cConfig, time::Rate};
use log::{info, warn};
use static_cell::StaticCell;

use crate::shared_i2c::SharedI2c;

pub type I2cBus = esp_hal::i2c::master::I2c<'static, esp_hal::Async>;
pub type BusDevice = SharedI2c<'static, I2cBus>;

/// Create the I2C peripheral at 400 kHz.
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO12<'static>,
    scl: esp_hal::peripherals::GPIO11<'static>,
) -> Result<I2cBus, esp_hal::i2c::master::ConfigError> {
    Ok(
        esp_hal::i2c::master::I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(400)))?
            .with_sda(sda)
            .with_scl(scl)
            .into_async(),
    )
}

/// Move the bus into a static so devices can share it.
pub fn share_i2c_bus(bus: I2cBus) -> &'static AsyncMutex<CriticalSectionRawMutex, I2cBus> {
    static I2C0_BUS: StaticCell<AsyncMutex<CriticalSectionRawMutex, I2cBus>> = StaticCell::new();
    I2C0_BUS.init(AsyncMutex::new(bus))
}

/// Switch on the LDO rails the probe port hangs off.
///
/// Failures are logged, not fatal: on boards without a PMIC the rails are
/// already up and the probes will still answer.
pub async fn power_up_probes(device: BusDevice) {
    info!("Configuring power management");
    let mut pmic = AsyncAxp2101::new(device);

    if let Err(e) = pmic.init().await {
        warn!("Power init failed: {:?}", e);
        return;
    }
    if let Err(e) = pmic.enable_aldo1().await {
        warn!("ALDO1 enable failed: {:?}", e);
    }
    if let Err(e) = pmic.enable_bldo1().await {
        warn!("BLDO1 enable failed: {:?}", e);
    }
    info!("Power management ready");
}
