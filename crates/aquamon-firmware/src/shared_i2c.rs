//! One async I2C bus shared by the power chip and both probes.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

/// Handle to a bus behind an embassy [`Mutex`].
///
/// The lock is held for one whole transaction and released across awaits, so
/// the SHT40 measurement delay does not block the other devices.
pub struct SharedI2c<'a, B> {
    bus: &'a Mutex<CriticalSectionRawMutex, B>,
}

impl<'a, B> SharedI2c<'a, B> {
    pub const fn new(bus: &'a Mutex<CriticalSectionRawMutex, B>) -> Self {
        Self { bus }
    }
}

impl<B: ErrorType> ErrorType for SharedI2c<'_, B> {
    type Error = B::Error;
}

impl<B: I2c> I2c for SharedI2c<'_, B> {
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.lock().await.read(address, read).await
    }

    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.bus.lock().await.write(address, write).await
    }

    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.bus.lock().await.write_read(address, write, read).await
    }

    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.bus.lock().await.transaction(address, operations).await
    }
}
