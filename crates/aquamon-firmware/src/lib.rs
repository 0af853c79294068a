//! ESP32-S3 firmware-specific modules for aquamon
//!
//! This crate contains the hardware side of the telemetry agent: the esp-radio
//! WiFi association, HTTP over the embassy-net TCP stack, the SHT40 probe
//! pair, and the credentials baked in at build time.

#![no_std]

extern crate alloc;

pub mod hardware;
pub mod probes;
pub mod secrets;
pub mod shared_i2c;
pub mod transport;
pub mod wifi;
