//! Hardware-independent core library for aquamon
//!
//! This crate contains all platform-agnostic logic of the aquarium telemetry
//! agent: the sample buffer, JSON batch encoding, the HTTP upload session and
//! clock sync, the WiFi association state machine, and the loop that ties
//! them together. Hardware is reached only through the [`session::HttpTransport`],
//! [`link::Association`] and [`sensors::TemperatureSensor`] traits.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod agent;
pub mod batch;
pub mod clock;
pub mod config;
pub mod http;
pub mod link;
pub mod sample;
pub mod sensors;
pub mod session;

#[cfg(test)]
mod testing;

pub use agent::{SampleOutcome, TelemetryAgent, TickReport};
pub use batch::{BATCH_TEXT_CAPACITY, BatchEncoder, EncodeError};
pub use clock::{CLOCK, Clock};
pub use config::{Config, InternetConfig, Schedule, ServerConfig};
pub use http::StatusCode;
pub use link::{Association, AssociationStatus, LinkError, LinkObserver, LinkState, NetworkLink};
pub use sample::{BATCH_CAPACITY, SampleBuffer, SampleRecord, TelemetryBuffer};
pub use sensors::{SensorError, TemperatureReadings, TemperatureSensor};
pub use session::{HttpTransport, SyncError, UploadSession};
