//! Fakes for the transport, radio, delay and sensor seams.

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use embedded_hal_async::delay::DelayNs;

use crate::config::Endpoint;
use crate::http::{Response, StatusCode};
use crate::link::{Association, AssociationStatus};
use crate::sensors::{SensorError, TemperatureReadings, TemperatureSensor};
use crate::session::HttpTransport;

pub use embassy_futures::block_on;

pub fn endpoint() -> Endpoint<'static> {
    Endpoint {
        host: "192.168.1.77",
        port: 3000,
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    /// `begin` fails with this code
    Refuse(StatusCode),
    Respond(Response),
}

impl Reply {
    pub fn status(code: i16) -> Self {
        Self::Respond(Response::failed(StatusCode(code)))
    }

    pub fn body(code: i16, body: &str) -> Self {
        Self::Respond(Response {
            status: StatusCode(code),
            body: body.to_string(),
        })
    }
}

pub struct RecordedRequest {
    pub head: String,
    pub body: String,
}

/// Replays scripted replies and records what was sent.
#[derive(Default)]
pub struct FakeTransport {
    script: VecDeque<Reply>,
    pub requests: Vec<RecordedRequest>,
    pub events: Vec<&'static str>,
    pub begins: usize,
    pub ends: usize,
}

impl FakeTransport {
    pub fn scripted(replies: &[Reply]) -> Self {
        Self {
            script: replies.iter().cloned().collect(),
            ..Self::default()
        }
    }
}

impl HttpTransport for FakeTransport {
    async fn end(&mut self) {
        self.ends += 1;
        self.events.push("end");
    }

    async fn begin(&mut self, _host: &str, _port: u16) -> Result<(), StatusCode> {
        self.begins += 1;
        self.events.push("begin");
        if let Some(Reply::Refuse(status)) = self.script.front() {
            let status = *status;
            self.script.pop_front();
            return Err(status);
        }
        Ok(())
    }

    async fn exchange(&mut self, head: &[u8], body: &[u8]) -> Response {
        self.requests.push(RecordedRequest {
            head: String::from_utf8_lossy(head).into_owned(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
        match self.script.pop_front() {
            Some(Reply::Respond(response)) => response,
            _ => Response::failed(StatusCode::NO_HTTP_SERVER),
        }
    }
}

/// Reports the scripted statuses in order, repeating the last one.
pub struct ScriptedAssociation {
    statuses: VecDeque<AssociationStatus>,
    last: AssociationStatus,
    pub begins: usize,
    pub begun_with: Option<String>,
}

impl ScriptedAssociation {
    pub fn new(statuses: &[AssociationStatus]) -> Self {
        Self {
            statuses: statuses.iter().copied().collect(),
            last: AssociationStatus::Idle,
            begins: 0,
            begun_with: None,
        }
    }
}

impl Association for ScriptedAssociation {
    async fn begin(&mut self, ssid: &str, _password: &str) {
        self.begins += 1;
        self.begun_with = Some(ssid.to_string());
    }

    fn status(&mut self) -> AssociationStatus {
        if let Some(status) = self.statuses.pop_front() {
            self.last = status;
        }
        self.last
    }
}

/// Returns immediately and totals the requested waits.
#[derive(Default)]
pub struct CountingDelay {
    pub calls: usize,
    pub total_ms: u64,
}

impl DelayNs for CountingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ms += u64::from(ns) / 1_000_000;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ms += u64::from(ms);
    }
}

pub struct FakeSensor {
    readings: TemperatureReadings,
    pub fail_next: bool,
}

impl FakeSensor {
    pub fn new(reading1: f32, reading2: f32) -> Self {
        Self {
            readings: TemperatureReadings { reading1, reading2 },
            fail_next: false,
        }
    }
}

impl TemperatureSensor for FakeSensor {
    async fn read(&mut self) -> Result<TemperatureReadings, SensorError> {
        if core::mem::take(&mut self.fail_next) {
            return Err(SensorError::ReadFailed {
                sensor: "fake",
                operation: "read",
                details: "scripted failure",
            });
        }
        Ok(self.readings)
    }
}
