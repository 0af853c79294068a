//! Desktop simulator for the aquamon telemetry agent.
//!
//! Runs the same agent loop as the firmware, but over `std::net` sockets and
//! with synthetic temperature readings, so the upload and clock sync paths can
//! be exercised against a real server without hardware.
//!
//! # Usage
//!
//! ```text
//! aquamon-simulator [config.json]
//! ```
//!
//! Without a config file the simulator posts to `http://127.0.0.1:3000`.
//!
//! | Variable              | Effect                                        |
//! |-----------------------|-----------------------------------------------|
//! | `RUST_LOG`            | Log filter (default `info`)                   |
//! | `AQUAMON_SIM_WIFI`    | `fail` makes the simulated association fail   |

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use embedded_hal_async::delay::DelayNs;
use log::{error, info};

use aquamon_core::http::{Response, parse_response};
use aquamon_core::{
    Association, AssociationStatus, CLOCK, Config, HttpTransport, LinkObserver, NetworkLink,
    SensorError, StatusCode, TelemetryAgent, TemperatureReadings, TemperatureSensor,
    UploadSession,
};

const DEFAULT_CONFIG: &str = r#"{
    "internet": { "ssid": "simulated", "password": "simulated" },
    "server": { "base_address": "http://127.0.0.1:3000" },
    "schedule": { "sample_interval_secs": 2, "upload_interval_secs": 20 }
}"#;

/// Socket connect/read/write timeout.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Association polls before the simulated radio reports a result.
const ASSOCIATION_POLLS: u32 = 3;

// ---------------------------------------------------------------------------
// HTTP over std::net
// ---------------------------------------------------------------------------

struct StdTransport {
    stream: Option<TcpStream>,
}

impl StdTransport {
    fn new() -> Self {
        Self { stream: None }
    }
}

impl HttpTransport for StdTransport {
    async fn end(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    async fn begin(&mut self, host: &str, port: u16) -> Result<(), StatusCode> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|_| StatusCode::CONNECTION_REFUSED)?;

        for addr in addrs {
            let Ok(stream) = TcpStream::connect_timeout(&addr, SOCKET_TIMEOUT) else {
                continue;
            };
            stream
                .set_read_timeout(Some(SOCKET_TIMEOUT))
                .and_then(|_| stream.set_write_timeout(Some(SOCKET_TIMEOUT)))
                .map_err(|_| StatusCode::CONNECTION_REFUSED)?;
            self.stream = Some(stream);
            return Ok(());
        }
        Err(StatusCode::CONNECTION_REFUSED)
    }

    async fn exchange(&mut self, head: &[u8], body: &[u8]) -> Response {
        let Some(stream) = self.stream.as_mut() else {
            return Response::failed(StatusCode::NOT_CONNECTED);
        };
        if stream.write_all(head).is_err() {
            return Response::failed(StatusCode::SEND_HEADER_FAILED);
        }
        if stream.write_all(body).is_err() {
            return Response::failed(StatusCode::SEND_PAYLOAD_FAILED);
        }

        let mut raw = Vec::new();
        if let Err(e) = stream.read_to_end(&mut raw) {
            if raw.is_empty() {
                let status = match e.kind() {
                    ErrorKind::WouldBlock | ErrorKind::TimedOut => StatusCode::READ_TIMEOUT,
                    _ => StatusCode::CONNECTION_LOST,
                };
                return Response::failed(status);
            }
        }
        parse_response(&raw)
    }
}

// ---------------------------------------------------------------------------
// Simulated radio
// ---------------------------------------------------------------------------

struct SimulatedAssociation {
    fail: bool,
    polls: u32,
}

impl SimulatedAssociation {
    fn from_env() -> Self {
        let fail = std::env::var("AQUAMON_SIM_WIFI").is_ok_and(|v| v == "fail");
        Self { fail, polls: 0 }
    }
}

impl Association for SimulatedAssociation {
    async fn begin(&mut self, ssid: &str, _password: &str) {
        info!("Simulated radio associating with \"{}\"", ssid);
        self.polls = 0;
    }

    fn status(&mut self) -> AssociationStatus {
        if self.polls < ASSOCIATION_POLLS {
            self.polls += 1;
            return AssociationStatus::Connecting;
        }
        if self.fail {
            AssociationStatus::ConnectFailed
        } else {
            AssociationStatus::Connected
        }
    }
}

struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// Prints connection progress on one line.
struct ConsoleObserver;

impl LinkObserver for ConsoleObserver {
    fn on_connecting(&mut self) {
        eprint!(".");
    }

    fn on_success(&mut self) {
        eprintln!();
    }

    fn on_fail(&mut self) {
        eprintln!();
        error!("Could not associate, giving up");
    }
}

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Synthetic tank and ambient temperatures that drift over time.
struct SyntheticProbes {
    started: Instant,
}

impl TemperatureSensor for SyntheticProbes {
    async fn read(&mut self) -> Result<TemperatureReadings, SensorError> {
        let t = self.started.elapsed().as_secs_f64();

        // Tank: 24–26 °C, slow heater cycle
        let tank = 25.0 + 1.0 * (t / 240.0).sin() + 0.1 * (t / 17.0).cos();
        // Room: 19–23 °C
        let room = 21.0 + 2.0 * (t / 600.0).sin() + 0.3 * (t / 29.0).cos();

        Ok(TemperatureReadings {
            reading1: tank as f32,
            reading2: room as f32,
        })
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_text = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                error!("Cannot read config {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => DEFAULT_CONFIG.to_owned(),
    };

    let config = match Config::from_json(&config_text) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    embassy_futures::block_on(run(&config))
}

async fn run(config: &Config<'_>) -> ExitCode {
    let started = Instant::now();
    let schedule = config.schedule;

    let mut link = NetworkLink::new(
        SimulatedAssociation::from_env(),
        StdDelay,
        schedule.connect_poll_interval_ms,
    );

    let session = match UploadSession::new(StdTransport::new(), &config.server) {
        Ok(session) => session,
        Err(e) => {
            error!("Invalid server address: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let endpoint = session.endpoint();
    info!("Posting to {}:{}", endpoint.host, endpoint.port);

    let mut agent: TelemetryAgent<'_, _, _> =
        TelemetryAgent::new(session, SyntheticProbes { started }, &CLOCK, schedule);

    let interval = Duration::from_secs(u64::from(schedule.sample_interval_secs));
    loop {
        if !link.is_connected() && link.connect(&config.internet, ConsoleObserver).await.is_err()
        {
            return ExitCode::FAILURE;
        }

        let tick_start = Instant::now();
        let report = agent.tick(started.elapsed().as_secs()).await;
        info!(
            "t={} buffered={} sample={:?} upload={:?}",
            CLOCK.timestamp(),
            agent.buffer().live_len(),
            report.sample,
            report.upload
        );

        if let Some(rest) = interval.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
