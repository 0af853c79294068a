//! HTTP upload session
//!
//! Owns the one connection resource. Every request first tears down whatever
//! the previous request left open, then opens a fresh connection to the
//! configured server. There is no keep-alive and only one request in flight.

use alloc::string::String;
use core::future::Future;

use log::{debug, error, info, warn};
use serde::Deserialize;
use thiserror_no_std::Error;

use crate::batch::BatchEncoder;
use crate::clock::Clock;
use crate::config::{ConfigError, Endpoint, ServerConfig, TIME_SYNC_PATH, UPLOAD_PATH};
use crate::http::{Method, Response, StatusCode, request_head};
use crate::sample::SampleBuffer;

const JSON_CONTENT_TYPE: (&str, &str) = ("Content-Type", "application/json");

/// The connection resource an [`UploadSession`] drives.
///
/// Implemented over `embassy-net` TCP on the device and `std::net` in the
/// simulator.
pub trait HttpTransport {
    /// Tear down the current connection. Must be harmless when nothing is open.
    fn end(&mut self) -> impl Future<Output = ()>;

    /// Open a fresh connection to `host:port`.
    ///
    /// A failure carries the negative transport code to report.
    fn begin(&mut self, host: &str, port: u16) -> impl Future<Output = Result<(), StatusCode>>;

    /// Write the request and read the response until the server closes.
    ///
    /// Transport failures come back as a [`Response`] with a negative status.
    fn exchange(&mut self, head: &[u8], body: &[u8]) -> impl Future<Output = Response>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    #[error("Time server returned no data")]
    NoResponse,
    #[error("Time server response is not a unix_time object")]
    Malformed,
    #[error("Time server reported the epoch as the current time")]
    ZeroTimestamp,
}

#[derive(Deserialize)]
struct TimeResponse {
    unix_time: u32,
}

pub struct UploadSession<'a, T> {
    transport: T,
    endpoint: Endpoint<'a>,
    encoder: BatchEncoder,
    body: String,
}

impl<'a, T: HttpTransport> UploadSession<'a, T> {
    pub fn new(transport: T, server: &ServerConfig<'a>) -> Result<Self, ConfigError> {
        Ok(Self::with_endpoint(transport, server.endpoint()?))
    }

    pub fn with_endpoint(transport: T, endpoint: Endpoint<'a>) -> Self {
        Self {
            transport,
            endpoint,
            encoder: BatchEncoder::new(),
            body: String::new(),
        }
    }

    pub fn endpoint(&self) -> Endpoint<'a> {
        self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// POST `body` as JSON to `path` and return the status unmodified.
    ///
    /// The caller decides what counts as success.
    pub async fn post(&mut self, path: &str, body: &str) -> StatusCode {
        send(
            &mut self.transport,
            self.endpoint,
            Method::Post,
            path,
            body.as_bytes(),
        )
        .await
        .status
    }

    /// GET `path` and return the body.
    ///
    /// `None` when no HTTP exchange happened or the body is empty; it must not
    /// be parsed.
    pub async fn get(&mut self, path: &str) -> Option<&str> {
        let response = send(&mut self.transport, self.endpoint, Method::Get, path, &[]).await;
        self.body = response.body;

        if response.status.is_transport_failure() {
            warn!("GET {} failed with status {}", path, response.status);
            self.body.clear();
            return None;
        }
        debug!("GET {} -> {} ({} bytes)", path, response.status, self.body.len());

        if self.body.is_empty() {
            None
        } else {
            Some(self.body.as_str())
        }
    }

    /// Encode the live prefix of `buffer` and POST it to the upload path.
    ///
    /// The buffer is never modified; clearing after a successful upload is
    /// the caller's decision.
    pub async fn upload_batch<const N: usize>(&mut self, buffer: &SampleBuffer<N>) -> StatusCode {
        if let Err(e) = self.encoder.encode(buffer) {
            error!("Batch encoding failed: {}", e);
            return StatusCode::TOO_LESS_RAM;
        }
        let body = self.encoder.text();
        let count = self.encoder.record_count();
        debug!("Uploading {} samples: {}", count, body);

        let status = send(
            &mut self.transport,
            self.endpoint,
            Method::Post,
            UPLOAD_PATH,
            body.as_bytes(),
        )
        .await
        .status;
        info!("POST {} ({} samples) -> {}", UPLOAD_PATH, count, status);
        status
    }

    /// Fetch the authoritative unix time and write it into `clock`.
    ///
    /// The clock is only written after a complete, non-zero value has been
    /// parsed. On any error it keeps its previous value.
    pub async fn sync_clock(&mut self, clock: &Clock, uptime_secs: u64) -> Result<u32, SyncError> {
        let Some(body) = self.get(TIME_SYNC_PATH).await else {
            warn!("Clock sync skipped: no response");
            return Err(SyncError::NoResponse);
        };

        let parsed: TimeResponse = serde_json::from_str(body).map_err(|_| {
            warn!("Clock sync skipped: unparsable body {:?}", body);
            SyncError::Malformed
        })?;
        if parsed.unix_time == 0 {
            warn!("Clock sync skipped: server sent unix_time 0");
            return Err(SyncError::ZeroTimestamp);
        }

        clock.set(parsed.unix_time, uptime_secs);
        info!("Clock synced to {}", parsed.unix_time);
        Ok(parsed.unix_time)
    }
}

/// Reset, begin, and run one request.
async fn send<T: HttpTransport>(
    transport: &mut T,
    endpoint: Endpoint<'_>,
    method: Method,
    path: &str,
    body: &[u8],
) -> Response {
    // End the previous connection, even if it was never started
    transport.end().await;

    if let Err(status) = transport.begin(endpoint.host, endpoint.port).await {
        warn!(
            "Could not connect to {}:{} ({})",
            endpoint.host, endpoint.port, status
        );
        return Response::failed(status);
    }

    let headers: &[(&'static str, &'static str)] = match method {
        Method::Post => &[JSON_CONTENT_TYPE],
        Method::Get => &[],
    };
    let head = request_head(method, endpoint.host, endpoint.port, path, headers, body.len());
    transport.exchange(head.as_bytes(), body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, Reply, block_on, endpoint};

    fn session(replies: &[Reply]) -> UploadSession<'static, FakeTransport> {
        UploadSession::with_endpoint(FakeTransport::scripted(replies), endpoint())
    }

    #[test]
    fn test_post_sets_json_header_and_passes_status() {
        let mut session = session(&[Reply::status(201)]);
        let status = block_on(session.post("/water/data", "{\"data\":[]}"));
        assert_eq!(status, 201);

        let request = &session.transport().requests[0];
        assert!(request.head.starts_with("POST /water/data HTTP/1.1\r\n"));
        assert!(request.head.contains("Content-Type: application/json\r\n"));
        assert_eq!(request.body, "{\"data\":[]}");
    }

    #[test]
    fn test_every_request_resets_before_begin() {
        let mut session = session(&[Reply::status(204), Reply::status(204)]);
        block_on(session.post("/a", "{}"));
        block_on(session.post("/b", "{}"));

        let transport = session.transport();
        assert_eq!(transport.begins, 2);
        assert_eq!(transport.ends, 2, "end is called before each begin");
        assert_eq!(transport.events, ["end", "begin", "end", "begin"]);
    }

    #[test]
    fn test_post_passes_transport_failure_through() {
        let mut session = session(&[Reply::Refuse(StatusCode::CONNECTION_REFUSED)]);
        let status = block_on(session.post("/water/data", "{}"));
        assert_eq!(status, StatusCode::CONNECTION_REFUSED);
        assert!(session.transport().requests.is_empty());
    }

    #[test]
    fn test_get_returns_body() {
        let mut session = session(&[Reply::body(200, "{\"unix_time\":1700000000}")]);
        let body = block_on(session.get(TIME_SYNC_PATH));
        assert_eq!(body, Some("{\"unix_time\":1700000000}"));
        assert!(
            session.transport().requests[0]
                .head
                .starts_with("GET /currentTime?format=UNIX_S HTTP/1.1\r\n")
        );
    }

    #[test]
    fn test_get_failure_is_empty() {
        let mut session = session(&[Reply::Respond(Response {
            status: StatusCode::READ_TIMEOUT,
            body: "partial garb".into(),
        })]);
        assert_eq!(block_on(session.get(TIME_SYNC_PATH)), None);

        let mut session = self::session(&[Reply::Refuse(StatusCode::CONNECTION_REFUSED)]);
        assert_eq!(block_on(session.get(TIME_SYNC_PATH)), None);
    }

    #[test]
    fn test_get_truncated_response_is_empty() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 24\r\n\r\n{\"unix_time\":17";
        let mut session = session(&[Reply::Respond(crate::http::parse_response(raw))]);
        assert_eq!(block_on(session.get(TIME_SYNC_PATH)), None);

        let clock = Clock::new();
        let mut session = self::session(&[Reply::Respond(crate::http::parse_response(raw))]);
        assert_eq!(
            block_on(session.sync_clock(&clock, 0)),
            Err(SyncError::NoResponse)
        );
        assert!(!clock.is_synced());
    }

    #[test]
    fn test_upload_batch_posts_live_records_in_order() {
        let mut buffer = SampleBuffer::<100>::new();
        buffer.set(0, 24.5, 24.6, 1000);
        buffer.set(1, 24.7, 24.8, 1010);
        buffer.set(2, 24.9, 25.0, 1020);
        assert_eq!(buffer.live_len(), 3);

        let mut session = session(&[Reply::status(204)]);
        let status = block_on(session.upload_batch(&buffer));
        assert_eq!(status, StatusCode::NO_CONTENT);

        let request = &session.transport().requests[0];
        assert!(request.head.starts_with("POST /water/data HTTP/1.1\r\n"));
        assert_eq!(
            request.body,
            "{\"data\":[\
             {\"t1\":24.5,\"t2\":24.6,\"time\":1000},\
             {\"t1\":24.7,\"t2\":24.8,\"time\":1010},\
             {\"t1\":24.9,\"t2\":25.0,\"time\":1020}]}"
        );
    }

    #[test]
    fn test_upload_batch_unreachable_leaves_buffer() {
        let mut buffer = SampleBuffer::<10>::new();
        buffer.set(0, 24.5, 24.6, 1000);
        let before = buffer.clone();

        let mut session = session(&[Reply::Refuse(StatusCode(-1))]);
        let status = block_on(session.upload_batch(&buffer));
        assert_eq!(status, -1);
        assert_eq!(buffer.live_len(), 1);
        assert_eq!(buffer.get(0), before.get(0));
    }

    #[test]
    fn test_upload_empty_buffer_sends_empty_array() {
        let buffer = SampleBuffer::<10>::new();
        let mut session = session(&[Reply::status(204)]);
        assert_eq!(block_on(session.upload_batch(&buffer)), 204);
        assert_eq!(session.transport().requests[0].body, "{\"data\":[]}");
    }

    #[test]
    fn test_sync_clock_sets_clock() {
        let clock = Clock::new();
        let mut session = session(&[Reply::body(200, "{\"unix_time\":1700000000}")]);
        assert_eq!(block_on(session.sync_clock(&clock, 42)), Ok(1_700_000_000));
        assert_eq!(clock.timestamp(), 1_700_000_000);
        assert_eq!(clock.synced_at(), 42);
    }

    #[test]
    fn test_sync_clock_failures_leave_clock_unchanged() {
        let clock = Clock::new();
        let mut session = session(&[
            Reply::body(200, "{\"unix_time\":1600000000}"),
            Reply::Refuse(StatusCode::CONNECTION_REFUSED),
            Reply::status(200),
            Reply::body(200, "<html>oops</html>"),
            Reply::body(200, "{\"unix_time\":\"soon\"}"),
            Reply::body(200, "{\"other\":5}"),
            Reply::body(200, "{\"unix_time\":0}"),
            Reply::body(200, "{\"unix_time\":-5}"),
        ]);
        block_on(session.sync_clock(&clock, 10)).unwrap();

        let expected = [
            SyncError::NoResponse,
            SyncError::NoResponse,
            SyncError::Malformed,
            SyncError::Malformed,
            SyncError::Malformed,
            SyncError::ZeroTimestamp,
            SyncError::Malformed,
        ];
        for want in expected {
            assert_eq!(block_on(session.sync_clock(&clock, 99)), Err(want));
            assert_eq!(clock.timestamp(), 1_600_000_000, "failed sync must not touch the clock");
            assert_eq!(clock.synced_at(), 10);
        }
    }
}
