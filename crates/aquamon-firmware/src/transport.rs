//! HTTP over an embassy-net TCP socket.

use alloc::vec::Vec;

use aquamon_core::HttpTransport;
use aquamon_core::StatusCode;
use aquamon_core::http::{Response, parse_response};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use embassy_time::Duration;
use embedded_io_async::Write;
use log::{debug, warn};

const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
const SOCKET_BUFFER_SIZE: usize = 2048;
const READ_CHUNK_SIZE: usize = 512;

/// One request per connection.
///
/// `begin` resolves the server, `exchange` opens the socket, sends, reads
/// until the server closes and tears the socket down again.
pub struct TcpTransport {
    stack: Stack<'static>,
    remote: Option<IpEndpoint>,
    rx: [u8; SOCKET_BUFFER_SIZE],
    tx: [u8; SOCKET_BUFFER_SIZE],
}

impl TcpTransport {
    pub fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            remote: None,
            rx: [0; SOCKET_BUFFER_SIZE],
            tx: [0; SOCKET_BUFFER_SIZE],
        }
    }
}

impl HttpTransport for TcpTransport {
    async fn end(&mut self) {
        self.remote = None;
    }

    async fn begin(&mut self, host: &str, port: u16) -> Result<(), StatusCode> {
        if !self.stack.is_config_up() {
            return Err(StatusCode::NOT_CONNECTED);
        }
        // IP literals are returned without a lookup
        let addresses = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("DNS lookup of {} failed: {:?}", host, e);
                StatusCode::CONNECTION_REFUSED
            })?;
        let address = addresses
            .first()
            .copied()
            .ok_or(StatusCode::CONNECTION_REFUSED)?;
        self.remote = Some(IpEndpoint::new(address, port));
        Ok(())
    }

    async fn exchange(&mut self, head: &[u8], body: &[u8]) -> Response {
        let Some(remote) = self.remote else {
            return Response::failed(StatusCode::NOT_CONNECTED);
        };

        let mut socket = TcpSocket::new(self.stack, &mut self.rx, &mut self.tx);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        if let Err(e) = socket.connect(remote).await {
            warn!("Connect to {} failed: {:?}", remote, e);
            return Response::failed(StatusCode::CONNECTION_REFUSED);
        }

        let response = send_and_receive(&mut socket, head, body).await;
        socket.abort();
        response
    }
}

async fn send_and_receive(socket: &mut TcpSocket<'_>, head: &[u8], body: &[u8]) -> Response {
    if socket.write_all(head).await.is_err() {
        return Response::failed(StatusCode::SEND_HEADER_FAILED);
    }
    if socket.write_all(body).await.is_err() {
        return Response::failed(StatusCode::SEND_PAYLOAD_FAILED);
    }
    if socket.flush().await.is_err() {
        return Response::failed(StatusCode::STREAM_WRITE);
    }

    let mut raw = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => raw.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!("Read ended with {:?} after {} bytes", e, raw.len());
                if raw.is_empty() {
                    return Response::failed(StatusCode::READ_TIMEOUT);
                }
                break;
            }
        }
    }
    parse_response(&raw)
}
