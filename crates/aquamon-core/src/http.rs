//! Minimal HTTP/1.1 pieces shared by the transports.
//!
//! Requests are always sent with `Connection: close`, so a response is
//! everything the server writes until it closes the socket.

use alloc::string::String;
use core::fmt::{self, Write as _};

/// HTTP status code, or a negative transport failure code.
///
/// Negative values are produced by the transport when no HTTP status was
/// received at all. They are passed through to the caller unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(pub i16);

impl StatusCode {
    pub const CONNECTION_REFUSED: Self = Self(-1);
    pub const SEND_HEADER_FAILED: Self = Self(-2);
    pub const SEND_PAYLOAD_FAILED: Self = Self(-3);
    pub const NOT_CONNECTED: Self = Self(-4);
    pub const CONNECTION_LOST: Self = Self(-5);
    pub const NO_STREAM: Self = Self(-6);
    pub const NO_HTTP_SERVER: Self = Self(-7);
    pub const TOO_LESS_RAM: Self = Self(-8);
    pub const ENCODING: Self = Self(-9);
    pub const STREAM_WRITE: Self = Self(-10);
    pub const READ_TIMEOUT: Self = Self(-11);

    pub const OK: Self = Self(200);
    pub const NO_CONTENT: Self = Self(204);

    /// No HTTP exchange happened.
    pub const fn is_transport_failure(self) -> bool {
        self.0 <= 0
    }

    /// 2xx
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }
}

impl PartialEq<i16> for StatusCode {
    fn eq(&self, other: &i16) -> bool {
        self.0 == *other
    }
}

impl From<StatusCode> for i16 {
    fn from(status: StatusCode) -> Self {
        status.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Build the request line and headers, terminated by the blank line.
pub fn request_head(
    method: Method,
    host: &str,
    port: u16,
    path: &str,
    headers: &[(&'static str, &'static str)],
    content_length: usize,
) -> String {
    let mut head = String::new();
    // Writing into a String cannot fail
    let _ = write!(head, "{} {} HTTP/1.1\r\n", method.as_str(), path);
    if port == 80 {
        let _ = write!(head, "Host: {}\r\n", host);
    } else {
        let _ = write!(head, "Host: {}:{}\r\n", host, port);
    }
    for (name, value) in headers {
        let _ = write!(head, "{}: {}\r\n", name, value);
    }
    if method == Method::Post || content_length > 0 {
        let _ = write!(head, "Content-Length: {}\r\n", content_length);
    }
    head.push_str("Connection: close\r\n\r\n");
    head
}

/// Status and body of a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

impl Response {
    pub fn failed(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

/// Parse a complete response read up to connection close.
///
/// A missing or malformed status line yields
/// [`StatusCode::NO_HTTP_SERVER`] with an empty body. A body that is not
/// UTF-8, or shorter than its `Content-Length`, is dropped, keeping the status.
pub fn parse_response(raw: &[u8]) -> Response {
    let Some(head_end) = find_subslice(raw, b"\r\n\r\n") else {
        return Response::failed(StatusCode::NO_HTTP_SERVER);
    };
    let Ok(head) = core::str::from_utf8(&raw[..head_end]) else {
        return Response::failed(StatusCode::NO_HTTP_SERVER);
    };
    let mut lines = head.split("\r\n");
    let Some(status) = lines.next().and_then(parse_status_line) else {
        return Response::failed(StatusCode::NO_HTTP_SERVER);
    };

    let mut content_length = None;
    let mut chunked = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().ok();
        } else if name.trim().eq_ignore_ascii_case("transfer-encoding")
            && value.eq_ignore_ascii_case("chunked")
        {
            chunked = true;
        }
    }

    let rest = &raw[head_end + 4..];
    let body_bytes = if chunked {
        match decode_chunked(rest) {
            Some(bytes) => bytes,
            None => return Response::failed(status),
        }
    } else {
        match content_length {
            Some(len) => match rest.get(..len) {
                Some(bytes) => bytes.to_vec(),
                // Connection closed before the declared length arrived
                None => return Response::failed(status),
            },
            None => rest.to_vec(),
        }
    };

    Response {
        status,
        body: String::from_utf8(body_bytes).unwrap_or_default(),
    }
}

fn parse_status_line(line: &str) -> Option<StatusCode> {
    let mut parts = line.split(' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?.parse::<i16>().ok()?;
    (100..600).contains(&code).then_some(StatusCode(code))
}

fn decode_chunked(mut data: &[u8]) -> Option<alloc::vec::Vec<u8>> {
    let mut out = alloc::vec::Vec::new();
    loop {
        let line_end = find_subslice(data, b"\r\n")?;
        let size_line = core::str::from_utf8(&data[..line_end]).ok()?;
        let size_hex = size_line.split(';').next()?.trim();
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        data = &data[line_end + 2..];
        if size == 0 {
            return Some(out);
        }
        out.extend_from_slice(data.get(..size)?);
        data = data.get(size + 2..)?;
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
