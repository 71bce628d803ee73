use crate::error::AppError;
use log::{debug, error};
use std::fs::File;
use std::io::{prelude::*, ErrorKind};

pub const MIME_PLAINTEXT: &str = "text/plain";

/// Status codes this server can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    PartialContent,
    NotModified,
    BadRequest,
    Forbidden,
    NotFound,
    RangeNotSatisfiable,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::PartialContent => 206,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::RangeNotSatisfiable => 416,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::PartialContent => "Partial Content",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::RangeNotSatisfiable => "Requested Range Not Satisfiable",
        }
    }
}

/// Response payload. A file body owns its handle, already positioned at the
/// first byte to send, and sends at most `len` bytes.
#[derive(Debug)]
pub enum Body {
    Empty,
    Text(String),
    File { file: File, len: u64 },
}

/// HTTP response builder. Every response announces `Accept-Ranges: bytes`.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub mime_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpResponse {
    pub fn new(status: StatusCode, mime_type: &str) -> Self {
        Self {
            status,
            mime_type: mime_type.to_string(),
            headers: vec![("Accept-Ranges".to_string(), "bytes".to_string())],
            body: Body::Empty,
        }
    }

    pub fn text(status: StatusCode, message: &str) -> Self {
        Self::new(status, MIME_PLAINTEXT).with_text_body(message.to_string())
    }

    pub fn with_text_body(mut self, body: String) -> Self {
        self.body = Body::Text(body);
        self
    }

    pub fn with_file_body(mut self, file: File, len: u64) -> Self {
        self.body = Body::File { file, len };
        self
    }

    pub fn add_header(mut self, name: &str, value: String) -> Self {
        self.headers.push((name.to_string(), value));
        self
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Write the status line, headers and body to `stream`.
    ///
    /// Text bodies get a `Content-Length` computed here; file bodies rely on
    /// the one set by the responder. The connection is always closed after
    /// the response, so `Connection: close` is announced.
    pub fn send<W: Write>(
        self,
        stream: &mut W,
        chunk_size: usize,
        log_prefix: &str,
    ) -> Result<(), AppError> {
        debug!(
            "{} Sending response - Status: {}, Type: {}",
            log_prefix,
            self.status.code(),
            self.mime_type
        );

        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\n",
            self.status.code(),
            self.status.reason(),
            self.mime_type
        );
        if let Body::Text(ref text) = self.body {
            if self.header("Content-Length").is_none() {
                head.push_str(&format!("Content-Length: {}\r\n", text.len()));
            }
        }
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("Connection: close\r\n\r\n");

        stream.write_all(head.as_bytes()).map_err(|e| {
            error!("{log_prefix} Failed to write response headers: {e}");
            AppError::Io(e)
        })?;

        match self.body {
            Body::Empty => {}
            Body::Text(text) => stream.write_all(text.as_bytes())?,
            Body::File { file, len } => {
                let sent = stream_file(file, len, stream, chunk_size)?;
                if sent < len {
                    // The file shrank after it was opened; the client sees a
                    // short body and the connection is closed right after.
                    error!("{log_prefix} File ended after {sent} of {len} bytes");
                }
            }
        }

        stream.flush()?;
        Ok(())
    }
}

/// Copy up to `len` bytes from `file` to `stream` in `chunk_size` pieces.
/// Returns the number of bytes written. The handle is dropped on return,
/// whether the copy completed or failed.
fn stream_file<W: Write>(
    file: File,
    len: u64,
    stream: &mut W,
    chunk_size: usize,
) -> Result<u64, AppError> {
    let mut source = file.take(len);
    let mut buffer = vec![0; chunk_size.max(1)];
    let mut sent = 0u64;
    loop {
        let bytes_read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(AppError::Io(e)),
        };
        stream.write_all(&buffer[..bytes_read])?;
        sent += bytes_read as u64;
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};

    fn render(response: HttpResponse) -> String {
        let mut out = Vec::new();
        response.send(&mut out, 4, "TEST").unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn text_response_has_length_and_accept_ranges() {
        let raw = render(HttpResponse::text(StatusCode::BadRequest, "400 - Bad Request"));
        assert!(raw.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(raw.contains("Content-Type: text/plain\r\n"));
        assert!(raw.contains("Content-Length: 17\r\n"));
        assert!(raw.contains("Accept-Ranges: bytes\r\n"));
        assert!(raw.contains("Connection: close\r\n"));
        assert!(raw.ends_with("\r\n\r\n400 - Bad Request"));
    }

    #[test]
    fn empty_response_has_no_body() {
        let raw = render(HttpResponse::new(StatusCode::NotModified, "audio/mpeg"));
        assert!(raw.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(!raw.contains("Content-Length"));
        assert!(raw.ends_with("\r\n\r\n"));
    }

    #[test]
    fn file_body_is_bounded() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.seek(SeekFrom::Start(3)).unwrap();

        let response = HttpResponse::new(StatusCode::PartialContent, "audio/mpeg")
            .add_header("Content-Length", "5".to_string())
            .with_file_body(file, 5);
        let raw = render(response);
        assert!(raw.contains("Content-Length: 5\r\n"));
        assert!(raw.ends_with("\r\n\r\n34567"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse::new(StatusCode::Ok, "image/png")
            .add_header("ETag", "abc".to_string());
        assert_eq!(response.header("etag"), Some("abc"));
        assert_eq!(response.header("accept-ranges"), Some("bytes"));
        assert_eq!(response.header("content-range"), None);
    }
}
