use crate::error::AppError;
use crate::response::HttpResponse;
use crate::utils::decode_request_path;
use log::{debug, warn};
use std::collections::HashMap;
use std::io::{prelude::*, BufReader};
use std::net::TcpStream;

const MAX_LINE_LENGTH: usize = 8 * 1024;
const MAX_HEADERS: usize = 100;

/// A parsed request. Header names are lowercased; `uri` is the decoded path
/// without its query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: HashMap<String, String>,
}

/// Turns a request into a response. This is the seam between the transport
/// and whatever decides what may be served.
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, request: &Request, log_prefix: &str) -> HttpResponse;
}

/// Lifecycle of a single-use connection. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    AwaitingRequestLine,
    ReadingHeaders,
    Dispatching,
    WritingResponse,
    Closed,
}

/// One accepted connection serving exactly one request/response cycle.
pub struct Connection<'a> {
    stream: TcpStream,
    state: ConnectionState,
    log_prefix: &'a str,
}

impl<'a> Connection<'a> {
    pub fn new(stream: TcpStream, log_prefix: &'a str) -> Self {
        Self {
            stream,
            state: ConnectionState::AwaitingRequestLine,
            log_prefix,
        }
    }

    fn advance(&mut self, next: ConnectionState) {
        debug_assert!(next > self.state, "{:?} -> {:?}", self.state, next);
        debug!("{} {:?} -> {:?}", self.log_prefix, self.state, next);
        self.state = next;
    }

    /// Reads one request, resolves it and writes the response. The
    /// connection ends up `Closed` whatever the outcome.
    pub fn serve(
        mut self,
        resolver: &dyn ResourceResolver,
        chunk_size: usize,
    ) -> Result<(), AppError> {
        let result = self.run(resolver, chunk_size);
        self.advance(ConnectionState::Closed);
        result
    }

    fn run(&mut self, resolver: &dyn ResourceResolver, chunk_size: usize) -> Result<(), AppError> {
        let mut reader = BufReader::new(self.stream.try_clone()?);
        let request_line = read_line(&mut reader)?
            .ok_or_else(|| AppError::MalformedRequest("connection closed before request line".into()))?;
        debug!("{} Request line: {}", self.log_prefix, request_line);
        let (method, uri, version) = parse_request_line(&request_line)?;

        self.advance(ConnectionState::ReadingHeaders);
        let headers = read_headers(&mut reader)?;
        let request = Request {
            method,
            uri,
            version,
            headers,
        };

        self.advance(ConnectionState::Dispatching);
        let response = resolver.resolve(&request, self.log_prefix);

        self.advance(ConnectionState::WritingResponse);
        response.send(&mut self.stream, chunk_size, self.log_prefix)
    }
}

/// Handles a single client connection, logging instead of propagating
/// failures so nothing reaches the accept loop.
pub fn handle_client(
    stream: TcpStream,
    resolver: &dyn ResourceResolver,
    chunk_size: usize,
    log_prefix: &str,
) {
    match Connection::new(stream, log_prefix).serve(resolver, chunk_size) {
        Ok(()) => {}
        Err(AppError::MalformedRequest(reason)) => {
            warn!("{log_prefix} Dropping malformed request: {reason}");
        }
        Err(AppError::Io(e)) => {
            debug!("{log_prefix} Connection ended early: {e}");
        }
        Err(e) => warn!("{log_prefix} Connection failed: {e}"),
    }
}

/// Splits `METHOD target [VERSION]`. The target is decoded to a path; a
/// missing version is taken as HTTP/1.1.
pub fn parse_request_line(line: &str) -> Result<(String, String, String), AppError> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| AppError::MalformedRequest("missing method".into()))?;
    let target = parts
        .next()
        .ok_or_else(|| AppError::MalformedRequest("missing request target".into()))?;
    let version = parts.next().unwrap_or("HTTP/1.1");
    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return Err(AppError::MalformedRequest(format!("bad request line '{line}'")));
    }
    let uri = decode_request_path(target)
        .ok_or_else(|| AppError::MalformedRequest(format!("undecodable target '{target}'")))?;
    Ok((method.to_string(), uri, version.to_string()))
}

/// Reads header lines up to the blank line. Lines without a colon are
/// skipped; a repeated header keeps its last value.
pub fn read_headers<R: BufRead>(reader: &mut R) -> Result<HashMap<String, String>, AppError> {
    let mut headers = HashMap::new();
    loop {
        let line = read_line(reader)?
            .ok_or_else(|| AppError::MalformedRequest("connection closed inside headers".into()))?;
        if line.is_empty() {
            return Ok(headers);
        }
        if headers.len() >= MAX_HEADERS {
            return Err(AppError::MalformedRequest("too many headers".into()));
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
}

// One CRLF- or LF-terminated line, bounded in length. Ok(None) on EOF.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, AppError> {
    let mut buffer = Vec::new();
    let read = reader
        .take(MAX_LINE_LENGTH as u64 + 1)
        .read_until(b'\n', &mut buffer)?;
    if read == 0 {
        return Ok(None);
    }
    if !buffer.ends_with(b"\n") {
        return Err(AppError::MalformedRequest(if read > MAX_LINE_LENGTH {
            "line too long".into()
        } else {
            "unterminated line".into()
        }));
    }
    buffer.pop();
    if buffer.ends_with(b"\r") {
        buffer.pop();
    }
    String::from_utf8(buffer)
        .map(Some)
        .map_err(|_| AppError::MalformedRequest("non UTF-8 header line".into()))
}
