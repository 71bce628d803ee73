//! End-to-end tests against a running server using a raw TCP client.
#![cfg(unix)]

use cast_fs::cast::CastFileServer;
use cast_fs::config::ServerConfig;
use cast_fs::fs::etag_for;
use cast_fs::utils::percent_encode_path;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

const TRACK_LEN: usize = 1_000_000;

/// A running server with a media file, an artwork file and an unauthorized
/// neighbour in a temporary directory.
struct TestServer {
    addr: SocketAddr,
    server: CastFileServer,
    media: String,
    image: String,
    other: String,
    data: Vec<u8>,
    temp_dir: TempDir,
}

impl TestServer {
    fn new() -> Self {
        Self::with_io_timeout(Duration::from_secs(5))
    }

    fn with_io_timeout(io_timeout: Duration) -> Self {
        let dir = tempdir().unwrap();
        let data: Vec<u8> = (0..TRACK_LEN).map(|i| (i % 253) as u8).collect();

        let media = write_file(&dir, "track1.mp3", &data);
        let image = write_file(&dir, "cover.jpg", b"\xff\xd8\xff\xe0 not really a jpeg");
        let other = write_file(&dir, "other.mp3", b"other track");

        let config = ServerConfig::default()
            .with_listen("127.0.0.1")
            .with_port(0)
            .with_chunk_size(4096)
            .with_io_timeout(Some(io_timeout));
        let mut server = CastFileServer::new(config);
        let addr = server.start().unwrap();
        server.set_authorized_paths(Some(&media), Some(&image));

        TestServer {
            addr,
            server,
            media,
            image,
            other,
            data,
            temp_dir: dir,
        }
    }
}

fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> String {
    let path = dir.path().join(name);
    File::create(&path).unwrap().write_all(contents).unwrap();
    path.to_str().unwrap().to_string()
}

struct RawResponse {
    status_code: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Native HTTP client for testing; reads until the server closes.
fn request(addr: SocketAddr, method: &str, path: &str, headers: &[(&str, &str)]) -> RawResponse {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();

    let mut request = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\n");
    for (name, value) in headers {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    parse_response(raw)
}

fn parse_response(mut raw: Vec<u8>) -> RawResponse {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has a header block")
        + 4;
    let body = raw.split_off(split);
    let head = String::from_utf8(raw).unwrap();
    let mut lines = head.split("\r\n");
    let status_code = lines
        .next()
        .unwrap()
        .split_whitespace()
        .nth(1)
        .unwrap()
        .parse::<u16>()
        .unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.to_lowercase(), v.to_string()))
        .collect();
    RawResponse {
        status_code,
        headers,
        body,
    }
}

#[test]
fn test_full_media_download() {
    let server = TestServer::new();
    let response = request(server.addr, "GET", &server.media, &[]);

    assert_eq!(response.status_code, 200);
    assert_eq!(response.header("content-type"), Some("audio/mpeg"));
    assert_eq!(response.header("content-length"), Some("1000000"));
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(
        response.header("etag").unwrap(),
        etag_for(&server.media, TRACK_LEN as u64)
    );
    assert_eq!(response.body, server.data);
}

#[test]
fn test_artwork_download() {
    let server = TestServer::new();
    let response = request(server.addr, "GET", &server.image, &[]);

    assert_eq!(response.status_code, 200);
    assert_eq!(response.header("content-type"), Some("image/jpeg"));
    assert_eq!(response.body, b"\xff\xd8\xff\xe0 not really a jpeg");
}

#[test]
fn test_open_range_from_middle() {
    let server = TestServer::new();
    let response = request(server.addr, "GET", &server.media, &[("Range", "bytes=500000-")]);

    assert_eq!(response.status_code, 206);
    assert_eq!(response.header("content-range"), Some("bytes 500000-999999/1000000"));
    assert_eq!(response.header("content-length"), Some("500000"));
    assert_eq!(response.body, &server.data[500_000..]);
}

#[test]
fn test_bounded_range() {
    let server = TestServer::new();
    let response = request(server.addr, "GET", &server.media, &[("Range", "bytes=1000-1999")]);

    assert_eq!(response.status_code, 206);
    assert_eq!(response.header("content-range"), Some("bytes 1000-1999/1000000"));
    assert_eq!(response.header("content-length"), Some("1000"));
    assert_eq!(response.body, &server.data[1000..2000]);
}

#[test]
fn test_range_beyond_end() {
    let server = TestServer::new();
    let response = request(server.addr, "GET", &server.media, &[("Range", "bytes=2000000-")]);

    assert_eq!(response.status_code, 416);
    assert_eq!(response.header("content-range"), Some("bytes 0-0/1000000"));
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert!(response.header("etag").is_some());
}

#[test]
fn test_malformed_range_is_ignored() {
    let server = TestServer::new();
    let response = request(server.addr, "GET", &server.media, &[("Range", "frames=10-20")]);

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body.len(), TRACK_LEN);
}

#[test]
fn test_conditional_requests() {
    let server = TestServer::new();
    let first = request(server.addr, "GET", &server.media, &[]);
    let second = request(server.addr, "GET", &server.media, &[]);
    let etag = first.header("etag").unwrap().to_string();
    assert_eq!(second.header("etag"), Some(etag.as_str()));
    assert_eq!(first.header("content-length"), second.header("content-length"));

    let cached = request(server.addr, "GET", &server.media, &[("If-None-Match", &etag)]);
    assert_eq!(cached.status_code, 304);
    assert!(cached.body.is_empty());

    let stale = request(server.addr, "GET", &server.media, &[("If-None-Match", "deadbeef")]);
    assert_eq!(stale.status_code, 200);
    assert_eq!(stale.body.len(), TRACK_LEN);
}

#[test]
fn test_unauthorized_path_is_bad_request() {
    let server = TestServer::new();
    let response = request(server.addr, "GET", &server.other, &[]);

    assert_eq!(response.status_code, 400);
    assert_eq!(response.body, b"400 - Bad Request");
    assert_eq!(response.header("accept-ranges"), Some("bytes"));

    let response = request(server.addr, "GET", "/sdcard/Music/other.mp3", &[]);
    assert_eq!(response.status_code, 400);
}

#[test]
fn test_replaced_path_is_denied() {
    let server = TestServer::new();
    assert_eq!(request(server.addr, "GET", &server.media, &[]).status_code, 200);

    server.server.set_authorized_paths(Some(&server.other), None);
    assert_eq!(request(server.addr, "GET", &server.media, &[]).status_code, 400);
    assert_eq!(request(server.addr, "GET", &server.image, &[]).status_code, 400);

    let response = request(server.addr, "GET", &server.other, &[]);
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, b"other track");
}

#[test]
fn test_equivalent_spellings_fail_closed() {
    let server = TestServer::new();
    let dotted = server.media.replace("/track1.mp3", "/./track1.mp3");
    assert_eq!(request(server.addr, "GET", &dotted, &[]).status_code, 400);

    // Query strings are stripped and escapes decoded before the check.
    let with_query = format!("{}?session=1", server.media);
    assert_eq!(request(server.addr, "GET", &with_query, &[]).status_code, 200);
    let escaped = server.media.replace("track1", "track%31");
    assert_eq!(request(server.addr, "GET", &escaped, &[]).status_code, 200);
}

#[test]
fn test_method_is_not_checked() {
    let server = TestServer::new();
    let response = request(server.addr, "POST", &server.image, &[]);
    assert_eq!(response.status_code, 200);

    let response = request(server.addr, "DELETE", &server.other, &[]);
    assert_eq!(response.status_code, 400);
}

#[test]
fn test_deleted_file_is_forbidden() {
    let server = TestServer::new();
    std::fs::remove_file(&server.image).unwrap();
    let response = request(server.addr, "GET", &server.image, &[]);

    assert_eq!(response.status_code, 403);
    assert_eq!(response.body, b"FORBIDDEN: Reading file failed.");
}

#[test]
fn test_malformed_requests_get_no_response() {
    let server = TestServer::new();

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.write_all(b"INVALID\r\n").unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    assert!(raw.is_empty());

    // The listener keeps serving afterwards.
    assert_eq!(request(server.addr, "GET", &server.image, &[]).status_code, 200);
}

#[test]
fn test_stalled_request_times_out() {
    let server = TestServer::with_io_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(b"GET /never/finished").unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    assert!(raw.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(request(server.addr, "GET", &server.image, &[]).status_code, 200);
}

#[test]
fn test_stalled_clients_do_not_block_artwork() {
    let server = TestServer::with_io_timeout(Duration::from_secs(30));

    let stalled: Vec<TcpStream> = (0..6)
        .map(|_| {
            let mut stream = TcpStream::connect(server.addr).unwrap();
            stream.write_all(b"GET /slow").unwrap();
            stream
        })
        .collect();
    thread::sleep(Duration::from_millis(200));

    let response = request(server.addr, "GET", &server.image, &[]);
    assert_eq!(response.status_code, 200);
    drop(stalled);
}

#[test]
fn test_trailing_space_is_a_different_file() {
    let server = TestServer::new();
    let spaced = write_file(&server.temp_dir, "a.mp3 ", b"authorized");
    let plain = write_file(&server.temp_dir, "a.mp3", b"SECRET");
    server.server.set_authorized_paths(Some(&spaced), Some(&server.image));

    let denied = request(server.addr, "GET", &plain, &[]);
    assert_eq!(denied.status_code, 400);
    assert_eq!(denied.body, b"400 - Bad Request");

    let served = request(server.addr, "GET", &percent_encode_path(&spaced), &[]);
    assert_eq!(served.status_code, 200);
    assert_eq!(served.body, b"authorized");
}

#[test]
fn test_client_disconnect_mid_stream() {
    let server = TestServer::new();

    for _ in 0..5 {
        let mut stream = TcpStream::connect(server.addr).unwrap();
        let request = format!("GET {} HTTP/1.1\r\n\r\n", server.media);
        stream.write_all(request.as_bytes()).unwrap();
        let mut partial = [0u8; 512];
        stream.read_exact(&mut partial).unwrap();
        drop(stream);
    }

    let response = request(server.addr, "GET", &server.media, &[("Range", "bytes=0-9")]);
    assert_eq!(response.status_code, 206);
    assert_eq!(response.body, &server.data[..10]);
}

#[test]
fn test_concurrent_range_requests() {
    let server = TestServer::new();
    let addr = server.addr;
    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let path = server.media.clone();
            thread::spawn(move || {
                let start = i * 100_000;
                let range = format!("bytes={}-{}", start, start + 999);
                (start, request(addr, "GET", &path, &[("Range", &range)]))
            })
        })
        .collect();

    for handle in handles {
        let (start, response) = handle.join().unwrap();
        let start = start as usize;
        assert_eq!(response.status_code, 206);
        assert_eq!(response.body, &server.data[start..start + 1000]);
    }
}

#[test]
fn test_stop_releases_port() {
    let mut server = TestServer::new();
    let addr = server.addr;
    server.server.stop().unwrap();

    assert!(TcpStream::connect(addr).is_err());
    assert!(server.server.authorized_paths().is_empty());
}
