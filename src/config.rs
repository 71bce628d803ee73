use crate::mime::MimeTable;
use std::time::Duration;

pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_LISTEN: &str = "0.0.0.0";
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable server settings, fixed once the server is constructed.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: String,
    pub port: u16,
    pub mime: MimeTable,
    /// Baseline worker count. The pool grows past it so every accepted
    /// connection gets a worker.
    pub threads: usize,
    pub chunk_size: usize,
    /// Read and write timeout applied to every accepted connection.
    pub io_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            port: DEFAULT_SERVER_PORT,
            mime: MimeTable::default(),
            threads: DEFAULT_THREADS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }
}

impl ServerConfig {
    pub fn with_listen(mut self, listen: &str) -> Self {
        self.listen = listen.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_mime(mut self, mime: MimeTable) -> Self {
        self.mime = mime;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}
