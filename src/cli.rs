use crate::config::{ServerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_LISTEN, DEFAULT_SERVER_PORT, DEFAULT_THREADS};
use clap::Parser;
use std::time::Duration;

// Command-line harness for running the cast file server outside the player.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Serve the current track and its artwork to a Cast receiver over the LAN.",
    long_about = "Serves exactly two local files, a media file and its artwork, over HTTP with byte-range support.\n Any other path is answered with 400 Bad Request.\n The announced URLs use the first non-loopback IPv4 address of this host.\n"
)]
pub struct Cli {
    /// Host address to listen on ("0.0.0.0" for every interface).
    #[arg(short, long, default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Port number to listen on.
    #[arg(short, long, default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Media file to authorize.
    #[arg(short, long)]
    pub media: Option<String>,

    /// Artwork file to authorize.
    #[arg(short, long)]
    pub image: Option<String>,

    /// Worker threads kept ready; more are added while all are busy.
    #[arg(short, long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Chunk size used when streaming file bodies (in bytes).
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Per-connection read/write timeout in seconds, 0 disables it.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Enable verbose logging for debugging (log level: debug).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Enable more detailed logging (log level: info).
    #[arg(long, default_value_t = false)]
    pub detailed_logging: bool,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.detailed_logging {
            "info"
        } else {
            "warn"
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_listen(&self.listen)
            .with_port(self.port)
            .with_threads(self.threads)
            .with_chunk_size(self.chunk_size)
            .with_io_timeout(Some(Duration::from_secs(self.timeout)))
    }
}
