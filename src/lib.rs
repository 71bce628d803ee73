//! # cast-fs
//!
//! A minimal embedded HTTP file server that exposes the currently playing
//! track and its artwork to a Cast receiver on the local network, with
//! byte-range and ETag support.
//!
//! Embedders use [`cast::CastFileServer`]; the `run` function drives the
//! command-line harness.

pub mod cast;
pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod mime;
pub mod policy;
pub mod range;
pub mod responder;
pub mod response;
pub mod server;
pub mod utils;


use crate::cast::CastFileServer;
use crate::cli::Cli;
use crate::error::AppError;
use clap::Parser;
use log::{error, info, warn};

/// Initializes the logger, parses command-line arguments and serves until
/// the process is terminated.
pub fn run() {
    let cli = Cli::parse();
    let log_level = cli.log_level();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    log::debug!("Log level set to: {log_level}");

    if let Err(e) = serve(cli) {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}

fn serve(cli: Cli) -> Result<(), AppError> {
    let mut server = CastFileServer::new(cli.server_config());
    server.set_authorized_paths(cli.media.as_deref(), cli.image.as_deref());
    server.start()?;

    for path in [&cli.media, &cli.image].into_iter().flatten() {
        match server.announce_url(path) {
            Some(url) => info!("Serving '{path}' at {url}"),
            None => warn!("No LAN address found to announce '{path}'"),
        }
    }

    server.join()
}
