//! The file server as seen by the playback layer: it serves only the
//! current track and its artwork, and announces LAN URLs for them.

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::http::{Request, ResourceResolver};
use crate::mime::MimeTable;
use crate::policy::{authorize, Access, AuthorizedPaths, PathGate};
use crate::responder::respond;
use crate::response::{HttpResponse, StatusCode};
use crate::server::FileServer;
use crate::utils::{build_url, local_address};
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

pub const DENIED_MESSAGE: &str = "400 - Bad Request";

/// Gate followed by the static file responder.
///
/// The HTTP method is not checked: any method reaching an authorized path
/// is answered like a GET. Denied paths answer 400.
pub struct CastResolver {
    gate: PathGate,
    mime: MimeTable,
}

impl CastResolver {
    pub fn new(gate: PathGate, mime: MimeTable) -> Self {
        Self { gate, mime }
    }
}

impl ResourceResolver for CastResolver {
    fn resolve(&self, request: &Request, log_prefix: &str) -> HttpResponse {
        let paths = self.gate.snapshot();
        match authorize(&request.uri, &paths) {
            Access::Allowed(path) => {
                debug!("{} Serving authorized path '{}'", log_prefix, path);
                respond(path, self.mime.resolve(path), &request.headers, log_prefix)
            }
            Access::Denied => {
                warn!("{} Denied request for '{}'", log_prefix, request.uri);
                HttpResponse::text(StatusCode::BadRequest, DENIED_MESSAGE)
            }
        }
    }
}

/// Collaborator interface for the playback layer.
pub struct CastFileServer {
    server: FileServer,
    gate: PathGate,
}

impl CastFileServer {
    pub fn new(config: ServerConfig) -> Self {
        let gate = PathGate::new();
        let resolver = CastResolver::new(gate.clone(), config.mime.clone());
        Self {
            server: FileServer::new(config, Arc::new(resolver)),
            gate,
        }
    }

    pub fn start(&mut self) -> Result<SocketAddr, AppError> {
        let addr = self.server.start()?;
        info!("Cast file server started on {addr}");
        Ok(addr)
    }

    /// Stops accepting connections, releases the port and forgets the
    /// authorized paths.
    pub fn stop(&mut self) -> Result<(), AppError> {
        self.gate.clear();
        self.server.stop()?;
        info!("Cast file server stopped");
        Ok(())
    }

    /// Blocks until the server stops.
    pub fn join(self) -> Result<(), AppError> {
        self.server.join()
    }

    /// Replaces both authorized paths in one step.
    pub fn set_authorized_paths(&self, media_path: Option<&str>, image_path: Option<&str>) {
        self.gate
            .publish(AuthorizedPaths::new(media_path, image_path));
    }

    pub fn authorized_paths(&self) -> Arc<AuthorizedPaths> {
        self.gate.snapshot()
    }

    /// Port clients should use: the bound one while running, the configured
    /// one otherwise.
    pub fn port(&self) -> u16 {
        self.server
            .local_addr()
            .map_or(self.server.config().port, |addr| addr.port())
    }

    /// URL under which the receiver can fetch `local_path`. `None` for an
    /// empty path or when this host has no LAN address.
    pub fn announce_url(&self, local_path: &str) -> Option<String> {
        if local_path.is_empty() {
            return None;
        }
        let host = local_address()?;
        let url = build_url(host, self.port(), local_path);
        debug!("Announcing {url:?} for '{local_path}'");
        url
    }
}
