//! Allow-list of the two paths the server may serve.
//!
//! Requested URIs are matched by exact, case-sensitive string equality. No
//! `.`/`..` or percent-encoding canonicalization happens here, so an
//! equivalent but differently spelled path is denied.

use crate::utils::{normalize_path, url_path};
use log::debug;
use parking_lot::RwLock;
use std::sync::Arc;

/// The currently playing media file and its artwork.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizedPaths {
    pub media: Option<String>,
    pub image: Option<String>,
}

impl AuthorizedPaths {
    /// Builds a pair with both paths normalized to `/` separators. Empty
    /// paths authorize nothing.
    pub fn new(media: Option<&str>, image: Option<&str>) -> Self {
        let normalize = |path: Option<&str>| {
            path.map(normalize_path).filter(|path| !path.is_empty())
        };
        Self {
            media: normalize(media),
            image: normalize(image),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_none() && self.image.is_none()
    }
}

/// Outcome of a gate check. `Allowed` carries the authorized path that
/// matched; that exact string is what gets opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<'a> {
    Allowed(&'a str),
    Denied,
}

pub fn authorize<'a>(requested_uri: &str, paths: &'a AuthorizedPaths) -> Access<'a> {
    [&paths.media, &paths.image]
        .into_iter()
        .flatten()
        .find(|path| url_path(path) == requested_uri)
        .map_or(Access::Denied, |path| Access::Allowed(path.as_str()))
}

/// Shared, swappable handle to the authorized pair.
///
/// Writers publish a whole new pair; readers take a snapshot and check it
/// with [`authorize`]. The lock only guards the pointer swap, so a reader
/// sees either the old pair or the new one, never a mix.
#[derive(Debug, Clone, Default)]
pub struct PathGate {
    current: Arc<RwLock<Arc<AuthorizedPaths>>>,
}

impl PathGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, paths: AuthorizedPaths) {
        debug!("Authorized paths now {paths:?}");
        *self.current.write() = Arc::new(paths);
    }

    pub fn clear(&self) {
        self.publish(AuthorizedPaths::default());
    }

    pub fn snapshot(&self) -> Arc<AuthorizedPaths> {
        Arc::clone(&self.current.read())
    }
}
