use local_ip_address::list_afinet_netifas;
use log::{debug, warn};
use std::net::{IpAddr, Ipv4Addr};
use std::path::MAIN_SEPARATOR;

/// Converts platform separators to the URL separator `/`. Nothing else is
/// touched: whitespace is a legal part of a file name.
pub fn normalize_path(path: &str) -> String {
    path.replace(MAIN_SEPARATOR, "/")
}

/// The request path under which a normalized local path is reachable. Paths
/// without a leading `/` (a drive letter, say) get one, since a request
/// target always starts with it.
pub fn url_path(normalized: &str) -> String {
    if normalized.starts_with('/') {
        normalized.to_string()
    } else {
        format!("/{normalized}")
    }
}

// Percent-encode each segment of a `/`-separated path, leaving the
// separators themselves intact.
pub fn percent_encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Extracts the decoded path from a request target: the query string is
/// dropped and percent escapes are resolved. `None` if the escapes do not
/// decode to UTF-8.
pub fn decode_request_path(target: &str) -> Option<String> {
    let path = target.split_once('?').map_or(target, |(path, _)| path);
    urlencoding::decode(path).ok().map(|path| path.into_owned())
}

/// The first non-loopback IPv4 address of this host, if any.
pub fn local_address() -> Option<Ipv4Addr> {
    let interfaces = list_afinet_netifas()
        .map_err(|e| warn!("Failed to list network interfaces: {e}"))
        .ok()?;
    interfaces.into_iter().find_map(|(name, addr)| match addr {
        IpAddr::V4(ipv4) if !ipv4.is_loopback() => {
            debug!("Using interface {name} ({ipv4})");
            Some(ipv4)
        }
        _ => None,
    })
}

/// Composes `http://host:port/path` for a local file path. `None` for an
/// empty path.
pub fn build_url(host: Ipv4Addr, port: u16, local_path: &str) -> Option<String> {
    let path = normalize_path(local_path);
    if path.is_empty() {
        return None;
    }
    Some(format!(
        "http://{host}:{port}{}",
        percent_encode_path(&url_path(&path))
    ))
}
