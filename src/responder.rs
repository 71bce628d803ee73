use crate::fs::{FileEntity, OpenError};
use crate::range::{parse_range_header, ByteRange};
use crate::response::{HttpResponse, StatusCode};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::{self, Seek, SeekFrom};

pub const FORBIDDEN_MESSAGE: &str = "FORBIDDEN: Reading file failed.";
pub const NOT_FOUND_MESSAGE: &str = "Error 404, file not found.";

/// Serves the file at `path`, honoring `range` and `if-none-match` from
/// `headers` (keys lowercased).
///
/// Open failures of any kind, including a missing file, answer 403. A path
/// that opens but is not a regular file answers 404.
pub fn respond(
    path: &str,
    mime_type: &str,
    headers: &HashMap<String, String>,
    log_prefix: &str,
) -> HttpResponse {
    let entity = match FileEntity::open(path, mime_type) {
        Ok(entity) => entity,
        Err(OpenError::NotAFile) => {
            warn!("{log_prefix} Refusing to serve '{path}': not a regular file");
            return HttpResponse::text(StatusCode::NotFound, NOT_FOUND_MESSAGE);
        }
        Err(OpenError::Unreadable(e)) => {
            warn!("{log_prefix} Reading '{path}' failed: {e}");
            return HttpResponse::text(StatusCode::Forbidden, FORBIDDEN_MESSAGE);
        }
    };

    let result = match parse_range_header(headers.get("range").map(String::as_str)) {
        None => Ok(full_response(entity, headers, log_prefix)),
        Some(range) if range.start >= entity.length => {
            info!(
                "{} Range start {} beyond length {} of '{}'",
                log_prefix, range.start, entity.length, entity.path
            );
            Ok(HttpResponse::text(StatusCode::RangeNotSatisfiable, "")
                .add_header("Content-Range", format!("bytes 0-0/{}", entity.length))
                .add_header("ETag", entity.etag))
        }
        Some(range) => partial_response(entity, range, log_prefix),
    };

    result.unwrap_or_else(|e| {
        warn!("{log_prefix} Seeking in '{path}' failed: {e}");
        HttpResponse::text(StatusCode::Forbidden, FORBIDDEN_MESSAGE)
    })
}

fn partial_response(
    entity: FileEntity,
    range: ByteRange,
    log_prefix: &str,
) -> io::Result<HttpResponse> {
    let FileEntity {
        mut file,
        length,
        etag,
        mime_type,
        ..
    } = entity;
    let end = range.resolved_end(length);
    let data_len = range.content_length(length);
    debug!(
        "{} Partial content {}-{}/{} ({} bytes)",
        log_prefix, range.start, end, length, data_len
    );
    file.seek(SeekFrom::Start(range.start))?;
    Ok(HttpResponse::new(StatusCode::PartialContent, &mime_type)
        .add_header("Content-Length", data_len.to_string())
        .add_header("Content-Range", format!("bytes {}-{}/{}", range.start, end, length))
        .add_header("ETag", etag)
        .with_file_body(file, data_len))
}

fn full_response(
    entity: FileEntity,
    headers: &HashMap<String, String>,
    log_prefix: &str,
) -> HttpResponse {
    if headers.get("if-none-match") == Some(&entity.etag) {
        debug!("{} '{}' not modified", log_prefix, entity.path);
        return HttpResponse::new(StatusCode::NotModified, &entity.mime_type);
    }
    HttpResponse::new(StatusCode::Ok, &entity.mime_type)
        .add_header("Content-Length", entity.length.to_string())
        .add_header("ETag", entity.etag)
        .with_file_body(entity.file, entity.length)
}
