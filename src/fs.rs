use log::debug;
use std::fs::File;
use std::io;
use thiserror::Error;

/// Why a path could not be turned into a [`FileEntity`].
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("{0}")]
    Unreadable(#[from] io::Error),
    #[error("not a regular file")]
    NotAFile,
}

/// An opened file about to be served.
///
/// The length is captured once at open time and is not re-checked while the
/// body streams.
#[derive(Debug)]
pub struct FileEntity {
    pub path: String,
    pub file: File,
    pub length: u64,
    pub etag: String,
    pub mime_type: String,
}

impl FileEntity {
    /// Opens `path` for reading. Anything that is not a regular file once
    /// opened is reported as [`OpenError::NotAFile`].
    pub fn open(path: &str, mime_type: &str) -> Result<Self, OpenError> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(OpenError::NotAFile);
        }
        let length = metadata.len();
        let etag = etag_for(path, length);
        debug!("Opened '{path}' ({length} bytes, etag {etag})");
        Ok(FileEntity {
            path: path.to_string(),
            file,
            length,
            etag,
            mime_type: mime_type.to_string(),
        })
    }
}

/// Entity tag derived from the path and length only.
///
/// This is a weak validator: rewriting a file in place without changing its
/// length keeps the same tag. The hash is the 31-multiplier polynomial over
/// UTF-16 code units, rendered as unsigned hex, so tags are stable across
/// runs and platforms.
pub fn etag_for(path: &str, length: u64) -> String {
    let hash = format!("{path}{length}")
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    format!("{:x}", hash as u32)
}
