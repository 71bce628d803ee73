/// A requested byte interval. `end` is inclusive; `None` means "to the last
/// byte of the file".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Resolve the inclusive end against a file of `file_size` bytes.
    ///
    /// Callers must check `start < file_size` first. An explicit end past the
    /// file is clamped to the last byte.
    pub fn resolved_end(&self, file_size: u64) -> u64 {
        let last = file_size.saturating_sub(1);
        self.end.map_or(last, |end| end.min(last))
    }

    /// Number of bytes covered once resolved; zero when `end < start`.
    pub fn content_length(&self, file_size: u64) -> u64 {
        (self.resolved_end(file_size) + 1).saturating_sub(self.start)
    }
}

/// Parse a `Range` header value of the form `bytes=start-end`.
///
/// Anything that is not understood yields `None` and the header is ignored.
pub fn parse_range_header(header: Option<&str>) -> Option<ByteRange> {
    let byte_range = header?.strip_prefix("bytes=")?;
    let (start, end) = byte_range.split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok();
    Some(ByteRange { start, end })
}
