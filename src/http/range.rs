//! HTTP Range request parsing module
//!
//! Single-range `bytes` parsing for partial content delivery (RFC 7233).
//! Every malformed or out-of-bounds header is reported as not satisfiable,
//! so the caller can answer 416 instead of guessing what the client meant.

/// Resolved byte range, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    /// First byte position
    pub start: u64,
    /// Last byte position (already clamped to the resource length)
    pub end: u64,
}

impl RangeRequest {
    /// Number of bytes covered by the range
    #[inline]
    pub const fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for a resource of `total_size` bytes
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{total_size}", self.start, self.end)
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    /// Valid single range
    Valid(RangeRequest),
    /// Malformed, multi-range or out of bounds - answer 416
    NotSatisfiable,
    /// No Range header - serve full content
    None,
}

/// Parse an HTTP Range header against a resource of `file_size` bytes
///
/// Supported formats:
/// - `bytes=start-end` - Specific range, `end` clamped to `file_size - 1`
/// - `bytes=start-` - From start to end of file
/// - `bytes=-suffix` - Last `suffix` bytes
///
/// Multi-range headers (`bytes=0-9,20-29`) are rejected as not satisfiable.
pub fn parse_range_header(range_header: Option<&str>, file_size: u64) -> RangeParseResult {
    let Some(header) = range_header else {
        return RangeParseResult::None;
    };

    let Some((unit, spec)) = header.trim().split_once('=') else {
        return RangeParseResult::NotSatisfiable;
    };
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return RangeParseResult::NotSatisfiable;
    }

    if spec.contains(',') {
        return RangeParseResult::NotSatisfiable;
    }

    let Some((start_str, end_str)) = spec.split_once('-') else {
        return RangeParseResult::NotSatisfiable;
    };

    // An empty resource has no byte to point at
    if file_size == 0 {
        return RangeParseResult::NotSatisfiable;
    }

    let (start_str, end_str) = (start_str.trim(), end_str.trim());
    let range = if start_str.is_empty() {
        parse_suffix_range(end_str, file_size)
    } else {
        parse_standard_range(start_str, end_str, file_size)
    };

    range.map_or(RangeParseResult::NotSatisfiable, RangeParseResult::Valid)
}

/// Parse suffix range (e.g., "-500")
fn parse_suffix_range(suffix_str: &str, file_size: u64) -> Option<RangeRequest> {
    let suffix = parse_position(suffix_str)?;
    if suffix == 0 {
        return None;
    }

    // Suffix larger than the file selects the whole file
    Some(RangeRequest {
        start: file_size.saturating_sub(suffix),
        end: file_size - 1,
    })
}

/// Parse standard range (e.g., "0-99" or "100-")
fn parse_standard_range(start_str: &str, end_str: &str, file_size: u64) -> Option<RangeRequest> {
    let last = file_size - 1;
    let start = parse_position(start_str)?;
    if start > last {
        return None;
    }

    let end = if end_str.is_empty() {
        last
    } else {
        let parsed = parse_position(end_str)?;
        if parsed < start {
            return None;
        }
        parsed.min(last)
    };

    Some(RangeRequest { start, end })
}

/// Byte positions are plain ASCII digits; `u64::from_str` would also take a `+` sign.
fn parse_position(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
