//! `Range: bytes=...` requests (RFC 9110 §14).

use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::multipart::generate_boundary;

/// One `first-last` spec of a range header, either bound may be missing.
///
/// `bytes=5-` has no end, `bytes=-5` has no start and means the last five bytes; a spec with
/// neither bound covers the whole resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn full() -> Self {
        Self { start: None, end: None }
    }

    /// Clamps the spec to `[0, len)`, `None` when nothing of the resource is selected.
    pub fn resolve(&self, len: u64) -> Option<Range<u64>> {
        let range = match (self.start, self.end) {
            (None, None) => 0..len,
            (Some(start), None) => start..len,
            (Some(start), Some(end)) => start..end.saturating_add(1).min(len),
            (None, Some(suffix)) => len.saturating_sub(suffix)..len,
        };
        (range.start < range.end).then_some(range)
    }
}

/// What a range header asks of a resource of a given length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeRequest {
    /// Malformed or not a bytes range: serve the whole resource.
    Ignore,
    Satisfiable(Vec<Range<u64>>),
    Unsatisfiable,
}

/// Parses the header's specs without looking at the resource length.
pub fn parse_ranges(header: &str) -> Option<Vec<ByteRange>> {
    let specs = header.trim().strip_prefix("bytes=")?;
    let mut ranges = Vec::new();
    for spec in specs.split(',') {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        let (start, end) = spec.split_once('-')?;
        let parse = |s: &str| -> Option<Option<u64>> {
            let s = s.trim();
            if s.is_empty() { Some(None) } else { s.parse().ok().map(Some) }
        };
        let range = ByteRange { start: parse(start)?, end: parse(end)? };
        match range {
            ByteRange { start: None, end: None } => return None,
            ByteRange { start: Some(start), end: Some(end) } if end < start => return None,
            _ => ranges.push(range),
        }
    }
    (!ranges.is_empty()).then_some(ranges)
}

/// Resolves a range header against a resource of `len` bytes.
pub fn select_ranges(header: &str, len: u64) -> RangeRequest {
    let Some(ranges) = parse_ranges(header) else {
        return RangeRequest::Ignore;
    };
    let selected: Vec<_> = ranges.iter().filter_map(|range| range.resolve(len)).collect();
    if selected.is_empty() { RangeRequest::Unsatisfiable } else { RangeRequest::Satisfiable(selected) }
}

pub fn content_range(range: &Range<u64>, len: u64) -> String {
    format!("bytes {}-{}/{}", range.start, range.end - 1, len)
}

pub fn unsatisfied_range(len: u64) -> String {
    format!("bytes */{len}")
}

/// A `multipart/byteranges` body for several ranges of `body`, with its content type.
pub fn byteranges_body(body: &Bytes, ranges: &[Range<u64>], content_type: Option<&str>) -> (String, Bytes) {
    let boundary = generate_boundary();
    let len = body.len() as u64;
    let mut out = BytesMut::new();
    for range in ranges {
        out.put_slice(b"--");
        out.put_slice(boundary.as_bytes());
        out.put_slice(b"\r\n");
        if let Some(content_type) = content_type {
            out.put_slice(b"Content-Type: ");
            out.put_slice(content_type.as_bytes());
            out.put_slice(b"\r\n");
        }
        out.put_slice(b"Content-Range: ");
        out.put_slice(content_range(range, len).as_bytes());
        out.put_slice(b"\r\n\r\n");
        out.put_slice(&body[range.start as usize..range.end as usize]);
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"--");
    out.put_slice(boundary.as_bytes());
    out.put_slice(b"--\r\n");
    (format!("multipart/byteranges; boundary={boundary}"), out.freeze())
}
