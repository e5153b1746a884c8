//! Response composition: `Date` and `Connection` headers, compression and byte ranges.

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{
    ACCEPT_RANGES, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, DATE, VARY,
};
use http::response::Parts;
use http::{HeaderMap, HeaderValue, StatusCode};
use tracing::trace;

use crate::connection::encoding::Encoder;
use crate::connection::range::{RangeRequest, byteranges_body, content_range, select_ranges, unsatisfied_range};
use crate::protocol::SendError;

/// The formatted `Date` value, refreshed at most twice a second.
#[derive(Debug)]
pub(crate) struct HttpDate {
    value: Option<HeaderValue>,
    at: Instant,
}

impl HttpDate {
    const REFRESH: Duration = Duration::from_millis(500);

    pub(crate) fn new() -> Self {
        Self { value: None, at: Instant::now() }
    }

    pub(crate) fn get(&mut self) -> Option<HeaderValue> {
        if self.value.is_none() || self.at.elapsed() >= Self::REFRESH {
            let mut buf = faf_http_date::get_date_buff_no_key();
            faf_http_date::get_date_no_key(&mut buf);
            self.value = HeaderValue::from_bytes(&buf).ok();
            self.at = Instant::now();
        }
        self.value.clone()
    }
}

/// What the request asked for that shapes its response.
#[derive(Debug, Default)]
pub(crate) struct Negotiation {
    pub(crate) head_request: bool,
    pub(crate) get_request: bool,
    pub(crate) keep_alive: bool,
    pub(crate) accept_encoding: Option<String>,
    pub(crate) range: Option<String>,
    pub(crate) compress: bool,
    pub(crate) ranges: bool,
    pub(crate) compress_min_size: usize,
}

impl Negotiation {
    fn range_applies(&self, parts: &Parts) -> bool {
        self.ranges
            && self.get_request
            && self.range.is_some()
            && parts.status == StatusCode::OK
            && !parts.headers.contains_key(CONTENT_ENCODING)
    }

    fn compression_applies(&self, parts: &Parts) -> bool {
        self.compress
            && self.accept_encoding.is_some()
            && parts.status.is_success()
            && parts.status != StatusCode::NO_CONTENT
            && parts.status != StatusCode::PARTIAL_CONTENT
            && !parts.headers.contains_key(CONTENT_ENCODING)
    }

    /// Whether the body must be in memory before the head can be written.
    pub(crate) fn needs_full_body(&self, parts: &Parts, size_hint: Option<u64>) -> bool {
        if self.range_applies(parts) {
            return true;
        }
        self.compression_applies(parts) && size_hint.is_none_or(|size| size >= self.compress_min_size as u64)
    }

    /// Applies ranges or compression to a fully buffered body.
    pub(crate) fn shape(&self, parts: &mut Parts, body: Bytes) -> Result<Bytes, SendError> {
        if self.range_applies(parts) {
            if let Some(range) = &self.range {
                return Ok(apply_range(parts, range, body));
            }
        }

        if self.compression_applies(parts) && body.len() >= self.compress_min_size {
            if let Some(encoder) = self.accept_encoding.as_deref().and_then(Encoder::select) {
                let name = encoder.name();
                let encoded = encoder.encode(&body)?;
                parts.headers.remove(CONTENT_LENGTH);
                parts.headers.insert(CONTENT_ENCODING, HeaderValue::from_static(name));
                parts.headers.append(VARY, HeaderValue::from_static("accept-encoding"));
                return Ok(encoded);
            }
        }
        Ok(body)
    }

    /// Adds `Date`, `Connection` and `Accept-Ranges`.
    pub(crate) fn finish_head(&self, headers: &mut HeaderMap, date: &mut HttpDate, status: StatusCode) {
        if !headers.contains_key(DATE) {
            if let Some(date) = date.get() {
                headers.insert(DATE, date);
            }
        }
        if self.ranges && status == StatusCode::OK && !headers.contains_key(ACCEPT_RANGES) {
            headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }
        let directive = if self.keep_alive { "keep-alive" } else { "close" };
        headers.insert(CONNECTION, HeaderValue::from_static(directive));
    }
}

fn apply_range(parts: &mut Parts, range: &str, body: Bytes) -> Bytes {
    let len = body.len() as u64;
    match select_ranges(range, len) {
        RangeRequest::Ignore => body,
        RangeRequest::Unsatisfiable => {
            trace!(range, len, "unsatisfiable range");
            parts.status = StatusCode::RANGE_NOT_SATISFIABLE;
            parts.headers.remove(CONTENT_LENGTH);
            set_header(&mut parts.headers, CONTENT_RANGE, unsatisfied_range(len));
            Bytes::new()
        }
        RangeRequest::Satisfiable(ranges) if ranges.len() == 1 => {
            let range = &ranges[0];
            parts.status = StatusCode::PARTIAL_CONTENT;
            parts.headers.remove(CONTENT_LENGTH);
            set_header(&mut parts.headers, CONTENT_RANGE, content_range(range, len));
            body.slice(range.start as usize..range.end as usize)
        }
        RangeRequest::Satisfiable(ranges) => {
            let content_type = parts.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok());
            let (multipart_type, encoded) = byteranges_body(&body, &ranges, content_type);
            parts.status = StatusCode::PARTIAL_CONTENT;
            parts.headers.remove(CONTENT_LENGTH);
            set_header(&mut parts.headers, CONTENT_TYPE, multipart_type);
            encoded
        }
    }
}

fn set_header(headers: &mut HeaderMap, name: http::header::HeaderName, value: String) {
    if let Ok(value) = HeaderValue::try_from(value) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Response;

    fn parts(status: StatusCode) -> Parts {
        Response::builder().status(status).header(CONTENT_TYPE, "text/plain").body(()).unwrap().into_parts().0
    }

    fn negotiation() -> Negotiation {
        Negotiation { get_request: true, keep_alive: true, ranges: true, compress: true, compress_min_size: 16, ..Default::default() }
    }

    #[test]
    fn single_range() {
        let negotiation = Negotiation { range: Some("bytes=2-4".into()), ..negotiation() };
        let mut parts = parts(StatusCode::OK);
        assert!(negotiation.needs_full_body(&parts, Some(10)));

        let body = negotiation.shape(&mut parts, Bytes::from_static(b"0123456789")).unwrap();
        assert_eq!(parts.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(parts.headers[CONTENT_RANGE], "bytes 2-4/10");
        assert_eq!(body, "234");
    }

    #[test]
    fn multiple_ranges() {
        let negotiation = Negotiation { range: Some("bytes=0-0,-1".into()), ..negotiation() };
        let mut parts = parts(StatusCode::OK);
        let body = negotiation.shape(&mut parts, Bytes::from_static(b"0123456789")).unwrap();

        assert_eq!(parts.status, StatusCode::PARTIAL_CONTENT);
        let content_type = parts.headers[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/byteranges; boundary=----0x"));
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Content-Type: text/plain\r\nContent-Range: bytes 0-0/10\r\n\r\n0\r\n"));
        assert!(text.contains("Content-Range: bytes 9-9/10\r\n\r\n9\r\n"));
    }

    #[test]
    fn unsatisfiable_range() {
        let negotiation = Negotiation { range: Some("bytes=50-".into()), ..negotiation() };
        let mut parts = parts(StatusCode::OK);
        let body = negotiation.shape(&mut parts, Bytes::from_static(b"0123456789")).unwrap();

        assert_eq!(parts.status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(parts.headers[CONTENT_RANGE], "bytes */10");
        assert!(body.is_empty());
    }

    #[test]
    fn range_only_on_ok_get() {
        let negotiation = Negotiation { range: Some("bytes=0-1".into()), compress: false, ..negotiation() };
        assert!(!negotiation.needs_full_body(&parts(StatusCode::NOT_FOUND), Some(10)));

        let head = Negotiation { get_request: false, ..negotiation };
        assert!(!head.needs_full_body(&parts(StatusCode::OK), Some(10)));
    }

    #[test]
    fn compression() {
        let negotiation = Negotiation { accept_encoding: Some("gzip".into()), ..negotiation() };
        let mut parts = parts(StatusCode::OK);
        assert!(!negotiation.needs_full_body(&parts, Some(4)));
        assert!(negotiation.needs_full_body(&parts, None));

        let small = negotiation.shape(&mut parts, Bytes::from_static(b"tiny")).unwrap();
        assert_eq!(small, "tiny");
        assert!(!parts.headers.contains_key(CONTENT_ENCODING));

        let body = Bytes::from("a".repeat(1000));
        let encoded = negotiation.shape(&mut parts, body).unwrap();
        assert_eq!(parts.headers[CONTENT_ENCODING], "gzip");
        assert_eq!(parts.headers[VARY], "accept-encoding");
        assert!(encoded.len() < 1000);
    }

    #[test]
    fn head_directives() {
        let mut date = HttpDate::new();
        let mut headers = HeaderMap::new();
        negotiation().finish_head(&mut headers, &mut date, StatusCode::OK);
        assert_eq!(headers[CONNECTION], "keep-alive");
        assert_eq!(headers[ACCEPT_RANGES], "bytes");
        assert!(headers[DATE].to_str().unwrap().ends_with("GMT"));

        let closing = Negotiation { keep_alive: false, ..Default::default() };
        let mut headers = HeaderMap::new();
        closing.finish_head(&mut headers, &mut date, StatusCode::NOT_FOUND);
        assert_eq!(headers[CONNECTION], "close");
        assert!(!headers.contains_key(ACCEPT_RANGES));
    }
}
