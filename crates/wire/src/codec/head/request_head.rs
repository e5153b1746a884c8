//! Request head decoding and encoding.
//!
//! [`RequestHeadDecoder`] drives a [`HeadParser`] in request mode and collects its tokens into a
//! recycled [`RequestFrame`], then decides how the body is framed. [`RequestHeadEncoder`] is
//! the client side counterpart writing a request line plus headers.

use std::io;
use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{error, trace};

use crate::codec::head::parser::{HeadKind, HeadParser, Token};
use crate::codec::head::{FastWrite, INIT_HEADER_SIZE, write_headers};
use crate::protocol::{ContentState, ParseError, PayloadSize, RequestFrame, SendError};

/// Decoder for request heads implementing the [`Decoder`] trait.
///
/// Each decoded item carries the frame and how its body is framed. Frames handed back
/// through [`recycle`](Self::recycle) are reused for the next request.
#[derive(Debug)]
pub struct RequestHeadDecoder {
    parser: HeadParser,
    spare: Option<RequestFrame>,
}

impl RequestHeadDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_limits(max_head_bytes: usize, max_headers: usize) -> Self {
        Self { parser: HeadParser::with_limits(HeadKind::Request, max_head_bytes, max_headers), spare: None }
    }

    /// Returns a finished frame so its allocations serve the next request.
    pub fn recycle(&mut self, mut frame: RequestFrame) {
        frame.reset();
        self.spare = Some(frame);
    }

    /// Clears the scan position, needed when the read buffer was replaced.
    pub fn reset(&mut self) {
        self.parser.reset();
    }
}

impl Default for RequestHeadDecoder {
    fn default() -> Self {
        Self { parser: HeadParser::new(HeadKind::Request), spare: None }
    }
}

impl Decoder for RequestHeadDecoder {
    type Item = (RequestFrame, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode a request head from the provided bytes buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((frame, payload_size)))` once a complete head was parsed, the head bytes are
    ///   removed from `src`
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if parsing failed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut frame = self.spare.take().unwrap_or_default();
        frame.reset();

        let parsed = self.parser.parse(src, &mut |token: Token<'_>| apply_token(&mut frame, token));
        let consumed = match parsed {
            Ok(Some(consumed)) => consumed,
            Ok(None) => {
                self.spare = Some(frame);
                return Ok(None);
            }
            Err(e) => {
                self.spare = Some(frame);
                return Err(e);
            }
        };

        trace!(head_size = consumed, "parsed request head");
        let _ = src.split_to(consumed);
        frame.finish_head();

        let payload_size = parse_payload(&frame)?;
        let mut content = ContentState::from(payload_size);
        if let PayloadSize::Length(length) = payload_size {
            content.set_prefetch(length.min(src.len() as u64));
        } else if payload_size.is_chunked() {
            content.set_prefetch(src.len() as u64);
        }
        *frame.content_mut() = content;

        Ok(Some((frame, payload_size)))
    }
}

fn apply_token(frame: &mut RequestFrame, token: Token<'_>) -> Result<(), ParseError> {
    match token {
        Token::Method(method) => frame.set_method(Method::from_bytes(method).map_err(|_| ParseError::InvalidMethod)?),
        Token::Path(path) => frame.set_target(std::str::from_utf8(path).map_err(|_| ParseError::InvalidUri)?, None),
        Token::Query(query) => {
            let query = std::str::from_utf8(query).map_err(|_| ParseError::InvalidUri)?;
            frame.set_target("", Some(query));
        }
        Token::Version(version) => frame.set_version(version),
        Token::Header(name, value) => append_header(frame.headers_mut(), name, value)?,
        Token::Status(_) | Token::Reason(_) => return Err(ParseError::invalid_header("status line in request head")),
    }
    Ok(())
}

pub(crate) fn append_header(headers: &mut HeaderMap, name: &[u8], value: &[u8]) -> Result<(), ParseError> {
    let name = HeaderName::from_bytes(name).map_err(ParseError::invalid_header)?;
    let value = HeaderValue::from_bytes(value).map_err(ParseError::invalid_header)?;
    headers.append(name, value);
    Ok(())
}

/// Determines how a request body is framed, per RFC 9112 section 6.3.
///
/// The method plays no part, a `GET` with `Content-Length` has a body like any other request.
///
/// - no body when neither header is present
/// - chunked when `Transfer-Encoding` ends with `chunked`
/// - fixed length from `Content-Length`
///
/// # Errors
///
/// Returns `ParseError` if:
/// - Both Content-Length and Transfer-Encoding headers are present
/// - Transfer-Encoding does not end with chunked
/// - Content-Length values are invalid or disagree
fn parse_payload(frame: &RequestFrame) -> Result<PayloadSize, ParseError> {
    let te_header = frame.headers().get(TRANSFER_ENCODING);
    let has_cl = frame.headers().contains_key(CONTENT_LENGTH);

    match (te_header, has_cl) {
        (None, false) => Ok(PayloadSize::Empty),

        (Some(te_value), false) => {
            if is_chunked(Some(te_value)) {
                Ok(PayloadSize::Chunked)
            } else {
                Err(ParseError::invalid_body("transfer-encoding of a request must end with chunked"))
            }
        }

        (None, true) => content_length(frame.headers()).map(PayloadSize::new_length),

        (Some(_), true) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
    }
}

/// Reads `Content-Length`, all occurrences must agree.
pub(crate) fn content_length(headers: &HeaderMap) -> Result<u64, ParseError> {
    let mut length = None;
    for cl_value in headers.get_all(CONTENT_LENGTH) {
        let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;
        for item in cl_str.split(',') {
            let item = item.trim();
            if item.is_empty() || !item.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::invalid_content_length(format!("value {cl_str} is not u64")));
            }
            let value = item.parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;
            match length {
                Some(previous) if previous != value => {
                    return Err(ParseError::invalid_content_length("conflicting content_length values"));
                }
                _ => length = Some(value),
            }
        }
    }
    length.ok_or_else(|| ParseError::invalid_content_length("empty content_length"))
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// According to RFC 9112, chunked must be the last encoding if present.
pub(crate) fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value {
        if let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next() {
            return bytes.trim_ascii().eq_ignore_ascii_case(CHUNKED);
        }
    }
    false
}

/// The head of an outbound request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// origin-form target, path plus optional query
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self { method, target: target.into(), version: Version::HTTP_11, headers: HeaderMap::new() }
    }
}

/// Encoder for request heads implementing the [`Encoder`] trait.
///
/// Framing headers are rewritten from the [`PayloadSize`]: `Content-Length` for sized bodies,
/// `Transfer-Encoding: chunked` otherwise. Empty bodies get no framing header.
pub struct RequestHeadEncoder;

impl Encoder<(RequestHead, PayloadSize)> for RequestHeadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (RequestHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        let version = match head.version {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };
        if head.target.is_empty() || head.target.bytes().any(|b| !(0x21..=0x7e).contains(&b)) {
            return Err(SendError::invalid_body(format!("invalid request target {:?}", head.target)));
        }
        write!(FastWrite(dst), "{} {} {}\r\n", head.method.as_str(), head.target, version)?;

        match payload_size {
            PayloadSize::Length(n) => {
                head.headers.remove(TRANSFER_ENCODING);
                head.headers.insert(CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                head.headers.remove(CONTENT_LENGTH);
                head.headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            PayloadSize::Empty | PayloadSize::UntilEof => {}
        }

        write_headers(&head.headers, dst);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn check_is_chunked() {
        {
            let headers = HeaderMap::new();
            assert!(!is_chunked(headers.get(TRANSFER_ENCODING)))
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Accept", "foo".parse().unwrap());
            headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
            assert!(is_chunked(headers.get(TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
            assert!(!is_chunked(headers.get(TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "gzip".parse().unwrap());
            assert!(!is_chunked(headers.get(TRANSFER_ENCODING)));
        }
    }

    #[test]
    fn test_bytes_mut_lens() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##};

        let mut bytes = BytesMut::from(str);
        let mut decoder = RequestHeadDecoder::new();
        let result = decoder.decode(&mut bytes).unwrap();

        assert!(result.is_some());
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);
        let (frame, payload_size) = RequestHeadDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert!(frame.content().is_finalized());

        assert_eq!(frame.method(), &Method::GET);
        assert_eq!(frame.version(), Version::HTTP_11);
        assert_eq!(frame.path(), "/index.html");
        assert_eq!(frame.query(), None);
        assert_eq!(frame.headers().len(), 3);
        assert_eq!(frame.headers().get(http::header::HOST), Some(&HeaderValue::from_static("127.0.0.1:8080")));
        assert_eq!(frame.headers().get(http::header::USER_AGENT), Some(&HeaderValue::from_static("curl/7.79.1")));
    }

    #[test]
    fn from_edge() {
        let str = indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        Cache-Control: max-age=0
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        sec-ch-ua-mobile: ?0
        sec-ch-ua-platform: "macOS"
        Upgrade-Insecure-Requests: 1
        User-Agent: Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36 Edg/109.0.1518.52
        Accept: text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9
        Sec-Fetch-Site: none
        Sec-Fetch-Mode: navigate
        Sec-Fetch-User: ?1
        Sec-Fetch-Dest: document
        Accept-Encoding: gzip, deflate, br
        Accept-Language: zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7
        Cookie: session=abc; theme=dark

        "##};

        let mut buf = BytesMut::from(str);
        let (frame, payload_size) = RequestHeadDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert_eq!(frame.path(), "/index/");
        assert_eq!(frame.query(), Some("a=1&b=2&a=3"));
        assert_eq!(frame.headers().len(), 16);
        assert_eq!(
            frame.headers().get("sec-ch-ua"),
            Some(&HeaderValue::from_static(r##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##))
        );
        assert_eq!(frame.headers().get(http::header::ACCEPT_ENCODING), Some(&HeaderValue::from_static("gzip, deflate, br")));
        assert_eq!(frame.cookie("session"), Some("abc"));
        assert_eq!(frame.cookie("theme"), Some("dark"));
        assert!(frame.wants_keep_alive());
    }

    #[test]
    fn post_with_content_length_reports_prefetch() {
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello");
        let (frame, payload_size) = RequestHeadDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(payload_size, PayloadSize::Length(10));
        assert_eq!(frame.content().length(), 10);
        assert_eq!(frame.content().prefetch(), 5);
        assert!(!frame.content().is_finalized());
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn content_length_zero_finalizes() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        let (frame, payload_size) = RequestHeadDecoder::new().decode(&mut buf).unwrap().unwrap();
        assert!(payload_size.is_empty());
        assert!(frame.content().is_finalized());
    }

    #[test]
    fn get_with_content_length_has_body() {
        let mut buf = BytesMut::from("GET /a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        let (frame, payload_size) = RequestHeadDecoder::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(frame.content().prefetch(), 5);
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn delete_with_chunked_body() {
        let mut buf = BytesMut::from("DELETE /a HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n0\r\n\r\n");
        let (frame, payload_size) = RequestHeadDecoder::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.method(), &Method::DELETE);
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn invalid_framing() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 1\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert!(matches!(RequestHeadDecoder::new().decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));

        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\n");
        assert!(matches!(RequestHeadDecoder::new().decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));

        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: +1\r\n\r\n");
        assert!(matches!(RequestHeadDecoder::new().decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));

        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n");
        assert!(matches!(RequestHeadDecoder::new().decode(&mut buf), Err(ParseError::InvalidBody { .. })));
    }

    #[test]
    fn partial_head_keeps_buffer() {
        let mut decoder = RequestHeadDecoder::new();
        let mut buf = BytesMut::from("PUT /a HTTP/1.1\r\nTransfer-Encoding: chunked\r\n");
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 45);

        buf.extend_from_slice(b"\r\n4\r\nWiki");
        let (frame, payload_size) = decoder.decode(&mut buf).unwrap().unwrap();
        assert!(payload_size.is_chunked());
        assert!(!frame.content().is_limited());
        assert_eq!(frame.content().prefetch(), 7);
    }

    #[test]
    fn recycled_frame_is_clean() {
        let mut decoder = RequestHeadDecoder::new();
        let mut buf = BytesMut::from("GET /first?x=1 HTTP/1.1\r\nCookie: a=1\r\n\r\nGET /second HTTP/1.0\r\n\r\n");

        let (first, _) = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.path(), "/first");
        decoder.recycle(first);

        let (second, _) = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.path(), "/second");
        assert_eq!(second.query(), None);
        assert_eq!(second.version(), Version::HTTP_10);
        assert!(second.headers().is_empty());
        assert!(second.cookies().is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_request_head() {
        let mut head = RequestHead::new(Method::POST, "/submit?a=1");
        head.headers.insert(http::header::HOST, HeaderValue::from_static("example.com"));
        head.headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let mut dst = BytesMut::new();
        RequestHeadEncoder.encode((head, PayloadSize::Length(3)), &mut dst).unwrap();

        assert_eq!(&dst[..], b"POST /submit?a=1 HTTP/1.1\r\nhost: example.com\r\ncontent-length: 3\r\n\r\n");
    }

    #[test]
    fn encoded_request_parses_back() {
        let mut head = RequestHead::new(Method::PUT, "/x");
        head.headers.insert(http::header::HOST, HeaderValue::from_static("h"));

        let mut dst = BytesMut::new();
        RequestHeadEncoder.encode((head, PayloadSize::Chunked), &mut dst).unwrap();

        let (frame, payload_size) = RequestHeadDecoder::new().decode(&mut dst).unwrap().unwrap();
        assert_eq!(frame.method(), &Method::PUT);
        assert!(payload_size.is_chunked());
    }
}
