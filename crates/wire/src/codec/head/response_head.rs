//! Response head decoding and encoding.
//!
//! The encoder serializes the server's [`ResponseHead`] and writes the framing header that
//! matches the [`PayloadSize`]; the decoder parses what a client reads back off the wire.

use std::io;
use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderValue, Method, StatusCode, Version};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{error, trace};

use crate::codec::head::parser::{HeadKind, HeadParser, Token};
use crate::codec::head::{FastWrite, INIT_HEADER_SIZE, append_header, content_length, is_chunked, write_headers};
use crate::protocol::{ContentState, ParseError, PayloadSize, ResponseFrame, ResponseHead, SendError};

/// Encoder for HTTP response heads implementing the [`Encoder`] trait.
///
/// This encoder serializes a [`ResponseHead`] and [`PayloadSize`] into raw bytes,
/// rewriting the Content-Length or Transfer-Encoding header from the payload size.
/// Statuses that never carry a body (1xx, 204) get no framing header at all.
pub struct ResponseHeadEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for ResponseHeadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        let version = match header.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };
        let status = header.status();
        write!(FastWrite(dst), "{} {} {}\r\n", version, status.as_str(), status.canonical_reason().unwrap_or(""))?;

        let headers = header.headers_mut();
        if status.is_informational() || status == StatusCode::NO_CONTENT {
            headers.remove(CONTENT_LENGTH);
            headers.remove(TRANSFER_ENCODING);
        } else {
            match payload_size {
                PayloadSize::Length(n) => {
                    headers.remove(TRANSFER_ENCODING);
                    headers.insert(CONTENT_LENGTH, n.into());
                }
                PayloadSize::Chunked => {
                    headers.remove(CONTENT_LENGTH);
                    headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
                }
                // a 304 keeps whatever length the handler declared for the selected representation
                PayloadSize::Empty if status == StatusCode::NOT_MODIFIED => {}
                PayloadSize::Empty => {
                    const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");
                    headers.remove(TRANSFER_ENCODING);
                    headers.insert(CONTENT_LENGTH, ZERO_VALUE);
                }
                PayloadSize::UntilEof => {
                    headers.remove(CONTENT_LENGTH);
                    headers.remove(TRANSFER_ENCODING);
                }
            }
        }

        write_headers(header.headers(), dst);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Decoder for response heads implementing the [`Decoder`] trait.
///
/// Framing of the following body depends on the request that was sent, so the caller names
/// the request method through [`expect_response_to`](Self::expect_response_to).
#[derive(Debug)]
pub struct ResponseHeadDecoder {
    parser: HeadParser,
    request_method: Method,
}

impl ResponseHeadDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_limits(max_head_bytes: usize, max_headers: usize) -> Self {
        Self { parser: HeadParser::with_limits(HeadKind::Response, max_head_bytes, max_headers), request_method: Method::GET }
    }

    /// Records the method of the request the next response answers.
    pub fn expect_response_to(&mut self, method: &Method) {
        self.request_method = method.clone();
        self.parser.reset();
    }
}

impl Default for ResponseHeadDecoder {
    fn default() -> Self {
        Self { parser: HeadParser::new(HeadKind::Response), request_method: Method::GET }
    }
}

impl Decoder for ResponseHeadDecoder {
    type Item = (ResponseFrame, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut frame = ResponseFrame::new();

        let Some(consumed) = self.parser.parse(src, &mut |token: Token<'_>| apply_token(&mut frame, token))? else {
            return Ok(None);
        };

        trace!(head_size = consumed, "parsed response head");
        let _ = src.split_to(consumed);
        frame.finish_head();

        let payload_size = parse_payload(&frame, &self.request_method)?;
        let mut content = ContentState::from(payload_size);
        if let PayloadSize::Length(length) = payload_size {
            content.set_prefetch(length.min(src.len() as u64));
        }
        *frame.content_mut() = content;

        Ok(Some((frame, payload_size)))
    }
}

fn apply_token(frame: &mut ResponseFrame, token: Token<'_>) -> Result<(), ParseError> {
    match token {
        Token::Version(version) => frame.set_version(version),
        Token::Status(code) => frame.set_status(StatusCode::from_u16(code).map_err(ParseError::invalid_status)?),
        Token::Reason(reason) => frame.set_reason(&String::from_utf8_lossy(reason)),
        Token::Header(name, value) => append_header(frame.headers_mut(), name, value)?,
        Token::Method(_) | Token::Path(_) | Token::Query(_) => {
            return Err(ParseError::invalid_status("request line in response head"));
        }
    }
    Ok(())
}

/// Determines how a response body is framed, per RFC 9112 section 6.3.
fn parse_payload(frame: &ResponseFrame, request_method: &Method) -> Result<PayloadSize, ParseError> {
    let status = frame.status().ok_or_else(|| ParseError::invalid_status("missing status line"))?;
    if *request_method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Ok(PayloadSize::Empty);
    }

    let te_header = frame.headers().get(TRANSFER_ENCODING);
    if te_header.is_some() {
        // transfer-encoding overrides content-length
        return Ok(if is_chunked(te_header) { PayloadSize::Chunked } else { PayloadSize::UntilEof });
    }

    if frame.headers().contains_key(CONTENT_LENGTH) {
        return content_length(frame.headers()).map(PayloadSize::new_length);
    }

    Ok(PayloadSize::UntilEof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Response;
    use indoc::indoc;

    fn encode(head: ResponseHead, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        ResponseHeadEncoder.encode((head, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn encode_with_length() {
        let head = Response::builder().status(StatusCode::OK).header("content-type", "text/plain").body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Length(12)), "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 12\r\n\r\n");
    }

    #[test]
    fn encode_chunked_replaces_length() {
        let head = Response::builder().status(StatusCode::OK).header("content-length", "3").body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Chunked), "HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n");
    }

    #[test]
    fn encode_empty_and_bodyless_status() {
        let head = Response::builder().status(StatusCode::NOT_FOUND).body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Empty), "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n");

        let head = Response::builder().status(StatusCode::SWITCHING_PROTOCOLS).header("upgrade", "websocket").body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Empty), "HTTP/1.1 101 Switching Protocols\r\nupgrade: websocket\r\n\r\n");

        let head = Response::builder().status(StatusCode::NO_CONTENT).header("content-length", "0").body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Empty), "HTTP/1.1 204 No Content\r\n\r\n");
    }

    #[test]
    fn encode_http_10() {
        let head = Response::builder().status(StatusCode::OK).version(Version::HTTP_10).body(()).unwrap();
        assert!(encode(head, PayloadSize::Length(1)).starts_with("HTTP/1.0 200 OK\r\n"));
    }

    #[test]
    fn decode_response_with_length() {
        let str = indoc! {"
            HTTP/1.1 200 OK\r
            Content-Type: text/plain\r
            Content-Length: 5\r
            Set-Cookie: id=1\r
            \r
            hello"};
        let mut buf = BytesMut::from(str);
        let (frame, payload_size) = ResponseHeadDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(frame.status(), Some(StatusCode::OK));
        assert_eq!(frame.reason(), "OK");
        assert_eq!(frame.cookies(), &["id=1".to_string()]);
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(frame.content().prefetch(), 5);
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn response_framing_rules() {
        let decode = |raw: &str, method: Method| {
            let mut decoder = ResponseHeadDecoder::new();
            decoder.expect_response_to(&method);
            decoder.decode(&mut BytesMut::from(raw)).unwrap().unwrap().1
        };

        assert_eq!(decode("HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n", Method::HEAD), PayloadSize::Empty);
        assert_eq!(decode("HTTP/1.1 304 Not Modified\r\nContent-Length: 5\r\n\r\n", Method::GET), PayloadSize::Empty);
        assert_eq!(decode("HTTP/1.1 100 Continue\r\n\r\n", Method::POST), PayloadSize::Empty);
        assert_eq!(decode("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n", Method::GET), PayloadSize::Chunked);
        assert_eq!(decode("HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip\r\n\r\n", Method::GET), PayloadSize::UntilEof);
        assert_eq!(decode("HTTP/1.0 200 OK\r\n\r\n", Method::GET), PayloadSize::UntilEof);
    }

    #[test]
    fn encoded_head_decodes_back() {
        let head = Response::builder().status(StatusCode::CREATED).header("location", "/item/1").body(()).unwrap();
        let mut buf = BytesMut::from(encode(head, PayloadSize::Length(2)).as_str());

        let (frame, payload_size) = ResponseHeadDecoder::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.status(), Some(StatusCode::CREATED));
        assert_eq!(frame.headers().get("location").unwrap(), "/item/1");
        assert_eq!(payload_size, PayloadSize::Length(2));
        assert!(frame.keep_alive());
    }
}
