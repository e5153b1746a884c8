//! HTTP head processing: the incremental tokenizer plus request and response head codecs.
//!
//! # Components
//!
//! - [`HeadParser`]: split-invariant tokenizer shared by request heads, response heads and
//!   multipart part headers
//! - [`RequestHeadDecoder`] / [`RequestHeadEncoder`]: server side decoding, client side encoding
//! - [`ResponseHeadDecoder`] / [`ResponseHeadEncoder`]: client side decoding, server side encoding
//!
//! Decoders also decide how the following body is framed and report it as a [`PayloadSize`].
//!
//! [`PayloadSize`]: crate::protocol::PayloadSize

mod parser;
mod request_head;
mod response_head;

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::HeaderMap;

pub use parser::{DEFAULT_MAX_HEAD_BYTES, DEFAULT_MAX_HEADERS, HeadKind, HeadParser, HeadSink, Token};
pub use request_head::{RequestHead, RequestHeadDecoder, RequestHeadEncoder};
pub use response_head::{ResponseHeadDecoder, ResponseHeadEncoder};

pub(crate) use request_head::{append_header, content_length, is_chunked};

/// Initial buffer size allocated for head serialization
pub(crate) const INIT_HEADER_SIZE: usize = 4 * 1024;

fn write_headers(headers: &HeaderMap, dst: &mut BytesMut) {
    for (header_name, header_value) in headers {
        dst.put_slice(header_name.as_ref());
        dst.put_slice(b": ");
        dst.put_slice(header_value.as_ref());
        dst.put_slice(b"\r\n");
    }
}

/// Fast writer implementation for writing to BytesMut.
///
/// Lets `write!` format straight into the buffer reserved by the encoders.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
