//! Server side response encoding: a head followed by payload items.

use crate::codec::body::PayloadEncoder;
use crate::codec::head::ResponseHeadEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes [`Message`]s carrying a response head and then its payload items.
///
/// A head must be followed by payload items, closed by [`PayloadItem::Eof`], before the next
/// head is accepted.
///
/// [`PayloadItem::Eof`]: crate::protocol::PayloadItem::Eof
pub struct ResponseEncoder {
    head_encoder: ResponseHeadEncoder,
    payload_encoder: Option<PayloadEncoder>,
    head_only: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Answering a `HEAD` request: the next head keeps its framing headers but payload
    /// chunks are dropped.
    pub fn set_head_only(&mut self, head_only: bool) {
        self.head_only = head_only;
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { head_encoder: ResponseHeadEncoder, payload_encoder: None, head_only: false }
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                // interim responses are followed by the final one, never by a body
                if !head.status().is_informational() {
                    self.payload_encoder =
                        Some(if self.head_only { PayloadEncoder::empty() } else { payload_size.into() });
                }
                self.head_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let payload_encoder = if let Some(encoder) = &mut self.payload_encoder {
                    encoder
                } else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let is_eof = payload_item.is_eof();
                let result = payload_encoder.encode(payload_item, dst);

                if is_eof {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PayloadItem;
    use bytes::Bytes;
    use http::{Response, StatusCode};

    #[test]
    fn head_then_chunked_payload() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Chunked)), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), _>::Payload(PayloadItem::Chunk(Bytes::from_static(b"hi"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n2\r\nhi\r\n0\r\n\r\n");
    }

    #[test]
    fn payload_without_head_fails() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();
        let result = encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst);
        assert!(result.is_err());
    }

    #[test]
    fn head_only_keeps_length() {
        let mut encoder = ResponseEncoder::new();
        encoder.set_head_only(true);
        let mut dst = BytesMut::new();

        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Length(5))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), _>::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n");
    }

    #[test]
    fn interim_head_then_final_head() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let interim = Response::builder().status(StatusCode::CONTINUE).body(()).unwrap();
        encoder.encode(Message::<_, Bytes>::Header((interim, PayloadSize::Empty)), &mut dst).unwrap();
        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Empty)), &mut dst).unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n");
    }
}
