//! Client side response decoding: a head followed by payload items.

use crate::codec::body::PayloadDecoder;
use crate::codec::head::ResponseHeadDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, ResponseFrame};
use bytes::BytesMut;
use http::Method;
use tokio_util::codec::Decoder;

/// Decodes responses the same way [`RequestDecoder`](crate::codec::RequestDecoder) decodes
/// requests. Call [`expect_response_to`](Self::expect_response_to) before each response so
/// responses to `HEAD` are framed correctly.
#[derive(Debug, Default)]
pub struct ResponseDecoder {
    head_decoder: ResponseHeadDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_limits(max_head_bytes: usize, max_headers: usize) -> Self {
        Self { head_decoder: ResponseHeadDecoder::with_limits(max_head_bytes, max_headers), payload_decoder: None }
    }

    pub fn expect_response_to(&mut self, method: &Method) {
        self.head_decoder.expect_response_to(method);
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseFrame, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode(src)?;
            if item.as_ref().is_some_and(PayloadItem::is_eof) {
                self.payload_decoder.take();
            }
            return Ok(item.map(Message::Payload));
        }

        let message = match self.head_decoder.decode(src)? {
            Some((frame, payload_size)) => {
                // an interim response is followed by another head, not a body
                let interim = frame.status().is_some_and(|status| status.is_informational());
                if !interim {
                    self.payload_decoder = Some(payload_size.into());
                }
                Some(Message::Header((frame, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode_eof(src)?;
            if item.as_ref().is_some_and(PayloadItem::is_eof) {
                self.payload_decoder.take();
            }
            return Ok(item.map(Message::Payload));
        }

        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::invalid_header("connection closed in the middle of a response head")),
        }
    }
}
