//! Client side request encoding: a head followed by payload items.

use crate::codec::body::PayloadEncoder;
use crate::codec::head::{RequestHead, RequestHeadEncoder};
use crate::protocol::{Message, PayloadSize, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes [`Message`]s carrying a request head and then its payload items, closed by
/// [`PayloadItem::Eof`](crate::protocol::PayloadItem::Eof).
#[derive(Default)]
pub struct RequestEncoder {
    payload_encoder: Option<PayloadEncoder>,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<D: Buf> Encoder<Message<(RequestHead, PayloadSize), D>> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(RequestHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive request head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }
                self.payload_encoder = Some(payload_size.into());
                RequestHeadEncoder.encode((head, payload_size), dst)
            }
            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect request head but receive payload item");
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
