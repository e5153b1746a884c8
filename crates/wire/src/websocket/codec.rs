//! Incremental WebSocket frame decoding and encoding (RFC 6455 §5.2).
//!
//! [`WebSocketCodec::parse_frame`] accepts arbitrarily split input and keeps partial headers,
//! partial payloads and in-progress fragmented messages between calls. Completed messages
//! queue in arrival order and are taken with [`WebSocketCodec::get_frame`]; control frames
//! interleaved inside a fragmented message are queued as soon as they complete.

use std::collections::VecDeque;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::ensure;
use crate::protocol::WsError;
use crate::websocket::frame::{Opcode, WsMessage};

/// Default ceiling for one reassembled message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

const MAX_CONTROL_PAYLOAD: u64 = 125;

/// Which end of the connection the codec serves; decides the masking rules.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    /// Receives masked frames, sends unmasked ones.
    Server,
    /// Receives unmasked frames, sends masked ones.
    Client,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    /// collecting the fixed and extended header bytes
    Header,
    Payload,
}

#[derive(Debug)]
pub struct WebSocketCodec {
    role: Role,
    max_message_size: usize,
    state: State,
    header: [u8; 14],
    header_len: usize,
    opcode: Opcode,
    fin: bool,
    mask: Option<[u8; 4]>,
    remaining: u64,
    // bytes of the current frame's payload already unmasked, keys the rolling mask
    payload_offset: usize,
    control: BytesMut,
    fragment: Option<(Opcode, BytesMut)>,
    queue: VecDeque<(Opcode, Bytes)>,
}

impl WebSocketCodec {
    pub fn new(role: Role) -> Self {
        Self::with_max_message_size(role, DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(role: Role, max_message_size: usize) -> Self {
        Self {
            role,
            max_message_size,
            state: State::Header,
            header: [0; 14],
            header_len: 0,
            opcode: Opcode::Binary,
            fin: true,
            mask: None,
            remaining: 0,
            payload_offset: 0,
            control: BytesMut::new(),
            fragment: None,
            queue: VecDeque::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Feeds raw bytes; every byte is consumed. Returns true when a complete message is queued.
    pub fn parse_frame(&mut self, mut buf: &[u8]) -> Result<bool, WsError> {
        while !buf.is_empty() {
            match self.state {
                State::Header => {
                    let needed = self.header_size();
                    let take = (needed - self.header_len).min(buf.len());
                    self.header[self.header_len..self.header_len + take].copy_from_slice(&buf[..take]);
                    self.header_len += take;
                    buf = &buf[take..];

                    if self.header_len == 2 {
                        self.begin_frame()?;
                    }
                    // the first two bytes may have grown the header
                    if self.header_len == self.header_size() {
                        self.finish_header()?;
                    }
                }
                State::Payload => {
                    let take = usize::try_from(self.remaining).map_or(buf.len(), |remaining| remaining.min(buf.len()));
                    self.append_payload(&buf[..take]);
                    buf = &buf[take..];
                    self.remaining -= take as u64;
                    if self.remaining == 0 {
                        self.finish_frame();
                    }
                }
            }
        }
        Ok(!self.queue.is_empty())
    }

    /// Takes the oldest complete message.
    pub fn get_frame(&mut self) -> Option<(Opcode, Bytes)> {
        self.queue.pop_front()
    }

    pub fn has_frame(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Bytes still owed by the frame in progress.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn header_size(&self) -> usize {
        if self.header_len < 2 {
            return 2;
        }
        let extended = match self.header[1] & 0x7F {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        let mask = if self.header[1] & 0x80 != 0 { 4 } else { 0 };
        2 + extended + mask
    }

    fn begin_frame(&mut self) -> Result<(), WsError> {
        let (b0, b1) = (self.header[0], self.header[1]);
        ensure!(b0 & 0x70 == 0, WsError::ReservedBits);
        let opcode = Opcode::from_u8(b0 & 0x0F)?;
        let fin = b0 & 0x80 != 0;
        let masked = b1 & 0x80 != 0;

        match self.role {
            Role::Server => ensure!(masked, WsError::UnmaskedFrame),
            Role::Client => ensure!(!masked, WsError::MaskedFrame),
        }

        if opcode.is_control() {
            ensure!(fin, WsError::FragmentedControl);
            let len7 = u64::from(b1 & 0x7F);
            ensure!(len7 <= MAX_CONTROL_PAYLOAD, WsError::ControlTooLong(len7));
        } else if opcode == Opcode::Continuation {
            ensure!(self.fragment.is_some(), WsError::UnexpectedContinuation);
        } else {
            ensure!(self.fragment.is_none(), WsError::ExpectedContinuation);
        }

        self.opcode = opcode;
        self.fin = fin;
        Ok(())
    }

    fn finish_header(&mut self) -> Result<(), WsError> {
        let len7 = self.header[1] & 0x7F;
        let (length, mask_at) = match len7 {
            126 => {
                let length = u64::from(u16::from_be_bytes([self.header[2], self.header[3]]));
                ensure!(length >= 126, WsError::NonCanonicalLength);
                (length, 4)
            }
            127 => {
                let mut extended = &self.header[2..10];
                let length = extended.get_u64();
                ensure!(length >> 63 == 0, WsError::InvalidLength(length));
                ensure!(length > 0xFFFF, WsError::NonCanonicalLength);
                (length, 10)
            }
            short => (u64::from(short), 2),
        };

        self.mask = if self.header[1] & 0x80 != 0 {
            Some([self.header[mask_at], self.header[mask_at + 1], self.header[mask_at + 2], self.header[mask_at + 3]])
        } else {
            None
        };

        if !self.opcode.is_control() {
            let buffered = self.fragment.as_ref().map_or(0, |(_, data)| data.len()) as u64;
            let size = buffered.saturating_add(length);
            ensure!(size <= self.max_message_size as u64, WsError::TooLarge { size, limit: self.max_message_size as u64 });
            if self.opcode != Opcode::Continuation {
                self.fragment = Some((self.opcode, BytesMut::with_capacity(length.min(64 * 1024) as usize)));
            }
        }

        trace!(opcode = ?self.opcode, fin = self.fin, length, masked = self.mask.is_some(), "websocket frame header");
        self.header_len = 0;
        self.remaining = length;
        self.payload_offset = 0;
        self.state = State::Payload;
        if length == 0 {
            self.finish_frame();
        }
        Ok(())
    }

    fn append_payload(&mut self, data: &[u8]) {
        let target = if self.opcode.is_control() {
            &mut self.control
        } else {
            match self.fragment.as_mut() {
                Some((_, buffer)) => buffer,
                None => return,
            }
        };
        let start = target.len();
        target.put_slice(data);
        if let Some(mask) = self.mask {
            apply_mask(&mut target[start..], mask, self.payload_offset);
        }
        self.payload_offset += data.len();
    }

    fn finish_frame(&mut self) {
        if self.opcode.is_control() {
            self.queue.push_back((self.opcode, self.control.split().freeze()));
        } else if self.fin {
            if let Some((opcode, data)) = self.fragment.take() {
                self.queue.push_back((opcode, data.freeze()));
            }
        }
        self.state = State::Header;
    }
}

/// XORs `data` with the rolling 4-byte key, `offset` being the position of `data[0]`
/// within the frame payload.
pub fn apply_mask(data: &mut [u8], mask: [u8; 4], offset: usize) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[(offset + i) & 3];
    }
}

/// Writes one frame with the shortest length encoding; `mask` is set for client frames only.
pub fn encode_frame(opcode: Opcode, fin: bool, payload: &[u8], mask: Option<[u8; 4]>, dst: &mut BytesMut) {
    let length = payload.len();
    dst.reserve(14 + length);

    let fin_bit = if fin { 0x80 } else { 0 };
    dst.put_u8(fin_bit | opcode.as_u8());
    let mask_bit = if mask.is_some() { 0x80 } else { 0 };
    if length <= 125 {
        dst.put_u8(mask_bit | length as u8);
    } else if let Ok(length) = u16::try_from(length) {
        dst.put_u8(mask_bit | 126);
        dst.put_u16(length);
    } else {
        dst.put_u8(mask_bit | 127);
        dst.put_u64(length as u64);
    }

    match mask {
        Some(mask) => {
            dst.put_slice(&mask);
            let start = dst.len();
            dst.put_slice(payload);
            apply_mask(&mut dst[start..], mask, 0);
        }
        None => dst.put_slice(payload),
    }
}

/// A fresh random masking key.
pub fn random_mask() -> [u8; 4] {
    fastrand::u32(..).to_be_bytes()
}

impl Decoder for WebSocketCodec {
    type Item = WsMessage;
    type Error = WsError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.queue.is_empty() && !src.is_empty() {
            self.parse_frame(&src[..])?;
            src.clear();
        }
        self.get_frame().map(|(opcode, payload)| WsMessage::from_parts(opcode, payload)).transpose()
    }
}

impl Encoder<WsMessage> for WebSocketCodec {
    type Error = WsError;

    fn encode(&mut self, item: WsMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let opcode = item.opcode();
        let payload = item.into_payload();
        if opcode.is_control() {
            ensure!(payload.len() as u64 <= MAX_CONTROL_PAYLOAD, WsError::ControlTooLong(payload.len() as u64));
        }
        let mask = match self.role {
            Role::Client => Some(random_mask()),
            Role::Server => None,
        };
        encode_frame(opcode, true, &payload, mask, dst);
        Ok(())
    }
}
