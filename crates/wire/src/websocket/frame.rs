//! WebSocket opcodes, messages and close payloads (RFC 6455 §5).

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::WsError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Result<Opcode, WsError> {
        match byte {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(WsError::InvalidOpcode(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

/// Status code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const INVALID_DATA: u16 = 1007;
    pub const TOO_LARGE: u16 = 1009;

    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }

    /// Parses a close payload; an empty payload carries no status.
    pub fn parse(payload: &[u8]) -> Result<Option<CloseFrame>, WsError> {
        match payload {
            [] => Ok(None),
            [_] => Err(WsError::invalid_close("one byte payload")),
            [hi, lo, reason @ ..] => {
                let code = u16::from_be_bytes([*hi, *lo]);
                if !is_valid_code(code) {
                    return Err(WsError::invalid_close(format!("status code {code}")));
                }
                let reason = std::str::from_utf8(reason).map_err(|_| WsError::InvalidUtf8)?;
                Ok(Some(CloseFrame::new(code, reason)))
            }
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut payload = BytesMut::with_capacity(2 + self.reason.len());
        payload.put_u16(self.code);
        // control payloads are capped at 125 bytes
        let mut end = self.reason.len().min(123);
        while !self.reason.is_char_boundary(end) {
            end -= 1;
        }
        payload.put_slice(&self.reason.as_bytes()[..end]);
        payload.freeze()
    }
}

// 1004-1006 and 1015 are reserved for local use and never sent on the wire
fn is_valid_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
}

/// A complete, reassembled WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseFrame>),
}

impl WsMessage {
    /// Builds a message from a reassembled payload, validating text and close payloads.
    pub fn from_parts(opcode: Opcode, payload: Bytes) -> Result<WsMessage, WsError> {
        match opcode {
            Opcode::Text => {
                let text = String::from_utf8(payload.to_vec()).map_err(|_| WsError::InvalidUtf8)?;
                Ok(WsMessage::Text(text))
            }
            Opcode::Binary => Ok(WsMessage::Binary(payload)),
            Opcode::Ping => Ok(WsMessage::Ping(payload)),
            Opcode::Pong => Ok(WsMessage::Pong(payload)),
            Opcode::Close => CloseFrame::parse(&payload).map(WsMessage::Close),
            Opcode::Continuation => Err(WsError::UnexpectedContinuation),
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            WsMessage::Text(_) => Opcode::Text,
            WsMessage::Binary(_) => Opcode::Binary,
            WsMessage::Ping(_) => Opcode::Ping,
            WsMessage::Pong(_) => Opcode::Pong,
            WsMessage::Close(_) => Opcode::Close,
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, WsMessage::Close(_))
    }

    /// The payload as it goes on the wire.
    pub fn into_payload(self) -> Bytes {
        match self {
            WsMessage::Text(text) => Bytes::from(text),
            WsMessage::Binary(bytes) | WsMessage::Ping(bytes) | WsMessage::Pong(bytes) => bytes,
            WsMessage::Close(Some(frame)) => frame.encode(),
            WsMessage::Close(None) => Bytes::new(),
        }
    }
}

impl From<&str> for WsMessage {
    fn from(text: &str) -> Self {
        WsMessage::Text(text.to_owned())
    }
}

impl From<String> for WsMessage {
    fn from(text: String) -> Self {
        WsMessage::Text(text)
    }
}

impl From<Bytes> for WsMessage {
    fn from(bytes: Bytes) -> Self {
        WsMessage::Binary(bytes)
    }
}
