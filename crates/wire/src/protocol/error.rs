use std::io;

use http::StatusCode;
use thiserror::Error;

/// Coarse classification shared by every error the engine produces.
///
/// Decoders never report "need more data" as an error: they return `Ok(None)` instead, so the
/// taxonomy only contains terminal conditions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// An illegal token or byte on the wire.
    MalformedSyntax,
    /// A configured ceiling (head size, body size, part count) was crossed.
    LimitExceeded,
    /// The transport failed or timed out.
    TransportFailure,
    /// The peer broke a framing rule (bad opcode, masking, chunk-size overflow).
    ProtocolViolation,
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("websocket error: {source}")]
    WebSocketError {
        #[from]
        source: WsError,
    },
}

impl HttpError {
    pub fn class(&self) -> ErrorClass {
        match self {
            HttpError::RequestError { source } => source.class(),
            HttpError::ResponseError { .. } => ErrorClass::TransportFailure,
            HttpError::WebSocketError { source } => source.class(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {version}")]
    InvalidVersion { version: String },

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid status line: {reason}")]
    InvalidStatus { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunked body: {reason}")]
    InvalidChunk { reason: String },

    #[error("invalid chunk size, overflow u64")]
    ChunkSizeOverflow,

    #[error("invalid multipart body: {reason}")]
    InvalidMultipart { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("body size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: u64, max_size: u64 },

    #[error("multipart resources exceed the limit {max_num}")]
    TooManyParts { max_num: usize },

    #[error("timed out waiting for data")]
    Timeout,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_version<S: ToString>(str: S) -> Self {
        Self::InvalidVersion { version: str.to_string() }
    }

    pub fn invalid_status<S: ToString>(str: S) -> Self {
        Self::InvalidStatus { reason: str.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunk { reason: str.to_string() }
    }

    pub fn invalid_multipart<S: ToString>(str: S) -> Self {
        Self::InvalidMultipart { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn too_large_body(current_size: u64, max_size: u64) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn too_many_parts(max_num: usize) -> Self {
        Self::TooManyParts { max_num }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ParseError::TooLargeHeader { .. }
            | ParseError::TooManyHeaders { .. }
            | ParseError::TooLargeBody { .. }
            | ParseError::TooManyParts { .. } => ErrorClass::LimitExceeded,
            ParseError::ChunkSizeOverflow => ErrorClass::MalformedSyntax,
            ParseError::Timeout | ParseError::Io { .. } => ErrorClass::TransportFailure,
            _ => ErrorClass::MalformedSyntax,
        }
    }

    /// The status a server answers with before closing, `None` when nothing should be written.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ParseError::TooLargeHeader { .. } | ParseError::TooManyHeaders { .. } => {
                Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
            }
            ParseError::TooLargeBody { .. } | ParseError::TooManyParts { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            ParseError::InvalidVersion { .. } => Some(StatusCode::HTTP_VERSION_NOT_SUPPORTED),
            ParseError::Timeout | ParseError::Io { .. } => None,
            _ => Some(StatusCode::BAD_REQUEST),
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum WsError {
    #[error("invalid websocket opcode: {0:#x}")]
    InvalidOpcode(u8),

    #[error("reserved bits set without a negotiated extension")]
    ReservedBits,

    #[error("control frame must not be fragmented")]
    FragmentedControl,

    #[error("control frame payload {0} exceeds 125 bytes")]
    ControlTooLong(u64),

    #[error("continuation frame without a message in progress")]
    UnexpectedContinuation,

    #[error("new data frame while a fragmented message is in progress")]
    ExpectedContinuation,

    #[error("payload length is not minimally encoded")]
    NonCanonicalLength,

    #[error("64-bit payload length {0:#x} has the most significant bit set")]
    InvalidLength(u64),

    #[error("frame from client is not masked")]
    UnmaskedFrame,

    #[error("frame from server is masked")]
    MaskedFrame,

    #[error("message size {size} exceeds the limit {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("text message is not valid utf-8")]
    InvalidUtf8,

    #[error("invalid close payload: {reason}")]
    InvalidClose { reason: String },

    #[error("websocket handshake failed: {reason}")]
    Handshake { reason: String },

    #[error("websocket session is closed")]
    Closed,

    #[error("http error during handshake: {source}")]
    Http {
        #[from]
        source: ParseError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl WsError {
    pub fn handshake<S: ToString>(str: S) -> Self {
        Self::Handshake { reason: str.to_string() }
    }

    pub fn invalid_close<S: ToString>(str: S) -> Self {
        Self::InvalidClose { reason: str.to_string() }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            WsError::TooLarge { .. } => ErrorClass::LimitExceeded,
            WsError::Handshake { .. } => ErrorClass::MalformedSyntax,
            WsError::Http { source } => source.class(),
            WsError::Closed | WsError::Io { .. } => ErrorClass::TransportFailure,
            _ => ErrorClass::ProtocolViolation,
        }
    }

    /// Close code sent to the peer when this error terminates a session (RFC 6455 §7.4.1).
    pub fn close_code(&self) -> u16 {
        match self {
            WsError::TooLarge { .. } => 1009,
            WsError::InvalidClose { .. } | WsError::InvalidUtf8 => 1007,
            _ => 1002,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_parse_errors() {
        assert_eq!(ParseError::ChunkSizeOverflow.class(), ErrorClass::MalformedSyntax);
        assert_eq!(ParseError::too_large_header(10, 5).class(), ErrorClass::LimitExceeded);
        assert_eq!(ParseError::Timeout.class(), ErrorClass::TransportFailure);

        assert_eq!(ParseError::too_large_header(10, 5).status_code(), Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE));
        assert_eq!(ParseError::too_large_body(10, 5).status_code(), Some(StatusCode::PAYLOAD_TOO_LARGE));
        assert_eq!(ParseError::InvalidMethod.status_code(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(ParseError::Timeout.status_code(), None);
    }

    #[test]
    fn classify_ws_errors() {
        assert_eq!(WsError::InvalidOpcode(3).class(), ErrorClass::ProtocolViolation);
        assert_eq!(WsError::MaskedFrame.close_code(), 1002);
        assert_eq!(WsError::TooLarge { size: 2, limit: 1 }.close_code(), 1009);
        assert_eq!(WsError::InvalidLength(1 << 63).class(), ErrorClass::ProtocolViolation);
        assert_eq!(WsError::InvalidLength(1 << 63).close_code(), 1002);
    }
}
