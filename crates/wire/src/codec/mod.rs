//! HTTP codec module for encoding and decoding HTTP messages
//!
//! This module provides functionality for streaming HTTP message processing on both sides of a
//! connection. Every decoder is an incremental, non-blocking state machine: it is fed whatever
//! the socket delivered and answers `Ok(None)` until a whole unit is available.
//!
//! # Architecture
//!
//! - Server side:
//!   - [`RequestDecoder`]: Decodes incoming HTTP requests
//!   - [`ResponseEncoder`]: Encodes outgoing HTTP responses
//!
//! - Client side:
//!   - [`RequestEncoder`]: Encodes outgoing requests
//!   - [`ResponseDecoder`]: Decodes incoming responses
//!
//! - Building blocks:
//!   - [`head`]: the head tokenizer and head codecs
//!   - [`body`]: chunked, fixed-length and read-until-close bodies
//!   - [`multipart`]: `multipart/form-data` and `multipart/byteranges` bodies
//!
//! # Example
//!
//! ```no_run
//! use micro_wire::codec::{RequestDecoder, ResponseEncoder};
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! // Decode incoming request
//! let mut decoder = RequestDecoder::new();
//! let mut request_buffer = BytesMut::new();
//! let request = decoder.decode(&mut request_buffer);
//!
//! // Encode outgoing response
//! let mut encoder = ResponseEncoder::new();
//! let mut response_buffer = BytesMut::new();
//! // ... encode response ...
//! ```

pub mod body;
pub mod head;
pub mod multipart;
mod request_decoder;
mod request_encoder;
mod response_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
pub use response_encoder::ResponseEncoder;
