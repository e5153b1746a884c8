//! WebSocket support: the frame codec, the upgrade handshake and sessions.
//!
//! - [`WebSocketCodec`]: incremental frame parser and encoder, role aware masking
//! - [`handshake`]: accept key derivation, server side validation, client side verification
//! - [`WebSocketSession`]: runs a session over an upgraded transport
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_wire::websocket::{Opcode, Role, WebSocketCodec, encode_frame};
//!
//! let mut frame = BytesMut::new();
//! encode_frame(Opcode::Text, true, b"Hello", Some([0x37, 0xfa, 0x21, 0x3d]), &mut frame);
//!
//! let mut codec = WebSocketCodec::new(Role::Server);
//! // feed one byte at a time, state is kept between calls
//! for byte in frame.iter() {
//!     codec.parse_frame(std::slice::from_ref(byte)).unwrap();
//! }
//! let (opcode, payload) = codec.get_frame().unwrap();
//! assert_eq!(opcode, Opcode::Text);
//! assert_eq!(&payload[..], b"Hello");
//! ```

mod codec;
mod frame;
pub mod handshake;
mod session;

pub use codec::{DEFAULT_MAX_MESSAGE_SIZE, Role, WebSocketCodec, apply_mask, encode_frame, random_mask};
pub use frame::{CloseFrame, Opcode, WsMessage};
pub use session::{Outbox, SessionState, WebSocketHandler, WebSocketSession, WsSender};
