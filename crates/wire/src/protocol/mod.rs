//! Core HTTP protocol types.
//!
//! - **Message Handling**: [`Message`], [`PayloadItem`] and [`PayloadSize`]
//! - **Frames**: [`RequestFrame`] for parsed requests, [`ResponseFrame`] for parsed responses,
//!   [`ResponseHead`] for outbound response heads
//! - **Body bookkeeping**: [`ContentState`]
//! - **Error Handling**: [`HttpError`], [`ParseError`], [`SendError`], [`WsError`]
//!   and their [`ErrorClass`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod content;
pub use content::ContentState;

mod request;
pub use request::AuthToken;
pub use request::RequestFrame;
pub(crate) use request::header_has_token;

mod response;
pub use response::ResponseFrame;
pub use response::ResponseHead;

mod error;
pub use error::ErrorClass;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::WsError;
