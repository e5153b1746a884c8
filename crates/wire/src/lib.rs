//! An incremental HTTP/1.x and WebSocket wire-protocol engine
//!
//! This crate turns byte streams into protocol frames and back. Every parser is an
//! incremental state machine: it is fed whatever the transport delivered, keeps partial
//! state across calls, and never blocks. On top of the parsers sit a server connection loop,
//! an HTTP client, and WebSocket sessions, all driven by tokio.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 heads, tolerant of bare `LF` line endings
//! - Chunked, fixed-length and read-until-close bodies
//! - Streaming `multipart/form-data` decoding and encoding
//! - Keep-alive, expect-continue, read timeouts
//! - Request bodies kept in memory up to a ceiling, then spilled to temp files
//! - gzip/deflate response compression and byte ranges
//! - WebSocket handshake, frame codec and sessions on both sides
//!
//! # Example
//!
//! ```no_run
//! use http::{Request, Response, StatusCode};
//! use std::error::Error;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn, Level};
//! use tracing_subscriber::FmtSubscriber;
//! use micro_wire::connection::{Disposition, HttpConnection, RequestBody};
//! use micro_wire::handler::make_handler;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder()
//!         .with_max_level(Level::INFO)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     info!(port = 8080, "start listening");
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer);
//!             match connection.process(handler).await {
//!                 Ok(Disposition::Closed) => info!("finished process, connection shutdown"),
//!                 Ok(Disposition::Upgraded(_)) => warn!("no websocket routes, dropping upgrade"),
//!                 Err(e) => error!(cause = %e, "service has error, connection shutdown"),
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request<RequestBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
//!     info!(path = request.uri().path(), size = request.body().len(), "receiving request");
//!
//!     let response = Response::builder()
//!         .status(StatusCode::OK)
//!         .body("Hello World!\r\n".to_string())?;
//!     Ok(response)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: head, body and multipart decoders and encoders
//! - [`protocol`]: frames, messages, body bookkeeping and errors
//! - [`connection`]: the server connection loop, routes and request bodies
//! - [`handler`]: the router and request handler trait
//! - [`websocket`]: frame codec, handshake and sessions
//! - [`client`]: the client side connection
//! - [`config`]: server, client and websocket tunables
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::ParseError`]: malformed or oversized input
//! - [`protocol::SendError`]: Response sending errors
//! - [`protocol::WsError`]: websocket framing and handshake errors
//!
//! Each of them reports an [`protocol::ErrorClass`]. Decoders never treat missing data as an
//! error, they answer `Ok(None)` until a complete unit is buffered.
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - No TLS, the transport is any `AsyncRead` + `AsyncWrite` pair
//! - No websocket extensions (`permessage-deflate`) or subprotocol negotiation

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod websocket;

mod utils;
pub(crate) use utils::ensure;
