//! HTTP connection handling module
//!
//! This module drives one server side connection: requests are decoded, each head is routed
//! through the [`Handler`](crate::handler::Handler), the body is acquired the way the
//! [`Route`] asks for, and the response is composed and streamed back.
//!
//! # Components
//!
//! - [`HttpConnection`]: the request/response loop, keep-alive and websocket upgrades
//! - [`Route`], [`RouteLimits`], [`BodyStrategy`]: per-request decisions of the router
//! - [`RequestBody`], [`TempFile`], [`StoredPart`]: bodies in memory, spilled, or stored
//!   part by part
//! - [`BodyFetcher`]: receives body chunks as they arrive
//! - [`range`]: `Range` request parsing and `multipart/byteranges` bodies
//!
//! # Features
//!
//! - Expect-continue mechanism
//! - Memory ceilings with temp file spilling, cleaned up on drop
//! - Optional gzip/deflate compression and byte ranges on responses
//! - Read timeouts and minimal error responses before closing

mod body;
mod compose;
mod encoding;
mod http_connection;
pub mod range;
mod route;

pub use body::{BodyCollector, BodyFetcher, PartData, RequestBody, StoredPart, TempFile};
pub use http_connection::{ConnectionState, Disposition, HttpConnection, Upgrade};
pub use route::{BodyStrategy, Route, RouteLimits};
