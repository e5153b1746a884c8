//! Tunables for server connections, clients and websocket sessions.
//!
//! Every struct derives `Deserialize` with `#[serde(default)]`, so embedders can load a partial
//! table from their own config file and keep the defaults for the rest.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::head::{DEFAULT_MAX_HEAD_BYTES, DEFAULT_MAX_HEADERS};
use crate::websocket::DEFAULT_MAX_MESSAGE_SIZE;

/// Settings for server side connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Largest accepted request head, in bytes.
    pub max_head_bytes: usize,

    /// Most header lines accepted in one head.
    pub max_headers: usize,

    /// Seconds to wait for the next read before dropping the connection, 0 disables.
    pub read_timeout_secs: u64,

    /// Requests served on one connection before it is closed, 0 for no limit.
    pub max_keep_alive_requests: usize,

    /// Body bytes kept in memory before spilling to a temp file.
    pub max_heap_buffer: u64,

    /// Largest request body accepted at all.
    pub max_net_buffer: u64,

    /// Most multipart parts stored for one request.
    pub max_uploadable_resources: usize,

    /// Where spilled bodies and stored parts go, defaults to the system temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Smallest response body worth compressing.
    pub compress_min_size: usize,

    pub websocket: WebSocketConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: DEFAULT_MAX_HEAD_BYTES,
            max_headers: DEFAULT_MAX_HEADERS,
            read_timeout_secs: 60,
            max_keep_alive_requests: 1000,
            max_heap_buffer: 1024 * 1024,
            max_net_buffer: 64 * 1024 * 1024,
            max_uploadable_resources: 16,
            temp_dir: None,
            compress_min_size: 1024,
            websocket: WebSocketConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn with_read_timeout_secs(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    pub fn with_max_keep_alive_requests(mut self, max: usize) -> Self {
        self.max_keep_alive_requests = max;
        self
    }

    pub fn with_max_heap_buffer(mut self, max: u64) -> Self {
        self.max_heap_buffer = max;
        self
    }

    pub fn with_max_net_buffer(mut self, max: u64) -> Self {
        self.max_net_buffer = max;
        self
    }

    pub fn with_max_uploadable_resources(mut self, max: usize) -> Self {
        self.max_uploadable_resources = max;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_head_limits(mut self, max_head_bytes: usize, max_headers: usize) -> Self {
        self.max_head_bytes = max_head_bytes;
        self.max_headers = max_headers;
        self
    }

    pub fn with_websocket(mut self, websocket: WebSocketConfig) -> Self {
        self.websocket = websocket;
        self
    }
}

/// Settings for [`HttpClient`](crate::client::HttpClient).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub max_head_bytes: usize,

    pub max_headers: usize,

    /// Seconds to wait for the next read of a response, 0 disables.
    pub read_timeout_secs: u64,

    /// Largest response body the client collects.
    pub max_response_body: u64,

    /// Sent as `User-Agent` when the request has none.
    pub user_agent: Option<String>,

    pub websocket: WebSocketConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: DEFAULT_MAX_HEAD_BYTES,
            max_headers: DEFAULT_MAX_HEADERS,
            read_timeout_secs: 30,
            max_response_body: 64 * 1024 * 1024,
            user_agent: Some(concat!("micro-wire/", env!("CARGO_PKG_VERSION")).to_owned()),
            websocket: WebSocketConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    pub fn with_read_timeout_secs(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    pub fn with_max_response_body(mut self, max: u64) -> Self {
        self.max_response_body = max;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Settings for websocket sessions on either side.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Largest reassembled message.
    pub max_message_size: usize,

    /// Seconds without any inbound frame before the session counts as dead, 0 disables.
    pub idle_timeout_secs: u64,

    /// Milliseconds to wait for the peer's close frame after sending ours.
    pub close_timeout_ms: u64,

    /// Outbound messages buffered per session before senders wait.
    pub outbound_capacity: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self { max_message_size: DEFAULT_MAX_MESSAGE_SIZE, idle_timeout_secs: 300, close_timeout_ms: 5000, outbound_capacity: 64 }
    }
}

impl WebSocketConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn with_close_timeout_ms(mut self, ms: u64) -> Self {
        self.close_timeout_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_head_bytes, 64 * 1024);
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.websocket.max_message_size, 16 * 1024 * 1024);

        let config = config.with_read_timeout_secs(0);
        assert_eq!(config.read_timeout(), None);

        let ws = WebSocketConfig::default().with_idle_timeout_secs(0);
        assert_eq!(ws.idle_timeout(), None);
        assert_eq!(ws.close_timeout(), Duration::from_secs(5));
    }
}
