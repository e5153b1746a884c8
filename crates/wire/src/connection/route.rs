//! What the router decides for one request once its head is parsed.

use std::fmt;
use std::path::PathBuf;

use crate::config::ServerConfig;
use crate::connection::body::BodyFetcher;

/// Size ceilings applied while a request body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLimits {
    /// Bytes kept in memory, beyond that bodies and parts go to a temp file.
    pub max_heap_buffer: u64,
    /// Bytes accepted at all, beyond that the request is answered with 413.
    pub max_net_buffer: u64,
    pub max_uploadable_resources: usize,
    pub temp_dir: PathBuf,
}

impl From<&ServerConfig> for RouteLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_heap_buffer: config.max_heap_buffer,
            max_net_buffer: config.max_net_buffer,
            max_uploadable_resources: config.max_uploadable_resources,
            temp_dir: config.temp_dir(),
        }
    }
}

/// How the request body is acquired before the handler runs.
#[derive(Default)]
pub enum BodyStrategy {
    /// Memory up to the heap ceiling, then a temp file.
    #[default]
    Collect,
    /// Each `multipart/form-data` part stored on its own, in memory or a temp file.
    /// Bodies of other types are collected.
    Store,
    /// Every decoded chunk handed to the fetcher as it arrives.
    Fetch(Box<dyn BodyFetcher>),
    /// Read and thrown away.
    Skip,
}

impl fmt::Debug for BodyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyStrategy::Collect => f.write_str("Collect"),
            BodyStrategy::Store => f.write_str("Store"),
            BodyStrategy::Fetch(_) => f.write_str("Fetch(..)"),
            BodyStrategy::Skip => f.write_str("Skip"),
        }
    }
}

/// Per-request answer of a [`Handler`](crate::handler::Handler)'s router.
#[derive(Debug, Default)]
pub struct Route {
    /// `None` takes the connection's [`ServerConfig`] values.
    pub limits: Option<RouteLimits>,
    pub body: BodyStrategy,
    /// gzip/deflate responses when the client accepts it.
    pub compress: bool,
    /// Honor `Range` on `200` responses to `GET`.
    pub ranges: bool,
    /// Accept `Upgrade: websocket` requests on this route.
    pub websocket: bool,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: RouteLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_body(mut self, body: BodyStrategy) -> Self {
        self.body = body;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_ranges(mut self, ranges: bool) -> Self {
        self.ranges = ranges;
        self
    }

    pub fn with_websocket(mut self, websocket: bool) -> Self {
        self.websocket = websocket;
        self
    }
}
