//! HTTP response types.
//!
//! [`ResponseHead`] is the outbound head handed to the response encoder, while
//! [`ResponseFrame`] is what the client side parses off the wire.

use http::header::{CONNECTION, SET_COOKIE};
use http::{HeaderMap, Response, StatusCode, Version};

use crate::protocol::ContentState;
use crate::protocol::request::header_has_token;

/// Type alias for HTTP response headers before a body is attached.
pub type ResponseHead = Response<()>;

/// A parsed response head plus its body bookkeeping.
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    status: Option<StatusCode>,
    reason: String,
    version: Version,
    headers: HeaderMap,
    cookies: Vec<String>,
    content: ContentState,
    error: bool,
}

impl Default for ResponseFrame {
    fn default() -> Self {
        Self {
            status: None,
            reason: String::new(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            content: ContentState::default(),
            error: false,
        }
    }
}

impl ResponseFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status code, `None` until a status line has been parsed.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Raw `Set-Cookie` values in the order they were received.
    pub fn cookies(&self) -> &[String] {
        &self.cookies
    }

    pub fn content(&self) -> &ContentState {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut ContentState {
        &mut self.content
    }

    /// Set when the exchange that produced this frame failed part way.
    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn set_error(&mut self, error: bool) {
        self.error = error;
    }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub(crate) fn set_reason(&mut self, reason: &str) {
        self.reason.push_str(reason);
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub(crate) fn finish_head(&mut self) {
        let cookies = self.headers.get_all(SET_COOKIE).iter().filter_map(|value| value.to_str().ok()).map(str::to_owned);
        self.cookies.extend(cookies);
    }

    /// Whether the server intends to keep the connection open.
    pub fn keep_alive(&self) -> bool {
        match self.version {
            Version::HTTP_11 => !header_has_token(&self.headers, CONNECTION, "close"),
            Version::HTTP_10 => header_has_token(&self.headers, CONNECTION, "keep-alive"),
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.status = None;
        self.reason.clear();
        self.version = Version::HTTP_11;
        self.headers.clear();
        self.cookies.clear();
        self.content.reset();
        self.error = false;
    }
}
