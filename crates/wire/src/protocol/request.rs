//! HTTP request frame.
//!
//! A [`RequestFrame`] is what the head parser produces for one request: the request line
//! split into method, path, query and version, the header multimap, plus the cookie map and
//! authorization token derived from those headers. Frames are recycled across keep-alive
//! requests through [`RequestFrame::reset`], which keeps the allocated capacity.

use std::collections::HashMap;

use http::header::{AUTHORIZATION, CONNECTION, COOKIE};
use http::{HeaderMap, Method, Request, Uri, Version};

use crate::protocol::{ContentState, ParseError};

/// The credentials carried by an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    scheme: String,
    credentials: String,
}

impl AuthToken {
    pub fn new(scheme: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self { scheme: scheme.into(), credentials: credentials.into() }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn credentials(&self) -> &str {
        &self.credentials
    }

    /// Returns the token when the scheme is `Bearer`.
    pub fn bearer(&self) -> Option<&str> {
        self.scheme.eq_ignore_ascii_case("bearer").then_some(self.credentials.as_str())
    }
}

/// Represents an HTTP request head plus its body bookkeeping.
#[derive(Debug, Clone)]
pub struct RequestFrame {
    method: Method,
    path: String,
    query: Option<String>,
    version: Version,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
    auth: Option<AuthToken>,
    content: ContentState,
}

impl Default for RequestFrame {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: String::new(),
            query: None,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            cookies: HashMap::new(),
            auth: None,
            content: ContentState::default(),
        }
    }
}

impl RequestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path, without the query.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query, the text after the first `?` of the request target.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Cookies sent through `Cookie` headers, by name.
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn auth_token(&self) -> Option<&AuthToken> {
        self.auth.as_ref()
    }

    pub fn content(&self) -> &ContentState {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut ContentState {
        &mut self.content
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub(crate) fn set_target(&mut self, path: &str, query: Option<&str>) {
        self.path.push_str(path);
        self.query = query.map(str::to_owned);
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Derives the cookie map and auth token once all headers are in.
    pub(crate) fn finish_head(&mut self) {
        for value in self.headers.get_all(COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            for pair in value.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    let value = value.trim().trim_matches('"');
                    self.cookies.insert(name.trim().to_owned(), value.to_owned());
                }
            }
        }

        self.auth = self
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().split_once(' '))
            .map(|(scheme, credentials)| AuthToken::new(scheme, credentials.trim()));
    }

    /// Whether any `Connection` header lists `token` (case-insensitive).
    pub fn connection_has(&self, token: &str) -> bool {
        header_has_token(&self.headers, CONNECTION, token)
    }

    /// Whether the client asked to keep the connection open after this request.
    pub fn wants_keep_alive(&self) -> bool {
        match self.version {
            Version::HTTP_11 => !self.connection_has("close"),
            Version::HTTP_10 => self.connection_has("keep-alive"),
            _ => false,
        }
    }

    /// Rebuilds the request target as a [`Uri`].
    pub fn uri(&self) -> Result<Uri, ParseError> {
        let target = match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        };
        target.parse().map_err(|_| ParseError::InvalidUri)
    }

    /// Attaches a body to a copy of this head, converting it into a full `Request<T>`.
    pub fn to_request<T>(&self, body: T) -> Result<Request<T>, ParseError> {
        let mut request = Request::new(body);
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri()?;
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }

    /// Clears the frame for the next request while keeping its allocations.
    pub fn reset(&mut self) {
        self.method = Method::GET;
        self.path.clear();
        self.query = None;
        self.version = Version::HTTP_11;
        self.headers.clear();
        self.cookies.clear();
        self.auth = None;
        self.content.reset();
    }
}

pub(crate) fn header_has_token(headers: &HeaderMap, name: http::header::HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|item| item.trim().eq_ignore_ascii_case(token))
}
