//! The HTTP/1.1 upgrade handshake (RFC 6455 §4).

use base64ct::{Base64, Encoding};
use http::header::{CONNECTION, HOST, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE};
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode, Version};
use sha1::{Digest, Sha1};

use crate::codec::head::RequestHead;
use crate::protocol::{ParseError, RequestFrame, ResponseFrame, ResponseHead, WsError, header_has_token};

const WS_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const WS_VERSION: &str = "13";

/// `Base64(SHA1(key + GUID))`, the value of `Sec-WebSocket-Accept`.
pub fn derive_accept(key: &[u8]) -> String {
    let mut sha1 = Sha1::default();
    sha1.update(key);
    sha1.update(WS_GUID);
    Base64::encode_string(&sha1.finalize())
}

/// A random 16-byte nonce, base64 encoded, for `Sec-WebSocket-Key`.
pub fn generate_key() -> String {
    let nonce = fastrand::u128(..).to_be_bytes();
    Base64::encode_string(&nonce)
}

/// Whether the headers ask to switch to the websocket protocol.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    header_has_token(headers, UPGRADE, "websocket")
}

/// Why an upgrade request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The request is not a well formed upgrade.
    BadRequest(&'static str),
    /// The client speaks a websocket version other than 13.
    UnsupportedVersion,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::BadRequest(_) => StatusCode::BAD_REQUEST,
            Rejection::UnsupportedVersion => StatusCode::UPGRADE_REQUIRED,
        }
    }

    /// The response telling the client why, advertising version 13 where relevant.
    pub fn into_response(self) -> ResponseHead {
        let mut response = Response::new(());
        *response.status_mut() = self.status();
        if self == Rejection::UnsupportedVersion {
            response.headers_mut().insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static(WS_VERSION));
        }
        response
    }
}

/// Validates an upgrade request and builds the `101 Switching Protocols` answer.
pub fn accept(frame: &RequestFrame) -> Result<ResponseHead, Rejection> {
    if frame.method() != Method::GET || frame.version() != Version::HTTP_11 {
        return Err(Rejection::BadRequest("websocket upgrade must be a GET over HTTP/1.1"));
    }
    if !is_upgrade_request(frame.headers()) {
        return Err(Rejection::BadRequest("missing upgrade: websocket"));
    }
    if !frame.connection_has("upgrade") {
        return Err(Rejection::BadRequest("missing connection: upgrade"));
    }
    if frame.headers().get(SEC_WEBSOCKET_VERSION).map(HeaderValue::as_bytes) != Some(WS_VERSION.as_bytes()) {
        return Err(Rejection::UnsupportedVersion);
    }
    let key = match frame.headers().get(SEC_WEBSOCKET_KEY) {
        Some(key) if !key.is_empty() => key,
        _ => return Err(Rejection::BadRequest("missing sec-websocket-key")),
    };

    let accept = HeaderValue::from_str(&derive_accept(key.as_bytes()))
        .map_err(|_| Rejection::BadRequest("unencodable accept key"))?;

    const UPGRADE_RES: HeaderValue = HeaderValue::from_static("Upgrade");
    const WEBSOCKET_RES: HeaderValue = HeaderValue::from_static("websocket");

    let mut response = Response::new(());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    response.headers_mut().insert(CONNECTION, UPGRADE_RES);
    response.headers_mut().insert(UPGRADE, WEBSOCKET_RES);
    response.headers_mut().insert(SEC_WEBSOCKET_ACCEPT, accept);
    Ok(response)
}

/// The client's upgrade request for `target` on `host`.
pub fn client_request(host: &str, target: &str, key: &str) -> Result<RequestHead, WsError> {
    let mut head = RequestHead::new(Method::GET, target);
    let headers = &mut head.headers;
    headers.insert(HOST, HeaderValue::from_str(host).map_err(ParseError::invalid_header)?);
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static(WS_VERSION));
    headers.insert(SEC_WEBSOCKET_KEY, HeaderValue::from_str(key).map_err(ParseError::invalid_header)?);
    Ok(head)
}

/// Checks the server's answer to a [`client_request`] sent with `key`.
pub fn verify_response(frame: &ResponseFrame, key: &str) -> Result<(), WsError> {
    if frame.status() != Some(StatusCode::SWITCHING_PROTOCOLS) {
        return Err(WsError::handshake(format!("unexpected status {:?}", frame.status())));
    }
    if !is_upgrade_request(frame.headers()) {
        return Err(WsError::handshake("missing upgrade: websocket"));
    }
    let expected = derive_accept(key.as_bytes());
    match frame.headers().get(SEC_WEBSOCKET_ACCEPT) {
        Some(accept) if accept.as_bytes() == expected.as_bytes() => Ok(()),
        Some(_) => Err(WsError::handshake("sec-websocket-accept mismatch")),
        None => Err(WsError::handshake("missing sec-websocket-accept")),
    }
}
