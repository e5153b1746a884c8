use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use http::header::{ACCEPT, CONTENT_TYPE, HOST, HeaderValue, USER_AGENT};
use http::{HeaderMap, Method, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};
use tracing::{debug, trace};

use crate::codec::head::{RequestHead, RequestHeadEncoder};
use crate::codec::multipart::{MultipartDecoder, MultipartForm, MultipartItem, PartHeader, boundary_from_content_type};
use crate::codec::{RequestEncoder, ResponseDecoder};
use crate::config::ClientConfig;
use crate::ensure;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, ResponseFrame, SendError, WsError};
use crate::websocket::handshake::{client_request, generate_key, verify_response};
use crate::websocket::{Role, WebSocketSession};

/// What a request carries.
#[derive(Debug, Clone, Default)]
pub enum ClientBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Form(MultipartForm),
}

impl From<Bytes> for ClientBody {
    fn from(bytes: Bytes) -> Self {
        ClientBody::Bytes(bytes)
    }
}

impl From<&'static str> for ClientBody {
    fn from(text: &'static str) -> Self {
        ClientBody::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for ClientBody {
    fn from(text: String) -> Self {
        ClientBody::Bytes(Bytes::from(text))
    }
}

impl From<MultipartForm> for ClientBody {
    fn from(form: MultipartForm) -> Self {
        ClientBody::Form(form)
    }
}

/// One part of a multipart response.
#[derive(Debug, Clone)]
pub struct ClientPart {
    pub header: PartHeader,
    pub data: Bytes,
}

/// A response with its body fully read.
#[derive(Debug)]
pub struct ClientResponse {
    frame: ResponseFrame,
    body: Bytes,
}

impl ClientResponse {
    pub fn status(&self) -> StatusCode {
        self.frame.status().unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        self.frame.headers()
    }

    pub fn frame(&self) -> &ResponseFrame {
        &self.frame
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// The body as UTF-8 text.
    pub fn text(&self) -> Result<&str, ParseError> {
        std::str::from_utf8(&self.body).map_err(ParseError::invalid_body)
    }

    /// Whether the server keeps the connection open for another request.
    pub fn keep_alive(&self) -> bool {
        self.frame.keep_alive()
    }

    /// Splits a `multipart/*` body into its parts.
    pub fn parts(&self) -> Result<Vec<ClientPart>, ParseError> {
        let boundary = self
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(boundary_from_content_type)
            .ok_or_else(|| ParseError::invalid_multipart("response is not multipart"))?;

        let mut decoder = MultipartDecoder::new(&boundary);
        let mut src = BytesMut::from(&self.body[..]);
        let mut parts = Vec::new();
        let mut current: Option<(PartHeader, BytesMut)> = None;
        while let Some(item) = decoder.decode_eof(&mut src)? {
            match item {
                MultipartItem::PartBegin(header) => current = Some((header, BytesMut::new())),
                MultipartItem::Data(data) => {
                    if let Some((_, buf)) = &mut current {
                        buf.extend_from_slice(&data);
                    }
                }
                MultipartItem::PartEnd => {
                    if let Some((header, buf)) = current.take() {
                        parts.push(ClientPart { header, data: buf.freeze() });
                    }
                }
                MultipartItem::Eof => break,
            }
        }
        Ok(parts)
    }
}

/// The client side of one HTTP/1.1 connection.
///
/// Requests are sent one at a time; each call writes the request and reads the complete
/// response before returning.
pub struct HttpClient<R, W> {
    framed_read: FramedRead<R, ResponseDecoder>,
    framed_write: FramedWrite<W, RequestEncoder>,
    config: ClientConfig,
    host: String,
}

impl<R, W> HttpClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// A client talking to `host` (sent as the `Host` header) over the given transport.
    pub fn new(reader: R, writer: W, host: impl Into<String>) -> Self {
        Self::with_config(reader, writer, host, ClientConfig::default())
    }

    pub fn with_config(reader: R, writer: W, host: impl Into<String>, config: ClientConfig) -> Self {
        let decoder = ResponseDecoder::with_limits(config.max_head_bytes, config.max_headers);
        Self {
            framed_read: FramedRead::with_capacity(reader, decoder, 8 * 1024),
            framed_write: FramedWrite::new(writer, RequestEncoder::new()),
            config,
            host: host.into(),
        }
    }

    pub async fn get(&mut self, target: &str) -> Result<ClientResponse, HttpError> {
        self.send(RequestHead::new(Method::GET, target), ClientBody::Empty).await
    }

    pub async fn post(&mut self, target: &str, body: impl Into<ClientBody>) -> Result<ClientResponse, HttpError> {
        self.send(RequestHead::new(Method::POST, target), body).await
    }

    /// Sends a request and reads its response.
    pub async fn send(&mut self, mut head: RequestHead, body: impl Into<ClientBody>) -> Result<ClientResponse, HttpError> {
        self.complete_headers(&mut head.headers)?;
        let method = head.method.clone();
        debug!(method = %method, target = head.target, "sending request");

        match body.into() {
            ClientBody::Empty => {
                self.framed_write.feed(Message::<_, Bytes>::Header((head, PayloadSize::Empty))).await?;
                self.framed_write.send(Message::Payload(PayloadItem::<Bytes>::Eof)).await?;
            }
            ClientBody::Bytes(bytes) => {
                let payload_size = PayloadSize::new_length(bytes.len() as u64);
                self.framed_write.feed(Message::<_, Bytes>::Header((head, payload_size))).await?;
                if !bytes.is_empty() {
                    self.framed_write.feed(Message::Payload(PayloadItem::Chunk(bytes))).await?;
                }
                self.framed_write.send(Message::Payload(PayloadItem::<Bytes>::Eof)).await?;
            }
            ClientBody::Form(form) => self.send_form(head, &form).await?,
        }

        self.read_response(&method).await
    }

    fn complete_headers(&self, headers: &mut HeaderMap) -> Result<(), ParseError> {
        if !headers.contains_key(HOST) {
            headers.insert(HOST, HeaderValue::from_str(&self.host).map_err(ParseError::invalid_header)?);
        }
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        }
        if let Some(user_agent) = &self.config.user_agent {
            if !headers.contains_key(USER_AGENT) {
                headers.insert(USER_AGENT, HeaderValue::from_str(user_agent).map_err(ParseError::invalid_header)?);
            }
        }
        Ok(())
    }

    /// Writes the head through the encoder and streams the form straight to the transport.
    async fn send_form(&mut self, mut head: RequestHead, form: &MultipartForm) -> Result<(), SendError> {
        head.headers.insert(CONTENT_TYPE, HeaderValue::from_str(&form.content_type()).map_err(SendError::invalid_body)?);
        let length = form.content_length();

        let mut head_buf = BytesMut::new();
        RequestHeadEncoder.encode((head, PayloadSize::new_length(length)), &mut head_buf)?;

        SinkExt::<Message<(RequestHead, PayloadSize), Bytes>>::flush(&mut self.framed_write).await?;
        let writer = self.framed_write.get_mut();
        writer.write_all(&head_buf).await?;
        let written = form.write_to(writer).await?;
        writer.flush().await?;
        trace!(written, length, "multipart form sent");
        Ok(())
    }

    async fn read_next(&mut self) -> Result<Message<(ResponseFrame, PayloadSize)>, ParseError> {
        let next = match self.config.read_timeout() {
            Some(duration) => timeout(duration, self.framed_read.next()).await.map_err(|_elapsed| ParseError::Timeout)?,
            None => self.framed_read.next().await,
        };
        next.ok_or_else(|| ParseError::invalid_header("connection closed before the response"))?
    }

    async fn read_head(&mut self, method: &Method) -> Result<(ResponseFrame, PayloadSize), ParseError> {
        self.framed_read.decoder_mut().expect_response_to(method);
        match self.read_next().await? {
            Message::Header(head) => Ok(head),
            Message::Payload(_) => Err(ParseError::invalid_body("receive body while expecting a response head")),
        }
    }

    async fn read_response(&mut self, method: &Method) -> Result<ClientResponse, HttpError> {
        let (mut frame, payload_size) = loop {
            let (frame, payload_size) = self.read_head(method).await?;
            // interim 1xx responses are skipped
            if !frame.status().is_some_and(|status| status.is_informational()) {
                break (frame, payload_size);
            }
            trace!(status = ?frame.status(), "skipping interim response");
        };

        let max = self.config.max_response_body;
        if let Some(length) = payload_size.length() {
            ensure!(length <= max, ParseError::too_large_body(length, max).into());
        }

        let mut body = BytesMut::new();
        loop {
            match self.read_next().await? {
                Message::Payload(PayloadItem::Chunk(chunk)) => {
                    let content = frame.content_mut();
                    content.advance(chunk.len() as u64);
                    ensure!(content.offset() <= max, ParseError::too_large_body(content.offset(), max).into());
                    body.extend_from_slice(&chunk);
                }
                Message::Payload(PayloadItem::Eof) => break,
                Message::Header(_) => return Err(ParseError::invalid_body("expect payload but receive header").into()),
            }
        }
        frame.content_mut().finish();
        debug!(status = ?frame.status(), size = body.len(), "response received");
        Ok(ClientResponse { frame, body: body.freeze() })
    }

    /// Upgrades the connection and returns a client side websocket session.
    pub async fn websocket(mut self, target: &str) -> Result<WebSocketSession<R, W>, WsError> {
        let key = generate_key();
        let mut head = client_request(&self.host, target, &key)?;
        self.complete_headers(&mut head.headers)?;

        self.framed_write.feed(Message::<_, Bytes>::Header((head, PayloadSize::Empty))).await.map_err(send_error)?;
        self.framed_write.send(Message::Payload(PayloadItem::<Bytes>::Eof)).await.map_err(send_error)?;

        let (frame, _) = self.read_head(&Method::GET).await?;
        verify_response(&frame, &key)?;
        debug!(target, "websocket handshake completed");

        let read_parts = self.framed_read.into_parts();
        let writer = self.framed_write.into_inner();
        Ok(WebSocketSession::new(read_parts.io, writer, Role::Client, self.config.websocket).with_prefetch(&read_parts.read_buf))
    }
}

fn send_error(e: SendError) -> WsError {
    match e {
        SendError::Io { source } => WsError::Io { source },
        SendError::InvalidBody { reason } => WsError::handshake(reason),
    }
}
