use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use http::header::{ACCEPT_ENCODING, CONNECTION, CONTENT_TYPE, EXPECT, HeaderName, RANGE};
use http::{Method, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use crate::codec::multipart::boundary_from_content_type;
use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::config::ServerConfig;
use crate::connection::body::{BodyCollector, BodyFetcher, PartStore, RequestBody};
use crate::connection::compose::{HttpDate, Negotiation};
use crate::connection::route::{BodyStrategy, Route, RouteLimits};
use crate::ensure;
use crate::handler::Handler;
use crate::protocol::{
    HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestFrame, ResponseHead, SendError, header_has_token,
};
use crate::websocket::handshake::{accept, is_upgrade_request};
use crate::websocket::{Role, WebSocketSession};

/// Where a connection is in the request/response cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitHeaders,
    HeadersParsed,
    BodyStreaming,
    ResponseComposing,
    ResponseSent,
    WebSocketUpgraded,
    Closed,
}

/// How [`HttpConnection::process`] ended.
#[derive(Debug)]
pub enum Disposition<R, W> {
    /// The connection is done, the transport can be dropped.
    Closed,
    /// A websocket upgrade was accepted and the `101` is out.
    Upgraded(Upgrade<R, W>),
}

/// The transport of an accepted websocket upgrade.
#[derive(Debug)]
pub struct Upgrade<R, W> {
    pub reader: R,
    pub writer: W,
    /// Bytes read past the upgrade request, the start of the first frames.
    pub prefetch: BytesMut,
    pub request: RequestFrame,
    config: Arc<ServerConfig>,
}

impl<R, W> Upgrade<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// A server side session over the upgraded transport.
    pub fn into_session(self) -> WebSocketSession<R, W> {
        WebSocketSession::new(self.reader, self.writer, Role::Server, self.config.websocket.clone())
            .with_prefetch(&self.prefetch)
    }
}

enum Flow {
    Next,
    Close,
    Upgrade(RequestFrame),
}

/// Where decoded body chunks go while the request body is read.
enum BodySink {
    Collect(BodyCollector),
    Fetch(Box<dyn BodyFetcher>),
    Store(PartStore),
    Skip,
}

impl BodySink {
    fn new(strategy: BodyStrategy, frame: &RequestFrame, limits: &RouteLimits) -> Self {
        match strategy {
            BodyStrategy::Collect => BodySink::Collect(BodyCollector::new(limits.clone())),
            BodyStrategy::Fetch(fetcher) => BodySink::Fetch(fetcher),
            BodyStrategy::Skip => BodySink::Skip,
            BodyStrategy::Store => {
                let boundary = frame
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(boundary_from_content_type);
                match boundary {
                    Some(boundary) => BodySink::Store(PartStore::new(&boundary, limits.clone())),
                    None => BodySink::Collect(BodyCollector::new(limits.clone())),
                }
            }
        }
    }

    async fn feed(&mut self, chunk: Bytes) -> Result<(), ParseError> {
        match self {
            BodySink::Collect(collector) => collector.fetch(chunk).await,
            BodySink::Fetch(fetcher) => fetcher.fetch(chunk).await,
            BodySink::Store(store) => store.feed(&chunk).await,
            BodySink::Skip => Ok(()),
        }
    }

    /// The body for the handler and whether it was routed away from memory.
    async fn finish(self, size: u64) -> Result<(RequestBody, bool), ParseError> {
        match self {
            BodySink::Collect(collector) => {
                let spilled = collector.spilled();
                Ok((collector.into_body().await?, spilled))
            }
            BodySink::Fetch(mut fetcher) => {
                fetcher.finish().await?;
                Ok((RequestBody::Fetched { size }, false))
            }
            BodySink::Store(store) => {
                let spilled = store.spilled();
                Ok((RequestBody::Parts(store.finish().await?), spilled))
            }
            BodySink::Skip => Ok((RequestBody::Empty, size > 0)),
        }
    }
}

/// An HTTP connection that manages request processing and response streaming
///
/// `HttpConnection` handles the full lifecycle of an HTTP connection, including:
/// - Reading and decoding requests
/// - Acquiring request bodies the way the handler's route asks for
/// - Handling expect-continue mechanism
/// - Composing and streaming responses back to clients
/// - Handing the transport over on a websocket upgrade
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    config: Arc<ServerConfig>,
    state: ConnectionState,
    served: usize,
    date: HttpDate,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, Arc::new(ServerConfig::default()))
    }

    pub fn with_config(reader: R, writer: W, config: Arc<ServerConfig>) -> Self {
        let decoder = RequestDecoder::with_limits(config.max_head_bytes, config.max_headers);
        Self {
            framed_read: FramedRead::with_capacity(reader, decoder, 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            config,
            state: ConnectionState::AwaitHeaders,
            served: 0,
            date: HttpDate::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, state: ConnectionState) {
        trace!(from = ?self.state, to = ?state, "connection state");
        self.state = state;
    }

    /// Serves requests until the peer leaves, keep-alive ends, or a websocket upgrade is
    /// accepted.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<Disposition<R, W>, HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            self.transition(ConnectionState::AwaitHeaders);
            match self.read_next().await {
                Ok(Some(Message::Header((frame, payload_size)))) => {
                    match self.do_process(frame, payload_size, &handler).await {
                        Ok(Flow::Next) => {}
                        Ok(Flow::Close) => {
                            self.transition(ConnectionState::Closed);
                            return Ok(Disposition::Closed);
                        }
                        Ok(Flow::Upgrade(frame)) => return Ok(self.into_upgrade(frame)),
                        Err(e) => {
                            self.transition(ConnectionState::Closed);
                            return Err(e);
                        }
                    }
                }

                Ok(Some(Message::Payload(_))) => {
                    error!("receive body while expecting a request head");
                    let e = ParseError::invalid_body("need header while receive body");
                    self.send_parse_error(&e).await;
                    return Err(e.into());
                }

                Ok(None) => {
                    info!("cant read more request, break this connection down");
                    self.transition(ConnectionState::Closed);
                    return Ok(Disposition::Closed);
                }

                Err(e) => {
                    warn!(cause = %e, "can't receive next request");
                    self.send_parse_error(&e).await;
                    self.transition(ConnectionState::Closed);
                    return Err(e.into());
                }
            }
        }
    }

    async fn read_next(&mut self) -> Result<Option<Message<(RequestFrame, PayloadSize)>>, ParseError> {
        let next = match self.config.read_timeout() {
            Some(duration) => timeout(duration, self.framed_read.next()).await.map_err(|_elapsed| ParseError::Timeout)?,
            None => self.framed_read.next().await,
        };
        next.transpose()
    }

    async fn next_payload(&mut self) -> Result<PayloadItem, ParseError> {
        match self.read_next().await? {
            Some(Message::Payload(item)) => Ok(item),
            Some(Message::Header(_)) => Err(ParseError::invalid_body("expect payload but receive header")),
            None => Err(ParseError::invalid_body("connection closed before the body was complete")),
        }
    }

    async fn do_process<H>(
        &mut self,
        mut frame: RequestFrame,
        payload_size: PayloadSize,
        handler: &Arc<H>,
    ) -> Result<Flow, HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        self.transition(ConnectionState::HeadersParsed);
        self.served += 1;
        let max_requests = self.config.max_keep_alive_requests;
        let keep_alive = frame.wants_keep_alive() && (max_requests == 0 || self.served < max_requests);
        debug!(method = %frame.method(), path = frame.path(), served = self.served, keep_alive, "request head parsed");

        let Route { limits, body: strategy, compress, ranges, websocket } = handler.route(&frame);
        let limits = limits.unwrap_or_else(|| RouteLimits::from(self.config.as_ref()));

        if websocket && is_upgrade_request(frame.headers()) {
            return self.upgrade(frame, payload_size).await;
        }

        if let Some(length) = payload_size.length() {
            if length > limits.max_net_buffer {
                let e = ParseError::too_large_body(length, limits.max_net_buffer);
                warn!(cause = %e, "refusing request body");
                self.send_parse_error(&e).await;
                return Err(e.into());
            }
        }

        if !payload_size.is_empty() && !matches!(strategy, BodyStrategy::Skip) && expects_continue(&frame) {
            let mut head = Response::new(());
            *head.status_mut() = StatusCode::CONTINUE;
            self.framed_write.send(Message::<_, Bytes>::Header((head, PayloadSize::Empty))).await?;
            info!("receive expect request header, sent continue response");
        }

        let body = match self.read_body(strategy, &limits, &mut frame).await {
            Ok(body) => body,
            Err(e) => {
                warn!(cause = %e, "failed to read request body");
                self.send_parse_error(&e).await;
                return Err(e.into());
            }
        };

        let mut request = match frame.to_request(body) {
            Ok(request) => request,
            Err(e) => {
                self.send_parse_error(&e).await;
                return Err(e.into());
            }
        };
        request.extensions_mut().insert(*frame.content());
        if let Some(token) = frame.auth_token() {
            request.extensions_mut().insert(token.clone());
        }

        let is_head = frame.method() == Method::HEAD;
        let header_value = |name: HeaderName| frame.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_owned);
        let negotiation = Negotiation {
            head_request: is_head,
            get_request: frame.method() == Method::GET,
            keep_alive,
            accept_encoding: header_value(ACCEPT_ENCODING),
            range: header_value(RANGE),
            compress: compress && !is_head,
            ranges,
            compress_min_size: self.config.compress_min_size,
        };
        self.framed_read.decoder_mut().recycle(frame);

        self.transition(ConnectionState::ResponseComposing);
        let response_result = handler.call(request).await;
        let keep_alive = self.send_response(response_result, negotiation).await?;
        self.transition(ConnectionState::ResponseSent);

        if keep_alive {
            Ok(Flow::Next)
        } else {
            SinkExt::<Message<(ResponseHead, PayloadSize), Bytes>>::flush(&mut self.framed_write).await?;
            Ok(Flow::Close)
        }
    }

    async fn read_body(
        &mut self,
        strategy: BodyStrategy,
        limits: &RouteLimits,
        frame: &mut RequestFrame,
    ) -> Result<RequestBody, ParseError> {
        self.transition(ConnectionState::BodyStreaming);
        let buffered = self.framed_read.read_buffer().len() as u64;
        let content = frame.content_mut();
        content.set_prefetch(content.remaining().map_or(buffered, |remaining| remaining.min(buffered)));

        let mut sink = BodySink::new(strategy, frame, limits);
        loop {
            match self.next_payload().await? {
                PayloadItem::Chunk(chunk) => {
                    let content = frame.content_mut();
                    content.advance(chunk.len() as u64);
                    ensure!(
                        content.offset() <= limits.max_net_buffer,
                        ParseError::too_large_body(content.offset(), limits.max_net_buffer)
                    );
                    sink.feed(chunk).await?;
                }
                PayloadItem::Eof => break,
            }
        }

        let content = frame.content_mut();
        content.finish();
        let (body, exceeds) = sink.finish(content.offset()).await?;
        if exceeds {
            content.mark_exceeds();
        }
        trace!(size = content.offset(), exceeds, "request body read");
        Ok(body)
    }

    async fn upgrade(&mut self, frame: RequestFrame, payload_size: PayloadSize) -> Result<Flow, HttpError> {
        if !payload_size.is_empty() {
            loop {
                match self.next_payload().await {
                    Ok(PayloadItem::Chunk(_)) => {}
                    Ok(PayloadItem::Eof) => break,
                    Err(e) => {
                        self.send_parse_error(&e).await;
                        return Err(e.into());
                    }
                }
            }
        }

        match accept(&frame) {
            Ok(head) => {
                self.framed_write.send(Message::<_, Bytes>::Header((head, PayloadSize::Empty))).await?;
                info!(path = frame.path(), "websocket upgrade accepted");
                Ok(Flow::Upgrade(frame))
            }
            Err(rejection) => {
                warn!(status = %rejection.status(), ?rejection, "websocket upgrade rejected");
                let negotiation = Negotiation::default();
                let mut head = rejection.into_response();
                let status = head.status();
                negotiation.finish_head(head.headers_mut(), &mut self.date, status);
                self.write_full(head, Bytes::new()).await?;
                Ok(Flow::Close)
            }
        }
    }

    fn into_upgrade(mut self, frame: RequestFrame) -> Disposition<R, W> {
        self.transition(ConnectionState::WebSocketUpgraded);
        let HttpConnection { framed_read, framed_write, config, .. } = self;
        let read_parts = framed_read.into_parts();
        Disposition::Upgraded(Upgrade {
            reader: read_parts.io,
            writer: framed_write.into_inner(),
            prefetch: read_parts.read_buf,
            request: frame,
            config,
        })
    }

    async fn send_response<T, E>(
        &mut self,
        response_result: Result<Response<T>, E>,
        negotiation: Negotiation,
    ) -> Result<bool, HttpError>
    where
        T: Body<Data = Bytes> + Unpin,
        T::Error: Display,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        match response_result {
            Ok(response) => self.do_send_response(response, negotiation).await,
            Err(e) => {
                let cause: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %cause, "handle response error");
                let error_response = build_error_response(StatusCode::INTERNAL_SERVER_ERROR);
                self.do_send_response(error_response, negotiation).await
            }
        }
    }

    /// Writes the response, returning whether the connection stays open.
    async fn do_send_response<T>(&mut self, response: Response<T>, mut negotiation: Negotiation) -> Result<bool, HttpError>
    where
        T: Body<Data = Bytes> + Unpin,
        T::Error: Display,
    {
        let (mut header_parts, mut body) = response.into_parts();
        if header_has_token(&header_parts.headers, CONNECTION, "close") {
            negotiation.keep_alive = false;
        }
        self.framed_write.encoder_mut().set_head_only(negotiation.head_request);

        let size_hint = body.size_hint().exact();
        if negotiation.needs_full_body(&header_parts, size_hint) {
            let collected = body
                .collect()
                .await
                .map_err(|e| SendError::invalid_body(format!("resolve response body error: {e}")))?
                .to_bytes();
            let shaped = negotiation.shape(&mut header_parts, collected)?;
            let status = header_parts.status;
            negotiation.finish_head(&mut header_parts.headers, &mut self.date, status);
            self.write_full(ResponseHead::from_parts(header_parts, ()), shaped).await?;
            return Ok(negotiation.keep_alive);
        }

        let status = header_parts.status;
        negotiation.finish_head(&mut header_parts.headers, &mut self.date, status);
        let payload_size = match size_hint {
            Some(length) => PayloadSize::new_length(length),
            None => PayloadSize::Chunked,
        };

        let header = Message::<_, T::Data>::Header((ResponseHead::from_parts(header_parts, ()), payload_size));
        if !payload_size.is_empty() {
            self.framed_write.feed(header).await?;
        } else {
            // using send instead of feed, because we want to flush the underlying IO
            // when response only has header, we need to send header,
            // otherwise, we just feed header to the buffer
            self.framed_write.send(header).await?;
        }

        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    // trailers are not forwarded
                    let Ok(data) = frame.into_data() else { continue };
                    self.framed_write
                        .send(Message::Payload(PayloadItem::Chunk(data)))
                        .await
                        .map_err(|e| SendError::invalid_body(format!("can't send response: {e}")))?;
                }
                Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve response body error: {e}")).into()),
                None => {
                    self.framed_write
                        .send(Message::Payload(PayloadItem::<T::Data>::Eof))
                        .await
                        .map_err(|e| SendError::invalid_body(format!("can't send eof response: {e}")))?;
                    return Ok(negotiation.keep_alive);
                }
            }
        }
    }

    async fn write_full(&mut self, head: ResponseHead, body: Bytes) -> Result<(), HttpError> {
        let payload_size = PayloadSize::new_length(body.len() as u64);
        self.framed_write.feed(Message::<_, Bytes>::Header((head, payload_size))).await?;
        if !body.is_empty() {
            self.framed_write.feed(Message::Payload(PayloadItem::Chunk(body))).await?;
        }
        self.framed_write.send(Message::Payload(PayloadItem::<Bytes>::Eof)).await?;
        Ok(())
    }

    /// Answers a failed request with a bare status before the connection closes.
    async fn send_parse_error(&mut self, e: &ParseError) {
        let Some(status) = e.status_code() else {
            return;
        };
        // a response may be half written, the peer would misread another one
        if self.state == ConnectionState::ResponseComposing {
            return;
        }
        let negotiation = Negotiation::default();
        let mut head = Response::new(());
        *head.status_mut() = status;
        negotiation.finish_head(head.headers_mut(), &mut self.date, status);
        self.framed_write.encoder_mut().set_head_only(false);
        if let Err(write_error) = self.write_full(head, Bytes::new()).await {
            debug!(cause = %write_error, "could not send error response");
        }
    }
}

fn expects_continue(frame: &RequestFrame) -> bool {
    frame.headers().get(EXPECT).is_some_and(|value| {
        let slice = value.as_bytes();
        slice.len() >= 4 && slice[..4].eq_ignore_ascii_case(b"100-")
    })
}

fn build_error_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::<Bytes>::new());
    *response.status_mut() = status_code;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use indoc::indoc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf, duplex};

    async fn echo_length(req: http::Request<RequestBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
        Ok(Response::new(format!("{} {}", req.uri().path(), req.body().len())))
    }

    type Halves = Disposition<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    async fn serve(input: &[u8], config: ServerConfig) -> (Result<Halves, HttpError>, String) {
        let (client, server) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let (mut client_reader, mut client_writer) = tokio::io::split(client);
        client_writer.write_all(input).await.unwrap();
        client_writer.shutdown().await.unwrap();

        let connection = HttpConnection::with_config(reader, writer, Arc::new(config));
        let result = connection.process(Arc::new(make_handler(echo_length))).await;

        // the connection owned the server halves and dropped them on return
        let mut output = Vec::new();
        client_reader.read_to_end(&mut output).await.unwrap();
        (result, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn keep_alive_then_close() {
        let input = indoc! {"
            GET /one HTTP/1.1\r
            Host: a\r
            \r
            POST /two HTTP/1.1\r
            Content-Length: 3\r
            Connection: close\r
            \r
            abc"};
        let (result, output) = serve(input.as_bytes(), ServerConfig::default()).await;
        assert!(matches!(result, Ok(Disposition::Closed)));

        let responses: Vec<_> = output.split("HTTP/1.1 200 OK\r\n").skip(1).collect();
        assert_eq!(responses.len(), 2);
        assert!(responses[0].contains("connection: keep-alive\r\n"));
        assert!(responses[0].ends_with("\r\n\r\n/one 0"));
        assert!(responses[1].contains("connection: close\r\n"));
        assert!(responses[1].ends_with("\r\n\r\n/two 3"));
    }

    #[tokio::test]
    async fn max_keep_alive_requests() {
        let input = "GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\nGET /c HTTP/1.1\r\n\r\n";
        let (_, output) = serve(input.as_bytes(), ServerConfig::default().with_max_keep_alive_requests(2)).await;
        assert_eq!(output.matches("HTTP/1.1 200 OK").count(), 2);
        assert!(output.ends_with("/b 0"));
    }

    #[tokio::test]
    async fn expect_continue() {
        let input = "PUT /up HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";
        let (_, output) = serve(input.as_bytes(), ServerConfig::default()).await;
        assert!(output.starts_with("HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\n"));
        assert!(output.ends_with("/up 2"));
    }

    #[tokio::test]
    async fn get_body_is_not_a_second_request() {
        let inner = "GET /smuggled HTTP/1.1\r\n\r\n";
        let input = format!("GET /a HTTP/1.1\r\nContent-Length: {}\r\n\r\n{inner}", inner.len());
        let (result, output) = serve(input.as_bytes(), ServerConfig::default()).await;
        assert!(matches!(result, Ok(Disposition::Closed)));
        assert_eq!(output.matches("HTTP/1.1 200 OK").count(), 1);
        assert!(output.ends_with(&format!("/a {}", inner.len())));
        assert!(!output.contains("/smuggled"));
    }

    #[tokio::test]
    async fn declared_body_over_ceiling() {
        let input = "POST /big HTTP/1.1\r\nContent-Length: 100\r\n\r\n";
        let (result, output) = serve(input.as_bytes(), ServerConfig::default().with_max_net_buffer(10)).await;
        assert!(matches!(
            result,
            Err(HttpError::RequestError { source: ParseError::TooLargeBody { current_size: 100, max_size: 10 } })
        ));
        assert!(output.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(output.contains("connection: close\r\n"));
    }

    #[tokio::test]
    async fn chunked_body_over_ceiling() {
        let input = "POST /big HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n8\r\n01234567\r\n8\r\n01234567\r\n0\r\n\r\n";
        let (result, output) = serve(input.as_bytes(), ServerConfig::default().with_max_net_buffer(10)).await;
        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::TooLargeBody { .. } })));
        assert!(output.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn malformed_head() {
        let (result, output) = serve(b"GET / HTTP/9.9\r\n\r\n", ServerConfig::default()).await;
        assert!(result.is_err());
        assert!(output.starts_with("HTTP/1.1 505 "));
    }

    #[tokio::test]
    async fn head_request_keeps_length() {
        let input = "HEAD /abc HTTP/1.1\r\nConnection: close\r\n\r\n";
        let (_, output) = serve(input.as_bytes(), ServerConfig::default()).await;
        assert!(output.contains("content-length: 6\r\n"));
        assert!(output.ends_with("\r\n\r\n"));
    }

    #[test]
    fn expect_header_matching() {
        let frame = |raw: &str| {
            use tokio_util::codec::Decoder;
            crate::codec::head::RequestHeadDecoder::new().decode(&mut BytesMut::from(raw)).unwrap().unwrap().0
        };
        assert!(expects_continue(&frame("PUT / HTTP/1.1\r\nExpect: 100-continue\r\n\r\n")));
        assert!(!expects_continue(&frame("PUT / HTTP/1.1\r\n\r\n")));
    }
}
