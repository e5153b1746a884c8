//! A WebSocket session over an upgraded transport.
//!
//! The session owns the reader, the writer and the codec, and runs as one task. Inbound
//! messages are handed to a [`WebSocketHandler`]; callbacks answer through an [`Outbox`] that
//! is flushed as soon as the callback returns. Other tasks talk to the session through a
//! cloneable [`WsSender`], whose messages go through a bounded channel and are written in the
//! order they were received.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, trace, warn};

use crate::config::WebSocketConfig;
use crate::protocol::WsError;
use crate::websocket::codec::{Role, WebSocketCodec};
use crate::websocket::frame::{CloseFrame, WsMessage};

const READ_CAPACITY: usize = 8 * 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Open = 0,
    /// Our close frame is out, waiting for the peer's.
    Closing = 1,
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Open,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

#[derive(Debug)]
struct Outbound {
    message: WsMessage,
    done: Option<oneshot::Sender<Result<(), WsError>>>,
}

/// A handle for sending on a session from any task.
#[derive(Debug, Clone)]
pub struct WsSender {
    tx: mpsc::Sender<Outbound>,
    state: Arc<AtomicU8>,
}

impl WsSender {
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Sends a message and waits until it has been written to the transport.
    ///
    /// Must not be awaited from inside a [`WebSocketHandler`] callback, the session is busy
    /// running that callback; use the [`Outbox`] there.
    pub async fn send(&self, message: impl Into<WsMessage>) -> Result<(), WsError> {
        if !self.is_open() {
            return Err(WsError::Closed);
        }
        let (done, written) = oneshot::channel();
        self.tx.send(Outbound { message: message.into(), done: Some(done) }).await.map_err(|_| WsError::Closed)?;
        written.await.map_err(|_| WsError::Closed)?
    }

    /// Queues a message without waiting for the write.
    pub async fn enqueue(&self, message: impl Into<WsMessage>) -> Result<(), WsError> {
        if !self.is_open() {
            return Err(WsError::Closed);
        }
        self.tx.send(Outbound { message: message.into(), done: None }).await.map_err(|_| WsError::Closed)
    }

    /// Starts the closing handshake.
    pub async fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), WsError> {
        self.send(WsMessage::Close(Some(CloseFrame::new(code, reason)))).await
    }
}

/// Messages a callback wants written, flushed in order once it returns.
#[derive(Debug)]
pub struct Outbox {
    queue: VecDeque<WsMessage>,
    sender: WsSender,
}

impl Outbox {
    pub fn send(&mut self, message: impl Into<WsMessage>) {
        self.queue.push_back(message.into());
    }

    pub fn close(&mut self, code: u16, reason: impl Into<String>) {
        self.send(WsMessage::Close(Some(CloseFrame::new(code, reason))));
    }

    /// A handle to keep for sending from other tasks later.
    pub fn sender(&self) -> WsSender {
        self.sender.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Callbacks of a running session.
#[async_trait]
pub trait WebSocketHandler: Send {
    async fn on_open(&mut self, _outbox: &mut Outbox) -> Result<(), WsError> {
        Ok(())
    }

    /// A complete text or binary message, or an unsolicited pong.
    async fn on_message(&mut self, message: WsMessage, outbox: &mut Outbox) -> Result<(), WsError>;

    /// Returns `true` when the ping was answered here; otherwise a pong is sent automatically.
    async fn on_ping(&mut self, _payload: &Bytes, _outbox: &mut Outbox) -> bool {
        false
    }

    /// The session is over; `frame` is the peer's close payload when it sent one.
    async fn on_close(&mut self, _frame: Option<CloseFrame>) {}
}

#[derive(Debug)]
pub struct WebSocketSession<R, W> {
    reader: R,
    writer: W,
    codec: WebSocketCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
    config: WebSocketConfig,
    state: Arc<AtomicU8>,
    tx: mpsc::Sender<Outbound>,
    rx: mpsc::Receiver<Outbound>,
    close_sent_at: Option<Instant>,
    last_activity: Instant,
}

impl<R, W> WebSocketSession<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, role: Role, config: WebSocketConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.outbound_capacity.max(1));
        Self {
            reader,
            writer,
            codec: WebSocketCodec::with_max_message_size(role, config.max_message_size),
            read_buf: BytesMut::with_capacity(READ_CAPACITY),
            write_buf: BytesMut::new(),
            config,
            state: Arc::new(AtomicU8::new(SessionState::Open as u8)),
            tx,
            rx,
            close_sent_at: None,
            last_activity: Instant::now(),
        }
    }

    /// Bytes read past the handshake that already belong to the session.
    pub fn with_prefetch(mut self, prefetch: &[u8]) -> Self {
        self.read_buf.extend_from_slice(prefetch);
        self
    }

    pub fn role(&self) -> Role {
        self.codec.role()
    }

    pub fn sender(&self) -> WsSender {
        WsSender { tx: self.tx.clone(), state: Arc::clone(&self.state) }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Whether the session should be torn down without waiting on the peer: the close
    /// handshake or the idle period timed out.
    pub fn is_dead(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline) || self.state() == SessionState::Closed
    }

    fn deadline(&self) -> Option<Instant> {
        match self.state() {
            SessionState::Closing => self.close_sent_at.map(|at| at + self.config.close_timeout()),
            SessionState::Open => self.config.idle_timeout().map(|idle| self.last_activity + idle),
            SessionState::Closed => None,
        }
    }

    /// Drives the session until it is closed, calling `handler` for each event.
    ///
    /// Returns `Ok` after a completed closing handshake, or the error that ended it.
    pub async fn run<H: WebSocketHandler>(mut self, handler: &mut H) -> Result<(), WsError> {
        let result = self.drive(handler).await;
        self.set_state(SessionState::Closed);
        self.fail_pending();
        if let Err(e) = self.writer.shutdown().await {
            trace!(cause = %e, "websocket transport shutdown failed");
        }
        result
    }

    async fn drive<H: WebSocketHandler>(&mut self, handler: &mut H) -> Result<(), WsError> {
        let mut outbox = Outbox { queue: VecDeque::new(), sender: self.sender() };
        handler.on_open(&mut outbox).await?;
        self.flush_outbox(&mut outbox).await?;

        loop {
            while self.state() != SessionState::Closed {
                let message = match self.codec.decode(&mut self.read_buf) {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(e) => return self.fail(e, handler).await,
                };
                if let Err(e) = self.dispatch(message, handler, &mut outbox).await {
                    return self.fail(e, handler).await;
                }
            }
            if self.state() == SessionState::Closed {
                return Ok(());
            }

            let deadline = self.deadline();
            select! {
                biased;

                read = self.reader.read_buf(&mut self.read_buf) => match read {
                    Ok(0) => {
                        let state = self.state();
                        self.set_state(SessionState::Closed);
                        handler.on_close(None).await;
                        return if state == SessionState::Closing {
                            Ok(())
                        } else {
                            Err(io::Error::from(io::ErrorKind::UnexpectedEof).into())
                        };
                    }
                    Ok(n) => {
                        trace!(bytes = n, "websocket read");
                        self.last_activity = Instant::now();
                    }
                    Err(e) => {
                        self.set_state(SessionState::Closed);
                        handler.on_close(None).await;
                        return Err(e.into());
                    }
                },

                Some(outbound) = self.rx.recv(), if self.state() == SessionState::Open => {
                    let result = self.write_message(outbound.message).await;
                    let failed = result.as_ref().err().map(ToString::to_string);
                    if let Some(done) = outbound.done {
                        let _ = done.send(result.map_err(|_| WsError::Closed));
                    }
                    if let Some(cause) = failed {
                        warn!(cause, "websocket write failed");
                        self.set_state(SessionState::Closed);
                        handler.on_close(None).await;
                        return Err(io::Error::other(cause).into());
                    }
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.is_dead(Instant::now()) {
                        let state = self.state();
                        self.set_state(SessionState::Closed);
                        handler.on_close(None).await;
                        if state == SessionState::Closing {
                            info!("peer did not answer our close frame, closing transport");
                            return Ok(());
                        }
                        info!("websocket session idle, closing transport");
                        return Err(io::Error::from(io::ErrorKind::TimedOut).into());
                    }
                }
            }
        }
    }

    async fn dispatch<H: WebSocketHandler>(
        &mut self,
        message: WsMessage,
        handler: &mut H,
        outbox: &mut Outbox,
    ) -> Result<(), WsError> {
        match message {
            WsMessage::Ping(payload) => {
                if !handler.on_ping(&payload, outbox).await {
                    outbox.send(WsMessage::Pong(payload));
                }
            }
            WsMessage::Close(frame) => {
                debug!(code = ?frame.as_ref().map(|frame| frame.code), "peer closed websocket");
                if self.state() == SessionState::Open {
                    let echo = frame.as_ref().map(|frame| CloseFrame::new(frame.code, ""));
                    self.write_message(WsMessage::Close(echo)).await?;
                }
                self.set_state(SessionState::Closed);
                handler.on_close(frame).await;
                return Ok(());
            }
            message => handler.on_message(message, outbox).await?,
        }
        self.flush_outbox(outbox).await
    }

    async fn flush_outbox(&mut self, outbox: &mut Outbox) -> Result<(), WsError> {
        while let Some(message) = outbox.queue.pop_front() {
            if self.state() != SessionState::Open {
                trace!(opcode = ?message.opcode(), "dropping message queued after close");
                continue;
            }
            self.write_message(message).await?;
        }
        Ok(())
    }

    async fn write_message(&mut self, message: WsMessage) -> Result<(), WsError> {
        let closing = message.is_close();
        self.codec.encode(message, &mut self.write_buf)?;
        self.writer.write_all(&self.write_buf).await?;
        self.writer.flush().await?;
        self.write_buf.clear();
        if closing && self.state() == SessionState::Open {
            self.set_state(SessionState::Closing);
            self.close_sent_at = Some(Instant::now());
        }
        Ok(())
    }

    /// Tells the peer why, then ends the session with `e`.
    async fn fail<H: WebSocketHandler>(&mut self, e: WsError, handler: &mut H) -> Result<(), WsError> {
        warn!(cause = %e, "websocket session failed");
        if self.state() == SessionState::Open {
            let close = CloseFrame::new(e.close_code(), "");
            if let Err(write_error) = self.write_message(WsMessage::Close(Some(close))).await {
                debug!(cause = %write_error, "could not send close frame");
            }
        }
        self.set_state(SessionState::Closed);
        handler.on_close(None).await;
        Err(e)
    }

    fn fail_pending(&mut self) {
        self.rx.close();
        while let Ok(outbound) = self.rx.try_recv() {
            if let Some(done) = outbound.done {
                let _ = done.send(Err(WsError::Closed));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::codec::encode_frame;
    use crate::websocket::frame::Opcode;
    use std::time::Duration;
    use tokio::io::{DuplexStream, duplex};

    struct Echo {
        closed_with: Option<Option<CloseFrame>>,
    }

    #[async_trait]
    impl WebSocketHandler for Echo {
        async fn on_message(&mut self, message: WsMessage, outbox: &mut Outbox) -> Result<(), WsError> {
            outbox.send(message);
            Ok(())
        }

        async fn on_close(&mut self, frame: Option<CloseFrame>) {
            self.closed_with = Some(frame);
        }
    }

    fn server(config: WebSocketConfig) -> (WebSocketSession<tokio::io::ReadHalf<DuplexStream>, tokio::io::WriteHalf<DuplexStream>>, DuplexStream) {
        let (local, peer) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(local);
        (WebSocketSession::new(reader, writer, Role::Server, config), peer)
    }

    fn client_frame(opcode: Opcode, payload: &[u8]) -> BytesMut {
        let mut dst = BytesMut::new();
        encode_frame(opcode, true, payload, Some([1, 2, 3, 4]), &mut dst);
        dst
    }

    async fn read_messages(peer: &mut DuplexStream) -> Vec<WsMessage> {
        let mut raw = Vec::new();
        peer.read_to_end(&mut raw).await.unwrap();
        let mut codec = WebSocketCodec::new(Role::Client);
        let mut src = BytesMut::from(&raw[..]);
        std::iter::from_fn(|| codec.decode(&mut src).unwrap()).collect()
    }

    #[tokio::test]
    async fn echo_ping_and_close() {
        let (session, mut peer) = server(WebSocketConfig::default());
        peer.write_all(&client_frame(Opcode::Text, b"hi")).await.unwrap();
        peer.write_all(&client_frame(Opcode::Ping, b"p")).await.unwrap();
        peer.write_all(&client_frame(Opcode::Close, &CloseFrame::new(1000, "bye").encode())).await.unwrap();

        let mut echo = Echo { closed_with: None };
        session.run(&mut echo).await.unwrap();
        assert_eq!(echo.closed_with, Some(Some(CloseFrame::new(1000, "bye"))));

        assert_eq!(
            read_messages(&mut peer).await,
            vec![
                WsMessage::Text("hi".into()),
                WsMessage::Pong(Bytes::from_static(b"p")),
                WsMessage::Close(Some(CloseFrame::new(1000, ""))),
            ]
        );
    }

    #[tokio::test]
    async fn protocol_violation_closes_with_1002() {
        let (session, mut peer) = server(WebSocketConfig::default());
        let mut unmasked = BytesMut::new();
        encode_frame(Opcode::Text, true, b"x", None, &mut unmasked);
        peer.write_all(&unmasked).await.unwrap();

        let result = session.run(&mut Echo { closed_with: None }).await;
        assert!(matches!(result, Err(WsError::UnmaskedFrame)));
        assert_eq!(
            read_messages(&mut peer).await,
            vec![WsMessage::Close(Some(CloseFrame::new(CloseFrame::PROTOCOL_ERROR, "")))]
        );
    }

    #[tokio::test]
    async fn oversized_message_closes_with_1009() {
        let (session, mut peer) = server(WebSocketConfig::default().with_max_message_size(4));
        peer.write_all(&client_frame(Opcode::Binary, b"too long")).await.unwrap();

        let result = session.run(&mut Echo { closed_with: None }).await;
        assert!(matches!(result, Err(WsError::TooLarge { .. })));
        assert_eq!(
            read_messages(&mut peer).await,
            vec![WsMessage::Close(Some(CloseFrame::new(CloseFrame::TOO_LARGE, "")))]
        );
    }

    #[tokio::test]
    async fn sender_from_another_task() {
        let (session, mut peer) = server(WebSocketConfig::default());
        let sender = session.sender();
        let task = tokio::spawn(async move { session.run(&mut Echo { closed_with: None }).await });

        sender.send("pushed").await.unwrap();
        sender.close(CloseFrame::NORMAL, "done").await.unwrap();
        assert_eq!(sender.state(), SessionState::Closing);
        assert!(sender.send("late").await.is_err());

        peer.write_all(&client_frame(Opcode::Close, &CloseFrame::new(1000, "").encode())).await.unwrap();
        task.await.unwrap().unwrap();
        assert!(sender.is_closed());

        assert_eq!(
            read_messages(&mut peer).await,
            vec![WsMessage::Text("pushed".into()), WsMessage::Close(Some(CloseFrame::new(1000, "done")))]
        );
    }

    struct CloseOnOpen;

    #[async_trait]
    impl WebSocketHandler for CloseOnOpen {
        async fn on_open(&mut self, outbox: &mut Outbox) -> Result<(), WsError> {
            outbox.close(CloseFrame::GOING_AWAY, "");
            Ok(())
        }

        async fn on_message(&mut self, _message: WsMessage, _outbox: &mut Outbox) -> Result<(), WsError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn close_timeout_forces_termination() {
        let (session, _peer) = server(WebSocketConfig::default().with_close_timeout_ms(50));
        let result = tokio::time::timeout(Duration::from_secs(5), session.run(&mut CloseOnOpen)).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn idle_deadline() {
        let (session, _peer) = server(WebSocketConfig::default().with_idle_timeout_secs(10));
        let now = Instant::now();
        assert!(!session.is_dead(now));
        assert!(session.is_dead(now + Duration::from_secs(11)));

        let (session, _peer) = server(WebSocketConfig::default().with_idle_timeout_secs(0));
        assert!(!session.is_dead(Instant::now() + Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn transport_eof_fails_session() {
        let (session, peer) = server(WebSocketConfig::default());
        drop(peer);
        let mut echo = Echo { closed_with: None };
        let result = session.run(&mut echo).await;
        assert!(matches!(result, Err(WsError::Io { .. })));
        assert_eq!(echo.closed_with, Some(None));
    }
}
