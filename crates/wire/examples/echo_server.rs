//! Serves `/` with a greeting, echoes uploads, and echoes websocket messages on `/ws`.
//!
//! ```text
//! cargo run --example echo_server
//! curl -F file=@Cargo.toml http://127.0.0.1:8080/upload
//! ```

use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Request, Response, StatusCode};
use micro_wire::config::ServerConfig;
use micro_wire::connection::{BodyStrategy, Disposition, HttpConnection, RequestBody, Route};
use micro_wire::handler::make_handler;
use micro_wire::protocol::{RequestFrame, WsError};
use micro_wire::websocket::{CloseFrame, Outbox, WebSocketHandler, WsMessage};
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

struct Echo;

#[async_trait]
impl WebSocketHandler for Echo {
    async fn on_message(&mut self, message: WsMessage, outbox: &mut Outbox) -> Result<(), WsError> {
        outbox.send(message);
        Ok(())
    }

    async fn on_close(&mut self, frame: Option<CloseFrame>) {
        info!(code = frame.map(|frame| frame.code), "websocket closed by peer");
    }
}

fn route(frame: &RequestFrame) -> Route {
    match frame.path() {
        "/ws" => Route::new().with_websocket(true),
        "/upload" => Route::new().with_body(BodyStrategy::Store),
        _ => Route::new().with_compression(true).with_ranges(true),
    }
}

async fn serve(request: Request<RequestBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
    info!(method = %request.method(), path = request.uri().path(), size = request.body().len(), "receiving request");

    let body = match request.body() {
        RequestBody::Parts(parts) => parts
            .iter()
            .map(|part| format!("{}: {} bytes\n", part.name().unwrap_or("-"), part.len()))
            .collect(),
        RequestBody::Empty => "Hello World!\r\n".to_string(),
        other => format!("{} bytes\n", other.len()),
    };

    let response = Response::builder().status(StatusCode::OK).body(body)?;
    Ok(response)
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let config = Arc::new(ServerConfig::default());
    let handler = Arc::new(make_handler(serve).with_route(route));

    loop {
        let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let handler = handler.clone();
        let config = config.clone();

        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            let connection = HttpConnection::with_config(reader, writer, config);
            match connection.process(handler).await {
                Ok(Disposition::Closed) => info!(%remote_addr, "finished process, connection shutdown"),
                Ok(Disposition::Upgraded(upgrade)) => {
                    info!(%remote_addr, path = upgrade.request.path(), "websocket upgraded");
                    if let Err(e) = upgrade.into_session().run(&mut Echo).await {
                        warn!(cause = %e, "websocket session failed");
                    }
                }
                Err(e) => error!(cause = %e, "service has error, connection shutdown"),
            }
        });
    }
}
