//! The client side of the protocol: requests out, responses in.
//!
//! [`HttpClient`] composes request heads (adding `Host`, `Accept` and `User-Agent`), sends
//! raw or `multipart/form-data` bodies, and reads back complete responses. It can also
//! upgrade its connection into a client side [`WebSocketSession`](crate::websocket::WebSocketSession).

mod http_client;

pub use http_client::{ClientBody, ClientPart, ClientResponse, HttpClient};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::multipart::MultipartForm;
    use crate::config::ClientConfig;
    use crate::protocol::{HttpError, ParseError};
    use crate::websocket::handshake::derive_accept;
    use crate::websocket::{Role, WsMessage};
    use http::StatusCode;
    use indoc::indoc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf, duplex};

    fn client(config: ClientConfig) -> (HttpClient<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>, DuplexStream) {
        let (local, server) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(local);
        (HttpClient::with_config(reader, writer, "example.com", config), server)
    }

    async fn read_head(server: &mut DuplexStream) -> String {
        let mut head = Vec::new();
        while !head.ends_with(b"\r\n\r\n") {
            head.push(server.read_u8().await.unwrap());
        }
        String::from_utf8(head).unwrap()
    }

    #[tokio::test]
    async fn get_with_chunked_response() {
        let (mut client, mut server) = client(ClientConfig::default());
        let server_task = tokio::spawn(async move {
            let head = read_head(&mut server).await;
            server
                .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n")
                .await
                .unwrap();
            head
        });

        let response = client.get("/wiki?page=1").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().unwrap(), "Wikipedia");
        assert!(response.keep_alive());
        assert!(response.frame().content().is_finalized());

        let head = server_task.await.unwrap();
        assert!(head.starts_with("GET /wiki?page=1 HTTP/1.1\r\n"));
        assert!(head.contains("host: example.com\r\n"));
        assert!(head.contains("accept: */*\r\n"));
        assert!(head.contains("user-agent: micro-wire/"));
    }

    #[tokio::test]
    async fn skips_interim_response() {
        let (mut client, mut server) = client(ClientConfig::default());
        tokio::spawn(async move {
            read_head(&mut server).await;
            server.write_all(b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok").await.unwrap();
            server
        });

        let response = client.post("/items", "data").await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body(), "ok");
    }

    #[tokio::test]
    async fn form_upload() {
        let (mut client, mut server) = client(ClientConfig::default());
        let form = MultipartForm::with_boundary("xyz").text("field", "value").bytes("up", "a.bin", None, "payload");
        let length = form.content_length();

        let server_task = tokio::spawn(async move {
            let head = read_head(&mut server).await;
            let mut body = vec![0; length as usize];
            server.read_exact(&mut body).await.unwrap();
            server.write_all(b"HTTP/1.1 204 No Content\r\n\r\n").await.unwrap();
            (head, String::from_utf8(body).unwrap())
        });

        let response = client.post("/upload", form).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let (head, body) = server_task.await.unwrap();
        assert!(head.contains("content-type: multipart/form-data; boundary=xyz\r\n"));
        assert!(head.contains(&format!("content-length: {length}\r\n")));
        assert!(body.starts_with("--xyz\r\n"));
        assert!(body.contains("name=\"up\"; filename=\"a.bin\""));
        assert!(body.ends_with("--xyz--\r\n"));
    }

    #[tokio::test]
    async fn response_body_limit() {
        let (mut client, mut server) = client(ClientConfig::default().with_max_response_body(4));
        tokio::spawn(async move {
            read_head(&mut server).await;
            server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n0123456789").await.unwrap();
            server
        });

        let result = client.get("/").await;
        assert!(matches!(
            result,
            Err(HttpError::RequestError { source: ParseError::TooLargeBody { current_size: 10, max_size: 4 } })
        ));
    }

    #[tokio::test]
    async fn multipart_response_parts() {
        let (mut client, mut server) = client(ClientConfig::default());
        let body = indoc! {"
            --b\r
            Content-Type: text/plain\r
            \r
            first\r
            --b\r
            \r
            second\r
            --b--\r
            "};
        tokio::spawn(async move {
            read_head(&mut server).await;
            let head = format!("HTTP/1.1 200 OK\r\nContent-Type: multipart/mixed; boundary=b\r\nContent-Length: {}\r\n\r\n", body.len());
            server.write_all(head.as_bytes()).await.unwrap();
            server.write_all(body.as_bytes()).await.unwrap();
            server
        });

        let response = client.get("/parts").await.unwrap();
        let parts = response.parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].header.content_type(), Some("text/plain"));
        assert_eq!(parts[0].data, "first");
        assert_eq!(parts[1].data, "second");
    }

    #[tokio::test]
    async fn websocket_handshake() {
        let (client, mut server) = client(ClientConfig::default());
        let server_task = tokio::spawn(async move {
            let head = read_head(&mut server).await;
            let key = head
                .lines()
                .find_map(|line| line.strip_prefix("sec-websocket-key: "))
                .unwrap()
                .to_owned();
            let response = format!(
                "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
                derive_accept(key.as_bytes())
            );
            server.write_all(response.as_bytes()).await.unwrap();
            // an unmasked server frame right behind the handshake
            server.write_all(&[0x81, 0x02, b'h', b'i']).await.unwrap();
            server
        });

        let session = client.websocket("/chat").await.unwrap();
        assert_eq!(session.role(), Role::Client);
        let _server = server_task.await.unwrap();

        struct First(Option<WsMessage>);

        #[async_trait::async_trait]
        impl crate::websocket::WebSocketHandler for First {
            async fn on_message(
                &mut self,
                message: WsMessage,
                outbox: &mut crate::websocket::Outbox,
            ) -> Result<(), crate::protocol::WsError> {
                self.0 = Some(message);
                outbox.close(1000, "");
                Ok(())
            }
        }

        let mut first = First(None);
        let _ = tokio::time::timeout(std::time::Duration::from_millis(200), session.run(&mut first)).await;
        assert_eq!(first.0, Some(WsMessage::Text("hi".into())));
    }

    #[tokio::test]
    async fn websocket_handshake_rejected() {
        let (client, mut server) = client(ClientConfig::default());
        tokio::spawn(async move {
            read_head(&mut server).await;
            server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await.unwrap();
            server
        });

        assert!(client.websocket("/chat").await.is_err());
    }
}
