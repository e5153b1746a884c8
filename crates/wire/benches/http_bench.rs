use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use http::{Request, Response, StatusCode};
use micro_wire::handler::make_handler;
use micro_wire::{
    codec::{RequestDecoder, ResponseEncoder},
    connection::{HttpConnection, RequestBody},
    protocol::{Message, PayloadSize, ResponseHead},
    websocket::{Opcode, Role, WebSocketCodec, encode_frame},
};
use std::{
    error::Error,
    hint::black_box,
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::runtime::Runtime;
use tokio_util::codec::{Decoder, Encoder};

// Mock IO for testing
#[derive(Clone)]
struct MockIO {
    read_data: Vec<u8>,
    write_data: Vec<u8>,
    read_pos: usize,
}

impl MockIO {
    fn new(read_data: Vec<u8>) -> Self {
        Self { read_data, write_data: Vec::new(), read_pos: 0 }
    }
}

impl AsyncRead for MockIO {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let remaining = &self.read_data[self.read_pos..];
        let amt = std::cmp::min(remaining.len(), buf.remaining());
        buf.put_slice(&remaining[..amt]);
        self.read_pos += amt;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockIO {
    fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        self.write_data.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }
}

// Test handler
async fn test_handler(req: Request<RequestBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
    let response = Response::builder().status(StatusCode::OK).body(format!("received {} bytes", req.body().len()))?;
    Ok(response)
}

fn bench_request_decoder(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_response_encoder(c: &mut Criterion) {
    let response = Response::builder().status(StatusCode::OK).body("Hello World!".to_string()).unwrap();

    c.bench_function("encode_simple_response", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            let (header, body) = response.clone().into_parts();
            let payload_size = body.len();
            let message = Message::<_, Bytes>::Header((ResponseHead::from_parts(header, ()), PayloadSize::Length(payload_size as u64)));
            black_box(encoder.encode(message, &mut bytes).unwrap());
        });
    });
}

fn bench_websocket_frames(c: &mut Criterion) {
    let mut frames = BytesMut::new();
    for _ in 0..64 {
        encode_frame(Opcode::Text, true, b"{\"op\":\"tick\",\"seq\":42}", Some([1, 2, 3, 4]), &mut frames);
    }

    c.bench_function("parse_masked_frames", |b| {
        b.iter(|| {
            let mut codec = WebSocketCodec::new(Role::Server);
            codec.parse_frame(&frames).unwrap();
            while let Some(frame) = codec.get_frame() {
                black_box(frame);
            }
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let handler = Arc::new(make_handler(test_handler));
    let requests: [(&str, &[u8]); 2] = [
        ("process_simple_request", b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"),
        (
            "process_chunked_request",
            b"POST /upload HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
        ),
    ];

    for (name, request) in requests {
        c.bench_function(name, |b| {
            b.to_async(&runtime).iter(|| {
                let handler = handler.clone();
                async move {
                    let mock_io = MockIO::new(request.to_vec());
                    let (reader, writer) = (mock_io.clone(), mock_io);
                    let connection = HttpConnection::new(reader, writer);
                    black_box(connection.process(handler).await.unwrap());
                }
            });
        });
    }
}

criterion_group!(benches, bench_request_decoder, bench_response_encoder, bench_websocket_frames, bench_http_connection);
criterion_main!(benches);
