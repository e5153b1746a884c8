use std::hint::black_box;

use bencher::{TestCase, chunked_body, get_request, multipart_body};
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_wire::codec::RequestDecoder;
use micro_wire::codec::body::ChunkedDecoder;
use micro_wire::codec::multipart::MultipartDecoder;
use micro_wire::websocket::{Opcode, Role, WebSocketCodec, encode_frame};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::Decoder;

fn benchmark_request_decoder(criterion: &mut Criterion) {
    let test_cases = vec![
        TestCase::small("small_header_decoder", get_request(0)),
        TestCase::normal("large_header_decoder", get_request(48)),
    ];
    let mut group = criterion.benchmark_group("request_decoder");

    for case in test_cases {
        group.throughput(Throughput::Bytes(case.input().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            let mut request_decoder = RequestDecoder::new();
            b.iter_batched_ref(
                || BytesMut::from(case.input()),
                |bytes_mut| {
                    let header = request_decoder.decode(bytes_mut).expect("input should be valid http request header").unwrap();
                    let body = request_decoder.decode(bytes_mut).expect("input should be valid http request body").unwrap();
                    black_box((header, body));
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_chunked_decoder(criterion: &mut Criterion) {
    let test_cases = vec![
        TestCase::normal("small_chunks", chunked_body(64 * 1024, 256)),
        TestCase::large("large_chunks", chunked_body(1024 * 1024, 64 * 1024)),
    ];
    let mut group = criterion.benchmark_group("chunked_decoder");

    for case in test_cases {
        group.throughput(Throughput::Bytes(case.input().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter_batched_ref(
                || (ChunkedDecoder::new(), BytesMut::from(case.input())),
                |(decoder, bytes_mut)| {
                    while let Some(item) = decoder.decode(bytes_mut).expect("input should be a valid chunked body") {
                        if item.is_eof() {
                            break;
                        }
                        black_box(item);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_multipart_decoder(criterion: &mut Criterion) {
    let case = TestCase::large("eight_parts", multipart_body("----0x5f3a9b", 8, 64 * 1024));
    let mut group = criterion.benchmark_group("multipart_decoder");
    group.throughput(Throughput::Bytes(case.input().len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
        b.iter_batched_ref(
            || (MultipartDecoder::new("----0x5f3a9b"), BytesMut::from(case.input())),
            |(decoder, bytes_mut)| {
                while let Some(item) = decoder.decode_eof(bytes_mut).expect("input should be a valid multipart body") {
                    black_box(item);
                }
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn benchmark_websocket_codec(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("websocket_codec");
    for size in [125usize, 64 * 1024] {
        let payload = vec![0x5a; size];
        let mut frames = BytesMut::new();
        for _ in 0..16 {
            encode_frame(Opcode::Binary, true, &payload, Some([0x37, 0xfa, 0x21, 0x3d]), &mut frames);
        }
        let case = TestCase::normal(if size == 125 { "small_frames" } else { "large_frames" }, frames.to_vec());

        group.throughput(Throughput::Bytes(case.input().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter_batched_ref(
                || WebSocketCodec::new(Role::Server),
                |codec| {
                    codec.parse_frame(case.input()).expect("input should be valid websocket frames");
                    while let Some(frame) = codec.get_frame() {
                        black_box(frame);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    decoder,
    benchmark_request_decoder,
    benchmark_chunked_decoder,
    benchmark_multipart_decoder,
    benchmark_websocket_codec
);
criterion_main!(decoder);
