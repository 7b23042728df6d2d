use core::{fmt, hint::black_box};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::stream::FuturesUnordered;
use greeter_tonic_core::{
    proto::{HelloRequest, greeter_client::GreeterClient},
    types::Banner,
};
use greeter_tonic_server::{GreeterService, ServerConfig, server::service::build_greeter_service};
use std::{net::SocketAddr, time::Instant};
use tokio::{net::TcpListener, runtime::Builder};
use tokio_stream::{StreamExt, wrappers::TcpListenerStream};
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Server},
};

#[derive(Clone, Copy, Debug)]
enum Compression {
    None,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Call {
    Unary,
    Async,
    ServerStream,
    BiStream,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Unary => write!(f, "say_hello"),
            Call::Async => write!(f, "say_hello_async"),
            Call::ServerStream => write!(f, "say_hello_server_stream"),
            Call::BiStream => write!(f, "say_hello_bi_stream"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct GrpcBenchParams {
    call: Call,
    concurrency: usize,
    compression: Compression,
}

const STREAM_REPLIES: usize = 5;
const BI_STREAM_NAMES: usize = 100;

impl GrpcBenchParams {
    /// Replies received by one client task.
    const fn replies_per_task(&self) -> u64 {
        match self.call {
            Call::Unary | Call::Async => 1,
            Call::ServerStream => STREAM_REPLIES as u64,
            Call::BiStream => BI_STREAM_NAMES as u64,
        }
    }
}

async fn serve_in_process() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");

    let config = ServerConfig {
        num_workers: 16,
        stream_replies: STREAM_REPLIES,
        stream_buffer_size: 64,
        ..ServerConfig::default()
    };
    let service = GreeterService::new(config, Banner::default());

    tokio::spawn(
        Server::builder()
            .add_service(build_greeter_service(service))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    addr
}

fn grpc_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let addr = rt.block_on(serve_in_process());
    let uri = format!("http://{addr}");

    let call_cases = [Call::Unary, Call::Async, Call::ServerStream, Call::BiStream];
    let concurrency_cases = [1, 8, 32];
    let compression_cases = [Compression::None, Compression::Zstd, Compression::Gzip];

    let mut cases = Vec::new();
    for &call in &call_cases {
        for &concurrency in &concurrency_cases {
            for &compression in &compression_cases {
                cases.push(GrpcBenchParams {
                    call,
                    concurrency,
                    compression,
                });
            }
        }
    }

    for params in &cases {
        let mut group = c.benchmark_group(format!("grpc/{}", params.call));
        group.throughput(Throughput::Elements(
            params.replies_per_task() * params.concurrency as u64,
        ));

        group.bench_function(
            format!("conc/{}/comp/{}", params.concurrency, params.compression),
            |b| {
                b.to_async(&rt).iter_custom(|iters| {
                    let uri = uri.clone();
                    async move {
                        let channel = Channel::from_shared(uri)
                            .expect("invalid uri")
                            .connect()
                            .await
                            .expect("Failed to connect to server");

                        let start = Instant::now();
                        for _ in 0..iters {
                            run_grpc_bench(&channel, params).await;
                        }
                        start.elapsed()
                    }
                });
            },
        );

        group.finish();
    }
}

fn request(name: &str) -> HelloRequest {
    HelloRequest {
        name: Some(name.to_string()),
    }
}

async fn run_grpc_bench(channel: &Channel, params: &GrpcBenchParams) {
    let mut tasks = FuturesUnordered::new();

    for _ in 0..params.concurrency {
        let channel = channel.clone();
        let params = *params;

        tasks.push(tokio::spawn(async move {
            let mut client = GreeterClient::new(channel).max_decoding_message_size(usize::MAX);
            if let Some(encoding) = params.compression.into() {
                client = client.accept_compressed(encoding).send_compressed(encoding);
            }

            let received = match params.call {
                Call::Unary => {
                    let reply = client.say_hello(request("bench")).await.expect("unary");
                    black_box(reply.into_inner().message.len());
                    1
                }
                Call::Async => {
                    let reply = client
                        .say_hello_async(request("bench"))
                        .await
                        .expect("async unary");
                    black_box(reply.into_inner().message.len());
                    1
                }
                Call::ServerStream => {
                    let stream = client
                        .say_hello_server_stream(request("bench"))
                        .await
                        .expect("server stream")
                        .into_inner();
                    drain(stream).await
                }
                Call::BiStream => {
                    let outbound = tokio_stream::iter(
                        (0..BI_STREAM_NAMES).map(|i| request(&format!("bench-{i}"))),
                    );
                    let stream = client
                        .say_hello_bi_stream(outbound)
                        .await
                        .expect("bi stream")
                        .into_inner();
                    drain(stream).await
                }
            };
            assert_eq!(received, params.replies_per_task());
        }));
    }

    while let Some(res) = tasks.next().await {
        res.unwrap();
    }
}

async fn drain(mut stream: tonic::Streaming<greeter_tonic_core::proto::HelloReply>) -> u64 {
    let mut received = 0;
    while let Some(reply) = stream.next().await {
        black_box(reply.expect("reply").message.len());
        received += 1;
    }
    received
}

criterion_group!(grpc_benches, grpc_bench);
criterion_main!(grpc_benches);
