use core::{fmt, hint::black_box, time::Duration};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::stream::{FuturesUnordered, StreamExt};
use route_guide_core::{
    geo::point,
    proto::{Rectangle, route_guide_client::RouteGuideClient},
    store::FeatureStore,
};
use route_guide_server::{RouteGuideService, ServerConfig, run_server_with_incoming};
use std::time::Instant;
use tokio::{net::TcpListener, runtime::Builder};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{codec::CompressionEncoding, transport::Channel};

const DATASET: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/route_guide_db.json");

#[derive(Clone, Copy, Debug)]
enum Compression {
    None,
    Deflate,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Deflate => write!(f, "deflate"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Deflate => Some(CompressionEncoding::Deflate),
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

fn client(channel: Channel, compression: Compression) -> RouteGuideClient<Channel> {
    let client = RouteGuideClient::new(channel);
    match Option::<CompressionEncoding>::from(compression) {
        Some(encoding) => client
            .send_compressed(encoding)
            .accept_compressed(encoding),
        None => client,
    }
}

fn grpc_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    // Serve in-process on an ephemeral port for the whole run.
    let endpoint = rt.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = FeatureStore::from_path(DATASET).unwrap();
        let service = RouteGuideService::new(store, &ServerConfig::default());
        tokio::spawn(run_server_with_incoming(
            service,
            TcpListenerStream::new(listener),
            core::future::pending::<()>(),
        ));
        format!("http://{addr}")
    });
    let channel = rt.block_on(async {
        Channel::from_shared(endpoint)
            .unwrap()
            .connect()
            .await
            .unwrap()
    });

    let concurrency_cases = [1, 8, 32];
    let compression_cases = [
        Compression::None,
        Compression::Zstd,
        Compression::Gzip,
        Compression::Deflate,
    ];

    let mut group = c.benchmark_group("grpc/get_feature");
    for concurrency in concurrency_cases {
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_function(format!("conc/{concurrency}"), |b| {
            b.to_async(&rt).iter_custom(|iters| {
                let channel = channel.clone();
                async move {
                    let start = Instant::now();
                    for _ in 0..iters {
                        let mut calls = (0..concurrency)
                            .map(|_| {
                                let mut client = client(channel.clone(), Compression::None);
                                async move {
                                    client
                                        .get_feature(point(409146138, -746188906))
                                        .await
                                        .unwrap()
                                }
                            })
                            .collect::<FuturesUnordered<_>>();
                        while let Some(resp) = calls.next().await {
                            black_box(resp);
                        }
                    }
                    start.elapsed()
                }
            });
        });
    }
    group.finish();

    let rect = Rectangle {
        lo: Some(point(400000000, -750000000)),
        hi: Some(point(420000000, -730000000)),
    };
    let mut group = c.benchmark_group("grpc/list_features");
    group.measurement_time(Duration::from_secs(10));
    for compression in compression_cases {
        group.bench_function(format!("comp/{compression}"), |b| {
            b.to_async(&rt).iter(|| {
                let mut client = client(channel.clone(), compression);
                let rect = rect.clone();
                async move {
                    let mut stream = client.list_features(rect).await.unwrap().into_inner();
                    let mut n = 0;
                    while let Some(feature) = stream.message().await.unwrap() {
                        black_box(feature);
                        n += 1;
                    }
                    n
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, grpc_bench);
criterion_main!(benches);
