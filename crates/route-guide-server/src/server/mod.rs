//! Route guide gRPC server.
//!
//! ## Structure
//!
//! - [`config`] - CLI/environment configuration.
//! - [`service`] - the `RouteGuide` implementation and session tracking.
//! - [`streaming`] - per-call logic for the three streaming RPCs.
//! - [`telemetry`] - tracing subscriber and optional OpenTelemetry export.

pub mod config;
pub mod service;
pub mod streaming;
pub mod telemetry;

use core::future::Future;
use futures::Stream;
use route_guide_core::proto::{FILE_DESCRIPTOR_SET, route_guide_server::RouteGuideServer};
use service::handler::RouteGuideService;
use tokio::io::{AsyncRead, AsyncWrite};
use tonic::{
    codec::CompressionEncoding,
    transport::{Server, server::Connected},
};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Wraps `service` in the generated server with zstd, gzip and deflate
/// enabled in both directions.
pub fn build_route_guide_service(
    service: RouteGuideService,
) -> RouteGuideServer<RouteGuideService> {
    RouteGuideServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

/// Serves the route guide, health and reflection services on `incoming`
/// until `signal` resolves.
///
/// When `signal` fires the health status flips to `NOT_SERVING` and
/// [`RouteGuideService::shutdown`] runs to completion before the transport
/// stops accepting connections.
pub async fn run_server_with_incoming<I, IO, IE>(
    service: RouteGuideService,
    incoming: I,
    signal: impl Future<Output = ()>,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<RouteGuideServer<RouteGuideService>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_route_guide_service(service.clone()))
        .serve_with_incoming_shutdown(incoming, drain_on(signal, service, health_reporter))
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

async fn drain_on(
    signal: impl Future<Output = ()>,
    service: RouteGuideService,
    health_reporter: HealthReporter,
) {
    signal.await;
    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    health_reporter
        .set_not_serving::<RouteGuideServer<RouteGuideService>>()
        .await;

    // 2. Drain, then cancel, in-flight calls
    if let Err(e) = service.shutdown().await {
        tracing::error!("Error during service shutdown: {e}");
    }
}
