//! gRPC service implementation for the route guide.
//!
//! This module defines [`RouteGuideService`], the concrete implementation of
//! the [`RouteGuide`] gRPC service. It owns the read-only feature store, the
//! shared note board and the session tracker used for graceful shutdown.
//!
//! ## Responsibilities
//!
//! - Answer unary `GetFeature` lookups.
//! - Validate `ListFeatures` rectangles and stream matches through a bounded
//!   channel ([`stream_features`]).
//! - Fold `RecordRoute` point streams into a summary ([`summarize_route`]).
//! - Relay `RouteChat` notes through the shared board ([`relay_notes`]).
//! - Refuse new calls, drain and then cancel in-flight calls on shutdown.

use crate::server::{
    config::ServerConfig,
    service::sessions::Sessions,
    streaming::{chat::relay_notes, features::stream_features, record::summarize_route},
    telemetry::{
        increment_features_streamed, increment_notes_recorded, increment_points_recorded,
        increment_stream_errors,
    },
};
use core::{pin::Pin, time::Duration};
use route_guide_core::{
    Error,
    board::NoteBoard,
    geo::{Bounds, Degrees},
    proto::{Feature, Point, Rectangle, RouteNote, RouteSummary, route_guide_server::RouteGuide},
    store::{FeatureStore, exists},
};
use std::sync::Arc;
use tokio::{sync::mpsc, time::timeout};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};
use tracing::Instrument;

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
const CANCEL_GRACE: Duration = Duration::from_secs(3);

/// The route guide gRPC service.
///
/// Cloning is cheap; clones share the store, the board and the session
/// tracker.
#[derive(Clone)]
pub struct RouteGuideService {
    store: Arc<FeatureStore>,
    board: Arc<NoteBoard>,
    sessions: Arc<Sessions>,
    stream_buffer_size: usize,
    shutdown_timeout: Duration,
}

impl RouteGuideService {
    pub fn new(store: FeatureStore, config: &ServerConfig) -> Self {
        Self {
            store: Arc::new(store),
            board: Arc::new(NoteBoard::new()),
            sessions: Sessions::new(),
            stream_buffer_size: config.stream_buffer_size,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn board(&self) -> &NoteBoard {
        &self.board
    }

    /// Number of calls currently in flight.
    pub fn sessions_inflight(&self) -> usize {
        self.sessions.inflight()
    }

    /// Gracefully shuts the service down.
    ///
    /// - Refuses new calls with `UNAVAILABLE`.
    /// - Waits up to the configured shutdown timeout for in-flight calls.
    /// - Cancels whatever is left and gives it a short grace period to
    ///   unwind.
    pub async fn shutdown(&self) -> Result<(), Error> {
        // === Phase 0: Stop accepting new calls ===
        tracing::info!("Refusing new requests");
        self.sessions.refuse_new();

        // === Phase 1: Let in-flight calls finish on their own ===
        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.sessions.inflight()
        );
        match timeout(
            self.shutdown_timeout,
            self.sessions.drained(DRAIN_POLL_INTERVAL),
        )
        .await
        {
            Ok(()) => tracing::debug!("All in-flight streams drained successfully"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.sessions.inflight()
            ),
        }

        // === Phase 2: Cancel the rest ===
        tracing::debug!("Cancelling remaining calls via shutdown token");
        self.sessions.cancel();

        if timeout(CANCEL_GRACE, self.sessions.drained(DRAIN_POLL_INTERVAL))
            .await
            .is_err()
        {
            tracing::warn!(
                "{} calls did not stop after cancellation",
                self.sessions.inflight()
            );
            return Err(Error::Timeout {
                operation: "shutdown",
                after: self.shutdown_timeout + CANCEL_GRACE,
            });
        }

        tracing::info!(
            notes = self.board.len(),
            locations = self.board.locations(),
            "Route guide shutdown complete"
        );
        Ok(())
    }
}

#[tonic::async_trait]
impl RouteGuide for RouteGuideService {
    type ListFeaturesStream = ResponseStream<Feature>;
    type RouteChatStream = ResponseStream<RouteNote>;

    #[tracing::instrument(skip_all, fields(at = %Degrees(req.get_ref())))]
    async fn get_feature(&self, req: Request<Point>) -> Result<Response<Feature>, Status> {
        let _guard = self.sessions.begin("GetFeature")?;
        let point = req.into_inner();

        let feature = self.store.get_feature(&point);
        tracing::debug!(found = exists(&feature), name = %feature.name, "Feature lookup");
        Ok(Response::new(feature))
    }

    /// Streams the named features inside the requested rectangle.
    ///
    /// The rectangle is validated before the stream opens, so a missing
    /// corner fails the call itself with `INVALID_ARGUMENT`. A call refused
    /// during shutdown gets `UNAVAILABLE` whatever its rectangle.
    #[tracing::instrument(skip_all)]
    async fn list_features(
        &self,
        req: Request<Rectangle>,
    ) -> Result<Response<Self::ListFeaturesStream>, Status> {
        let guard = self.sessions.begin("ListFeatures")?;
        let bounds = Bounds::try_from(req.get_ref()).inspect_err(|e| {
            increment_stream_errors("ListFeatures");
            tracing::warn!("Rejected ListFeatures: {e}");
        })?;

        let (tx, rx) = mpsc::channel::<Result<Feature, Status>>(self.stream_buffer_size);
        let store = Arc::clone(&self.store);
        let cancel = self.sessions.token();

        let fut = async move {
            let _guard = guard;
            match stream_features(&store, bounds, &tx, &cancel).await {
                Ok(sent) => {
                    increment_features_streamed(sent as u64);
                    tracing::debug!(sent, "ListFeatures complete");
                }
                Err(e) => {
                    increment_stream_errors("ListFeatures");
                    tracing::warn!("ListFeatures ended early: {e}");
                }
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("list_features_stream")));

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    #[tracing::instrument(skip_all)]
    async fn record_route(
        &self,
        req: Request<Streaming<Point>>,
    ) -> Result<Response<RouteSummary>, Status> {
        let _guard = self.sessions.begin("RecordRoute")?;
        let points = req.into_inner();
        let cancel = self.sessions.token();

        match summarize_route(&self.store, points, &cancel).await {
            Ok(summary) => {
                increment_points_recorded(u64::try_from(summary.point_count).unwrap_or(0));
                tracing::info!(
                    points = summary.point_count,
                    features = summary.feature_count,
                    distance = summary.distance,
                    elapsed = summary.elapsed_time,
                    "Route recorded"
                );
                Ok(Response::new(summary))
            }
            Err(e) => {
                increment_stream_errors("RecordRoute");
                tracing::warn!("RecordRoute aborted: {e}");
                Err(e.into())
            }
        }
    }

    /// Bidirectional note exchange. Replies for a note are the notes filed
    /// earlier at the same location, oldest first.
    #[tracing::instrument(skip_all)]
    async fn route_chat(
        &self,
        req: Request<Streaming<RouteNote>>,
    ) -> Result<Response<Self::RouteChatStream>, Status> {
        let guard = self.sessions.begin("RouteChat")?;
        let inbound = req.into_inner();

        let (tx, rx) = mpsc::channel::<Result<RouteNote, Status>>(self.stream_buffer_size);
        let board = Arc::clone(&self.board);
        let cancel = self.sessions.token();

        let fut = async move {
            let _guard = guard;
            match relay_notes(&board, inbound, &tx, &cancel).await {
                Ok(recorded) => {
                    increment_notes_recorded(recorded as u64);
                    tracing::debug!(recorded, "RouteChat session closed");
                }
                Err(e) => {
                    increment_stream_errors("RouteChat");
                    tracing::warn!("RouteChat ended early: {e}");
                }
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("route_chat_session")));

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}
