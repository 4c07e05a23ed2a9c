//! RecordRoute: fold a client-streamed route into a single summary.

use core::pin::pin;
use futures::{Stream, StreamExt};
use route_guide_core::{
    Error, Result,
    geo::distance,
    proto::{Point, RouteSummary},
    store::{FeatureStore, Lookup},
};
use std::collections::HashSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePhase {
    /// No point received yet; the clock has not started.
    AwaitingPoints,
    /// At least one point received.
    Accumulating,
}

/// Running totals for one RecordRoute call.
///
/// Distance is accumulated in full precision and truncated to whole meters
/// only when the summary is built. Elapsed time runs from the first point to
/// [`RouteRecorder::finish`].
#[derive(Debug)]
pub struct RouteRecorder<'a> {
    store: &'a FeatureStore,
    point_count: i32,
    visited: HashSet<usize>,
    distance: f64,
    previous: Option<Point>,
    started: Option<Instant>,
}

impl<'a> RouteRecorder<'a> {
    pub fn new(store: &'a FeatureStore) -> Self {
        Self {
            store,
            point_count: 0,
            visited: HashSet::new(),
            distance: 0.0,
            previous: None,
            started: None,
        }
    }

    pub const fn phase(&self) -> RoutePhase {
        if self.started.is_some() {
            RoutePhase::Accumulating
        } else {
            RoutePhase::AwaitingPoints
        }
    }

    pub fn record(&mut self, point: Point) {
        self.started.get_or_insert_with(Instant::now);
        self.point_count = self.point_count.saturating_add(1);

        if let Lookup::Found { index, .. } = self.store.lookup(&point) {
            self.visited.insert(index);
        }
        if let Some(previous) = &self.previous {
            self.distance += distance(previous, &point);
        }
        self.previous = Some(point);
    }

    pub fn finish(self) -> RouteSummary {
        let elapsed = self.started.map_or(0, |s| s.elapsed().as_secs());
        RouteSummary {
            point_count: self.point_count,
            feature_count: i32::try_from(self.visited.len()).unwrap_or(i32::MAX),
            // Saturating cast; a route would need to circle the earth ~50
            // times to overflow.
            distance: self.distance as i32,
            elapsed_time: i32::try_from(elapsed).unwrap_or(i32::MAX),
        }
    }
}

/// Drains `points` and returns the route summary once the client closes its
/// side of the stream.
///
/// # Errors
///
/// - [`Error::Transport`] if the inbound stream fails; no summary is built.
/// - [`Error::ServiceShutdown`] if `cancel` fires first.
pub async fn summarize_route<S>(
    store: &FeatureStore,
    points: S,
    cancel: &CancellationToken,
) -> Result<RouteSummary>
where
    S: Stream<Item = core::result::Result<Point, Status>>,
{
    let mut points = pin!(points);
    let mut recorder = RouteRecorder::new(store);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::ServiceShutdown),
            next = points.next() => next,
        };

        match next {
            Some(Ok(point)) => recorder.record(point),
            Some(Err(status)) => return Err(Error::Transport(status)),
            None => break,
        }
    }

    tracing::trace!(phase = ?recorder.phase(), "Route stream closed");
    Ok(recorder.finish())
}
