//! Scripted route guide client.
//!
//! [`RouteGuideDriver`] issues each RPC the way an interactive user would
//! and prints what comes back. Transport failures are logged and turned into
//! empty results so a script keeps going after one call fails.

use crate::config::DriverConfig;
use core::time::Duration;
use rand::Rng;
use route_guide_core::{
    Error, Result,
    geo::{Degrees, point},
    proto::{
        Feature, Point, Rectangle, RouteNote, RouteSummary, route_guide_client::RouteGuideClient,
    },
    store::exists,
};
use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Status, transport::Channel};
use tracing::Instrument;

/// Known feature queried first by [`RouteGuideDriver::run_all`].
pub const KNOWN_FEATURE: (i32, i32) = (409146138, -746188906);

/// Rectangle listed by [`RouteGuideDriver::run_all`], as `(lo, hi)`.
pub const LIST_AREA: ((i32, i32), (i32, i32)) = ((400000000, -750000000), (420000000, -730000000));

/// One RecordRoute step: send `point`, then wait `pause`.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub point: Point,
    pub pause: Duration,
}

/// Picks `n` points uniformly, with replacement, from the located entries
/// of `features` and a pause in `delay_ms` after each.
///
/// Returns an empty plan when `features` has no located entry or `n` is 0.
pub fn plan_route<R: Rng>(
    rng: &mut R,
    features: &[Feature],
    n: usize,
    delay_ms: &core::ops::Range<u64>,
) -> Vec<Leg> {
    let points: Vec<&Point> = features.iter().filter_map(|f| f.location.as_ref()).collect();
    if points.is_empty() {
        return Vec::new();
    }

    (0..n)
        .map(|_| {
            let point = points[rng.random_range(0..points.len())].clone();
            let pause = if delay_ms.is_empty() {
                delay_ms.start
            } else {
                rng.random_range(delay_ms.clone())
            };
            Leg {
                point,
                pause: Duration::from_millis(pause),
            }
        })
        .collect()
}

/// The four notes RouteChat sends, one per corner of the unit square at the
/// origin. A second run gets all four back from the first.
pub fn chat_script() -> Vec<RouteNote> {
    [
        ("First message", 0, 0),
        ("Second message", 0, 1),
        ("Third message", 1, 0),
        ("Fourth message", 1, 1),
    ]
    .into_iter()
    .map(|(message, lat, lon)| RouteNote {
        location: Some(point(lat, lon)),
        message: message.to_string(),
    })
    .collect()
}

/// A RouteChat call whose replies are still being consumed.
#[derive(Debug)]
pub struct ChatSession {
    handle: JoinHandle<core::result::Result<Vec<RouteNote>, Status>>,
}

impl ChatSession {
    /// Waits up to `after` for the server to close the reply stream and
    /// returns every note received.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the stream is still open after `after`; the
    ///   call is abandoned.
    /// - [`Error::Transport`] if the call failed.
    pub async fn wait(mut self, after: Duration) -> Result<Vec<RouteNote>> {
        match timeout(after, &mut self.handle).await {
            Ok(Ok(received)) => received.map_err(Error::from),
            Ok(Err(e)) => Err(Error::ChannelError {
                context: format!("route chat task failed: {e}"),
            }),
            Err(_) => {
                self.handle.abort();
                Err(Error::Timeout {
                    operation: "RouteChat",
                    after,
                })
            }
        }
    }
}

/// Everything a [`RouteGuideDriver::run_all`] pass observed.
#[derive(Debug)]
pub struct RunReport {
    pub known: Option<Feature>,
    pub unknown: Option<Feature>,
    pub listed: Vec<Feature>,
    pub summary: Option<RouteSummary>,
    pub chat: Result<Vec<RouteNote>>,
}

pub struct RouteGuideDriver<R> {
    client: RouteGuideClient<Channel>,
    config: DriverConfig,
    rng: R,
}

impl<R: Rng> RouteGuideDriver<R> {
    pub const fn new(client: RouteGuideClient<Channel>, config: DriverConfig, rng: R) -> Self {
        Self {
            client,
            config,
            rng,
        }
    }

    /// Connects to `endpoint` (e.g. `http://127.0.0.1:50051`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the endpoint is invalid or
    /// unreachable.
    pub async fn connect(endpoint: String, config: DriverConfig, rng: R) -> Result<Self> {
        let client = RouteGuideClient::connect(endpoint).await?;
        Ok(Self::new(client, config, rng))
    }

    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Unary lookup. `None` means the call failed, not that nothing is there.
    pub async fn get_feature(&mut self, lat: i32, lon: i32) -> Option<Feature> {
        println!("*** GetFeature: lat={lat} lon={lon}");

        let feature = match self.client.get_feature(point(lat, lon)).await {
            Ok(resp) => resp.into_inner(),
            Err(status) => {
                tracing::error!("RPC failed: {status}");
                return None;
            }
        };

        let at = feature.location.clone().unwrap_or_else(|| point(lat, lon));
        if exists(&feature) {
            println!("Found feature called \"{}\" at {}", feature.name, Degrees(&at));
        } else {
            println!("Found no feature at {}", Degrees(&at));
        }
        Some(feature)
    }

    /// Lists features inside the rectangle. On a mid-stream failure the
    /// features received so far are returned.
    pub async fn list_features(
        &mut self,
        lo_lat: i32,
        lo_lon: i32,
        hi_lat: i32,
        hi_lon: i32,
    ) -> Vec<Feature> {
        println!(
            "*** ListFeatures: lowLat={lo_lat} lowLon={lo_lon} hiLat={hi_lat} hiLon={hi_lon}"
        );
        let rect = Rectangle {
            lo: Some(point(lo_lat, lo_lon)),
            hi: Some(point(hi_lat, hi_lon)),
        };

        let mut features = Vec::new();
        let mut stream = match self.client.list_features(rect).await {
            Ok(resp) => resp.into_inner(),
            Err(status) => {
                tracing::error!("RPC failed: {status}");
                return features;
            }
        };

        loop {
            match stream.message().await {
                Ok(Some(feature)) => {
                    match feature.location.as_ref() {
                        Some(at) => println!(
                            "Result #{}: \"{}\" at {}",
                            features.len() + 1,
                            feature.name,
                            Degrees(at)
                        ),
                        None => println!("Result #{}: \"{}\"", features.len() + 1, feature.name),
                    }
                    features.push(feature);
                }
                Ok(None) => break,
                Err(status) => {
                    tracing::error!("RPC failed: {status}");
                    break;
                }
            }
        }
        features
    }

    /// Sends `n` random points drawn from `features`, pacing them by the
    /// configured delay, and returns the server's summary.
    ///
    /// Stops sending early if the call completes first. Returns `None` if
    /// the call fails or does not complete within the configured timeout.
    pub async fn record_route(&mut self, features: &[Feature], n: usize) -> Option<RouteSummary> {
        println!("*** RecordRoute");
        let plan = plan_route(&mut self.rng, features, n, &self.config.send_delay);

        let (tx, rx) = mpsc::channel::<Point>(1);
        let mut client = self.client.clone();
        let mut call = tokio::spawn(
            async move { client.record_route(ReceiverStream::new(rx)).await }
                .instrument(tracing::info_span!("record_route")),
        );

        for leg in plan {
            println!("Visiting point {}", Degrees(&leg.point));
            if tx.send(leg.point).await.is_err() {
                break;
            }
            tokio::time::sleep(leg.pause).await;
            if call.is_finished() {
                // Completed or failed before we were done sending.
                break;
            }
        }
        // Half-close.
        drop(tx);

        let after = self.config.completion_timeout;
        match timeout(after, &mut call).await {
            Ok(Ok(Ok(resp))) => {
                let summary = resp.into_inner();
                println!(
                    "Finished trip with {} points. Passed {} features. Travelled {} meters. It took {} seconds.",
                    summary.point_count,
                    summary.feature_count,
                    summary.distance,
                    summary.elapsed_time
                );
                println!("Finished RecordRoute");
                Some(summary)
            }
            Ok(Ok(Err(status))) => {
                tracing::error!("RecordRoute Failed: {status}");
                None
            }
            Ok(Err(e)) => {
                tracing::error!("RecordRoute task failed: {e}");
                None
            }
            Err(_) => {
                call.abort();
                let err = Error::Timeout {
                    operation: "RecordRoute",
                    after,
                };
                tracing::error!("{err}");
                None
            }
        }
    }

    /// Sends the [`chat_script`] without pausing, half-closes and consumes
    /// replies in the background.
    pub fn route_chat(&mut self) -> ChatSession {
        println!("*** RouteChat");
        let script = chat_script();
        for note in &script {
            let at = note.location.clone().unwrap_or_default();
            println!(
                "Sending message \"{}\" at {}, {}",
                note.message, at.latitude, at.longitude
            );
        }

        let client = self.client.clone();
        let handle = tokio::spawn(
            consume_chat(client, script).instrument(tracing::info_span!("route_chat")),
        );
        ChatSession { handle }
    }

    /// Runs every RPC once, in order, and reports what each returned.
    pub async fn run_all(&mut self, features: &[Feature]) -> RunReport {
        let known = self.get_feature(KNOWN_FEATURE.0, KNOWN_FEATURE.1).await;
        let unknown = self.get_feature(0, 0).await;

        let ((lo_lat, lo_lon), (hi_lat, hi_lon)) = LIST_AREA;
        let listed = self.list_features(lo_lat, lo_lon, hi_lat, hi_lon).await;

        let summary = self.record_route(features, self.config.route_points).await;

        let chat = self.route_chat().wait(self.config.completion_timeout).await;
        if let Err(e) = &chat {
            tracing::error!("RouteChat Failed: {e}");
        }

        RunReport {
            known,
            unknown,
            listed,
            summary,
            chat,
        }
    }
}

async fn consume_chat(
    mut client: RouteGuideClient<Channel>,
    script: Vec<RouteNote>,
) -> core::result::Result<Vec<RouteNote>, Status> {
    let mut inbound = client
        .route_chat(tokio_stream::iter(script))
        .await
        .inspect_err(|status| tracing::error!("RouteChat Failed: {status}"))?
        .into_inner();

    let mut received = Vec::new();
    loop {
        match inbound.message().await {
            Ok(Some(note)) => {
                let at = note.location.clone().unwrap_or_default();
                println!(
                    "Got message \"{}\" at {}, {}",
                    note.message, at.latitude, at.longitude
                );
                received.push(note);
            }
            Ok(None) => break,
            Err(status) => {
                tracing::error!("RouteChat Failed: {status}");
                return Err(status);
            }
        }
    }

    println!("Finished RouteChat");
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn features() -> Vec<Feature> {
        vec![
            Feature {
                name: "A".into(),
                location: Some(point(1, 1)),
            },
            Feature {
                name: String::new(),
                location: Some(point(2, 2)),
            },
            Feature {
                name: "Nowhere".into(),
                location: None,
            },
        ]
    }

    #[test]
    fn plan_draws_only_located_points() {
        let mut rng = StdRng::seed_from_u64(7);
        let plan = plan_route(&mut rng, &features(), 50, &(500..1500));

        assert_eq!(plan.len(), 50);
        for leg in &plan {
            assert!(leg.point == point(1, 1) || leg.point == point(2, 2));
            assert!(leg.pause >= Duration::from_millis(500));
            assert!(leg.pause < Duration::from_millis(1500));
        }
    }

    #[test]
    fn same_seed_same_plan() {
        let a = plan_route(&mut StdRng::seed_from_u64(42), &features(), 10, &(0..100));
        let b = plan_route(&mut StdRng::seed_from_u64(42), &features(), 10, &(0..100));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_inputs_give_empty_plan() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(plan_route(&mut rng, &[], 10, &(0..10)).is_empty());
        assert!(plan_route(&mut rng, &features(), 0, &(0..10)).is_empty());
    }

    #[test]
    fn empty_delay_range_is_a_fixed_pause() {
        let mut rng = StdRng::seed_from_u64(3);
        let plan = plan_route(&mut rng, &features(), 5, &(25..25));
        assert!(plan.iter().all(|leg| leg.pause == Duration::from_millis(25)));
    }

    #[test]
    fn chat_script_is_fixed() {
        let script = chat_script();
        let messages: Vec<_> = script.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(
            messages,
            ["First message", "Second message", "Third message", "Fourth message"]
        );
        assert_eq!(script[0].location, Some(point(0, 0)));
        assert_eq!(script[3].location, Some(point(1, 1)));
    }
}
