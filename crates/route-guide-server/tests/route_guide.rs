//! End-to-end tests: a real server on an ephemeral port, driven through the
//! generated client and through `route-guide-client`.

use core::time::Duration;
use rand::{SeedableRng, rngs::StdRng};
use route_guide_client::{DriverConfig, RouteGuideDriver};
use route_guide_core::{
    geo::{distance, point},
    proto::{
        Feature, Point, Rectangle, RouteNote, route_guide_client::RouteGuideClient,
    },
    store::FeatureStore,
};
use route_guide_server::{RouteGuideService, ServerConfig, run_server_with_incoming};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{sleep, timeout},
};
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::{Code, transport::Channel};

const DATASET: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/route_guide_db.json");
const BERKSHIRE: &str = "Berkshire Valley Management Area Trail, Jefferson, NJ, USA";

struct TestServer {
    endpoint: String,
    service: RouteGuideService,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(store: FeatureStore, shutdown_timeout: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ServerConfig {
            shutdown_timeout,
            ..ServerConfig::default()
        };
        let service = RouteGuideService::new(store, &config);
        let (stop, stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(run_server_with_incoming(
            service.clone(),
            TcpListenerStream::new(listener),
            async move {
                let _ = stopped.await;
            },
        ));

        Self {
            endpoint: format!("http://{addr}"),
            service,
            stop,
            handle,
        }
    }

    async fn with_dataset() -> Self {
        Self::start(FeatureStore::from_path(DATASET).unwrap(), Duration::from_secs(1)).await
    }

    async fn client(&self) -> RouteGuideClient<Channel> {
        RouteGuideClient::connect(self.endpoint.clone()).await.unwrap()
    }

    async fn driver(&self, seed: u64) -> RouteGuideDriver<StdRng> {
        let config = DriverConfig {
            send_delay: 0..0,
            completion_timeout: Duration::from_secs(5),
            ..DriverConfig::default()
        };
        RouteGuideDriver::connect(self.endpoint.clone(), config, StdRng::seed_from_u64(seed))
            .await
            .unwrap()
    }
}

fn feature(name: &str, lat: i32, lon: i32) -> Feature {
    Feature {
        name: name.into(),
        location: Some(point(lat, lon)),
    }
}

fn note(message: &str, at: Point) -> RouteNote {
    RouteNote {
        location: Some(at),
        message: message.into(),
    }
}

async fn wait_for_inflight(service: &RouteGuideService, n: usize) {
    timeout(Duration::from_secs(5), async {
        while service.sessions_inflight() != n {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn single_record_lookup() {
    let json = r#"[{"location": {"latitude": 409146138, "longitude": -746188906}, "name": "Test"}]"#;
    let server =
        TestServer::start(FeatureStore::load(json.as_bytes()).unwrap(), Duration::from_secs(1))
            .await;
    let mut driver = server.driver(1).await;

    let hit = driver.get_feature(409146138, -746188906).await.unwrap();
    assert_eq!(hit.name, "Test");

    let miss = driver.get_feature(0, 0).await.unwrap();
    assert!(miss.name.is_empty());
    assert_eq!(miss.location, Some(point(0, 0)));
}

#[tokio::test]
async fn list_features_returns_only_inside_feature() {
    let store = FeatureStore::from_features(vec![
        feature("Inside", 409146138, -746188906),
        feature("Outside", 430000000, -746188906),
    ]);
    let server = TestServer::start(store, Duration::from_secs(1)).await;
    let mut driver = server.driver(2).await;

    let listed = driver
        .list_features(400000000, -750000000, 420000000, -730000000)
        .await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Inside");
}

#[tokio::test]
async fn list_features_accepts_swapped_corners() {
    let server = TestServer::with_dataset().await;
    let mut driver = server.driver(3).await;

    let normal = driver
        .list_features(400000000, -750000000, 420000000, -730000000)
        .await;
    let swapped = driver
        .list_features(420000000, -730000000, 400000000, -750000000)
        .await;
    assert!(!normal.is_empty());
    assert_eq!(normal, swapped);
}

#[tokio::test]
async fn list_features_rejects_missing_corner() {
    let server = TestServer::with_dataset().await;
    let mut client = server.client().await;

    let status = client
        .list_features(Rectangle {
            lo: Some(point(400000000, -750000000)),
            hi: None,
        })
        .await
        .err()
        .unwrap();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn record_route_same_location_has_no_distance() {
    let server = TestServer::with_dataset().await;
    let mut client = server.client().await;
    let at = point(409146138, -746188906);

    let summary = client
        .record_route(tokio_stream::iter(vec![at.clone(), at.clone(), at]))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(summary.point_count, 3);
    assert_eq!(summary.distance, 0);
    assert_eq!(summary.feature_count, 1);
}

#[tokio::test]
async fn record_route_sums_legs_and_counts_features_once() {
    let server = TestServer::with_dataset().await;
    let mut client = server.client().await;
    let a = point(409146138, -746188906);
    let b = point(413628156, -749015468);
    let nowhere = point(1, 1);

    let route = vec![a.clone(), b.clone(), a.clone(), nowhere.clone()];
    let summary = client
        .record_route(tokio_stream::iter(route))
        .await
        .unwrap()
        .into_inner();

    let expected = distance(&a, &b) + distance(&b, &a) + distance(&a, &nowhere);
    assert_eq!(summary.point_count, 4);
    assert_eq!(summary.feature_count, 2);
    assert_eq!(summary.distance, expected as i32);
}

#[tokio::test]
async fn route_chat_shows_earlier_notes_to_later_callers() {
    let server = TestServer::with_dataset().await;
    let x = point(5, 5);

    // A's session closes only after its note is on the board.
    let mut a = server.client().await;
    let mut replies = a
        .route_chat(tokio_stream::iter(vec![note("N1", x.clone())]))
        .await
        .unwrap()
        .into_inner();
    assert!(replies.message().await.unwrap().is_none());

    let mut b = server.client().await;
    let mut replies = b
        .route_chat(tokio_stream::iter(vec![note("N2", x.clone()), note("N3", x)]))
        .await
        .unwrap()
        .into_inner();

    let mut seen = Vec::new();
    while let Some(n) = replies.message().await.unwrap() {
        seen.push(n.message);
    }
    // N2 sees N1; N3 sees N1 and N2. Nobody sees their own note first.
    assert_eq!(seen, ["N1", "N1", "N2"]);
    assert_eq!(server.service.board().len(), 3);
}

#[tokio::test]
async fn route_chat_rejects_note_without_location() {
    let server = TestServer::with_dataset().await;
    let mut client = server.client().await;

    let mut replies = client
        .route_chat(tokio_stream::iter(vec![RouteNote {
            location: None,
            message: "lost".into(),
        }]))
        .await
        .unwrap()
        .into_inner();
    let status = replies.message().await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(server.service.board().is_empty());
}

#[tokio::test]
async fn second_chat_run_receives_first_run_notes() {
    let server = TestServer::with_dataset().await;

    let first = server
        .driver(4)
        .await
        .route_chat()
        .wait(Duration::from_secs(5))
        .await
        .unwrap();
    assert!(first.is_empty());

    let second = server
        .driver(5)
        .await
        .route_chat()
        .wait(Duration::from_secs(5))
        .await
        .unwrap();
    let messages: Vec<_> = second.iter().map(|n| n.message.as_str()).collect();
    assert_eq!(
        messages,
        ["First message", "Second message", "Third message", "Fourth message"]
    );
}

#[tokio::test]
async fn driver_runs_full_sequence() {
    let server = TestServer::with_dataset().await;
    let features = server.service.store().features().to_vec();
    let mut driver = server.driver(6).await;

    let report = driver.run_all(&features).await;

    assert_eq!(report.known.unwrap().name, BERKSHIRE);
    assert!(report.unknown.unwrap().name.is_empty());
    let expected_listed = server
        .service
        .store()
        .features()
        .iter()
        .filter(|f| !f.name.is_empty())
        .count();
    assert_eq!(report.listed.len(), expected_listed);
    assert_eq!(report.summary.unwrap().point_count, 10);
    assert!(report.chat.unwrap().is_empty());
}

#[tokio::test]
async fn shutdown_refuses_new_calls_and_aborts_open_routes() {
    let server =
        TestServer::start(FeatureStore::from_path(DATASET).unwrap(), Duration::from_millis(500))
            .await;
    let mut client = server.client().await;

    // An open RecordRoute that never half-closes.
    let (tx, rx) = mpsc::channel::<Point>(4);
    tx.send(point(409146138, -746188906)).await.unwrap();
    let mut route_client = client.clone();
    let open_route =
        tokio::spawn(async move { route_client.record_route(ReceiverStream::new(rx)).await });
    wait_for_inflight(&server.service, 1).await;

    server.stop.send(()).unwrap();
    sleep(Duration::from_millis(100)).await;

    // Still inside the drain window: the transport is up, the service is not.
    let status = client.get_feature(point(0, 0)).await.unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    let status = open_route.await.unwrap().unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    drop(tx);

    assert_eq!(server.service.sessions_inflight(), 0);
    drop(client);
    timeout(Duration::from_secs(5), server.handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn shutdown_cancels_idle_chat_sessions() {
    let server =
        TestServer::start(FeatureStore::from_path(DATASET).unwrap(), Duration::from_millis(200))
            .await;
    let mut client = server.client().await;

    let (tx, rx) = mpsc::channel::<RouteNote>(4);
    let mut replies = client
        .route_chat(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();
    wait_for_inflight(&server.service, 1).await;

    server.stop.send(()).unwrap();

    let status = timeout(Duration::from_secs(5), replies.message())
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    wait_for_inflight(&server.service, 0).await;
    drop(tx);
}
