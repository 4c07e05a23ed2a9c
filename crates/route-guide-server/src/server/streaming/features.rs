use super::{abort, forward};
use route_guide_core::{Result, geo::Bounds, proto::Feature, store::FeatureStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Streams every named feature inside `bounds` to `tx`, in store order.
///
/// Returns how many features were sent. Stops early, without sending the
/// rest, if the client hangs up or the service shuts down.
pub async fn stream_features(
    store: &FeatureStore,
    bounds: Bounds,
    tx: &mpsc::Sender<core::result::Result<Feature, Status>>,
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut sent = 0;

    for feature in store.list_features(bounds) {
        if let Err(e) = forward(tx, feature.clone(), cancel).await {
            return Err(abort(tx, e).await);
        }
        sent += 1;
    }

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use route_guide_core::{Error, geo::point};
    use tonic::Code;

    fn store() -> FeatureStore {
        FeatureStore::from_features(vec![
            Feature {
                name: "Inside".into(),
                location: Some(point(409146138, -746188906)),
            },
            Feature {
                name: "Outside".into(),
                location: Some(point(430000000, -746188906)),
            },
            Feature {
                name: "Also inside".into(),
                location: Some(point(410000000, -740000000)),
            },
        ])
    }

    fn bounds() -> Bounds {
        Bounds::from_corners(
            &point(400000000, -750000000),
            &point(420000000, -730000000),
        )
    }

    #[tokio::test]
    async fn sends_matching_features_then_closes() {
        let (tx, mut rx) = mpsc::channel(8);
        let sent = stream_features(&store(), bounds(), &tx, &CancellationToken::new())
            .await
            .unwrap();
        drop(tx);

        assert_eq!(sent, 2);
        let mut names = Vec::new();
        while let Some(item) = rx.recv().await {
            names.push(item.unwrap().name);
        }
        assert_eq!(names, ["Inside", "Also inside"]);
    }

    #[tokio::test]
    async fn stops_when_client_hangs_up() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = stream_features(&store(), bounds(), &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChannelError { .. }));
    }

    #[tokio::test]
    async fn shutdown_ends_stream_with_unavailable() {
        // Cancelled up front: the first send already gives way to shutdown.
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = stream_features(&store(), bounds(), &tx, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceShutdown));

        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn shutdown_behind_slow_reader_still_ends_with_unavailable() {
        // One slot: "Inside" fills it and "Also inside" waits for room.
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let producer = {
            let cancel = cancel.clone();
            async move { stream_features(&store(), bounds(), &tx, &cancel).await }
        };
        let reader = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
            let mut items = Vec::new();
            while let Some(item) = rx.recv().await {
                items.push(item);
            }
            items
        };
        let (result, items) = tokio::join!(producer, reader);

        assert!(matches!(result, Err(Error::ServiceShutdown)));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().name, "Inside");
        assert_eq!(items[1].as_ref().unwrap_err().code(), Code::Unavailable);
    }
}
