//! Per-call streaming logic behind the three streaming RPCs.
//!
//! Each function here owns one direction of a call: it reads from an inbound
//! `Stream` and/or writes into the bounded `mpsc` channel that backs the
//! response stream. Completion is the channel closing; errors travel as
//! `Err(Status)` items. All of them stop at their next suspension point once
//! the service's shutdown token is cancelled.
//!
//! - [`features`] - ListFeatures producer.
//! - [`record`] - RecordRoute accumulator.
//! - [`chat`] - RouteChat relay.

pub mod chat;
pub mod features;
pub mod record;

use core::time::Duration;
use route_guide_core::Error;
use tokio::{sync::mpsc, time::timeout};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Sends `item` on the response channel unless the service shuts down first.
///
/// # Errors
///
/// - [`Error::ServiceShutdown`] if `cancel` fired while waiting for capacity.
/// - [`Error::ChannelError`] if the client dropped the response stream.
pub(crate) async fn forward<T>(
    tx: &mpsc::Sender<Result<T, Status>>,
    item: T,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::ServiceShutdown),
        sent = tx.send(Ok(item)) => sent.map_err(|_| Error::ChannelError {
            context: "response stream closed by client".to_string(),
        }),
    }
}

/// How long [`abort`] waits for buffer space before giving up on the client.
///
/// Kept below the service's post-cancel grace so an aborted call still
/// unwinds before shutdown stops waiting for it.
pub(crate) const ERROR_DELIVERY_GRACE: Duration = Duration::from_secs(1);

/// Surfaces `err` to the client as the final stream item, then hands it back.
///
/// Waits for buffer space so the error is queued behind replies the client
/// has not read yet; otherwise the stream would close looking complete. A
/// closed channel or a client that stays stalled past
/// [`ERROR_DELIVERY_GRACE`] is only logged.
pub(crate) async fn abort<T>(tx: &mpsc::Sender<Result<T, Status>>, err: Error) -> Error {
    match timeout(ERROR_DELIVERY_GRACE, tx.send(Err(err.clone().into()))).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => tracing::debug!("Client gone before error could be delivered: {err}"),
        Err(_) => tracing::warn!(
            "Client stalled for {ERROR_DELIVERY_GRACE:?}; dropping error: {err}"
        ),
    }
    err
}
