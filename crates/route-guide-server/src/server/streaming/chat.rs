//! RouteChat: bidirectional note relay over the shared board.
//!
//! For every inbound note the session first replays what other callers (and
//! this one) have already left at that location, then files the note. The
//! reply for a note therefore never contains the note itself.

use super::{abort, forward};
use core::pin::pin;
use futures::{Stream, StreamExt};
use route_guide_core::{Error, Result, board::NoteBoard, geo::Degrees, proto::RouteNote};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Runs one RouteChat session until the client closes its side.
///
/// Returns the number of notes the session recorded.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] for a note without a location. The error is
///   also sent to the client and ends the session.
/// - [`Error::Transport`] if the inbound stream fails.
/// - [`Error::ChannelError`] if the client stops reading replies.
/// - [`Error::ServiceShutdown`] if `cancel` fires first.
pub async fn relay_notes<S>(
    board: &NoteBoard,
    inbound: S,
    tx: &mpsc::Sender<core::result::Result<RouteNote, Status>>,
    cancel: &CancellationToken,
) -> Result<usize>
where
    S: Stream<Item = core::result::Result<RouteNote, Status>>,
{
    let mut inbound = pin!(inbound);
    let mut recorded = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(abort(tx, Error::ServiceShutdown).await),
            next = inbound.next() => next,
        };

        let note = match next {
            Some(Ok(note)) => note,
            Some(Err(status)) => return Err(abort(tx, Error::Transport(status)).await),
            None => return Ok(recorded),
        };

        let Some(location) = note.location.as_ref() else {
            let err = Error::invalid_argument("route note has no location");
            return Err(abort(tx, err).await);
        };

        let earlier = board.notes_at(location);
        tracing::trace!(at = %Degrees(location), replay = earlier.len(), "Note received");
        for prior in earlier {
            if let Err(e) = forward(tx, prior, cancel).await {
                return Err(abort(tx, e).await);
            }
        }

        board.record(note);
        recorded += 1;
    }
}
