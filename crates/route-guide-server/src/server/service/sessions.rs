//! In-flight call tracking for graceful shutdown.
//!
//! Every call the service admits holds a [`SessionGuard`] for as long as it
//! runs, including the spawned task behind a streaming response. Shutdown
//! flips [`Sessions`] to refuse new calls, waits for the count to reach zero
//! and finally cancels the shared token so that stragglers stop at their next
//! suspension point.

use crate::server::telemetry::{
    decrement_streams_inflight, increment_requests, increment_stream_errors,
    increment_streams_inflight, record_stream_duration,
};
use core::time::Duration;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use route_guide_core::Error;
use std::{sync::Arc, time::Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct Sessions {
    inflight: AtomicUsize,
    accepting: AtomicBool,
    shutdown_token: CancellationToken,
}

impl Default for Sessions {
    fn default() -> Self {
        Self {
            inflight: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            shutdown_token: CancellationToken::new(),
        }
    }
}

impl Sessions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Admits a new call for `method`, or refuses it once shutdown began.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] after [`Sessions::refuse_new`].
    pub fn begin(self: &Arc<Self>, method: &'static str) -> Result<SessionGuard, Error> {
        // Count first so a concurrent drain never observes zero while an
        // admitted call is still setting up.
        self.inflight.fetch_add(1, Ordering::AcqRel);
        if !self.accepting.load(Ordering::Acquire) {
            self.inflight.fetch_sub(1, Ordering::AcqRel);
            increment_stream_errors(method);
            tracing::debug!(method, "Refusing call during shutdown");
            return Err(Error::ServiceShutdown);
        }

        increment_requests(method);
        increment_streams_inflight();
        Ok(SessionGuard {
            sessions: Arc::clone(self),
            method,
            started: Instant::now(),
        })
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn refuse_new(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Token cancelled once the drain period is over.
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn cancel(&self) {
        self.shutdown_token.cancel();
    }

    /// Resolves once no admitted call is left. Polls every `interval`.
    pub async fn drained(&self, interval: Duration) {
        while self.inflight() > 0 {
            sleep(interval).await;
        }
    }
}

/// Marks one admitted call as in flight until dropped.
#[derive(Debug)]
pub struct SessionGuard {
    sessions: Arc<Sessions>,
    method: &'static str,
    started: Instant,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
        record_stream_duration(self.method, self.started.elapsed().as_secs_f64() * 1000.0);
    }
}
