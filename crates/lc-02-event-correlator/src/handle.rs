//! # Watch Handle
//!
//! Future returned by `watch`. Resolves exactly once:
//!
//! - `Ok(notification)` for the first match,
//! - `Err(CorrelationTimeout)` at the deadline,
//! - `Err(TransientConnectivity)` if the subscription dies first.
//!
//! Dropping (or [`cancel`](WatchHandle::cancel)ling) an unresolved handle
//! removes its waiter. Nothing remote is cancelled.

use crate::domain::{CorrelationError, CorrelatorStats};
use crate::service::{Registry, WaiterResult};
use pin_project_lite::pin_project;
use shared_types::{Notification, WaiterId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant, Sleep};
use tracing::debug;

pin_project! {
    /// A pending correlation.
    #[must_use = "a watch does nothing unless awaited, and dropping it cancels the waiter"]
    pub struct WatchHandle {
        channel: String,
        id: WaiterId,
        receiver: oneshot::Receiver<WaiterResult>,
        #[pin]
        deadline: Sleep,
        registered_at: Instant,
        registry: Arc<Registry>,
        stats: Arc<CorrelatorStats>,
        resolved: bool,
    }

    impl PinnedDrop for WatchHandle {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if *this.resolved {
                return;
            }
            if this.registry.detach(this.channel, this.id, this.stats) {
                CorrelatorStats::bump(&this.stats.total_cancelled);
                debug!(channel = %this.channel, waiter = %this.id, "Waiter cancelled");
            }
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

impl WatchHandle {
    pub(crate) fn new(
        channel: String,
        id: WaiterId,
        receiver: oneshot::Receiver<WaiterResult>,
        deadline: Instant,
        registry: Arc<Registry>,
        stats: Arc<CorrelatorStats>,
    ) -> Self {
        Self {
            channel,
            id,
            receiver,
            deadline: sleep_until(deadline),
            registered_at: Instant::now(),
            registry,
            stats,
            resolved: false,
        }
    }

    /// Channel this handle watches.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn id(&self) -> WaiterId {
        self.id
    }

    /// When the handle gives up.
    pub fn deadline(&self) -> Instant {
        self.deadline.deadline()
    }

    /// Abandon the wait.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Future for WatchHandle {
    type Output = Result<Notification, CorrelationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if *this.resolved {
            return Poll::Ready(Err(CorrelationError::AlreadyResolved));
        }

        match Pin::new(&mut *this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => {
                *this.resolved = true;
                return Poll::Ready(result);
            }
            Poll::Ready(Err(_)) => {
                // Sender dropped unsent: the correlator was torn down.
                *this.resolved = true;
                return Poll::Ready(Err(CorrelationError::TransientConnectivity(format!(
                    "subscription to '{}' closed",
                    this.channel
                ))));
            }
            Poll::Pending => {}
        }

        if this.deadline.poll(cx).is_pending() {
            return Poll::Pending;
        }

        *this.resolved = true;
        if !this.registry.detach(this.channel, this.id, this.stats) {
            // The pump removed us first, so its answer is already in the
            // channel.
            if let Ok(result) = this.receiver.try_recv() {
                return Poll::Ready(result);
            }
        }

        CorrelatorStats::bump(&this.stats.total_timeouts);
        let waited = this.registered_at.elapsed();
        debug!(
            channel = %this.channel,
            waiter = %this.id,
            waited_ms = waited.as_millis() as u64,
            "Waiter timed out"
        );
        Poll::Ready(Err(CorrelationError::CorrelationTimeout {
            channel: this.channel.clone(),
            waited,
        }))
    }
}
