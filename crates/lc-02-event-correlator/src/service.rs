//! # Event Correlator Service
//!
//! One registry maps each open channel to its waiters (in registration
//! order) and the task pumping that channel's stream. The pump offers every
//! notification to every waiter; a waiter whose predicate matches is sent
//! the notification and removed. When a channel has no waiters left the
//! pump exits and dropping its stream closes the subscription.
//!
//! ```text
//! watch() ──→ registry[channel] exists? ──yes──→ append waiter
//!                     │ no
//!                     ▼
//!             source.subscribe(channel) ──→ spawn pump ──→ append waiter
//! ```

use crate::domain::{CorrelationError, CorrelatorStats, CorrelatorStatsSnapshot, Predicate};
use crate::handle::WatchHandle;
use crate::ports::{EventCorrelatorApi, NotificationSource, NotificationStream};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use shared_types::{Notification, WaiterId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub(crate) type WaiterResult = Result<Notification, CorrelationError>;

pub(crate) struct Waiter {
    pub(crate) id: WaiterId,
    predicate: Predicate,
    sender: oneshot::Sender<WaiterResult>,
}

struct ChannelWaiters {
    waiters: Vec<Waiter>,
    pump: Option<JoinHandle<()>>,
    /// Distinguishes successive subscriptions of the same channel.
    generation: u64,
}

/// Waiter registry shared by the correlator, its pumps, and live handles.
#[derive(Default)]
pub(crate) struct Registry {
    channels: Mutex<HashMap<String, ChannelWaiters>>,
}

impl Registry {
    /// Append to an open channel. Hands the waiter back if the channel is
    /// not open.
    ///
    /// An entry whose pump already exited is stale: it is removed, its
    /// waiters fail, and the caller subscribes afresh.
    fn join(&self, channel: &str, waiter: Waiter) -> Result<(), Waiter> {
        let mut channels = self.channels.lock();
        let pump_exited = match channels.get(channel) {
            Some(entry) => entry.pump.as_ref().is_some_and(|pump| pump.is_finished()),
            None => return Err(waiter),
        };
        if !pump_exited {
            return match channels.get_mut(channel) {
                Some(entry) => {
                    entry.waiters.push(waiter);
                    Ok(())
                }
                None => Err(waiter),
            };
        }

        let stale = channels.remove(channel);
        drop(channels);
        if let Some(entry) = stale {
            warn!(
                channel = channel,
                waiters = entry.waiters.len(),
                "Dropping channel whose delivery task exited"
            );
            fail_all(channel, entry.waiters);
        }
        Err(waiter)
    }

    /// Remove one waiter. Closes the channel if it was the last.
    ///
    /// Returns `false` if the waiter was already gone, which means it was
    /// resolved (or failed) by the pump.
    pub(crate) fn detach(&self, channel: &str, id: &WaiterId, stats: &CorrelatorStats) -> bool {
        let mut channels = self.channels.lock();
        let Some(entry) = channels.get_mut(channel) else {
            return false;
        };
        let Some(position) = entry.waiters.iter().position(|w| &w.id == id) else {
            return false;
        };
        entry.waiters.remove(position);

        if entry.waiters.is_empty() {
            if let Some(entry) = channels.remove(channel) {
                if let Some(pump) = entry.pump {
                    pump.abort();
                }
            }
            CorrelatorStats::bump(&stats.subscriptions_closed);
            debug!(channel = channel, "Last waiter left, subscription closed");
        }
        true
    }

    fn waiter_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map_or(0, |entry| entry.waiters.len())
    }

    fn open_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

/// The EventCorrelator service.
pub struct EventCorrelator {
    source: Arc<dyn NotificationSource>,
    registry: Arc<Registry>,
    /// Serialises subscription setup so concurrent first watches on a
    /// channel share one subscription.
    subscribing: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    stats: Arc<CorrelatorStats>,
}

impl EventCorrelator {
    pub fn new(source: Arc<dyn NotificationSource>) -> Self {
        Self {
            source,
            registry: Arc::new(Registry::default()),
            subscribing: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            stats: Arc::new(CorrelatorStats::default()),
        }
    }

    /// Pending waiters on `channel`.
    pub fn waiter_count(&self, channel: &str) -> usize {
        self.registry.waiter_count(channel)
    }

    /// Channels with a live subscription.
    pub fn open_channels(&self) -> Vec<String> {
        self.registry.open_channels()
    }

    pub fn stats(&self) -> CorrelatorStatsSnapshot {
        self.stats.snapshot()
    }

    async fn register(
        &self,
        channel: &str,
        predicate: Predicate,
        deadline: Instant,
    ) -> Result<WatchHandle, CorrelationError> {
        let (sender, receiver) = oneshot::channel();
        let id = WaiterId::new();
        let waiter = Waiter {
            id,
            predicate,
            sender,
        };

        let waiter = match self.registry.join(channel, waiter) {
            Ok(()) => return Ok(self.handle(channel, id, receiver, deadline)),
            Err(waiter) => waiter,
        };

        let _setup = self.subscribing.lock().await;
        let waiter = match self.registry.join(channel, waiter) {
            Ok(()) => return Ok(self.handle(channel, id, receiver, deadline)),
            Err(waiter) => waiter,
        };

        let stream = self.source.subscribe(channel).await.map_err(|e| {
            warn!(channel = channel, error = %e, "Failed to subscribe to channel");
            CorrelationError::from(e)
        })?;
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        CorrelatorStats::bump(&self.stats.subscriptions_opened);

        // Registered before the pump starts, so the first notification
        // already sees this waiter.
        self.registry.channels.lock().insert(
            channel.to_string(),
            ChannelWaiters {
                waiters: vec![waiter],
                pump: None,
                generation,
            },
        );

        let pump = tokio::spawn(pump(
            channel.to_string(),
            stream,
            generation,
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
        ));

        {
            let mut channels = self.registry.channels.lock();
            match channels.get_mut(channel) {
                Some(entry) if entry.generation == generation => entry.pump = Some(pump),
                _ => pump.abort(),
            }
        }

        info!(channel = channel, "Subscribed to notification channel");
        Ok(self.handle(channel, id, receiver, deadline))
    }

    fn handle(
        &self,
        channel: &str,
        id: WaiterId,
        receiver: oneshot::Receiver<WaiterResult>,
        deadline: Instant,
    ) -> WatchHandle {
        CorrelatorStats::bump(&self.stats.total_watches);
        debug!(channel = channel, waiter = %id, "Waiter registered");
        WatchHandle::new(
            channel.to_string(),
            id,
            receiver,
            deadline,
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
        )
    }
}

#[async_trait]
impl EventCorrelatorApi for EventCorrelator {
    async fn watch(
        &self,
        channel: &str,
        predicate: Predicate,
        deadline: Instant,
    ) -> Result<WatchHandle, CorrelationError> {
        self.register(channel, predicate, deadline).await
    }
}

impl Drop for EventCorrelator {
    fn drop(&mut self) {
        // Handles hold the registry, not the correlator, so stop the pumps
        // explicitly. Pending handles then fail instead of hanging.
        let mut channels = self.registry.channels.lock();
        for (_, entry) in channels.drain() {
            if let Some(pump) = entry.pump {
                pump.abort();
            }
        }
    }
}

/// Deliver one channel's notifications until no waiters remain or the
/// stream ends.
///
/// Predicates run on a snapshot, outside the registry lock, so they may call
/// back into the correlator. Waiters joining while a notification is being
/// evaluated do not see that notification.
async fn pump(
    channel: String,
    mut stream: NotificationStream,
    generation: u64,
    registry: Arc<Registry>,
    stats: Arc<CorrelatorStats>,
) {
    while let Some(notification) = stream.next().await {
        let snapshot: Vec<(WaiterId, Predicate)> = {
            let channels = registry.channels.lock();
            let Some(entry) = channels.get(&channel) else {
                return;
            };
            if entry.generation != generation {
                return;
            }
            entry
                .waiters
                .iter()
                .filter(|w| !w.sender.is_closed())
                .map(|w| (w.id, Arc::clone(&w.predicate)))
                .collect()
        };

        let mut verdicts: HashMap<WaiterId, Verdict> = HashMap::with_capacity(snapshot.len());
        for (id, predicate) in snapshot {
            let verdict = match panic::catch_unwind(AssertUnwindSafe(|| predicate(&notification))) {
                Ok(true) => Verdict::Matched,
                Ok(false) => continue,
                Err(_) => Verdict::Panicked,
            };
            verdicts.insert(id, verdict);
        }

        let mut channels = registry.channels.lock();
        let Some(entry) = channels.get_mut(&channel) else {
            return;
        };
        if entry.generation != generation {
            return;
        }

        let waiters = std::mem::take(&mut entry.waiters);
        let mut remaining = Vec::with_capacity(waiters.len());
        for waiter in waiters {
            if waiter.sender.is_closed() {
                continue;
            }
            match verdicts.get(&waiter.id) {
                Some(Verdict::Matched) => {
                    debug!(
                        channel = %channel,
                        waiter = %waiter.id,
                        sequence = notification.sequence,
                        "Notification matched waiter"
                    );
                    CorrelatorStats::bump(&stats.total_matched);
                    let _ = waiter.sender.send(Ok(notification.clone()));
                }
                Some(Verdict::Panicked) => {
                    warn!(
                        channel = %channel,
                        waiter = %waiter.id,
                        sequence = notification.sequence,
                        "Predicate panicked, failing its waiter"
                    );
                    let _ = waiter.sender.send(Err(CorrelationError::PredicatePanicked {
                        channel: channel.clone(),
                    }));
                }
                None => remaining.push(waiter),
            }
        }
        entry.waiters = remaining;

        if entry.waiters.is_empty() {
            channels.remove(&channel);
            CorrelatorStats::bump(&stats.subscriptions_closed);
            debug!(channel = %channel, "All waiters resolved, subscription closed");
            return;
        }
    }

    let mut channels = registry.channels.lock();
    let is_current = channels
        .get(&channel)
        .is_some_and(|entry| entry.generation == generation);
    if !is_current {
        return;
    }
    if let Some(entry) = channels.remove(&channel) {
        drop(channels);
        CorrelatorStats::bump(&stats.stream_failures);
        warn!(
            channel = %channel,
            waiters = entry.waiters.len(),
            "Notification stream ended with waiters pending"
        );
        fail_all(&channel, entry.waiters);
    }
}

enum Verdict {
    Matched,
    Panicked,
}

fn fail_all(channel: &str, waiters: Vec<Waiter>) {
    for waiter in waiters {
        let _ = waiter.sender.send(Err(CorrelationError::TransientConnectivity(format!(
            "notification stream for '{channel}' ended"
        ))));
    }
}
