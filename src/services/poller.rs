use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// What a feed delivers to its consumer.
#[derive(Debug)]
pub enum PollEvent<T> {
    /// A fresh snapshot, tagged with the instant its fetch was started.
    Snapshot { data: T, requested_at: Instant },
    /// A non-transient failure, or a transient one that kept repeating.
    Failed(ClientError),
}

/// Periodic fetcher for one feed.
///
/// Fires immediately, then on every interval tick. A tick that arrives while
/// the previous fetch is still pending is skipped, not queued. An explicit
/// refresh is never lost: one arriving mid-fetch is served right after it.
pub struct Poller {
    name: String,
    interval: Duration,
    error_threshold: u32,
}

impl Poller {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            error_threshold: 3,
        }
    }

    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold.max(1);
        self
    }

    pub fn start<T, F, Fut, S>(self, fetch: F, mut sink: S) -> PollHandle
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
        S: FnMut(PollEvent<T>) + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let refresh = Arc::new(Notify::new());
        let counters = Arc::new(PollCounters::default());

        let Poller {
            name,
            interval,
            error_threshold,
        } = self;

        info!("Starting poller {} (interval: {:?})", name, interval);

        let task = {
            let refresh = refresh.clone();
            let counters = counters.clone();
            let name = name.clone();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                let mut in_flight: Option<InFlight<Fut>> = None;
                let mut consecutive_failures = 0u32;
                // A refresh that arrived mid-fetch; served as soon as it finishes.
                let mut refresh_queued = false;
                let cancel_check = cancel_rx.clone();

                loop {
                    let start_fetch = tokio::select! {
                        biased;

                        _ = cancel_rx.wait_for(|cancelled| *cancelled) => break,

                        (requested_at, result) = finish(&mut in_flight) => {
                            in_flight = None;

                            if *cancel_check.borrow() {
                                debug!("Poller {}: discarding result after cancel", name);
                                break;
                            }

                            match result {
                                Ok(data) => {
                                    consecutive_failures = 0;
                                    counters.applied.fetch_add(1, Ordering::Relaxed);
                                    sink(PollEvent::Snapshot { data, requested_at });
                                }
                                Err(err) if err.is_transient() => {
                                    consecutive_failures += 1;
                                    if consecutive_failures == error_threshold {
                                        warn!(
                                            "Poller {}: {} consecutive failures, last: {}",
                                            name, consecutive_failures, err
                                        );
                                        sink(PollEvent::Failed(err));
                                    } else {
                                        debug!("Poller {}: transient failure, retrying next tick: {}", name, err);
                                    }
                                }
                                Err(err) => {
                                    warn!("Poller {}: fetch failed: {}", name, err);
                                    sink(PollEvent::Failed(err));
                                }
                            }
                            std::mem::take(&mut refresh_queued)
                        }

                        _ = ticker.tick() => {
                            if in_flight.is_some() {
                                counters.skipped.fetch_add(1, Ordering::Relaxed);
                                debug!("Poller {}: previous fetch still pending, skipping tick", name);
                                false
                            } else {
                                true
                            }
                        }

                        _ = refresh.notified() => {
                            if in_flight.is_some() {
                                debug!("Poller {}: refresh queued behind pending fetch", name);
                                refresh_queued = true;
                                false
                            } else {
                                true
                            }
                        }
                    };

                    if !start_fetch {
                        continue;
                    }

                    counters.started.fetch_add(1, Ordering::Relaxed);
                    in_flight = Some(InFlight {
                        requested_at: Instant::now(),
                        fut: Box::pin(fetch()),
                    });
                }

                debug!("Poller {} stopped", name);
            })
        };

        PollHandle {
            name,
            cancel: cancel_tx,
            refresh,
            counters,
            task,
        }
    }
}

struct InFlight<Fut> {
    requested_at: Instant,
    fut: Pin<Box<Fut>>,
}

async fn finish<T, Fut>(slot: &mut Option<InFlight<Fut>>) -> (Instant, Result<T, ClientError>)
where
    Fut: Future<Output = Result<T, ClientError>>,
{
    match slot {
        Some(in_flight) => {
            let result = in_flight.fut.as_mut().await;
            (in_flight.requested_at, result)
        }
        None => std::future::pending().await,
    }
}

#[derive(Debug, Default)]
struct PollCounters {
    started: AtomicU64,
    applied: AtomicU64,
    skipped: AtomicU64,
}

/// Cancellable handle to a running poller. Dropping it cancels the poller.
pub struct PollHandle {
    name: String,
    cancel: watch::Sender<bool>,
    refresh: Arc<Notify>,
    counters: Arc<PollCounters>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops future ticks and discards any fetch still in flight. Safe to
    /// call any number of times.
    pub fn cancel(&self) {
        if !self.cancel.send_replace(true) {
            info!("Poller {} cancelled", self.name);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Requests a fetch now instead of waiting for the next tick. If a fetch
    /// is already pending, one more starts as soon as it finishes.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn fetches_started(&self) -> u64 {
        self.counters.started.load(Ordering::Relaxed)
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.counters.applied.load(Ordering::Relaxed)
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.counters.skipped.load(Ordering::Relaxed)
    }

    /// Cancels and waits for the poll task to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}
