//! # Update Scheduler
//!
//! The generic "on an interval, call a refresh function and notify
//! subscribers" building block. It knows nothing about snow reports: anything
//! implementing [`Refresh`] can be driven by it.
//!
//! ## Behaviour
//!
//! - One tokio task per scheduled component, ticking at a fixed period.
//! - Ticks are serialized: the next tick is only awaited once the previous
//!   refresh has returned, and missed ticks are delayed rather than bunched.
//! - Every outcome is published to a [`tokio::sync::watch`] channel as a
//!   [`PollState`]. A failure flips `last_update_success` and records the
//!   error but keeps the previous `data`.
//! - No backoff. A failed cycle is simply retried on the next tick.

use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A component that can run one refresh cycle.
pub trait Refresh: Send + 'static {
    type Output: Send + Sync + 'static;
    type Error: fmt::Display + Send + 'static;

    fn refresh(&mut self) -> impl Future<Output = Result<Arc<Self::Output>, Self::Error>> + Send;
}

/// What subscribers see after every cycle.
#[derive(Debug)]
pub struct PollState<T> {
    /// Last successfully refreshed value
    pub data: Option<Arc<T>>,
    /// Whether the most recent cycle succeeded
    pub last_update_success: bool,
    /// Error of the most recent cycle, if it failed
    pub last_error: Option<String>,
    /// When `data` was last replaced
    pub last_updated: Option<DateTime<Utc>>,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_update_success: false,
            last_error: None,
            last_updated: None,
        }
    }
}

impl<T> Clone for PollState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            last_update_success: self.last_update_success,
            last_error: self.last_error.clone(),
            last_updated: self.last_updated,
        }
    }
}

impl<T> PollState<T> {
    fn record<E: fmt::Display>(&mut self, outcome: &Result<Arc<T>, E>) {
        match outcome {
            Ok(data) => {
                self.data = Some(Arc::clone(data));
                self.last_update_success = true;
                self.last_error = None;
                self.last_updated = Some(Utc::now());
            }
            Err(err) => {
                self.last_update_success = false;
                self.last_error = Some(err.to_string());
            }
        }
    }
}

/// Drives a [`Refresh`] implementation on a fixed interval.
pub struct UpdateScheduler<R: Refresh> {
    name: String,
    refresher: R,
    interval: Duration,
    updates: watch::Sender<PollState<R::Output>>,
    primed: bool,
}

impl<R: Refresh> UpdateScheduler<R> {
    /// A zero interval is raised to one millisecond.
    pub fn new(name: impl Into<String>, refresher: R, interval: Duration) -> Self {
        let (updates, _) = watch::channel(PollState::default());
        Self {
            name: name.into(),
            refresher,
            interval: interval.max(Duration::from_millis(1)),
            updates,
            primed: false,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState<R::Output>> {
        self.updates.subscribe()
    }

    /// Run one cycle now and publish it, before the periodic task starts.
    ///
    /// After this, [`spawn`](Self::spawn) waits a full interval before its
    /// first tick instead of refreshing immediately.
    pub async fn first_refresh(&mut self) -> Result<Arc<R::Output>, R::Error> {
        self.primed = true;
        run_cycle(&self.name, &mut self.refresher, &self.updates).await
    }

    /// Start the periodic task.
    pub fn spawn(self) -> SchedulerHandle<R> {
        let UpdateScheduler {
            name,
            mut refresher,
            interval,
            updates,
            primed,
        } = self;

        let receiver = updates.subscribe();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let start = if primed {
                Instant::now() + interval
            } else {
                Instant::now()
            };
            let mut ticker = time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(scheduler = %name, ?interval, "scheduler started");

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                }
                // Result already published; nothing else to do with it here
                let _ = run_cycle(&name, &mut refresher, &updates).await;
            }

            info!(scheduler = %name, "scheduler stopped");
            refresher
        });

        SchedulerHandle {
            stop: Some(stop_tx),
            task,
            updates: receiver,
        }
    }
}

/// Handle to a running scheduler. Dropping it stops the task.
pub struct SchedulerHandle<R: Refresh> {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<R>,
    updates: watch::Receiver<PollState<R::Output>>,
}

impl<R: Refresh> SchedulerHandle<R> {
    pub fn subscribe(&self) -> watch::Receiver<PollState<R::Output>> {
        self.updates.clone()
    }

    /// Latest published state.
    pub fn state(&self) -> PollState<R::Output> {
        self.updates.borrow().clone()
    }

    /// Stop ticking and hand the refresher back so it can release its
    /// resources. A cycle already in flight is allowed to finish.
    pub async fn stop(mut self) -> Result<R, JoinError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await
    }
}

async fn run_cycle<R: Refresh>(
    name: &str,
    refresher: &mut R,
    updates: &watch::Sender<PollState<R::Output>>,
) -> Result<Arc<R::Output>, R::Error> {
    let outcome = refresher.refresh().await;
    match &outcome {
        Ok(_) => debug!(scheduler = name, "update succeeded"),
        Err(err) => warn!(scheduler = name, "update failed: {err}"),
    }
    updates.send_modify(|state| state.record(&outcome));
    outcome
}
