//! Credential refresh timers for Orderpass.
//!
//! Every authenticated session type gets its own recurring timer. When it
//! fires, the session's credential is exchanged for a renewed one through a
//! [`Refresher`]. The default period is 5 days, strictly shorter than the
//! 7 day credential ceiling, so an active session never ages out.
//!
//! # Reconciliation
//!
//! Timers follow the authenticated set by **diffing**: when the set
//! changes, timers are started for newly authenticated types and stopped
//! for types that left. A timer that keeps running is never reset, so
//! logging in as Admin doesn't push back Customer's next refresh.
//!
//! ```text
//! {Customer}            → start Customer
//! {Customer, Admin}     → start Admin          (Customer untouched)
//! {Admin}               → stop Customer
//! ```
//!
//! # Integration
//!
//! [`RefreshScheduler::supervise`] hands the scheduler to a task that
//! follows a `watch` channel of the authenticated set:
//!
//! ```ignore
//! let scheduler = RefreshScheduler::new(Arc::clone(&manager), RefreshConfig::default());
//! let supervisor = scheduler.supervise(manager.subscribe());
//! // ...
//! supervisor.stop().await;
//! ```

#![allow(async_fn_in_trait)]

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use orderpass_protocol::{SessionSet, SessionType};
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Refresher
// ---------------------------------------------------------------------------

/// Renews the credential of one session type.
///
/// The future must be `Send`: it runs on a spawned task.
pub trait Refresher: Send + Sync + 'static {
    type Error: fmt::Display + Send;

    fn refresh(
        &self,
        kind: SessionType,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// How old the stored credential of `kind` already is, if known.
    ///
    /// A new timer's first fire is brought forward by this much, so a
    /// credential restored at startup is renewed relative to when it was
    /// issued.
    fn credential_age(&self, _kind: SessionType) -> Option<Duration> {
        None
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Refresh timer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Time between refreshes of one session. Default: 5 days.
    pub interval: Duration,
    /// Random delay (0..max) added to a timer's *first* fire, so sessions
    /// logged in at the same moment don't refresh in lockstep.
    pub initial_jitter: Duration,
    /// Credential lifetime the interval has to stay below. Default: 7 days.
    pub lifetime: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            initial_jitter: Duration::from_secs(60),
            lifetime: Self::DEFAULT_LIFETIME,
        }
    }
}

impl RefreshConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 24 * 60 * 60);

    pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Fix out-of-range values so the config is safe to use.
    ///
    /// Called by [`RefreshScheduler::new`]. Rules:
    /// - a zero `lifetime` falls back to 7 days;
    /// - a zero `interval` falls back to the default;
    /// - `interval` must stay below `lifetime`: the default is used if it
    ///   fits, else 5/7 of `lifetime`;
    /// - `initial_jitter` is capped at a tenth of `interval`.
    pub fn validated(mut self) -> Self {
        if self.lifetime.is_zero() {
            warn!("credential lifetime is zero, using the default");
            self.lifetime = Self::DEFAULT_LIFETIME;
        }
        if self.interval.is_zero() {
            warn!("refresh interval is zero, using the default");
            self.interval = Self::DEFAULT_INTERVAL;
        }
        if self.interval >= self.lifetime {
            let interval = if Self::DEFAULT_INTERVAL < self.lifetime {
                Self::DEFAULT_INTERVAL
            } else {
                self.lifetime * 5 / 7
            };
            warn!(
                interval_secs = self.interval.as_secs(),
                lifetime_secs = self.lifetime.as_secs(),
                using_secs = interval.as_secs(),
                "refresh interval reaches the credential lifetime, shortening it"
            );
            self.interval = interval;
        }
        let max_jitter = self.interval / 10;
        if self.initial_jitter > max_jitter {
            self.initial_jitter = max_jitter;
        }
        self
    }

    /// Delay before the first fire for a credential already `age` old.
    fn first_delay(&self, age: Duration) -> Duration {
        let max_ms = self.initial_jitter.as_millis() as u64;
        let jitter = if max_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..max_ms))
        } else {
            Duration::ZERO
        };
        self.interval.saturating_sub(age) + jitter
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters shared by a scheduler's timers.
#[derive(Debug, Default)]
struct RefreshStats {
    fired: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of refresh counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshCounts {
    /// Timer fires, across all session types.
    pub fired: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl RefreshStats {
    fn snapshot(&self) -> RefreshCounts {
        RefreshCounts {
            fired: self.fired.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// What one [`RefreshScheduler::reconcile`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileDiff {
    pub started: SessionSet,
    pub stopped: SessionSet,
}

impl ReconcileDiff {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }
}

/// One refresh timer per authenticated session type.
///
/// Timers are Tokio tasks; `reconcile` must be called from within a
/// runtime. Dropping the scheduler stops every timer. Refreshes already in
/// flight run to completion regardless.
pub struct RefreshScheduler<R> {
    refresher: Arc<R>,
    config: RefreshConfig,
    timers: HashMap<SessionType, JoinHandle<()>>,
    stats: Arc<RefreshStats>,
}

impl<R: Refresher> RefreshScheduler<R> {
    pub fn new(refresher: Arc<R>, config: RefreshConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_secs = config.interval.as_secs(),
            interval_days = config.interval.as_secs_f64() / DAY.as_secs_f64(),
            "refresh scheduler created"
        );
        Self {
            refresher,
            config,
            timers: HashMap::new(),
            stats: Arc::new(RefreshStats::default()),
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Session types that currently have a timer.
    pub fn running(&self) -> SessionSet {
        self.timers.keys().copied().collect()
    }

    pub fn stats(&self) -> RefreshCounts {
        self.stats.snapshot()
    }

    /// Brings the timers in line with `authenticated`.
    ///
    /// Starts timers for new types, stops timers for departed ones and
    /// leaves the rest running on their existing schedule.
    pub fn reconcile(&mut self, authenticated: SessionSet) -> ReconcileDiff {
        let running = self.running();
        let diff = ReconcileDiff {
            started: authenticated.difference(running),
            stopped: running.difference(authenticated),
        };

        for kind in diff.stopped.iter() {
            if let Some(timer) = self.timers.remove(&kind) {
                timer.abort();
                debug!(session = %kind, "refresh timer stopped");
            }
        }
        for kind in diff.started.iter() {
            self.timers.insert(kind, self.spawn_timer(kind));
            debug!(session = %kind, "refresh timer started");
        }

        if diff.is_empty() {
            trace!(?authenticated, "refresh timers already in sync");
        }
        diff
    }

    /// Stops every timer.
    pub fn shutdown(&mut self) {
        for (kind, timer) in self.timers.drain() {
            timer.abort();
            debug!(session = %kind, "refresh timer stopped");
        }
    }

    /// Moves the scheduler onto a task that reconciles on every change of
    /// `authenticated`, starting with its current value.
    ///
    /// The task ends (stopping all timers) when the sender is dropped or
    /// the returned handle is stopped.
    pub fn supervise(mut self, mut authenticated: watch::Receiver<SessionSet>) -> SupervisorHandle {
        let stats = Arc::clone(&self.stats);
        let task = tokio::spawn(async move {
            loop {
                let current = *authenticated.borrow_and_update();
                self.reconcile(current);
                if authenticated.changed().await.is_err() {
                    debug!("session registry dropped, stopping refresh supervisor");
                    break;
                }
            }
            self.shutdown();
        });
        SupervisorHandle { task, stats }
    }

    fn spawn_timer(&self, kind: SessionType) -> JoinHandle<()> {
        let refresher = Arc::clone(&self.refresher);
        let stats = Arc::clone(&self.stats);
        let period = self.config.interval;
        let age = self.refresher.credential_age(kind).unwrap_or_default();
        let first = Instant::now() + self.config.first_delay(age);
        if !age.is_zero() {
            debug!(session = %kind, age_secs = age.as_secs(), "first refresh brought forward");
        }

        tokio::spawn(async move {
            let mut ticker = time::interval_at(first, period);
            // A suspended laptop shouldn't wake to a burst of refreshes.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                stats.fired.fetch_add(1, Ordering::Relaxed);
                trace!(session = %kind, "refresh timer fired");

                // Detached: stopping the timer must not cancel a refresh
                // that already reached the backend.
                let refresher = Arc::clone(&refresher);
                let stats = Arc::clone(&stats);
                tokio::spawn(async move {
                    match refresher.refresh(kind).await {
                        Ok(()) => {
                            stats.succeeded.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                            warn!(session = %kind, error = %e, "credential refresh failed");
                        }
                    }
                });
            }
        })
    }
}

impl<R> Drop for RefreshScheduler<R> {
    fn drop(&mut self) {
        for timer in self.timers.values() {
            timer.abort();
        }
    }
}

/// Handle to a running [`RefreshScheduler::supervise`] task.
#[derive(Debug)]
pub struct SupervisorHandle {
    task: JoinHandle<()>,
    stats: Arc<RefreshStats>,
}

impl SupervisorHandle {
    pub fn stats(&self) -> RefreshCounts {
        self.stats.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the supervisor and every timer it owns.
    pub async fn stop(self) {
        self.task.abort();
        // Cancelled is the expected outcome.
        let _ = self.task.await;
    }
}
