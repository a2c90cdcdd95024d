//! Time-limited cache of the identity provider's signing keys
//!
//! Readers take an `Arc<KeySet>` snapshot under a short read lock. A refresh
//! builds the replacement set off to the side and swaps the pointer under the
//! write lock, so a reader sees either the old set or the new one in full.
//! Refreshes are serialized through an async gate; callers that queued behind
//! a running refresh reuse its result instead of fetching again.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, KeySetFetchError};
use crate::key_set::KeySet;
use crate::metrics;
use crate::source::KeySetSource;

/// Timing knobs for [`KeySetCache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Age after which the set is considered stale
    pub ttl: Duration,
    /// How long before `ttl` a proactive refresh starts
    pub refresh_window: Duration,
    /// Tick period of the background refresh task
    pub check_interval: Duration,
    /// Upper bound for a single fetch
    pub fetch_timeout: Duration,
    /// Age beyond which the cache reports itself degraded; `None` disables
    /// the ceiling
    pub max_staleness: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            refresh_window: Duration::from_secs(300),
            check_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            max_staleness: Some(Duration::from_secs(24 * 3600)),
        }
    }
}

impl CacheSettings {
    /// Age at which a refresh becomes due
    pub fn refresh_after(&self) -> Duration {
        self.ttl.saturating_sub(self.refresh_window)
    }
}

/// Observable health of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Fresh,
    /// Past its TTL, still serving the last good set
    StaleButUsable { consecutive_failures: u32 },
}

pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    settings: CacheSettings,
    current: RwLock<Arc<KeySet>>,
    refresh_gate: tokio::sync::Mutex<()>,
    attempts: AtomicU64,
    consecutive_failures: AtomicU32,
    last_error: Mutex<Option<KeySetFetchError>>,
}

impl KeySetCache {
    /// Perform the startup fetch
    ///
    /// A service cannot verify anything without keys, so failure here is
    /// fatal to the caller.
    #[instrument(level = "info", skip_all, fields(source = %source.describe()))]
    pub async fn initialize(
        source: Arc<dyn KeySetSource>,
        settings: CacheSettings,
    ) -> Result<Self, AuthError> {
        let initial = fetch_key_set(source.as_ref(), settings.fetch_timeout, 1)
            .await
            .map_err(|e| AuthError::KeySetUnavailable {
                reason: e.to_string(),
            })?;

        info!(
            generation = initial.generation(),
            keys = ?initial.key_ids(),
            "Loaded signing key set"
        );
        metrics::record_refresh_success(initial.len());

        Ok(Self {
            source,
            settings,
            current: RwLock::new(Arc::new(initial)),
            refresh_gate: tokio::sync::Mutex::new(()),
            attempts: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
            last_error: Mutex::new(None),
        })
    }

    /// Current snapshot. Never blocks on a refresh in progress.
    pub fn key_set(&self) -> Arc<KeySet> {
        self.current.read().clone()
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Fetch a new key set and swap it in
    ///
    /// On failure the previous set stays in place and the error is returned
    /// for logging; request validation is unaffected.
    pub async fn refresh(&self) -> Result<Arc<KeySet>, KeySetFetchError> {
        let observed = self.attempts.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;

        if self.attempts.load(Ordering::Acquire) != observed {
            debug!("Refresh completed while waiting, reusing its result");
            return match self.last_error.lock().clone() {
                Some(err) => Err(err),
                None => Ok(self.key_set()),
            };
        }

        let generation = self.key_set().generation() + 1;
        let result =
            fetch_key_set(self.source.as_ref(), self.settings.fetch_timeout, generation).await;

        let outcome = match result {
            Ok(next) => {
                let next = Arc::new(next);
                let previous = std::mem::replace(&mut *self.current.write(), next.clone());
                self.consecutive_failures.store(0, Ordering::Release);
                *self.last_error.lock() = None;

                if previous.key_ids() != next.key_ids() {
                    info!(
                        generation,
                        previous = ?previous.key_ids(),
                        current = ?next.key_ids(),
                        "Signing keys rotated"
                    );
                } else {
                    debug!(generation, "Signing key set refreshed");
                }
                metrics::record_refresh_success(next.len());
                Ok(next)
            }
            Err(err) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                let age = self.key_set().age();
                warn!(
                    consecutive_failures = failures,
                    age_secs = age.as_secs(),
                    source = %self.source.describe(),
                    "Key set refresh failed, keeping previous set: {}",
                    err
                );
                metrics::record_refresh_failure(failures);
                *self.last_error.lock() = Some(err.clone());
                Err(err)
            }
        };

        self.attempts.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Refresh only when one is due, then return the current snapshot
    pub async fn refresh_if_stale(&self) -> Arc<KeySet> {
        if self.should_refresh() {
            if let Err(err) = self.refresh().await {
                debug!("Demand refresh failed: {}", err);
            }
        }
        self.key_set()
    }

    pub fn should_refresh(&self) -> bool {
        self.should_refresh_at(Instant::now())
    }

    pub fn should_refresh_at(&self, now: Instant) -> bool {
        self.key_set().age_at(now) >= self.settings.refresh_after()
    }

    pub fn state(&self) -> CacheState {
        self.state_at(Instant::now())
    }

    pub fn state_at(&self, now: Instant) -> CacheState {
        if self.key_set().age_at(now) < self.settings.ttl {
            CacheState::Fresh
        } else {
            CacheState::StaleButUsable {
                consecutive_failures: self.consecutive_failures(),
            }
        }
    }

    /// True once the set is older than the operator's staleness ceiling
    pub fn is_degraded(&self) -> bool {
        self.is_degraded_at(Instant::now())
    }

    pub fn is_degraded_at(&self, now: Instant) -> bool {
        match self.settings.max_staleness {
            Some(ceiling) => self.key_set().age_at(now) > ceiling,
            None => false,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<KeySetFetchError> {
        self.last_error.lock().clone()
    }
}

async fn fetch_key_set(
    source: &dyn KeySetSource,
    timeout: Duration,
    generation: u64,
) -> Result<KeySet, KeySetFetchError> {
    let document = tokio::time::timeout(timeout, source.fetch())
        .await
        .map_err(|_| KeySetFetchError::Timeout(timeout))??;
    KeySet::from_document(&document, generation)
}

/// Run the periodic refresh loop until `shutdown` is cancelled
///
/// Failures are retried on the next tick.
pub fn spawn_refresh_task(
    cache: Arc<KeySetCache>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cache.settings.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; the startup fetch already happened
        ticker.tick().await;

        info!(
            interval_secs = cache.settings.check_interval.as_secs(),
            "Key set refresh task started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            metrics::record_key_set_age(cache.key_set().age());
            if !cache.should_refresh() {
                continue;
            }

            // an abandoned fetch leaves the current set and counters untouched
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Cancelled an in-flight key set refresh");
                    break;
                }
                _ = cache.refresh() => {}
            }
        }

        info!("Key set refresh task stopped");
    })
}
