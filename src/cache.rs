//! Read-through roster cache with TTL and single-flight rebuild.
//!
//! The compatibility engine iterates the full politician roster on every
//! ranking pass. Reading it straight from SQLite each time would serialize
//! all rankings behind the connection mutex, so the roster is materialized
//! here as an immutable snapshot and rebuilt at most once per TTL window.
//!
//! Concurrent readers that find the snapshot stale do not each hit the
//! store: the first one installs a shared rebuild future and the rest await
//! it. Both the clock and the roster source are injected so TTL expiry and
//! single-flight collapse are testable without real time or a real store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::profile::PoliticianProfile;
use crate::store::StoreError;

/// Injectable time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where the cache loads the roster from on a miss. Implemented by the
/// SQLite store; tests substitute a counting fake.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn load_roster(&self) -> Result<Vec<PoliticianProfile>, StoreError>;
}

/// Immutable roster snapshot shared by all readers of one cache generation.
pub type RosterSnapshot = Arc<HashMap<String, PoliticianProfile>>;

type RebuildFuture = Shared<BoxFuture<'static, Result<RosterSnapshot, Arc<StoreError>>>>;

struct CacheState {
    snapshot: RosterSnapshot,
    /// None until the first successful load, and again after invalidation.
    loaded_at: Option<DateTime<Utc>>,
    inflight: Option<RebuildFuture>,
}

pub struct RosterCache {
    source: Arc<dyn RosterSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl RosterCache {
    pub fn new(source: Arc<dyn RosterSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            state: Arc::new(Mutex::new(CacheState {
                snapshot: Arc::new(HashMap::new()),
                loaded_at: None,
                inflight: None,
            })),
        }
    }

    /// Current roster snapshot, rebuilding first if the cache is stale.
    pub async fn snapshot(&self) -> Result<RosterSnapshot, Arc<StoreError>> {
        let rebuild = {
            let mut state = lock_state(&self.state);
            if let Some(loaded_at) = state.loaded_at {
                if self.clock.now() - loaded_at < self.ttl {
                    return Ok(Arc::clone(&state.snapshot));
                }
            }
            match &state.inflight {
                Some(fut) => fut.clone(),
                None => {
                    let fut = self.spawn_rebuild();
                    state.inflight = Some(fut.clone());
                    fut
                }
            }
        };
        rebuild.await
    }

    /// Force the next read to rebuild, and drop the named entry so readers
    /// of the current snapshot generation cannot observe it either.
    pub fn invalidate(&self, politician_id: &str) {
        let mut state = lock_state(&self.state);
        let mut map = (*state.snapshot).clone();
        map.remove(politician_id);
        state.snapshot = Arc::new(map);
        state.loaded_at = None;
    }

    /// Rebuild immediately regardless of TTL, joining any rebuild already
    /// in flight.
    pub async fn force_refresh(&self) -> Result<RosterSnapshot, Arc<StoreError>> {
        let rebuild = {
            let mut state = lock_state(&self.state);
            state.loaded_at = None;
            match &state.inflight {
                Some(fut) => fut.clone(),
                None => {
                    let fut = self.spawn_rebuild();
                    state.inflight = Some(fut.clone());
                    fut
                }
            }
        };
        rebuild.await
    }

    fn spawn_rebuild(&self) -> RebuildFuture {
        let source = Arc::clone(&self.source);
        let clock = Arc::clone(&self.clock);
        let state = Arc::clone(&self.state);
        async move {
            let result = source.load_roster().await;
            let mut guard = lock_state(&state);
            guard.inflight = None;
            match result {
                Ok(roster) => {
                    let map: HashMap<String, PoliticianProfile> =
                        roster.into_iter().map(|p| (p.id.clone(), p)).collect();
                    let snapshot: RosterSnapshot = Arc::new(map);
                    guard.snapshot = Arc::clone(&snapshot);
                    guard.loaded_at = Some(clock.now());
                    Ok(snapshot)
                }
                Err(e) => Err(Arc::new(e)),
            }
        }
        .boxed()
        .shared()
    }
}

fn lock_state(state: &Mutex<CacheState>) -> std::sync::MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
