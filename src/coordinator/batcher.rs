// src/coordinator/batcher.rs
//! Lookup coordination
//!
//! Trusted-side handling of SYNC requests:
//!
//! - cached handles are answered immediately with UPDATE
//! - unknown handles join a batch; the first one schedules a flush after a
//!   delay drawn uniformly from the jitter window
//! - a flush issues one lookup per distinct handle and marks it in flight;
//!   SYNCs for an in-flight handle wait for that lookup instead of starting
//!   another one
//! - a lookup's outcome is answered to every requester of the handle, and the
//!   in-flight mark is cleared whatever happened
//!
//! All bookkeeping sits behind one synchronous lock that is never held across
//! an await.

use crate::channel::wire::WireMessage;
use crate::coordinator::flags::resolve_flag;
use crate::coordinator::lookup::LookupService;
use crate::coordinator::session::Requester;
use crate::coordinator::store::{FlagMap, FlagStore, StoredFlag};
use crate::observability::{CACHE_HITS, LOOKUPS_FAILED, LOOKUPS_ISSUED};
use crate::utils::config::CoordinatorConfig;
use crate::utils::errors::Result;
use crate::utils::normalize_handle;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct CoordinatorState {
    cache: FlagMap,
    batch: BTreeMap<String, Vec<Requester>>,
    flush_scheduled: bool,
    in_flight: HashMap<String, Vec<Requester>>,
}

/// Adds `requester` unless its session already waits on this handle
fn enlist(requesters: &mut Vec<Requester>, requester: Requester) {
    if !requesters.iter().any(|r| r.session == requester.session) {
        requesters.push(requester);
    }
}

fn reply_all(requesters: &[Requester], message: &WireMessage) {
    for requester in requesters {
        requester.reply(message);
    }
}

/// Trusted-side resolver shared by every session
pub struct LookupCoordinator {
    config: CoordinatorConfig,
    lookup: Arc<dyn LookupService>,
    store: FlagStore,
    state: Mutex<CoordinatorState>,
    persist: tokio::sync::Mutex<()>,
}

impl LookupCoordinator {
    /// Create a new coordinator, seeding its cache from the store
    pub async fn new(
        config: CoordinatorConfig,
        lookup: Arc<dyn LookupService>,
        store: FlagStore,
    ) -> Result<Arc<Self>> {
        let cache = store.load().await?;
        info!("lookup coordinator ready with {} cached flags", cache.len());

        Ok(Arc::new(Self {
            config,
            lookup,
            store,
            state: Mutex::new(CoordinatorState {
                cache,
                ..CoordinatorState::default()
            }),
            persist: tokio::sync::Mutex::new(()),
        }))
    }

    /// Handle one SYNC; every call leads to exactly one reply to `requester`
    pub fn handle_sync(self: &Arc<Self>, raw_handle: &str, requester: Requester) {
        let handle = normalize_handle(raw_handle);
        if handle.is_empty() {
            requester.reply(&WireMessage::Retry { handle });
            return;
        }

        let mut state = self.state.lock();

        if let Some(entry) = state.cache.get(&handle) {
            metrics::counter!(CACHE_HITS).increment(1);
            let update = WireMessage::Update {
                handle: handle.clone(),
                flag: entry.flag.clone(),
            };
            drop(state);
            requester.reply(&update);
            return;
        }

        if let Some(waiters) = state.in_flight.get_mut(&handle) {
            debug!("{} already in flight; requester joins", handle);
            enlist(waiters, requester);
            return;
        }

        enlist(state.batch.entry(handle).or_default(), requester);
        if !state.flush_scheduled {
            state.flush_scheduled = true;
            let delay = Duration::from_millis(
                rand::thread_rng().gen_range(self.config.jitter_window()),
            );
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                coordinator.flush();
            });
        }
    }

    /// Issue one lookup per distinct batched handle
    fn flush(self: &Arc<Self>) {
        let mut started = Vec::new();
        {
            let mut state = self.state.lock();
            state.flush_scheduled = false;
            let batch = std::mem::take(&mut state.batch);

            for (handle, requesters) in batch {
                if let Some(entry) = state.cache.get(&handle) {
                    // resolved by an earlier lookup while this batch waited
                    let update = WireMessage::Update {
                        handle: handle.clone(),
                        flag: entry.flag.clone(),
                    };
                    reply_all(&requesters, &update);
                    continue;
                }
                match state.in_flight.get_mut(&handle) {
                    Some(waiters) => {
                        for requester in requesters {
                            enlist(waiters, requester);
                        }
                    }
                    None => {
                        state.in_flight.insert(handle.clone(), requesters);
                        started.push(handle);
                    }
                }
            }
        }

        debug!("flushing batch: {} lookups", started.len());
        for handle in started {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move { coordinator.resolve(handle).await });
        }
    }

    async fn resolve(self: Arc<Self>, handle: String) {
        let in_flight = InFlight {
            coordinator: &*self,
            handle: &handle,
            settled: false,
        };

        metrics::counter!(LOOKUPS_ISSUED).increment(1);
        let reply = match self.lookup.lookup(&handle).await {
            Ok(reply) => match reply.resolved_location() {
                Some(location) => {
                    let entry = StoredFlag::new(Some(location.to_string()), resolve_flag(Some(location)));
                    let flag = self.record(&handle, entry);
                    self.persist().await;
                    WireMessage::Update {
                        handle: handle.clone(),
                        flag,
                    }
                }
                None => {
                    debug!("{} not resolved yet (processed: {})", handle, reply.processed);
                    WireMessage::Retry {
                        handle: handle.clone(),
                    }
                }
            },
            Err(e) => {
                metrics::counter!(LOOKUPS_FAILED).increment(1);
                debug!("lookup for {} failed: {}", handle, e);
                WireMessage::Retry {
                    handle: handle.clone(),
                }
            }
        };

        in_flight.settle(&reply);
    }

    /// Write-once insert; returns the flag that ends up cached
    fn record(&self, handle: &str, entry: StoredFlag) -> String {
        let mut state = self.state.lock();
        state
            .cache
            .entry(handle.to_string())
            .or_insert(entry)
            .flag
            .clone()
    }

    /// Rewrite the whole store from a snapshot taken under the persist lock
    async fn persist(&self) {
        let _writer = self.persist.lock().await;
        let snapshot = self.state.lock().cache.clone();
        if let Err(e) = self.store.replace(&snapshot).await {
            warn!("failed to persist flags: {}", e);
        }
    }

    fn take_waiters(&self, handle: &str) -> Vec<Requester> {
        self.state.lock().in_flight.remove(handle).unwrap_or_default()
    }

    pub fn cached_flag(&self, handle: &str) -> Option<String> {
        self.state
            .lock()
            .cache
            .get(&normalize_handle(handle))
            .map(|entry| entry.flag.clone())
    }

    pub fn is_in_flight(&self, handle: &str) -> bool {
        self.state.lock().in_flight.contains_key(&normalize_handle(handle))
    }

    pub fn cache_len(&self) -> usize {
        self.state.lock().cache.len()
    }

    pub fn store(&self) -> &FlagStore {
        &self.store
    }
}

impl std::fmt::Debug for LookupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCoordinator")
            .field("cached", &self.cache_len())
            .finish()
    }
}

/// Clears the in-flight mark exactly once; RETRY if dropped unsettled
struct InFlight<'a> {
    coordinator: &'a LookupCoordinator,
    handle: &'a str,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, reply: &WireMessage) {
        self.settled = true;
        let waiters = self.coordinator.take_waiters(self.handle);
        reply_all(&waiters, reply);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let waiters = self.coordinator.take_waiters(self.handle);
        reply_all(
            &waiters,
            &WireMessage::Retry {
                handle: self.handle.to_string(),
            },
        );
    }
}
