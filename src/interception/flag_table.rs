// src/interception/flag_table.rs
//! Untrusted-side flag state
//!
//! Holds the flag cache, the pending set, the discovery queue and the link to
//! the private channel behind one lock, so that checking a handle, marking it
//! pending and emitting its discovery happen without any yield in between.
//!
//! Per handle: `UNSEEN -> PENDING` on discovery, `PENDING -> RESOLVED` on
//! UPDATE, `PENDING -> UNSEEN` on RETRY. When the private channel goes away,
//! handles still awaiting a reply are queued again for the next channel.

use crate::channel::port::{PortReceiver, PortSender};
use crate::channel::wire::WireMessage;
use crate::interception::scanner::IdentityVisitor;
use crate::observability::DISCOVERIES_EMITTED;
use crate::utils::normalize_handle;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// What [`FlagTable::observe`] found for a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Resolved; carries the flag glyph
    Known(String),
    /// First sighting; a SYNC was posted
    Sent,
    /// First sighting; queued until the channel exists
    Queued,
    /// Already awaiting resolution
    Pending,
}

#[derive(Debug, Default)]
struct TableState {
    flags: HashMap<String, String>,
    pending: HashSet<String>,
    queue: VecDeque<String>,
    link: Option<PortSender>,
}

impl TableState {
    /// Forget the link and queue every pending handle that was already sent
    fn drop_link(&mut self) -> usize {
        self.link = None;
        let queued: HashSet<&String> = self.queue.iter().collect();
        let mut orphaned: Vec<String> = self
            .pending
            .iter()
            .filter(|handle| !queued.contains(handle))
            .cloned()
            .collect();
        // HashSet order is arbitrary; keep the requeue deterministic
        orphaned.sort();
        let count = orphaned.len();
        self.queue.extend(orphaned);
        count
    }
}

/// Flag cache, pending set and discovery queue of one untrusted context
#[derive(Debug, Default)]
pub struct FlagTable {
    state: Mutex<TableState>,
    generation: AtomicU64,
}

impl FlagTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn flag_for(&self, handle: &str) -> Option<String> {
        self.state.lock().flags.get(handle).cloned()
    }

    /// Look a handle up; mark and report it if it has never been seen
    pub fn observe(&self, handle: &str) -> Observation {
        let mut state = self.state.lock();

        if let Some(flag) = state.flags.get(handle) {
            return Observation::Known(flag.clone());
        }
        if !state.pending.insert(handle.to_string()) {
            return Observation::Pending;
        }

        metrics::counter!(DISCOVERIES_EMITTED).increment(1);
        let sync = WireMessage::Sync {
            handle: handle.to_string(),
        };
        match state.link.as_ref().map(|link| link.post(&sync).is_ok()) {
            Some(true) => {
                trace!("discovered {}", handle);
                return Observation::Sent;
            }
            Some(false) => {
                let requeued = state.drop_link();
                debug!("private channel closed; {} discoveries queued", requeued);
                return Observation::Queued;
            }
            None => {}
        }
        state.queue.push_back(handle.to_string());
        Observation::Queued
    }

    /// Apply a reply from the trusted side
    pub fn apply(&self, message: WireMessage) {
        let mut state = self.state.lock();
        match message {
            WireMessage::Update { handle, flag } => {
                let handle = normalize_handle(&handle);
                state.pending.remove(&handle);
                if !state.flags.contains_key(&handle) {
                    debug!("resolved {} -> {}", handle, flag);
                    state.flags.insert(handle, flag);
                    self.generation.fetch_add(1, Ordering::SeqCst);
                }
            }
            WireMessage::Retry { handle } => {
                let handle = normalize_handle(&handle);
                trace!("retry {}", handle);
                state.pending.remove(&handle);
            }
            WireMessage::Sync { .. } => {}
        }
    }

    /// Bind the private channel and flush queued discoveries in order
    pub fn connect(&self, link: PortSender) -> usize {
        let mut state = self.state.lock();
        let mut flushed = 0;
        while let Some(handle) = state.queue.pop_front() {
            let sync = WireMessage::Sync {
                handle: handle.clone(),
            };
            if link.post(&sync).is_err() {
                state.queue.push_front(handle);
                return flushed;
            }
            flushed += 1;
        }
        state.link = Some(link);
        debug!("private channel bound, flushed {} discoveries", flushed);
        flushed
    }

    /// Apply replies arriving on `receiver` until the channel closes
    pub fn listen(self: &Arc<Self>, mut receiver: PortReceiver) -> JoinHandle<()> {
        let table = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = receiver.next().await {
                table.apply(message);
            }
            let requeued = table.state.lock().drop_link();
            debug!(
                "private channel closed by supervisor; {} unanswered discoveries queued",
                requeued
            );
        })
    }

    /// Bumped on every new resolution
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().link.is_some()
    }

    pub fn is_pending(&self, handle: &str) -> bool {
        self.state.lock().pending.contains(handle)
    }

    pub fn queued(&self) -> Vec<String> {
        self.state.lock().queue.iter().cloned().collect()
    }

    pub fn resolved_count(&self) -> usize {
        self.state.lock().flags.len()
    }
}

/// Visitor that appends known flags and reports unknown handles
pub struct FlagPatcher<'a> {
    table: &'a FlagTable,
}

impl<'a> FlagPatcher<'a> {
    pub fn new(table: &'a FlagTable) -> Self {
        Self { table }
    }
}

impl IdentityVisitor for FlagPatcher<'_> {
    fn visit(&mut self, id: &str, display: &mut String) -> bool {
        let handle = normalize_handle(id);
        if handle.is_empty() {
            return false;
        }
        match self.table.observe(&handle) {
            Observation::Known(flag) if !display.contains(&flag) => {
                display.push(' ');
                display.push_str(&flag);
                true
            }
            _ => false,
        }
    }
}
