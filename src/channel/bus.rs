// src/channel/bus.rs
//! Public broadcast surface
//!
//! Every subscriber (host code included) sees every announcement. An
//! announcement may carry one transferable port; [`Announcement::claim`]
//! hands it to exactly one caller.

use crate::channel::port::Port;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A message on the public surface
#[derive(Debug)]
pub struct Announcement {
    pub source: String,
    pub payload: Value,
    transfer: Mutex<Option<Port>>,
    claimed: Mutex<bool>,
}

impl Announcement {
    pub fn new(source: impl Into<String>, payload: Value) -> Self {
        Self {
            source: source.into(),
            payload,
            transfer: Mutex::new(None),
            claimed: Mutex::new(false),
        }
    }

    /// Attach a transferable endpoint
    pub fn with_transfer(self, port: Port) -> Self {
        *self.transfer.lock() = Some(port);
        self
    }

    pub fn has_transfer(&self) -> bool {
        self.transfer.lock().is_some()
    }

    /// Take the attached endpoint; only the first caller gets it
    pub fn claim(&self) -> Option<Port> {
        let mut transfer = self.transfer.lock();
        let port = transfer.take();
        if port.is_some() {
            *self.claimed.lock() = true;
        }
        port
    }

    /// Withdraw an unclaimed endpoint; `false` if someone already claimed it
    pub fn retract(&self) -> bool {
        self.transfer.lock().take().is_some()
    }

    pub fn is_claimed(&self) -> bool {
        *self.claimed.lock()
    }
}

/// Broadcast surface shared by every context
#[derive(Debug, Clone)]
pub struct PublicBus {
    tx: broadcast::Sender<Arc<Announcement>>,
}

impl PublicBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Announcement>> {
        self.tx.subscribe()
    }

    /// Publish to every current subscriber; returns how many saw it
    pub fn publish(&self, announcement: Arc<Announcement>) -> usize {
        self.tx.send(announcement).unwrap_or(0)
    }
}

impl Default for PublicBus {
    fn default() -> Self {
        Self::new(64)
    }
}
