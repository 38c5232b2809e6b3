// src/coordinator/session.rs
//! Per-channel service loop
//!
//! Each claimed port becomes one session. SYNC frames are handed to the
//! coordinator together with a [`Requester`] that knows how to answer on
//! this port; anything else arriving from the untrusted side is ignored.

use crate::channel::port::{Port, PortSender};
use crate::channel::wire::WireMessage;
use crate::coordinator::batcher::LookupCoordinator;
use std::sync::Arc;
use tracing::{debug, trace};
use ulid::Ulid;

/// Identity of one private channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Ulid);

impl SessionId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a terminal reply for one SYNC goes
#[derive(Debug, Clone)]
pub struct Requester {
    pub session: SessionId,
    pub sender: PortSender,
}

impl Requester {
    pub fn new(session: SessionId, sender: PortSender) -> Self {
        Self { session, sender }
    }

    /// Post a reply; a closed session is not an error
    pub fn reply(&self, message: &WireMessage) {
        if let Err(e) = self.sender.post(message) {
            trace!("session {} gone, reply dropped: {}", self.session, e);
        }
    }
}

/// Serve one claimed port until the untrusted side drops it
pub async fn serve(coordinator: Arc<LookupCoordinator>, port: Port) {
    let session = SessionId::new();
    let (sender, mut receiver) = port.split();
    debug!("session {} opened", session);

    while let Some(message) = receiver.next().await {
        match message {
            WireMessage::Sync { handle } => {
                coordinator.handle_sync(&handle, Requester::new(session, sender.clone()));
            }
            other => trace!("session {} ignoring {:?}", session, other),
        }
    }

    debug!("session {} closed", session);
}
