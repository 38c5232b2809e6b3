// src/channel/port.rs
//! Private duplex channel
//!
//! [`pair`] creates two connected endpoints. Each endpoint is a transferable
//! value; delivery in each direction is FIFO.

use crate::channel::wire::WireMessage;
use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// One endpoint of a private duplex channel
#[derive(Debug)]
pub struct Port {
    tx: UnboundedSender<Bytes>,
    rx: UnboundedReceiver<Bytes>,
}

/// Create a connected pair of endpoints
pub fn pair() -> (Port, Port) {
    let (a_tx, b_rx) = unbounded_channel();
    let (b_tx, a_rx) = unbounded_channel();
    (
        Port { tx: a_tx, rx: a_rx },
        Port { tx: b_tx, rx: b_rx },
    )
}

impl Port {
    pub fn split(self) -> (PortSender, PortReceiver) {
        (PortSender { tx: self.tx }, PortReceiver { rx: self.rx })
    }
}

/// Sending half; cheap to clone
#[derive(Debug, Clone)]
pub struct PortSender {
    tx: UnboundedSender<Bytes>,
}

impl PortSender {
    /// Post a message without waiting
    pub fn post(&self, message: &WireMessage) -> Result<()> {
        let frame = message.encode()?;
        self.tx
            .send(frame)
            .map_err(|_| EngineError::ChannelUnavailable)
    }

    /// Post an already-encoded frame
    pub fn post_raw(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| EngineError::ChannelUnavailable)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half
#[derive(Debug)]
pub struct PortReceiver {
    rx: UnboundedReceiver<Bytes>,
}

impl PortReceiver {
    /// Next well-formed message; `None` once the peer is gone
    pub async fn next(&mut self) -> Option<WireMessage> {
        while let Some(frame) = self.rx.recv().await {
            match WireMessage::decode(&frame) {
                Ok(message) => return Some(message),
                Err(e) => trace!("dropping frame: {}", e),
            }
        }
        None
    }
}
