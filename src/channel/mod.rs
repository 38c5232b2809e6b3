// src/channel/mod.rs
//! Covert channel between the untrusted and trusted contexts
//!
//! - **Wire**: opaque frames for SYNC / UPDATE / RETRY
//! - **Port**: private duplex endpoint pair
//! - **Persona**: disguises for the public handoff broadcast
//! - **Bus**: the public broadcast surface
//! - **Handshake**: initiator (untrusted) and responder (trusted)

pub mod bus;
pub mod handshake;
pub mod persona;
pub mod port;
pub mod wire;

pub use bus::{Announcement, PublicBus};
pub use handshake::{Initiator, Responder};
pub use persona::HandshakePersona;
pub use port::{Port, PortReceiver, PortSender};
pub use wire::WireMessage;
