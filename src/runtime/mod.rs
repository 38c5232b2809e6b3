// src/runtime/mod.rs
//! Context bootstrap
//!
//! - **Untrusted**: installs interception into a realm and starts the handoff
//! - **Supervisor**: loads state, builds the coordinator, answers handoffs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────── untrusted ────────────┐          ┌──────────── trusted ─────────────┐
//! │ Realm ─ wrappers ─ FlagTable      │          │ Responder ─ session ─ Coordinator│
//! │                      │            │  public  │                          │       │
//! │                  Initiator ───────┼── bus ──▶│ claim(port)        lookup/store  │
//! │                      ▲            │          │                          │       │
//! │                      └────────────┼── port ──┼──────── SYNC/UPDATE/RETRY┘       │
//! └───────────────────────────────────┘          └──────────────────────────────────┘
//! ```

pub mod supervisor;
pub mod untrusted;

pub use supervisor::Supervisor;
pub use untrusted::Untrusted;
