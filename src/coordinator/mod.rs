// src/coordinator/mod.rs
//! Trusted-side lookup coordinator
//!
//! - **Flags**: location string to flag glyph
//! - **Lookup**: client for the external lookup service
//! - **Store**: SQLite-backed persistent flag map
//! - **Batcher**: dedup, jittered batching, in-flight tracking, replies
//! - **Session**: service loop for one claimed private channel

pub mod batcher;
pub mod flags;
pub mod lookup;
pub mod session;
pub mod store;

pub use batcher::LookupCoordinator;
pub use flags::{resolve_flag, DEFAULT_FLAG};
pub use lookup::{HttpLookup, LookupReply, LookupService};
pub use session::{Requester, SessionId};
pub use store::{FlagMap, FlagStore, StoredFlag};
