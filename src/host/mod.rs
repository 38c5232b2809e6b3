// src/host/mod.rs
//! Host environment model
//!
//! The host application's execution contexts and the primitives they expose:
//!
//! - **Callable**: identity and reflection-visible metadata
//! - **Primitives**: request, response, stringify and frame accessor contracts
//! - **Realm**: one execution context with swappable primitive slots
//! - **Memory**: route-table backed request primitives

pub mod callable;
pub mod memory;
pub mod primitives;
pub mod realm;

pub use callable::{CallableId, CallableMeta, CallableSource, HostCallable};
pub use primitives::{
    CallbackPrimitive, ConsumptionHook, FetchPrimitive, FrameAccessor, HostError, HostRequest,
    HostResponse, StringifyPrimitive, XhrCallback, XhrCompletion,
};
pub use realm::{FrameId, Realm, RealmId};
