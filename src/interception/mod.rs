// src/interception/mod.rs
//! Untrusted-side interception layer
//!
//! Everything that lives inside the host application's execution context:
//!
//! - **Deception**: presented-identity registry and the introspection hook
//! - **Scanner**: depth-bounded, key-filtered deep scan of decoded bodies
//! - **Flag Table**: flag cache, pending set and discovery queue
//! - **HTTP Interceptor**: promise-style and callback-style request wrappers
//! - **Response**: consumption hook patching decoded bodies
//! - **Realm Guard**: propagation into nested realms
//!
//! # Architecture
//!
//! ```text
//! Host Code (Unmodified)
//!     │
//!     ├─ fetch(url)  → FetchInterceptor → original fetch → response.json() → PatchingHook
//!     ├─ xhr.send()  → XhrInterceptor   → original send  → rewritten completion
//!     ├─ toString()  → IntrospectionHook → registered lie | native
//!     └─ frame.contentWindow → GuardedFrameAccessor → RealmGuard::protect
//!                                   │
//!                   unknown handle  ▼
//!                              FlagTable ──SYNC──▶ private channel
//! ```

pub mod deception;
pub mod flag_table;
pub mod http_interceptor;
pub mod realm_guard;
pub mod response;
pub mod scanner;

// Re-export commonly used types
pub use deception::{DeceptionRegistry, IntrospectionHook};
pub use flag_table::{FlagPatcher, FlagTable, Observation};
pub use http_interceptor::{install_request_wrappers, FetchInterceptor, InterceptContext, XhrInterceptor};
pub use realm_guard::RealmGuard;
pub use response::PatchingHook;
pub use scanner::{IdentityVisitor, ScanOutcome, ScanPolicy, Scanner};
