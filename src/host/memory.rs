// src/host/memory.rs
//! In-memory host primitives
//!
//! Stand-ins for a real host's request primitives: responses are served from
//! a route table keyed by URL substring, and every call is counted.

use crate::host::callable::{CallableMeta, HostCallable};
use crate::host::primitives::{
    CallbackPrimitive, FetchFuture, FetchPrimitive, HostError, HostRequest, HostResponse,
    XhrCallback, XhrCompletion,
};
use bytes::Bytes;
use hyper::StatusCode;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct Route {
    pattern: String,
    status: StatusCode,
    body: Bytes,
}

#[derive(Debug, Default)]
struct RouteTable {
    routes: Mutex<Vec<Route>>,
}

impl RouteTable {
    fn add(&self, pattern: &str, status: StatusCode, body: Bytes) {
        self.routes.lock().push(Route {
            pattern: pattern.to_string(),
            status,
            body,
        });
    }

    fn lookup(&self, url: &str) -> Option<Route> {
        self.routes
            .lock()
            .iter()
            .find(|route| url.contains(&route.pattern))
            .cloned()
    }
}

/// Promise-style primitive backed by a route table
pub struct StaticFetch {
    meta: CallableMeta,
    routes: RouteTable,
    calls: AtomicUsize,
}

impl StaticFetch {
    pub fn new() -> Self {
        Self {
            meta: CallableMeta::native("fetch", 1),
            routes: RouteTable::default(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Serve `body` with `status` for URLs containing `pattern`
    pub fn route(self, pattern: &str, status: StatusCode, body: impl Into<Bytes>) -> Self {
        self.routes.add(pattern, status, body.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticFetch {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCallable for StaticFetch {
    fn meta(&self) -> &CallableMeta {
        &self.meta
    }
}

impl FetchPrimitive for StaticFetch {
    fn call(&self, request: HostRequest) -> FetchFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.routes.lookup(&request.url) {
            Some(route) => Ok(HostResponse::new(route.status, route.body)),
            None => Err(HostError(format!("TypeError: Failed to fetch {}", request.url))),
        };
        Box::pin(async move { result })
    }
}

/// Callback-style primitive backed by a route table; completes synchronously
pub struct StaticXhr {
    meta: CallableMeta,
    routes: RouteTable,
    calls: AtomicUsize,
}

impl StaticXhr {
    pub fn new() -> Self {
        Self {
            meta: CallableMeta::native("send", 0),
            routes: RouteTable::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn route(self, pattern: &str, status: StatusCode, body: impl Into<Bytes>) -> Self {
        self.routes.add(pattern, status, body.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticXhr {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCallable for StaticXhr {
    fn meta(&self) -> &CallableMeta {
        &self.meta
    }
}

impl CallbackPrimitive for StaticXhr {
    fn send(&self, request: HostRequest, on_ready: XhrCallback) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let completion = match self.routes.lookup(&request.url) {
            Some(route) => XhrCompletion::new(
                route.status.as_u16(),
                String::from_utf8_lossy(&route.body).into_owned(),
            ),
            None => XhrCompletion::new(0, ""),
        };
        on_ready(completion);
    }
}
