// src/host/primitives.rs
//! Host request, response and introspection primitives
//!
//! Two outbound request primitives exist: a promise-style one
//! ([`FetchPrimitive`]) and a callback-style one ([`CallbackPrimitive`]).
//! Responses of the promise-style primitive are consumed through accessors on
//! [`HostResponse`], which is where a consumption hook can sit.

use crate::host::callable::{CallableMeta, HostCallable};
use crate::host::realm::{FrameId, Realm};
use bytes::Bytes;
use futures::future::BoxFuture;
use hyper::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Error as the host itself would report it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

pub type HostResult<T> = std::result::Result<T, HostError>;

/// Outbound request issued by host code
#[derive(Debug, Clone)]
pub struct HostRequest {
    pub method: Method,
    pub url: String,
    pub body: Bytes,
}

impl HostRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: Bytes::new(),
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: body.into(),
        }
    }
}

/// Intercepts the decode accessor of a response
pub trait ConsumptionHook: Send + Sync {
    fn decode(&self, raw: &Bytes) -> HostResult<Value>;
}

/// Response returned by the promise-style primitive
#[derive(Clone)]
pub struct HostResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    hook: Option<Arc<dyn ConsumptionHook>>,
}

impl HostResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            hook: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Attach a consumption hook; duplicates share it
    pub fn with_hook(mut self, hook: Arc<dyn ConsumptionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body, never rewritten
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as structured data
    pub fn json(&self) -> HostResult<Value> {
        match &self.hook {
            Some(hook) => hook.decode(&self.body),
            None => decode_native(&self.body),
        }
    }

    /// Duplicate the response; the copy decodes through the same hook
    pub fn duplicate(&self) -> HostResponse {
        self.clone()
    }

    pub fn is_hooked(&self) -> bool {
        self.hook.is_some()
    }
}

impl fmt::Debug for HostResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostResponse")
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .field("hooked", &self.hook.is_some())
            .finish()
    }
}

/// Decode exactly as the host does without interception
pub fn decode_native(raw: &Bytes) -> HostResult<Value> {
    serde_json::from_slice(raw).map_err(|e| HostError(format!("SyntaxError: {}", e)))
}

/// Completion delivered to a callback-style request
#[derive(Debug, Clone, PartialEq)]
pub struct XhrCompletion {
    pub status: u16,
    pub response_text: String,
    pub response: Option<Value>,
}

impl XhrCompletion {
    pub fn new(status: u16, response_text: impl Into<String>) -> Self {
        Self {
            status,
            response_text: response_text.into(),
            response: None,
        }
    }
}

pub type XhrCallback = Box<dyn FnOnce(XhrCompletion) + Send>;

pub type FetchFuture = BoxFuture<'static, HostResult<HostResponse>>;

/// Promise-style request primitive
pub trait FetchPrimitive: HostCallable {
    fn call(&self, request: HostRequest) -> FetchFuture;
}

/// Callback/event-style request primitive
pub trait CallbackPrimitive: HostCallable {
    fn send(&self, request: HostRequest, on_ready: XhrCallback);
}

/// The realm's single "stringify a callable" primitive
pub trait StringifyPrimitive: HostCallable {
    fn stringify(&self, subject: &CallableMeta) -> String;
}

/// Accessor exposing a nested realm
pub trait FrameAccessor: HostCallable {
    fn content(&self, owner: &Realm, frame: FrameId) -> Option<Arc<Realm>>;
}

/// Stringify primitive every realm starts with
pub struct NativeStringify {
    meta: CallableMeta,
}

impl NativeStringify {
    pub fn new() -> Self {
        Self {
            meta: CallableMeta::native("toString", 0),
        }
    }
}

impl Default for NativeStringify {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCallable for NativeStringify {
    fn meta(&self) -> &CallableMeta {
        &self.meta
    }
}

impl StringifyPrimitive for NativeStringify {
    fn stringify(&self, subject: &CallableMeta) -> String {
        subject.native_string()
    }
}

/// Frame accessor every realm starts with
pub struct NativeFrameAccessor {
    meta: CallableMeta,
}

impl NativeFrameAccessor {
    pub fn new() -> Self {
        Self {
            meta: CallableMeta::native("get contentWindow", 0),
        }
    }
}

impl Default for NativeFrameAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCallable for NativeFrameAccessor {
    fn meta(&self) -> &CallableMeta {
        &self.meta
    }
}

impl FrameAccessor for NativeFrameAccessor {
    fn content(&self, owner: &Realm, frame: FrameId) -> Option<Arc<Realm>> {
        owner.raw_frame(frame)
    }
}
