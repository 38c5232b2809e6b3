// src/interception/http_interceptor.rs
//! Request primitive wrappers
//!
//! Wraps both outbound request primitives of a realm. Requests whose URL does
//! not contain the watched path go straight to the original primitive: same
//! future, same callback, nothing added. Watched requests complete normally
//! and are then patched at consumption time:
//!
//! - promise-style: the response gets a [`PatchingHook`] on its decode path
//! - callback-style: the completion is rewritten before the caller's callback
//!   runs

use crate::host::callable::{CallableMeta, HostCallable};
use crate::host::primitives::{
    CallbackPrimitive, FetchFuture, FetchPrimitive, HostError, HostRequest, XhrCallback,
    XhrCompletion,
};
use crate::host::realm::Realm;
use crate::interception::deception::DeceptionRegistry;
use crate::interception::flag_table::{FlagPatcher, FlagTable};
use crate::interception::response::PatchingHook;
use crate::interception::scanner::{ScanPolicy, Scanner};
use crate::observability::RESPONSES_PATCHED;
use crate::utils::config::InterceptionConfig;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

const FETCH_WRAPPER_SOURCE: &str =
    "async function fetch(input, init) { return watch(await target(input, init)) }";
const XHR_WRAPPER_SOURCE: &str =
    "function send(body) { this.onreadystatechange = rewrite(this.onreadystatechange); return target.call(this, body) }";

/// Shared state of every wrapper installed in one untrusted context
#[derive(Debug)]
pub struct InterceptContext {
    watched_path: String,
    scanner: Arc<Scanner>,
    table: Arc<FlagTable>,
}

impl InterceptContext {
    pub fn new(config: &InterceptionConfig, table: Arc<FlagTable>) -> Arc<Self> {
        Arc::new(Self {
            watched_path: config.watched_path.clone(),
            scanner: Arc::new(Scanner::new(ScanPolicy::from(config))),
            table,
        })
    }

    pub fn table(&self) -> &Arc<FlagTable> {
        &self.table
    }

    /// Whether a request URL is scanned
    pub fn matches(&self, url: &str) -> bool {
        url.contains(&self.watched_path)
    }

    /// Patch a successful callback-style completion in place
    pub fn rewrite_completion(&self, mut completion: XhrCompletion) -> XhrCompletion {
        if completion.status != 200 {
            return completion;
        }
        let mut value: Value = match serde_json::from_str(&completion.response_text) {
            Ok(value) => value,
            Err(e) => {
                trace!("watched completion is not structured data: {}", e);
                return completion;
            }
        };

        let outcome = self.scanner.scan(&mut value, &mut FlagPatcher::new(&self.table));
        if outcome.is_modified() {
            match serde_json::to_string(&value) {
                Ok(text) => {
                    metrics::counter!(RESPONSES_PATCHED).increment(1);
                    completion.response_text = text;
                    completion.response = Some(value);
                }
                Err(e) => trace!("re-serialization failed: {}", e),
            }
        }
        completion
    }

    fn hook(&self) -> Arc<PatchingHook> {
        Arc::new(PatchingHook::new(
            Arc::clone(&self.scanner),
            Arc::clone(&self.table),
        ))
    }
}

/// Promise-style wrapper
pub struct FetchInterceptor {
    meta: CallableMeta,
    target: Arc<dyn FetchPrimitive>,
    context: Arc<InterceptContext>,
}

impl HostCallable for FetchInterceptor {
    fn meta(&self) -> &CallableMeta {
        &self.meta
    }
}

impl FetchPrimitive for FetchInterceptor {
    fn call(&self, request: HostRequest) -> FetchFuture {
        if !self.context.matches(&request.url) {
            return self.target.call(request);
        }

        trace!("watching {} {}", request.method, request.url);
        let pending = self.target.call(request);
        let hook = self.context.hook();
        Box::pin(async move {
            let response = pending.await?;
            Ok::<_, HostError>(response.with_hook(hook))
        })
    }
}

/// Callback-style wrapper
pub struct XhrInterceptor {
    meta: CallableMeta,
    target: Arc<dyn CallbackPrimitive>,
    context: Arc<InterceptContext>,
}

impl HostCallable for XhrInterceptor {
    fn meta(&self) -> &CallableMeta {
        &self.meta
    }
}

impl CallbackPrimitive for XhrInterceptor {
    fn send(&self, request: HostRequest, on_ready: XhrCallback) {
        if !self.context.matches(&request.url) {
            return self.target.send(request, on_ready);
        }

        trace!("watching {} {}", request.method, request.url);
        let context = Arc::clone(&self.context);
        self.target.send(
            request,
            Box::new(move |completion| on_ready(context.rewrite_completion(completion))),
        );
    }
}

/// Replace both request primitives of `realm` with disguised wrappers
pub fn install_request_wrappers(
    realm: &Realm,
    registry: &DeceptionRegistry,
    context: &Arc<InterceptContext>,
) {
    let native = realm.stringify_primitive();

    let fetch = realm.fetch();
    let meta = registry.disguise(fetch.meta(), &*native, FETCH_WRAPPER_SOURCE);
    realm.set_fetch(Arc::new(FetchInterceptor {
        meta,
        target: fetch,
        context: Arc::clone(context),
    }));

    let xhr = realm.xhr();
    let meta = registry.disguise(xhr.meta(), &*native, XHR_WRAPPER_SOURCE);
    realm.set_xhr(Arc::new(XhrInterceptor {
        meta,
        target: xhr,
        context: Arc::clone(context),
    }));

    debug!("request primitives wrapped in {:?}", realm.id());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::wire::WireMessage;
    use crate::host::memory::{StaticFetch, StaticXhr};
    use hyper::StatusCode;
    use parking_lot::Mutex;

    const GRAPHQL: &str = "https://x.test/i/api/graphql/abc/UserByScreenName";
    const BODY: &str = r#"{"data":{"user":{"result":{"legacy":{"screen_name":"alice","name":"Alice"}}}}}"#;

    fn setup() -> (Arc<Realm>, Arc<FlagTable>) {
        let fetch = StaticFetch::new()
            .route("/i/api/graphql/", StatusCode::OK, BODY)
            .route("/static/", StatusCode::OK, BODY);
        let xhr = StaticXhr::new()
            .route("/i/api/graphql/", StatusCode::OK, BODY)
            .route("/static/", StatusCode::OK, BODY);
        let realm = Realm::new(Arc::new(fetch), Arc::new(xhr));
        let table = FlagTable::new();
        let registry = DeceptionRegistry::new();
        registry.install_hook(&realm);
        let context = InterceptContext::new(&InterceptionConfig::default(), Arc::clone(&table));
        install_request_wrappers(&realm, &registry, &context);
        (realm, table)
    }

    fn resolve_alice(table: &FlagTable) {
        table.apply(WireMessage::Update {
            handle: "alice".into(),
            flag: "🇩🇪".into(),
        });
    }

    #[tokio::test]
    async fn test_unwatched_request_untouched() {
        let (realm, table) = setup();
        resolve_alice(&table);
        let response = realm
            .fetch()
            .call(HostRequest::get("https://x.test/static/app.json"))
            .await
            .unwrap();
        assert!(!response.is_hooked());
        assert_eq!(response.text(), BODY);
        assert_eq!(response.json().unwrap()["data"]["user"]["result"]["legacy"]["name"], "Alice");
    }

    #[tokio::test]
    async fn test_watched_decode_and_duplicate_patched() {
        let (realm, table) = setup();
        resolve_alice(&table);
        let response = realm.fetch().call(HostRequest::get(GRAPHQL)).await.unwrap();

        let name = |v: Value| v["data"]["user"]["result"]["legacy"]["name"].clone();
        assert_eq!(name(response.json().unwrap()), "Alice 🇩🇪");
        assert_eq!(name(response.duplicate().json().unwrap()), "Alice 🇩🇪");
        assert_eq!(name(response.json().unwrap()), "Alice 🇩🇪");
        // raw body is never rewritten
        assert_eq!(response.text(), BODY);
    }

    #[tokio::test]
    async fn test_host_errors_pass_through() {
        let realm = Realm::new(Arc::new(StaticFetch::new()), Arc::new(StaticXhr::new()));
        let context = InterceptContext::new(&InterceptionConfig::default(), FlagTable::new());
        install_request_wrappers(&realm, &DeceptionRegistry::default(), &context);
        let err = realm
            .fetch()
            .call(HostRequest::get(GRAPHQL))
            .await
            .unwrap_err();
        assert!(err.0.starts_with("TypeError"));
    }

    #[test]
    fn test_xhr_completion_rewritten() {
        let (realm, table) = setup();
        resolve_alice(&table);
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        realm.xhr().send(
            HostRequest::get(GRAPHQL),
            Box::new(move |completion| *sink.lock() = Some(completion)),
        );
        let completion = seen.lock().take().unwrap();
        assert!(completion.response_text.contains("Alice 🇩🇪"));
        assert_eq!(
            completion.response.unwrap()["data"]["user"]["result"]["legacy"]["name"],
            "Alice 🇩🇪"
        );
    }

    #[test]
    fn test_xhr_unknown_handle_discovered_not_rewritten() {
        let (realm, table) = setup();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        realm.xhr().send(
            HostRequest::get(GRAPHQL),
            Box::new(move |completion| *sink.lock() = Some(completion)),
        );
        let completion = seen.lock().take().unwrap();
        assert_eq!(completion.response_text, BODY);
        assert!(completion.response.is_none());
        assert_eq!(table.queued(), vec!["alice"]);
    }

    #[test]
    fn test_wrappers_present_as_native() {
        let (realm, _table) = setup();
        let fetch = realm.fetch();
        let xhr = realm.xhr();
        assert_eq!(realm.describe(&*fetch), "function fetch() { [native code] }");
        assert_eq!(realm.describe(&*xhr), "function send() { [native code] }");
        assert_eq!(fetch.meta().name, "fetch");
        assert_eq!(fetch.meta().arity, 1);
        assert!(!fetch.meta().is_native());
    }

    #[test]
    fn test_non_success_completion_untouched() {
        let context = InterceptContext::new(&InterceptionConfig::default(), FlagTable::new());
        let completion = XhrCompletion::new(500, BODY);
        assert_eq!(context.rewrite_completion(completion.clone()), completion);
        assert!(context.table().queued().is_empty());
    }
}
