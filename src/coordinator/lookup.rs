// src/coordinator/lookup.rs
//! External lookup service client
//!
//! `GET <lookup_url>?username=<handle>` answering
//! `{ "username": ..., "processed": bool, "location": string | null }`.
//! Anything other than a 2xx with a well-formed body is a
//! [`EngineError::NetworkFailure`] or [`EngineError::ParseFailure`]; the
//! coordinator turns both into RETRY.

use crate::utils::config::CoordinatorConfig;
use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Empty};
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Body returned by the lookup service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupReply {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub location: Option<String>,
}

impl LookupReply {
    /// The location, if the service has finished with this handle and found one
    pub fn resolved_location(&self) -> Option<&str> {
        if !self.processed {
            return None;
        }
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|location| !location.is_empty())
    }
}

/// Seam for the external lookup call
pub trait LookupService: Send + Sync {
    fn lookup(&self, handle: &str) -> BoxFuture<'static, Result<LookupReply>>;
}

/// hyper-based client for the lookup service
#[derive(Clone)]
pub struct HttpLookup {
    base: Url,
    timeout: Duration,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HttpLookup {
    /// Create a new lookup client from coordinator settings
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let base = Url::parse(&config.lookup_url).map_err(|e| {
            EngineError::ConfigError(format!("invalid lookup url {}: {}", config.lookup_url, e))
        })?;
        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            base,
            timeout: config.request_timeout(),
            client,
        })
    }

    fn url_for(&self, handle: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("username", handle);
        url
    }

    async fn fetch(
        client: Client<HttpConnector, Empty<Bytes>>,
        url: Url,
    ) -> Result<LookupReply> {
        let request = Request::get(url.as_str())
            .body(Empty::<Bytes>::new())
            .map_err(|e| EngineError::NetworkFailure(format!("request build error: {}", e)))?;

        let response = client
            .request(request)
            .await
            .map_err(|e| EngineError::NetworkFailure(format!("lookup request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::NetworkFailure(format!(
                "lookup service answered {}",
                status
            )));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| EngineError::NetworkFailure(format!("response body error: {}", e)))?
            .to_bytes();

        serde_json::from_slice(&body)
            .map_err(|e| EngineError::ParseFailure(format!("lookup body: {}", e)))
    }
}

impl LookupService for HttpLookup {
    fn lookup(&self, handle: &str) -> BoxFuture<'static, Result<LookupReply>> {
        let url = self.url_for(handle);
        let client = self.client.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            debug!("lookup GET {}", url);
            tokio::time::timeout(timeout, Self::fetch(client, url))
                .await
                .map_err(|_| {
                    EngineError::NetworkFailure(format!("lookup timed out after {:?}", timeout))
                })?
        })
    }
}

impl std::fmt::Debug for HttpLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLookup")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    /// Serve `handler` on an ephemeral port
    async fn serve<F>(handler: F) -> SocketAddr
    where
        F: Fn(Request<Incoming>) -> Response<Full<Bytes>> + Send + Sync + Copy + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let service =
                        service_fn(move |req| async move { Ok::<_, Infallible>(handler(req)) });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });
        addr
    }

    fn client(addr: SocketAddr, timeout_ms: u64) -> HttpLookup {
        HttpLookup::new(&CoordinatorConfig {
            lookup_url: format!("http://{}/met", addr),
            request_timeout_ms: timeout_ms,
            ..CoordinatorConfig::default()
        })
        .unwrap()
    }

    fn echo_location(req: Request<Incoming>) -> Response<Full<Bytes>> {
        let query = req.uri().query().unwrap_or_default().to_string();
        let body = format!(
            r#"{{"username":"{}","processed":true,"location":"Berlin, Germany"}}"#,
            query.trim_start_matches("username=")
        );
        Response::new(Full::new(Bytes::from(body)))
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let addr = serve(echo_location).await;
        let reply = client(addr, 2000).lookup("alice").await.unwrap();
        assert_eq!(reply.username, "alice");
        assert_eq!(reply.resolved_location(), Some("Berlin, Germany"));
    }

    #[tokio::test]
    async fn test_server_error_is_network_failure() {
        let addr = serve(|_| {
            let mut response = Response::new(Full::new(Bytes::from_static(b"boom")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
        .await;
        let err = client(addr, 2000).lookup("bob").await.unwrap_err();
        assert!(matches!(err, EngineError::NetworkFailure(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_failure() {
        let addr = serve(|_| Response::new(Full::new(Bytes::from_static(b"<html>")))).await;
        let err = client(addr, 2000).lookup("bob").await.unwrap_err();
        assert!(matches!(err, EngineError::ParseFailure(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = client(addr, 2000).lookup("bob").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_query_is_encoded() {
        let lookup = HttpLookup::new(&CoordinatorConfig::default()).unwrap();
        assert_eq!(
            lookup.url_for("a b&c").as_str(),
            "http://127.0.0.1:5000/met?username=a+b%26c"
        );
    }

    #[test]
    fn test_unprocessed_reply_unresolved() {
        let reply: LookupReply =
            serde_json::from_str(r#"{"username":"x","processed":false,"location":"Japan"}"#)
                .unwrap();
        assert_eq!(reply.resolved_location(), None);

        let reply: LookupReply =
            serde_json::from_str(r#"{"username":"x","processed":true,"location":null}"#).unwrap();
        assert_eq!(reply.resolved_location(), None);
    }
}
