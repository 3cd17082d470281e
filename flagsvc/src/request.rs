//! The per-request capabilities the SDK consumes.
//!
//! Any request type can be used with [`FlagSvc`](crate::FlagSvc) by
//! implementing [`RequestCtx`]. Two implementations are provided: the owned
//! [`RequestContext`] and `http::Request<B>`, which keeps its store and
//! deadline in request extensions.

use http::header::HOST;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Capabilities of an incoming request used to resolve flags.
pub trait RequestCtx: Send + Sync {
    /// Host name of the incoming request, without port. May be empty.
    fn host(&self) -> &str;

    /// Deadline and cancellation of the request. Fetches issued on behalf of
    /// the request are aborted when either fires.
    fn deadline_context(&self) -> DeadlineContext;

    /// Value stored under `key` in the per-request store.
    fn get(&self, key: &str) -> Option<&Value>;

    fn set(&mut self, key: &str, value: Value);
}

/// Request deadline plus an explicit cancellation token.
#[derive(Clone, Debug, Default)]
pub struct DeadlineContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl DeadlineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Completes once the deadline has passed or the token is cancelled.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {},
                    _ = self.token.cancelled() => {},
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

/// Small string-keyed store shared between middlewares and handlers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestValues(HashMap<String, Value>);

impl RequestValues {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }
}

/// An owned request context, for callers without an `http::Request` at hand.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    host: String,
    deadline: DeadlineContext,
    values: RequestValues,
}

impl RequestContext {
    pub fn new(host: impl Into<String>) -> Self {
        RequestContext {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn with_deadline(mut self, deadline: DeadlineContext) -> Self {
        self.deadline = deadline;
        self
    }
}

impl RequestCtx for RequestContext {
    fn host(&self) -> &str {
        &self.host
    }

    fn deadline_context(&self) -> DeadlineContext {
        self.deadline.clone()
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key, value);
    }
}

impl<B> RequestCtx for http::Request<B>
where
    B: Send + Sync,
{
    fn host(&self) -> &str {
        self.headers()
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| self.uri().authority().map(|authority| authority.as_str()))
            .map(strip_port)
            .unwrap_or_default()
    }

    fn deadline_context(&self) -> DeadlineContext {
        self.extensions()
            .get::<DeadlineContext>()
            .cloned()
            .unwrap_or_default()
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.extensions()
            .get::<RequestValues>()
            .and_then(|values| values.get(key))
    }

    fn set(&mut self, key: &str, value: Value) {
        self.extensions_mut()
            .get_or_insert_default::<RequestValues>()
            .insert(key, value);
    }
}

fn strip_port(authority: &str) -> &str {
    // Userinfo is never part of a host name
    let authority = authority.rsplit_once('@').map_or(authority, |(_, rest)| rest);

    // IPv6 literal, e.g. "[::1]:8080"
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }

    match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => authority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("tenant1.example.com"), "tenant1.example.com");
        assert_eq!(strip_port("tenant1.example.com:8080"), "tenant1.example.com");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
        assert_eq!(strip_port("[::1]"), "[::1]");
        assert_eq!(strip_port("user@tenant1:80"), "tenant1");
        assert_eq!(strip_port("host:"), "host:");
    }

    #[test]
    fn test_request_context_store() {
        let mut ctx = RequestContext::new("tenant1").with_value("user", "user@x");
        assert_eq!(ctx.host(), "tenant1");
        assert_eq!(ctx.get("user"), Some(&json!("user@x")));
        assert_eq!(ctx.get("missing"), None);

        ctx.set("user", json!(42));
        assert_eq!(ctx.get("user"), Some(&json!(42)));
    }

    #[test]
    fn test_http_request_host() {
        let req = http::Request::builder()
            .uri("/flags")
            .header(HOST, "tenant1.example.com:3000")
            .body(())
            .unwrap();
        assert_eq!(req.host(), "tenant1.example.com");

        // Falls back to the URI authority
        let req = http::Request::builder()
            .uri("http://tenant2.example.com:8080/flags")
            .body(())
            .unwrap();
        assert_eq!(req.host(), "tenant2.example.com");

        let req = http::Request::builder().uri("/flags").body(()).unwrap();
        assert_eq!(req.host(), "");
    }

    #[test]
    fn test_http_request_store() {
        let mut req = http::Request::builder().uri("/").body(()).unwrap();
        assert_eq!(RequestCtx::get(&req, "user"), None);

        req.set("user", json!("user@x"));
        assert_eq!(RequestCtx::get(&req, "user"), Some(&json!("user@x")));
        assert_eq!(
            req.extensions().get::<RequestValues>().and_then(|v| v.get("user")),
            Some(&json!("user@x"))
        );
    }

    #[tokio::test]
    async fn test_deadline_expired() {
        let ctx = DeadlineContext::new().with_timeout(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(1), ctx.expired())
            .await
            .expect("deadline should fire");

        let ctx = DeadlineContext::new();
        let token = ctx.token().clone();
        tokio::spawn(async move { token.cancel() });
        tokio::time::timeout(Duration::from_secs(1), ctx.expired())
            .await
            .expect("cancellation should fire");

        let ctx = DeadlineContext::new();
        assert!(
            tokio::time::timeout(Duration::from_millis(20), ctx.expired())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_http_request_deadline_extension() {
        let mut req = http::Request::builder().uri("/").body(()).unwrap();
        assert!(req.deadline_context().deadline().is_none());

        let deadline = DeadlineContext::new().with_timeout(Duration::from_secs(5));
        req.extensions_mut().insert(deadline.clone());
        assert_eq!(req.deadline_context().deadline(), deadline.deadline());
    }
}
