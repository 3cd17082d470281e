use crate::binding::RequestFlags;
use crate::cache::{DocCache, Lookup};
use crate::coerce::FromFlagValue;
use crate::config::{Config, ValidationError};
use crate::document::HostDocument;
use crate::errors::{FetchError, FlagError, Result};
use crate::fetcher::{DocFetcher, HttpFetcher};
use crate::hosts::{HostExtractor, HostResolver, UrlBuilder};
use crate::merger::merge_documents;
use crate::metrics_defs::{FETCH_DURATION, FETCH_ERROR, RESOLVE_ERROR};
use crate::request::{DeadlineContext, RequestCtx};
use crate::resolver::{ResolvedDocuments, resolve_value};
use crate::users::{UserExtractor, UserResolver};
use serde_json::{Map, Value};
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Builds a [`FlagSvc`] from a [`Config`] plus the function-valued options.
pub struct FlagSvcBuilder {
    config: Config,
    host_extractor: Option<Arc<dyn HostExtractor>>,
    user_extractor: Option<Arc<dyn UserExtractor>>,
    url_builder: Option<Arc<dyn UrlBuilder>>,
    fetcher: Option<Arc<dyn DocFetcher>>,
}

impl FlagSvcBuilder {
    pub fn host_extractor(mut self, extractor: impl HostExtractor + 'static) -> Self {
        self.host_extractor = Some(Arc::new(extractor));
        self
    }

    pub fn user_extractor(mut self, extractor: impl UserExtractor + 'static) -> Self {
        self.user_extractor = Some(Arc::new(extractor));
        self
    }

    pub fn url_builder(mut self, builder: impl UrlBuilder + 'static) -> Self {
        self.url_builder = Some(Arc::new(builder));
        self
    }

    /// Fetch documents with a caller-configured HTTP client.
    pub fn http_client(self, client: reqwest::Client) -> Self {
        self.fetcher(HttpFetcher::with_client(client))
    }

    /// Replace the HTTP transport entirely.
    pub fn fetcher(mut self, fetcher: impl DocFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn build(self) -> Result<FlagSvc, ValidationError> {
        self.config.validate()?;

        let hosts = HostResolver::new(&self.config, self.host_extractor, self.url_builder);
        let users = UserResolver::new(&self.config, self.user_extractor);
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpFetcher::new()));

        Ok(FlagSvc {
            inner: Arc::new(FlagSvcInner {
                hosts,
                users,
                fetcher,
                cache: DocCache::new(),
                cache_ttl: self.config.cache_ttl(),
                error_ttl: self.config.error_ttl(),
                request_timeout: self.config.request_timeout(),
                disable_cache: self.config.disable_cache,
            }),
        })
    }
}

struct FlagSvcInner {
    hosts: HostResolver,
    users: UserResolver,
    fetcher: Arc<dyn DocFetcher>,
    cache: DocCache,
    cache_ttl: Duration,
    error_ttl: Duration,
    request_timeout: Duration,
    disable_cache: bool,
}

/// Outcome of one fetch attempt on behalf of a request.
enum FetchOutcome {
    /// The fetcher finished; its result is cacheable.
    Completed(Result<HostDocument, FetchError>),
    /// The request deadline or cancellation fired first. Never cached.
    Aborted(FetchError),
}

/// Resolves typed flag values for requests.
///
/// Cheap to clone; clones share the document cache.
#[derive(Clone)]
pub struct FlagSvc {
    inner: Arc<FlagSvcInner>,
}

impl FlagSvc {
    pub fn new(config: Config) -> Result<Self, ValidationError> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> FlagSvcBuilder {
        FlagSvcBuilder {
            config,
            host_extractor: None,
            user_extractor: None,
            url_builder: None,
            fetcher: None,
        }
    }

    /// Binds `req` so the getters can be called without repeating it.
    pub fn with_request<'a>(&'a self, req: &'a dyn RequestCtx) -> RequestFlags<'a> {
        RequestFlags::new(self, req)
    }

    /// Resolves `path` to its untyped value.
    pub async fn resolve_value(&self, req: &dyn RequestCtx, path: &str) -> Result<Value> {
        let result = self.resolve(req, path).await;
        record_error(path, &result);
        result
    }

    /// Resolves `path` and converts the value to `T`.
    pub async fn get<T: FromFlagValue>(&self, req: &dyn RequestCtx, path: &str) -> Result<T> {
        let result = self
            .resolve(req, path)
            .await
            .and_then(T::from_flag_value);
        record_error(path, &result);
        result
    }

    pub async fn get_string(&self, req: &dyn RequestCtx, path: &str) -> Result<String> {
        self.get(req, path).await
    }

    pub async fn get_bool(&self, req: &dyn RequestCtx, path: &str) -> Result<bool> {
        self.get(req, path).await
    }

    pub async fn get_int(&self, req: &dyn RequestCtx, path: &str) -> Result<i64> {
        self.get(req, path).await
    }

    pub async fn get_float(&self, req: &dyn RequestCtx, path: &str) -> Result<f64> {
        self.get(req, path).await
    }

    pub async fn get_string_slice(&self, req: &dyn RequestCtx, path: &str) -> Result<Vec<String>> {
        self.get(req, path).await
    }

    pub async fn get_map(&self, req: &dyn RequestCtx, path: &str) -> Result<Map<String, Value>> {
        self.get(req, path).await
    }

    pub async fn get_string_with_default(
        &self,
        req: &dyn RequestCtx,
        path: &str,
        default: &str,
    ) -> String {
        self.get(req, path)
            .await
            .unwrap_or_else(|_| default.to_string())
    }

    pub async fn get_bool_with_default(
        &self,
        req: &dyn RequestCtx,
        path: &str,
        default: bool,
    ) -> bool {
        self.get(req, path).await.unwrap_or(default)
    }

    pub async fn get_int_with_default(&self, req: &dyn RequestCtx, path: &str, default: i64) -> i64 {
        self.get(req, path).await.unwrap_or(default)
    }

    pub async fn get_float_with_default(
        &self,
        req: &dyn RequestCtx,
        path: &str,
        default: f64,
    ) -> f64 {
        self.get(req, path).await.unwrap_or(default)
    }

    pub async fn get_string_slice_with_default(
        &self,
        req: &dyn RequestCtx,
        path: &str,
        default: Vec<String>,
    ) -> Vec<String> {
        self.get(req, path).await.unwrap_or(default)
    }

    pub async fn get_map_with_default(
        &self,
        req: &dyn RequestCtx,
        path: &str,
        default: Map<String, Value>,
    ) -> Map<String, Value> {
        self.get(req, path).await.unwrap_or(default)
    }

    /// `get_bool` with a default of false.
    pub async fn is_enabled(&self, req: &dyn RequestCtx, path: &str) -> bool {
        self.get_bool_with_default(req, path, false).await
    }

    /// Fetches the primary document of `req` now, bypassing any cached
    /// outcome, and stores the result.
    pub async fn ensure_loaded(&self, req: &dyn RequestCtx) -> Result<(), FetchError> {
        let url = self.inner.hosts.resolve_url(req);
        self.fetch_and_store(&url, &req.deadline_context())
            .await
            .map(|_| ())
    }

    pub fn clear_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Drops the cached outcome for one document URL.
    pub fn clear_cache_key(&self, url: &str) -> bool {
        self.inner.cache.invalidate(url)
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }

    /// URL of the primary document `req` resolves against.
    pub fn document_url(&self, req: &dyn RequestCtx) -> String {
        self.inner.hosts.resolve_url(req)
    }

    async fn resolve(&self, req: &dyn RequestCtx, path: &str) -> Result<Value> {
        if path.is_empty() {
            return Err(FlagError::EmptyKey);
        }

        let user = self.inner.users.resolve_user(req);
        let documents = self.load_documents(req).await?;
        resolve_value(&documents, &user, path)
    }

    async fn load_documents(
        &self,
        req: &dyn RequestCtx,
    ) -> Result<ResolvedDocuments, FetchError> {
        let deadline = req.deadline_context();
        let primary_url = self.inner.hosts.resolve_url(req);
        let primary = self.load_document(&primary_url, &deadline).await?;

        let Some(base_url) = self.inner.hosts.base_url() else {
            return Ok(ResolvedDocuments::single(primary));
        };
        // Merging a document under itself is a no-op
        if base_url == primary_url {
            return Ok(ResolvedDocuments::single(primary));
        }

        let base = self.load_document(&base_url, &deadline).await?;
        let merged = merge_documents(Some(&primary), Some(&base));

        Ok(ResolvedDocuments {
            merged: Arc::new(merged),
            fallback: Some(base),
        })
    }

    async fn load_document(
        &self,
        url: &str,
        deadline: &DeadlineContext,
    ) -> Result<Arc<HostDocument>, FetchError> {
        if !self.inner.disable_cache
            && let Lookup::Hit(outcome) = self.inner.cache.lookup(url, Instant::now())
        {
            return outcome;
        }

        self.fetch_and_store(url, deadline).await
    }

    async fn fetch_and_store(
        &self,
        url: &str,
        deadline: &DeadlineContext,
    ) -> Result<Arc<HostDocument>, FetchError> {
        let store = !self.inner.disable_cache;

        match self.fetch(url, deadline).await {
            FetchOutcome::Completed(Ok(document)) => {
                let document = Arc::new(document);
                if store {
                    let expires_at = Instant::now() + self.inner.cache_ttl;
                    self.inner.cache.store_ok(url, document.clone(), expires_at);
                }
                Ok(document)
            }
            FetchOutcome::Completed(Err(error)) => {
                if store {
                    let expires_at = Instant::now() + self.inner.error_ttl;
                    self.inner.cache.store_err(url, error.clone(), expires_at);
                }
                Err(error)
            }
            FetchOutcome::Aborted(error) => Err(error),
        }
    }

    async fn fetch(&self, url: &str, deadline: &DeadlineContext) -> FetchOutcome {
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = deadline.expired() => {
                tracing::debug!(url, "Request deadline reached while fetching flag document");
                return FetchOutcome::Aborted(FetchError::network(
                    url,
                    "request deadline exceeded or request cancelled",
                ));
            }
            result = self.inner.fetcher.fetch(url, self.inner.request_timeout) => result,
        };

        histogram!(FETCH_DURATION).record(started.elapsed().as_secs_f64());
        match &result {
            Ok(document) => {
                tracing::debug!(url, scopes = document.len(), "Fetched flag document");
            }
            Err(e) => {
                counter!(FETCH_ERROR, "kind" => e.kind()).increment(1);
                tracing::warn!(url, error = %e, "Failed to fetch flag document");
            }
        }

        FetchOutcome::Completed(result)
    }
}

fn record_error<T>(path: &str, result: &Result<T>) {
    if let Err(e) = result {
        counter!(RESOLVE_ERROR, "kind" => e.kind()).increment(1);
        tracing::debug!(path, error = %e, "Flag lookup failed");
    }
}
