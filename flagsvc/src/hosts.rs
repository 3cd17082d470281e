use crate::config::Config;
use crate::request::RequestCtx;
use std::sync::Arc;
use url::Url;

/// Derives the host name of a request. Returning `None` or an empty string
/// falls back to the request host and then to the configured default host.
pub trait HostExtractor: Send + Sync {
    fn extract_host(&self, req: &dyn RequestCtx) -> Option<String>;
}

impl<F> HostExtractor for F
where
    F: Fn(&dyn RequestCtx) -> Option<String> + Send + Sync,
{
    fn extract_host(&self, req: &dyn RequestCtx) -> Option<String> {
        self(req)
    }
}

/// Composes the document URL of a host.
pub trait UrlBuilder: Send + Sync {
    fn build_url(&self, flags_base: &str, host: &str) -> String;
}

impl<F> UrlBuilder for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn build_url(&self, flags_base: &str, host: &str) -> String {
        self(flags_base, host)
    }
}

/// `<flags_base>/<host>.json`, with the host percent-encoded as one path
/// segment so it cannot add segments, a query or a fragment.
pub struct DefaultUrlBuilder;

impl UrlBuilder for DefaultUrlBuilder {
    fn build_url(&self, flags_base: &str, host: &str) -> String {
        let file = format!("{host}.json");

        let Ok(mut url) = Url::parse(flags_base) else {
            return format!("{}/{}", flags_base.trim_end_matches('/'), file);
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&file);
        }
        url.into()
    }
}

/// Maps requests to document URLs.
pub struct HostResolver {
    flags_url: Option<String>,
    flags_base: String,
    base_host: Option<String>,
    default_host: String,
    extractor: Option<Arc<dyn HostExtractor>>,
    url_builder: Arc<dyn UrlBuilder>,
}

impl HostResolver {
    pub fn new(
        config: &Config,
        extractor: Option<Arc<dyn HostExtractor>>,
        url_builder: Option<Arc<dyn UrlBuilder>>,
    ) -> Self {
        HostResolver {
            flags_url: config.flags_url.as_ref().map(|url| url.to_string()),
            flags_base: config
                .flags_base
                .as_ref()
                .map(|url| url.to_string())
                .unwrap_or_default(),
            base_host: config.base_host.clone(),
            default_host: config.default_host.clone().unwrap_or_default(),
            extractor,
            url_builder: url_builder.unwrap_or_else(|| Arc::new(DefaultUrlBuilder)),
        }
    }

    /// Host of the request: extractor, then request host, then default host.
    /// An empty result is not special-cased.
    pub fn resolve_host(&self, req: &dyn RequestCtx) -> String {
        if let Some(host) = self
            .extractor
            .as_ref()
            .and_then(|extractor| extractor.extract_host(req))
            .filter(|host| !host.is_empty())
        {
            return host;
        }

        match req.host() {
            "" => self.default_host.clone(),
            host => host.to_string(),
        }
    }

    /// URL of the primary document of the request.
    pub fn resolve_url(&self, req: &dyn RequestCtx) -> String {
        if let Some(flags_url) = &self.flags_url {
            return flags_url.clone();
        }

        let host = self.resolve_host(req);
        self.url_builder.build_url(&self.flags_base, &host)
    }

    /// URL of the base document, if a base host is configured.
    pub fn base_url(&self) -> Option<String> {
        self.base_host
            .as_ref()
            .map(|base_host| self.url_builder.build_url(&self.flags_base, base_host))
    }
}
