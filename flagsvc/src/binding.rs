use crate::coerce::FromFlagValue;
use crate::errors::{FetchError, Result};
use crate::request::RequestCtx;
use crate::sdk::FlagSvc;
use serde_json::{Map, Value};

/// A [`FlagSvc`] bound to one request.
///
/// ```ignore
/// let flags = sdk.with_request(&req);
/// if flags.is_enabled("checkout.new_flow").await {
///     let limit = flags.get_int_with_default("checkout.max_items", 10).await;
/// }
/// ```
#[derive(Clone, Copy)]
pub struct RequestFlags<'a> {
    sdk: &'a FlagSvc,
    request: &'a dyn RequestCtx,
}

impl<'a> RequestFlags<'a> {
    pub fn new(sdk: &'a FlagSvc, request: &'a dyn RequestCtx) -> Self {
        RequestFlags { sdk, request }
    }

    pub async fn resolve_value(&self, path: &str) -> Result<Value> {
        self.sdk.resolve_value(self.request, path).await
    }

    pub async fn get<T: FromFlagValue>(&self, path: &str) -> Result<T> {
        self.sdk.get(self.request, path).await
    }

    pub async fn get_string(&self, path: &str) -> Result<String> {
        self.sdk.get_string(self.request, path).await
    }

    pub async fn get_bool(&self, path: &str) -> Result<bool> {
        self.sdk.get_bool(self.request, path).await
    }

    pub async fn get_int(&self, path: &str) -> Result<i64> {
        self.sdk.get_int(self.request, path).await
    }

    pub async fn get_float(&self, path: &str) -> Result<f64> {
        self.sdk.get_float(self.request, path).await
    }

    pub async fn get_string_slice(&self, path: &str) -> Result<Vec<String>> {
        self.sdk.get_string_slice(self.request, path).await
    }

    pub async fn get_map(&self, path: &str) -> Result<Map<String, Value>> {
        self.sdk.get_map(self.request, path).await
    }

    pub async fn get_string_with_default(&self, path: &str, default: &str) -> String {
        self.sdk
            .get_string_with_default(self.request, path, default)
            .await
    }

    pub async fn get_bool_with_default(&self, path: &str, default: bool) -> bool {
        self.sdk
            .get_bool_with_default(self.request, path, default)
            .await
    }

    pub async fn get_int_with_default(&self, path: &str, default: i64) -> i64 {
        self.sdk
            .get_int_with_default(self.request, path, default)
            .await
    }

    pub async fn get_float_with_default(&self, path: &str, default: f64) -> f64 {
        self.sdk
            .get_float_with_default(self.request, path, default)
            .await
    }

    pub async fn get_string_slice_with_default(
        &self,
        path: &str,
        default: Vec<String>,
    ) -> Vec<String> {
        self.sdk
            .get_string_slice_with_default(self.request, path, default)
            .await
    }

    pub async fn get_map_with_default(
        &self,
        path: &str,
        default: Map<String, Value>,
    ) -> Map<String, Value> {
        self.sdk
            .get_map_with_default(self.request, path, default)
            .await
    }

    pub async fn is_enabled(&self, path: &str) -> bool {
        self.sdk.is_enabled(self.request, path).await
    }

    pub async fn ensure_loaded(&self) -> Result<(), FetchError> {
        self.sdk.ensure_loaded(self.request).await
    }

    pub fn document_url(&self) -> String {
        self.sdk.document_url(self.request)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::errors::FlagError;
    use crate::request::RequestContext;
    use crate::sdk::FlagSvc;
    use crate::testutils::TestDocumentServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_bound_request() {
        let server = TestDocumentServer::spawn().await;
        server.serve_json(
            "/host1.json",
            json!({
                "*": {"feature2": false, "maxItems": 100, "regions": ["eu"], "meta": {"v": 1}},
                "user@x": {"feature2": true, "discount": 0.2}
            }),
        );
        let sdk = FlagSvc::new(Config::multi_host(server.base_url())).unwrap();

        let req = RequestContext::new("host1").with_value("user", "user@x");
        let flags = sdk.with_request(&req);

        assert_eq!(flags.document_url(), server.url("/host1.json"));
        assert_eq!(flags.ensure_loaded().await, Ok(()));
        assert!(flags.is_enabled("feature2").await);
        assert_eq!(flags.get_bool("feature2").await, Ok(true));
        assert_eq!(flags.get_int("maxItems").await, Ok(100));
        assert_eq!(flags.get_float("discount").await, Ok(0.2));
        assert_eq!(flags.get_string("maxItems").await, Ok("100".into()));
        assert_eq!(flags.get_string_slice("regions").await, Ok(vec!["eu".into()]));
        assert_eq!(flags.get_map("meta").await.unwrap().get("v"), Some(&json!(1)));
        assert_eq!(flags.resolve_value("meta.v").await, Ok(json!(1)));
        assert_eq!(flags.get::<i64>("meta.v").await, Ok(1));
        assert_eq!(
            flags.get_bool("missing").await,
            Err(FlagError::NotFound {
                path: "missing".into()
            })
        );

        assert_eq!(flags.get_string_with_default("missing", "d").await, "d");
        assert!(flags.get_bool_with_default("missing", true).await);
        assert_eq!(flags.get_int_with_default("missing", 3).await, 3);
        assert_eq!(flags.get_float_with_default("maxItems", 3.0).await, 100.0);
        assert_eq!(
            flags.get_string_slice_with_default("missing", vec![]).await,
            Vec::<String>::new()
        );
        assert!(
            flags
                .get_map_with_default("feature2", serde_json::Map::new())
                .await
                .is_empty()
        );

        // One fetch from ensure_loaded, everything else from the cache
        assert_eq!(server.hits("/host1.json"), 1);
    }
}
