use crate::document::HostDocument;
use crate::errors::FetchError;
use async_trait::async_trait;
use std::time::Duration;

/// Retrieves and decodes one host document.
#[async_trait]
pub trait DocFetcher: Send + Sync {
    /// Fetches the document at `url`. The whole exchange, including reading
    /// the body, must finish within `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<HostDocument, FetchError>;
}

/// Fetches documents over HTTP(S) with a shared, pooled client.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-configured client, e.g. for connection pool isolation.
    pub fn with_client(client: reqwest::Client) -> Self {
        HttpFetcher { client }
    }
}

#[async_trait]
impl DocFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<HostDocument, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        serde_json::from_slice(&body).map_err(|e| FetchError::decode(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::TestDocumentServer;
    use http::StatusCode;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_fetch_document() {
        let server = TestDocumentServer::spawn().await;
        server.serve_json(
            "/tenant1.json",
            json!({"*": {"feature2": false, "maxItems": 100}, "user@x": {"maxItems": 200}}),
        );

        let doc = HttpFetcher::new()
            .fetch(&server.url("/tenant1.json"), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(doc.lookup("*", "maxItems"), Some(&json!(100)));
        assert_eq!(doc.lookup("user@x", "maxItems"), Some(&json!(200)));
        assert_eq!(server.hits("/tenant1.json"), 1);
    }

    #[tokio::test]
    async fn test_fetch_status_error() {
        let server = TestDocumentServer::spawn().await;
        server.serve_raw("/broken.json", StatusCode::INTERNAL_SERVER_ERROR, "oops");

        let url = server.url("/missing.json");
        let err = HttpFetcher::new().fetch(&url, TIMEOUT).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::HttpStatus {
                url: url.clone(),
                status: StatusCode::NOT_FOUND
            }
        );

        let err = HttpFetcher::new()
            .fetch(&server.url("/broken.json"), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::HttpStatus {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_decode_error() {
        let server = TestDocumentServer::spawn().await;
        server.serve_raw("/garbage.json", StatusCode::OK, "<html>not json</html>");
        server.serve_raw("/flat.json", StatusCode::OK, r#"{"feature": true}"#);

        for path in ["/garbage.json", "/flat.json"] {
            let url = server.url(path);
            let err = HttpFetcher::new().fetch(&url, TIMEOUT).await.unwrap_err();
            assert!(matches!(err, FetchError::Decode { .. }), "{path}: {err}");
            assert_eq!(err.url(), url);
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = TestDocumentServer::spawn().await;
        server.serve_json("/slow.json", json!({"*": {}}));
        server.set_delay(Duration::from_millis(500));

        let err = HttpFetcher::new()
            .fetch(&server.url("/slow.json"), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        // An empty host segment without a base URL is not a valid absolute URL
        let err = HttpFetcher::new().fetch("/.json", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
    }
}
