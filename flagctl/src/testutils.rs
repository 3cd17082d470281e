use async_trait::async_trait;
use flagsvc::{Config, DocFetcher, FetchError, FlagSvc, HostDocument};
use hyper::StatusCode;
use serde_json::json;
use std::time::Duration;

/// Serves one document for `tenant1` and 404 for every other host.
pub struct StaticFetcher;

#[async_trait]
impl DocFetcher for StaticFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<HostDocument, FetchError> {
        match url {
            "http://flags.test/tenant1.json" => Ok(serde_json::from_value(json!({
                "*": {
                    "checkout": {"enabled": false, "maxItems": 100},
                    "regions": ["eu", "us"],
                    "discount": 0.25
                },
                "user@x": {"checkout": {"enabled": true}}
            }))
            .unwrap()),
            _ => Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND,
            }),
        }
    }
}

pub fn static_sdk() -> FlagSvc {
    let config = Config::multi_host("http://flags.test".parse().unwrap());
    FlagSvc::builder(config)
        .fetcher(StaticFetcher)
        .build()
        .unwrap()
}
