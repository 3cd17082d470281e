use crate::errors::CliError;
use flagsvc::{FlagError, FlagSvc, RequestCtx};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use shared::http::{full_body, make_error_response, make_json_response};
use std::future::Future;
use std::pin::Pin;

/// Header carrying the user id a flag is resolved for.
pub const USER_HEADER: &str = "x-flag-user";

/// HTTP front end resolving flags for the host of each request.
///
/// - `GET /health`
/// - `GET /flags/<dot.path>` resolves one flag, the user comes from `X-Flag-User`
/// - `POST /cache/clear` drops every cached document
pub struct FlagService {
    sdk: FlagSvc,
    user_context_key: String,
}

impl FlagService {
    pub fn new(sdk: FlagSvc, user_context_key: impl Into<String>) -> Self {
        Self {
            sdk,
            user_context_key: user_context_key.into(),
        }
    }
}

impl Service<Request<Incoming>> for FlagService {
    type Response = Response<BoxBody<Bytes, CliError>>;
    type Error = CliError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let sdk = self.sdk.clone();
        let user_context_key = self.user_context_key.clone();
        // Only the head is needed
        let (parts, _body) = req.into_parts();
        let req = Request::from_parts(parts, ());

        Box::pin(async move { Ok(handle(&sdk, &user_context_key, req).await) })
    }
}

async fn handle(
    sdk: &FlagSvc,
    user_context_key: &str,
    mut req: Request<()>,
) -> Response<BoxBody<Bytes, CliError>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    match (&method, path.as_str()) {
        (&Method::GET, "/health") => Response::new(full_body("ok\n")),
        (&Method::POST, "/cache/clear") => {
            sdk.clear_cache();
            tracing::info!("Cache cleared");
            Response::new(full_body("ok\n"))
        }
        (&Method::GET, path) if path.starts_with("/flags/") => {
            let flag = &path["/flags/".len()..];
            if let Some(user) = req
                .headers()
                .get(USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
            {
                req.set(user_context_key, json!(user));
            }

            match sdk.resolve_value(&req, flag).await {
                Ok(value) => {
                    let body = json!({"path": flag, "value": value}).to_string();
                    make_json_response(StatusCode::OK, body.into_bytes())
                }
                Err(err) => {
                    let body = json!({"path": flag, "error": err.to_string()}).to_string();
                    make_json_response(error_status(&err), body.into_bytes())
                }
            }
        }
        (_, "/health") | (_, "/cache/clear") => {
            make_error_response(StatusCode::METHOD_NOT_ALLOWED)
        }
        _ => make_error_response(StatusCode::NOT_FOUND),
    }
}

fn error_status(err: &FlagError) -> StatusCode {
    match err {
        FlagError::EmptyKey | FlagError::Coercion { .. } => StatusCode::BAD_REQUEST,
        FlagError::NotFound { .. } | FlagError::NonMapTraversal { .. } => StatusCode::NOT_FOUND,
        FlagError::Fetch(_) => StatusCode::BAD_GATEWAY,
    }
}
