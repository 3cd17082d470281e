use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

#[derive(Default)]
struct ServerState {
    routes: Mutex<HashMap<String, (StatusCode, String)>>,
    hits: Mutex<HashMap<String, usize>>,
    delay: Mutex<Option<Duration>>,
}

/// In-process HTTP server serving canned documents by path and counting
/// requests per path. Unknown paths return 404.
pub struct TestDocumentServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl TestDocumentServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState::default());

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let io = TokioIo::new(stream);
                let state = server_state.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| handle_request(state.clone(), req));
                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        TestDocumentServer {
            addr,
            state,
            handle,
        }
    }

    pub fn serve_json(&self, path: &str, body: serde_json::Value) {
        self.serve_raw(path, StatusCode::OK, &body.to_string());
    }

    pub fn serve_raw(&self, path: &str, status: StatusCode, body: &str) {
        self.state
            .routes
            .lock()
            .insert(path.to_string(), (status, body.to_string()));
    }

    /// Delays every response, to exercise timeouts and deadlines.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().get(path).copied().unwrap_or(0)
    }
}

impl Drop for TestDocumentServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_request(
    state: Arc<ServerState>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    *state.hits.lock().entry(path.clone()).or_default() += 1;

    let delay = *state.delay.lock();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let (status, body) = state
        .routes
        .lock()
        .get(&path)
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, "not found".to_string()));

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    Ok(response)
}
