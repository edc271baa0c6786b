use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::lock;

type Routes = Arc<Mutex<HashMap<String, (u16, String)>>>;

/// Local HTTP server answering canned JSON per path.
///
/// Query strings are ignored when matching; unknown paths get a 404.
pub struct StubHttpServer {
    addr: SocketAddr,
    routes: Routes,
    server: JoinHandle<()>,
}

async fn answer(State(routes): State<Routes>, uri: Uri) -> Response {
    let (status, body) = lock(&routes)
        .get(uri.path())
        .cloned()
        .unwrap_or((404, r#"{"detail": "Not Found"}"#.to_string()));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

impl StubHttpServer {
    pub async fn start() -> Self {
        let routes: Routes = Arc::default();
        let app = Router::new().fallback(answer).with_state(routes.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            routes,
            server,
        }
    }

    pub fn route(self, path: &str, status: u16, body: &str) -> Self {
        lock(&self.routes).insert(path.to_string(), (status, body.to_string()));
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for StubHttpServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}
