//! HTTP surface: routing, request parsing, and the response envelope.

mod envelope;
mod handlers;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::CallContext;
use crate::repository::TodoRepository;
use crate::service::TodoService;

pub use envelope::{ApiError, ApiResult, Envelope};
pub use handlers::{ListParams, SORTABLE_FIELDS};

/// Method and path of every mounted route, for startup logging.
pub const ROUTES: [(&str, &str); 7] = [
    ("GET", "/"),
    ("POST", "/todos"),
    ("GET", "/todos"),
    ("GET", "/todos/{id}"),
    ("PUT", "/todos/{id}"),
    ("PATCH", "/todos/{id}"),
    ("DELETE", "/todos/{id}"),
];

/// Shared handler state.
pub struct AppState<R: TodoRepository> {
    pub service: TodoService<R>,
    pub request_timeout: Option<Duration>,
}

impl<R: TodoRepository> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self { service: self.service.clone(), request_timeout: self.request_timeout }
    }
}

impl<R: TodoRepository> AppState<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { service: TodoService::new(repo), request_timeout: None }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Context for one request; bounded by the configured timeout when there is one.
    fn call_context(&self) -> CallContext {
        self.request_timeout.map_or_else(CallContext::background, CallContext::with_timeout)
    }
}

pub fn router<R: TodoRepository>(state: AppState<R>) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/todos", get(handlers::list::<R>).post(handlers::create::<R>))
        .route(
            "/todos/{id}",
            get(handlers::get_by_id::<R>)
                .put(handlers::update::<R>)
                .patch(handlers::update_status::<R>)
                .delete(handlers::delete::<R>),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Logs `status - latency method path` for every request.
async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let resp = next.run(req).await;
    log::info!("{} - {:?} {method} {path}", resp.status().as_u16(), started.elapsed());
    resp
}
