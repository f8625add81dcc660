use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::errors::TodoError;

/// Uniform response body: `{status, message, data}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self { status: true, message: String::new(), data: Some(data) }
    }
}

impl Envelope<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self { status: false, message: message.into(), data: None }
    }
}

/// Handler failure. Malformed requests map to 400, anything from the service to 500.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Service(TodoError),
}

impl From<TodoError> for ApiError {
    fn from(e: TodoError) -> Self {
        Self::Service(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            Self::BadRequest(m) => {
                log::error!("bad request: {m}");
                (StatusCode::BAD_REQUEST, m)
            }
            Self::Service(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (code, Json(Envelope::failure(message))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;
