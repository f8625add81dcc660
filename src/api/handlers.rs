use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::AppState;
use super::envelope::{ApiError, ApiResult, Envelope};
use crate::domain::{Page, StatusDto, Todo, TodoDto};
use crate::query::{Filter, FilterOperator, QuerySpec, parse_orders};
use crate::repository::TodoRepository;

const DEFAULT_LIMIT: i64 = 10;

/// Fields a client may sort by, in their stored spelling.
pub const SORTABLE_FIELDS: [&str; 5] = ["title", "description", "isCompleted", "audit.createdAt", "audit.updatedAt"];

/// Query string of `GET /todos`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_completed: Option<bool>,
    pub sort: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListParams {
    /// # Errors
    /// A message naming the first sort field outside `SORTABLE_FIELDS`.
    pub fn into_query(self) -> Result<QuerySpec, String> {
        let mut filter = Filter::new();
        if let Some(title) = self.title.filter(|t| !t.is_empty()) {
            filter = filter.with(FilterOperator::Contains, "title", title);
        }
        if let Some(description) = self.description.filter(|d| !d.is_empty()) {
            filter = filter.with(FilterOperator::Contains, "description", description);
        }
        if let Some(done) = self.is_completed {
            filter = filter.with(FilterOperator::Eq, "isCompleted", done);
        }
        let sort = parse_orders(self.sort.as_deref().unwrap_or_default());
        if let Some(bad) = sort.iter().find(|s| !SORTABLE_FIELDS.contains(&s.field.as_str())) {
            return Err(format!("cannot sort by {}", bad.field));
        }
        Ok(QuerySpec::new()
            .filter(filter)
            .sort_by(sort)
            .skip(self.skip.unwrap_or(0))
            .limit(self.limit.unwrap_or(DEFAULT_LIMIT)))
    }
}

fn path_id(path: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    let Path(id) = path.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("id is required".into()));
    }
    Ok(id)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v).map_err(|e| ApiError::BadRequest(e.body_text()))
}

pub async fn health() -> Json<Envelope<&'static str>> {
    Json(Envelope::success("OK"))
}

pub async fn create<R: TodoRepository>(
    State(state): State<AppState<R>>,
    body: Result<Json<TodoDto>, JsonRejection>,
) -> ApiResult<Todo> {
    let dto = json_body(body)?;
    let ctx = state.call_context();
    let guard = ctx.cancel_on_drop();
    let todo = state.service.create(&ctx, dto).await?;
    guard.disarm();
    Ok(Json(Envelope::success(todo)))
}

pub async fn list<R: TodoRepository>(
    State(state): State<AppState<R>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Page<Todo>> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = params.into_query().map_err(ApiError::BadRequest)?;
    let ctx = state.call_context();
    let guard = ctx.cancel_on_drop();
    let page = state.service.get(&ctx, query).await?;
    guard.disarm();
    Ok(Json(Envelope::success(page)))
}

pub async fn get_by_id<R: TodoRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Todo> {
    let id = path_id(path)?;
    let ctx = state.call_context();
    let guard = ctx.cancel_on_drop();
    let todo = state.service.get_by_id(&ctx, &id).await?;
    guard.disarm();
    Ok(Json(Envelope::success(todo)))
}

pub async fn update<R: TodoRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<TodoDto>, JsonRejection>,
) -> ApiResult<Todo> {
    let id = path_id(path)?;
    let dto = json_body(body)?;
    let ctx = state.call_context();
    let guard = ctx.cancel_on_drop();
    let todo = state.service.update(&ctx, &id, dto).await?;
    guard.disarm();
    Ok(Json(Envelope::success(todo)))
}

pub async fn update_status<R: TodoRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<StatusDto>, JsonRejection>,
) -> ApiResult<Todo> {
    let id = path_id(path)?;
    let status = json_body(body)?;
    let ctx = state.call_context();
    let guard = ctx.cancel_on_drop();
    let todo = state.service.update_status(&ctx, &id, status.is_completed).await?;
    guard.disarm();
    Ok(Json(Envelope::success(todo)))
}

pub async fn delete<R: TodoRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<String> {
    let id = path_id(path)?;
    let ctx = state.call_context();
    let guard = ctx.cancel_on_drop();
    state.service.delete(&ctx, &id).await?;
    guard.disarm();
    Ok(Json(Envelope::success(id)))
}
