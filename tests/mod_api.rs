mod common;

use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use common::{MemoryRepo, capture_logs, logged, store_repo};
use resik_todo::{AppState, TodoError, router};

async fn call(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn store_app() -> axum::Router {
    router(AppState::new(Arc::new(store_repo())))
}

#[tokio::test]
async fn health_check() {
    let (status, body) = call(store_app(), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": true, "message": "", "data": "OK" }));
}

#[tokio::test]
async fn full_crud_cycle() {
    let app = store_app();

    let (status, body) = call(
        app.clone(),
        json_request("POST", "/todos", r#"{"title":"Title 1","description":"Desc"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["isCompleted"], false);

    let (status, body) = call(app.clone(), get(&format!("/todos/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Title 1");

    let (status, body) = call(
        app.clone(),
        json_request("PUT", &format!("/todos/{id}"), r#"{"title":"New","description":"Text"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "New");

    let (status, body) =
        call(app.clone(), json_request("PATCH", &format!("/todos/{id}"), r#"{"isCompleted":true}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isCompleted"], true);
    assert_eq!(body["data"]["description"], "Text");

    let (status, body) = call(app.clone(), get("/todos?isCompleted=true&title=ne")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (status, body) = call(
        app.clone(),
        Request::builder().method("DELETE").uri(format!("/todos/{id}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], id.as_str());

    let (status, body) = call(app, get(&format!("/todos/{id}"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], false);
    assert_eq!(body["message"], format!("todo not found: {id}"));
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn list_pages_with_defaults() {
    let app = store_app();
    for i in 0..12 {
        let body = format!(r#"{{"title":"T{i:02}","description":"d"}}"#);
        call(app.clone(), json_request("POST", "/todos", &body)).await;
    }
    let (status, body) = call(app.clone(), get("/todos")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 10);
    assert_eq!(body["data"]["total"], 12);

    let (_, body) = call(app, get("/todos?sort=title*desc&skip=1&limit=2")).await;
    let titles: Vec<&str> =
        body["data"]["items"].as_array().unwrap().iter().map(|t| t["title"].as_str().unwrap()).collect();
    assert_eq!(titles, ["T10", "T09"]);
}

#[tokio::test]
async fn list_query_reaches_the_repository() {
    let repo = MemoryRepo::new();
    let app = router(AppState::new(repo.clone()));
    let (status, _) = call(app, get("/todos?title=abc&skip=5")).await;
    assert_eq!(status, StatusCode::OK);
    let q = repo.last_query.lock().clone().unwrap();
    assert_eq!(q.skip, Some(5));
    assert_eq!(q.limit, Some(10));
    assert_eq!(q.filter.fragments().len(), 1);
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let app = store_app();
    let (status, body) = call(app.clone(), json_request("POST", "/todos", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert_eq!(body["data"], Value::Null);

    let (status, _) = call(app.clone(), get("/todos?limit=ten")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(app.clone(), get("/todos?sort=password*asc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "cannot sort by password");

    let (status, body) = call(app, get("/todos/%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "id is required");
}

#[tokio::test]
async fn validation_failures_are_server_errors() {
    let (status, body) =
        call(store_app(), json_request("POST", "/todos", r#"{"title":" ","description":"d"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "title is required");
}

#[tokio::test]
async fn repository_failures_are_server_errors() {
    let repo = MemoryRepo::failing(TodoError::StoreRead("store offline".into()));
    let (status, body) = call(router(AppState::new(repo)), get("/todos")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "status": false, "message": "store offline", "data": null }));
}

#[tokio::test]
async fn every_request_is_logged_with_status_and_path() {
    capture_logs();
    let (status, _) = call(store_app(), get("/todos/0000000000000000000000ab")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, _) = call(store_app(), get("/todos?limit=bad&title=logged")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let lines = logged();
    assert!(lines.iter().any(|l| l.starts_with("500 - ") && l.ends_with(" GET /todos/0000000000000000000000ab")));
    assert!(lines.iter().any(|l| l.starts_with("400 - ") && l.ends_with(" GET /todos")));
}
