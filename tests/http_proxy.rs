mod common;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use common::{
    app_with_config, read_json, request, spawn_backend, spawn_slow_body_backend, test_config, token,
    unreachable_addr,
};
use serde_json::json;
use std::time::Duration;
use task_gateway::services::auth::Role;
use tower::ServiceExt;

#[tokio::test]
async fn admin_delete_relays_backend_response_verbatim() {
    let backend = spawn_backend().await;
    let config = test_config(&[("TASK_SERVICE_URL", backend.url.as_str())]);
    let app = app_with_config(&config);

    let bearer = token("u-1", Role::Admin);
    let response = app
        .oneshot(request("DELETE", "/api/projects/p42", Some(&bearer)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({ "message": "Project deleted successfully" })
    );

    let captured = backend.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].uri, "/api/projects/p42");
    assert_eq!(captured[0].headers.get("x-user-id").expect("id"), "u-1");
    assert_eq!(captured[0].headers.get("x-user-role").expect("role"), "admin");
}

#[tokio::test]
async fn upstream_error_status_is_relayed_not_replaced() {
    let backend = spawn_backend().await;
    let config = test_config(&[("TASK_SERVICE_URL", backend.url.as_str())]);
    let app = app_with_config(&config);

    let bearer = token("u-2", Role::User);
    let response = app
        .oneshot(request("GET", "/api/projects/missing", Some(&bearer)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await, json!({ "error": "Project not found" }));
}

#[tokio::test]
async fn backend_sees_gateway_identity_and_request_id() {
    let backend = spawn_backend().await;
    let config = test_config(&[("AUTH_SERVICE_URL", backend.url.as_str())]);
    let app = app_with_config(&config);

    let bearer = token("u-7", Role::User);
    let req = Request::builder()
        .method("PUT")
        .uri("/api/auth/change-password")
        .header("authorization", format!("Bearer {bearer}"))
        .header("x-user-id", "spoofed")
        .header("x-user-role", "admin")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"current":"a","next":"b"}"#))
        .expect("request");

    let response = app.oneshot(req).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response
        .headers()
        .get("x-request-id")
        .cloned()
        .expect("request id on response");

    let captured = backend.captured();
    assert_eq!(captured.len(), 1);
    let headers = &captured[0].headers;
    assert_eq!(headers.get("x-user-id").expect("id"), "u-7");
    assert_eq!(headers.get("x-user-role").expect("role"), "user");
    assert_eq!(headers.get_all("x-user-id").iter().count(), 1);
    assert_eq!(
        headers.get("authorization").expect("bearer"),
        format!("Bearer {bearer}").as_str()
    );
    assert_eq!(headers.get("x-request-id"), Some(&request_id));
    assert_eq!(&captured[0].body[..], br#"{"current":"a","next":"b"}"#);
}

#[tokio::test]
async fn client_request_id_is_kept() {
    let backend = spawn_backend().await;
    let config = test_config(&[("TASK_SERVICE_URL", backend.url.as_str())]);
    let app = app_with_config(&config);

    let bearer = token("u-2", Role::User);
    let mut req = request("GET", "/api/notes/n1", Some(&bearer));
    req.headers_mut()
        .insert("x-request-id", HeaderValue::from_static("client-rid-1"));

    let response = app.oneshot(req).await.expect("response");
    assert_eq!(response.headers().get("x-request-id").expect("rid"), "client-rid-1");
    assert_eq!(
        backend.captured()[0].headers.get("x-request-id").expect("rid"),
        "client-rid-1"
    );
}

#[tokio::test]
async fn connection_refused_is_service_unavailable() {
    let addr = unreachable_addr().await;
    let url = format!("http://{addr}");
    let config = test_config(&[("TASK_SERVICE_URL", url.as_str())]);
    let app = app_with_config(&config);

    let bearer = token("u-1", Role::Admin);
    let response = app
        .oneshot(request("GET", "/api/projects", Some(&bearer)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["error"]["service"], "task");
}

#[tokio::test]
async fn slow_backend_times_out_as_service_unavailable() {
    let backend = spawn_backend().await;
    let config = test_config(&[
        ("TASK_SERVICE_URL", backend.url.as_str()),
        ("UPSTREAM_TIMEOUT_SECONDS", "1"),
        ("REQUEST_TIMEOUT_SECONDS", "10"),
    ]);
    let app = app_with_config(&config);

    let bearer = token("u-2", Role::User);
    let response = app
        .oneshot(request("GET", "/api/notes/slow", Some(&bearer)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json(response).await["error"]["service"], "task");
}

#[tokio::test]
async fn slow_body_after_prompt_head_is_relayed_in_full() {
    let url = spawn_slow_body_backend("hello ", "world", Duration::from_millis(1500)).await;
    let config = test_config(&[
        ("TASK_SERVICE_URL", url.as_str()),
        ("UPSTREAM_TIMEOUT_SECONDS", "1"),
        ("REQUEST_TIMEOUT_SECONDS", "10"),
    ]);
    let app = app_with_config(&config);

    let bearer = token("u-2", Role::User);
    let response = app
        .oneshot(request("GET", "/api/notes/export", Some(&bearer)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("full body");
    assert_eq!(&body[..], b"hello world");
}
