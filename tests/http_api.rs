mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use backend_base::bootstrap::modules::ModuleCatalog;
use backend_base::bootstrap::server::build_app;
use backend_base::presentation::http::home::WELCOME;
use common::{body_json, context};
use serde_json::json;
use tower::ServiceExt;

fn app(vars: &[(&str, &str)]) -> Router {
    build_app(context(vars), &ModuleCatalog::default())
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn home_answers_every_verb_with_the_same_envelope() {
    for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
        let res = app(&[]).oneshot(request(method, "/api/home")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_json(res).await,
            json!({"status": 200, "message": "OK", "data": {"Home": WELCOME}})
        );
    }
}

#[tokio::test]
async fn root_returns_welcome() {
    let res = app(&[]).oneshot(request(Method::GET, "/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], 200);
    assert!(body["data"]["info"].is_string());
}

#[tokio::test]
async fn unknown_path_is_a_not_found_envelope() {
    let res = app(&[]).oneshot(request(Method::GET, "/api/nowhere")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = body_json(res).await;
    assert_eq!(body["status"], 404);
    assert_eq!(body["errors"]["code"], "RESOURCE_NOT_FOUND");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn wrong_method_is_a_method_not_allowed_envelope() {
    let res = app(&[]).oneshot(request(Method::PATCH, "/api/home")).await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(res.headers().contains_key(header::ALLOW));
    let body = body_json(res).await;
    assert_eq!(body["status"], 405);
    assert_eq!(body["errors"]["code"], "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let res = app(&[]).oneshot(request(Method::GET, "/api/home")).await.unwrap();
    let id = res.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn health_reports_disabled_database() {
    let res = app(&[]).oneshot(request(Method::GET, "/api/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "disabled");
    assert_eq!(body["data"]["modules"], 1);
    assert_eq!(body["data"]["routes"], 1);
}

#[tokio::test]
async fn security_headers_follow_the_flag() {
    let plain = app(&[]).oneshot(request(Method::GET, "/api/home")).await.unwrap();
    assert!(!plain.headers().contains_key(header::CONTENT_SECURITY_POLICY));

    let hardened = app(&[("USE_SECWEB", "on")])
        .oneshot(request(Method::GET, "/api/home"))
        .await
        .unwrap();
    let headers = hardened.headers();
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn custom_prefix_moves_modules() {
    let app = app(&[("API_PREFIX", "/v1")]);
    let moved = app.clone().oneshot(request(Method::GET, "/v1/home")).await.unwrap();
    assert_eq!(moved.status(), StatusCode::OK);
    let old = app.clone().oneshot(request(Method::GET, "/api/home")).await.unwrap();
    assert_eq!(old.status(), StatusCode::NOT_FOUND);

    let doc = body_json(
        app.oneshot(request(Method::GET, "/v1/openapi.json"))
            .await
            .unwrap(),
    )
    .await;
    assert!(doc["paths"]["/v1/home"].is_object());
    assert!(doc["paths"]["/api/home"].is_null());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let res = app(&[]).oneshot(request(Method::GET, "/api/openapi.json")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert!(body["paths"]["/api/home"].is_object());
}
