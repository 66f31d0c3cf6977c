//! Status-code handlers: every error the router or its layers produce
//! without a JSON body is rewritten into an [`Envelope`].

use std::any::Any;

use axum::extract::Request;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::errors::internal_error;
use super::rest::{Envelope, Rest};

const MAX_DETAIL_BYTES: usize = 16 * 1024;

/// Router fallback for unmatched paths.
pub async fn not_found(method: Method, uri: Uri) -> Envelope {
    tracing::warn!(%method, path = %uri.path(), "resource_not_found");
    not_found_envelope()
}

fn not_found_envelope() -> Envelope {
    Rest::error(
        StatusCode::NOT_FOUND,
        "resource not found",
        "RESOURCE_NOT_FOUND",
        "the requested resource does not exist",
    )
}

fn method_not_allowed_envelope(method: &Method) -> Envelope {
    Rest::error(
        StatusCode::METHOD_NOT_ALLOWED,
        "method not allowed",
        "METHOD_NOT_ALLOWED",
        format!("method {method} is not allowed for the requested path; check the allowed HTTP methods"),
    )
}

fn payload_too_large_envelope() -> Envelope {
    Rest::error(
        StatusCode::PAYLOAD_TOO_LARGE,
        "payload too large",
        "PAYLOAD_TOO_LARGE",
        "the request body is too large",
    )
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

/// Rewrites non-JSON error responses into envelopes.
pub async fn status_envelopes(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let res = next.run(req).await;

    let status = res.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(res.headers()) {
        return res;
    }

    let (parts, body) = res.into_parts();
    let detail = match axum::body::to_bytes(body, MAX_DETAIL_BYTES).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_owned(),
        Err(_) => String::new(),
    };

    let envelope = match status {
        StatusCode::NOT_FOUND => {
            tracing::warn!(%method, %path, "resource_not_found");
            not_found_envelope()
        }
        StatusCode::METHOD_NOT_ALLOWED => {
            tracing::warn!(%method, %path, "method_not_allowed");
            method_not_allowed_envelope(&method)
        }
        StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::warn!(%method, %path, %detail, "payload_too_large");
            payload_too_large_envelope()
        }
        StatusCode::BAD_REQUEST
        | StatusCode::UNSUPPORTED_MEDIA_TYPE
        | StatusCode::UNPROCESSABLE_ENTITY => {
            tracing::warn!(%method, %path, %status, %detail, "request_rejected");
            Rest::error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "unprocessable entity",
                "UNPROCESSABLE",
                detail,
            )
        }
        s if s.is_server_error() => {
            tracing::error!(%method, %path, status = %s, %detail, "internal_server_error");
            internal_error()
        }
        s => {
            tracing::warn!(%method, %path, status = %s, %detail, "http_error");
            let message = s.canonical_reason().unwrap_or("error");
            Rest::format(
                s,
                Some(message),
                None,
                Some(serde_json::json!({ "code": s.as_u16(), "message": detail })),
            )
        }
    };

    let mut response = envelope.into_response();
    if let Some(allow) = parts.headers.get(header::ALLOW) {
        response.headers_mut().insert(header::ALLOW, allow.clone());
    }
    response
}

/// Best-effort text of a panic payload.
pub fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "unknown panic".to_owned()
    }
}

/// Panic handler for `CatchPanicLayer`.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic_message(err.as_ref());
    tracing::error!(panic = %detail, "handler_panicked");
    internal_error().into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(status: StatusCode) -> (StatusCode, Value) {
        let app = Router::new()
            .route("/", get(move || async move { (status, "plain text") }))
            .layer(axum::middleware::from_fn(status_envelopes));
        let res = app
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn payload_too_large_is_enveloped() {
        let (status, body) = call(StatusCode::PAYLOAD_TOO_LARGE).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["errors"]["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn extractor_rejections_become_unprocessable() {
        let (status, body) = call(StatusCode::UNSUPPORTED_MEDIA_TYPE).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["code"], "UNPROCESSABLE");
        assert_eq!(body["errors"]["message"], "plain text");
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let (status, body) = call(StatusCode::BAD_GATEWAY).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errors"]["code"], "INTERNAL_SERVER_ERROR");
    }

    #[test]
    fn panic_payloads_are_readable() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(owned.as_ref()), "boom");
        let borrowed: Box<dyn Any + Send> = Box::new("bang");
        assert_eq!(panic_message(borrowed.as_ref()), "bang");
    }
}
