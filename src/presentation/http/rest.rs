use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Uniform response body: `{"status", "message", "data"?, "errors"?}`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Envelope {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub errors: Option<Value>,
}

pub struct Rest;

impl Rest {
    /// Builds an envelope. `data` and `errors` are dropped when falsy (null,
    /// `false`, `0`, `""`, `[]`, `{}`); clients rely on the keys being absent.
    pub fn format<M: Into<String>>(
        status: StatusCode,
        message: Option<M>,
        data: Option<Value>,
        errors: Option<Value>,
    ) -> Envelope {
        Envelope {
            status: status.as_u16(),
            message: message.map(Into::into).unwrap_or_default(),
            data: data.filter(is_truthy),
            errors: errors.filter(is_truthy),
        }
    }

    pub fn ok(data: Value) -> Envelope {
        Self::format(StatusCode::OK, Some("OK"), Some(data), None)
    }

    pub fn error(status: StatusCode, message: &str, code: &str, detail: impl Into<Value>) -> Envelope {
        Self::format(
            status,
            Some(message),
            None,
            Some(serde_json::json!({ "code": code, "message": detail.into() })),
        )
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
