use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Content-Security-Policy directives sent when security headers are on.
pub const CSP_DIRECTIVES: &[(&str, &[&str])] = &[
    ("default-src", &["'self'"]),
    (
        "script-src",
        &[
            "'self'",
            "https://cdn.jsdelivr.net",
            "'sha256-eV3QMumkWxytVHa/LDvu+mnW+PcSAEI4SfFu0iIlbDc='",
        ],
    ),
    (
        "style-src",
        &[
            "'self'",
            "https://cdn.jsdelivr.net",
            "https://fonts.googleapis.com",
            "'unsafe-inline'",
        ],
    ),
    ("img-src", &["'self'", "data:", "https://cdn.redoc.ly"]),
    ("font-src", &["'self'", "https://fonts.gstatic.com"]),
    ("connect-src", &["'self'"]),
    ("object-src", &["'none'"]),
    ("base-uri", &["'self'"]),
    ("form-action", &["'self'"]),
    ("frame-ancestors", &["'none'"]),
    ("worker-src", &["blob:"]),
];

pub fn content_security_policy() -> String {
    CSP_DIRECTIVES
        .iter()
        .map(|(name, sources)| format!("{name} {}", sources.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tags every request with a fresh `x-request-id` and logs its start and end.
pub async fn log_request(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(v) = header_value.clone() {
        req.headers_mut().insert(REQUEST_ID, v);
    }

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "N/A".into());
    let (user_agent, content_type) = {
        let headers = req.headers();
        let read = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("N/A")
                .to_owned()
        };
        (read(header::USER_AGENT), read(header::CONTENT_TYPE))
    };
    let authorization = req.headers().contains_key(header::AUTHORIZATION);

    tracing::info!(
        %request_id,
        %method,
        %path,
        %client,
        %user_agent,
        %content_type,
        authorization,
        "request_start"
    );

    let started = Instant::now();
    let mut res = next.run(req).await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    let status = res.status().as_u16();

    if let Some(v) = header_value {
        res.headers_mut().insert(REQUEST_ID, v);
    }

    if status >= 500 {
        tracing::error!(%request_id, %method, %path, status, duration_ms, "request_end");
    } else {
        tracing::info!(%request_id, %method, %path, status, duration_ms, "request_end");
    }
    res
}

#[derive(Clone, Debug)]
pub struct SecurityHeaders {
    csp: HeaderValue,
}

impl SecurityHeaders {
    pub fn new() -> Self {
        let csp = HeaderValue::from_str(&content_security_policy())
            .unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'"));
        Self { csp }
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn security_headers(
    State(headers): State<SecurityHeaders>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let h = res.headers_mut();
    h.insert(header::CONTENT_SECURITY_POLICY, headers.csp.clone());
    h.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    h.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    h.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    h.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    res
}
