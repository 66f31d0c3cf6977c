use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::extract::MatchedPath;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{Router, routing::get};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::compression::predicate::{DefaultPredicate, Predicate, SizeAbove};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::bootstrap::app_context::{AppContext, AppServices};
use crate::bootstrap::config::{Config, CorsConfig};
use crate::bootstrap::modules::{ModuleCatalog, ModuleRegistry};
use crate::infrastructure::db::{DatabaseManager, connection_uri};
use crate::presentation::http::rest::{Envelope, Rest};
use crate::presentation::http::{error_handlers, health, middleware};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Backend Base",
        description = "Modular backend scaffold for building services quickly",
        version = "1.0.1"
    ),
    paths(
        crate::presentation::http::health::health,
        crate::presentation::http::home::home_get,
        crate::presentation::http::home::home_post,
        crate::presentation::http::home::home_put,
        crate::presentation::http::home::home_delete,
    ),
    components(schemas(
        crate::presentation::http::rest::Envelope,
        crate::presentation::http::health::HealthResp,
    )),
    tags(
        (name = "Health", description = "System health checks"),
        (name = "Home", description = "Sample feature module")
    )
)]
pub struct ApiDoc;

/// Handlers document their paths under `/api`; rebase them onto the
/// configured prefix.
pub fn openapi_for(api_prefix: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    if api_prefix == DOC_PREFIX {
        return doc;
    }
    let paths = std::mem::take(&mut doc.paths.paths);
    doc.paths.paths = paths
        .into_iter()
        .map(|(path, item)| {
            let rebased = match path.strip_prefix(DOC_PREFIX) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                    format!("{api_prefix}{rest}")
                }
                _ => path,
            };
            (rebased, item)
        })
        .collect();
    doc
}

const DOC_PREFIX: &str = "/api";

async fn root() -> Envelope {
    Rest::ok(json!({ "info": "🚀 ¡Bienvenid@ al ciberespacio" }))
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let wildcard = |items: &[String]| items.iter().any(|i| i == "*");

    let origins = if wildcard(&cfg.allow_origins) {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            cfg.allow_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };
    let methods = if wildcard(&cfg.allow_methods) {
        AllowMethods::mirror_request()
    } else {
        AllowMethods::list(
            cfg.allow_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.to_uppercase().as_bytes()).ok()),
        )
    };
    let headers = if wildcard(&cfg.allow_headers) {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(
            cfg.allow_headers
                .iter()
                .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}

/// Assembles the HTTP application: base routes, installed modules and the
/// layer stack. The registration report is stored in `ctx`.
pub fn build_app(ctx: AppContext, catalog: &ModuleCatalog) -> Router {
    let cfg = ctx.cfg.clone();
    let prefix = cfg.api_prefix.clone();

    let base: Router<AppContext> = Router::new()
        .route("/", get(root))
        .merge(health::routes(&prefix))
        .merge(
            SwaggerUi::new(format!("{prefix}/docs"))
                .url(format!("{prefix}/openapi.json"), openapi_for(&prefix)),
        );

    let registry = ModuleRegistry::new(prefix, cfg.installed_modules.clone(), catalog);
    let (router, report) = registry.register(base);
    for failure in &report.failures {
        tracing::warn!(module = %failure.module, error = %failure.error, "module_skipped");
    }
    ctx.set_routes(report);

    let mut app = router
        .fallback(error_handlers::not_found)
        .layer(axum::middleware::from_fn(error_handlers::status_envelopes))
        .layer(CatchPanicLayer::custom(error_handlers::panic_response))
        .layer(DefaultBodyLimit::max(cfg.upload_max_bytes))
        .layer(cors_layer(&cfg.cors))
        .layer(CompressionLayer::new().compress_when(DefaultPredicate::new().and(SizeAbove::new(100))));

    if cfg.use_secweb {
        app = app.layer(axum::middleware::from_fn_with_state(
            middleware::SecurityHeaders::new(),
            middleware::security_headers,
        ));
    }

    app.layer(axum::middleware::from_fn(middleware::log_request))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let matched = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                tracing::info_span!("http", %method, %uri, matched_path = %matched)
            }),
        )
        .with_state(ctx)
}

/// Full server lifecycle: database, modules, serve until a shutdown signal,
/// then close the pool.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    tracing::info!(?cfg, "startup_backend");

    let db = Arc::new(DatabaseManager::new());
    if let Some(provider) = cfg.database_provider {
        tracing::info!(%provider, "database_provider_selected");
        let uri = connection_uri(provider.tag())
            .ok_or_else(|| anyhow::anyhow!("no connection uri for provider {provider}"))?;
        db.init_with(&uri, cfg.pool).await?;
    } else {
        tracing::info!("database_provider_not_set");
    }

    let ctx = AppContext::new(cfg.clone(), AppServices::new(db.clone()));
    let app = build_app(ctx, &ModuleCatalog::default());

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http_api_listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    tracing::info!("shutdown_backend");
    if cfg.database_provider.is_some() {
        db.shutdown().await;
    }
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "ctrl_c_handler_failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown_signal_received");
}
