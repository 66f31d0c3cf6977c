use axum::Router;
use axum::routing::get;
use serde_json::json;

use super::rest::{Envelope, Rest};
use crate::bootstrap::app_context::AppContext;
use crate::bootstrap::modules::{FeatureModule, RegistrationError, RouteDeclaration};

pub const WELCOME: &str = "🚀 ¡Bienvenid@ al ciberespacio! Listo para despegar ✨";

fn welcome() -> Envelope {
    Rest::ok(json!({ "Home": WELCOME }))
}

#[utoipa::path(get, path = "/api/home", tag = "Home", responses((status = 200, body = Envelope)))]
pub async fn home_get() -> Envelope {
    welcome()
}

#[utoipa::path(post, path = "/api/home", tag = "Home", responses((status = 200, body = Envelope)))]
pub async fn home_post() -> Envelope {
    welcome()
}

#[utoipa::path(put, path = "/api/home", tag = "Home", responses((status = 200, body = Envelope)))]
pub async fn home_put() -> Envelope {
    welcome()
}

#[utoipa::path(delete, path = "/api/home", tag = "Home", responses((status = 200, body = Envelope)))]
pub async fn home_delete() -> Envelope {
    welcome()
}

pub fn routes() -> Router<AppContext> {
    Router::new().route(
        "/",
        get(home_get)
            .post(home_post)
            .put(home_put)
            .delete(home_delete),
    )
}

/// Sample feature module mounted at `{prefix}/home`.
pub struct HomeModule;

impl FeatureModule for HomeModule {
    fn name(&self) -> &'static str {
        "home"
    }

    fn urlpatterns(&self) -> Result<Vec<RouteDeclaration>, RegistrationError> {
        Ok(vec![RouteDeclaration::new("/home", routes()).tag("Home")])
    }
}

pub fn module() -> Box<dyn FeatureModule> {
    Box::new(HomeModule)
}
