use std::sync::{Arc, OnceLock};

use crate::bootstrap::config::Config;
use crate::bootstrap::modules::RegistrationReport;
use crate::infrastructure::db::{DataError, DatabaseManager, Session};

#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

pub struct AppServices {
    db: Arc<DatabaseManager>,
    routes: OnceLock<RegistrationReport>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self {
            db,
            routes: OnceLock::new(),
        }
    }
}

impl AppContext {
    pub fn new(cfg: Config, services: AppServices) -> Self {
        Self {
            cfg,
            services: Arc::new(services),
        }
    }

    pub fn db(&self) -> Arc<DatabaseManager> {
        self.services.db.clone()
    }

    /// Opens a transactional session on the shared pool.
    pub async fn session(&self) -> Result<Session, DataError> {
        self.services.db.session().await
    }

    /// Stores the outcome of module registration. Only the first report is kept.
    pub fn set_routes(&self, report: RegistrationReport) {
        if self.services.routes.set(report).is_err() {
            tracing::warn!("registration_report_already_set");
        }
    }

    pub fn routes(&self) -> Option<&RegistrationReport> {
        self.services.routes.get()
    }
}
