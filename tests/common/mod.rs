#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use backend_base::infrastructure::db::{DatabaseManager, Entity, PoolSettings};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Hero {
    pub id: Option<i64>,
    pub name: String,
    pub age: Option<i64>,
    pub created_at: Option<String>,
}

impl Hero {
    pub fn new(name: &str, age: Option<i64>) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            age,
            created_at: None,
        }
    }
}

impl Entity for Hero {
    const NAME: &'static str = "Hero";
    const TABLE: &'static str = "heroes";
    const FIELDS: &'static [&'static str] = &["id", "name", "age", "created_at"];
    const TEXT_FIELDS: &'static [&'static str] = &["created_at"];

    fn id(&self) -> Option<i64> {
        self.id
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS heroes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
)";

/// A manager backed by a fresh SQLite file. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn sqlite_manager(max_connections: u32) -> (TempDir, Arc<DatabaseManager>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sqlite");
    let uri = format!("sqlite://{}?mode=rwc", path.display());

    let db = Arc::new(DatabaseManager::new());
    db.init_with(
        &uri,
        PoolSettings {
            max_connections,
            acquire_timeout: Duration::from_secs(5),
        },
    )
    .await
    .unwrap();

    let mut session = db.session().await.unwrap();
    session.execute(SCHEMA).await.unwrap();
    session.commit().await.unwrap();

    (dir, db)
}

pub fn context(vars: &[(&str, &str)]) -> backend_base::bootstrap::app_context::AppContext {
    context_with(vars, Arc::new(DatabaseManager::new()))
}

pub fn context_with(
    vars: &[(&str, &str)],
    db: Arc<DatabaseManager>,
) -> backend_base::bootstrap::app_context::AppContext {
    use backend_base::bootstrap::app_context::{AppContext, AppServices};
    use backend_base::bootstrap::config::Config;

    let vars: std::collections::HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let cfg = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
    AppContext::new(cfg, AppServices::new(db))
}

pub async fn body_json(res: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
