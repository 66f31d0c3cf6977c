use std::time::Duration;

use futures_util::future::BoxFuture;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use tokio::sync::RwLock;

use super::dialect::Dialect;
use super::error::{ConfigurationError, DataError, PersistenceError};
use super::session::Session;
use super::uri::redact;

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Engine {
    pool: AnyPool,
    dialect: Dialect,
}

/// Owns the connection pool and hands out transactional sessions.
///
/// A manager holds at most one engine. It is created once at startup and
/// shared through `AppContext`; `init` on a live manager is a no-op.
#[derive(Debug, Default)]
pub struct DatabaseManager {
    engine: RwLock<Option<Engine>>,
}

impl DatabaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn init(&self, uri: &str) -> Result<(), ConfigurationError> {
        self.init_with(uri, PoolSettings::default()).await
    }

    pub async fn init_with(
        &self,
        uri: &str,
        settings: PoolSettings,
    ) -> Result<(), ConfigurationError> {
        let mut engine = self.engine.write().await;
        if engine.is_some() {
            tracing::info!("database_already_initialized");
            return Ok(());
        }

        let dialect = Dialect::from_uri(uri)?;
        tracing::info!(uri = %redact(uri), ?dialect, "database_initializing");

        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(uri)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "database_connect_failed");
                ConfigurationError::Connect(e)
            })?;

        *engine = Some(Engine { pool, dialect });
        tracing::info!(
            max_connections = settings.max_connections,
            "database_initialized"
        );
        Ok(())
    }

    /// Closes the pool. Without a live engine this only logs.
    pub async fn shutdown(&self) {
        let engine = self.engine.write().await.take();
        match engine {
            Some(engine) => {
                tracing::info!("database_closing");
                engine.pool.close().await;
                tracing::info!("database_closed");
            }
            None => tracing::error!("database_shutdown_without_connection"),
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.engine.read().await.is_some()
    }

    pub async fn dialect(&self) -> Option<Dialect> {
        self.engine.read().await.as_ref().map(|e| e.dialect)
    }

    pub async fn ping(&self) -> Result<(), DataError> {
        let (pool, _) = self.engine_parts().await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| PersistenceError::new("database", "ping", e))?;
        Ok(())
    }

    /// Begins a transaction on its own pooled connection.
    pub async fn session(&self) -> Result<Session, DataError> {
        let (pool, dialect) = self.engine_parts().await?;
        let tx = pool.begin().await.map_err(|e| {
            tracing::error!(error = ?e, "session_begin_failed");
            PersistenceError::new("session", "begin", e)
        })?;
        Ok(Session::new(tx, dialect))
    }

    /// Runs `f` inside a session: commit on `Ok`, rollback on `Err`.
    ///
    /// If the returned future is dropped before completion the transaction is
    /// rolled back on drop and its connection goes back to the pool.
    ///
    /// ```ignore
    /// let hero = db
    ///     .scoped(|s| Box::pin(async move { Hero::get_by_id(s, 1).await }))
    ///     .await?;
    /// ```
    pub async fn scoped<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<R, E>>,
        E: From<DataError> + std::fmt::Debug,
    {
        let mut session = self.session().await?;
        match f(&mut session).await {
            Ok(value) => {
                session.commit().await.map_err(DataError::from)?;
                Ok(value)
            }
            Err(err) => {
                tracing::error!(error = ?err, "session_rolled_back");
                if let Err(rollback) = session.rollback().await {
                    tracing::error!(error = ?rollback, "session_rollback_failed");
                }
                Err(err)
            }
        }
    }

    async fn engine_parts(&self) -> Result<(AnyPool, Dialect), ConfigurationError> {
        let guard = self.engine.read().await;
        match guard.as_ref() {
            Some(engine) => Ok((engine.pool.clone(), engine.dialect)),
            None => {
                tracing::error!("database_not_initialized");
                Err(ConfigurationError::NotInitialized)
            }
        }
    }
}
