use std::fmt;

use sqlx::{Any, AnyConnection, Transaction};

use super::dialect::Dialect;
use super::error::PersistenceError;

/// One unit of work: a transaction on a single pooled connection.
///
/// Dropping a session without calling [`Session::commit`] rolls the
/// transaction back and returns the connection to the pool.
pub struct Session {
    tx: Transaction<'static, Any>,
    dialect: Dialect,
}

impl Session {
    pub(crate) fn new(tx: Transaction<'static, Any>, dialect: Dialect) -> Self {
        Self { tx, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Raw access for queries the generic model does not cover.
    pub fn connection(&mut self) -> &mut AnyConnection {
        &mut *self.tx
    }

    /// Runs a statement that returns no rows (DDL, bulk updates).
    pub async fn execute(&mut self, sql: &str) -> Result<u64, PersistenceError> {
        let done = sqlx::query(sql)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "session_execute_failed");
                PersistenceError::new("session", "execute", e)
            })?;
        Ok(done.rows_affected())
    }

    pub async fn commit(self) -> Result<(), PersistenceError> {
        self.tx.commit().await.map_err(|e| {
            tracing::error!(error = ?e, "session_commit_failed");
            PersistenceError::new("session", "commit", e)
        })
    }

    pub async fn rollback(self) -> Result<(), PersistenceError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| PersistenceError::new("session", "rollback", e))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}
