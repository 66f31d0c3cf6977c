use std::borrow::Cow;

/// The data layer cannot be used in its current configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("database manager has not been initialized; call init first")]
    NotInitialized,
    #[error("unsupported database uri scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("failed to connect to the database")]
    Connect(#[source] sqlx::Error),
}

/// A store operation failed.
#[derive(thiserror::Error, Debug)]
#[error("{operation} failed for {entity}")]
pub struct PersistenceError {
    pub entity: Cow<'static, str>,
    pub operation: &'static str,
    #[source]
    pub source: sqlx::Error,
}

impl PersistenceError {
    pub fn new(
        entity: impl Into<Cow<'static, str>>,
        operation: &'static str,
        source: sqlx::Error,
    ) -> Self {
        Self {
            entity: entity.into(),
            operation,
            source,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("{entity} has no field `{field}`")]
    UnknownField { entity: &'static str, field: String },
    #[error("invalid value for {entity}: {message}")]
    InvalidValue {
        entity: &'static str,
        message: String,
    },
    #[error("{entity} has not been persisted yet")]
    NotPersisted { entity: &'static str },
}

#[derive(thiserror::Error, Debug)]
pub enum DataError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
