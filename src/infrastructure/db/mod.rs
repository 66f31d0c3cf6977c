pub mod dialect;
pub mod error;
pub mod manager;
pub mod model;
pub mod predicate;
pub mod session;
pub mod uri;

pub use dialect::Dialect;
pub use error::{ConfigurationError, DataError, PersistenceError, ValidationError};
pub use manager::{DatabaseManager, PoolSettings};
pub use model::{Entity, GenericModel, Record};
pub use predicate::{Filter, Page, Predicate};
pub use session::Session;
pub use uri::{Provider, connection_uri, connection_uri_with};
