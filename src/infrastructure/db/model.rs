use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::any::AnyRow;
use sqlx::{FromRow, Row};

use super::dialect::{Dialect, SqlBuilder, bind_values};
use super::error::{DataError, PersistenceError, ValidationError};
use super::predicate::{Filter, Page};
use super::session::Session;

/// Plain field → value form of an entity.
pub type Record = Map<String, Value>;

/// A persisted record type.
///
/// Field names in [`Entity::FIELDS`] must match both the serde names and the
/// table columns. The primary key is an integer assigned by the store; `None`
/// means the entity has not been saved yet.
///
/// Rows are decoded through the `Any` driver, which only carries booleans,
/// integers, floats, text and blobs. Columns of any other store type
/// (timestamps, dates, UUIDs, numerics, JSON) must be listed in
/// [`Entity::TEXT_FIELDS`] and held as `String` on the entity: they are read
/// back as text, and written as text, which PostgreSQL and MySQL convert on
/// assignment. Filtering on such columns compares text.
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
/// pub struct Hero {
///     pub id: Option<i64>,
///     pub name: String,
///     pub age: Option<i64>,
///     pub created_at: Option<String>,
/// }
///
/// impl Entity for Hero {
///     const NAME: &'static str = "Hero";
///     const TABLE: &'static str = "heroes";
///     const FIELDS: &'static [&'static str] = &["id", "name", "age", "created_at"];
///     const TEXT_FIELDS: &'static [&'static str] = &["created_at"];
///
///     fn id(&self) -> Option<i64> {
///         self.id
///     }
/// }
/// ```
pub trait Entity:
    Serialize + DeserializeOwned + for<'r> FromRow<'r, AnyRow> + Send + Sync + Unpin + 'static
{
    const NAME: &'static str;
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    const FIELDS: &'static [&'static str];
    /// Fields selected as text.
    const TEXT_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> Option<i64>;
}

/// CRUD over any [`Entity`]. Every call runs inside the caller's session;
/// commit and rollback belong to the session scope, not to these methods.
#[async_trait]
pub trait GenericModel: Entity {
    /// Inserts or updates, flushes, and returns the row as stored.
    async fn save(self, session: &mut Session) -> Result<Self, DataError>;

    /// Applies `patch` to known fields and saves. Unknown keys are logged
    /// and ignored; the primary key is never patched.
    async fn update(self, session: &mut Session, patch: Record) -> Result<Self, DataError>;

    async fn delete(self, session: &mut Session) -> Result<(), DataError>;

    async fn get_by_id(session: &mut Session, id: i64) -> Result<Option<Self>, DataError>;

    async fn get_by_id_dict(session: &mut Session, id: i64) -> Result<Option<Record>, DataError>;

    async fn get_all(session: &mut Session, page: Page) -> Result<Vec<Self>, DataError>;

    async fn get_all_dicts(session: &mut Session, page: Page) -> Result<Vec<Record>, DataError>;

    async fn filter(session: &mut Session, filter: Filter) -> Result<Vec<Self>, DataError>;

    async fn filter_dicts(session: &mut Session, filter: Filter) -> Result<Vec<Record>, DataError>;

    fn to_dict(&self) -> Result<Record, DataError>;
}

#[async_trait]
impl<T: Entity> GenericModel for T {
    async fn save(self, session: &mut Session) -> Result<Self, DataError> {
        let id = self.id();
        let result = save_entity(&self, session).await;
        let saved = traced::<T, _>("save", id, result)?;
        tracing::info!(entity = T::NAME, operation = "save", id = ?saved.id(), "entity_saved");
        Ok(saved)
    }

    async fn update(self, session: &mut Session, patch: Record) -> Result<Self, DataError> {
        let id = self.id();
        let patched = traced::<T, _>("update", id, apply_patch(&self, patch))?;
        patched.save(session).await
    }

    async fn delete(self, session: &mut Session) -> Result<(), DataError> {
        let id = self.id();
        let result = match id {
            Some(id) => delete_row::<T>(session, id).await,
            None => Err(ValidationError::NotPersisted { entity: T::NAME }.into()),
        };
        let rows = traced::<T, _>("delete", id, result)?;
        tracing::info!(entity = T::NAME, operation = "delete", id = ?id, rows, "entity_deleted");
        Ok(())
    }

    async fn get_by_id(session: &mut Session, id: i64) -> Result<Option<Self>, DataError> {
        let found = traced::<T, _>("get_by_id", Some(id), fetch_by_id::<T>(session, id).await)?;
        if found.is_some() {
            tracing::info!(entity = T::NAME, operation = "get_by_id", id, "entity_found");
        } else {
            tracing::info!(entity = T::NAME, operation = "get_by_id", id, "entity_not_found");
        }
        Ok(found)
    }

    async fn get_by_id_dict(session: &mut Session, id: i64) -> Result<Option<Record>, DataError> {
        T::get_by_id(session, id)
            .await?
            .map(|entity| entity.to_dict())
            .transpose()
    }

    async fn get_all(session: &mut Session, page: Page) -> Result<Vec<Self>, DataError> {
        let filter = Filter::new().page(page);
        let rows = traced::<T, _>("get_all", None, fetch_many::<T>(session, &filter).await)?;
        tracing::info!(
            entity = T::NAME,
            operation = "get_all",
            count = rows.len(),
            skip = page.skip,
            limit = ?page.limit,
            "entities_fetched"
        );
        Ok(rows)
    }

    async fn get_all_dicts(session: &mut Session, page: Page) -> Result<Vec<Record>, DataError> {
        T::get_all(session, page)
            .await?
            .iter()
            .map(GenericModel::to_dict)
            .collect()
    }

    async fn filter(session: &mut Session, filter: Filter) -> Result<Vec<Self>, DataError> {
        let rows = traced::<T, _>("filter", None, fetch_many::<T>(session, &filter).await)?;
        tracing::info!(
            entity = T::NAME,
            operation = "filter",
            count = rows.len(),
            predicates = filter.predicates.len(),
            equals = filter.equals.len(),
            skip = filter.page.skip,
            limit = ?filter.page.limit,
            "entities_filtered"
        );
        Ok(rows)
    }

    async fn filter_dicts(session: &mut Session, filter: Filter) -> Result<Vec<Record>, DataError> {
        T::filter(session, filter)
            .await?
            .iter()
            .map(GenericModel::to_dict)
            .collect()
    }

    fn to_dict(&self) -> Result<Record, DataError> {
        to_record(self).map_err(DataError::from)
    }
}

fn traced<T: Entity, V>(
    operation: &'static str,
    id: Option<i64>,
    result: Result<V, DataError>,
) -> Result<V, DataError> {
    if let Err(e) = &result {
        tracing::error!(entity = T::NAME, operation, id = ?id, error = ?e, "entity_operation_failed");
    }
    result
}

fn store_error<T: Entity>(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |e| PersistenceError::new(T::NAME, operation, e).into()
}

fn is_field<T: Entity>(name: &str) -> bool {
    T::FIELDS.iter().any(|field| *field == name)
}

fn to_record<T: Entity>(entity: &T) -> Result<Record, ValidationError> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ValidationError::InvalidValue {
            entity: T::NAME,
            message: format!("expected an object, serialized to {other}"),
        }),
        Err(e) => Err(ValidationError::InvalidValue {
            entity: T::NAME,
            message: e.to_string(),
        }),
    }
}

fn apply_patch<T: Entity>(entity: &T, patch: Record) -> Result<T, DataError> {
    let mut record = to_record(entity)?;
    for (key, value) in patch {
        if key == T::PRIMARY_KEY {
            tracing::warn!(entity = T::NAME, field = %key, "primary_key_patch_ignored");
        } else if is_field::<T>(&key) {
            record.insert(key, value);
        } else {
            tracing::warn!(entity = T::NAME, field = %key, "unknown_field_ignored");
        }
    }
    serde_json::from_value(Value::Object(record)).map_err(|e| {
        ValidationError::InvalidValue {
            entity: T::NAME,
            message: e.to_string(),
        }
        .into()
    })
}

async fn save_entity<T: Entity>(entity: &T, session: &mut Session) -> Result<T, DataError> {
    let record = to_record(entity)?;
    let id = match entity.id() {
        None => insert_row::<T>(session, &record, None).await?,
        Some(id) => {
            // A detached entity carrying an id is inserted as-is.
            if update_row::<T>(session, id, &record).await? == 0 {
                insert_row::<T>(session, &record, Some(id)).await?
            } else {
                id
            }
        }
    };
    fetch_by_id::<T>(session, id)
        .await?
        .ok_or_else(|| store_error::<T>("refresh")(sqlx::Error::RowNotFound))
}

fn write_select<T: Entity>(out: &mut SqlBuilder) {
    let dialect = out.dialect();
    out.push("SELECT ");
    for (i, field) in T::FIELDS.iter().enumerate() {
        if i > 0 {
            out.push(", ");
        }
        if T::TEXT_FIELDS.iter().any(|text| text == field) {
            out.push(&dialect.text_cast(&dialect.quote(field)))
                .push(" AS ")
                .push_ident(field);
        } else {
            out.push_ident(field);
        }
    }
    out.push(" FROM ").push_ident(T::TABLE);
}

fn decode_rows<T: Entity>(rows: Vec<AnyRow>) -> Result<Vec<T>, DataError> {
    rows.iter()
        .map(|row| T::from_row(row).map_err(store_error::<T>("decode")))
        .collect()
}

async fn insert_row<T: Entity>(
    session: &mut Session,
    record: &Record,
    id: Option<i64>,
) -> Result<i64, DataError> {
    let dialect = session.dialect();
    let mut columns: Vec<(&str, Value)> = Vec::new();
    if let Some(id) = id {
        columns.push((T::PRIMARY_KEY, Value::from(id)));
    }
    // Nulls are left out so column defaults apply.
    columns.extend(
        T::FIELDS
            .iter()
            .filter(|field| **field != T::PRIMARY_KEY)
            .filter_map(|field| {
                record
                    .get(*field)
                    .filter(|value| !value.is_null())
                    .map(|value| (*field, value.clone()))
            }),
    );

    let mut b = SqlBuilder::new(dialect);
    b.push("INSERT INTO ").push_ident(T::TABLE);
    if columns.is_empty() {
        match dialect {
            Dialect::MySql => b.push(" () VALUES ()"),
            Dialect::Postgres | Dialect::Sqlite => b.push(" DEFAULT VALUES"),
        };
    } else {
        b.push(" (");
        for (i, (column, _)) in columns.iter().enumerate() {
            if i > 0 {
                b.push(", ");
            }
            b.push_ident(column);
        }
        b.push(") VALUES (");
        for (i, (_, value)) in columns.into_iter().enumerate() {
            if i > 0 {
                b.push(", ");
            }
            b.push_bind(value);
        }
        b.push(")");
    }
    if dialect.supports_returning() {
        b.push(" RETURNING ").push_ident(T::PRIMARY_KEY);
    }

    let (sql, args) = b.into_parts();
    let query = bind_values(sqlx::query(&sql), args);
    if dialect.supports_returning() {
        let row = query
            .fetch_one(session.connection())
            .await
            .map_err(store_error::<T>("insert"))?;
        row.try_get::<i64, _>(0).map_err(store_error::<T>("insert"))
    } else {
        let done = query
            .execute(session.connection())
            .await
            .map_err(store_error::<T>("insert"))?;
        match id.or_else(|| done.last_insert_id()) {
            Some(id) => Ok(id),
            None => Err(store_error::<T>("insert")(sqlx::Error::Protocol(
                "driver did not report the generated id".into(),
            ))),
        }
    }
}

async fn update_row<T: Entity>(
    session: &mut Session,
    id: i64,
    record: &Record,
) -> Result<u64, DataError> {
    let columns: Vec<&str> = T::FIELDS
        .iter()
        .copied()
        .filter(|field| *field != T::PRIMARY_KEY)
        .collect();
    if columns.is_empty() {
        let exists = fetch_by_id::<T>(session, id).await?.is_some();
        return Ok(u64::from(exists));
    }

    let mut b = SqlBuilder::new(session.dialect());
    b.push("UPDATE ").push_ident(T::TABLE).push(" SET ");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        let value = record.get(*column).cloned().unwrap_or(Value::Null);
        b.push_ident(column).push(" = ").push_bind(value);
    }
    b.push(" WHERE ")
        .push_ident(T::PRIMARY_KEY)
        .push(" = ")
        .push_bind(Value::from(id));

    let (sql, args) = b.into_parts();
    let done = bind_values(sqlx::query(&sql), args)
        .execute(session.connection())
        .await
        .map_err(store_error::<T>("update"))?;
    Ok(done.rows_affected())
}

async fn delete_row<T: Entity>(session: &mut Session, id: i64) -> Result<u64, DataError> {
    let mut b = SqlBuilder::new(session.dialect());
    b.push("DELETE FROM ")
        .push_ident(T::TABLE)
        .push(" WHERE ")
        .push_ident(T::PRIMARY_KEY)
        .push(" = ")
        .push_bind(Value::from(id));

    let (sql, args) = b.into_parts();
    let done = bind_values(sqlx::query(&sql), args)
        .execute(session.connection())
        .await
        .map_err(store_error::<T>("delete"))?;
    Ok(done.rows_affected())
}

async fn fetch_by_id<T: Entity>(session: &mut Session, id: i64) -> Result<Option<T>, DataError> {
    let mut b = SqlBuilder::new(session.dialect());
    write_select::<T>(&mut b);
    b.push(" WHERE ")
        .push_ident(T::PRIMARY_KEY)
        .push(" = ")
        .push_bind(Value::from(id));

    let (sql, args) = b.into_parts();
    let row = bind_values(sqlx::query(&sql), args)
        .fetch_optional(session.connection())
        .await
        .map_err(store_error::<T>("get_by_id"))?;
    row.map(|row| T::from_row(&row).map_err(store_error::<T>("decode")))
        .transpose()
}

async fn fetch_many<T: Entity>(session: &mut Session, filter: &Filter) -> Result<Vec<T>, DataError> {
    let dialect = session.dialect();
    let mut b = SqlBuilder::new(dialect);
    write_select::<T>(&mut b);
    filter.write_where(&mut b, T::NAME, T::FIELDS)?;
    b.push(" ORDER BY ").push_ident(T::PRIMARY_KEY).push(" ASC");
    b.push(&dialect.paging(filter.page.skip, filter.page.limit));

    let (sql, args) = b.into_parts();
    let rows = bind_values(sqlx::query(&sql), args)
        .fetch_all(session.connection())
        .await
        .map_err(store_error::<T>("query"))?;
    decode_rows::<T>(rows)
}
