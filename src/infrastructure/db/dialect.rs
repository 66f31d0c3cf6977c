use serde_json::Value;
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::Any;

use super::error::ConfigurationError;

/// SQL flavour behind an `Any` connection. Only the bits that differ between
/// backends live here: placeholders, identifier quoting and paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn from_uri(uri: &str) -> Result<Self, ConfigurationError> {
        let scheme = uri.split(':').next().unwrap_or_default();
        match scheme.split('+').next().unwrap_or_default() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(ConfigurationError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Whether generated keys come back through `RETURNING`. MySQL reports
    /// them as the last insert id instead.
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }

    /// Wraps an already quoted column so it is read back as text.
    pub fn text_cast(self, column: &str) -> String {
        match self {
            Dialect::MySql => format!("CAST({column} AS CHAR)"),
            Dialect::Postgres | Dialect::Sqlite => format!("CAST({column} AS TEXT)"),
        }
    }

    /// `LIMIT`/`OFFSET` tail. MySQL and SQLite cannot express an offset
    /// without a limit, so an unbounded page uses their "no limit" spelling.
    pub fn paging(self, skip: u64, limit: Option<u64>) -> String {
        match (limit, self) {
            (Some(limit), _) => format!(" LIMIT {limit} OFFSET {skip}"),
            (None, _) if skip == 0 => String::new(),
            (None, Dialect::Postgres) => format!(" OFFSET {skip}"),
            (None, Dialect::MySql) => format!(" LIMIT 18446744073709551615 OFFSET {skip}"),
            (None, Dialect::Sqlite) => format!(" LIMIT -1 OFFSET {skip}"),
        }
    }
}

/// Accumulates SQL text and its bound values in placeholder order.
#[derive(Debug)]
pub struct SqlBuilder {
    dialect: Dialect,
    sql: String,
    args: Vec<Value>,
}

impl SqlBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub fn push_ident(&mut self, ident: &str) -> &mut Self {
        let quoted = self.dialect.quote(ident);
        self.sql.push_str(&quoted);
        self
    }

    /// Binds `value`. JSON null is written as a `NULL` literal: an untyped
    /// null parameter is rejected by PostgreSQL for non-text columns.
    pub fn push_bind(&mut self, value: Value) -> &mut Self {
        if value.is_null() {
            self.sql.push_str("NULL");
        } else {
            self.args.push(value);
            let placeholder = self.dialect.placeholder(self.args.len());
            self.sql.push_str(&placeholder);
        }
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.args)
    }
}

/// Binds JSON values onto an `Any` query.
pub fn bind_values<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    values: Vec<Value>,
) -> Query<'q, Any, AnyArguments<'q>> {
    for value in values {
        query = match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s),
            nested @ (Value::Array(_) | Value::Object(_)) => query.bind(nested.to_string()),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_dialect_from_scheme() {
        assert_eq!(
            Dialect::from_uri("postgresql://u:p@h:5432/db").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::from_uri("postgres://u:p@h/db").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(Dialect::from_uri("mysql://u:p@h/db").unwrap(), Dialect::MySql);
        assert_eq!(Dialect::from_uri("sqlite::memory:").unwrap(), Dialect::Sqlite);
        assert!(matches!(
            Dialect::from_uri("oracle://x"),
            Err(ConfigurationError::UnsupportedScheme(s)) if s == "oracle"
        ));
    }

    #[test]
    fn placeholders_follow_dialect() {
        let mut pg = SqlBuilder::new(Dialect::Postgres);
        pg.push("a = ").push_bind(json!(1)).push(" AND b = ").push_bind(json!("x"));
        assert_eq!(pg.sql(), "a = $1 AND b = $2");

        let mut my = SqlBuilder::new(Dialect::MySql);
        my.push("a = ").push_bind(json!(1)).push(" AND b = ").push_bind(json!("x"));
        assert_eq!(my.sql(), "a = ? AND b = ?");
        assert_eq!(my.args().len(), 2);
    }

    #[test]
    fn null_is_inlined() {
        let mut b = SqlBuilder::new(Dialect::Postgres);
        b.push("x = ").push_bind(Value::Null).push(", y = ").push_bind(json!(true));
        assert_eq!(b.sql(), "x = NULL, y = $1");
        assert_eq!(b.args(), &[json!(true)]);
    }

    #[test]
    fn quoting_escapes_delimiters() {
        assert_eq!(Dialect::Postgres.quote("na\"me"), "\"na\"\"me\"");
        assert_eq!(Dialect::MySql.quote("order"), "`order`");
    }

    #[test]
    fn generated_keys_use_returning_except_on_mysql() {
        assert!(Dialect::Postgres.supports_returning());
        assert!(Dialect::Sqlite.supports_returning());
        assert!(!Dialect::MySql.supports_returning());
    }

    #[test]
    fn text_cast_per_dialect() {
        assert_eq!(
            Dialect::Postgres.text_cast("\"created_at\""),
            "CAST(\"created_at\" AS TEXT)"
        );
        assert_eq!(Dialect::MySql.text_cast("`created_at`"), "CAST(`created_at` AS CHAR)");
    }

    #[test]
    fn unbounded_paging() {
        assert_eq!(Dialect::Postgres.paging(0, None), "");
        assert_eq!(Dialect::Postgres.paging(5, None), " OFFSET 5");
        assert_eq!(Dialect::Sqlite.paging(5, None), " LIMIT -1 OFFSET 5");
        assert_eq!(Dialect::MySql.paging(2, Some(2)), " LIMIT 2 OFFSET 2");
    }
}
