use serde_json::Value;

use super::dialect::SqlBuilder;
use super::error::ValidationError;

/// Boolean expression over entity fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Like(String, String),
    IsNull(String),
    NotNull(String),
    In(String, Vec<Value>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Gt(field.into(), value.into())
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ge(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Lt(field.into(), value.into())
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Le(field.into(), value.into())
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like(field.into(), pattern.into())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Predicate::IsNull(field.into())
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Predicate::NotNull(field.into())
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut items) => {
                items.push(other);
                Predicate::And(items)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut items) => {
                items.push(other);
                Predicate::Or(items)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Appends this predicate to `out`, checking every field against
    /// `fields`.
    pub fn write_sql(
        &self,
        out: &mut SqlBuilder,
        entity: &'static str,
        fields: &[&str],
    ) -> Result<(), ValidationError> {
        match self {
            Predicate::Eq(f, v) if v.is_null() => {
                ensure_field(entity, fields, f)?;
                out.push_ident(f).push(" IS NULL");
            }
            Predicate::Ne(f, v) if v.is_null() => {
                ensure_field(entity, fields, f)?;
                out.push_ident(f).push(" IS NOT NULL");
            }
            Predicate::Eq(f, v)
            | Predicate::Ne(f, v)
            | Predicate::Gt(f, v)
            | Predicate::Ge(f, v)
            | Predicate::Lt(f, v)
            | Predicate::Le(f, v) => {
                ensure_field(entity, fields, f)?;
                let op = match self {
                    Predicate::Eq(..) => " = ",
                    Predicate::Ne(..) => " <> ",
                    Predicate::Gt(..) => " > ",
                    Predicate::Ge(..) => " >= ",
                    Predicate::Lt(..) => " < ",
                    _ => " <= ",
                };
                out.push_ident(f).push(op).push_bind(v.clone());
            }
            Predicate::Like(f, pattern) => {
                ensure_field(entity, fields, f)?;
                out.push_ident(f)
                    .push(" LIKE ")
                    .push_bind(Value::String(pattern.clone()));
            }
            Predicate::IsNull(f) => {
                ensure_field(entity, fields, f)?;
                out.push_ident(f).push(" IS NULL");
            }
            Predicate::NotNull(f) => {
                ensure_field(entity, fields, f)?;
                out.push_ident(f).push(" IS NOT NULL");
            }
            Predicate::In(f, values) => {
                ensure_field(entity, fields, f)?;
                if values.is_empty() {
                    out.push("1 = 0");
                } else {
                    out.push_ident(f).push(" IN (");
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            out.push(", ");
                        }
                        out.push_bind(v.clone());
                    }
                    out.push(")");
                }
            }
            Predicate::And(items) => write_group(out, items, " AND ", "1 = 1", entity, fields)?,
            Predicate::Or(items) => write_group(out, items, " OR ", "1 = 0", entity, fields)?,
            Predicate::Not(inner) => {
                out.push("NOT (");
                inner.write_sql(out, entity, fields)?;
                out.push(")");
            }
        }
        Ok(())
    }
}

fn ensure_field(entity: &'static str, fields: &[&str], field: &str) -> Result<(), ValidationError> {
    if fields.iter().any(|known| *known == field) {
        Ok(())
    } else {
        Err(ValidationError::UnknownField {
            entity,
            field: field.to_string(),
        })
    }
}

fn write_group(
    out: &mut SqlBuilder,
    items: &[Predicate],
    joiner: &str,
    empty: &str,
    entity: &'static str,
    fields: &[&str],
) -> Result<(), ValidationError> {
    if items.is_empty() {
        out.push(empty);
        return Ok(());
    }
    out.push("(");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(joiner);
        }
        item.write_sql(out, entity, fields)?;
    }
    out.push(")");
    Ok(())
}

/// Offset/limit window over a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    /// `None` removes the bound; guard against unbounded scans.
    pub limit: Option<u64>,
}

impl Page {
    pub const DEFAULT_LIMIT: u64 = 100;

    pub fn new(skip: u64, limit: Option<u64>) -> Self {
        Self { skip, limit }
    }

    pub fn unbounded() -> Self {
        Self {
            skip: 0,
            limit: None,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: Some(Self::DEFAULT_LIMIT),
        }
    }
}

/// Query input for `GenericModel::filter`: free-form predicates plus
/// field equality constraints, all conjoined, and a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub predicates: Vec<Predicate>,
    pub equals: Vec<(String, Value)>,
    pub page: Page,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matching(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.page.skip = skip;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.page.limit = limit;
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.equals.is_empty()
    }

    /// Writes ` WHERE …` when there is anything to filter on.
    pub fn write_where(
        &self,
        out: &mut SqlBuilder,
        entity: &'static str,
        fields: &[&str],
    ) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Ok(());
        }
        let clauses = self.predicates.iter().cloned().chain(
            self.equals
                .iter()
                .map(|(field, value)| Predicate::Eq(field.clone(), value.clone())),
        );
        out.push(" WHERE ");
        for (i, clause) in clauses.enumerate() {
            if i > 0 {
                out.push(" AND ");
            }
            clause.write_sql(out, entity, fields)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::dialect::Dialect;
    use serde_json::json;

    const FIELDS: &[&str] = &["id", "name", "age"];

    fn render(filter: &Filter, dialect: Dialect) -> (String, Vec<Value>) {
        let mut b = SqlBuilder::new(dialect);
        filter.write_where(&mut b, "Hero", FIELDS).unwrap();
        b.into_parts()
    }

    #[test]
    fn empty_filter_writes_nothing() {
        let (sql, args) = render(&Filter::new(), Dialect::Postgres);
        assert!(sql.is_empty());
        assert!(args.is_empty());
    }

    #[test]
    fn predicates_then_equalities_are_conjoined() {
        let filter = Filter::new()
            .matching(Predicate::gt("age", 30))
            .matching(Predicate::like("name", "Spider%").or(Predicate::is_null("name")))
            .eq("name", "Peter");
        let (sql, args) = render(&filter, Dialect::Postgres);
        assert_eq!(
            sql,
            r#" WHERE "age" > $1 AND ("name" LIKE $2 OR "name" IS NULL) AND "name" = $3"#
        );
        assert_eq!(args, vec![json!(30), json!("Spider%"), json!("Peter")]);
    }

    #[test]
    fn mysql_uses_backticks_and_question_marks() {
        let filter = Filter::new().matching(Predicate::is_in("id", [1, 2, 3]).not());
        let (sql, _) = render(&filter, Dialect::MySql);
        assert_eq!(sql, " WHERE NOT (`id` IN (?, ?, ?))");
    }

    #[test]
    fn equality_with_null_becomes_is_null() {
        let filter = Filter::new().eq("age", Value::Null);
        let (sql, args) = render(&filter, Dialect::Sqlite);
        assert_eq!(sql, r#" WHERE "age" IS NULL"#);
        assert!(args.is_empty());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let filter = Filter::new().eq("power", 9000);
        let mut b = SqlBuilder::new(Dialect::Postgres);
        let err = filter.write_where(&mut b, "Hero", FIELDS).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField { field, .. } if field == "power"));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let filter = Filter::new().matching(Predicate::In("id".into(), vec![]));
        let (sql, _) = render(&filter, Dialect::Postgres);
        assert_eq!(sql, " WHERE 1 = 0");
    }
}
