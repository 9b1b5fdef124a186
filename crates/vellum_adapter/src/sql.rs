//! Minimal SQL builder.
//!
//! The builder accumulates text fragments and positional parameters and
//! understands only what differs between backends: placeholder syntax and
//! list expansion. It is deliberately not a query DSL; adapters write SQL
//! by hand and use the builder for parameter bookkeeping.

/// Placeholder dialect of a SQL backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `?1`, `?2`, ... (sqlite).
    Sqlite,
    /// `$1`, `$2`, ... (postgres).
    Postgres,
}

impl Dialect {
    fn placeholder(self, position: usize) -> String {
        match self {
            Self::Sqlite => format!("?{position}"),
            Self::Postgres => format!("${position}"),
        }
    }
}

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A positional SQL parameter value.
///
/// This is the full set of scalar types the logical model needs; backends
/// convert to their driver's parameter representation.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// 64-bit integer (also used for booleans on backends without a
    /// native boolean type).
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Text.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Timestamp (text-encoded on backends without a native type).
    Timestamp(DateTime<Utc>),
    /// Uuid (text-encoded on backends without a native type).
    Uuid(Uuid),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// A finished query: SQL text plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The SQL text with dialect-specific placeholders.
    pub sql: String,
    /// Positional parameters, in placeholder order.
    pub params: Vec<SqlValue>,
}

/// Accumulates SQL fragments and parameters.
///
/// ```rust,ignore
/// let mut qb = QueryBuilder::new(Dialect::Sqlite);
/// qb.push("SELECT * FROM entities WHERE name =").bind("hello");
/// qb.push("AND type IN").bind_list(["Foo", "Bar"]);
/// let query = qb.finish();
/// assert_eq!(
///     query.sql,
///     "SELECT * FROM entities WHERE name = ?1 AND type IN (?2, ?3)"
/// );
/// ```
#[derive(Debug)]
pub struct QueryBuilder {
    dialect: Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl QueryBuilder {
    /// Creates an empty builder for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Appends a SQL fragment, inserting a separating space if needed.
    pub fn push(&mut self, fragment: &str) -> &mut Self {
        if !self.sql.is_empty() && !self.sql.ends_with(' ') && !fragment.starts_with(' ') {
            self.sql.push(' ');
        }
        self.sql.push_str(fragment);
        self
    }

    /// Appends a placeholder for the given value.
    pub fn bind(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.params.push(value.into());
        let placeholder = self.dialect.placeholder(self.params.len());
        self.push(&placeholder);
        self
    }

    /// Appends a parenthesized, comma-separated placeholder list.
    ///
    /// An empty iterator expands to `(NULL)` so that `IN ()` (a syntax
    /// error on both backends) can never be produced.
    pub fn bind_list<I, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let mut list = String::from("(");
        let mut first = true;
        for value in values {
            if !first {
                list.push_str(", ");
            }
            first = false;
            self.params.push(value.into());
            list.push_str(&self.dialect.placeholder(self.params.len()));
        }
        if first {
            list.push_str("NULL");
        }
        list.push(')');
        self.push(&list);
        self
    }

    /// Finishes the builder, returning the query.
    pub fn finish(self) -> Query {
        Query {
            sql: self.sql,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_placeholders() {
        let mut qb = QueryBuilder::new(Dialect::Sqlite);
        qb.push("SELECT id FROM entities WHERE name =").bind("a");
        qb.push("AND version =").bind(3i64);
        let q = qb.finish();
        assert_eq!(q.sql, "SELECT id FROM entities WHERE name = ?1 AND version = ?2");
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn postgres_placeholders() {
        let mut qb = QueryBuilder::new(Dialect::Postgres);
        qb.push("SELECT id FROM entities WHERE name =").bind("a");
        let q = qb.finish();
        assert_eq!(q.sql, "SELECT id FROM entities WHERE name = $1");
    }

    #[test]
    fn list_expansion() {
        let mut qb = QueryBuilder::new(Dialect::Sqlite);
        qb.push("WHERE type IN").bind_list(["Foo", "Bar", "Baz"]);
        let q = qb.finish();
        assert_eq!(q.sql, "WHERE type IN (?1, ?2, ?3)");
    }

    #[test]
    fn empty_list_expands_to_null() {
        let mut qb = QueryBuilder::new(Dialect::Postgres);
        qb.push("WHERE type IN").bind_list(Vec::<String>::new());
        let q = qb.finish();
        assert_eq!(q.sql, "WHERE type IN (NULL)");
        assert!(q.params.is_empty());
    }

    #[test]
    fn option_binds_null() {
        let mut qb = QueryBuilder::new(Dialect::Sqlite);
        qb.push("UPDATE entities SET published_name =")
            .bind(None::<&str>);
        let q = qb.finish();
        assert_eq!(q.params, vec![SqlValue::Null]);
    }
}
