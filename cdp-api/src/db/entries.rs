//! Entry rows: loading, counting and inserting content documents

use std::collections::HashMap;

use cdp_common::{Error, Result};
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Row, SqlitePool};

/// Value bound into a compiled filter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
    Null,
}

/// One stored content entry
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: i64,
    pub document: Map<String, Value>,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Entry {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let raw: String = row.try_get("document")?;
        let document = match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => map,
            other => {
                return Err(Error::Internal(format!(
                    "Entry document is not an object: {}",
                    other
                )))
            }
        };

        Ok(Self {
            id: row.try_get("id")?,
            document,
            published_at: row.try_get("published_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Timestamps kept in columns rather than in the document
    pub fn system_value(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "createdAt" => Some(Value::String(self.created_at.clone())),
            "updatedAt" => Some(Value::String(self.updated_at.clone())),
            "publishedAt" => Some(
                self.published_at
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            _ => None,
        }
    }
}

const ENTRY_COLUMNS: &str = "id, document, published_at, created_at, updated_at";

fn bind_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Null => query.bind(Option::<String>::None),
        };
    }
    query
}

/// Entries of one model matching `where_sql`, ordered by id
///
/// `where_sql` is a trusted SQL fragment whose placeholders are filled from
/// `binds`.
pub async fn fetch_entries(
    pool: &SqlitePool,
    model_uid: &str,
    where_sql: &str,
    binds: &[SqlValue],
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<Entry>> {
    let sql = format!(
        "SELECT {} FROM entries WHERE model_uid = ? AND ({}) ORDER BY id LIMIT ? OFFSET ?",
        ENTRY_COLUMNS, where_sql
    );

    let query = bind_values(sqlx::query(&sql).bind(model_uid), binds)
        // LIMIT -1 is unbounded in SQLite
        .bind(limit.unwrap_or(-1))
        .bind(offset.unwrap_or(0).max(0));

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(Entry::from_row).collect()
}

/// Number of entries of one model matching `where_sql`
pub async fn count_entries(
    pool: &SqlitePool,
    model_uid: &str,
    where_sql: &str,
    binds: &[SqlValue],
) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) AS total FROM entries WHERE model_uid = ? AND ({})",
        where_sql
    );

    let row = bind_values(sqlx::query(&sql).bind(model_uid), binds)
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("total")?)
}

/// Entries of one model by id, in the order of `ids`; unknown ids are skipped
pub async fn fetch_by_ids(pool: &SqlitePool, model_uid: &str, ids: &[i64]) -> Result<Vec<Entry>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM entries WHERE model_uid = ? AND id IN ({})",
        ENTRY_COLUMNS, placeholders
    );

    let mut query = sqlx::query(&sql).bind(model_uid);
    for id in ids {
        query = query.bind(*id);
    }

    let by_id: HashMap<i64, Entry> = query
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| Entry::from_row(row).map(|entry| (entry.id, entry)))
        .collect::<Result<_>>()?;

    // Repeated ids repeat the entry
    Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
}

/// Entry count per model
pub async fn count_by_model(pool: &SqlitePool) -> Result<HashMap<String, i64>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT model_uid, COUNT(*) FROM entries GROUP BY model_uid",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Insert a document (a JSON object) for a model
pub async fn insert_entry(
    pool: &SqlitePool,
    model_uid: &str,
    id: i64,
    document: &Value,
    published_at: Option<&str>,
) -> Result<()> {
    if !document.is_object() {
        return Err(Error::InvalidInput(format!(
            "Document for {}#{} must be a JSON object",
            model_uid, id
        )));
    }

    sqlx::query("INSERT INTO entries (model_uid, id, document, published_at) VALUES (?, ?, ?, ?)")
        .bind(model_uid)
        .bind(id)
        .bind(document.to_string())
        .bind(published_at)
        .execute(pool)
        .await?;

    Ok(())
}
