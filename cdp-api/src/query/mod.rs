//! Query execution against the content store
//!
//! [`QueryExecutor`] is the seam between request handling and storage:
//! handlers only see populated JSON rows and counts. [`find_with_fallback`]
//! adds the published predicate and the empty-result retry on top of any
//! executor.

pub mod filter;
mod hydrate;

use std::sync::Arc;

use async_trait::async_trait;
use cdp_common::{PopulatePlan, Result, SchemaProvider, SchemaRegistry};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db;
use hydrate::Hydrator;

pub use hydrate::COMPONENT_KEY;

/// Parameters of one `find_many` call
#[derive(Debug, Clone, Default)]
pub struct FindParams {
    /// Attributes to expand; `None` returns scalars only
    pub populate: Option<PopulatePlan>,
    /// Filter object (`{}` matches everything)
    pub filters: Value,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Storage-side query interface
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Populated rows of `model_uid` matching `params`, ordered by id
    async fn find_many(&self, model_uid: &str, params: &FindParams) -> Result<Vec<Value>>;

    /// Number of rows of `model_uid` matching `filters`
    async fn count(&self, model_uid: &str, filters: &Value) -> Result<i64>;
}

/// Executor over the SQLite `entries` store
#[derive(Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
    schemas: Arc<SchemaRegistry>,
}

impl SqliteExecutor {
    pub fn new(pool: SqlitePool, schemas: Arc<SchemaRegistry>) -> Self {
        Self { pool, schemas }
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn find_many(&self, model_uid: &str, params: &FindParams) -> Result<Vec<Value>> {
        // Unknown models fail before touching the store
        self.schemas.schema(model_uid)?;

        let compiled = filter::compile(&params.filters)?;
        let entries = db::fetch_entries(
            &self.pool,
            model_uid,
            &compiled.sql,
            &compiled.binds,
            params.limit,
            params.offset,
        )
        .await?;
        debug!(model = model_uid, rows = entries.len(), "Fetched entries");

        let hydrator = Hydrator::new(&self.pool, &self.schemas);
        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            rows.push(hydrator.entry(model_uid, entry, params.populate.as_ref()).await?);
        }
        Ok(rows)
    }

    async fn count(&self, model_uid: &str, filters: &Value) -> Result<i64> {
        self.schemas.schema(model_uid)?;
        let compiled = filter::compile(filters)?;
        db::count_entries(&self.pool, model_uid, &compiled.sql, &compiled.binds).await
    }
}

/// Predicate restricting results to published entries
pub fn published_predicate() -> Value {
    json!({ "publishedAt": { "$null": false } })
}

/// Result of [`find_with_fallback`]
#[derive(Debug, Clone, PartialEq)]
pub struct FindOutcome {
    pub rows: Vec<Value>,
    /// Filters of the query that produced `rows`
    pub filters: Value,
    /// Whether the request filters were dropped by the empty-result retry
    pub fell_back: bool,
}

/// Find published rows matching the request filters
pub async fn find_published<E: QueryExecutor + ?Sized>(
    executor: &E,
    model_uid: &str,
    params: FindParams,
) -> Result<FindOutcome> {
    let filtered = FindParams {
        filters: with_published(&params.filters),
        ..params
    };

    let rows = executor.find_many(model_uid, &filtered).await?;
    Ok(FindOutcome {
        rows,
        filters: filtered.filters,
        fell_back: false,
    })
}

/// Find published rows, retrying once without the request filters when they
/// match nothing.
///
/// The retry is skipped when the request filters use explicit comparison or
/// inclusion operators: an empty result is then the correct answer.
pub async fn find_with_fallback<E: QueryExecutor + ?Sized>(
    executor: &E,
    model_uid: &str,
    params: FindParams,
) -> Result<FindOutcome> {
    let requested = params.filters.clone();
    let retry = FindParams {
        filters: Value::Null,
        ..params.clone()
    };

    let outcome = find_published(executor, model_uid, params).await?;
    if !outcome.rows.is_empty()
        || is_empty_filter(&requested)
        || filter::uses_comparison_operators(&requested)
    {
        return Ok(outcome);
    }

    info!(
        model = model_uid,
        filters = %requested,
        "No entries matched filters, retrying with published entries only"
    );

    let unfiltered = FindParams {
        filters: with_published(&Value::Null),
        ..retry
    };
    let rows = executor.find_many(model_uid, &unfiltered).await?;
    Ok(FindOutcome {
        rows,
        filters: unfiltered.filters,
        fell_back: true,
    })
}

fn is_empty_filter(filters: &Value) -> bool {
    match filters {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// `{"$and": [<filters>, <published>]}`, flattening an existing top-level `$and`
fn with_published(filters: &Value) -> Value {
    let mut clauses = match filters {
        Value::Object(map) if map.len() == 1 && map.get("$and").map_or(false, Value::is_array) => map
            .get("$and")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        filters if is_empty_filter(filters) => Vec::new(),
        filters => vec![filters.clone()],
    };
    clauses.push(published_predicate());
    json!({ "$and": clauses })
}
