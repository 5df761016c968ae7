//! Content query API
//!
//! `GET /api/content/:uid` with optional `populate`, `fields`, `filters`,
//! `locale`, `limit` and `offset` query parameters. The `populate` directive
//! selects the response shape: plain rows, `deep` populated rows or `custom`
//! sanitized data.

use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use cdp_common::{sanitize, ModelSchema, PlanBuilder, PopulatePlan, SchemaRegistry, Traversal};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::ApiError;
use crate::directive::{PopulateDirective, PopulateMode};
use crate::pagination::calculate_pagination;
use crate::query::{find_published, find_with_fallback, FindParams, QueryExecutor, SqliteExecutor};
use crate::response::{collapse_rows, CustomResponse, DataResponse, Meta};
use crate::AppState;

/// Query parameters for content queries
#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    /// Populate directive (`deep,3` / `custom,4,createdAt,@price`)
    pub populate: Option<String>,
    /// Comma-separated root attributes to populate
    pub fields: Option<String>,
    /// JSON filter object
    pub filters: Option<String>,
    pub locale: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/content/:uid
pub async fn get_content(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Response, ApiError> {
    let schema = resolve_content_type(&state.schemas, &uid)
        .ok_or_else(|| ApiError::UnknownContentType(uid.clone()))?;
    let model_uid = schema.uid.as_str();

    let directive = match query.populate.as_deref() {
        Some(raw) => PopulateDirective::parse(raw, &state.settings)?,
        None => None,
    };
    let filters = request_filters(&query)?;
    let field_filter = field_filter(query.fields.as_deref());

    if let Some(limit) = query.limit {
        if limit < 1 {
            return Err(ApiError::InvalidInput(format!(
                "limit must be at least 1, got {}",
                limit
            )));
        }
    }

    let populate = match &directive {
        Some(directive) => build_plan(&state, model_uid, directive, &field_filter)?,
        None => None,
    };
    debug!(model = model_uid, populate = ?populate, "Resolved populate plan");

    let executor = SqliteExecutor::new(state.db.clone(), state.schemas.clone());
    let params = FindParams {
        populate,
        filters,
        limit: query.limit,
        offset: query.offset,
    };

    let custom = directive
        .as_ref()
        .filter(|directive| directive.mode == PopulateMode::Custom);

    let outcome = match custom {
        Some(_) => find_with_fallback(&executor, model_uid, params).await?,
        None => find_published(&executor, model_uid, params).await?,
    };

    let pagination = match query.limit {
        Some(limit) => {
            let total = executor.count(model_uid, &outcome.filters).await?;
            calculate_pagination(total, limit, query.offset.unwrap_or(0))
        }
        None => None,
    };
    let meta = Meta { pagination };

    let Some(directive) = custom else {
        return Ok(Json(DataResponse {
            data: outcome.rows,
            meta,
        })
        .into_response());
    };

    let config = state
        .settings
        .sanitization_config(&directive.kept_fields, &directive.specific_fields);
    let sanitized = sanitize(Value::Array(outcome.rows), &config, &state.content_types);

    let rows = match sanitized.data {
        Value::Array(rows) => rows,
        other => vec![other],
    };
    let specific_fields = if directive.specific_fields.is_empty() {
        None
    } else {
        Some(sanitized.specific_fields)
    };

    Ok(Json(CustomResponse {
        custom_data: collapse_rows(rows),
        meta,
        specific_fields,
    })
    .into_response())
}

/// Content type by uid or by its API directory name
pub(crate) fn resolve_content_type<'a>(schemas: &'a SchemaRegistry, identifier: &str) -> Option<&'a ModelSchema> {
    match schemas.get(identifier) {
        Some(schema) if schema.is_content_type() => Some(schema),
        Some(_) => None,
        None => schemas
            .content_types()
            .into_iter()
            .find(|schema| schema.api_name() == Some(identifier)),
    }
}

/// Populate plan for a directive; the drop-list is excluded in `custom` mode
fn build_plan(
    state: &AppState,
    model_uid: &str,
    directive: &PopulateDirective,
    field_filter: &HashSet<String>,
) -> Result<Option<PopulatePlan>, ApiError> {
    let depth = directive.depth_or(state.settings.default_depth);
    let mut traversal = match directive.mode {
        PopulateMode::Deep => Traversal::new(),
        PopulateMode::Custom => Traversal::excluding(state.settings.drop_list(&directive.kept_fields)),
    };

    let plan = PlanBuilder::new(state.schemas.as_ref())
        .skip_creator_fields(state.settings.skip_creator_fields)
        .build(model_uid, depth, &mut traversal, field_filter)?;
    Ok(plan)
}

/// Request filters with the `locale` shorthand folded in
fn request_filters(query: &ContentQuery) -> Result<Value, ApiError> {
    let filters = match query.filters.as_deref().map(str::trim) {
        None | Some("") => json!({}),
        Some(raw) => serde_json::from_str::<Value>(raw)
            .map_err(|e| ApiError::InvalidInput(format!("filters is not valid JSON: {}", e)))?,
    };
    if !filters.is_object() {
        return Err(ApiError::InvalidInput("filters must be a JSON object".to_string()));
    }

    let Some(locale) = query.locale.as_deref() else {
        return Ok(filters);
    };

    let locale_filter = json!({ "locale": locale });
    if filters.as_object().map_or(true, |map| map.is_empty()) {
        Ok(locale_filter)
    } else {
        Ok(json!({ "$and": [filters, locale_filter] }))
    }
}

fn field_filter(fields: Option<&str>) -> HashSet<String> {
    fields
        .map(|fields| {
            fields
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
