//! Content type listing

use axum::{extract::State, Json};
use serde::Serialize;

use super::ApiError;
use crate::db::count_by_model;
use crate::AppState;

/// One registered content type
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeInfo {
    pub uid: String,
    pub api_name: Option<String>,
    pub collection_name: String,
    pub single_type: bool,
    pub attribute_count: usize,
    /// Stored entries, published or not
    pub entry_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ContentTypesResponse {
    pub content_types: Vec<ContentTypeInfo>,
}

/// GET /api/content-types
pub async fn list_content_types(
    State(state): State<AppState>,
) -> Result<Json<ContentTypesResponse>, ApiError> {
    let counts = count_by_model(&state.db).await?;

    let content_types = state
        .schemas
        .content_types()
        .into_iter()
        .map(|schema| ContentTypeInfo {
            uid: schema.uid.clone(),
            api_name: schema.api_name().map(str::to_string),
            collection_name: schema.collection_name.clone(),
            single_type: schema.kind == cdp_common::ModelKind::SingleType,
            attribute_count: schema.attributes.len(),
            entry_count: counts.get(&schema.uid).copied().unwrap_or(0),
        })
        .collect();

    Ok(Json(ContentTypesResponse { content_types }))
}
