//! Populate plan preview
//!
//! Shows the plan a content query would use without touching the store.

use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use cdp_common::{PlanBuilder, PopulatePlan, Traversal};
use serde::{Deserialize, Serialize};

use super::content::resolve_content_type;
use super::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub depth: Option<i64>,
    /// Exclude the configured drop-list, as `custom` queries do
    #[serde(default)]
    pub custom: bool,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub uid: String,
    pub depth: u32,
    /// `null` when the model is omitted entirely
    pub plan: Option<PopulatePlan>,
}

/// GET /api/plan/:uid
pub async fn get_plan(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<PlanResponse>, ApiError> {
    let schema = resolve_content_type(&state.schemas, &uid)
        .ok_or_else(|| ApiError::UnknownContentType(uid.clone()))?;

    let depth = match query.depth {
        Some(depth) => state.settings.check_depth(depth)?,
        None => state.settings.default_depth,
    };

    let mut traversal = if query.custom {
        Traversal::excluding(state.settings.drop_list(&[]))
    } else {
        Traversal::new()
    };

    let plan = PlanBuilder::new(state.schemas.as_ref())
        .skip_creator_fields(state.settings.skip_creator_fields)
        .build(&schema.uid, depth, &mut traversal, &HashSet::new())?;

    Ok(Json(PlanResponse {
        uid: schema.uid.clone(),
        depth,
        plan,
    }))
}
