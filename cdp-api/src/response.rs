//! Response envelopes for content queries

use serde::Serialize;
use serde_json::Value;

use crate::pagination::PaginationMeta;

/// `meta` block; empty when no pagination was requested
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

/// Plain and `deep` responses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataResponse {
    pub data: Vec<Value>,
    pub meta: Meta,
}

/// `custom` responses
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResponse {
    pub custom_data: Value,
    pub meta: Meta,
    /// Present only when `@` fields were requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_fields: Option<Vec<Value>>,
}

/// `null` for no rows, the row itself for one, the array otherwise
pub fn collapse_rows(mut rows: Vec<Value>) -> Value {
    match rows.len() {
        0 => Value::Null,
        1 => rows.pop().unwrap_or(Value::Null),
        _ => Value::Array(rows),
    }
}
