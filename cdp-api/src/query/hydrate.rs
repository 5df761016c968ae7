//! Plan-driven hydration of stored documents into response objects
//!
//! Every object starts with `id` followed by the model's attributes in schema
//! order. Scalars are always present; components, dynamic zones, relations
//! and media only when the plan names the attribute. Relations and media are
//! stored as ids and loaded on demand.

use cdp_common::schema::UPLOAD_FILE_UID;
use cdp_common::{AttributeSpec, Error, PopulatePlan, Result, SchemaProvider, SchemaRegistry};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::db::{fetch_by_ids, Entry};

/// Key tagging each dynamic zone item with its component uid
pub const COMPONENT_KEY: &str = "__component";

pub(crate) struct Hydrator<'a> {
    pool: &'a SqlitePool,
    schemas: &'a SchemaRegistry,
}

impl<'a> Hydrator<'a> {
    pub(crate) fn new(pool: &'a SqlitePool, schemas: &'a SchemaRegistry) -> Self {
        Self { pool, schemas }
    }

    /// Hydrate one stored entry of `model_uid`
    pub(crate) async fn entry(
        &self,
        model_uid: &str,
        entry: &Entry,
        plan: Option<&PopulatePlan>,
    ) -> Result<Value> {
        let object = self
            .fill(model_uid, &entry.document, Some(entry), plan)
            .await?;
        Ok(Value::Object(object))
    }

    /// Build the object for `document`; `entry` supplies id and timestamps
    /// for stored rows, components carry their own (optional) id inline
    fn fill<'b>(
        &'b self,
        model_uid: &'b str,
        document: &'b Map<String, Value>,
        entry: Option<&'b Entry>,
        plan: Option<&'b PopulatePlan>,
    ) -> BoxFuture<'b, Result<Map<String, Value>>> {
        async move {
            let schema = self.schemas.schema(model_uid)?;
            let mut object = Map::new();

            match entry {
                Some(entry) => {
                    object.insert("id".to_string(), Value::from(entry.id));
                }
                None => {
                    if let Some(id) = document.get("id") {
                        object.insert("id".to_string(), id.clone());
                    }
                }
            }

            for (name, spec) in schema.population_attributes() {
                let raw = document.get(name).unwrap_or(&Value::Null);

                if let AttributeSpec::Scalar = spec {
                    let value = entry
                        .and_then(|entry| entry.system_value(name))
                        .unwrap_or_else(|| raw.clone());
                    object.insert(name.to_string(), value);
                    continue;
                }

                // Only expanded attributes make it into the response
                let Some(child) = plan.and_then(|plan| plan.child(name)) else {
                    continue;
                };

                let value = match spec {
                    AttributeSpec::Scalar => raw.clone(),
                    AttributeSpec::Component { target, repeatable } => {
                        self.component(target, raw, *repeatable, child).await?
                    }
                    AttributeSpec::DynamicZone { .. } => self.dynamic_zone(raw, child).await?,
                    AttributeSpec::Relation { target, many } => {
                        self.linked(target, raw, *many, child).await?
                    }
                    AttributeSpec::Media { multiple } => {
                        self.linked(UPLOAD_FILE_UID, raw, *multiple, child).await?
                    }
                };
                object.insert(name.to_string(), value);
            }

            Ok(object)
        }
        .boxed()
    }

    async fn component(
        &self,
        target: &str,
        raw: &Value,
        repeatable: bool,
        plan: &PopulatePlan,
    ) -> Result<Value> {
        match (raw, repeatable) {
            (Value::Object(inline), _) => {
                let object = self.fill(target, inline, None, Some(plan)).await?;
                Ok(if repeatable {
                    Value::Array(vec![Value::Object(object)])
                } else {
                    Value::Object(object)
                })
            }
            (Value::Array(items), _) => {
                let mut hydrated = Vec::with_capacity(items.len());
                for item in items {
                    let inline = as_object(item, target)?;
                    hydrated.push(Value::Object(self.fill(target, inline, None, Some(plan)).await?));
                }
                Ok(Value::Array(hydrated))
            }
            (Value::Null, true) => Ok(Value::Array(Vec::new())),
            (Value::Null, false) => Ok(Value::Null),
            (other, _) => Err(Error::Internal(format!(
                "Component {} stored as {}",
                target, other
            ))),
        }
    }

    async fn dynamic_zone(&self, raw: &Value, plan: &PopulatePlan) -> Result<Value> {
        let items = match raw {
            Value::Null => return Ok(Value::Array(Vec::new())),
            Value::Array(items) => items,
            other => {
                return Err(Error::Internal(format!(
                    "Dynamic zone stored as {}",
                    other
                )))
            }
        };

        let mut hydrated = Vec::with_capacity(items.len());
        for item in items {
            let inline = as_object(item, COMPONENT_KEY)?;
            let component_uid = inline
                .get(COMPONENT_KEY)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::Internal(format!("Dynamic zone item without {}", COMPONENT_KEY))
                })?;

            let mut object = Map::new();
            object.insert(
                COMPONENT_KEY.to_string(),
                Value::String(component_uid.to_string()),
            );
            object.extend(self.fill(component_uid, inline, None, Some(plan)).await?);
            hydrated.push(Value::Object(object));
        }
        Ok(Value::Array(hydrated))
    }

    /// Relation or media: load the referenced rows of `target`
    async fn linked(&self, target: &str, raw: &Value, many: bool, plan: &PopulatePlan) -> Result<Value> {
        let ids = referenced_ids(raw);
        let entries = fetch_by_ids(self.pool, target, &ids).await?;

        let mut hydrated = Vec::with_capacity(entries.len());
        for entry in &entries {
            hydrated.push(self.entry(target, entry, Some(plan)).await?);
        }

        if many {
            Ok(Value::Array(hydrated))
        } else {
            Ok(hydrated.into_iter().next().unwrap_or(Value::Null))
        }
    }
}

/// Ids stored for a relation or media attribute: a number, `{"id": n}`, or
/// an array of either
fn referenced_ids(raw: &Value) -> Vec<i64> {
    match raw {
        Value::Number(n) => n.as_i64().into_iter().collect(),
        Value::Object(map) => map.get("id").and_then(Value::as_i64).into_iter().collect(),
        Value::Array(items) => items.iter().flat_map(referenced_ids).collect(),
        _ => Vec::new(),
    }
}

fn as_object<'v>(value: &'v Value, context: &str) -> Result<&'v Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        Error::Internal(format!("Expected an object for {}, got {}", context, value))
    })
}
