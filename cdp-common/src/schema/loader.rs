//! Schema loading from a directory of JSON schema files
//!
//! Layout under the schema root:
//! - `api/<api>/content-types/<name>/schema.json` for content types
//! - `components/<category>/<name>.json` for components

use std::path::{Component, Path};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{AttributeSpec, ModelKind, ModelSchema, SchemaRegistry, ADMIN_USER_UID};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    kind: Option<String>,
    collection_name: String,
    #[serde(default)]
    info: RawInfo,
    #[serde(default)]
    plugin_options: RawPluginOptions,
    #[serde(default)]
    attributes: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfo {
    singular_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPluginOptions {
    #[serde(default)]
    i18n: RawI18n,
}

#[derive(Debug, Default, Deserialize)]
struct RawI18n {
    #[serde(default)]
    localized: bool,
}

#[derive(Debug, Deserialize)]
struct RawAttribute {
    #[serde(rename = "type")]
    kind: String,
    component: Option<String>,
    #[serde(default)]
    repeatable: bool,
    #[serde(default)]
    components: Vec<String>,
    target: Option<String>,
    relation: Option<String>,
    #[serde(default)]
    multiple: bool,
}

impl TryFrom<RawAttribute> for AttributeSpec {
    type Error = String;

    fn try_from(raw: RawAttribute) -> std::result::Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "component" => {
                let target = raw
                    .component
                    .ok_or_else(|| "component attribute without 'component'".to_string())?;
                Ok(AttributeSpec::Component {
                    target,
                    repeatable: raw.repeatable,
                })
            }
            "dynamiczone" => {
                if raw.components.is_empty() {
                    return Err("dynamic zone without 'components'".to_string());
                }
                Ok(AttributeSpec::DynamicZone {
                    targets: raw.components,
                })
            }
            // Morph relations carry no static target and cannot be planned
            "relation" => Ok(match raw.target {
                Some(target) => AttributeSpec::Relation {
                    target,
                    many: is_many_relation(raw.relation.as_deref()),
                },
                None => AttributeSpec::Scalar,
            }),
            "media" => Ok(AttributeSpec::Media {
                multiple: raw.multiple,
            }),
            _ => Ok(AttributeSpec::Scalar),
        }
    }
}

fn is_many_relation(relation: Option<&str>) -> bool {
    matches!(relation, Some(r) if r.ends_with("ToMany") || r == "manyWay")
}

impl SchemaRegistry {
    /// Load every schema under `root` on top of the built-in models
    pub fn load_dir(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "Schema directory not found: {}",
                root.display()
            )));
        }

        let mut registry = Self::with_builtins();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            let parts: Vec<&str> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => part.to_str(),
                    _ => None,
                })
                .collect();

            let content = std::fs::read_to_string(path)?;
            let schema = match parts.as_slice() {
                ["api", api, "content-types", name, "schema.json"] => {
                    parse_content_type(api, name, &content)
                }
                ["components", category, file] => {
                    let name = file.trim_end_matches(".json");
                    parse_component(category, name, &content)
                }
                _ => {
                    debug!("Ignoring non-schema file {}", path.display());
                    continue;
                }
            }
            .map_err(|reason| Error::InvalidSchema {
                path: path.display().to_string(),
                reason,
            })?;

            debug!("Loaded schema {} ({})", schema.uid, schema.collection_name);
            registry.register(schema);
        }

        info!(
            "Loaded {} schemas ({} content types) from {}",
            registry.len(),
            registry.content_types().len(),
            root.display()
        );

        Ok(registry)
    }
}

/// Parse a content type schema; adds the system attributes every content
/// type carries (timestamps, creator relations, localization fields)
pub fn parse_content_type(api: &str, dir_name: &str, content: &str) -> std::result::Result<ModelSchema, String> {
    let raw: RawSchema = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let kind = match raw.kind.as_deref() {
        Some("singleType") => ModelKind::SingleType,
        Some("collectionType") | None => ModelKind::CollectionType,
        Some(other) => return Err(format!("unknown content type kind '{}'", other)),
    };
    let singular = raw.info.singular_name.as_deref().unwrap_or(dir_name);
    let uid = format!("api::{}.{}", api, singular);
    let localized = raw.plugin_options.i18n.localized;

    let mut schema = ModelSchema::new(uid.clone(), raw.collection_name, kind);
    for (name, value) in raw.attributes {
        schema.push_attribute(name, parse_attribute(value)?);
    }

    for name in ["createdAt", "updatedAt", "publishedAt"] {
        schema.push_attribute(name, AttributeSpec::Scalar);
    }
    for name in ["createdBy", "updatedBy"] {
        schema.push_attribute(name, AttributeSpec::relation(ADMIN_USER_UID));
    }
    if localized {
        schema.push_attribute("localizations", AttributeSpec::relation_many(uid));
        schema.push_attribute("locale", AttributeSpec::Scalar);
    }

    Ok(schema)
}

/// Parse a component schema (`<category>.<name>`)
pub fn parse_component(category: &str, name: &str, content: &str) -> std::result::Result<ModelSchema, String> {
    let raw: RawSchema = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut schema = ModelSchema::new(
        format!("{}.{}", category, name),
        raw.collection_name,
        ModelKind::Component,
    );
    for (attr, value) in raw.attributes {
        schema.push_attribute(attr, parse_attribute(value)?);
    }

    Ok(schema)
}

fn parse_attribute(value: Value) -> std::result::Result<AttributeSpec, String> {
    let raw: RawAttribute = serde_json::from_value(value).map_err(|e| e.to_string())?;
    AttributeSpec::try_from(raw)
}
