//! Content schema model and the schema provider
//!
//! A [`ModelSchema`] describes one content type, component or built-in model:
//! its identifier, the physical collection name used for cycle detection and
//! its ordered attributes. Attribute variants form a closed enum so every
//! consumer matches them exhaustively.

mod builtin;
mod loader;
mod registry;

use std::collections::HashMap;

use crate::{Error, Result};

pub use builtin::{admin_user_schema, upload_file_schema};
pub use registry::ContentTypeRegistry;

/// Built-in media model referenced by every `Media` attribute
pub const UPLOAD_FILE_UID: &str = "plugin::upload.file";

/// Built-in administrator model referenced by `createdBy` / `updatedBy`
pub const ADMIN_USER_UID: &str = "admin::user";

/// Back-reference on the upload model that is never populated
const UPLOAD_RELATED_ATTRIBUTE: &str = "related";

/// Kind of model a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    CollectionType,
    SingleType,
    Component,
    BuiltIn,
}

/// Attribute definition, tagged by how it expands during population
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSpec {
    /// Plain value stored inline; never expanded
    Scalar,
    /// Embedded component (array of components when repeatable)
    Component { target: String, repeatable: bool },
    /// Polymorphic slot holding components of any of `targets`
    DynamicZone { targets: Vec<String> },
    /// Edge to another model, possibly the owning model itself
    Relation { target: String, many: bool },
    /// Reference(s) to upload records; always a populate leaf
    Media { multiple: bool },
}

impl AttributeSpec {
    pub fn component(target: impl Into<String>) -> Self {
        AttributeSpec::Component {
            target: target.into(),
            repeatable: false,
        }
    }

    pub fn dynamic_zone<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeSpec::DynamicZone {
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    pub fn relation(target: impl Into<String>) -> Self {
        AttributeSpec::Relation {
            target: target.into(),
            many: false,
        }
    }

    pub fn relation_many(target: impl Into<String>) -> Self {
        AttributeSpec::Relation {
            target: target.into(),
            many: true,
        }
    }

    pub fn media() -> Self {
        AttributeSpec::Media { multiple: false }
    }

    /// Model identifiers this attribute can point at
    pub fn targets(&self) -> Vec<&str> {
        match self {
            AttributeSpec::Scalar => Vec::new(),
            AttributeSpec::Component { target, .. } | AttributeSpec::Relation { target, .. } => {
                vec![target.as_str()]
            }
            AttributeSpec::DynamicZone { targets } => targets.iter().map(String::as_str).collect(),
            AttributeSpec::Media { .. } => vec![UPLOAD_FILE_UID],
        }
    }
}

/// Schema of a single model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    /// Logical model identifier (e.g. `api::article.article`, `shared.seo`)
    pub uid: String,
    /// Physical storage name; the cycle-detection key
    pub collection_name: String,
    pub kind: ModelKind,
    /// Attributes in declaration order
    pub attributes: Vec<(String, AttributeSpec)>,
}

impl ModelSchema {
    pub fn new(uid: impl Into<String>, collection_name: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            uid: uid.into(),
            collection_name: collection_name.into(),
            kind,
            attributes: Vec::new(),
        }
    }

    /// Append an attribute (builder style)
    pub fn with_attribute(mut self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        self.push_attribute(name, spec);
        self
    }

    /// Append an attribute, replacing an existing one with the same name in place
    pub fn push_attribute(&mut self, name: impl Into<String>, spec: AttributeSpec) {
        let name = name.into();
        match self.attributes.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = spec,
            None => self.attributes.push((name, spec)),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, spec)| spec)
    }

    /// Attributes considered during population.
    ///
    /// The upload model's `related` back-reference is left out so a media
    /// record never exposes the unrelated records attached to it.
    pub fn population_attributes(&self) -> impl Iterator<Item = (&str, &AttributeSpec)> {
        let skip_related = self.uid == UPLOAD_FILE_UID;
        self.attributes
            .iter()
            .filter(move |(name, _)| !(skip_related && name == UPLOAD_RELATED_ATTRIBUTE))
            .map(|(name, spec)| (name.as_str(), spec))
    }

    /// Collection and single types are top-level, queryable content types
    pub fn is_content_type(&self) -> bool {
        matches!(self.kind, ModelKind::CollectionType | ModelKind::SingleType)
    }

    /// API directory name for `api::<name>.<type>` identifiers
    pub fn api_name(&self) -> Option<&str> {
        self.uid
            .strip_prefix("api::")
            .and_then(|rest| rest.split('.').next())
            .filter(|name| !name.is_empty())
    }
}

/// Resolves model identifiers to schemas
///
/// Unknown identifiers are a fatal [`Error::SchemaResolution`].
pub trait SchemaProvider {
    fn schema(&self, uid: &str) -> Result<&ModelSchema>;
}

/// In-memory schema provider loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ModelSchema>,
}

impl SchemaRegistry {
    /// Empty registry without built-in models
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the built-in upload and admin user models
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(upload_file_schema());
        registry.register(admin_user_schema());
        registry
    }

    /// Register (or replace) a schema
    pub fn register(&mut self, schema: ModelSchema) {
        self.schemas.insert(schema.uid.clone(), schema);
    }

    pub fn get(&self, uid: &str) -> Option<&ModelSchema> {
        self.schemas.get(uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.schemas.contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Top-level content types, sorted by identifier
    pub fn content_types(&self) -> Vec<&ModelSchema> {
        let mut types: Vec<&ModelSchema> = self
            .schemas
            .values()
            .filter(|schema| schema.is_content_type())
            .collect();
        types.sort_by(|a, b| a.uid.cmp(&b.uid));
        types
    }

    /// `(owner uid, attribute, missing target)` for every attribute pointing
    /// at an unregistered model, sorted for stable reporting
    pub fn dangling_targets(&self) -> Vec<(String, String, String)> {
        let mut dangling = Vec::new();
        for schema in self.schemas.values() {
            for (name, spec) in &schema.attributes {
                for target in spec.targets() {
                    if !self.contains(target) {
                        dangling.push((schema.uid.clone(), name.clone(), target.to_string()));
                    }
                }
            }
        }
        dangling.sort();
        dangling
    }
}

impl SchemaProvider for SchemaRegistry {
    fn schema(&self, uid: &str) -> Result<&ModelSchema> {
        self.get(uid)
            .ok_or_else(|| Error::SchemaResolution(uid.to_string()))
    }
}
