//! Known top-level content-type identifiers
//!
//! Used by the sanitizer to recognize polymorphic wrapper objects keyed by a
//! content-type identifier.

use std::collections::BTreeSet;

use super::SchemaRegistry;

#[derive(Debug, Clone, Default)]
pub struct ContentTypeRegistry {
    identifiers: BTreeSet<String>,
}

impl ContentTypeRegistry {
    pub fn from_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }

    /// Every content type contributes its uid and its API directory name
    pub fn from_schemas(schemas: &SchemaRegistry) -> Self {
        let mut identifiers = BTreeSet::new();
        for schema in schemas.content_types() {
            identifiers.insert(schema.uid.clone());
            if let Some(api) = schema.api_name() {
                identifiers.insert(api.to_string());
            }
        }
        Self { identifiers }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    /// Identifiers in sorted order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ModelKind, ModelSchema};

    #[test]
    fn test_from_schemas_skips_components_and_builtins() {
        let mut schemas = SchemaRegistry::with_builtins();
        schemas.register(ModelSchema::new("api::card.card", "cards", ModelKind::CollectionType));
        schemas.register(ModelSchema::new("api::home.home", "homes", ModelKind::SingleType));
        schemas.register(ModelSchema::new("blocks.hero", "components_blocks_heroes", ModelKind::Component));

        let registry = ContentTypeRegistry::from_schemas(&schemas);
        let ids: Vec<&str> = registry.identifiers().collect();

        assert_eq!(ids, vec!["api::card.card", "api::home.home", "card", "home"]);
        assert!(!registry.contains("blocks.hero"));
        assert!(!registry.contains("plugin::upload.file"));
    }
}
