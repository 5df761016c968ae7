//! Response tree sanitizer
//!
//! Rewrites a populated query result into a pruned, client-friendly shape.
//! The tree is rebuilt bottom-up: every child is sanitized before the rules
//! of its parent object run, in this order:
//!
//! 1. drop configured fields
//! 2. collapse same-name wrappers (`{hero: {hero: x}}` → `{hero: x}`)
//! 3. collapse content-type wrappers (`{block: {"api::card.card": x}}` → `{block: x}`)
//! 4. project image records onto the allow-list
//! 5. record the specific-fields projection of the resulting object

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::schema::ContentTypeRegistry;

/// Fields every image record carries; all three identify an image
const IMAGE_MARKERS: [&str; 3] = ["height", "width", "url"];

/// `formats.<name>.url` → synthesized field
const IMAGE_FORMATS: [(&str, &str); 4] = [
    ("thumbnail", "urlThumb"),
    ("medium", "urlM"),
    ("small", "urlS"),
    ("large", "urlL"),
];

/// Sanitization options, fixed for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationConfig {
    /// Removed from every object
    pub fields_to_drop: HashSet<String>,
    /// Fields kept on image records, in output order
    pub image_allow_list: Vec<String>,
    pub collapse_same_name_wrappers: bool,
    pub collapse_type_wrappers: bool,
    /// Add `urlThumb`, `urlM`, `urlS`, `urlL` to image records
    pub expand_image_formats: bool,
    /// Replace image records by their url
    pub inline_images: bool,
    /// Fields harvested into the side projection; empty disables extraction
    pub specific_fields: HashSet<String>,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            fields_to_drop: crate::config::default_unnecessary_fields().into_iter().collect(),
            image_allow_list: crate::config::default_fields_to_keep_in_image(),
            collapse_same_name_wrappers: true,
            collapse_type_wrappers: true,
            expand_image_formats: false,
            inline_images: false,
            specific_fields: HashSet::new(),
        }
    }
}

/// Result of one sanitization run
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub data: Value,
    /// Projections onto the specific fields, in post-order
    pub specific_fields: Vec<Value>,
}

/// Sanitize `tree`; the accumulator is private to this call
pub fn sanitize(tree: Value, config: &SanitizationConfig, registry: &ContentTypeRegistry) -> Sanitized {
    let mut sanitizer = Sanitizer {
        config,
        registry,
        extracted: Vec::new(),
    };
    let data = sanitizer.visit(tree);

    let specific_fields = sanitizer
        .extracted
        .into_iter()
        .filter(|entry| entry.values().any(is_meaningful))
        .map(Value::Object)
        .collect();

    Sanitized {
        data,
        specific_fields,
    }
}

struct Sanitizer<'a> {
    config: &'a SanitizationConfig,
    registry: &'a ContentTypeRegistry,
    extracted: Vec<Map<String, Value>>,
}

impl Sanitizer<'_> {
    fn visit(&mut self, value: Value) -> Value {
        match value {
            Value::Object(object) => {
                let children: Map<String, Value> = object
                    .into_iter()
                    .map(|(key, child)| (key, self.visit(child)))
                    .collect();
                self.apply_rules(children)
            }
            Value::Array(items) => Value::Array(items.into_iter().map(|item| self.visit(item)).collect()),
            leaf => leaf,
        }
    }

    fn apply_rules(&mut self, object: Map<String, Value>) -> Value {
        let mut object = self.drop_fields(object);

        if self.config.collapse_same_name_wrappers {
            object = object
                .into_iter()
                .map(|(key, value)| {
                    let value = collapse_same_name(&key, value);
                    (key, value)
                })
                .collect();
        }

        if self.config.collapse_type_wrappers && !self.registry.is_empty() {
            object = object
                .into_iter()
                .map(|(key, value)| (key, self.collapse_type_wrapper(value)))
                .collect();
        }

        let value = self.project_image(object);

        if !self.config.specific_fields.is_empty() {
            if let Value::Object(object) = &value {
                self.extract(object);
            }
        }

        value
    }

    fn drop_fields(&self, object: Map<String, Value>) -> Map<String, Value> {
        if self.config.fields_to_drop.is_empty() {
            return object;
        }
        object
            .into_iter()
            .filter(|(key, _)| !self.config.fields_to_drop.contains(key))
            .collect()
    }

    fn collapse_type_wrapper(&self, value: Value) -> Value {
        match value {
            Value::Object(inner) if self.is_type_wrapper(&inner) => inner
                .into_iter()
                .next()
                .map_or(Value::Null, |(_, payload)| payload),
            other => other,
        }
    }

    fn is_type_wrapper(&self, object: &Map<String, Value>) -> bool {
        object.len() == 1 && object.keys().all(|key| self.registry.contains(key))
    }

    fn project_image(&self, mut object: Map<String, Value>) -> Value {
        if !is_image(&object) {
            return Value::Object(object);
        }

        if self.config.inline_images {
            return object.remove("url").unwrap_or(Value::Null);
        }

        let format_urls: Vec<(&str, Value)> = if self.config.expand_image_formats {
            match object.get("formats") {
                Some(Value::Object(formats)) => IMAGE_FORMATS
                    .iter()
                    .filter_map(|(format, field)| format_url(formats.get(*format)?).map(|url| (*field, url)))
                    .collect(),
                _ => Vec::new(),
            }
        } else {
            Vec::new()
        };

        let mut image = Map::new();
        for field in &self.config.image_allow_list {
            if let Some(value) = object.remove(field).filter(|v| !v.is_null()) {
                image.insert(field.clone(), value);
            }
        }
        for (field, url) in format_urls {
            image.insert(field.to_string(), url);
        }

        Value::Object(image)
    }

    fn extract(&mut self, object: &Map<String, Value>) {
        let projection: Map<String, Value> = object
            .iter()
            .filter(|(key, _)| self.config.specific_fields.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if !projection.is_empty() {
            self.extracted.push(projection);
        }
    }
}

/// Unwrap `value` while it is an object holding `key`.
///
/// Each step descends one object level, so the nesting depth of the value
/// bounds the loop.
fn collapse_same_name(key: &str, value: Value) -> Value {
    let bound = nesting_depth(&value);
    let mut value = value;

    for _ in 0..bound {
        match value {
            Value::Object(mut inner) => match inner.remove(key) {
                Some(next) => value = next,
                None => return Value::Object(inner),
            },
            other => return other,
        }
    }

    value
}

fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::Object(object) => 1 + object.values().map(nesting_depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(nesting_depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn is_image(object: &Map<String, Value>) -> bool {
    IMAGE_MARKERS
        .iter()
        .all(|field| object.get(*field).is_some_and(|v| !v.is_null()))
}

/// Url of one entry of `formats`; the entry may already be inlined to its url
fn format_url(format: &Value) -> Option<Value> {
    match format {
        Value::Object(entry) => entry.get("url").filter(|url| !url.is_null()).cloned(),
        Value::String(_) => Some(format.clone()),
        _ => None,
    }
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(object) => !object.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ContentTypeRegistry {
        ContentTypeRegistry::from_identifiers(["api::card.card", "card"])
    }

    fn run(tree: Value, config: &SanitizationConfig) -> Sanitized {
        sanitize(tree, config, &registry())
    }

    #[test]
    fn test_drops_default_fields() {
        let out = run(
            json!({ "title": "t", "createdAt": "2024-01-01", "updatedAt": "2024-01-02" }),
            &SanitizationConfig::default(),
        );
        assert_eq!(out.data, json!({ "title": "t" }));
    }

    #[test]
    fn test_drops_fields_at_every_level() {
        let out = run(
            json!({ "items": [ { "id": 1, "publishedAt": "x" }, { "id": 2, "createdBy": { "id": 9 } } ] }),
            &SanitizationConfig::default(),
        );
        assert_eq!(out.data, json!({ "items": [ { "id": 1 }, { "id": 2 } ] }));
    }

    #[test]
    fn test_collapses_same_name_wrapper() {
        let out = run(json!({ "hero": { "hero": { "title": "t" } } }), &SanitizationConfig::default());
        assert_eq!(out.data, json!({ "hero": { "title": "t" } }));
    }

    #[test]
    fn test_same_name_collapse_reaches_fixpoint() {
        // The inner levels are sanitized first, so the chain collapses completely
        let out = run(
            json!({ "seo": { "seo": { "seo": { "seo": "deep" } } } }),
            &SanitizationConfig::default(),
        );
        assert_eq!(out.data, json!({ "seo": "deep" }));
    }

    #[test]
    fn test_same_name_collapse_disabled() {
        let config = SanitizationConfig {
            collapse_same_name_wrappers: false,
            ..SanitizationConfig::default()
        };
        let tree = json!({ "hero": { "hero": { "title": "t" } } });
        assert_eq!(run(tree.clone(), &config).data, tree);
    }

    #[test]
    fn test_collapses_type_wrapper() {
        let out = run(
            json!({ "block": { "api::card.card": { "title": "t" } } }),
            &SanitizationConfig::default(),
        );
        assert_eq!(out.data, json!({ "block": { "title": "t" } }));
    }

    #[test]
    fn test_type_wrapper_requires_single_known_key() {
        let tree = json!({
            "a": { "api::card.card": { "title": "t" }, "other": 1 },
            "b": { "unknown": { "title": "t" } }
        });
        let out = run(tree.clone(), &SanitizationConfig::default());
        assert_eq!(out.data, tree);
    }

    #[test]
    fn test_type_wrapper_ignored_with_empty_registry() {
        let tree = json!({ "block": { "api::card.card": { "title": "t" } } });
        let out = sanitize(tree.clone(), &SanitizationConfig::default(), &ContentTypeRegistry::default());
        assert_eq!(out.data, tree);
    }

    #[test]
    fn test_image_projection_with_formats() {
        let config = SanitizationConfig {
            expand_image_formats: true,
            ..SanitizationConfig::default()
        };
        let out = run(
            json!({
                "height": 10,
                "width": 20,
                "url": "/a.png",
                "alternativeText": "x",
                "formats": { "thumbnail": { "url": "/t.png" } }
            }),
            &config,
        );

        assert_eq!(out.data, json!({ "url": "/a.png", "alternativeText": "x", "urlThumb": "/t.png" }));
        let keys: Vec<&String> = out.data.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["url", "alternativeText", "urlThumb"]);
    }

    #[test]
    fn test_image_projection_without_formats() {
        let out = run(
            json!({
                "cover": {
                    "id": 3, "name": "a.png", "height": 10, "width": 20, "url": "/a.png",
                    "alternativeText": null, "mime": "image/png",
                    "formats": { "small": { "url": "/s.png", "height": 5, "width": 10 } }
                }
            }),
            &SanitizationConfig::default(),
        );
        assert_eq!(out.data, json!({ "cover": { "url": "/a.png" } }));
    }

    #[test]
    fn test_nested_format_records_are_images_too() {
        let config = SanitizationConfig {
            expand_image_formats: true,
            image_allow_list: vec!["url".to_string()],
            ..SanitizationConfig::default()
        };
        let out = run(
            json!({
                "height": 100, "width": 200, "url": "/a.png",
                "formats": {
                    "small": { "url": "/s.png", "height": 5, "width": 10, "size": 3 },
                    "large": { "url": "/l.png", "height": 50, "width": 100, "size": 30 }
                }
            }),
            &config,
        );
        assert_eq!(out.data, json!({ "url": "/a.png", "urlS": "/s.png", "urlL": "/l.png" }));
    }

    #[test]
    fn test_inline_images() {
        let config = SanitizationConfig {
            inline_images: true,
            ..SanitizationConfig::default()
        };
        let out = run(
            json!({ "title": "t", "cover": { "height": 1, "width": 1, "url": "/c.png" } }),
            &config,
        );
        assert_eq!(out.data, json!({ "title": "t", "cover": "/c.png" }));
    }

    #[test]
    fn test_partial_image_is_untouched() {
        let tree = json!({ "logo": { "width": 1, "url": "/c.png", "name": "c" } });
        assert_eq!(run(tree.clone(), &SanitizationConfig::default()).data, tree);
    }

    #[test]
    fn test_specific_field_extraction() {
        let config = SanitizationConfig {
            specific_fields: ["price".to_string()].into_iter().collect(),
            ..SanitizationConfig::default()
        };
        let tree = json!({
            "title": "shop",
            "products": [
                { "name": "a", "price": 10 },
                { "name": "b", "price": 20 }
            ]
        });
        let out = run(tree.clone(), &config);

        assert_eq!(out.data, tree);
        assert_eq!(out.specific_fields, vec![json!({ "price": 10 }), json!({ "price": 20 })]);
    }

    #[test]
    fn test_extraction_is_post_order_and_sees_transformed_objects() {
        let config = SanitizationConfig {
            specific_fields: ["tags".to_string(), "url".to_string()].into_iter().collect(),
            ..SanitizationConfig::default()
        };
        let out = run(
            json!({
                "tags": ["x"],
                "child": { "tags": [], "cover": { "height": 1, "width": 1, "url": "/c.png", "mime": "image/png" } }
            }),
            &config,
        );

        // child projects to {tags: []} and is filtered out as empty
        assert_eq!(
            out.specific_fields,
            vec![json!({ "url": "/c.png" }), json!({ "tags": ["x"] })]
        );
    }

    #[test]
    fn test_no_extraction_without_specific_fields() {
        let out = run(json!({ "price": 1 }), &SanitizationConfig::default());
        assert!(out.specific_fields.is_empty());
    }

    #[test]
    fn test_leaves_and_arrays_pass_through() {
        let config = SanitizationConfig::default();
        assert_eq!(run(json!("text"), &config).data, json!("text"));
        assert_eq!(run(json!(null), &config).data, json!(null));
        assert_eq!(run(json!([1, "a", [true]]), &config).data, json!([1, "a", [true]]));
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let config = SanitizationConfig {
            expand_image_formats: true,
            specific_fields: ["price".to_string()].into_iter().collect(),
            ..SanitizationConfig::default()
        };
        let tree = json!([
            {
                "id": 1,
                "title": "Home",
                "createdAt": "2024-01-01",
                "hero": { "hero": { "heading": "Hi", "updatedAt": "x" } },
                "blocks": [
                    { "card": { "title": "c", "price": 3 } },
                    { "__component": "blocks.quote", "text": "q" }
                ],
                "cover": {
                    "height": 10, "width": 20, "url": "/a.png", "alternativeText": "alt",
                    "formats": { "thumbnail": { "url": "/t.png", "height": 1, "width": 2 } }
                },
                "createdBy": { "id": 1, "firstname": "A" }
            }
        ]);

        let first = run(tree, &config);
        let second = run(first.data.clone(), &config);

        assert_eq!(second.data, first.data);
        assert_eq!(
            first.data,
            json!([
                {
                    "id": 1,
                    "title": "Home",
                    "hero": { "heading": "Hi" },
                    "blocks": [
                        { "card": { "title": "c", "price": 3 } },
                        { "__component": "blocks.quote", "text": "q" }
                    ],
                    "cover": { "url": "/a.png", "alternativeText": "alt", "urlThumb": "/t.png" }
                }
            ])
        );
    }
}
