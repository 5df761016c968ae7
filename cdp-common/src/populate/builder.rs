//! Populate plan builder
//!
//! Walks the schema graph from a root model and produces a [`PopulatePlan`]
//! bounded by depth. Cycles are cut by the traversal's visited collections:
//! once a collection has been entered, attributes carrying that name are no
//! longer expanded anywhere deeper in the same traversal.

use std::collections::HashSet;

use tracing::debug;

use super::{PopulateMap, PopulatePlan};
use crate::schema::{AttributeSpec, SchemaProvider, ADMIN_USER_UID};
use crate::Result;

/// Relation expanded to a single level once the parent depth exceeds 2
pub const LOCALIZATIONS_ATTRIBUTE: &str = "localizations";

/// State shared by every recursive call of one plan build
///
/// Collections entered during the walk and attribute names excluded by the
/// caller are kept apart, but both stop an attribute from being expanded.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    visited_collections: HashSet<String>,
    excluded_attributes: HashSet<String>,
}

impl Traversal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Traversal that never expands the given attribute names
    pub fn excluding<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            visited_collections: HashSet::new(),
            excluded_attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Record a collection as entered; false if it already was
    pub fn visit(&mut self, collection_name: &str) -> bool {
        if self.visited_collections.contains(collection_name) {
            return false;
        }
        self.visited_collections.insert(collection_name.to_string())
    }

    pub fn has_visited(&self, collection_name: &str) -> bool {
        self.visited_collections.contains(collection_name)
    }

    pub fn is_excluded(&self, attribute: &str) -> bool {
        self.excluded_attributes.contains(attribute)
    }

    /// Whether an attribute of this name must not be expanded
    pub fn skips(&self, attribute: &str) -> bool {
        self.is_excluded(attribute) || self.has_visited(attribute)
    }

    pub fn visited_collections(&self) -> impl Iterator<Item = &str> {
        self.visited_collections.iter().map(String::as_str)
    }
}

/// Builds populate plans against a schema provider
pub struct PlanBuilder<'a, P: SchemaProvider + ?Sized> {
    provider: &'a P,
    skip_creator_fields: bool,
}

impl<'a, P: SchemaProvider + ?Sized> PlanBuilder<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            skip_creator_fields: false,
        }
    }

    /// Omit `admin::user` targets (creator fields) from every plan
    pub fn skip_creator_fields(mut self, skip: bool) -> Self {
        self.skip_creator_fields = skip;
        self
    }

    /// Build the plan for `model_uid`.
    ///
    /// Returns `Ok(None)` when the model must be omitted entirely (the caller
    /// drops the attribute rather than populating it). A non-empty
    /// `field_filter` restricts the attributes considered at this level only.
    pub fn build(
        &self,
        model_uid: &str,
        max_depth: u32,
        traversal: &mut Traversal,
        field_filter: &HashSet<String>,
    ) -> Result<Option<PopulatePlan>> {
        if max_depth <= 1 {
            return Ok(Some(PopulatePlan::Full));
        }
        if model_uid == ADMIN_USER_UID && self.skip_creator_fields {
            return Ok(None);
        }

        let schema = self.provider.schema(model_uid)?;
        traversal.visit(&schema.collection_name);

        let mut populate = PopulateMap::new();
        for (name, spec) in schema.population_attributes() {
            if traversal.skips(name) {
                debug!(model = model_uid, attribute = name, "Skipping visited or excluded attribute");
                continue;
            }
            if !field_filter.is_empty() && !field_filter.contains(name) {
                continue;
            }

            if let Some(child) = self.expand(name, spec, max_depth, traversal)? {
                populate.insert(name, child);
            }
        }

        debug!(
            model = model_uid,
            depth = max_depth,
            expanded = populate.len(),
            "Built populate plan"
        );

        Ok(Some(PopulatePlan::from_map(populate)))
    }

    /// Child plan for one attribute; `None` leaves the attribute out
    fn expand(
        &self,
        name: &str,
        spec: &AttributeSpec,
        max_depth: u32,
        traversal: &mut Traversal,
    ) -> Result<Option<PopulatePlan>> {
        let no_filter = HashSet::new();

        match spec {
            AttributeSpec::Scalar => Ok(None),
            AttributeSpec::Component { target, .. } => {
                self.build(target, max_depth - 1, traversal, &no_filter)
            }
            AttributeSpec::DynamicZone { targets } => {
                self.dynamic_zone(targets, max_depth, traversal).map(Some)
            }
            AttributeSpec::Relation { target, .. } => {
                let child_depth = if name == LOCALIZATIONS_ATTRIBUTE && max_depth > 2 {
                    1
                } else {
                    max_depth - 1
                };
                self.build(target, child_depth, traversal, &no_filter)
            }
            AttributeSpec::Media { .. } => Ok(Some(PopulatePlan::Full)),
        }
    }

    /// Plan covering every component a dynamic zone may hold
    fn dynamic_zone(
        &self,
        targets: &[String],
        max_depth: u32,
        traversal: &mut Traversal,
    ) -> Result<PopulatePlan> {
        let no_filter = HashSet::new();
        let mut combined = PopulateMap::new();

        for target in targets {
            if let Some(PopulatePlan::Nested(map)) =
                self.build(target, max_depth - 1, traversal, &no_filter)?
            {
                combined.merge(map);
            }
        }

        Ok(PopulatePlan::from_map(combined))
    }
}
