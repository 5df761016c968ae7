//! Populate plans: which attributes to expand when fetching a model
//!
//! A plan serializes to the populate shape the query layer understands:
//! `true` for a fully populated leaf, `{"populate": {...}}` for an expansion.

mod builder;

use serde::ser::{Serialize, SerializeMap, Serializer};

pub use builder::{PlanBuilder, Traversal, LOCALIZATIONS_ATTRIBUTE};

/// Fetch plan node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulatePlan {
    /// Populate the subtree without field-level filtering; terminal
    Full,
    /// Continue expansion; never empty
    Nested(PopulateMap),
}

impl PopulatePlan {
    /// `Nested` for a non-empty map, `Full` otherwise
    pub fn from_map(map: PopulateMap) -> Self {
        if map.is_empty() {
            PopulatePlan::Full
        } else {
            PopulatePlan::Nested(map)
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PopulatePlan::Full)
    }

    /// Plan for a named attribute; `None` when the attribute is not expanded
    pub fn child(&self, name: &str) -> Option<&PopulatePlan> {
        match self {
            PopulatePlan::Full => None,
            PopulatePlan::Nested(map) => map.get(name),
        }
    }

    /// Number of levels the plan expands, counting the terminal level
    pub fn depth(&self) -> usize {
        match self {
            PopulatePlan::Full => 1,
            PopulatePlan::Nested(map) => 1 + map.iter().map(|(_, plan)| plan.depth()).max().unwrap_or(0),
        }
    }

    /// Deep merge; on colliding leaves the later plan wins
    pub fn merge(self, other: PopulatePlan) -> PopulatePlan {
        match (self, other) {
            (PopulatePlan::Nested(mut left), PopulatePlan::Nested(right)) => {
                left.merge(right);
                PopulatePlan::Nested(left)
            }
            (_, other) => other,
        }
    }
}

impl Serialize for PopulatePlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PopulatePlan::Full => serializer.serialize_bool(true),
            PopulatePlan::Nested(map) => {
                let mut outer = serializer.serialize_map(Some(1))?;
                outer.serialize_entry("populate", map)?;
                outer.end()
            }
        }
    }
}

/// Attribute name to plan, in schema declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateMap {
    entries: Vec<(String, PopulatePlan)>,
}

impl PopulateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace (keeping the original position)
    pub fn insert(&mut self, name: impl Into<String>, plan: PopulatePlan) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = plan,
            None => self.entries.push((name, plan)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PopulatePlan> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, plan)| plan)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PopulatePlan)> {
        self.entries.iter().map(|(name, plan)| (name.as_str(), plan))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` into `self`: nested maps merge key-wise, anything else
    /// is overwritten by `other`
    pub fn merge(&mut self, other: PopulateMap) {
        for (name, plan) in other.entries {
            match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => {
                    let current = std::mem::replace(&mut slot.1, PopulatePlan::Full);
                    slot.1 = current.merge(plan);
                }
                None => self.entries.push((name, plan)),
            }
        }
    }
}

impl Serialize for PopulateMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, plan) in &self.entries {
            map.serialize_entry(name, plan)?;
        }
        map.end()
    }
}

impl FromIterator<(String, PopulatePlan)> for PopulateMap {
    fn from_iter<I: IntoIterator<Item = (String, PopulatePlan)>>(iter: I) -> Self {
        let mut map = PopulateMap::new();
        for (name, plan) in iter {
            map.insert(name, plan);
        }
        map
    }
}
