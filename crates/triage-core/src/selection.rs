//! Field selection trees and the schema filter
//!
//! A selection tree is a nested inclusion mask over a JSON object. The
//! filter projects a ticket payload down to the selected fields before it
//! is scrubbed or sent anywhere.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of a selection tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    /// `true` copies the field verbatim, `false` leaves it out
    Flag(bool),
    /// Filter the field's value with a nested tree
    Nested(SelectionTree),
}

impl Selection {
    /// A nested entry counts as selected when any descendant leaf is `true`
    pub fn is_selected(&self) -> bool {
        match self {
            Selection::Flag(flag) => *flag,
            Selection::Nested(tree) => tree.is_selected(),
        }
    }
}

/// Nested boolean mask describing which JSON fields to keep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionTree(BTreeMap<String, Selection>);

impl SelectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a leaf field
    pub fn include(mut self, key: impl Into<String>) -> Self {
        self.0.insert(key.into(), Selection::Flag(true));
        self
    }

    /// Select a field through a nested tree
    pub fn nest(mut self, key: impl Into<String>, tree: SelectionTree) -> Self {
        self.0.insert(key.into(), Selection::Nested(tree));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Selection> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Selection)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True iff at least one leaf anywhere below is `true`
    pub fn is_selected(&self) -> bool {
        self.0.values().any(Selection::is_selected)
    }

    /// Build an all-selected tree mirroring the shape of a sample object.
    ///
    /// Objects become nested trees; arrays of objects become a nested tree
    /// merged across every element; anything else is a `true` leaf.
    pub fn from_sample(sample: &Map<String, Value>) -> Self {
        let mut tree = SelectionTree::new();
        for (key, value) in sample {
            let entry = match value {
                Value::Object(inner) if !inner.is_empty() => {
                    Selection::Nested(SelectionTree::from_sample(inner))
                }
                Value::Array(items) if items.iter().any(Value::is_object) => {
                    let mut merged = SelectionTree::new();
                    for item in items.iter().filter_map(Value::as_object) {
                        merged.merge(SelectionTree::from_sample(item));
                    }
                    Selection::Nested(merged)
                }
                _ => Selection::Flag(true),
            };
            tree.0.insert(key.clone(), entry);
        }
        tree
    }

    fn merge(&mut self, other: SelectionTree) {
        for (key, entry) in other.0 {
            match (self.0.get_mut(&key), entry) {
                (Some(Selection::Nested(mine)), Selection::Nested(theirs)) => mine.merge(theirs),
                (Some(_), _) => {}
                (None, entry) => {
                    self.0.insert(key, entry);
                }
            }
        }
    }
}

impl FromIterator<(String, Selection)> for SelectionTree {
    fn from_iter<I: IntoIterator<Item = (String, Selection)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Project `source` down to the fields named in `tree`.
///
/// Keys missing from `source` are skipped. The output never contains a key
/// that is absent from `tree`.
pub fn filter(source: &Map<String, Value>, tree: &SelectionTree) -> Map<String, Value> {
    let mut out = Map::new();

    for (key, selection) in tree.iter() {
        let Some(value) = source.get(key) else {
            continue;
        };

        match selection {
            Selection::Flag(true) => {
                out.insert(key.clone(), value.clone());
            }
            Selection::Flag(false) => {}
            Selection::Nested(subtree) => {
                out.insert(key.clone(), filter_value(value, subtree));
            }
        }
    }

    out
}

/// Apply a tree to an arbitrary value.
///
/// Objects are filtered, arrays have the tree applied to every element, and
/// any other shape passes through unchanged: upstream payloads vary and a
/// shape mismatch degrades to a no-op filter instead of an error.
pub fn filter_value(value: &Value, tree: &SelectionTree) -> Value {
    match value {
        Value::Object(map) => Value::Object(filter(map, tree)),
        Value::Array(items) => Value::Array(items.iter().map(|v| filter_value(v, tree)).collect()),
        other => other.clone(),
    }
}

/// Field selections for each entity the helpdesk returns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub ticket: SelectionTree,
    #[serde(default)]
    pub conversation: SelectionTree,
    #[serde(default)]
    pub requester: SelectionTree,
}
