use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One ecological cell of the world grid.
///
/// The engine maintains `occupants`; `attributes` is an opaque bag owned by
/// the ecology hooks (resource levels, temperature, and so on).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcoCell {
    capacity: usize,
    occupants: usize,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
}

impl EcoCell {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            occupants: 0,
            attributes: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn occupants(&self) -> usize {
        self.occupants
    }

    /// Whether one more organism fits.
    #[inline]
    pub fn has_room(&self) -> bool {
        self.occupants < self.capacity
    }

    #[inline]
    pub fn is_over_capacity(&self) -> bool {
        self.occupants > self.capacity
    }

    pub(crate) fn add_occupant(&mut self) {
        self.occupants += 1;
    }

    pub(crate) fn clear_occupants(&mut self) {
        self.occupants = 0;
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.attributes.insert(key.into(), value.into())
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }
}
