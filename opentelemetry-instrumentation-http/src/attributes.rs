//! A single ordered attribute buffer with cardinality tags.
//!
//! Observations buffer attributes until their span is about to end, because
//! consumers other than tracing (e.g. a metrics bridge) only want the
//! low-cardinality subset. Keeping one ordered bag with a tag per entry,
//! instead of two parallel buffers, means an attribute recorded under both
//! cardinalities cannot be double-counted: the last write wins in place.

use opentelemetry::KeyValue;

/// How widely an attribute's values are expected to vary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    /// Bounded value set; safe for aggregation keys.
    Low,
    /// Unbounded value set; spans only.
    High,
}

/// An insertion-ordered set of attributes, deduplicated by key.
#[derive(Debug, Default)]
pub struct AttributeBag {
    entries: Vec<(KeyValue, Cardinality)>,
}

impl AttributeBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        AttributeBag::default()
    }

    /// Records an attribute, replacing a previous entry with the same key.
    ///
    /// A replaced entry keeps its original position but takes the new value
    /// and cardinality.
    pub fn put(&mut self, attribute: KeyValue, cardinality: Cardinality) {
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.key == attribute.key)
        {
            Some(entry) => *entry = (attribute, cardinality),
            None => self.entries.push((attribute, cardinality)),
        }
    }

    /// Records a low-cardinality attribute.
    pub fn put_low(&mut self, attribute: KeyValue) {
        self.put(attribute, Cardinality::Low);
    }

    /// Records a high-cardinality attribute.
    pub fn put_high(&mut self, attribute: KeyValue) {
        self.put(attribute, Cardinality::High);
    }

    /// Number of distinct attributes recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All attributes, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.entries.iter().map(|(attribute, _)| attribute)
    }

    /// The attributes recorded with the given cardinality, in order.
    pub fn with_cardinality(&self, cardinality: Cardinality) -> impl Iterator<Item = &KeyValue> {
        self.entries
            .iter()
            .filter(move |(_, tag)| *tag == cardinality)
            .map(|(attribute, _)| attribute)
    }
}
