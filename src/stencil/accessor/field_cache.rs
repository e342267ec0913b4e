//! Per-template memo of record field positions
//!
//! Keyed by (record shape, field name). Entries are only ever added, and recomputing an entry
//! always yields the same position, so two renders racing to fill the same slot is harmless:
//! the lock only guards the map's structure. Misses (a name the shape does not have) are
//! memoized too.

use crate::stencil::value::{Record, ShapeId, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Default)]
pub struct FieldCache {
    shapes: RwLock<HashMap<ShapeId, HashMap<Box<str>, Option<usize>>>>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a field from a record, using (and filling) the memoized position
    pub fn get(&self, record: &dyn Record, name: &str) -> Option<Value> {
        let position = match self.lookup(record, name) {
            Some(position) => position,
            None => self.memoize(record, name),
        };
        match position {
            Some(index) => record.field(index),
            None => record.attribute(name),
        }
    }

    /// Memoized position, if this (shape, name) pair was seen before
    fn lookup(&self, record: &dyn Record, name: &str) -> Option<Option<usize>> {
        let id = record.shape().id();
        self.shapes
            .read()
            .get(&id)
            .and_then(|fields| fields.get(name).copied())
    }

    fn memoize(&self, record: &dyn Record, name: &str) -> Option<usize> {
        let shape = record.shape();
        let position = shape.position(name);
        trace!(shape = shape.name(), field = name, ?position, "memoizing field position");
        self.shapes
            .write()
            .entry(shape.id())
            .or_default()
            .insert(name.into(), position);
        position
    }

    /// Number of memoized (shape, field) entries
    pub fn len(&self) -> usize {
        self.shapes.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Point {
        x: i64,
        y: i64,
    }

    crate::impl_record!(Point { x, y });

    #[test]
    fn test_memoizes_hits_and_misses() {
        let cache = FieldCache::new();
        let point = Point { x: 1, y: 2 };

        assert_eq!(cache.get(&point, "y"), Some(Value::Int(2)));
        assert_eq!(cache.get(&point, "z"), None);
        assert_eq!(cache.len(), 2);

        // Repeated lookups reuse the entries
        assert_eq!(cache.get(&point, "y"), Some(Value::Int(2)));
        assert_eq!(cache.get(&point, "z"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_case_insensitive_fallback_is_memoized_per_spelling() {
        let cache = FieldCache::new();
        let point = Point { x: 7, y: 0 };
        assert_eq!(cache.get(&point, "X"), Some(Value::Int(7)));
        assert_eq!(cache.get(&point, "x"), Some(Value::Int(7)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_attribute_fallback() {
        struct Clock;
        impl Record for Clock {
            fn shape(&self) -> &'static crate::Shape {
                static SHAPE: crate::Shape = crate::Shape::new("Clock", &[]);
                &SHAPE
            }
            fn field(&self, _index: usize) -> Option<Value> {
                None
            }
            fn attribute(&self, name: &str) -> Option<Value> {
                (name == "now").then(|| Value::from("noon"))
            }
        }

        let cache = FieldCache::new();
        assert_eq!(cache.get(&Clock, "now"), Some(Value::from("noon")));
        assert_eq!(cache.get(&Clock, "later"), None);
    }
}
