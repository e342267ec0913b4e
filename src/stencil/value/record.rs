//! Record adapter: how native structs expose named fields to templates
//!
//! Templates never reflect over Rust types. A type opts in by implementing [`Record`]: it
//! publishes a static [`Shape`] (its field names, in declaration order) and hands out field
//! values by position. Path resolution finds a field's position once per shape and memoizes
//! it, so repeated renders against the same struct type skip the name search entirely.
//!
//! Most types should use [`impl_record!`](crate::impl_record) instead of a manual impl.

use super::Value;
use std::fmt;

/// Static description of a record type: its display name and field names
#[derive(Debug)]
pub struct Shape {
    name: &'static str,
    fields: &'static [&'static str],
}

/// Identity of a [`Shape`], used as the field-resolution cache key
///
/// Derived from the address of the shape's `static`, so two record types never share an id
/// even when their names and field lists coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(usize);

impl Shape {
    pub const fn new(name: &'static str, fields: &'static [&'static str]) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    pub fn id(&'static self) -> ShapeId {
        ShapeId(self as *const Shape as usize)
    }

    /// Position of a field by name: exact match first, then ASCII case-insensitive.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| *field == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|field| field.eq_ignore_ascii_case(name))
            })
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An externally-typed object whose fields templates may read
pub trait Record: Send + Sync {
    fn shape(&self) -> &'static Shape;

    /// Value of the field at `index` in [`Shape::fields`]
    fn field(&self, index: usize) -> Option<Value>;

    /// Computed attributes that are not part of the shape.
    ///
    /// Consulted only when no shape field matches; results are never memoized.
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Implement [`Record`] for a struct by listing the fields templates may see.
///
/// Every listed field must be `Clone` and convertible with `Value::from`.
///
/// ```ignore
/// struct User { name: String, age: u32 }
/// stencil::impl_record!(User { name, age });
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Record for $ty {
            fn shape(&self) -> &'static $crate::Shape {
                static SHAPE: $crate::Shape =
                    $crate::Shape::new(stringify!($ty), &[$(stringify!($field)),*]);
                &SHAPE
            }

            #[allow(unused_variables, unused_mut, unused_assignments)]
            fn field(&self, index: usize) -> Option<$crate::Value> {
                let mut position = 0usize;
                $(
                    if index == position {
                        return Some($crate::Value::from(self.$field.clone()));
                    }
                    position += 1;
                )*
                None
            }
        }

        impl From<$ty> for $crate::Value {
            fn from(record: $ty) -> Self {
                $crate::Value::record(record)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::Value;

    #[derive(Clone)]
    struct Product {
        title: String,
        price: f64,
        tags: Vec<String>,
    }

    crate::impl_record!(Product { title, price, tags });

    fn product() -> Product {
        Product {
            title: "Lamp".to_string(),
            price: 19.5,
            tags: vec!["home".to_string()],
        }
    }

    #[test]
    fn test_shape_lists_fields_in_order() {
        let value = Value::from(product());
        let Value::Record(record) = value else {
            panic!("expected a record");
        };
        assert_eq!(record.shape().name(), "Product");
        assert_eq!(record.shape().fields(), &["title", "price", "tags"]);
    }

    #[test]
    fn test_field_by_position() {
        let record = product();
        use crate::Record;
        assert_eq!(record.field(0), Some(Value::from("Lamp")));
        assert_eq!(record.field(1), Some(Value::Float(19.5)));
        assert_eq!(record.field(3), None);
    }

    #[test]
    fn test_position_falls_back_to_case_insensitive() {
        use crate::Record;
        let shape = product().shape();
        assert_eq!(shape.position("price"), Some(1));
        assert_eq!(shape.position("Title"), Some(0));
        assert_eq!(shape.position("missing"), None);
    }

    #[test]
    fn test_shape_identity_is_stable() {
        use crate::Record;
        assert_eq!(product().shape().id(), product().shape().id());
    }
}
