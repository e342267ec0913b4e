//! Dynamic value model for template data
//!
//! [`Value`] is what paths resolve to and what filters eventually see (as text). Every variant
//! that owns heap data shares it behind an `Arc`, so resolving a path or binding a loop
//! variable clones a pointer rather than the underlying data. Values are never mutated once
//! built.
//!
//! ## Rules
//!
//! - **Truthiness**: null, `false`, `""`, `0`, `0.0`, empty bytes, empty sequences and empty
//!   maps are falsy. Everything else, including every record, is truthy.
//! - **Text**: strings are borrowed as-is; numbers and booleans are formatted; null is empty.
//! - **Map order**: maps are `BTreeMap`s, so iteration is in ascending key order.

pub mod record;

pub use record::{Record, Shape, ShapeId};

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

/// A dynamically typed template value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Seq(Arc<[Value]>),
    Map(Arc<BTreeMap<String, Value>>),
    Record(Arc<dyn Record>),
    /// Anything that knows how to print itself
    Display(Arc<dyn fmt::Display + Send + Sync>),
}

impl Value {
    pub fn record(record: impl Record + 'static) -> Self {
        Value::Record(Arc::new(record))
    }

    pub fn display(display: impl fmt::Display + Send + Sync + 'static) -> Self {
        Value::Display(Arc::new(display))
    }

    pub fn seq<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    /// Convert any serializable data into a value (through `serde_json`)
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(data).map(Value::from)
    }

    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// Short name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Display(_) => "display",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Seq(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Record(_) | Value::Display(_) => true,
        }
    }

    /// Text form of the value. Borrows for strings, allocates for everything else.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Bool(true) => Cow::Borrowed("true"),
            Value::Bool(false) => Cow::Borrowed("false"),
            Value::Str(s) => Cow::Borrowed(&**s),
            Value::Bytes(b) => String::from_utf8_lossy(b),
            Value::Record(record) => Cow::Borrowed(record.shape().name()),
            _ => {
                let mut out = String::new();
                self.write_text(&mut out);
                Cow::Owned(out)
            }
        }
    }

    /// Append the text form of the value to `out`
    pub fn write_text(&self, out: &mut String) {
        match self {
            Value::Null => {}
            Value::Int(i) => {
                let _ = write!(out, "{}", i);
            }
            Value::Float(f) => write_float(out, *f),
            Value::Seq(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_text(out);
                }
                out.push(']');
            }
            Value::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push_str(": ");
                    value.write_text(out);
                }
                out.push('}');
            }
            Value::Display(display) => {
                let _ = write!(out, "{}", display);
            }
            other => out.push_str(&other.to_text()),
        }
    }

    /// Element of a sequence by position
    pub fn index(&self, index: usize) -> Option<Value> {
        match self {
            Value::Seq(items) => items.get(index).cloned(),
            _ => None,
        }
    }

    /// Entry of a map by exact key
    pub fn key(&self, key: &str) -> Option<Value> {
        match self {
            Value::Map(entries) => entries.get(key).cloned(),
            _ => None,
        }
    }

    /// Entry of a map by key, falling back to an ASCII case-insensitive match
    pub fn key_folded(&self, key: &str) -> Option<Value> {
        let Value::Map(entries) = self else {
            return None;
        };
        if let Some(value) = entries.get(key) {
            return Some(value.clone());
        }
        entries
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.clone())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(&&**s).finish(),
            Value::Bytes(b) => f.debug_tuple("Bytes").field(&&**b).finish(),
            Value::Seq(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            Value::Record(record) => write!(f, "Record({})", record.shape()),
            Value::Display(display) => write!(f, "Display({})", display),
        }
    }
}

/// Shortest round-trip form; decimal exponents below -4 or from 6 up switch to `1.5e+07` style
/// with a signed, at least two digit exponent.
fn write_float(out: &mut String, f: f64) {
    if f.is_infinite() {
        out.push_str(if f > 0.0 { "+Inf" } else { "-Inf" });
        return;
    }
    if f.is_nan() || f == 0.0 {
        let _ = write!(out, "{}", f);
        return;
    }

    let scientific = format!("{:e}", f);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..6).contains(&exponent) {
        let _ = write!(out, "{}", f);
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "{}e{}{:02}", mantissa, sign, exponent.unsigned_abs());
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b),
            (Value::Display(a), Value::Display(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::from(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::seq(items),
            serde_json::Value::Object(entries) => Value::map(entries),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(i: $ty) -> Self {
                    Value::Int(i64::from(i))
                }
            }
        )*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        i64::try_from(u)
            .map(Value::Int)
            .unwrap_or(Value::Float(u as f64))
    }
}

impl From<usize> for Value {
    fn from(u: usize) -> Self {
        Value::from(u as u64)
    }
}

impl From<isize> for Value {
    fn from(i: isize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(Arc::from(b))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::seq(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(entries: BTreeMap<K, V>) -> Self {
        Value::map(entries)
    }
}

impl<K: Into<String>, V: Into<Value>, S> From<HashMap<K, V, S>> for Value {
    fn from(entries: HashMap<K, V, S>) -> Self {
        Value::map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        let falsy = [
            Value::Null,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(0.0),
            Value::from(""),
            Value::seq(Vec::<Value>::new()),
            Value::map(Vec::<(String, Value)>::new()),
        ];
        for value in falsy {
            assert!(!value.is_truthy(), "{:?} should be falsy", value);
        }

        let truthy = [
            Value::Bool(true),
            Value::Int(-1),
            Value::Float(0.5),
            Value::from("0"),
            Value::seq([1]),
            Value::from(json!({"a": null})),
        ];
        for value in truthy {
            assert!(value.is_truthy(), "{:?} should be truthy", value);
        }
    }

    #[test]
    fn test_text_forms() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::Int(42).to_text(), "42");
        assert_eq!(Value::Float(3.0).to_text(), "3");
        assert_eq!(Value::Float(2.5).to_text(), "2.5");
        assert_eq!(Value::Bool(true).to_text(), "true");
        assert_eq!(Value::from(&b"bytes"[..]).to_text(), "bytes");
        assert_eq!(Value::seq(["a", "b"]).to_text(), "[a, b]");
        assert_eq!(Value::from(json!({"b": 2, "a": 1})).to_text(), "{a: 1, b: 2}");
        assert_eq!(Value::display(std::net::Ipv4Addr::LOCALHOST).to_text(), "127.0.0.1");
    }

    #[rstest]
    #[case(1e300, "1e+300")]
    #[case(-2.5e-7, "-2.5e-07")]
    #[case(1234567.0, "1.234567e+06")]
    #[case(123456.5, "123456.5")]
    #[case(0.0001, "0.0001")]
    #[case(0.00001234, "1.234e-05")]
    #[case(0.0, "0")]
    #[case(f64::INFINITY, "+Inf")]
    #[case(f64::NAN, "NaN")]
    fn test_float_text(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(Value::Float(value).to_text(), expected);
    }

    #[test]
    fn test_strings_are_borrowed() {
        let value = Value::from("hello");
        assert!(matches!(value.to_text(), Cow::Borrowed("hello")));
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"n": 1, "big": u64::MAX, "f": 1.5, "list": [true]}));
        assert_eq!(value.key("n"), Some(Value::Int(1)));
        assert_eq!(value.key("big"), Some(Value::Float(u64::MAX as f64)));
        assert_eq!(value.key("f"), Some(Value::Float(1.5)));
        assert_eq!(
            value.key("list").and_then(|list| list.index(0)),
            Some(Value::Bool(true))
        );
    }

    #[test]
    fn test_from_yaml_and_json_text() {
        let yaml = Value::from_yaml_str("title: Products\ncount: 3\n").unwrap();
        let json = Value::from_json_str(r#"{"title": "Products", "count": 3}"#).unwrap();
        assert_eq!(yaml, json);
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Page {
            title: &'static str,
            tags: Vec<&'static str>,
        }
        let value = Value::from_serialize(&Page {
            title: "Home",
            tags: vec!["a"],
        })
        .unwrap();
        assert_eq!(value.key("title"), Some(Value::from("Home")));
        assert_eq!(value.key("tags"), Some(Value::seq(["a"])));
    }

    #[test]
    fn test_key_folded() {
        let value = Value::from(json!({"Title": "x"}));
        assert_eq!(value.key("title"), None);
        assert_eq!(value.key_folded("title"), Some(Value::from("x")));
        assert_eq!(Value::Int(1).key_folded("title"), None);
    }

    #[test]
    fn test_option_and_index() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3)), Value::Int(3));
        assert_eq!(Value::seq([1, 2]).index(5), None);
        assert_eq!(Value::from("abc").index(0), None);
    }
}
