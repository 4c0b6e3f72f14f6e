//! Dynamically-typed event parameter values.
//!
//! Event parameters are free-form, but the set of shapes the collector
//! accepts is closed: JSON scalars, arrays and objects. [`ParamValue`]
//! models exactly that set and carries its own recursive encoder and
//! decoder rather than leaning on an open "any" type.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Event parameters keyed by name.
pub type Parameters = BTreeMap<String, ParamValue>;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParamValue {
    /// JSON `null`.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer that fits in an `i64`.
    Int(i64),
    /// Any other number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    Array(Vec<ParamValue>),
    /// Nested key/value map.
    Object(Parameters),
}

impl ParamValue {
    /// Returns `true` for [`ParamValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Borrow the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of `Int` and `Float` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer payload, if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Null => serializer.serialize_unit(),
            ParamValue::Bool(b) => serializer.serialize_bool(*b),
            ParamValue::Int(i) => serializer.serialize_i64(*i),
            // NaN and infinities have no JSON form.
            ParamValue::Float(f) if !f.is_finite() => serializer.serialize_unit(),
            ParamValue::Float(f) => serializer.serialize_f64(*f),
            ParamValue::String(s) => serializer.serialize_str(s),
            ParamValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ParamValue::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct ParamValueVisitor;

impl<'de> Visitor<'de> for ParamValueVisitor {
    type Value = ParamValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON scalar, array or object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<ParamValue, E> {
        Ok(ParamValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<ParamValue, E> {
        Ok(ParamValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<ParamValue, D::Error> {
        ParamValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ParamValue, E> {
        Ok(ParamValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ParamValue, E> {
        Ok(ParamValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ParamValue, E> {
        Ok(i64::try_from(v)
            .map(ParamValue::Int)
            .unwrap_or(ParamValue::Float(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ParamValue, E> {
        Ok(ParamValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ParamValue, E> {
        Ok(ParamValue::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ParamValue, E> {
        Ok(ParamValue::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ParamValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<ParamValue>()? {
            items.push(item);
        }
        Ok(ParamValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ParamValue, A::Error> {
        let mut entries = Parameters::new();
        while let Some((key, value)) = map.next_entry::<String, ParamValue>()? {
            entries.insert(key, value);
        }
        Ok(ParamValue::Object(entries))
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ParamValueVisitor)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<Parameters> for ParamValue {
    fn from(v: Parameters) -> Self {
        ParamValue::Object(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => ParamValue::Null,
            serde_json::Value::Bool(b) => ParamValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => ParamValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => ParamValue::String(s),
            serde_json::Value::Array(items) => {
                ParamValue::Array(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(entries) => ParamValue::Object(
                entries.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

/// Build a [`Parameters`] map from `key => value` pairs.
///
/// ```
/// use pulse_types::params;
///
/// let p = params! { "product_id" => "premium", "price" => 9.99 };
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Parameters::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Parameters::new();
        $( map.insert(::std::string::String::from($key), $crate::ParamValue::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> ParamValue {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn scalars_decode_to_matching_variants() {
        assert_eq!(decode("null"), ParamValue::Null);
        assert_eq!(decode("true"), ParamValue::Bool(true));
        assert_eq!(decode("42"), ParamValue::Int(42));
        assert_eq!(decode("-7"), ParamValue::Int(-7));
        assert_eq!(decode("2.75"), ParamValue::Float(2.75));
        assert_eq!(decode("\"test\""), ParamValue::String("test".into()));
    }

    #[test]
    fn integers_beyond_i64_become_floats() {
        let v = decode("18446744073709551615");
        assert!(matches!(v, ParamValue::Float(_)));
    }

    #[test]
    fn nested_structures_decode_recursively() {
        let v = decode(r#"{"list":[1,"two",{"deep":null}],"flag":false}"#);
        let ParamValue::Object(map) = v else {
            panic!("expected object");
        };
        assert_eq!(map["flag"], ParamValue::Bool(false));
        let ParamValue::Array(items) = &map["list"] else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], ParamValue::Int(1));
        assert_eq!(items[1], ParamValue::String("two".into()));
        assert_eq!(items[2], ParamValue::Object(params! { "deep" => ParamValue::Null }));
    }

    #[test]
    fn encoding_produces_plain_json() {
        let value = ParamValue::Object(params! {
            "array" => vec![1, 2, 3],
            "bool" => true,
            "dict" => params! { "nested" => "value" },
            "double" => 2.75,
            "int" => 42,
            "string" => "value",
        });
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(
            json,
            r#"{"array":[1,2,3],"bool":true,"dict":{"nested":"value"},"double":2.75,"int":42,"string":"value"}"#
        );
    }

    #[test]
    fn non_finite_floats_encode_as_null() {
        let json = serde_json::to_string(&ParamValue::Float(f64::NAN)).unwrap();
        assert_eq!(json, "null");
    }

    #[test]
    fn from_json_value_preserves_shape() {
        let raw = serde_json::json!({"price": 9.99, "qty": 2, "tags": ["a"]});
        let value = ParamValue::from(raw);
        let ParamValue::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(map["price"].as_f64(), Some(9.99));
        assert_eq!(map["qty"].as_i64(), Some(2));
        assert_eq!(map["tags"], ParamValue::Array(vec!["a".into()]));
    }

    #[test]
    fn option_maps_none_to_null() {
        assert!(ParamValue::from(None::<i64>).is_null());
        assert_eq!(ParamValue::from(Some("x")).as_str(), Some("x"));
    }

    #[test]
    fn params_macro_builds_map() {
        let p = params! { "a" => 1, "b" => "two" };
        assert_eq!(p.len(), 2);
        let empty = params!();
        assert!(empty.is_empty());
    }
}
