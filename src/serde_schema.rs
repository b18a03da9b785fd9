//! The raw `$jsonSchema` vocabulary, decoded straight from a schema document.
//!
//! Every element type decodes only the keys it understands from the same raw
//! node. Unknown keys are left alone, so a node may carry keywords for several
//! of the types listed in its `bsonType` union.
//!
//! ```
//! use bsonschema::RawString;
//! use serde_json::json;
//!
//! let raw: RawString = serde_json::from_value(json!({
//!     "bsonType": "string",
//!     "maxLength": 8,
//!     "minimum": 3,
//! }))
//! .unwrap();
//!
//! assert_eq!(Some(8), raw.max_length);
//! assert_eq!(None, raw.min_length);
//! ```

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Number, Value};

/// A `bsonType` declaration: one type name or a union of them.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDecl {
    Single(String),
    Union(Vec<String>),
}

impl<'de> Deserialize<'de> for TypeDecl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(name) => Ok(TypeDecl::Single(name)),
            Value::Array(names) => names
                .into_iter()
                .map(|name| match name {
                    Value::String(name) => Ok(name),
                    _ => Err(de::Error::custom("bsonType values must be strings")),
                })
                .collect::<Result<_, _>>()
                .map(TypeDecl::Union),
            _ => Err(de::Error::custom(
                "bsonType must be a string or an array of strings",
            )),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommon {
    pub bson_type: Option<TypeDecl>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "enum")]
    pub enum_: Option<Vec<Value>>,
}

/// `additionalProperties` and `additionalItems`: a flag or a schema.
#[derive(Clone, Debug, PartialEq)]
pub enum RawAdditional {
    Bool(bool),
    Schema(Value),
}

impl<'de> Deserialize<'de> for RawAdditional {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(b) => Ok(RawAdditional::Bool(b)),
            schema @ Value::Object(_) => Ok(RawAdditional::Schema(schema)),
            _ => Err(de::Error::custom("expected a boolean or a schema document")),
        }
    }
}

/// One `dependencies` entry: co-required property names or a schema.
#[derive(Clone, Debug, PartialEq)]
pub enum RawDependency {
    Properties(Vec<String>),
    Schema(Value),
}

impl<'de> Deserialize<'de> for RawDependency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Array(names) => names
                .into_iter()
                .map(|name| match name {
                    Value::String(name) => Ok(name),
                    _ => Err(de::Error::custom("dependency property names must be strings")),
                })
                .collect::<Result<_, _>>()
                .map(RawDependency::Properties),
            schema @ Value::Object(_) => Ok(RawDependency::Schema(schema)),
            _ => Err(de::Error::custom(
                "expected an array of property names or a schema document",
            )),
        }
    }
}

/// `items`: one schema for every element, or one schema per position.
#[derive(Clone, Debug, PartialEq)]
pub enum RawItems {
    Single(Value),
    Tuple(Vec<Value>),
}

impl<'de> Deserialize<'de> for RawItems {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            schema @ Value::Object(_) => Ok(RawItems::Single(schema)),
            Value::Array(schemas) => Ok(RawItems::Tuple(schemas)),
            _ => Err(de::Error::custom(
                "expected a schema document or an array of schema documents",
            )),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObject {
    #[serde(default, deserialize_with = "count")]
    pub min_properties: Option<u64>,

    #[serde(default, deserialize_with = "count")]
    pub max_properties: Option<u64>,

    pub required: Option<Vec<String>>,
    pub properties: Option<IndexMap<String, Value>>,
    pub pattern_properties: Option<IndexMap<String, Value>>,
    pub additional_properties: Option<RawAdditional>,
    pub dependencies: Option<IndexMap<String, RawDependency>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArray {
    pub items: Option<RawItems>,
    pub additional_items: Option<RawAdditional>,

    #[serde(default, deserialize_with = "count")]
    pub min_items: Option<u64>,

    #[serde(default, deserialize_with = "count")]
    pub max_items: Option<u64>,

    pub unique_items: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawString {
    #[serde(default, deserialize_with = "count")]
    pub min_length: Option<u64>,

    #[serde(default, deserialize_with = "count")]
    pub max_length: Option<u64>,

    pub pattern: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNumeric {
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_minimum: Option<bool>,
    pub exclusive_maximum: Option<bool>,
    pub multiple_of: Option<Number>,
}

pub(crate) const COMMON_KEYS: &[&str] = &["bsonType", "title", "description", "enum"];
pub(crate) const OBJECT_KEYS: &[&str] = &[
    "minProperties",
    "maxProperties",
    "required",
    "properties",
    "patternProperties",
    "additionalProperties",
    "dependencies",
];
pub(crate) const ARRAY_KEYS: &[&str] =
    &["items", "additionalItems", "minItems", "maxItems", "uniqueItems"];
pub(crate) const STRING_KEYS: &[&str] = &["minLength", "maxLength", "pattern"];
pub(crate) const NUMERIC_KEYS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

/// Counts accept integers and integral floats, since drivers often hand back
/// `2.0` where the author wrote `2`.
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let n = match Option::<Number>::deserialize(deserializer)? {
        Some(n) => n,
        None => return Ok(None),
    };

    if let Some(u) = n.as_u64() {
        return Ok(Some(u));
    }

    match n.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(Some(f as u64)),
        _ => Err(de::Error::custom(format!(
            "expected a non-negative integer, found {}",
            n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parse_common_single_type() {
        assert_eq!(
            RawCommon {
                bson_type: Some(TypeDecl::Single("int".to_owned())),
                title: Some("Age".to_owned()),
                ..Default::default()
            },
            serde_json::from_value(json!({ "bsonType": "int", "title": "Age", "minimum": 0 }))
                .unwrap()
        );
    }

    #[test]
    fn parse_common_union_and_enum() {
        assert_eq!(
            RawCommon {
                bson_type: Some(TypeDecl::Union(vec![
                    "string".to_owned(),
                    "int".to_owned()
                ])),
                enum_: Some(vec![json!("a"), json!(1)]),
                ..Default::default()
            },
            serde_json::from_value(json!({ "bsonType": ["string", "int"], "enum": ["a", 1] }))
                .unwrap()
        );
    }

    #[test]
    fn parse_common_rejects_numeric_type() {
        let err = serde_json::from_value::<RawCommon>(json!({ "bsonType": 3 })).unwrap_err();
        assert!(err.to_string().contains("bsonType must be a string"));

        let err =
            serde_json::from_value::<RawCommon>(json!({ "bsonType": ["int", 3] })).unwrap_err();
        assert!(err.to_string().contains("bsonType values must be strings"));
    }

    #[test]
    fn parse_empty() {
        assert_eq!(RawObject::default(), serde_json::from_value(json!({})).unwrap());
        assert_eq!(RawArray::default(), serde_json::from_value(json!({})).unwrap());
        assert_eq!(RawString::default(), serde_json::from_value(json!({})).unwrap());
        assert_eq!(RawNumeric::default(), serde_json::from_value(json!({})).unwrap());
    }

    #[test]
    fn parse_object_full() {
        let raw: RawObject = serde_json::from_value(json!({
            "minProperties": 1,
            "maxProperties": 4.0,
            "required": ["a"],
            "properties": { "a": { "bsonType": "int" } },
            "patternProperties": { "^x_": { "bsonType": "string" } },
            "additionalProperties": false,
            "dependencies": {
                "a": ["b"],
                "c": { "required": ["d"] },
            },
        }))
        .unwrap();

        assert_eq!(Some(1), raw.min_properties);
        assert_eq!(Some(4), raw.max_properties);
        assert_eq!(Some(vec!["a".to_owned()]), raw.required);
        assert_eq!(Some(RawAdditional::Bool(false)), raw.additional_properties);

        let dependencies = raw.dependencies.unwrap();
        assert_eq!(
            RawDependency::Properties(vec!["b".to_owned()]),
            dependencies["a"]
        );
        assert_eq!(
            RawDependency::Schema(json!({ "required": ["d"] })),
            dependencies["c"]
        );
    }

    #[test]
    fn parse_keeps_declaration_order() {
        let raw: RawObject = serde_json::from_value(json!({
            "patternProperties": {
                "^z": {},
                "^a": {},
                "^m": {},
            },
        }))
        .unwrap();

        let patterns: Vec<_> = raw.pattern_properties.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(vec!["^z", "^a", "^m"], patterns);
    }

    #[test]
    fn parse_items_forms() {
        let single: RawArray = serde_json::from_value(json!({ "items": { "bsonType": "int" } })).unwrap();
        assert_eq!(Some(RawItems::Single(json!({ "bsonType": "int" }))), single.items);

        let tuple: RawArray =
            serde_json::from_value(json!({ "items": [{ "bsonType": "int" }, {}] })).unwrap();
        assert_eq!(
            Some(RawItems::Tuple(vec![json!({ "bsonType": "int" }), json!({})])),
            tuple.items
        );

        assert!(serde_json::from_value::<RawArray>(json!({ "items": "int" })).is_err());
    }

    #[test]
    fn count_rejects_negative_and_fractional() {
        assert!(serde_json::from_value::<RawString>(json!({ "minLength": -1 })).is_err());
        assert!(serde_json::from_value::<RawString>(json!({ "minLength": 1.5 })).is_err());
        assert!(serde_json::from_value::<RawString>(json!({ "minLength": "1" })).is_err());
    }
}
