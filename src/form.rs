use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde_json::{Number, Value};
use std::str::FromStr;

/// The type names a `bsonType` declaration may use.
///
/// `Generic` is not part of the MongoDB vocabulary. It selects the untyped
/// element, which is what a node without any `bsonType` compiles to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BsonType {
    Generic,
    Object,
    String,
    Array,
    Bool,
    Int32,
    Int64,
    Double,
    Decimal,
    Date,
}

impl BsonType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Object => "object",
            Self::String => "string",
            Self::Array => "array",
            Self::Bool => "bool",
            Self::Int32 => "int",
            Self::Int64 => "long",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Date => "date",
        }
    }
}

impl FromStr for BsonType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(Self::Generic),
            "object" => Ok(Self::Object),
            "string" => Ok(Self::String),
            "array" => Ok(Self::Array),
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int32),
            "long" => Ok(Self::Int64),
            "double" => Ok(Self::Double),
            "decimal" => Ok(Self::Decimal),
            "date" => Ok(Self::Date),
            _ => Err(()),
        }
    }
}

/// Fields every element carries, whatever its type.
#[derive(Clone, Debug, Default)]
pub struct Common {
    /// Declared type names, as written in the schema.
    pub type_names: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub enum_: Option<Vec<Value>>,
}

/// One compiled schema node. Owns exactly one element.
#[derive(Clone, Debug)]
pub struct Node {
    pub element: Element,
}

/// A schema position together with every type it declares.
///
/// Keys are the type names as written; an instance is accepted by the union
/// when any one member accepts it.
#[derive(Clone, Debug)]
pub struct Union {
    pub members: IndexMap<String, Node>,
}

#[derive(Clone, Debug)]
pub enum Element {
    Generic(Generic),
    Object(Object),
    String(Str),
    Array(Array),
    Bool(Bool),
    Int32(Numeric),
    Int64(Numeric),
    Double(Numeric),
    Decimal(Numeric),
    Date(Date),
}

impl Element {
    pub fn common(&self) -> &Common {
        match self {
            Element::Generic(e) => &e.common,
            Element::Object(e) => &e.common,
            Element::String(e) => &e.common,
            Element::Array(e) => &e.common,
            Element::Bool(e) => &e.common,
            Element::Int32(e) | Element::Int64(e) | Element::Double(e) | Element::Decimal(e) => {
                &e.common
            }
            Element::Date(e) => &e.common,
        }
    }

    pub fn bson_type(&self) -> BsonType {
        match self {
            Element::Generic(_) => BsonType::Generic,
            Element::Object(_) => BsonType::Object,
            Element::String(_) => BsonType::String,
            Element::Array(_) => BsonType::Array,
            Element::Bool(_) => BsonType::Bool,
            Element::Int32(_) => BsonType::Int32,
            Element::Int64(_) => BsonType::Int64,
            Element::Double(_) => BsonType::Double,
            Element::Decimal(_) => BsonType::Decimal,
            Element::Date(_) => BsonType::Date,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Generic {
    pub common: Common,
}

#[derive(Clone, Debug)]
pub struct Object {
    pub common: Common,
    pub properties: IndexMap<String, Union>,
    pub required: IndexSet<String>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub pattern_properties: Vec<PatternProperty>,
    pub additional_properties: Additional,
    pub dependencies: IndexMap<String, Dependency>,
}

#[derive(Clone, Debug)]
pub struct PatternProperty {
    pub pattern: Regex,
    pub schema: Union,
}

/// Policy for object keys, or array positions, that nothing else covers.
#[derive(Clone, Debug)]
pub enum Additional {
    Allowed,
    Forbidden,
    Schema(Box<Union>),
}

impl Default for Additional {
    fn default() -> Self {
        Additional::Allowed
    }
}

#[derive(Clone, Debug)]
pub enum Dependency {
    Properties(Vec<String>),
    Schema(Box<Union>),
}

#[derive(Clone, Debug)]
pub struct Array {
    pub common: Common,
    pub items: Items,
    pub additional_items: Additional,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
}

#[derive(Clone, Debug)]
pub enum Items {
    Any,
    Single(Box<Union>),
    Tuple(Vec<Union>),
}

impl Default for Items {
    fn default() -> Self {
        Items::Any
    }
}

#[derive(Clone, Debug)]
pub struct Str {
    pub common: Common,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Regex>,
}

#[derive(Clone, Debug)]
pub struct Bool {
    pub common: Common,
}

/// Constraints shared by `int`, `long`, `double` and `decimal`.
#[derive(Clone, Debug)]
pub struct Numeric {
    pub common: Common,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub multiple_of: Option<Number>,
}

#[derive(Clone, Debug)]
pub struct Date {
    pub common: Common,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bson_type_from_str() {
        assert_eq!(Err(()), "Object".parse::<BsonType>());
        assert_eq!(Err(()), "timestamp".parse::<BsonType>());
        assert_eq!(Ok(BsonType::Generic), "generic".parse());
        assert_eq!(Ok(BsonType::Object), "object".parse());
        assert_eq!(Ok(BsonType::String), "string".parse());
        assert_eq!(Ok(BsonType::Array), "array".parse());
        assert_eq!(Ok(BsonType::Bool), "bool".parse());
        assert_eq!(Ok(BsonType::Int32), "int".parse());
        assert_eq!(Ok(BsonType::Int64), "long".parse());
        assert_eq!(Ok(BsonType::Double), "double".parse());
        assert_eq!(Ok(BsonType::Decimal), "decimal".parse());
        assert_eq!(Ok(BsonType::Date), "date".parse());
    }

    #[test]
    fn bson_type_as_str_roundtrips() {
        for t in &[
            BsonType::Generic,
            BsonType::Object,
            BsonType::String,
            BsonType::Array,
            BsonType::Bool,
            BsonType::Int32,
            BsonType::Int64,
            BsonType::Double,
            BsonType::Decimal,
            BsonType::Date,
        ] {
            assert_eq!(Ok(*t), t.as_str().parse());
        }
    }
}
