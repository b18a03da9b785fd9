use crate::form::*;
use crate::serde_schema::*;
use indexmap::IndexMap;
use log::trace;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    max_depth: usize,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits how deeply schema documents may nest. Zero means no limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Why a schema document could not be compiled.
///
/// Compilation is all-or-nothing: any of these aborts the whole schema.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("malformed schema at /{}: {reason}", .schema_path.join("/"))]
    Malformed {
        schema_path: Vec<String>,
        reason: String,
    },

    #[error("unsupported bsonType {type_name:?} at /{}", .schema_path.join("/"))]
    Unsupported {
        schema_path: Vec<String>,
        type_name: String,
    },

    #[error("schema nesting exceeds max depth of {0}")]
    MaxDepthExceeded(usize),
}

pub(crate) struct Compiler {
    max_depth: usize,
    depth: usize,
    schema_tokens: Vec<String>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Compiler {
            max_depth: options.max_depth,
            depth: 0,
            schema_tokens: vec![],
        }
    }

    /// Compiles one schema position into a union with a member per declared
    /// type. A node declaring no type becomes a single `generic` member.
    pub fn union(&mut self, raw: &Value) -> Result<Union, CompileError> {
        self.depth += 1;
        if self.max_depth != 0 && self.depth > self.max_depth {
            return Err(CompileError::MaxDepthExceeded(self.max_depth));
        }

        let mut type_names = self.common(raw)?.type_names;
        if type_names.is_empty() {
            type_names.push(BsonType::Generic.as_str().to_owned());
        }

        let mut members = IndexMap::with_capacity(type_names.len());
        for type_name in type_names {
            let node = self.dispatch(&type_name, raw)?;
            members.insert(type_name, node);
        }

        self.depth -= 1;
        Ok(Union { members })
    }

    /// Builds the element a single type name selects.
    pub fn dispatch(&mut self, type_name: &str, raw: &Value) -> Result<Node, CompileError> {
        let bson_type = type_name.parse::<BsonType>().map_err(|_| {
            CompileError::Unsupported {
                schema_path: self.schema_tokens.clone(),
                type_name: type_name.to_owned(),
            }
        })?;

        trace!(
            "compiling {} schema at /{}",
            bson_type.as_str(),
            self.schema_tokens.join("/")
        );

        let element = match bson_type {
            BsonType::Generic => Element::Generic(Generic {
                common: self.common(raw)?,
            }),
            BsonType::Object => Element::Object(self.object(raw)?),
            BsonType::String => Element::String(self.string(raw)?),
            BsonType::Array => Element::Array(self.array(raw)?),
            BsonType::Bool => Element::Bool(Bool {
                common: self.common(raw)?,
            }),
            BsonType::Int32 => Element::Int32(self.numeric(raw)?),
            BsonType::Int64 => Element::Int64(self.numeric(raw)?),
            BsonType::Double => Element::Double(self.numeric(raw)?),
            BsonType::Decimal => Element::Decimal(self.numeric(raw)?),
            BsonType::Date => Element::Date(Date {
                common: self.common(raw)?,
            }),
        };

        self.trace_ignored_keys(bson_type, raw);
        Ok(Node { element })
    }

    fn common(&self, raw: &Value) -> Result<Common, CompileError> {
        if !raw.is_object() {
            return Err(self.malformed(format!(
                "a schema must be a document, found {}",
                crate::value::kind(raw)
            )));
        }

        let spec: RawCommon = self.decode(raw)?;
        let type_names = match spec.bson_type {
            None => vec![],
            Some(TypeDecl::Single(name)) => vec![name],
            Some(TypeDecl::Union(names)) => {
                if names.is_empty() {
                    return Err(CompileError::Malformed {
                        schema_path: self.path_with(&["bsonType"]),
                        reason: "bsonType must name at least one type".to_owned(),
                    });
                }

                names
            }
        };

        Ok(Common {
            type_names,
            title: spec.title,
            description: spec.description,
            enum_: spec.enum_,
        })
    }

    fn object(&mut self, raw: &Value) -> Result<Object, CompileError> {
        let common = self.common(raw)?;
        let spec: RawObject = self.decode(raw)?;

        let mut properties = IndexMap::new();
        if let Some(raw_properties) = &spec.properties {
            self.push_schema_token("properties");
            for (name, sub_schema) in raw_properties {
                self.push_schema_token(name);
                properties.insert(name.clone(), self.union(sub_schema)?);
                self.pop_schema_token();
            }
            self.pop_schema_token();
        }

        let mut pattern_properties = vec![];
        if let Some(raw_patterns) = &spec.pattern_properties {
            self.push_schema_token("patternProperties");
            for (pattern, sub_schema) in raw_patterns {
                self.push_schema_token(pattern);
                let pattern = self.regex(pattern)?;
                let schema = self.union(sub_schema)?;
                pattern_properties.push(PatternProperty { pattern, schema });
                self.pop_schema_token();
            }
            self.pop_schema_token();
        }

        let additional_properties =
            self.additional("additionalProperties", spec.additional_properties.as_ref())?;

        let mut dependencies = IndexMap::new();
        if let Some(raw_dependencies) = &spec.dependencies {
            self.push_schema_token("dependencies");
            for (trigger, dependency) in raw_dependencies {
                self.push_schema_token(trigger);
                let dependency = match dependency {
                    RawDependency::Properties(names) => Dependency::Properties(names.clone()),
                    RawDependency::Schema(sub_schema) => {
                        Dependency::Schema(Box::new(self.union(sub_schema)?))
                    }
                };
                dependencies.insert(trigger.clone(), dependency);
                self.pop_schema_token();
            }
            self.pop_schema_token();
        }

        Ok(Object {
            common,
            properties,
            required: spec.required.unwrap_or_default().into_iter().collect(),
            min_properties: spec.min_properties,
            max_properties: spec.max_properties,
            pattern_properties,
            additional_properties,
            dependencies,
        })
    }

    fn array(&mut self, raw: &Value) -> Result<Array, CompileError> {
        let common = self.common(raw)?;
        let spec: RawArray = self.decode(raw)?;

        let items = match &spec.items {
            None => Items::Any,
            Some(RawItems::Single(sub_schema)) => {
                self.push_schema_token("items");
                let union = self.union(sub_schema)?;
                self.pop_schema_token();
                Items::Single(Box::new(union))
            }
            Some(RawItems::Tuple(sub_schemas)) => {
                self.push_schema_token("items");
                let mut unions = Vec::with_capacity(sub_schemas.len());
                for (index, sub_schema) in sub_schemas.iter().enumerate() {
                    self.push_schema_token(&index.to_string());
                    unions.push(self.union(sub_schema)?);
                    self.pop_schema_token();
                }
                self.pop_schema_token();
                Items::Tuple(unions)
            }
        };

        let additional_items = self.additional("additionalItems", spec.additional_items.as_ref())?;

        Ok(Array {
            common,
            items,
            additional_items,
            min_items: spec.min_items,
            max_items: spec.max_items,
            unique_items: spec.unique_items.unwrap_or(false),
        })
    }

    fn string(&mut self, raw: &Value) -> Result<Str, CompileError> {
        let common = self.common(raw)?;
        let spec: RawString = self.decode(raw)?;

        let pattern = match &spec.pattern {
            Some(pattern) => {
                self.push_schema_token("pattern");
                let pattern = self.regex(pattern)?;
                self.pop_schema_token();
                Some(pattern)
            }
            None => None,
        };

        Ok(Str {
            common,
            min_length: spec.min_length,
            max_length: spec.max_length,
            pattern,
        })
    }

    fn numeric(&mut self, raw: &Value) -> Result<Numeric, CompileError> {
        let common = self.common(raw)?;
        let spec: RawNumeric = self.decode(raw)?;

        if let Some(multiple_of) = &spec.multiple_of {
            if !is_positive(multiple_of) {
                return Err(CompileError::Malformed {
                    schema_path: self.path_with(&["multipleOf"]),
                    reason: format!("multipleOf must be greater than 0, found {}", multiple_of),
                });
            }
        }

        Ok(Numeric {
            common,
            minimum: spec.minimum,
            maximum: spec.maximum,
            exclusive_minimum: spec.exclusive_minimum.unwrap_or(false),
            exclusive_maximum: spec.exclusive_maximum.unwrap_or(false),
            multiple_of: spec.multiple_of,
        })
    }

    fn additional(
        &mut self,
        keyword: &str,
        raw: Option<&RawAdditional>,
    ) -> Result<Additional, CompileError> {
        Ok(match raw {
            None | Some(RawAdditional::Bool(true)) => Additional::Allowed,
            Some(RawAdditional::Bool(false)) => Additional::Forbidden,
            Some(RawAdditional::Schema(sub_schema)) => {
                self.push_schema_token(keyword);
                let union = self.union(sub_schema)?;
                self.pop_schema_token();
                Additional::Schema(Box::new(union))
            }
        })
    }

    fn regex(&self, pattern: &str) -> Result<Regex, CompileError> {
        Regex::new(pattern)
            .map_err(|err| self.malformed(format!("invalid regular expression: {}", err)))
    }

    fn decode<'a, T: Deserialize<'a>>(&self, raw: &'a Value) -> Result<T, CompileError> {
        serde_path_to_error::deserialize(raw).map_err(|err| {
            let mut schema_path = self.schema_tokens.clone();
            for segment in err.path().iter() {
                match segment {
                    serde_path_to_error::Segment::Seq { index } => {
                        schema_path.push(index.to_string())
                    }
                    serde_path_to_error::Segment::Map { key } => schema_path.push(key.clone()),
                    other => schema_path.push(other.to_string()),
                }
            }

            CompileError::Malformed {
                schema_path,
                reason: err.into_inner().to_string(),
            }
        })
    }

    fn trace_ignored_keys(&self, bson_type: BsonType, raw: &Value) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }

        let own_keys: &[&str] = match bson_type {
            BsonType::Object => OBJECT_KEYS,
            BsonType::Array => ARRAY_KEYS,
            BsonType::String => STRING_KEYS,
            BsonType::Int32 | BsonType::Int64 | BsonType::Double | BsonType::Decimal => {
                NUMERIC_KEYS
            }
            BsonType::Generic | BsonType::Bool | BsonType::Date => &[],
        };

        if let Some(obj) = raw.as_object() {
            for key in obj.keys() {
                if !COMMON_KEYS.contains(&key.as_str()) && !own_keys.contains(&key.as_str()) {
                    trace!(
                        "{} schema at /{} ignores {:?}",
                        bson_type.as_str(),
                        self.schema_tokens.join("/"),
                        key
                    );
                }
            }
        }
    }

    fn malformed(&self, reason: String) -> CompileError {
        CompileError::Malformed {
            schema_path: self.schema_tokens.clone(),
            reason,
        }
    }

    fn path_with(&self, tokens: &[&str]) -> Vec<String> {
        let mut path = self.schema_tokens.clone();
        path.extend(tokens.iter().map(|t| (*t).to_owned()));
        path
    }

    fn push_schema_token(&mut self, token: &str) {
        self.schema_tokens.push(token.to_owned());
    }

    fn pop_schema_token(&mut self) {
        self.schema_tokens.pop();
    }
}

fn is_positive(n: &Number) -> bool {
    if let Some(u) = n.as_u64() {
        u > 0
    } else if let Some(i) = n.as_i64() {
        i > 0
    } else {
        n.as_f64().map_or(false, |f| f > 0.0)
    }
}
