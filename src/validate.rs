use crate::form::*;
use crate::value;
use crate::Schema;
use serde::Serialize;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use thiserror::Error;

/// Options for [`validate`].
///
/// Zero means unlimited for both settings, which is the default.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    max_depth: usize,
    max_errors: usize,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidateError {
    #[error("max depth exceeded")]
    MaxDepthExceeded,
}

/// One violation found in an instance.
///
/// `instance_path` leads to the offending value, `schema_path` to the keyword
/// that rejected it.
#[derive(Clone, Debug, PartialEq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{kind} (instance /{}, schema /{})", .instance_path.join("/"), .schema_path.join("/"))]
pub struct ValidationError {
    pub instance_path: Vec<String>,
    pub schema_path: Vec<String>,
    pub kind: ValidationErrorKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Error)]
#[serde(tag = "constraint", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ValidationErrorKind {
    #[error("expected {expected}, found {found}")]
    Type { expected: String, found: String },

    #[error("expected at least {min} properties, found {actual}")]
    MinProperties { min: u64, actual: u64 },

    #[error("expected at most {max} properties, found {actual}")]
    MaxProperties { max: u64, actual: u64 },

    #[error("missing required property {property:?}")]
    Required { property: String },

    #[error("property {property:?} is not allowed")]
    AdditionalProperty { property: String },

    #[error("property {property:?} requires property {dependency:?}")]
    Dependency { property: String, dependency: String },

    #[error("expected at least {min} items, found {actual}")]
    MinItems { min: u64, actual: u64 },

    #[error("expected at most {max} items, found {actual}")]
    MaxItems { max: u64, actual: u64 },

    #[error("item {index} is beyond the declared items")]
    AdditionalItem { index: usize },

    #[error("items {first} and {second} are equal")]
    UniqueItems { first: usize, second: usize },

    #[error("expected at least {min} characters, found {actual}")]
    MinLength { min: u64, actual: u64 },

    #[error("expected at most {max} characters, found {actual}")]
    MaxLength { max: u64, actual: u64 },

    #[error("string does not match pattern {pattern:?}")]
    Pattern { pattern: String },

    #[error("{actual} is less than the minimum of {minimum}")]
    Minimum { minimum: Number, actual: Number },

    #[error("{actual} is not greater than the exclusive minimum of {minimum}")]
    ExclusiveMinimum { minimum: Number, actual: Number },

    #[error("{actual} is greater than the maximum of {maximum}")]
    Maximum { maximum: Number, actual: Number },

    #[error("{actual} is not less than the exclusive maximum of {maximum}")]
    ExclusiveMaximum { maximum: Number, actual: Number },

    #[error("{actual} is not a multiple of {multiple_of}")]
    MultipleOf { multiple_of: Number, actual: Number },

    #[error("value is not one of the enumerated values")]
    Enum,
}

/// Validates `instance`, collecting violations until `max_errors` is reached.
pub fn validate(
    schema: &Schema,
    instance: &Value,
    options: ValidateOptions,
) -> Result<Vec<ValidationError>, ValidateError> {
    let mut vm = Vm::new(options.max_depth, options.max_errors);

    match vm.validate_union(&schema.root, instance) {
        Ok(()) | Err(VmValidateError::MaxErrorsReached) => Ok(vm.errors),
        Err(VmValidateError::MaxDepthExceeded) => Err(ValidateError::MaxDepthExceeded),
    }
}

/// Fail-fast validation: the first violation, if any.
pub(crate) fn first_error(schema: &Schema, instance: &Value) -> Option<ValidationError> {
    let mut vm = Vm::new(0, 1);
    let _ = vm.validate_union(&schema.root, instance);
    vm.errors.pop()
}

struct Vm {
    max_depth: usize,
    max_errors: usize,
    depth: usize,
    instance_tokens: Vec<String>,
    schema_tokens: Vec<String>,
    errors: Vec<ValidationError>,
}

enum VmValidateError {
    MaxErrorsReached,
    MaxDepthExceeded,
}

impl Vm {
    fn new(max_depth: usize, max_errors: usize) -> Self {
        Vm {
            max_depth,
            max_errors,
            depth: 0,
            instance_tokens: vec![],
            schema_tokens: vec![],
            errors: vec![],
        }
    }

    /// An instance satisfies a union when any member accepts it. When none
    /// does, the first member's violations stand in for the rest.
    fn validate_union(&mut self, union: &Union, instance: &Value) -> Result<(), VmValidateError> {
        let mut members = union.members.iter();
        let (first_name, first) = match members.next() {
            Some(member) => member,
            None => return Ok(()),
        };

        if union.members.len() == 1 {
            return self.validate_node(first, instance);
        }

        let budget = if self.max_errors == 0 {
            0
        } else {
            self.max_errors.saturating_sub(self.errors.len())
        };

        let mut first_attempt = self.scratch(budget);
        first_attempt.push_schema_token(first_name);
        match first_attempt.validate_node(first, instance) {
            Ok(()) | Err(VmValidateError::MaxErrorsReached) => {}
            Err(VmValidateError::MaxDepthExceeded) => {
                return Err(VmValidateError::MaxDepthExceeded)
            }
        }

        if first_attempt.errors.is_empty() {
            return Ok(());
        }
        for (_, node) in members {
            if self.accepts(node, instance)? {
                return Ok(());
            }
        }

        self.errors.append(&mut first_attempt.errors);
        if self.max_errors != 0 && self.errors.len() >= self.max_errors {
            Err(VmValidateError::MaxErrorsReached)
        } else {
            Ok(())
        }
    }

    /// A fresh vm positioned where this one is, with its own error list.
    fn scratch(&self, max_errors: usize) -> Vm {
        Vm {
            max_depth: self.max_depth,
            max_errors,
            depth: self.depth,
            instance_tokens: self.instance_tokens.clone(),
            schema_tokens: self.schema_tokens.clone(),
            errors: vec![],
        }
    }

    /// Runs `node` against `instance` in a scratch vm, leaving this vm's
    /// errors untouched.
    fn accepts(&self, node: &Node, instance: &Value) -> Result<bool, VmValidateError> {
        let mut probe = Vm::new(self.max_depth, 1);
        probe.depth = self.depth;

        match probe.validate_node(node, instance) {
            Ok(()) => Ok(true),
            Err(VmValidateError::MaxErrorsReached) => Ok(false),
            Err(VmValidateError::MaxDepthExceeded) => Err(VmValidateError::MaxDepthExceeded),
        }
    }

    fn validate_node(&mut self, node: &Node, instance: &Value) -> Result<(), VmValidateError> {
        self.depth += 1;
        if self.max_depth != 0 && self.depth > self.max_depth {
            return Err(VmValidateError::MaxDepthExceeded);
        }

        match &node.element {
            Element::Generic(generic) => self.validate_enum(&generic.common, instance)?,
            Element::Object(object) => self.validate_object(object, instance)?,
            Element::Array(array) => self.validate_array(array, instance)?,
            Element::String(string) => self.validate_string(string, instance)?,
            Element::Bool(boolean) => {
                if instance.is_boolean() {
                    self.validate_enum(&boolean.common, instance)?;
                } else {
                    self.push_type_error(BsonType::Bool, instance)?;
                }
            }
            Element::Int32(numeric) => {
                let n = instance
                    .as_i64()
                    .filter(|i| *i >= i64::from(i32::MIN) && *i <= i64::from(i32::MAX))
                    .map(Number::from);
                self.validate_numeric(BsonType::Int32, numeric, n, instance)?;
            }
            Element::Int64(numeric) => {
                let n = instance.as_i64().map(Number::from);
                self.validate_numeric(BsonType::Int64, numeric, n, instance)?;
            }
            Element::Double(numeric) => {
                let n = if instance.is_f64() {
                    instance.as_f64().and_then(Number::from_f64)
                } else {
                    None
                };
                self.validate_numeric(BsonType::Double, numeric, n, instance)?;
            }
            Element::Decimal(numeric) => {
                let n = value::as_decimal(instance);
                self.validate_numeric(BsonType::Decimal, numeric, n, instance)?;
            }
            Element::Date(date) => {
                if value::is_date(instance) {
                    self.validate_enum(&date.common, instance)?;
                } else {
                    self.push_type_error(BsonType::Date, instance)?;
                }
            }
        }

        self.depth -= 1;
        Ok(())
    }

    fn validate_object(&mut self, object: &Object, instance: &Value) -> Result<(), VmValidateError> {
        let obj = match instance.as_object() {
            Some(obj) => obj,
            None => return self.push_type_error(BsonType::Object, instance),
        };

        let count = obj.len() as u64;
        if let Some(min) = object.min_properties {
            if count < min {
                self.push_schema_token("minProperties");
                self.push_error(ValidationErrorKind::MinProperties { min, actual: count })?;
                self.pop_schema_token();
            }
        }

        if let Some(max) = object.max_properties {
            if count > max {
                self.push_schema_token("maxProperties");
                self.push_error(ValidationErrorKind::MaxProperties { max, actual: count })?;
                self.pop_schema_token();
            }
        }

        self.push_schema_token("required");
        for name in &object.required {
            if !obj.contains_key(name) {
                self.push_error(ValidationErrorKind::Required {
                    property: name.clone(),
                })?;
            }
        }
        self.pop_schema_token();

        self.push_schema_token("properties");
        for (name, union) in &object.properties {
            if let Some(sub_instance) = obj.get(name) {
                self.push_schema_token(name);
                self.push_instance_token(name);
                self.validate_union(union, sub_instance)?;
                self.pop_instance_token();
                self.pop_schema_token();
            }
        }
        self.pop_schema_token();

        for (name, sub_instance) in obj {
            if object.properties.contains_key(name) {
                continue;
            }

            self.push_instance_token(name);

            let mut matched = false;
            for pattern_property in &object.pattern_properties {
                if pattern_property.pattern.is_match(name) {
                    matched = true;
                    self.push_schema_token("patternProperties");
                    self.push_schema_token(pattern_property.pattern.as_str());
                    self.validate_union(&pattern_property.schema, sub_instance)?;
                    self.pop_schema_token();
                    self.pop_schema_token();
                }
            }

            if !matched {
                match &object.additional_properties {
                    Additional::Allowed => {}
                    Additional::Forbidden => {
                        self.push_schema_token("additionalProperties");
                        self.push_error(ValidationErrorKind::AdditionalProperty {
                            property: name.clone(),
                        })?;
                        self.pop_schema_token();
                    }
                    Additional::Schema(union) => {
                        self.push_schema_token("additionalProperties");
                        self.validate_union(union, sub_instance)?;
                        self.pop_schema_token();
                    }
                }
            }

            self.pop_instance_token();
        }

        for (trigger, dependency) in &object.dependencies {
            if !obj.contains_key(trigger) {
                continue;
            }

            self.push_schema_token("dependencies");
            self.push_schema_token(trigger);
            match dependency {
                Dependency::Properties(names) => {
                    for name in names {
                        if !obj.contains_key(name) {
                            self.push_error(ValidationErrorKind::Dependency {
                                property: trigger.clone(),
                                dependency: name.clone(),
                            })?;
                        }
                    }
                }
                Dependency::Schema(union) => self.validate_union(union, instance)?,
            }
            self.pop_schema_token();
            self.pop_schema_token();
        }

        self.validate_enum(&object.common, instance)
    }

    fn validate_array(&mut self, array: &Array, instance: &Value) -> Result<(), VmValidateError> {
        let items = match instance.as_array() {
            Some(items) => items,
            None => return self.push_type_error(BsonType::Array, instance),
        };

        let count = items.len() as u64;
        if let Some(min) = array.min_items {
            if count < min {
                self.push_schema_token("minItems");
                self.push_error(ValidationErrorKind::MinItems { min, actual: count })?;
                self.pop_schema_token();
            }
        }

        if let Some(max) = array.max_items {
            if count > max {
                self.push_schema_token("maxItems");
                self.push_error(ValidationErrorKind::MaxItems { max, actual: count })?;
                self.pop_schema_token();
            }
        }

        match &array.items {
            Items::Any => {}
            Items::Single(union) => {
                self.push_schema_token("items");
                for (index, item) in items.iter().enumerate() {
                    self.push_instance_token(&index.to_string());
                    self.validate_union(union, item)?;
                    self.pop_instance_token();
                }
                self.pop_schema_token();
            }
            Items::Tuple(unions) => {
                for (index, item) in items.iter().enumerate() {
                    self.push_instance_token(&index.to_string());
                    if let Some(union) = unions.get(index) {
                        self.push_schema_token("items");
                        self.push_schema_token(&index.to_string());
                        self.validate_union(union, item)?;
                        self.pop_schema_token();
                        self.pop_schema_token();
                    } else {
                        match &array.additional_items {
                            Additional::Allowed => {}
                            Additional::Forbidden => {
                                self.push_schema_token("additionalItems");
                                self.push_error(ValidationErrorKind::AdditionalItem { index })?;
                                self.pop_schema_token();
                            }
                            Additional::Schema(union) => {
                                self.push_schema_token("additionalItems");
                                self.validate_union(union, item)?;
                                self.pop_schema_token();
                            }
                        }
                    }
                    self.pop_instance_token();
                }
            }
        }

        if array.unique_items {
            if let Some((first, second)) = value::first_duplicate(items) {
                self.push_schema_token("uniqueItems");
                self.push_error(ValidationErrorKind::UniqueItems { first, second })?;
                self.pop_schema_token();
            }
        }

        self.validate_enum(&array.common, instance)
    }

    fn validate_string(&mut self, string: &Str, instance: &Value) -> Result<(), VmValidateError> {
        let s = match instance.as_str() {
            Some(s) => s,
            None => return self.push_type_error(BsonType::String, instance),
        };

        let length = s.chars().count() as u64;
        if let Some(min) = string.min_length {
            if length < min {
                self.push_schema_token("minLength");
                self.push_error(ValidationErrorKind::MinLength { min, actual: length })?;
                self.pop_schema_token();
            }
        }

        if let Some(max) = string.max_length {
            if length > max {
                self.push_schema_token("maxLength");
                self.push_error(ValidationErrorKind::MaxLength { max, actual: length })?;
                self.pop_schema_token();
            }
        }

        if let Some(pattern) = &string.pattern {
            if !pattern.is_match(s) {
                self.push_schema_token("pattern");
                self.push_error(ValidationErrorKind::Pattern {
                    pattern: pattern.as_str().to_owned(),
                })?;
                self.pop_schema_token();
            }
        }

        self.validate_enum(&string.common, instance)
    }

    /// `n` is the instance read as the element's numeric type, or `None` when
    /// the instance is not of that type.
    fn validate_numeric(
        &mut self,
        bson_type: BsonType,
        numeric: &Numeric,
        n: Option<Number>,
        instance: &Value,
    ) -> Result<(), VmValidateError> {
        let n = match n {
            Some(n) => n,
            None => return self.push_type_error(bson_type, instance),
        };

        if let Some(minimum) = &numeric.minimum {
            let ordering = value::compare(&n, minimum);
            if numeric.exclusive_minimum && ordering != Ordering::Greater {
                self.push_schema_token("minimum");
                self.push_error(ValidationErrorKind::ExclusiveMinimum {
                    minimum: minimum.clone(),
                    actual: n.clone(),
                })?;
                self.pop_schema_token();
            } else if ordering == Ordering::Less {
                self.push_schema_token("minimum");
                self.push_error(ValidationErrorKind::Minimum {
                    minimum: minimum.clone(),
                    actual: n.clone(),
                })?;
                self.pop_schema_token();
            }
        }

        if let Some(maximum) = &numeric.maximum {
            let ordering = value::compare(&n, maximum);
            if numeric.exclusive_maximum && ordering != Ordering::Less {
                self.push_schema_token("maximum");
                self.push_error(ValidationErrorKind::ExclusiveMaximum {
                    maximum: maximum.clone(),
                    actual: n.clone(),
                })?;
                self.pop_schema_token();
            } else if ordering == Ordering::Greater {
                self.push_schema_token("maximum");
                self.push_error(ValidationErrorKind::Maximum {
                    maximum: maximum.clone(),
                    actual: n.clone(),
                })?;
                self.pop_schema_token();
            }
        }

        if let Some(multiple_of) = &numeric.multiple_of {
            if !value::is_multiple_of(&n, multiple_of) {
                self.push_schema_token("multipleOf");
                self.push_error(ValidationErrorKind::MultipleOf {
                    multiple_of: multiple_of.clone(),
                    actual: n.clone(),
                })?;
                self.pop_schema_token();
            }
        }

        self.validate_enum(&numeric.common, instance)
    }

    fn validate_enum(&mut self, common: &Common, instance: &Value) -> Result<(), VmValidateError> {
        if let Some(values) = &common.enum_ {
            if !values.iter().any(|v| value::equal(v, instance)) {
                self.push_schema_token("enum");
                self.push_error(ValidationErrorKind::Enum)?;
                self.pop_schema_token();
            }
        }

        Ok(())
    }

    fn push_type_error(&mut self, expected: BsonType, instance: &Value) -> Result<(), VmValidateError> {
        self.push_schema_token("bsonType");
        self.push_error(ValidationErrorKind::Type {
            expected: expected.as_str().to_owned(),
            found: value::kind(instance).to_owned(),
        })?;
        self.pop_schema_token();
        Ok(())
    }

    fn push_error(&mut self, kind: ValidationErrorKind) -> Result<(), VmValidateError> {
        self.errors.push(ValidationError {
            instance_path: self.instance_tokens.clone(),
            schema_path: self.schema_tokens.clone(),
            kind,
        });

        if self.max_errors == self.errors.len() {
            Err(VmValidateError::MaxErrorsReached)
        } else {
            Ok(())
        }
    }

    fn push_schema_token(&mut self, token: &str) {
        self.schema_tokens.push(token.to_owned());
    }

    fn pop_schema_token(&mut self) {
        self.schema_tokens.pop();
    }

    fn push_instance_token(&mut self, token: &str) {
        self.instance_tokens.push(token.to_owned());
    }

    fn pop_instance_token(&mut self) {
        self.instance_tokens.pop();
    }
}
