use crate::compile::{CompileError, CompileOptions, Compiler};
use crate::form::Union;
use crate::validate::{self, ValidationError};
use log::debug;
use serde_json::Value;

/// A compiled `$jsonSchema` document.
///
/// Compile once, then verify any number of instances against it. A `Schema`
/// is never mutated after compilation, so it can be shared across threads.
///
/// ```
/// use bsonschema::Schema;
/// use serde_json::json;
///
/// let schema = Schema::compile(&json!({
///     "bsonType": "object",
///     "required": ["name"],
///     "properties": {
///         "name": { "bsonType": "string" },
///         "age": { "bsonType": ["int", "long"], "minimum": 0 },
///     },
/// }))
/// .unwrap();
///
/// assert!(schema.verify(&json!({ "name": "Ada", "age": 36 })).is_ok());
/// assert!(schema.verify(&json!({ "age": 36 })).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct Schema {
    pub root: Union,
}

impl Schema {
    pub fn compile(raw: &Value) -> Result<Self, CompileError> {
        Self::compile_with(raw, CompileOptions::new())
    }

    pub fn compile_with(raw: &Value, options: CompileOptions) -> Result<Self, CompileError> {
        let root = Compiler::new(options).union(raw)?;

        debug!(
            "compiled schema with root type(s) {:?}",
            root.members.keys().collect::<Vec<_>>()
        );

        Ok(Schema { root })
    }

    /// Checks `instance`, stopping at the first violation.
    pub fn verify(&self, instance: &Value) -> Result<(), ValidationError> {
        match validate::first_error(self, instance) {
            Some(err) => {
                debug!("instance rejected: {}", err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        validate::first_error(self, instance).is_none()
    }

    pub fn title(&self) -> Option<&str> {
        self.root
            .members
            .values()
            .find_map(|node| node.element.common().title.as_deref())
    }

    pub fn description(&self) -> Option<&str> {
        self.root
            .members
            .values()
            .find_map(|node| node.element.common().description.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationErrorKind;
    use serde_json::json;

    fn person() -> Schema {
        Schema::compile(&json!({
            "bsonType": "object",
            "title": "person",
            "required": ["a", "b"],
            "minProperties": 2,
            "properties": {
                "a": { "bsonType": ["string", "int"] },
                "b": { "bsonType": "bool" },
            },
        }))
        .unwrap()
    }

    #[test]
    fn required_fields() {
        let schema = person();
        assert_eq!(
            ValidationErrorKind::Required {
                property: "b".to_owned()
            },
            schema.verify(&json!({ "a": "x", "c": 1 })).unwrap_err().kind
        );
        assert!(schema.verify(&json!({ "a": "x", "b": true })).is_ok());
    }

    #[test]
    fn annotations() {
        let schema = person();
        assert_eq!(Some("person"), schema.title());
        assert_eq!(None, schema.description());
    }

    #[test]
    fn min_properties() {
        let schema = Schema::compile(&json!({ "bsonType": "object", "minProperties": 2 })).unwrap();
        assert_eq!(
            ValidationErrorKind::MinProperties { min: 2, actual: 1 },
            schema.verify(&json!({ "a": 1 })).unwrap_err().kind
        );
        assert!(schema.verify(&json!({ "a": 1, "b": 2 })).is_ok());
    }

    #[test]
    fn max_properties_zero_is_not_unset() {
        let schema = Schema::compile(&json!({ "bsonType": "object", "maxProperties": 0 })).unwrap();
        assert!(schema.verify(&json!({})).is_ok());
        assert!(schema.verify(&json!({ "a": 1 })).is_err());
    }

    #[test]
    fn type_union_property() {
        let schema = person();
        assert!(schema.verify(&json!({ "a": "x", "b": true })).is_ok());
        assert!(schema.verify(&json!({ "a": 3, "b": true })).is_ok());
        assert!(schema.verify(&json!({ "a": false, "b": true })).is_err());
    }

    #[test]
    fn unsupported_type_then_corrected() {
        let err = Schema::compile(&json!({ "bsonType": "integer" })).unwrap_err();
        assert_eq!(
            CompileError::Unsupported {
                schema_path: vec![],
                type_name: "integer".to_owned()
            },
            err
        );

        assert!(Schema::compile(&json!({ "bsonType": "int" })).is_ok());
    }

    #[test]
    fn unique_items() {
        let schema =
            Schema::compile(&json!({ "bsonType": "array", "uniqueItems": true })).unwrap();
        assert_eq!(
            ValidationErrorKind::UniqueItems {
                first: 1,
                second: 2
            },
            schema.verify(&json!([1, 2, 2])).unwrap_err().kind
        );
        assert!(schema.verify(&json!([1, 2, 3])).is_ok());
    }

    #[test]
    fn pattern_and_additional_properties() {
        let open = json!({
            "bsonType": "object",
            "properties": { "name": { "bsonType": "string" } },
            "patternProperties": { "^x_": { "bsonType": "int" } },
        });
        let mut closed = open.clone();
        closed["additionalProperties"] = json!(false);

        let open = Schema::compile(&open).unwrap();
        let closed = Schema::compile(&closed).unwrap();

        assert!(open.verify(&json!({ "name": "n", "x_count": 1 })).is_ok());
        assert!(closed.verify(&json!({ "name": "n", "x_count": 1 })).is_ok());

        let err = open.verify(&json!({ "x_count": "one" })).unwrap_err();
        assert_eq!(vec!["x_count"], err.instance_path);
        assert_eq!(vec!["patternProperties", "^x_", "bsonType"], err.schema_path);

        assert!(open.verify(&json!({ "other": true })).is_ok());
        assert_eq!(
            ValidationErrorKind::AdditionalProperty {
                property: "other".to_owned()
            },
            closed.verify(&json!({ "other": true })).unwrap_err().kind
        );
    }

    #[test]
    fn property_dependencies() {
        let schema = Schema::compile(&json!({
            "bsonType": "object",
            "dependencies": { "card": ["billing"] },
        }))
        .unwrap();

        assert_eq!(
            ValidationErrorKind::Dependency {
                property: "card".to_owned(),
                dependency: "billing".to_owned()
            },
            schema.verify(&json!({ "card": 1 })).unwrap_err().kind
        );
        assert!(schema.verify(&json!({ "name": "x" })).is_ok());
        assert!(schema.verify(&json!({ "card": 1, "billing": 2 })).is_ok());
    }

    #[test]
    fn reused_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();

        let schema = std::sync::Arc::new(person());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let schema = std::sync::Arc::clone(&schema);
                std::thread::spawn(move || schema.is_valid(&json!({ "a": i, "b": i % 2 == 0 })))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn invalid_schema_suite() {
        use std::collections::BTreeMap;

        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct TestCase {
            schema: Value,
            schema_path: Vec<String>,
            unsupported: bool,
        }

        let test_cases: BTreeMap<String, TestCase> =
            serde_json::from_str(include_str!("../suite/invalid_schemas.json"))
                .expect("parse invalid_schemas.json");

        for (test_case_name, test_case) in test_cases {
            match Schema::compile(&test_case.schema) {
                Err(CompileError::Unsupported { schema_path, .. }) if test_case.unsupported => {
                    assert_eq!(test_case.schema_path, schema_path, "{}", test_case_name)
                }
                Err(CompileError::Malformed { schema_path, .. }) if !test_case.unsupported => {
                    assert_eq!(test_case.schema_path, schema_path, "{}", test_case_name)
                }
                other => panic!("{}: unexpected result {:?}", test_case_name, other),
            }
        }
    }
}
