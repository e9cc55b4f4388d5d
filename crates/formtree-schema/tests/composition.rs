//! Integration tests: schema composition and the validation pipeline,
//! driven end to end through the public API.
//!
//! Schemas are authored in YAML here the way form definitions usually are,
//! then converted to JSON values.

use formtree_core::SchemaError;
use formtree_schema::{
    filter_errors, merge_all_of, resolve_array_limits, strip_hints, validate_array_schema,
    ArrayLimits, CompositionMeta, ErrorTransformer, JsonSchemaValidator, Normalizer,
    SchemaValidator,
};
use serde_json::{json, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).expect("fixture must be valid YAML")
}

#[test]
fn test_all_of_tightens_numeric_bounds() {
    init_tracing();
    let merged = merge_all_of(&json!({
        "type": "number",
        "allOf": [{"minimum": 5, "maximum": 10}, {"minimum": 10, "maximum": 5}]
    }))
    .unwrap();
    assert_eq!(merged["minimum"], json!(10));
    assert_eq!(merged["maximum"], json!(5));
}

#[test]
fn test_all_of_pattern_intersection() {
    let merged = merge_all_of(&json!({
        "type": "string",
        "pattern": "^[a-z]+$",
        "allOf": [{"pattern": "^.{5,}$"}]
    }))
    .unwrap();
    assert_eq!(merged["pattern"], json!("(?=^[a-z]+$)(?=^.{5,}$)"));
}

#[test]
fn test_all_of_const_agreement_and_conflict() {
    let same = merge_all_of(&json!({"const": 1, "allOf": [{"const": 1}]})).unwrap();
    assert_eq!(same["const"], json!(1));

    let err = merge_all_of(&json!({"const": 1, "allOf": [{"const": 2}]})).unwrap_err();
    assert!(matches!(err, SchemaError::AllOfConflict { ref keyword, .. } if keyword == "const"));
}

#[test]
fn test_tuple_bounds() {
    let closed = json!({"type": "array", "prefixItems": [{"type": "string"}, {"type": "number"}]});
    assert_eq!(resolve_array_limits(&closed), ArrayLimits { min: 0, max: Some(2) });

    let mut open = closed.clone();
    open["items"] = json!({"type": "boolean"});
    assert_eq!(resolve_array_limits(&open), ArrayLimits { min: 0, max: None });
    assert!(validate_array_schema(&open).is_ok());
}

#[test]
fn test_one_of_conditions_from_yaml_schema() {
    init_tracing();
    let schema = yaml(
        r#"
type: object
properties:
  category:
    type: string
    enum: [movie, game]
  title: { type: string }
  openingDate: { type: string, format: date }
  releaseDate: { type: string, format: date }
  numOfPlayers: { type: number }
oneOf:
  - properties:
      category: { enum: [movie] }
    required: [title, openingDate]
  - properties:
      category: { enum: [game] }
    required: [title, releaseDate, numOfPlayers]
"#,
    );
    let normalized = Normalizer::new(&schema, true).normalize(&schema).unwrap();
    let meta = CompositionMeta::from_schema(&normalized).unwrap();
    assert_eq!(
        meta.required_expression("title").unwrap(),
        r#"(../category === "movie") || (../category === "game")"#
    );
    assert_eq!(
        meta.required_expression("openingDate").unwrap(),
        r#"../category === "movie""#
    );
    assert_eq!(
        meta.required_expression("numOfPlayers").unwrap(),
        r#"../category === "game""#
    );
}

#[test]
fn test_pipeline_rewrites_and_filters() {
    init_tracing();
    let schema = json!({
        "type": "object",
        "FormTypeInput": "Custom",
        "properties": {
            "kind": {"type": "string", "enum": ["a", "b"]},
            "email": {"type": "string", "formType": "email"}
        },
        "required": ["email"],
        "oneOf": [
            {"properties": {"kind": {"const": "a"}}, "required": ["alpha"]},
            {"properties": {"kind": {"const": "b"}}, "required": ["beta"]}
        ]
    });
    let stripped = strip_hints(&schema, &["FormTypeInput".to_string(), "formType".to_string()]);
    assert!(stripped.get("FormTypeInput").is_none());

    let validator = JsonSchemaValidator::new();
    let raw = validator.validate(&json!({"kind": "a"}), &stripped).unwrap();
    assert!(raw.iter().any(|e| e.keyword == "oneOf"));

    let mut transformer = ErrorTransformer::new();
    let errors = filter_errors(transformer.transform(&raw, true), &stripped);
    let paths: Vec<&str> = errors.iter().map(|e| e.data_path.as_str()).collect();
    assert_eq!(paths, vec!["/email"]);
    assert_eq!(errors[0].keyword, "required");
    assert!(errors[0].key.is_some());

    let raw = validator
        .validate(&json!({"kind": "c", "email": "x@y.z"}), &stripped)
        .unwrap();
    assert!(raw.iter().any(|e| e.keyword == "enum"));
    let errors = filter_errors(transformer.transform(&raw, true), &stripped);
    assert!(errors.iter().all(|e| e.keyword != "enum" && e.keyword != "oneOf"));
}
