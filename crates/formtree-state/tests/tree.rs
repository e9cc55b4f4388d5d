//! Integration tests: building trees from realistic schemas and driving
//! them through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use formtree_core::{SchemaError, TreeOptions, ValidationMode};
use formtree_state::{EventType, NodeGroup, NodeKind, SchemaTree};
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

fn media_schema() -> Value {
    yaml(
        r#"
type: object
properties:
  category: { type: string, enum: [movie, game] }
  title: { type: string }
  openingDate: { type: string }
  releaseDate: { type: string }
  numOfPlayers: { type: number }
oneOf:
  - properties: { category: { enum: [movie] } }
    required: [title, openingDate]
  - properties: { category: { enum: [game] } }
    required: [title, releaseDate, numOfPlayers]
"#,
    )
}

fn quiet() -> TreeOptions {
    TreeOptions {
        validation_mode: ValidationMode::None,
        ..TreeOptions::default()
    }
}

/// Count `CHANGE` notifications on every node of the tree.
fn count_changes(tree: &SchemaTree) -> Rc<RefCell<usize>> {
    let changes = Rc::new(RefCell::new(0));
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let counter = Rc::clone(&changes);
        tree.subscribe(id, move |e| {
            if e.has(EventType::CHANGE) {
                *counter.borrow_mut() += 1;
            }
        });
        stack.extend(tree.node(id).unwrap().child_entries().iter().map(|c| c.node));
    }
    changes
}

#[test]
fn test_serialization_is_idempotent() {
    init_tracing();
    let tree = SchemaTree::new(media_schema(), Some(json!({"category": "movie", "title": "Heat"}))).unwrap();
    let first = tree.value();
    assert_eq!(first, tree.value());
    assert_eq!(first, json!({"category": "movie", "title": "Heat"}));
}

#[test]
fn test_round_trip_fires_no_change() {
    init_tracing();
    let mut tree = SchemaTree::new(
        media_schema(),
        Some(json!({"category": "game", "title": "Go", "numOfPlayers": 2})),
    )
    .unwrap();
    let changes = count_changes(&tree);
    let value = tree.value();
    assert!(tree.set_value(tree.root(), value.clone()));
    assert_eq!(*changes.borrow(), 0);
    assert_eq!(tree.value(), value);
}

#[test]
fn test_one_of_drives_visibility_and_required() {
    init_tracing();
    let mut tree = SchemaTree::builder(media_schema()).options(quiet()).build().unwrap();
    let category = tree.find_from_root("/category").unwrap();
    let title = tree.find_from_root("/title").unwrap();
    let opening = tree.find_from_root("/openingDate").unwrap();
    let release = tree.find_from_root("/releaseDate").unwrap();

    assert!(!tree.node(title).unwrap().visible());
    assert!(!tree.node(opening).unwrap().visible());

    tree.set_value(category, json!("movie"));
    assert!(tree.node(title).unwrap().visible());
    assert!(tree.node(title).unwrap().required());
    assert!(tree.node(opening).unwrap().visible());
    assert!(!tree.node(release).unwrap().visible());

    tree.set_value(category, json!("game"));
    assert!(tree.node(title).unwrap().visible());
    assert!(!tree.node(opening).unwrap().visible());
    assert!(tree.node(release).unwrap().required());
    assert!(!tree.node(category).unwrap().required());
}

#[test]
fn test_inactive_branch_keys_are_not_serialized() {
    init_tracing();
    let schema = yaml(
        r#"
type: object
properties:
  kind: { type: string }
oneOf:
  - properties:
      kind: { const: email }
      address: { type: string }
  - properties:
      kind: { const: phone }
      number: { type: string }
"#,
    );
    let mut tree = SchemaTree::builder(schema)
        .default_value(json!({"kind": "email", "address": "a@b.c", "number": "555"}))
        .options(quiet())
        .build()
        .unwrap();
    assert_eq!(tree.value(), json!({"kind": "email", "address": "a@b.c"}));
    let number = tree.find_from_root("/number").unwrap();
    assert!(!tree.node(number).unwrap().visible());
    assert_eq!(tree.children(tree.root()).len(), 2);

    let kind = tree.find_from_root("/kind").unwrap();
    let children_events = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&children_events);
    tree.subscribe(tree.root(), move |e| {
        if e.has(EventType::UPDATE_CHILDREN) {
            *counter.borrow_mut() += 1;
        }
    });
    tree.set_value(kind, json!("phone"));
    assert_eq!(tree.value(), json!({"kind": "phone", "number": "555"}));
    assert!(tree.node(number).unwrap().visible());
    assert_eq!(*children_events.borrow(), 1);
}

#[test]
fn test_round_trip_keeps_inactive_branch_values() {
    init_tracing();
    let schema = yaml(
        r#"
type: object
properties:
  kind: { type: string }
oneOf:
  - properties:
      kind: { const: email }
      address: { type: string }
  - properties:
      kind: { const: phone }
      number: { type: string }
"#,
    );
    let mut tree = SchemaTree::builder(schema)
        .default_value(json!({"kind": "email", "address": "a@b.c", "number": "555"}))
        .options(quiet())
        .build()
        .unwrap();
    let changes = count_changes(&tree);
    let value = tree.value();
    assert!(tree.set_value(tree.root(), value.clone()));
    assert_eq!(*changes.borrow(), 0);
    assert_eq!(tree.value(), value);

    let number = tree.find_from_root("/number").unwrap();
    assert_eq!(tree.node_value(number), Some(json!("555")));

    let kind = tree.find_from_root("/kind").unwrap();
    tree.set_value(kind, json!("phone"));
    assert_eq!(tree.value(), json!({"kind": "phone", "number": "555"}));

    tree.set_value(tree.root(), json!({"kind": "email", "number": "556"}));
    assert_eq!(tree.node_value(number), Some(json!("556")), "a named inactive key is still written");
}

#[test]
fn test_path_resolution() {
    let schema = json!({
        "type": "object",
        "properties": {
            "parent": {
                "type": "object",
                "properties": {"child": {"type": "string"}}
            },
            "sibling": {"type": "number"},
            "a/b": {"type": "string"}
        }
    });
    let tree = SchemaTree::new(schema, None).unwrap();
    let child = tree.find_from_root("/parent/child").unwrap();
    let sibling = tree.find_from_root("sibling").unwrap();
    let segments = ["..".to_string(), "..".to_string(), "sibling".to_string()];
    assert_eq!(tree.find_segments(child, &segments), Some(sibling));
    assert_eq!(tree.find(tree.root(), ".."), None);
    assert_eq!(tree.find(tree.root(), "//parent///child/"), Some(child));

    let escaped = tree.find_from_root("/a~1b").unwrap();
    assert_eq!(tree.node(escaped).unwrap().path(), "/a~1b");
    assert_eq!(tree.node(escaped).unwrap().key(), Some("a/b"));
}

#[test]
fn test_computed_expressions_and_inheritance() {
    init_tracing();
    let schema = yaml(
        r##"
type: object
properties:
  locked: { type: boolean }
  notes:
    type: object
    computed:
      readOnly: "../locked === true"
    properties:
      body: { type: string }
      hidden: { type: string, visible: false }
      mirror:
        type: string
        computed:
          watch: ["#/locked", "../body"]
"##,
    );
    let mut tree = SchemaTree::builder(schema).options(quiet()).build().unwrap();
    let locked = tree.find_from_root("/locked").unwrap();
    let body = tree.find_from_root("/notes/body").unwrap();
    let hidden = tree.find_from_root("/notes/hidden").unwrap();
    let mirror = tree.find_from_root("/notes/mirror").unwrap();

    assert!(!tree.node(hidden).unwrap().visible());
    assert!(!tree.node(body).unwrap().read_only());

    tree.batch(|t| {
        t.set_value(locked, json!(true));
        t.set_value(body, json!("draft"));
    });
    assert!(tree.node(body).unwrap().read_only(), "readOnly is inherited");
    assert_eq!(tree.node(mirror).unwrap().computed().watch_values, vec![json!(true), json!("draft")]);
    assert_eq!(tree.node(mirror).unwrap().dependency_paths(), &["#/locked", "../body"]);
}

#[test]
fn test_virtual_field_aggregates_siblings() {
    init_tracing();
    let schema = yaml(
        r#"
type: object
properties:
  title: { type: string }
  start: { type: string }
  end: { type: string }
virtual:
  period:
    fields: [start, end]
"#,
    );
    let mut tree = SchemaTree::builder(schema).options(quiet()).build().unwrap();
    let keys: Vec<&str> = tree
        .node(tree.root())
        .unwrap()
        .child_entries()
        .iter()
        .map(|c| c.key.as_str())
        .collect();
    assert_eq!(keys, vec!["title", "period", "start", "end"]);

    let period = tree.find_from_root("/period").unwrap();
    assert_eq!(tree.node(period).unwrap().group(), NodeGroup::Virtual);
    assert_eq!(tree.node(period).unwrap().kind(), NodeKind::Virtual);

    let seen = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&seen);
    tree.subscribe(period, move |e| {
        if e.has(EventType::CHANGE) {
            *counter.borrow_mut() += 1;
        }
    });
    assert!(tree.set_value(period, json!(["2024-01-01", "2024-02-01"])));
    assert_eq!(tree.value(), json!({"start": "2024-01-01", "end": "2024-02-01"}));

    let end = tree.find_from_root("/end").unwrap();
    tree.set_value(end, json!("2024-03-01"));
    assert_eq!(tree.node_value(period), Some(json!(["2024-01-01", "2024-03-01"])));
    assert_eq!(*seen.borrow(), 2, "writes to a field notify the virtual node");
}

#[test]
fn test_array_defaults_and_bounds() {
    init_tracing();
    let schema = yaml(
        r#"
type: object
properties:
  pair:
    type: array
    prefixItems:
      - { type: string }
      - { type: integer }
  scores:
    type: array
    items: { type: number }
    minItems: 2
    maxItems: 3
"#,
    );
    let mut tree = SchemaTree::builder(schema)
        .default_value(json!({"pair": ["x", 2.9, "extra"], "scores": [1]}))
        .options(quiet())
        .build()
        .unwrap();
    assert_eq!(tree.value(), json!({"pair": ["x", 2], "scores": [1, null]}));

    let scores = tree.find_from_root("/scores").unwrap();
    assert!(!tree.remove(scores, 0), "cannot shrink below minItems");
    assert!(tree.push(scores, Some(json!(3))).is_some());
    assert!(tree.push(scores, None).is_none(), "cannot grow past maxItems");

    assert!(tree.set_value(scores, json!([9])));
    assert_eq!(tree.node_value(scores), Some(json!([9, null])));
    assert!(!tree.set_value(scores, json!([1, 2, 3, 4])));
}

#[test]
fn test_recursive_schema_through_array() {
    let schema = json!({
        "$defs": {
            "node": {
                "type": "object",
                "properties": {
                    "label": {"type": "string"},
                    "children": {"type": "array", "items": {"$ref": "#/$defs/node"}}
                }
            }
        },
        "$ref": "#/$defs/node"
    });
    let mut tree = SchemaTree::new(schema, Some(json!({"label": "root", "children": [{"label": "leaf"}]}))).unwrap();
    let leaf = tree.find_from_root("/children/0/label").unwrap();
    assert_eq!(tree.node_value(leaf), Some(json!("leaf")));

    let children = tree.find_from_root("/children").unwrap();
    let added = tree.push(children, Some(json!({"label": "new"}))).unwrap();
    assert_eq!(tree.node(added).unwrap().path(), "/children/1");
}

#[test]
fn test_structural_errors_abort_construction() {
    let missing_type = SchemaTree::new(json!({"minimum": 3}), None).unwrap_err();
    assert!(matches!(missing_type, SchemaError::MissingType { .. }));

    let bad_expression = SchemaTree::new(
        json!({"type": "object", "properties": {"a": {"type": "string", "visible": "../b ==="}}}),
        None,
    )
    .unwrap_err();
    assert!(matches!(bad_expression, SchemaError::InvalidCondition { ref property, .. } if property == "visible"));

    let self_recursive = SchemaTree::new(
        json!({"type": "object", "properties": {"me": {"$ref": "#"}}}),
        None,
    )
    .unwrap_err();
    assert!(matches!(self_recursive, SchemaError::InvalidReference { .. }));

    let bad_virtual = SchemaTree::new(
        json!({"type": "object", "properties": {"a": {"type": "string"}}, "virtual": {"v": {"fields": ["zzz"]}}}),
        None,
    )
    .unwrap_err();
    assert!(matches!(bad_virtual, SchemaError::VirtualField { .. }));

    let bad_item = SchemaTree::new(
        json!({"type": "object", "properties": {"list": {"type": "array", "items": {"type": "nope"}}}}),
        None,
    )
    .unwrap_err();
    assert!(matches!(bad_item, SchemaError::UnsupportedType { .. }));
}
