//! Tests for generated JSON Schema documents
//!
//! The documents are checked with an independent validator against values
//! the converter accepts and rejects, so both sides agree on the contract.

mod common;

use brrtbind::schema::Record;
use brrtbind::signature::{compile, HandlerSignature, ParamDecl, Query};
use brrtbind::signature::Describe;
use common::{CommentSchema, PostCreate, PostRow, PostSchema};
use serde_json::json;

#[test]
fn test_input_schema_accepts_bound_values() {
    let sig = HandlerSignature::new("create_post").param(ParamDecl::of::<PostCreate>("post"));
    let schema = compile(&sig, None).unwrap().input_json_schema();

    let ok = json!({"post": {"title": "Hi", "content": "body", "author_id": 1}});
    assert!(jsonschema::is_valid(&schema, &ok));
    assert!(jsonschema::is_valid(&schema, &json!({"post": null})));

    let short_title = json!({"post": {"title": "", "content": "body", "author_id": 1}});
    assert!(!jsonschema::is_valid(&schema, &short_title));
    let bad_author = json!({"post": {"title": "Hi", "content": "body", "author_id": 0}});
    assert!(!jsonschema::is_valid(&schema, &bad_author));
}

#[test]
fn test_input_schema_documents_defaults() {
    let sig = HandlerSignature::new("list_posts")
        .param(ParamDecl::of::<Query<i64>>("limit").default(20))
        .param(ParamDecl::of::<Option<String>>("title"));
    let schema = compile(&sig, None).unwrap().input_json_schema();
    assert_eq!(schema["title"], "list_posts_input");
    assert_eq!(schema["required"], json!([]));
    assert_eq!(schema["properties"]["limit"]["default"], 20);
    assert_eq!(schema["properties"]["title"]["default"], json!(null));
    assert!(jsonschema::is_valid(&schema, &json!({"limit": 5, "title": null})));
    assert!(!jsonschema::is_valid(&schema, &json!({"limit": "five"})));
}

#[test]
fn test_output_schema_accepts_converted_output() {
    let sig = HandlerSignature::new("list_posts").returns(Vec::<PostSchema>::type_desc());
    let schema = compile(&sig, None).unwrap().output_json_schema().unwrap();

    let posts: Vec<_> = (1..=2)
        .map(|id| PostSchema::from_native(&PostRow::sample(id)).unwrap().to_data().unwrap())
        .collect();
    assert!(jsonschema::is_valid(&schema, &json!(posts)));
    assert!(!jsonschema::is_valid(&schema, &json!([{"id": 1}])));
}

#[test]
fn test_record_constraints_in_schema() {
    let schema = brrtbind::schema::to_json_schema(&CommentSchema::type_desc(), None);
    assert_eq!(schema["required"], json!(["post_id", "rating", "text"]));
    assert_eq!(schema["properties"]["rating"]["minimum"], 1.0);
    assert_eq!(schema["properties"]["rating"]["maximum"], 5.0);

    let ok = json!({"post_id": 1, "rating": 5, "text": "nice"});
    assert!(jsonschema::is_valid(&schema, &ok));
    let too_high = json!({"post_id": 1, "rating": 7, "text": "nice"});
    assert!(!jsonschema::is_valid(&schema, &too_high));
    let too_short = json!({"post_id": 1, "rating": 3, "text": "x"});
    assert!(!jsonschema::is_valid(&schema, &too_short));
}
