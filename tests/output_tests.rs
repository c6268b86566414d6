//! Tests for output conversion
//!
//! # Test Coverage
//!
//! - Native persistence objects bridged through record schemas
//! - Collection shape kept for lists and sets of records
//! - Idempotence on already well-shaped output
//! - Output contract violations surfacing as errors
//! - Per-endpoint and configured `validate_output`

mod common;

use brrtbind::config::BindConfig;
use brrtbind::dispatcher::OutputValidationError;
use brrtbind::error::HandlerResult;
use brrtbind::schema::{CollectionKind, NativeObject, Record, TypeDesc};
use brrtbind::server::{HandlerRequest, Reply};
use brrtbind::signature::Describe;
use brrtbind::typed::Arguments;
use brrtbind::Endpoint;
use common::{
    dispatcher, dispatcher_with_config, no_params, post_rows, AuthorRow, AuthorSchema, PostRow,
    PostSchema,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

fn one_post(_req: &HandlerRequest, _args: Arguments) -> HandlerResult<Reply> {
    let mut row = PostRow::sample(9);
    row.image = Some("/media/posts/9.png");
    Ok(Reply::native(Arc::new(row)))
}

#[test]
fn test_native_object_bridged_through_record() {
    let d = dispatcher(vec![Endpoint::get("one_post", one_post).returns::<PostSchema>()]);
    let resp = d.dispatch("one_post", HandlerRequest::get("/"), &no_params()).unwrap();
    assert_eq!(
        resp.body,
        Some(json!({
            "id": 9,
            "title": "Hello",
            "published": true,
            "created": "2024-01-02T03:04:05Z",
            "author": {"id": 1, "name": "ada"},
            "tags": ["rust", "web"],
            "word_count": 3,
            "image": "/media/posts/9.png",
        }))
    );
}

#[test]
fn test_record_from_native_object() {
    let post = PostSchema::from_native(&PostRow::sample(2)).unwrap();
    assert_eq!(post.author, AuthorSchema { id: 1, name: "ada".into() });
    assert_eq!(post.image, None);
    assert_eq!(post.tags, vec!["rust", "web"]);
}

#[test]
fn test_output_conversion_is_idempotent() {
    let post = PostSchema::from_native(&PostRow::sample(4)).unwrap();
    let data = post.to_data().unwrap();
    let echoed = data.clone();
    let d = dispatcher(vec![Endpoint::get(
        "echo",
        move |_req: &HandlerRequest, _args: Arguments| -> HandlerResult<Reply> {
            Ok(Reply::json(echoed.clone()))
        },
    )
    .returns::<PostSchema>()]);
    let resp = d.dispatch("echo", HandlerRequest::get("/"), &no_params()).unwrap();
    assert_eq!(resp.body, Some(data));
}

#[test]
fn test_set_output_keeps_set_shape() {
    let d = dispatcher(vec![Endpoint::get(
        "authors",
        |_req: &HandlerRequest, _args: Arguments| -> HandlerResult<Reply> {
            let rows: Vec<Arc<dyn NativeObject>> = vec![
                Arc::new(AuthorRow { id: 1, name: "ada" }),
                Arc::new(AuthorRow { id: 1, name: "ada" }),
                Arc::new(AuthorRow { id: 2, name: "grace" }),
            ];
            Ok(Reply::native_collection(CollectionKind::Set, rows))
        },
    )
    .returns_type(TypeDesc::set(AuthorSchema::type_desc()))]);
    let resp = d.dispatch("authors", HandlerRequest::get("/"), &no_params()).unwrap();
    let body = resp.body.unwrap();
    let authors = body.as_array().unwrap();
    assert_eq!(authors.len(), 2);
    let names: HashSet<&str> = authors.iter().filter_map(|a| a["name"].as_str()).collect();
    assert_eq!(names, HashSet::from(["ada", "grace"]));
}

#[test]
fn test_output_contract_violation_is_an_error() {
    let d = dispatcher(vec![Endpoint::get(
        "broken",
        |_req: &HandlerRequest, _args: Arguments| -> HandlerResult<Reply> {
            Ok(Reply::json(json!({"id": "not a number", "name": "x"})))
        },
    )
    .returns::<AuthorSchema>()]);
    let err = d
        .dispatch("broken", HandlerRequest::get("/"), &no_params())
        .unwrap_err();
    let err = err.downcast::<OutputValidationError>().unwrap();
    assert_eq!(err.handler, "broken");
    assert_eq!(err.details.len(), 1);
}

#[test]
fn test_validation_disabled_per_endpoint_and_by_config() {
    let broken = || {
        Endpoint::get(
            "broken",
            |_req: &HandlerRequest, _args: Arguments| -> HandlerResult<Reply> {
                Ok(Reply::json(json!({"id": "not a number"})))
            },
        )
        .returns::<AuthorSchema>()
    };

    let d = dispatcher(vec![broken().validate_output(false)]);
    let resp = d.dispatch("broken", HandlerRequest::get("/"), &no_params()).unwrap();
    assert_eq!(resp.body, Some(json!({"id": "not a number"})));

    let config = BindConfig {
        validate_output: false,
        ..BindConfig::default()
    };
    let d = dispatcher_with_config(config.clone(), vec![broken()]);
    assert!(d.dispatch("broken", HandlerRequest::get("/"), &no_params()).is_ok());

    let d = dispatcher_with_config(config, vec![broken().validate_output(true)]);
    assert!(d.dispatch("broken", HandlerRequest::get("/"), &no_params()).is_err());
}

#[test]
fn test_native_without_output_type_is_an_error() {
    let d = dispatcher(vec![Endpoint::get(
        "untyped",
        |_req: &HandlerRequest, _args: Arguments| -> HandlerResult<Reply> {
            Ok(Reply::native_list(post_rows(2)))
        },
    )]);
    assert!(d.dispatch("untyped", HandlerRequest::get("/"), &no_params()).is_err());
}

#[test]
fn test_untyped_json_passes_through() {
    let d = dispatcher(vec![Endpoint::get(
        "untyped",
        |_req: &HandlerRequest, _args: Arguments| -> HandlerResult<Reply> {
            Ok(Reply::json(json!({"free": ["form", 1, null]})))
        },
    )]);
    let resp = d.dispatch("untyped", HandlerRequest::get("/"), &no_params()).unwrap();
    assert_eq!(resp.body, Some(json!({"free": ["form", 1, null]})));
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
}
