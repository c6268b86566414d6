//! Tests for the structured events emitted while dispatching
//!
//! # Test Coverage
//!
//! - Request lifecycle events carrying request id and handler name
//! - Compile-time endpoint summary
//! - Validation failures logged before the 400 goes out
//! - Unknown handlers logged at ERROR

mod common;

use brrtbind::error::HandlerResult;
use brrtbind::server::{HandlerRequest, Reply};
use brrtbind::signature::{ParamDecl, Query};
use brrtbind::typed::Arguments;
use brrtbind::Endpoint;
use common::{dispatcher, no_params};
use serde_json::json;
use tracing_util::TestTracing;

const REQUEST_ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

fn echo_limit(_req: &HandlerRequest, args: Arguments) -> HandlerResult<Reply> {
    let limit: i64 = args.get("limit")?;
    Ok(Reply::json(json!({ "limit": limit })))
}

#[test]
fn test_request_lifecycle_events() {
    let tracing = TestTracing::init();
    let d = dispatcher(vec![Endpoint::get("echo_limit", echo_limit)
        .param(ParamDecl::of::<Query<i64>>("limit").default(10))]);

    let req = HandlerRequest::get("/?limit=3").header("X-Request-Id", REQUEST_ID);
    let resp = d.dispatch("echo_limit", req, &no_params()).unwrap();
    assert_eq!(resp.status, 200);

    let received = tracing.logs.with_message("Request received");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["fields"]["request_id"], REQUEST_ID);
    assert_eq!(received[0]["fields"]["handler_name"], "echo_limit");
    assert_eq!(received[0]["fields"]["method"], "GET");

    let finalized = tracing.logs.with_message("Request finalized");
    assert_eq!(finalized.len(), 1);
    assert_eq!(finalized[0]["fields"]["request_id"], REQUEST_ID);
    assert_eq!(finalized[0]["fields"]["status"], 200);
    assert!(finalized[0]["fields"]["execution_time_ms"].is_number());
}

#[test]
fn test_endpoint_compile_summary() {
    let tracing = TestTracing::init();
    let _d = dispatcher(vec![Endpoint::get("echo_limit", echo_limit)
        .param(ParamDecl::of::<Query<i64>>("limit").default(10))]);

    let compiled = tracing.logs.with_message("Endpoint compiled");
    assert_eq!(compiled.len(), 1);
    assert_eq!(compiled[0]["fields"]["handler_name"], "echo_limit");
    assert_eq!(compiled[0]["fields"]["params"], 1);

    let sources = tracing.logs.with_message("Parameter sources");
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["fields"]["param"], "limit");
}

#[test]
fn test_validation_failure_logged() {
    let tracing = TestTracing::init();
    let d = dispatcher(vec![Endpoint::get("echo_limit", echo_limit)
        .param(ParamDecl::of::<Query<i64>>("limit").default(10))]);

    let resp = d
        .dispatch("echo_limit", HandlerRequest::get("/?limit=lots"), &no_params())
        .unwrap();
    assert_eq!(resp.status, 400);

    let failed = tracing.logs.with_message("Input validation failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["level"], "INFO");
    assert!(tracing.logs.with_message("Dispatching to handler").is_empty());
}

#[test]
fn test_unknown_handler_logged_as_error() {
    let tracing = TestTracing::init();
    let d = dispatcher(vec![Endpoint::get("echo_limit", echo_limit)]);

    let resp = d.dispatch("missing", HandlerRequest::get("/"), &no_params()).unwrap();
    assert_eq!(resp.status, 404);

    let events = tracing.logs.with_message("Handler not found");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["level"], "ERROR");
    assert_eq!(events[0]["fields"]["available_handlers"], "[\"echo_limit\"]");
}
