//! # brrtbind
//!
//! **brrtbind** is a request-binding and validation layer that sits between an
//! HTTP framework's routing and your handler functions. Each handler declares
//! its parameters as Rust types; brrtbind works out where each value comes
//! from, validates and coerces it, invokes the handler, and validates what the
//! handler returns.
//!
//! ## Overview
//!
//! At registration time a handler signature is compiled once into a
//! [`CompiledHandlerSchema`](signature::CompiledHandlerSchema): every
//! parameter gets an ordered list of sources (path, query, body, ...) and one
//! input record covering all parameters is built. Misconfigured signatures
//! fail registration with a [`ConfigError`](error::ConfigError) and never
//! serve traffic.
//!
//! At request time the [`Dispatcher`](dispatcher::Dispatcher) extracts the
//! request's values, binds them to the compiled parameters, calls the handler
//! and converts its output. Invalid input is answered with the fixed
//! `{"error": "invalid_input", "error_details": [...]}` body.
//!
//! ## Architecture
//!
//! - **[`signature`]** - type signifiers, source classification, schema compilation
//! - **[`schema`]** - type descriptors, records, constraints, coercion and
//!   JSON Schema export
//! - **[`server`]** - request and response types, value extraction, multipart
//! - **[`dispatcher`]** - endpoints, binding, output conversion, method routing
//! - **[`typed`]** - the handler trait and the [`Arguments`](typed::Arguments) it receives
//! - **[`security`]** - authentication backends, tokens and permission checks
//! - **[`config`]**, **[`logging`]**, **[`error`]** - ambient plumbing
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Framework
//!     participant Dispatcher
//!     participant Auth as AuthBackend
//!     participant Extract as extract()
//!     participant Bind as bind()
//!     participant Handler
//!     participant Output as convert_output()
//!
//!     Framework->>Dispatcher: dispatch(name, request, path params)
//!     Dispatcher->>Dispatcher: method check (405)
//!     Dispatcher->>Auth: authenticate (401 / 403)
//!     Dispatcher->>Extract: path / query / body / files
//!     Extract-->>Dispatcher: ExtractedValues (400 on bad body)
//!     Dispatcher->>Bind: resolve sources, validate, coerce
//!     Bind-->>Dispatcher: Arguments (400 invalid_input)
//!     Dispatcher->>Handler: handle(&request, args)
//!     Handler-->>Dispatcher: Reply / ApiError
//!     Dispatcher->>Output: bridge natives, validate
//!     Output-->>Framework: HandlerResponse
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtbind::config::BindConfig;
//! use brrtbind::dispatcher::{Dispatcher, Endpoint};
//! use brrtbind::error::HandlerResult;
//! use brrtbind::schema::Record;
//! use brrtbind::server::{HandlerRequest, ParamVec, Reply};
//! use brrtbind::signature::ParamDecl;
//! use brrtbind::typed::Arguments;
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Debug, Serialize, Deserialize, Record)]
//! struct NewPost {
//!     #[record(min_length = 1)]
//!     title: String,
//!     body: String,
//! }
//!
//! fn create_post(_req: &HandlerRequest, args: Arguments) -> HandlerResult<Reply> {
//!     let post: NewPost = args.get("post")?;
//!     Ok(Reply::json(json!({ "title": post.title })).with_status(201))
//! }
//!
//! let mut builder = Dispatcher::builder(BindConfig::default());
//! // the only body parameter is a record, so it binds the whole JSON body
//! builder
//!     .register(Endpoint::post("create_post", create_post).param(ParamDecl::of::<NewPost>("post")))
//!     .unwrap();
//! let dispatcher = builder.build();
//!
//! let req = HandlerRequest::post("/posts").json(&json!({"title": "Hi", "body": "..."}));
//! let resp = dispatcher.dispatch("create_post", req, &ParamVec::new()).unwrap();
//! assert_eq!(resp.status, 201);
//!
//! let req = HandlerRequest::post("/posts").json(&json!({"title": "", "body": "..."}));
//! let resp = dispatcher.dispatch("create_post", req, &ParamVec::new()).unwrap();
//! assert_eq!(resp.status, 400);
//! ```
//!
//! ## Configuration
//!
//! [`BindConfig`](config::BindConfig) is read from YAML and `BRRTB_*`
//! environment variables; [`LogConfig`](logging::LogConfig) from
//! `BRRTB_LOG_*`. Call [`logging::init_logging`] once at startup.

extern crate self as brrtbind;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod schema;
pub mod security;
pub mod server;
pub mod signature;
pub mod typed;

pub use config::BindConfig;
pub use dispatcher::{Dispatcher, Endpoint};
pub use error::{ApiError, ConfigError, HandlerError, HandlerResult};
pub use schema::{Record, TypeDesc};
pub use server::{HandlerRequest, HandlerResponse, Reply};
pub use signature::{compile, CompiledHandlerSchema, ParamDecl};
pub use typed::{Arguments, Handler};
