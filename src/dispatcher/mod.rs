//! # Dispatcher Module
//!
//! Registers compiled endpoints by handler name and runs every request
//! through the binding pipeline.
//!
//! ## Request Flow
//!
//! For each call, in order:
//!
//! 1. **Method** - an endpoint pinned to one method answers anything else with
//!    `405` and an `Allow` header
//! 2. **Authentication** - only for endpoints with `auth` or `permissions`;
//!    the first backend that finds a user wins and the user is attached to
//!    the request (`401`/`403` on failure)
//! 3. **Extraction** - path, query, body and file buckets (only when the
//!    handler declares parameters)
//! 4. **Binding** - each parameter resolved from its ordered sources,
//!    validated and coerced as one record; `400 invalid_input` with
//!    `error_details` on failure, plain `400 invalid_input` when a required
//!    parameter is absent
//! 5. **Dispatch** - the handler runs; an [`ApiError`](crate::error::ApiError)
//!    becomes `{"error": ...}` with its status
//! 6. **Output** - native objects are bridged and the result is validated
//!    against the declared return type
//!
//! `Ok` responses cover every outcome the binding layer decides. `Err` is an
//! undeclared handler failure or an output contract violation and belongs to
//! the surrounding framework.
//!
//! ## Registration
//!
//! ```rust
//! use brrtbind::config::BindConfig;
//! use brrtbind::dispatcher::{Dispatcher, Endpoint};
//! use brrtbind::error::HandlerResult;
//! use brrtbind::server::{HandlerRequest, ParamVec, Reply};
//! use brrtbind::signature::{ParamDecl, Query};
//! use brrtbind::typed::Arguments;
//!
//! fn list_posts(_req: &HandlerRequest, args: Arguments) -> HandlerResult<Reply> {
//!     let limit: i64 = args.get("limit")?;
//!     Ok(Reply::json(serde_json::json!({ "limit": limit })))
//! }
//!
//! let mut builder = Dispatcher::builder(BindConfig::default());
//! builder
//!     .register(
//!         Endpoint::get("list_posts", list_posts)
//!             .param(ParamDecl::of::<Query<i64>>("limit").default(10)),
//!     )
//!     .unwrap();
//! let dispatcher = std::sync::Arc::new(builder.build());
//!
//! let resp = dispatcher
//!     .dispatch("list_posts", HandlerRequest::get("/posts?limit=3"), &ParamVec::new())
//!     .unwrap();
//! assert_eq!(resp.body, Some(serde_json::json!({ "limit": 3 })));
//! ```
//!
//! A built [`Dispatcher`] is read-only and can be shared across threads
//! behind an `Arc`.

mod bind;
mod core;
mod methods;
mod output;

pub use bind::{bind, resolve_values, BindFailure};
pub use core::{Dispatcher, DispatcherBuilder, Endpoint, EndpointBuilder};
pub use methods::MethodRouter;
pub use output::{convert_output, OutputValidationError};
