//! # Typed Module
//!
//! The handler-invocation boundary.
//!
//! A [`Handler`] receives the request by reference and an [`Arguments`] value
//! holding its validated parameters. Arguments are read by name and
//! deserialized into whatever Rust type the handler wants:
//!
//! ```rust
//! use brrtbind::server::{HandlerRequest, Reply};
//! use brrtbind::typed::Arguments;
//! use brrtbind::error::HandlerResult;
//!
//! fn list_posts(_req: &HandlerRequest, args: Arguments) -> HandlerResult<Reply> {
//!     let limit: i64 = args.get("limit")?;
//!     let published: Option<bool> = args.optional("published")?;
//!     Ok(Reply::json(serde_json::json!({"limit": limit, "published": published})))
//! }
//! ```
//!
//! Defaults declared on the endpoint apply when a parameter resolved absent.
//! Asking for a parameter that has neither a value nor a default returns
//! [`HandlerError::MissingArgument`](crate::error::HandlerError::MissingArgument),
//! which the dispatcher answers with `400 {"error": "invalid_input"}`.
//!
//! [`Arguments::parse`] deserializes all arguments into one struct, for
//! handlers that prefer a typed request.

mod core;

pub use core::{Arguments, Handler};
