//! # Signature Module
//!
//! Turns a handler's declared parameters into a [`CompiledHandlerSchema`] at
//! registration time.
//!
//! ## Declaring Parameters
//!
//! Parameter types are Rust types implementing [`Describe`]. Wrapping a type
//! in a marker pins where its value comes from:
//!
//! | Marker               | Sources                 |
//! |----------------------|-------------------------|
//! | [`Path<T>`]          | path                    |
//! | [`Query<T>`]         | query                   |
//! | [`Body<T>`]          | body                    |
//! | [`BodyDirect<T>`]    | the whole body (record) |
//! | [`File<T>`]          | files                   |
//! | [`QueryOrBody<T>`]   | query, then body        |
//! | [`PathOrQuery<T>`]   | path, then query        |
//!
//! Without a marker, records come from the body, bare collections from a
//! query list, file types from the file bucket, and everything else from
//! the path and then the query string.
//!
//! ## Example
//!
//! ```rust
//! use brrtbind::signature::{compile, HandlerSignature, ParamDecl, Query, SourceKind};
//!
//! let sig = HandlerSignature::new("list_posts")
//!     .param(ParamDecl::of::<Query<i64>>("limit").default(20))
//!     .param(ParamDecl::of::<Vec<String>>("tag"));
//! let compiled = compile(&sig, None).unwrap();
//! let sources = compiled.parameter_sources();
//! assert_eq!(sources["limit"].as_slice(), &[SourceKind::Query]);
//! assert_eq!(sources["tag"].as_slice(), &[SourceKind::QueryList]);
//! ```

mod classify;
mod compile;
mod signifier;

pub use classify::{sources_for_input, SourceKind, SourceList};
pub use compile::{compile, CompiledHandlerSchema, CompiledParam, HandlerSignature, ParamDecl};
pub use signifier::{
    extract_signifier, Annotation, Body, BodyDirect, DateTime, Describe, File, Path, PathOrQuery,
    Query, QueryOrBody, Signifier,
};
