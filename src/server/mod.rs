//! # Server Module
//!
//! Request and response value types shared by the whole pipeline, plus the
//! Request Value Extractor.
//!
//! The binding layer does not own a socket. The surrounding framework (or a
//! test) builds a [`HandlerRequest`], the routing layer supplies the path
//! captures as a [`ParamVec`], and the dispatcher answers with a
//! [`HandlerResponse`].
//!
//! ## Extraction
//!
//! [`extract`] produces the four buckets binding reads from:
//!
//! - **path** - routing captures, as strings
//! - **query** - decoded query string with list and bracket flattening
//! - **body** - url-encoded or multipart form fields (POST/PUT/PATCH), then
//!   top-level keys of a JSON object body (any method)
//! - **files** - multipart parts with a filename, as [`UploadedFile`]s
//!
//! ## Handler Output
//!
//! Handlers answer with a [`Reply`]: a JSON payload or native persistence
//! objects, plus an optional status and headers.

mod extract;
mod multipart;
mod request;
mod response;

pub use extract::{extract, get_values, multi_map, Extracted, ExtractedValues, MultiMap};
pub use multipart::{
    boundary_from_content_type, parse_multipart, MultipartError, MultipartForm, UploadedFile,
};
pub use request::{
    HandlerRequest, HeaderVec, ParamVec, RequestId, MAX_INLINE_HEADERS, MAX_INLINE_PARAMS,
    REQUEST_ID_HEADER,
};
pub use response::{HandlerResponse, Payload, Reply};
