//! # Schema Module
//!
//! Type descriptors, record schemas and the conversion engine every other
//! stage of the pipeline leans on.
//!
//! ## Overview
//!
//! Rust types carry no runtime shape information, so every declared parameter
//! or field type is described by a [`TypeDesc`] value built once at endpoint
//! registration. A [`RecordSchema`] is a named list of [`Field`]s, each with a
//! type, an optional default and [`Constraints`].
//!
//! ## Conversion
//!
//! [`convert()`] validates loosely-typed JSON data against a descriptor:
//!
//! - non-strict: numeric strings become numbers, `"on"`/`"1"` become booleans
//! - record fields missing from the input take their default
//! - unknown record keys are dropped
//! - sets are de-duplicated
//! - failures are reported as [`ErrorDetail`] values with a location path
//!
//! ## Records
//!
//! `#[derive(Record)]` builds a record schema from a struct definition,
//! honouring serde renames; [`RecordSchema::builder`] covers hand-written
//! schemas.
//!
//! ## Native Objects
//!
//! [`NativeObject`] lets persistence-layer objects be read as records, with
//! relations, computed properties and file attachments flattened to JSON.
//!
//! ## Documentation Export
//!
//! [`to_json_schema`] renders a descriptor as JSON Schema for API docs.

mod convert;
mod json_schema;
mod native;
mod record;
mod types;

pub use convert::{convert, convert_record, ErrorDetail, LocSegment};
pub use json_schema::to_json_schema;
pub use native::{native_to_value, native_value_to_value, NativeObject, NativeValue};
pub use brrtbind_macros::Record;
pub use record::{Field, Record, RecordBuilder, RecordSchema};
pub use types::{CollectionKind, Constraints, IntWidth, Pattern, TypeDesc};
