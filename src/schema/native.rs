//! Bridge from persistence-layer objects to plain record data.
//!
//! A handler may return objects owned by some data layer instead of JSON. The
//! output converter reads them field-by-field through [`NativeObject`],
//! following the declared record schema:
//!
//! - to-many relations become arrays of their members
//! - zero-argument methods (computed properties) are invoked
//! - file attachments become their URL, or null when nothing is stored
//! - related objects are read recursively against the nested record schema

use super::record::RecordSchema;
use super::types::TypeDesc;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const MAX_CALL_DEPTH: usize = 8;

/// Field value as a native object exposes it.
pub enum NativeValue {
    /// The object has no such field; the schema default (if any) applies.
    Absent,
    Value(Value),
    /// Computed property, called with no arguments.
    Callable(Box<dyn Fn() -> NativeValue + Send + Sync>),
    /// To-many relation; the members are read as items of the declared collection.
    Relation(Vec<NativeValue>),
    Object(Arc<dyn NativeObject>),
    /// File attachment: its URL when a file is stored.
    File(Option<String>),
}

impl NativeValue {
    #[must_use]
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn() -> NativeValue + Send + Sync + 'static,
    {
        NativeValue::Callable(Box::new(f))
    }

    #[must_use]
    pub fn relation<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn NativeObject>>,
    {
        NativeValue::Relation(members.into_iter().map(NativeValue::Object).collect())
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Absent => write!(f, "Absent"),
            NativeValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            NativeValue::Callable(_) => write!(f, "Callable"),
            NativeValue::Relation(items) => f.debug_tuple("Relation").field(&items.len()).finish(),
            NativeValue::Object(o) => f.debug_tuple("Object").field(&o.type_name()).finish(),
            NativeValue::File(url) => f.debug_tuple("File").field(url).finish(),
        }
    }
}

macro_rules! native_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for NativeValue {
                fn from(value: $t) -> Self {
                    NativeValue::Value(Value::from(value))
                }
            }
        )*
    };
}

native_from!(Value, &str, String, bool, i32, i64, u32, u64, f64);

/// Field-by-name access to an object owned by a persistence layer.
pub trait NativeObject: Send + Sync {
    fn get_field(&self, name: &str) -> NativeValue;

    /// Label used in logs.
    fn type_name(&self) -> &str {
        "object"
    }
}

/// Record type a nested native value should be read against.
fn record_of(ty: &TypeDesc) -> Option<&Arc<RecordSchema>> {
    match ty {
        TypeDesc::Record(schema) => Some(schema),
        TypeDesc::Optional(inner) | TypeDesc::Collection(_, inner) => record_of(inner),
        _ => None,
    }
}

fn item_of(ty: &TypeDesc) -> &TypeDesc {
    match ty {
        TypeDesc::Optional(inner) => item_of(inner),
        TypeDesc::Collection(_, item) => item,
        other => other,
    }
}

fn resolve(value: NativeValue, ty: &TypeDesc, depth: usize) -> Option<Value> {
    match value {
        NativeValue::Absent => None,
        NativeValue::Value(v) => Some(v),
        NativeValue::Callable(f) if depth < MAX_CALL_DEPTH => resolve(f(), ty, depth + 1),
        NativeValue::Callable(_) => Some(Value::Null),
        NativeValue::Relation(members) => {
            let item = item_of(ty);
            Some(Value::Array(
                members
                    .into_iter()
                    .filter_map(|m| resolve(m, item, depth))
                    .collect(),
            ))
        }
        NativeValue::Object(obj) => match record_of(ty) {
            Some(schema) => Some(native_to_value(obj.as_ref(), schema)),
            None => {
                debug!(object = obj.type_name(), declared = %ty, "Native object in non-record field");
                Some(Value::Null)
            }
        },
        NativeValue::File(url) => Some(url.map_or(Value::Null, Value::String)),
    }
}

/// Read every field of `schema` off `obj`. Absent fields are left out so the
/// schema defaults apply during validation.
pub fn native_to_value(obj: &dyn NativeObject, schema: &RecordSchema) -> Value {
    let mut out = Map::new();
    for field in schema.fields() {
        if let Some(v) = resolve(obj.get_field(&field.name), &field.ty, 0) {
            out.insert(field.name.clone(), v);
        }
    }
    Value::Object(out)
}

/// Read a native value against any declared type (record, collection of
/// records, or scalar).
pub fn native_value_to_value(value: NativeValue, ty: &TypeDesc) -> Value {
    resolve(value, ty, 0).unwrap_or(Value::Null)
}
