use crate::schema::{
    convert_record, native_value_to_value, CollectionKind, ErrorDetail, LocSegment, NativeValue, TypeDesc,
};
use crate::server::Payload;
use crate::signature::CompiledHandlerSchema;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::error;

/// A handler's return value did not match its declared output type.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Handler {handler} returned a value that does not match its declared output type")]
pub struct OutputValidationError {
    pub handler: String,
    pub details: Vec<ErrorDetail>,
}

/// Record type native objects of this declared type are read against.
fn native_target(ty: &TypeDesc) -> Option<&TypeDesc> {
    let base = ty.is_optional().1;
    match base {
        TypeDesc::Record(_) => Some(base),
        TypeDesc::Collection(_, item) => native_target(item),
        _ => None,
    }
}

/// Drop repeated members of a bridged set payload, keeping first occurrences.
fn dedupe(data: Value) -> Value {
    match data {
        Value::Array(items) => {
            let mut seen = HashSet::new();
            Value::Array(items.into_iter().filter(|v| seen.insert(v.to_string())).collect())
        }
        other => other,
    }
}

/// Turn native persistence objects into plain data shaped by `ty`.
fn bridge(handler: &str, payload: Payload, ty: &TypeDesc) -> anyhow::Result<Value> {
    let (native, kind) = match payload {
        Payload::Json(value) => return Ok(value),
        Payload::Native(object) => (NativeValue::Object(object), None),
        Payload::NativeCollection(kind, objects) => (
            NativeValue::Relation(objects.into_iter().map(NativeValue::Object).collect()),
            Some(kind),
        ),
    };
    if native_target(ty).is_none() {
        anyhow::bail!("Handler {handler} returned native objects but declares output type {ty}");
    }
    let returned = kind.map_or("a single native object", CollectionKind::as_str);
    if kind.is_some() != ty.is_optional().1.is_collection() {
        anyhow::bail!("Handler {handler} returned {returned} but declares output type {ty}");
    }

    let data = native_value_to_value(native, ty);
    Ok(match kind {
        Some(kind) if kind.is_set() => dedupe(data),
        _ => data,
    })
}

/// Convert what a handler returned into the response body.
///
/// Native objects are bridged into plain data first. With `validate` set and
/// an output type declared, the data is wrapped as `{"value": data}`,
/// validated and coerced against the output record, then unwrapped. Already
/// well-shaped data comes out unchanged.
pub fn convert_output(
    schema: &CompiledHandlerSchema,
    payload: Payload,
    validate: bool,
) -> anyhow::Result<Value> {
    let handler = schema.handler_name();
    let Some(output_type) = schema.output_type() else {
        return match payload {
            Payload::Json(value) => Ok(value),
            _ => anyhow::bail!("Handler {handler} returned native objects without a declared output type"),
        };
    };

    let data = bridge(handler, payload, output_type)?;
    let Some(output_schema) = schema.output_schema().filter(|_| validate) else {
        return Ok(data);
    };

    let mut wrapped = Map::new();
    wrapped.insert("value".to_string(), data);
    match convert_record(&wrapped, output_schema, false) {
        Ok(mut object) => Ok(object.remove("value").unwrap_or(Value::Null)),
        Err(details) => {
            let details: Vec<ErrorDetail> = details
                .into_iter()
                .map(|mut detail| {
                    if detail.loc.first() == Some(&LocSegment::from("value")) {
                        detail.loc.remove(0);
                    }
                    detail
                })
                .collect();
            error!(
                handler_name = %handler,
                error_count = details.len(),
                errors = ?details,
                "Output validation failed"
            );
            Err(OutputValidationError {
                handler: handler.to_string(),
                details,
            }
            .into())
        }
    }
}
