use super::record::RecordSchema;
use super::types::{Constraints, IntWidth, TypeDesc};
use serde_json::{json, Map, Value};

/// JSON Schema (draft 2020-12 vocabulary) for a type descriptor.
///
/// Consumed by documentation generators; the converter in
/// [`convert`](super::convert()) remains the source of truth for validation.
#[must_use]
pub fn to_json_schema(ty: &TypeDesc, constraints: Option<&Constraints>) -> Value {
    let mut schema = match ty {
        TypeDesc::Any => json!({}),
        TypeDesc::Bool => json!({"type": "boolean"}),
        TypeDesc::Int(width) => int_schema(*width),
        TypeDesc::Float => json!({"type": "number"}),
        TypeDesc::Str => json!({"type": "string"}),
        TypeDesc::DateTime => json!({"type": "string", "format": "date-time"}),
        TypeDesc::File => json!({"type": "string", "format": "binary"}),
        TypeDesc::Request => json!({}),
        TypeDesc::Optional(inner) => {
            return json!({"anyOf": [to_json_schema(inner, constraints), {"type": "null"}]});
        }
        TypeDesc::Collection(kind, item) => {
            let mut s = json!({"type": "array", "items": to_json_schema(item, None)});
            if kind.is_set() {
                s["uniqueItems"] = Value::Bool(true);
            }
            s
        }
        TypeDesc::Map(value) => {
            json!({"type": "object", "additionalProperties": to_json_schema(value, None)})
        }
        TypeDesc::Record(record) => record_schema(record),
    };
    if let (Some(c), Value::Object(obj)) = (constraints, &mut schema) {
        apply_constraints(obj, ty, c);
    }
    schema
}

/// 64-bit bounds are left out except the unsigned minimum; they are not
/// exactly representable in every JSON consumer.
fn int_schema(width: IntWidth) -> Value {
    let (min, max) = width.bounds();
    match width {
        IntWidth::I64 => json!({"type": "integer"}),
        IntWidth::U64 => json!({"type": "integer", "minimum": 0}),
        _ => json!({"type": "integer", "minimum": min as i64, "maximum": max as i64}),
    }
}

fn record_schema(record: &RecordSchema) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in record.fields() {
        let mut prop = to_json_schema(&field.ty, Some(&field.constraints));
        match &field.default {
            Some(default) => {
                if let Value::Object(obj) = &mut prop {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            None => required.push(Value::String(field.name.clone())),
        }
        properties.insert(field.name.clone(), prop);
    }
    json!({
        "title": record.name(),
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn apply_constraints(obj: &mut Map<String, Value>, ty: &TypeDesc, c: &Constraints) {
    let bounds = [
        ("exclusiveMinimum", c.gt),
        ("minimum", c.ge),
        ("exclusiveMaximum", c.lt),
        ("maximum", c.le),
    ];
    for (key, bound) in bounds {
        if let Some(n) = bound.and_then(serde_json::Number::from_f64) {
            obj.insert(key.to_string(), Value::Number(n));
        }
    }
    let (min_key, max_key) = match ty {
        TypeDesc::Collection(..) => ("minItems", "maxItems"),
        TypeDesc::Map(_) => ("minProperties", "maxProperties"),
        _ => ("minLength", "maxLength"),
    };
    if let Some(min) = c.min_length {
        obj.insert(min_key.to_string(), Value::from(min));
    }
    if let Some(max) = c.max_length {
        obj.insert(max_key.to_string(), Value::from(max));
    }
    if let Some(pattern) = &c.pattern {
        obj.insert("pattern".to_string(), Value::String(pattern.as_str().to_string()));
    }
}
