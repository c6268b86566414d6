//! Non-strict conversion of loosely-typed request data into declared types.
//!
//! Request data arrives as strings (query, form, path) or JSON scalars. The
//! converter walks a [`TypeDesc`] and coerces as it goes:
//!
//! | Declared | Also accepted when not strict                         |
//! |----------|-------------------------------------------------------|
//! | `int`    | numeric strings, integral floats                      |
//! | `float`  | numeric strings, integers                             |
//! | `bool`   | `true/false/1/0/yes/no/on/off` strings, `0`/`1`       |
//!
//! Integers are range-checked against their declared width. Datetimes must
//! name a real calendar instant and come out in canonical RFC 3339 form.
//!
//! Every failure carries a location path so a 400 body can point at the
//! offending input (`["limit"]`, `["data", "title"]`, `["tags", 2]`).

use super::record::RecordSchema;
use super::types::{CollectionKind, Constraints, IntWidth, TypeDesc};
use chrono::{DateTime, NaiveDateTime, SecondsFormat};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse an ISO 8601 / RFC 3339 timestamp and return its canonical form.
///
/// Offsets are kept (`Z` for UTC). A value without an offset stays naive.
/// Calendar-invalid dates such as February 31st are rejected.
fn parse_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let with_t = match raw.as_bytes().get(10) {
        Some(b' ' | b't') => format!("{}T{}", &raw[..10], &raw[11..]),
        _ => raw.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&with_t) {
        return Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }
    if let Ok(dt) = DateTime::parse_from_str(&with_t, "%Y-%m-%dT%H:%M%#z") {
        return Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&with_t, fmt).ok())
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn integral(f: f64) -> Option<i128> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i128)
}

/// One path segment of an error location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LocSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for LocSegment {
    fn from(key: &str) -> Self {
        LocSegment::Key(key.to_string())
    }
}

impl From<usize> for LocSegment {
    fn from(index: usize) -> Self {
        LocSegment::Index(index)
    }
}

/// Entry of the `error_details` array of an `invalid_input` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub loc: Vec<LocSegment>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ErrorDetail {
    #[must_use]
    pub fn new(loc: Vec<LocSegment>, msg: impl Into<String>) -> Self {
        Self {
            loc,
            msg: msg.into(),
            kind: "value_error",
        }
    }
}

/// JSON type name used in "got `...`" messages.
fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected_name(ty: &TypeDesc) -> String {
    match ty {
        TypeDesc::Collection(..) => "array".to_string(),
        TypeDesc::Map(_) | TypeDesc::Record(_) => "object".to_string(),
        other => other.to_string(),
    }
}

fn loose_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

struct Converter {
    strict: bool,
    path: Vec<LocSegment>,
    errors: Vec<ErrorDetail>,
}

impl Converter {
    fn fail(&mut self, msg: String) -> Option<Value> {
        self.errors.push(ErrorDetail::new(self.path.clone(), msg));
        None
    }

    fn mismatch(&mut self, ty: &TypeDesc, value: &Value) -> Option<Value> {
        self.fail(format!(
            "Expected `{}`, got `{}`",
            expected_name(ty),
            kind_of(value)
        ))
    }

    fn convert(&mut self, value: &Value, ty: &TypeDesc, constraints: Option<&Constraints>) -> Option<Value> {
        let converted = match ty {
            TypeDesc::Optional(_) if value.is_null() => return Some(Value::Null),
            TypeDesc::Optional(inner) => return self.convert(value, inner, constraints),
            TypeDesc::Any => Some(value.clone()),
            TypeDesc::Bool => self.to_bool(value, ty),
            TypeDesc::Int(width) => self.to_int(value, *width, ty),
            TypeDesc::Float => self.to_float(value, ty),
            TypeDesc::Str => match value {
                Value::String(_) => Some(value.clone()),
                other => self.mismatch(ty, other),
            },
            TypeDesc::DateTime => match value {
                Value::String(s) => match parse_datetime(s) {
                    Some(canonical) => Some(Value::String(canonical)),
                    None => self.fail("Invalid RFC3339 encoded datetime".to_string()),
                },
                other => self.mismatch(ty, other),
            },
            TypeDesc::Collection(kind, item) => self.to_collection(value, *kind, item, ty),
            TypeDesc::Map(item) => self.to_map(value, item, ty),
            TypeDesc::Record(schema) => self.to_record(value, schema, ty),
            TypeDesc::File | TypeDesc::Request => self.mismatch(ty, value),
        }?;

        match constraints {
            Some(c) if !c.is_empty() => self.check(converted, ty, c),
            _ => Some(converted),
        }
    }

    fn to_bool(&mut self, value: &Value, ty: &TypeDesc) -> Option<Value> {
        match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) if !self.strict => match loose_bool(s) {
                Some(b) => Some(Value::Bool(b)),
                None => self.mismatch(ty, value),
            },
            Value::Number(n) if !self.strict => match n.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => self.mismatch(ty, value),
            },
            other => self.mismatch(ty, other),
        }
    }

    fn to_int(&mut self, value: &Value, width: IntWidth, ty: &TypeDesc) -> Option<Value> {
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from))
                .or_else(|| n.as_f64().filter(|_| !self.strict).and_then(integral)),
            Value::String(s) if !self.strict => {
                let s = s.trim();
                s.parse::<i128>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
            _ => None,
        };
        let Some(i) = parsed else {
            return self.mismatch(ty, value);
        };

        let (min, max) = width.bounds();
        if i < min {
            return self.fail(format!("Expected `int` >= {min}"));
        }
        if i > max {
            return self.fail(format!("Expected `int` <= {max}"));
        }
        i64::try_from(i)
            .map(Value::from)
            .or_else(|_| u64::try_from(i).map(Value::from))
            .ok()
    }

    fn to_float(&mut self, value: &Value, ty: &TypeDesc) -> Option<Value> {
        let parsed = match value {
            Value::Number(n) if n.is_f64() => return Some(value.clone()),
            Value::Number(n) => n.as_f64(),
            Value::String(s) if !self.strict => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed.and_then(Number::from_f64) {
            Some(n) => Some(Value::Number(n)),
            None => self.mismatch(ty, value),
        }
    }

    fn to_collection(
        &mut self,
        value: &Value,
        kind: CollectionKind,
        item: &TypeDesc,
        ty: &TypeDesc,
    ) -> Option<Value> {
        let Value::Array(items) = value else {
            return self.mismatch(ty, value);
        };
        let mut out: Vec<Value> = Vec::with_capacity(items.len());
        let mut seen: HashSet<String> = HashSet::new();
        let mut ok = true;
        for (i, element) in items.iter().enumerate() {
            self.path.push(LocSegment::Index(i));
            match self.convert(element, item, None) {
                Some(v) if kind.is_set() => {
                    if seen.insert(v.to_string()) {
                        out.push(v);
                    }
                }
                Some(v) => out.push(v),
                None => ok = false,
            }
            self.path.pop();
        }
        ok.then_some(Value::Array(out))
    }

    fn to_map(&mut self, value: &Value, item: &TypeDesc, ty: &TypeDesc) -> Option<Value> {
        let Value::Object(entries) = value else {
            return self.mismatch(ty, value);
        };
        let mut out = Map::new();
        let mut ok = true;
        for (key, element) in entries {
            self.path.push(LocSegment::Key(key.clone()));
            match self.convert(element, item, None) {
                Some(v) => {
                    out.insert(key.clone(), v);
                }
                None => ok = false,
            }
            self.path.pop();
        }
        ok.then_some(Value::Object(out))
    }

    fn to_record(
        &mut self,
        value: &Value,
        schema: &RecordSchema,
        ty: &TypeDesc,
    ) -> Option<Value> {
        let Value::Object(entries) = value else {
            return self.mismatch(ty, value);
        };
        self.record_entries(entries, schema).map(Value::Object)
    }

    fn record_entries(
        &mut self,
        entries: &Map<String, Value>,
        schema: &RecordSchema,
    ) -> Option<Map<String, Value>> {
        let mut out = Map::new();
        let mut ok = true;
        for field in schema.fields() {
            match entries.get(&field.name) {
                Some(raw) => {
                    self.path.push(LocSegment::Key(field.name.clone()));
                    match self.convert(raw, &field.ty, Some(&field.constraints)) {
                        Some(v) => {
                            out.insert(field.name.clone(), v);
                        }
                        None => ok = false,
                    }
                    self.path.pop();
                }
                None => match &field.default {
                    Some(default) => {
                        out.insert(field.name.clone(), default.clone());
                    }
                    None => {
                        self.fail(format!("Object missing required field `{}`", field.name));
                        ok = false;
                    }
                },
            }
        }
        ok.then_some(out)
    }

    fn check(&mut self, value: Value, ty: &TypeDesc, c: &Constraints) -> Option<Value> {
        let name = expected_name(ty);

        if let Some(n) = value.as_f64() {
            let bounds = [
                (c.gt, ">", n > c.gt.unwrap_or(f64::NEG_INFINITY)),
                (c.ge, ">=", n >= c.ge.unwrap_or(f64::NEG_INFINITY)),
                (c.lt, "<", n < c.lt.unwrap_or(f64::INFINITY)),
                (c.le, "<=", n <= c.le.unwrap_or(f64::INFINITY)),
            ];
            for (bound, op, holds) in bounds {
                if let (Some(bound), false) = (bound, holds) {
                    return self.fail(format!("Expected `{name}` {op} {bound}"));
                }
            }
        }

        let len = match &value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(a) => Some(a.len()),
            Value::Object(o) => Some(o.len()),
            _ => None,
        };
        if let Some(len) = len {
            if let Some(min) = c.min_length.filter(|min| len < *min) {
                return self.fail(format!("Expected `{name}` of length >= {min}"));
            }
            if let Some(max) = c.max_length.filter(|max| len > *max) {
                return self.fail(format!("Expected `{name}` of length <= {max}"));
            }
        }

        if let (Some(pattern), Value::String(s)) = (&c.pattern, &value) {
            if !pattern.is_match(s) {
                return self.fail(format!(
                    "Expected `str` matching regex '{}'",
                    pattern.as_str()
                ));
            }
        }
        Some(value)
    }
}

/// Convert `value` into `ty`, returning every error found.
///
/// Record fields missing from the input take their defaults; unknown keys are
/// dropped. With `strict` set, no cross-type coercion happens.
pub fn convert(
    value: &Value,
    ty: &TypeDesc,
    constraints: Option<&Constraints>,
    strict: bool,
) -> Result<Value, Vec<ErrorDetail>> {
    let mut converter = Converter {
        strict,
        path: Vec::new(),
        errors: Vec::new(),
    };
    match converter.convert(value, ty, constraints) {
        Some(v) if converter.errors.is_empty() => Ok(v),
        _ => Err(converter.errors),
    }
}

/// [`convert`] against a record schema, for input that is already an object.
pub fn convert_record(
    entries: &Map<String, Value>,
    schema: &RecordSchema,
    strict: bool,
) -> Result<Map<String, Value>, Vec<ErrorDetail>> {
    let mut converter = Converter {
        strict,
        path: Vec::new(),
        errors: Vec::new(),
    };
    match converter.record_entries(entries, schema) {
        Some(out) if converter.errors.is_empty() => Ok(out),
        _ => Err(converter.errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, RecordSchema};
    use serde_json::json;

    #[test]
    fn test_loose_scalars() {
        assert_eq!(convert(&json!("5"), &TypeDesc::int(), None, false), Ok(json!(5)));
        assert_eq!(convert(&json!(2.0), &TypeDesc::int(), None, false), Ok(json!(2)));
        assert_eq!(convert(&json!("off"), &TypeDesc::Bool, None, false), Ok(json!(false)));
        assert_eq!(convert(&json!(1), &TypeDesc::Bool, None, false), Ok(json!(true)));
        assert_eq!(convert(&json!("1.5"), &TypeDesc::Float, None, false), Ok(json!(1.5)));
        assert_eq!(convert(&json!(3), &TypeDesc::Float, None, false), Ok(json!(3.0)));
    }

    #[test]
    fn test_strict_rejects_strings_for_numbers() {
        let err = convert(&json!("5"), &TypeDesc::int(), None, true).unwrap_err();
        assert_eq!(err[0].msg, "Expected `int`, got `str`");
    }

    #[test]
    fn test_int_rejects_fraction() {
        assert!(convert(&json!("2.5"), &TypeDesc::int(), None, false).is_err());
        assert!(convert(&json!(2.5), &TypeDesc::int(), None, false).is_err());
    }

    #[test]
    fn test_str_does_not_accept_numbers() {
        let err = convert(&json!(7), &TypeDesc::Str, None, false).unwrap_err();
        assert_eq!(err[0].msg, "Expected `str`, got `int`");
    }

    #[test]
    fn test_set_deduplicates() {
        let ty = TypeDesc::set(TypeDesc::int());
        assert_eq!(
            convert(&json!(["1", 1, "2"]), &ty, None, false),
            Ok(json!([1, 2]))
        );
    }

    #[test]
    fn test_collection_errors_carry_index() {
        let ty = TypeDesc::list(TypeDesc::int());
        let err = convert(&json!(["1", "x"]), &ty, None, false).unwrap_err();
        assert_eq!(err[0].loc, vec![LocSegment::Index(1)]);
    }

    #[test]
    fn test_record_defaults_and_unknown_keys() {
        let ty = TypeDesc::record(
            RecordSchema::builder("Post")
                .field(Field::new("title", TypeDesc::Str))
                .field(Field::new("published", TypeDesc::Bool).default(false))
                .build(),
        );
        let out = convert(&json!({"title": "t", "extra": 1}), &ty, None, false).unwrap();
        assert_eq!(out, json!({"title": "t", "published": false}));

        let err = convert(&json!({}), &ty, None, false).unwrap_err();
        assert_eq!(err[0].msg, "Object missing required field `title`");
        assert!(err[0].loc.is_empty());
    }

    #[test]
    fn test_constraints_checked_after_coercion() {
        let c = Constraints::new().ge(1.0).le(5.0);
        assert_eq!(convert(&json!("3"), &TypeDesc::int(), Some(&c), false), Ok(json!(3)));
        let err = convert(&json!("9"), &TypeDesc::int(), Some(&c), false).unwrap_err();
        assert_eq!(err[0].msg, "Expected `int` <= 5");

        let c = Constraints::new().min_length(2);
        let err = convert(&json!("a"), &TypeDesc::Str, Some(&c), false).unwrap_err();
        assert_eq!(err[0].msg, "Expected `str` of length >= 2");
    }

    #[test]
    fn test_convert_record_returns_fields() {
        let schema = RecordSchema::builder("Page")
            .field(Field::new("limit", TypeDesc::Int(IntWidth::U8)).default(20))
            .build();
        let input = json!({"limit": "5"});
        let out = convert_record(input.as_object().unwrap(), &schema, false).unwrap();
        assert_eq!(out.get("limit"), Some(&json!(5)));
        let out = convert_record(&Map::new(), &schema, false).unwrap();
        assert_eq!(out.get("limit"), Some(&json!(20)));
    }

    #[test]
    fn test_optional_null_skips_constraints() {
        let c = Constraints::new().min_length(3);
        let ty = TypeDesc::optional(TypeDesc::Str);
        assert_eq!(convert(&Value::Null, &ty, Some(&c), false), Ok(Value::Null));
    }

    #[test]
    fn test_int_width_bounds() {
        let byte = TypeDesc::Int(IntWidth::U8);
        assert_eq!(convert(&json!("255"), &byte, None, false), Ok(json!(255)));
        let err = convert(&json!(300), &byte, None, false).unwrap_err();
        assert_eq!(err[0].msg, "Expected `int` <= 255");
        let err = convert(&json!("-1"), &byte, None, false).unwrap_err();
        assert_eq!(err[0].msg, "Expected `int` >= 0");

        let wide = TypeDesc::int();
        assert!(convert(&json!("9223372036854775808"), &wide, None, false).is_err());
        let unsigned = TypeDesc::Int(IntWidth::U64);
        assert_eq!(
            convert(&json!("18446744073709551615"), &unsigned, None, false),
            Ok(json!(u64::MAX))
        );
    }

    #[test]
    fn test_datetime_format() {
        let dt = |raw: &str| convert(&json!(raw), &TypeDesc::DateTime, None, false);
        assert_eq!(dt("2024-05-01T10:00:00Z"), Ok(json!("2024-05-01T10:00:00Z")));
        assert_eq!(
            dt("2024-05-01T10:00:00.123+02:00"),
            Ok(json!("2024-05-01T10:00:00.123+02:00"))
        );
        assert_eq!(dt("2024-05-01 10:00"), Ok(json!("2024-05-01T10:00:00")));
        assert!(dt("yesterday").is_err());
    }

    #[test]
    fn test_datetime_rejects_impossible_dates() {
        for raw in ["2024-13-45T99:99:99Z", "2024-02-31T00:00:00Z", "0000-00-00 00:00"] {
            let err = convert(&json!(raw), &TypeDesc::DateTime, None, false).unwrap_err();
            assert_eq!(err[0].msg, "Invalid RFC3339 encoded datetime", "{raw}");
        }
    }

    #[test]
    fn test_error_detail_serializes_as_value_error() {
        let detail = ErrorDetail::new(vec!["data".into(), "tags".into(), 0.into()], "bad");
        assert_eq!(
            serde_json::to_value(&detail).unwrap(),
            json!({"loc": ["data", "tags", 0], "msg": "bad", "type": "value_error"})
        );
    }
}
