use crate::schema::{convert_record, ErrorDetail};
use crate::server::{ExtractedValues, HandlerResponse};
use crate::signature::{CompiledHandlerSchema, CompiledParam, SourceKind};
use crate::typed::Arguments;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Why a request could not be bound to its handler's parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum BindFailure {
    /// Input validation failed; the details go back to the caller.
    Invalid(Vec<ErrorDetail>),
    /// A parameter without a default resolved absent.
    Missing(String),
}

impl BindFailure {
    #[must_use]
    pub fn into_response(self) -> HandlerResponse {
        match self {
            BindFailure::Invalid(details) => HandlerResponse::invalid_input(&details),
            BindFailure::Missing(_) => HandlerResponse::error(400, "invalid_input"),
        }
    }
}

fn lookup(source: SourceKind, name: &str, values: &ExtractedValues) -> Option<Value> {
    match source {
        SourceKind::Path => values.path.get(name).cloned(),
        SourceKind::Query => values.query.get(name).cloned(),
        SourceKind::QueryList => values.query.get(name).map(|value| match value {
            Value::Array(_) => value.clone(),
            single => Value::Array(vec![single.clone()]),
        }),
        SourceKind::Body => values.body.get(name).cloned(),
        SourceKind::BodyDirect => Some(Value::Object(values.body.clone())),
        SourceKind::QueryAndBodyDirect => {
            let mut merged = values.query.clone();
            merged.extend(values.body.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(Value::Object(merged))
        }
        // files bind through their own bucket
        SourceKind::File => None,
    }
}

fn resolve_param(param: &CompiledParam, values: &ExtractedValues) -> Value {
    param
        .sources
        .iter()
        .find_map(|source| lookup(*source, &param.name, values))
        .unwrap_or(Value::Null)
}

/// Raw value of every non-file parameter: the first source holding its name
/// wins, otherwise null.
#[must_use]
pub fn resolve_values(schema: &CompiledHandlerSchema, values: &ExtractedValues) -> Map<String, Value> {
    schema
        .params()
        .iter()
        .filter(|p| !p.is_file())
        .map(|p| (p.name.clone(), resolve_param(p, values)))
        .collect()
}

/// Resolve, validate and coerce everything the handler declared.
///
/// Validation runs once over the whole input record, so every failing
/// parameter is reported together. Only parameters that resolved to a
/// non-null value are handed on; the rest fall back to their declared
/// defaults inside [`Arguments`]. Every file parameter is handed on, present
/// or not.
pub fn bind(schema: &CompiledHandlerSchema, values: &ExtractedValues) -> Result<Arguments, BindFailure> {
    let raw = resolve_values(schema, values);
    let converted = convert_record(&raw, schema.input_schema(), false).map_err(BindFailure::Invalid)?;

    let mut bound = Map::new();
    for (name, value) in &raw {
        if value.is_null() {
            if !schema.defaults().contains_key(name) {
                return Err(BindFailure::Missing(name.clone()));
            }
            continue;
        }
        if let Some(coerced) = converted.get(name) {
            bound.insert(name.clone(), coerced.clone());
        }
    }

    let files: IndexMap<_, _> = schema
        .file_parameters()
        .iter()
        .map(|name| (name.clone(), values.files.get(name).cloned()))
        .collect();

    Ok(Arguments::new(bound, files, Arc::clone(schema.defaults())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Constraints, Field, LocSegment, RecordSchema, TypeDesc};
    use crate::signature::{
        compile, Annotation, Body, File, HandlerSignature, ParamDecl, Path, Query, Signifier,
    };
    use crate::server::{Extracted, UploadedFile};
    use serde_json::json;

    fn values(path: Value, query: Value, body: Value) -> ExtractedValues {
        let obj = |v: Value| match v {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ExtractedValues {
            path: obj(path),
            query: obj(query),
            body: obj(body),
            files: IndexMap::new(),
        }
    }

    #[test]
    fn test_path_wins_over_query() {
        let sig = HandlerSignature::new("show").param(ParamDecl::of::<i64>("id"));
        let schema = compile(&sig, None).unwrap();
        let raw = resolve_values(&schema, &values(json!({"id": "1"}), json!({"id": "2"}), json!({})));
        assert_eq!(raw.get("id"), Some(&json!("1")));
    }

    #[test]
    fn test_query_list_wraps_single_value() {
        let sig = HandlerSignature::new("list").param(ParamDecl::of::<Vec<i64>>("ids"));
        let schema = compile(&sig, None).unwrap();
        let args = bind(&schema, &values(json!({}), json!({"ids": "3"}), json!({}))).unwrap();
        assert_eq!(args.get::<Vec<i64>>("ids").unwrap(), vec![3]);
    }

    #[test]
    fn test_query_and_body_direct_prefers_body() {
        let item = Arc::new(
            RecordSchema::builder("Item")
                .field(Field::of::<i64>("a"))
                .field(Field::of::<i64>("b"))
                .build(),
        );
        let sig = HandlerSignature::new("make").param(ParamDecl::new(
            "data",
            Annotation::with(
                Signifier::QueryOrBody,
                TypeDesc::Record(Arc::clone(&item)),
            ),
        ));
        let schema = compile(&sig, None).unwrap();
        let raw = resolve_values(
            &schema,
            &values(json!({}), json!({"a": "1", "b": "1"}), json!({"b": 2})),
        );
        assert_eq!(raw.get("data"), Some(&json!({"a": "1", "b": 2})));
    }

    #[test]
    fn test_all_errors_reported_together() {
        let sig = HandlerSignature::new("list")
            .param(ParamDecl::of::<Query<i64>>("limit"))
            .param(ParamDecl::of::<Query<i64>>("offset").constraints(Constraints::new().ge(0.0)));
        let schema = compile(&sig, None).unwrap();
        let failure = bind(
            &schema,
            &values(json!({}), json!({"limit": "ten", "offset": "-1"}), json!({})),
        )
        .unwrap_err();
        let BindFailure::Invalid(details) = failure else {
            panic!("expected validation errors");
        };
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].loc, vec![LocSegment::from("limit")]);
    }

    #[test]
    fn test_missing_required_and_defaults() {
        let sig = HandlerSignature::new("list")
            .param(ParamDecl::of::<Path<i64>>("id"))
            .param(ParamDecl::of::<Query<i64>>("limit").default(10));
        let schema = compile(&sig, None).unwrap();

        let failure = bind(&schema, &values(json!({}), json!({}), json!({}))).unwrap_err();
        assert_eq!(failure, BindFailure::Missing("id".into()));
        assert_eq!(
            failure.into_response().body,
            Some(json!({"error": "invalid_input"}))
        );

        let args = bind(&schema, &values(json!({"id": "4"}), json!({}), json!({}))).unwrap();
        assert_eq!(args.get::<i64>("id").unwrap(), 4);
        assert_eq!(args.get::<i64>("limit").unwrap(), 10);
        assert!(!args.is_present("limit"));
    }

    #[test]
    fn test_explicit_null_counts_as_absent() {
        let sig = HandlerSignature::new("edit").param(ParamDecl::of::<Body<Option<String>>>("title"));
        let schema = compile(&sig, None).unwrap();
        let args = bind(&schema, &values(json!({}), json!({}), json!({"title": null}))).unwrap();
        assert!(!args.is_present("title"));
        assert_eq!(args.optional::<String>("title").unwrap(), None);
    }

    #[test]
    fn test_body_direct_binds_whole_body() {
        let item = RecordSchema::builder("Item")
            .field(Field::of::<String>("name"))
            .build();
        let sig = HandlerSignature::new("make").param(ParamDecl::new(
            "item",
            Annotation::with(
                Signifier::BodyDirect,
                TypeDesc::record(item),
            ),
        ));
        let schema = compile(&sig, None).unwrap();
        let args = bind(&schema, &values(json!({}), json!({}), json!({"name": "n", "extra": 1}))).unwrap();
        assert_eq!(args.raw("item"), Some(&json!({"name": "n"})));
    }

    #[test]
    fn test_file_parameters_always_passed() {
        let sig = HandlerSignature::new("upload")
            .param(ParamDecl::of::<File<UploadedFile>>("avatar"))
            .param(ParamDecl::of::<Option<UploadedFile>>("banner"));
        let schema = compile(&sig, None).unwrap();
        let mut extracted = values(json!({}), json!({}), json!({}));
        extracted.files.insert(
            "avatar".into(),
            Extracted::One(UploadedFile {
                field_name: "avatar".into(),
                filename: "a.png".into(),
                content_type: None,
                content: bytes::Bytes::from_static(b"png"),
            }),
        );
        let args = bind(&schema, &extracted).unwrap();
        assert_eq!(args.file("avatar").unwrap().filename, "a.png");
        assert!(args.file("banner").is_none());
    }
}
