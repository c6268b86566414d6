use super::classify::{sources_for_input, SourceKind, SourceList};
use super::signifier::{extract_signifier, Annotation, Describe, Signifier};
use crate::error::ConfigError;
use crate::schema::{to_json_schema, Constraints, Field, RecordSchema, TypeDesc};
use http::Method;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// One declared handler parameter.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub annotation: Annotation,
    /// Value the handler sees when the parameter resolves absent.
    pub default: Option<Value>,
    pub constraints: Constraints,
}

impl ParamDecl {
    #[must_use]
    pub fn new(name: impl Into<String>, annotation: Annotation) -> Self {
        Self {
            name: name.into(),
            annotation,
            default: None,
            constraints: Constraints::default(),
        }
    }

    /// Parameter typed (and signified) by a Rust type.
    #[must_use]
    pub fn of<T: Describe>(name: impl Into<String>) -> Self {
        Self::new(name, Annotation::of::<T>())
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }
}

/// Everything the compiler needs to know about a handler.
#[derive(Debug, Clone, Default)]
pub struct HandlerSignature {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub returns: Option<TypeDesc>,
}

impl HandlerSignature {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn returns(mut self, ty: TypeDesc) -> Self {
        self.returns = Some(ty);
        self
    }
}

/// A parameter after classification.
#[derive(Debug, Clone)]
pub struct CompiledParam {
    pub name: String,
    pub sources: SourceList,
    pub ty: TypeDesc,
    pub default: Option<Value>,
}

impl CompiledParam {
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.sources.contains(&SourceKind::File)
    }
}

/// Registration-time product of a handler signature; read-only afterwards.
#[derive(Debug, Clone)]
pub struct CompiledHandlerSchema {
    handler_name: String,
    http_method: Option<Method>,
    params: Vec<CompiledParam>,
    file_parameters: BTreeSet<String>,
    defaults: Arc<HashMap<String, Value>>,
    input_schema: Arc<RecordSchema>,
    output_type: Option<TypeDesc>,
    output_schema: Option<Arc<RecordSchema>>,
}

impl CompiledHandlerSchema {
    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    #[must_use]
    pub fn http_method(&self) -> Option<&Method> {
        self.http_method.as_ref()
    }

    /// Non-request parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[CompiledParam] {
        &self.params
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&CompiledParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Ordered sources per parameter name, in declaration order.
    #[must_use]
    pub fn parameter_sources(&self) -> IndexMap<&str, &SourceList> {
        self.params
            .iter()
            .map(|p| (p.name.as_str(), &p.sources))
            .collect()
    }

    #[must_use]
    pub fn file_parameters(&self) -> &BTreeSet<String> {
        &self.file_parameters
    }

    #[must_use]
    pub fn defaults(&self) -> &Arc<HashMap<String, Value>> {
        &self.defaults
    }

    /// Record with one optional field per non-file parameter.
    #[must_use]
    pub fn input_schema(&self) -> &Arc<RecordSchema> {
        &self.input_schema
    }

    #[must_use]
    pub fn output_type(&self) -> Option<&TypeDesc> {
        self.output_type.as_ref()
    }

    /// Record with the single field `value` of the declared return type.
    #[must_use]
    pub fn output_schema(&self) -> Option<&Arc<RecordSchema>> {
        self.output_schema.as_ref()
    }

    /// True when the handler takes anything the extractor has to produce.
    #[must_use]
    pub fn needs_extraction(&self) -> bool {
        !self.params.is_empty()
    }

    /// JSON Schema of the accepted input, keyed by parameter name.
    #[must_use]
    pub fn input_json_schema(&self) -> Value {
        to_json_schema(&TypeDesc::Record(Arc::clone(&self.input_schema)), None)
    }

    /// JSON Schema of the response body, when a return type is declared.
    #[must_use]
    pub fn output_json_schema(&self) -> Option<Value> {
        self.output_type.as_ref().map(|ty| to_json_schema(ty, None))
    }
}

/// Types an input parameter may not have: files nested in containers, the
/// request type anywhere but top level, and path-bound containers.
fn acceptable_input(signifier: Option<Signifier>, ty: &TypeDesc) -> bool {
    let base = ty.is_optional().1;
    match base {
        TypeDesc::File => true,
        TypeDesc::Request => false,
        other if other.contains_unbindable() => false,
        TypeDesc::Record(_) | TypeDesc::Collection(..) | TypeDesc::Map(_) => !matches!(
            signifier,
            Some(Signifier::Path) | Some(Signifier::PathOrQuery)
        ),
        _ => true,
    }
}

fn acceptable_output(ty: &TypeDesc) -> bool {
    !ty.contains_unbindable()
}

/// Compile a handler signature.
///
/// Steps, in order:
///
/// 1. Skip request-typed parameters; reject unsupported types.
/// 2. Classify every parameter into its ordered sources.
/// 3. If exactly one parameter reads from the body and its type is a record,
///    swap its `body` source for `body_direct`: the whole body is that record.
/// 4. Build the input record (every field optional) and, with a declared
///    return type, the output record `{value: T}`.
///
/// Compilation is a pure function of the signature.
pub fn compile(
    signature: &HandlerSignature,
    method: Option<Method>,
) -> Result<CompiledHandlerSchema, ConfigError> {
    let handler = signature.name.as_str();
    let mut params: Vec<CompiledParam> = Vec::with_capacity(signature.params.len());
    let mut seen = HashSet::new();
    let mut problems = Vec::new();
    let mut input = RecordSchema::builder(format!("{handler}_input"));

    for decl in &signature.params {
        if !seen.insert(decl.name.as_str()) {
            return Err(ConfigError::DuplicateParameter {
                handler: handler.to_string(),
                param: decl.name.clone(),
            });
        }
        let (signifier, ty) = extract_signifier(&decl.name, &decl.annotation)?;
        if matches!(ty, TypeDesc::Request) {
            continue;
        }
        if !acceptable_input(signifier, &ty) {
            return Err(ConfigError::UnsupportedType {
                param: decl.name.clone(),
                ty: ty.to_string(),
            });
        }
        let (sources, ty) = sources_for_input(&decl.name, signifier, &ty)?;

        let label = format!("{handler}.{}", decl.name);
        problems.extend(decl.constraints.problems(&label, &ty));
        ty.collect_problems(&mut problems);

        if !sources.contains(&SourceKind::File) {
            input = input.field(
                Field::new(decl.name.clone(), TypeDesc::optional(ty.clone()))
                    .default(decl.default.clone().unwrap_or(Value::Null))
                    .constraints(decl.constraints.clone()),
            );
        }
        // an optional type without a declared default defaults to null
        let default = decl
            .default
            .clone()
            .or_else(|| ty.is_optional().0.then_some(Value::Null));
        params.push(CompiledParam {
            name: decl.name.clone(),
            sources,
            ty,
            default,
        });
    }

    let from_body: Vec<usize> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.sources.contains(&SourceKind::Body))
        .map(|(i, _)| i)
        .collect();
    if let [only] = from_body.as_slice() {
        let param = &mut params[*only];
        if param.ty.is_record() {
            param.sources.retain(|s| *s != SourceKind::Body);
            param.sources.push(SourceKind::BodyDirect);
            debug!(handler, param = %param.name, "Promoted single body parameter to body_direct");
        }
    }

    let (output_type, output_schema) = match &signature.returns {
        Some(ty) => {
            if !acceptable_output(ty) {
                return Err(ConfigError::UnsupportedType {
                    param: "return".to_string(),
                    ty: ty.to_string(),
                });
            }
            ty.collect_problems(&mut problems);
            let schema = RecordSchema::builder(format!("{handler}_output"))
                .field(Field::new("value", ty.clone()))
                .build();
            (Some(ty.clone()), Some(Arc::new(schema)))
        }
        None => (None, None),
    };

    if !problems.is_empty() {
        return Err(ConfigError::BadConfiguration {
            handler: handler.to_string(),
            detail: problems.join("; "),
        });
    }

    let file_parameters = params
        .iter()
        .filter(|p| p.is_file())
        .map(|p| p.name.clone())
        .collect();
    let defaults = params
        .iter()
        .filter_map(|p| p.default.clone().map(|d| (p.name.clone(), d)))
        .collect();

    Ok(CompiledHandlerSchema {
        handler_name: handler.to_string(),
        http_method: method,
        params,
        file_parameters,
        defaults: Arc::new(defaults),
        input_schema: Arc::new(input.build()),
        output_type,
        output_schema,
    })
}
