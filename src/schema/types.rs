use super::record::RecordSchema;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Shape of a collection-typed value. All four travel as JSON arrays; sets
/// de-duplicate on conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    List,
    Set,
    Tuple,
    FrozenSet,
}

impl CollectionKind {
    #[must_use]
    pub fn is_set(self) -> bool {
        matches!(self, CollectionKind::Set | CollectionKind::FrozenSet)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::List => "list",
            CollectionKind::Set => "set",
            CollectionKind::Tuple => "tuple",
            CollectionKind::FrozenSet => "frozenset",
        }
    }
}

/// Storage width of a declared integer. Values outside the width's range
/// fail validation instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    /// Inclusive `(min, max)` range.
    #[must_use]
    pub fn bounds(self) -> (i128, i128) {
        match self {
            IntWidth::I8 => (i8::MIN.into(), i8::MAX.into()),
            IntWidth::I16 => (i16::MIN.into(), i16::MAX.into()),
            IntWidth::I32 => (i32::MIN.into(), i32::MAX.into()),
            IntWidth::I64 => (i64::MIN.into(), i64::MAX.into()),
            IntWidth::U8 => (0, u8::MAX.into()),
            IntWidth::U16 => (0, u16::MAX.into()),
            IntWidth::U32 => (0, u32::MAX.into()),
            IntWidth::U64 => (0, u64::MAX.into()),
        }
    }
}

/// Type descriptor: the plain-data form of a declared parameter or field type.
///
/// Descriptors are produced once at registration (see
/// [`Describe`](crate::signature::Describe)) and never re-derived per request.
#[derive(Debug, Clone)]
pub enum TypeDesc {
    /// Free-form JSON, accepted as-is
    Any,
    Bool,
    Int(IntWidth),
    Float,
    Str,
    /// RFC 3339 timestamp carried as a string
    DateTime,
    /// Two-armed union with the absence type
    Optional(Box<TypeDesc>),
    Collection(CollectionKind, Box<TypeDesc>),
    /// String-keyed dictionary
    Map(Box<TypeDesc>),
    Record(Arc<RecordSchema>),
    /// Uploaded file; only ever sourced from the file bucket
    File,
    /// The request object itself; never bound from request data
    Request,
}

impl TypeDesc {
    /// 64-bit signed integer.
    #[must_use]
    pub fn int() -> Self {
        TypeDesc::Int(IntWidth::I64)
    }

    #[must_use]
    pub fn optional(inner: TypeDesc) -> Self {
        match inner {
            already @ TypeDesc::Optional(_) => already,
            other => TypeDesc::Optional(Box::new(other)),
        }
    }

    #[must_use]
    pub fn list(item: TypeDesc) -> Self {
        TypeDesc::Collection(CollectionKind::List, Box::new(item))
    }

    #[must_use]
    pub fn set(item: TypeDesc) -> Self {
        TypeDesc::Collection(CollectionKind::Set, Box::new(item))
    }

    #[must_use]
    pub fn map(value: TypeDesc) -> Self {
        TypeDesc::Map(Box::new(value))
    }

    #[must_use]
    pub fn record(schema: RecordSchema) -> Self {
        TypeDesc::Record(Arc::new(schema))
    }

    /// `(true, inner)` for `Optional(inner)`, `(false, self)` otherwise.
    #[must_use]
    pub fn is_optional(&self) -> (bool, &TypeDesc) {
        match self {
            TypeDesc::Optional(inner) => (true, inner),
            other => (false, other),
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&Arc<RecordSchema>> {
        match self {
            TypeDesc::Record(schema) => Some(schema),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_record(&self) -> bool {
        matches!(self, TypeDesc::Record(_))
    }

    /// Bare (non-optional) collection type.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, TypeDesc::Collection(..))
    }

    /// The file type, or optional-of-file.
    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self.is_optional().1, TypeDesc::File)
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeDesc::Int(_) | TypeDesc::Float)
    }

    /// Types a length bound applies to.
    #[must_use]
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            TypeDesc::Str | TypeDesc::Collection(..) | TypeDesc::Map(_)
        )
    }

    /// True if a file or request descriptor appears anywhere below this one.
    pub(crate) fn contains_unbindable(&self) -> bool {
        match self {
            TypeDesc::File | TypeDesc::Request => true,
            TypeDesc::Optional(inner) | TypeDesc::Collection(_, inner) | TypeDesc::Map(inner) => {
                inner.contains_unbindable()
            }
            TypeDesc::Record(schema) => schema
                .fields()
                .iter()
                .any(|f| f.ty.contains_unbindable()),
            _ => false,
        }
    }

    /// Configuration problems of every record reachable from this descriptor.
    pub(crate) fn collect_problems(&self, out: &mut Vec<String>) {
        match self {
            TypeDesc::Optional(inner) | TypeDesc::Collection(_, inner) | TypeDesc::Map(inner) => {
                inner.collect_problems(out)
            }
            TypeDesc::Record(schema) => schema.collect_problems(out),
            _ => {}
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Any => write!(f, "any"),
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Int(_) => write!(f, "int"),
            TypeDesc::Float => write!(f, "float"),
            TypeDesc::Str => write!(f, "str"),
            TypeDesc::DateTime => write!(f, "datetime"),
            TypeDesc::Optional(inner) => write!(f, "{inner} | None"),
            TypeDesc::Collection(kind, item) => write!(f, "{}[{item}]", kind.as_str()),
            TypeDesc::Map(value) => write!(f, "dict[str, {value}]"),
            TypeDesc::Record(schema) => write!(f, "{}", schema.name()),
            TypeDesc::File => write!(f, "file"),
            TypeDesc::Request => write!(f, "request"),
        }
    }
}

/// Compiled regular expression constraint. Keeps its source for messages and docs.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Validation constraints attached to a field or parameter.
///
/// Construction never fails; invalid combinations are reported by
/// [`Constraints::problems`] and surface as a configuration error when the
/// handler is compiled.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub gt: Option<f64>,
    pub ge: Option<f64>,
    pub lt: Option<f64>,
    pub le: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Pattern>,
    invalid_pattern: Option<String>,
}

impl Constraints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn gt(mut self, bound: f64) -> Self {
        self.gt = Some(bound);
        self
    }

    #[must_use]
    pub fn ge(mut self, bound: f64) -> Self {
        self.ge = Some(bound);
        self
    }

    #[must_use]
    pub fn lt(mut self, bound: f64) -> Self {
        self.lt = Some(bound);
        self
    }

    #[must_use]
    pub fn le(mut self, bound: f64) -> Self {
        self.le = Some(bound);
        self
    }

    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    #[must_use]
    pub fn pattern(mut self, source: &str) -> Self {
        match Regex::new(source) {
            Ok(regex) => {
                self.pattern = Some(Pattern {
                    source: source.to_string(),
                    regex,
                });
                self.invalid_pattern = None;
            }
            Err(e) => {
                self.pattern = None;
                self.invalid_pattern = Some(format!("invalid pattern '{source}': {e}"));
            }
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gt.is_none()
            && self.ge.is_none()
            && self.lt.is_none()
            && self.le.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
            && self.invalid_pattern.is_none()
    }

    fn has_numeric(&self) -> bool {
        self.gt.is_some() || self.ge.is_some() || self.lt.is_some() || self.le.is_some()
    }

    fn has_length(&self) -> bool {
        self.min_length.is_some() || self.max_length.is_some()
    }

    /// Contradictions between the bounds, or bounds that make no sense for `ty`.
    #[must_use]
    pub fn problems(&self, label: &str, ty: &TypeDesc) -> Vec<String> {
        let mut out = Vec::new();
        let base = ty.is_optional().1;

        if let Some(msg) = &self.invalid_pattern {
            out.push(format!("{label}: {msg}"));
        }
        if self.has_numeric() && !base.is_numeric() {
            out.push(format!("{label}: numeric bounds on non-numeric type {base}"));
        }
        if self.has_length() && !base.is_sized() {
            out.push(format!("{label}: length bounds on unsized type {base}"));
        }
        if self.pattern.is_some() && !matches!(base, TypeDesc::Str) {
            out.push(format!("{label}: pattern on non-string type {base}"));
        }

        let lower = match (self.gt, self.ge) {
            (Some(gt), Some(ge)) => Some((gt.max(ge), gt >= ge)),
            (Some(gt), None) => Some((gt, true)),
            (None, Some(ge)) => Some((ge, false)),
            (None, None) => None,
        };
        let upper = match (self.lt, self.le) {
            (Some(lt), Some(le)) => Some((lt.min(le), lt <= le)),
            (Some(lt), None) => Some((lt, true)),
            (None, Some(le)) => Some((le, false)),
            (None, None) => None,
        };
        if let (Some((lo, lo_excl)), Some((hi, hi_excl))) = (lower, upper) {
            let empty = if lo_excl || hi_excl { lo >= hi } else { lo > hi };
            if empty {
                out.push(format!("{label}: lower bound {lo} exceeds upper bound {hi}"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                out.push(format!("{label}: min_length {min} exceeds max_length {max}"));
            }
        }
        out
    }
}
