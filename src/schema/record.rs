use super::convert::{convert, ErrorDetail};
use super::native::{native_to_value, NativeObject};
use super::types::{Constraints, TypeDesc};
use crate::signature::Describe;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// One named field of a record schema.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: TypeDesc,
    /// `None` means required.
    pub default: Option<Value>,
    pub constraints: Constraints,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            constraints: Constraints::default(),
        }
    }

    /// Field typed from a Rust type's descriptor.
    #[must_use]
    pub fn of<T: Describe>(name: impl Into<String>) -> Self {
        Self::new(name, T::type_desc())
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Default given as a serializable Rust value. A value that does not
    /// serialize leaves the field required.
    #[must_use]
    pub fn default_value<T: Serialize>(self, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => self.default(value),
            Err(_) => self,
        }
    }

    /// Default taken from `T::default()`.
    #[must_use]
    pub fn default_of<T: Serialize + Default>(self) -> Self {
        self.default_value(T::default())
    }

    #[must_use]
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn ge(mut self, bound: f64) -> Self {
        self.constraints = self.constraints.ge(bound);
        self
    }

    #[must_use]
    pub fn gt(mut self, bound: f64) -> Self {
        self.constraints = self.constraints.gt(bound);
        self
    }

    #[must_use]
    pub fn le(mut self, bound: f64) -> Self {
        self.constraints = self.constraints.le(bound);
        self
    }

    #[must_use]
    pub fn lt(mut self, bound: f64) -> Self {
        self.constraints = self.constraints.lt(bound);
        self
    }

    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.constraints = self.constraints.min_length(len);
        self
    }

    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.constraints = self.constraints.max_length(len);
        self
    }

    #[must_use]
    pub fn pattern(mut self, source: &str) -> Self {
        self.constraints = self.constraints.pattern(source);
        self
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Named record type: an ordered set of fields.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    name: String,
    fields: Vec<Field>,
}

impl RecordSchema {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Configuration problems of this record and every record nested in it.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_problems(&mut out);
        out
    }

    pub(crate) fn collect_problems(&self, out: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for field in &self.fields {
            let label = format!("{}.{}", self.name, field.name);
            if !seen.insert(field.name.as_str()) {
                out.push(format!("{label}: duplicate field"));
            }
            if matches!(field.ty.is_optional().1, TypeDesc::Request) {
                out.push(format!("{label}: request type cannot be a field"));
            }
            out.extend(field.constraints.problems(&label, &field.ty));
            field.ty.collect_problems(out);
        }
    }
}

pub struct RecordBuilder {
    name: String,
    fields: Vec<Field>,
}

impl RecordBuilder {
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn build(self) -> RecordSchema {
        RecordSchema {
            name: self.name,
            fields: self.fields,
        }
    }
}

/// A Rust type that is a record: it has a schema and round-trips through serde.
///
/// ```rust
/// use brrtbind::schema::{Field, Record, RecordSchema};
/// use brrtbind::signature::Describe;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Tag {
///     name: String,
/// }
///
/// impl Record for Tag {
///     fn record_schema() -> RecordSchema {
///         RecordSchema::builder("Tag")
///             .field(Field::of::<String>("name").min_length(1))
///             .build()
///     }
/// }
///
/// let tag = Tag::from_data(&serde_json::json!({"name": "rust"})).unwrap();
/// assert_eq!(tag.name, "rust");
/// assert!(Tag::from_data(&serde_json::json!({"name": ""})).is_err());
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn record_schema() -> RecordSchema;

    /// Validate loosely-typed data against the schema, then build the value.
    fn from_data(data: &Value) -> Result<Self, Vec<ErrorDetail>> {
        let ty = TypeDesc::record(Self::record_schema());
        let converted = convert(data, &ty, None, false)?;
        serde_json::from_value(converted).map_err(|e| vec![ErrorDetail::new(Vec::new(), e.to_string())])
    }

    /// Read each schema field off a native object, then validate strictly.
    fn from_native(obj: &dyn NativeObject) -> Result<Self, Vec<ErrorDetail>> {
        let schema = Self::record_schema();
        let data = native_to_value(obj, &schema);
        let converted = convert(&data, &TypeDesc::record(schema), None, true)?;
        serde_json::from_value(converted).map_err(|e| vec![ErrorDetail::new(Vec::new(), e.to_string())])
    }

    /// Flatten into plain JSON data.
    fn to_data(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
