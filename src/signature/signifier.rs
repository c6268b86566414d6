use crate::error::ConfigError;
use crate::schema::{CollectionKind, IntWidth, Record, TypeDesc};
use crate::server::{HandlerRequest, UploadedFile};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::marker::PhantomData;

/// Explicit source marker wrapped around a parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signifier {
    Path,
    Query,
    Body,
    BodyDirect,
    File,
    QueryOrBody,
    PathOrQuery,
}

/// A declared parameter type: the descriptor plus its signifier, if any.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub signifier: Option<Signifier>,
    pub ty: TypeDesc,
}

impl Annotation {
    #[must_use]
    pub fn of<T: Describe>() -> Self {
        Self {
            signifier: T::signifier(),
            ty: T::type_desc(),
        }
    }

    #[must_use]
    pub fn plain(ty: TypeDesc) -> Self {
        Self {
            signifier: None,
            ty,
        }
    }

    #[must_use]
    pub fn with(signifier: Signifier, ty: TypeDesc) -> Self {
        Self {
            signifier: Some(signifier),
            ty,
        }
    }
}

/// Split an annotation into its signifier and the type it wraps.
///
/// `BodyDirect` is only meaningful over a record type; anything else is a
/// configuration error.
pub fn extract_signifier(
    param: &str,
    annotation: &Annotation,
) -> Result<(Option<Signifier>, TypeDesc), ConfigError> {
    if annotation.signifier == Some(Signifier::BodyDirect) && !annotation.ty.is_record() {
        return Err(ConfigError::BodyDirectOnNonRecord {
            param: param.to_string(),
            ty: annotation.ty.to_string(),
        });
    }
    Ok((annotation.signifier, annotation.ty.clone()))
}

/// Rust types that can appear in a handler signature or record field.
pub trait Describe {
    fn type_desc() -> TypeDesc;

    fn signifier() -> Option<Signifier> {
        None
    }
}

impl<T: Record> Describe for T {
    fn type_desc() -> TypeDesc {
        TypeDesc::record(T::record_schema())
    }
}

macro_rules! describe_scalar {
    ($desc:expr => $($t:ty),*) => {
        $(
            impl Describe for $t {
                fn type_desc() -> TypeDesc {
                    $desc
                }
            }
        )*
    };
}

describe_scalar!(TypeDesc::Bool => bool);
describe_scalar!(TypeDesc::Int(IntWidth::I8) => i8);
describe_scalar!(TypeDesc::Int(IntWidth::I16) => i16);
describe_scalar!(TypeDesc::Int(IntWidth::I32) => i32);
describe_scalar!(TypeDesc::Int(IntWidth::I64) => i64, isize);
describe_scalar!(TypeDesc::Int(IntWidth::U8) => u8);
describe_scalar!(TypeDesc::Int(IntWidth::U16) => u16);
describe_scalar!(TypeDesc::Int(IntWidth::U32) => u32);
describe_scalar!(TypeDesc::Int(IntWidth::U64) => u64, usize);
describe_scalar!(TypeDesc::Float => f32, f64);
describe_scalar!(TypeDesc::Str => String);
describe_scalar!(TypeDesc::Any => Value);
describe_scalar!(TypeDesc::File => UploadedFile);
describe_scalar!(TypeDesc::Request => HandlerRequest);

/// UTC timestamp, the usual field type for datetime values.
pub type DateTime = chrono::DateTime<chrono::Utc>;

describe_scalar!(
    TypeDesc::DateTime =>
    chrono::DateTime<chrono::Utc>,
    chrono::DateTime<chrono::FixedOffset>,
    chrono::NaiveDateTime
);

impl<T: Describe> Describe for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::optional(T::type_desc())
    }

    fn signifier() -> Option<Signifier> {
        T::signifier()
    }
}

macro_rules! describe_collection {
    ($kind:expr => $($t:ident),*) => {
        $(
            impl<T: Describe> Describe for $t<T> {
                fn type_desc() -> TypeDesc {
                    TypeDesc::Collection($kind, Box::new(T::type_desc()))
                }
            }
        )*
    };
}

describe_collection!(CollectionKind::List => Vec, VecDeque);
describe_collection!(CollectionKind::Set => HashSet, BTreeSet);

impl<T: Describe> Describe for HashMap<String, T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(T::type_desc())
    }
}

impl<T: Describe> Describe for BTreeMap<String, T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(T::type_desc())
    }
}

macro_rules! marker {
    ($(#[$doc:meta])* $name:ident => $sig:expr) => {
        $(#[$doc])*
        pub struct $name<T>(PhantomData<T>);

        impl<T: Describe> Describe for $name<T> {
            fn type_desc() -> TypeDesc {
                T::type_desc()
            }

            fn signifier() -> Option<Signifier> {
                Some($sig)
            }
        }
    };
}

marker!(
    /// Bound from the URL path captures only.
    Path => Signifier::Path
);
marker!(
    /// Bound from the query string only.
    Query => Signifier::Query
);
marker!(
    /// Bound from one key of the body.
    Body => Signifier::Body
);
marker!(
    /// The entire body map becomes this record value.
    BodyDirect => Signifier::BodyDirect
);
marker!(
    /// Bound from the uploaded-file bucket.
    File => Signifier::File
);
marker!(
    /// Query string first, then the body.
    QueryOrBody => Signifier::QueryOrBody
);
marker!(
    /// Path captures first, then the query string.
    PathOrQuery => Signifier::PathOrQuery
);
