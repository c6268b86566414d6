use super::signifier::Signifier;
use crate::error::ConfigError;
use crate::schema::TypeDesc;
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// Where a parameter value may be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Path,
    Query,
    /// Query key read as a list; a single value is wrapped.
    QueryList,
    Body,
    /// The entire body map.
    BodyDirect,
    File,
    /// Query and body maps merged, body keys winning.
    QueryAndBodyDirect,
}

impl SourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Path => "path",
            SourceKind::Query => "query",
            SourceKind::QueryList => "query_list",
            SourceKind::Body => "body",
            SourceKind::BodyDirect => "body_direct",
            SourceKind::File => "file",
            SourceKind::QueryAndBodyDirect => "query_and_body_direct",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered candidate sources of one parameter; the first that yields a value wins.
pub type SourceList = SmallVec<[SourceKind; 2]>;

/// Decide the ordered sources of a parameter from its signifier and type.
///
/// Explicit signifiers win. Without one, a record comes from the body, a
/// bare collection from a query list, and anything else from the path and
/// then the query string.
pub fn sources_for_input(
    param: &str,
    signifier: Option<Signifier>,
    ty: &TypeDesc,
) -> Result<(SourceList, TypeDesc), ConfigError> {
    let sources: SourceList = match signifier {
        Some(Signifier::Query) => smallvec![SourceKind::Query],
        Some(Signifier::Body) => smallvec![SourceKind::Body],
        Some(Signifier::BodyDirect) => {
            if !ty.is_record() {
                return Err(ConfigError::BodyDirectOnNonRecord {
                    param: param.to_string(),
                    ty: ty.to_string(),
                });
            }
            smallvec![SourceKind::BodyDirect]
        }
        Some(Signifier::Path) => smallvec![SourceKind::Path],
        Some(Signifier::File) => smallvec![SourceKind::File],
        _ if ty.is_file() => smallvec![SourceKind::File],
        Some(Signifier::QueryOrBody) => smallvec![SourceKind::Query, SourceKind::Body],
        Some(Signifier::PathOrQuery) => smallvec![SourceKind::Path, SourceKind::Query],
        None if ty.is_record() => smallvec![SourceKind::Body],
        None if ty.is_collection() => smallvec![SourceKind::QueryList],
        None => smallvec![SourceKind::Path, SourceKind::Query],
    };
    Ok((sources, ty.clone()))
}
