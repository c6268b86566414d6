use crate::error::{HandlerError, HandlerResult};
use crate::server::{Extracted, HandlerRequest, Reply, UploadedFile};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A request handler.
///
/// Receives the request positionally and its bound arguments; returns a
/// [`Reply`] or a [`HandlerError`]. Implemented for every matching closure.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &HandlerRequest, args: Arguments) -> HandlerResult<Reply>;
}

impl<F> Handler for F
where
    F: Fn(&HandlerRequest, Arguments) -> HandlerResult<Reply> + Send + Sync + 'static,
{
    fn handle(&self, request: &HandlerRequest, args: Arguments) -> HandlerResult<Reply> {
        self(request, args)
    }
}

/// Validated arguments of one call.
///
/// Holds only parameters that resolved to a present value, plus every file
/// parameter. Declared defaults fill in on read.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Map<String, Value>,
    files: IndexMap<String, Option<Extracted<UploadedFile>>>,
    defaults: Arc<HashMap<String, Value>>,
}

impl Arguments {
    #[must_use]
    pub fn new(
        values: Map<String, Value>,
        files: IndexMap<String, Option<Extracted<UploadedFile>>>,
        defaults: Arc<HashMap<String, Value>>,
    ) -> Self {
        Self {
            values,
            files,
            defaults,
        }
    }

    /// Bound value, else declared default.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name).or_else(|| self.defaults.get(name))
    }

    /// True if the request supplied a value (defaults do not count).
    #[must_use]
    pub fn is_present(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Names of the parameters the request supplied.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn decode<T: DeserializeOwned>(name: &str, value: &Value) -> HandlerResult<T> {
        serde_json::from_value(value.clone()).map_err(|e| HandlerError::InvalidArgument {
            name: name.to_string(),
            detail: e.to_string(),
        })
    }

    /// Required argument: bound value or default, else `MissingArgument`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> HandlerResult<T> {
        match self.raw(name) {
            Some(value) => Self::decode(name, value),
            None => Err(HandlerError::MissingArgument(name.to_string())),
        }
    }

    /// Optional argument: `None` when absent with no default, or a null default.
    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> HandlerResult<Option<T>> {
        match self.raw(name) {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Self::decode(name, value).map(Some),
        }
    }

    /// Every argument (bound or defaulted) deserialized into one struct.
    pub fn parse<T: DeserializeOwned>(&self) -> HandlerResult<T> {
        let mut merged: Map<String, Value> = self
            .defaults
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        merged.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::decode("arguments", &Value::Object(merged))
    }

    /// First file uploaded for a file parameter.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)?.as_ref()?.first()
    }

    /// Every file uploaded for a file parameter.
    #[must_use]
    pub fn files(&self, name: &str) -> Vec<&UploadedFile> {
        match self.files.get(name) {
            Some(Some(extracted)) => extracted.all(),
            _ => Vec::new(),
        }
    }
}
