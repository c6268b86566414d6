use super::request::HeaderVec;
use crate::schema::{CollectionKind, ErrorDetail, NativeObject};
use crate::error::HandlerError;
use http::Method;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Finalized response produced by the binding layer.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// JSON body; `None` means an empty body
    pub body: Option<Value>,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Option<Value>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with a content-type header
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body: Some(body),
        }
    }

    /// `{"error": message}` with `status`
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    /// 400 with the validation errors that caused it
    #[must_use]
    pub fn invalid_input(details: &[ErrorDetail]) -> Self {
        Self::json(
            400,
            json!({ "error": "invalid_input", "error_details": details }),
        )
    }

    /// Empty-bodied 405 naming the permitted methods
    #[must_use]
    pub fn method_not_allowed<'a, I>(allowed: I) -> Self
    where
        I: IntoIterator<Item = &'a Method>,
    {
        let allow = allowed
            .into_iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("allow"), allow));
        Self {
            status: 405,
            headers,
            body: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Serialized body bytes.
    #[must_use]
    pub fn content(&self) -> Vec<u8> {
        match &self.body {
            Some(body) => body.to_string().into_bytes(),
            None => Vec::new(),
        }
    }
}

/// What a handler returned, before output conversion.
pub enum Payload {
    Json(Value),
    Native(Arc<dyn NativeObject>),
    NativeCollection(CollectionKind, Vec<Arc<dyn NativeObject>>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Payload::Native(o) => f.debug_tuple("Native").field(&o.type_name()).finish(),
            Payload::NativeCollection(kind, items) => f
                .debug_tuple("NativeCollection")
                .field(kind)
                .field(&items.len())
                .finish(),
        }
    }
}

/// Response envelope: a payload plus the status and headers to send it with.
#[derive(Debug)]
pub struct Reply {
    pub payload: Payload,
    pub status: u16,
    pub headers: HeaderVec,
}

impl Reply {
    fn with_payload(payload: Payload) -> Self {
        Self {
            payload,
            status: 200,
            headers: HeaderVec::new(),
        }
    }

    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::with_payload(Payload::Json(value))
    }

    /// Serialize any value (typically a record instance) into the payload.
    pub fn data<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        let value = serde_json::to_value(value).map_err(anyhow::Error::from)?;
        Ok(Self::json(value))
    }

    #[must_use]
    pub fn native(object: Arc<dyn NativeObject>) -> Self {
        Self::with_payload(Payload::Native(object))
    }

    #[must_use]
    pub fn native_list<I>(objects: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn NativeObject>>,
    {
        Self::native_collection(CollectionKind::List, objects)
    }

    #[must_use]
    pub fn native_collection<I>(kind: CollectionKind, objects: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn NativeObject>>,
    {
        Self::with_payload(Payload::NativeCollection(kind, objects.into_iter().collect()))
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name.to_ascii_lowercase()), value.into()));
        self
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_shape() {
        let resp = HandlerResponse::error(404, "not_found");
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, Some(json!({"error": "not_found"})));
        assert_eq!(resp.get_header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_method_not_allowed_is_empty_with_allow() {
        let resp = HandlerResponse::method_not_allowed([&Method::GET, &Method::POST]);
        assert_eq!(resp.status, 405);
        assert!(resp.content().is_empty());
        assert_eq!(resp.get_header("allow"), Some("GET, POST"));
    }

    #[test]
    fn test_reply_defaults_to_200() {
        let reply = Reply::json(json!({"ok": true})).with_header("X-Total", "3");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.headers[0].0.as_ref(), "x-total");
        assert_eq!(Reply::from(json!(1)).with_status(201).status, 201);
    }
}
