use crate::security::User;
use bytes::Bytes;
use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Header a caller can set to pin the request id for log correlation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ULID identifying one request in the logs.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// The id carried by a header value, if it is a ULID.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        ulid::Ulid::from_string(raw.trim()).ok().map(Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Path captures handed over by the routing layer.
///
/// Names use `Arc<str>` since they come from the static route table.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Request or response headers, names shared as `Arc<str>`.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// The raw request as the binding layer sees it.
///
/// The routing layer builds one per incoming request; the binder reads the
/// query string, headers and body from it and hands it to the handler by
/// reference.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    /// Raw query string, without the leading `?`
    pub query_string: String,
    pub headers: HeaderVec,
    pub body: Bytes,
    /// User resolved by the surrounding framework's session layer, if any
    pub session_user: Option<Arc<dyn User>>,
    /// User resolved by authentication for this endpoint
    pub user: Option<Arc<dyn User>>,
}

impl HandlerRequest {
    /// New request for `uri` (path plus optional `?query`).
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        Self {
            request_id: RequestId::new(),
            method,
            path: path.to_string(),
            query_string: query.to_string(),
            headers: HeaderVec::new(),
            body: Bytes::new(),
            session_user: None,
            user: None,
        }
    }

    #[must_use]
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    #[must_use]
    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Append a header. `x-request-id` also pins the request id when it parses.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if name.eq_ignore_ascii_case(REQUEST_ID_HEADER) {
            if let Some(id) = RequestId::parse(&value) {
                self.request_id = id;
            }
        }
        self.headers.push((Arc::from(name.to_ascii_lowercase()), value));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body with a matching content type.
    #[must_use]
    pub fn json(self, body: &Value) -> Self {
        self.header("content-type", "application/json")
            .body(body.to_string())
    }

    /// URL-encoded form body with a matching content type.
    #[must_use]
    pub fn form(self, pairs: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.header("content-type", "application/x-www-form-urlencoded")
            .body(encoded)
    }

    #[must_use]
    pub fn with_session_user(mut self, user: Arc<dyn User>) -> Self {
        self.session_user = Some(user);
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Media type of the body, lowercased, without parameters.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.get_header("content-type").map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}
