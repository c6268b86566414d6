//! Error types shared across the binding pipeline.
//!
//! Three families exist and they never mix:
//!
//! - [`ConfigError`] - raised while an endpoint is being registered. A handler
//!   whose signature fails to compile never serves traffic.
//! - [`ApiError`] - the declared, user-facing error signal a handler returns to
//!   short-circuit into `{"error": message}` with its own status code.
//! - [`HandlerError`] - everything a handler can return: the declared signal,
//!   argument access failures, or an undeclared failure that propagates to the
//!   surrounding framework untouched.

use std::path::PathBuf;

/// Registration-time failure. Fatal for the endpoint being registered.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A parameter type the binder cannot source or validate.
    #[error("Input argument {param} has an unsupported type {ty}")]
    UnsupportedType { param: String, ty: String },

    /// `BodyDirect<T>` wrapping something that is not a record type.
    #[error("You cannot use BodyDirect on something that is not a record type (argument {param}: {ty})")]
    BodyDirectOnNonRecord { param: String, ty: String },

    /// Schema construction failed (contradictory constraints, bad patterns, ...).
    #[error("One or more inputs on view {handler} have a bad configuration: {detail}")]
    BadConfiguration { handler: String, detail: String },

    /// Two parameters share a name.
    #[error("Handler {handler} declares argument {param} more than once")]
    DuplicateParameter { handler: String, param: String },

    /// An endpoint names an authentication backend nobody registered.
    #[error("Unknown authentication backend {0}")]
    UnknownAuthBackend(String),

    /// A handler name registered twice in the same dispatcher.
    #[error("Handler {0} is already registered")]
    DuplicateHandler(String),

    /// An endpoint pinned to one method registered under another in a method router.
    #[error("Handler {handler} declares method {declared} but is registered for {registered}")]
    MethodMismatch {
        handler: String,
        declared: String,
        registered: String,
    },

    /// Configuration file could not be read.
    #[error("Cannot read configuration file {}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration YAML did not parse.
    #[error("Invalid configuration: {0}")]
    ConfigYaml(#[from] serde_yaml::Error),
}

/// Declared user-facing error: short-circuits to `{"error": error}` with `status`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status} {error}")]
pub struct ApiError {
    pub status: u16,
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(404, "not_found")
    }

    #[must_use]
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(400, error)
    }
}

/// Everything a handler body can fail with.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Declared error signal, converted into a JSON error response.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The handler asked for an argument that resolved absent and has no default.
    #[error("missing required argument {0}")]
    MissingArgument(String),

    /// A bound value could not be deserialized into the type the handler asked for.
    #[error("argument {name} could not be read: {detail}")]
    InvalidArgument { name: String, detail: String },

    /// Undeclared failure. Propagates to the surrounding framework.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type handlers return.
pub type HandlerResult<T> = Result<T, HandlerError>;
