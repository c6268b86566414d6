//! # Security Module
//!
//! Authentication backends and permission checks for endpoints declared with
//! `auth` or `permissions`.
//!
//! ## Flow
//!
//! 1. The endpoint's backends are tried in order ([`authenticate_request`]);
//!    the first one returning a user wins.
//! 2. The user (if any) is attached to the request the handler sees.
//! 3. [`require_authentication`] rejects anonymous requests for `auth`
//!    endpoints with `401 {"error": "authentication_required"}`.
//! 4. [`check_permissions`] requires every listed permission:
//!    `401 authentication_required` without a user, `403 permission_denied`
//!    when one is missing.
//!
//! ## Backends
//!
//! - [`SessionAuthBackend`] (`"session"`) - the user the surrounding
//!   framework's session layer already attached to the request
//! - [`TokenAuthBackend`] (`"token"`) - `Authorization: Token <key>` looked up
//!   in a [`TokenStore`]
//!
//! Custom backends implement [`AuthBackend`] and are registered by name in a
//! [`BackendRegistry`]:
//!
//! ```rust
//! use brrtbind::security::{AuthBackend, BackendRegistry, SimpleUser, User};
//! use brrtbind::server::HandlerRequest;
//! use std::sync::Arc;
//!
//! struct ApiKeyBackend;
//!
//! impl AuthBackend for ApiKeyBackend {
//!     fn name(&self) -> &str {
//!         "api_key"
//!     }
//!
//!     fn authenticate(&self, req: &HandlerRequest) -> Option<Arc<dyn User>> {
//!         (req.get_header("x-api-key") == Some("secret"))
//!             .then(|| Arc::new(SimpleUser::new("service")) as Arc<dyn User>)
//!     }
//! }
//!
//! let mut registry = BackendRegistry::new(vec!["api_key".to_string()]);
//! registry.register(Arc::new(ApiKeyBackend));
//! let backends = registry.resolve(&brrtbind::security::AuthMode::Default).unwrap();
//! assert_eq!(backends.len(), 1);
//! ```

mod permissions;
mod session;
mod token;

pub use permissions::{check_permissions, require_authentication, AuthFailure};
pub use session::SessionAuthBackend;
pub use token::{AuthToken, InMemoryTokenStore, TokenAuthBackend, TokenStore};

use crate::error::ConfigError;
use crate::server::HandlerRequest;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An authenticated principal.
pub trait User: fmt::Debug + Send + Sync {
    fn identifier(&self) -> &str;

    fn is_authenticated(&self) -> bool {
        true
    }

    /// Permission strings look like `app.permission_name`.
    fn has_perm(&self, permission: &str) -> bool;
}

/// Plain in-memory user with a permission set.
#[derive(Debug, Clone, Default)]
pub struct SimpleUser {
    pub id: String,
    pub permissions: HashSet<String>,
    /// Holds every permission
    pub superuser: bool,
    pub active: bool,
}

impl SimpleUser {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            permissions: HashSet::new(),
            superuser: false,
            active: true,
        }
    }

    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    #[must_use]
    pub fn superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    /// An anonymous placeholder: present, but not authenticated.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            active: false,
            ..Self::new("anonymous")
        }
    }
}

impl User for SimpleUser {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn is_authenticated(&self) -> bool {
        self.active
    }

    fn has_perm(&self, permission: &str) -> bool {
        self.active && (self.superuser || self.permissions.contains(permission))
    }
}

/// Resolves the user of a request, if it can.
pub trait AuthBackend: Send + Sync {
    /// Name endpoints refer to this backend by.
    fn name(&self) -> &str;

    fn authenticate(&self, request: &HandlerRequest) -> Option<Arc<dyn User>>;
}

impl fmt::Debug for dyn AuthBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthBackend")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Which backends an endpoint authenticates with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// No authentication required
    #[default]
    Disabled,
    /// The configured default backends
    Default,
    /// These backends, in this order
    Backends(Vec<String>),
}

impl AuthMode {
    #[must_use]
    pub fn is_required(&self) -> bool {
        !matches!(self, AuthMode::Disabled)
    }
}

/// Named authentication backends plus the default order.
#[derive(Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn AuthBackend>>,
    defaults: Vec<String>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.backends.keys().collect();
        names.sort();
        f.debug_struct("BackendRegistry")
            .field("backends", &names)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl BackendRegistry {
    /// Empty registry using `defaults` for endpoints without explicit backends.
    #[must_use]
    pub fn new(defaults: Vec<String>) -> Self {
        Self {
            backends: HashMap::new(),
            defaults,
        }
    }

    /// Registry with the session backend and the token backend over `store`.
    #[must_use]
    pub fn with_builtin(defaults: Vec<String>, store: Arc<dyn TokenStore>) -> Self {
        let mut registry = Self::new(defaults);
        registry.register(Arc::new(SessionAuthBackend));
        registry.register(Arc::new(TokenAuthBackend::new(store)));
        registry
    }

    /// Add or replace a backend under its own name.
    pub fn register(&mut self, backend: Arc<dyn AuthBackend>) {
        debug!(backend = backend.name(), "Authentication backend registered");
        self.backends.insert(backend.name().to_string(), backend);
    }

    #[must_use]
    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }

    /// Ordered backends for an endpoint. Unknown names are a configuration error.
    pub fn resolve(&self, mode: &AuthMode) -> Result<Vec<Arc<dyn AuthBackend>>, ConfigError> {
        let names = match mode {
            AuthMode::Disabled | AuthMode::Default => &self.defaults,
            AuthMode::Backends(names) => names,
        };
        names
            .iter()
            .map(|name| {
                self.backends
                    .get(name)
                    .map(Arc::clone)
                    .ok_or_else(|| ConfigError::UnknownAuthBackend(name.clone()))
            })
            .collect()
    }
}

/// Try `backends` in order; the first user found wins, with its backend's name.
pub fn authenticate_request(
    request: &HandlerRequest,
    backends: &[Arc<dyn AuthBackend>],
) -> Option<(Arc<dyn User>, String)> {
    backends.iter().find_map(|backend| {
        backend
            .authenticate(request)
            .map(|user| (user, backend.name().to_string()))
    })
}
