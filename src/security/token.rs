use super::{AuthBackend, User};
use crate::server::HandlerRequest;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// An issued API token.
#[derive(Clone)]
pub struct AuthToken {
    pub key: String,
    pub user: Arc<dyn User>,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub description: String,
}

impl AuthToken {
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("user", &self.user.identifier())
            .field("expires_at", &self.expires_at)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Lookup of unexpired tokens by key.
pub trait TokenStore: Send + Sync {
    fn lookup(&self, key: &str) -> Option<Arc<dyn User>>;
}

/// 64-character URL-safe key from 48 bytes of ULID entropy.
fn generate_key() -> String {
    let mut raw = Vec::with_capacity(48);
    for _ in 0..3 {
        raw.extend_from_slice(&ulid::Ulid::new().to_bytes());
    }
    URL_SAFE_NO_PAD.encode(raw)
}

/// Process-local token store.
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<String, AuthToken>>,
    validity_days: u32,
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::with_validity(4)
    }
}

impl InMemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose [`issue_default`](Self::issue_default) tokens last `days`.
    #[must_use]
    pub fn with_validity(days: u32) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            validity_days: days,
        }
    }

    /// Issue a token with the store's default validity.
    pub fn issue_default(&self, user: Arc<dyn User>, description: &str) -> AuthToken {
        self.issue(user, self.validity_days, description)
    }

    /// Issue a token valid for `days_valid` days.
    pub fn issue(&self, user: Arc<dyn User>, days_valid: u32, description: &str) -> AuthToken {
        let created_at = SystemTime::now();
        let token = AuthToken {
            key: generate_key(),
            user,
            created_at,
            expires_at: created_at + Duration::from_secs(u64::from(days_valid) * SECONDS_PER_DAY),
            description: description.to_string(),
        };
        info!(user = token.user.identifier(), days_valid, "Issued auth token");
        self.insert(token.clone());
        token
    }

    /// Store a token built elsewhere (e.g. loaded from a database).
    pub fn insert(&self, token: AuthToken) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.key.clone(), token);
    }

    pub fn revoke(&self, key: &str) -> bool {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Drop expired tokens; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(now));
        before - tokens.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for InMemoryTokenStore {
    fn lookup(&self, key: &str) -> Option<Arc<dyn User>> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        tokens
            .get(key)
            .filter(|t| !t.is_expired())
            .map(|t| Arc::clone(&t.user))
    }
}

/// `Authorization: Token <key>` authentication.
#[derive(Clone)]
pub struct TokenAuthBackend {
    store: Arc<dyn TokenStore>,
}

impl TokenAuthBackend {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

impl AuthBackend for TokenAuthBackend {
    fn name(&self) -> &str {
        "token"
    }

    fn authenticate(&self, request: &HandlerRequest) -> Option<Arc<dyn User>> {
        let key = request.get_header("authorization")?.strip_prefix("Token ")?;
        let user = self.store.lookup(key.trim());
        if user.is_none() {
            debug!(request_id = %request.request_id, "Unknown or expired token");
        }
        user
    }
}
