use super::{AuthBackend, User};
use crate::server::HandlerRequest;
use std::sync::Arc;

/// Trusts the user the framework's session layer attached to the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAuthBackend;

impl AuthBackend for SessionAuthBackend {
    fn name(&self) -> &str {
        "session"
    }

    fn authenticate(&self, request: &HandlerRequest) -> Option<Arc<dyn User>> {
        request
            .session_user
            .as_ref()
            .filter(|user| user.is_authenticated())
            .map(Arc::clone)
    }
}
