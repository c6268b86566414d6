use super::User;
use std::fmt;
use std::sync::Arc;

/// Why an authentication or permission check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    AuthenticationRequired,
    PermissionDenied,
}

impl AuthFailure {
    /// Value of the `error` key in the response body.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuthFailure::AuthenticationRequired => "authentication_required",
            AuthFailure::PermissionDenied => "permission_denied",
        }
    }

    #[must_use]
    pub fn status(self) -> u16 {
        match self {
            AuthFailure::AuthenticationRequired => 401,
            AuthFailure::PermissionDenied => 403,
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn require_authentication(user: Option<&Arc<dyn User>>) -> Result<(), AuthFailure> {
    match user {
        Some(user) if user.is_authenticated() => Ok(()),
        _ => Err(AuthFailure::AuthenticationRequired),
    }
}

/// The user must be authenticated and hold every permission.
pub fn check_permissions<S: AsRef<str>>(
    user: Option<&Arc<dyn User>>,
    permissions: &[S],
) -> Result<(), AuthFailure> {
    require_authentication(user)?;
    let user = user.ok_or(AuthFailure::AuthenticationRequired)?;
    if permissions.iter().all(|p| user.has_perm(p.as_ref())) {
        Ok(())
    } else {
        Err(AuthFailure::PermissionDenied)
    }
}
