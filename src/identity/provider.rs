// Keep request/outcome types plain Rust structs; "unknown user" and "wrong
// password" are deliberately the same variant so callers cannot leak which
// part failed.

use crate::storage::SharedStore;
use crate::tprintln;

use super::principal::Principal;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Outcome of a credential check. Rejection is an ordinary value, not an
/// error: store failures are the only thing surfaced as errors upstream.
#[derive(Debug, Clone)]
pub enum CredentialCheck {
    Verified(Principal),
    Rejected,
}

impl CredentialCheck {
    pub fn is_verified(&self) -> bool {
        matches!(self, CredentialCheck::Verified(_))
    }
}

/// Verify a username/password pair against the user store.
pub fn check_credentials(store: &SharedStore, req: &LoginRequest) -> CredentialCheck {
    let guard = store.0.read();
    let Some(user) = guard.find_user(&req.username) else {
        return CredentialCheck::Rejected;
    };
    if !crate::security::verify_password(&user.password_hash, &req.password) {
        return CredentialCheck::Rejected;
    }
    tprintln!("auth.verified user={}", user.username);
    CredentialCheck::Verified(user.principal())
}
