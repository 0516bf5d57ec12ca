//! Central identity, token and session management for campsite.
//! Keep the public surface thin and split implementation across sub-modules.

mod authorizer;
mod principal;
mod provider;
mod request_context;
mod session;
mod token;

pub use authorizer::{check_owner, check_policy, Decision, Policy};
pub use principal::Principal;
pub use provider::{check_credentials, CredentialCheck, LoginRequest};
pub use request_context::RequestContext;
pub use session::{Session, SessionManager};
pub use token::{issue_token, verify_token, IssuedToken, TokenError};
