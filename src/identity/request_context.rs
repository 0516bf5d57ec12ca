use super::Principal;

/// Per-request authentication result, passed explicitly into handlers and
/// authorization checks. `session_id` is set only when the principal arrived
/// via a cookie session (bearer requests carry no ambient credential and are
/// exempt from CSRF checks).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Option<Principal>,
    pub session_id: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}
