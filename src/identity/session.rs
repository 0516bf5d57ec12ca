//! Cookie-backed server sessions for browser clients.
//!
//! Unlike bearer tokens, sessions are server-tracked: issued on login,
//! destroyed on logout, expired by TTL. Each session carries a CSRF token
//! that cookie-mode mutations must echo back in a header.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use crate::tprintln;

use super::principal::Principal;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub csrf_token: String,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_id() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Owns the session map; shared across handlers via cheap clones.
#[derive(Clone)]
pub struct SessionManager {
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::with_ttl(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn issue(&self, principal: Principal) -> Session {
        let now = Instant::now();
        let sess = Session {
            session_id: gen_id(),
            csrf_token: gen_id(),
            principal,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(sess.session_id.clone(), sess.clone());
        tprintln!(
            "session.issue user={} sid={} ttl_secs={}",
            sess.principal.username,
            sess.session_id,
            self.ttl.as_secs()
        );
        sess
    }

    /// Resolve a session id to its principal, pruning it when expired.
    pub fn validate(&self, session_id: &str) -> Option<Principal> {
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.sessions.read();
            if let Some(sess) = map.get(session_id) {
                if sess.expires_at > now {
                    Some(sess.principal.clone())
                } else {
                    drop_key = Some(session_id.to_string());
                    None
                }
            } else {
                None
            }
        };
        if let Some(k) = drop_key {
            self.sessions.write().remove(&k);
        }
        out
    }

    /// The CSRF token bound to a live session, if any.
    pub fn csrf_for(&self, session_id: &str) -> Option<String> {
        let now = Instant::now();
        let map = self.sessions.read();
        map.get(session_id)
            .filter(|s| s.expires_at > now)
            .map(|s| s.csrf_token.clone())
    }

    pub fn logout(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().remove(session_id).is_some();
        if removed {
            tprintln!("session.logout sid={}", session_id);
        }
        removed
    }
}
