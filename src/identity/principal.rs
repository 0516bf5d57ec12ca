use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An authenticated principal: the identity facts carried through a request
/// and embedded into issued tokens. Claims are a snapshot taken when the
/// principal was established; they are not re-read from the store until the
/// next login or issuance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
}

impl Principal {
    /// True when the principal carries `key` with exactly `expected` as value.
    pub fn has_claim(&self, key: &str, expected: &str) -> bool {
        self.claims.get(key).map(|v| v == expected).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_claim_matches_exact_value_only() {
        let mut p = Principal { username: "alice".into(), ..Default::default() };
        p.claims.insert("SuperUser".into(), "True".into());
        assert!(p.has_claim("SuperUser", "True"));
        assert!(!p.has_claim("SuperUser", "true"));
        assert!(!p.has_claim("Admin", "True"));
    }
}
