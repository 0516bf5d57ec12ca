//! Authorization policy evaluation.
//!
//! Two policy shapes: named global policies gated on a claim/value pair, and
//! ownership comparison between the requesting principal and a resource's
//! recorded owner. Both are pure functions over the principal's facts;
//! deny maps to a distinct forbidden outcome at the HTTP boundary.

use super::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn allowed(self) -> bool { self == Decision::Allow }
}

/// Named global policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Allow iff the identity carries the claim `SuperUser=True`.
    SuperUsers,
}

pub fn check_policy(principal: &Principal, policy: Policy) -> Decision {
    match policy {
        Policy::SuperUsers => {
            if principal.has_claim("SuperUser", "True") {
                Decision::Allow
            } else {
                Decision::Deny
            }
        }
    }
}

/// Ownership rule: deny unless the requester owns the resource.
///
/// Super users may mutate any resource, so that shortcut is evaluated first.
/// Username comparison is case-insensitive, matching store lookups.
pub fn check_owner(principal: &Principal, owner_username: &str) -> Decision {
    if check_policy(principal, Policy::SuperUsers).allowed() {
        return Decision::Allow;
    }
    if principal.username.eq_ignore_ascii_case(owner_username) {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> Principal {
        Principal { username: name.into(), ..Default::default() }
    }

    fn super_user(name: &str) -> Principal {
        let mut p = user(name);
        p.claims.insert("SuperUser".into(), "True".into());
        p
    }

    #[test]
    fn super_users_policy_requires_the_exact_claim() {
        assert!(check_policy(&super_user("admin"), Policy::SuperUsers).allowed());
        assert!(!check_policy(&user("alice"), Policy::SuperUsers).allowed());

        let mut almost = user("bob");
        almost.claims.insert("SuperUser".into(), "False".into());
        assert!(!check_policy(&almost, Policy::SuperUsers).allowed());
    }

    #[test]
    fn owner_may_mutate_their_own_resource() {
        assert!(check_owner(&user("alice"), "alice").allowed());
        // lookups are case-insensitive, so ownership is too
        assert!(check_owner(&user("Alice"), "alice").allowed());
    }

    #[test]
    fn non_owner_is_denied() {
        assert_eq!(check_owner(&user("bob"), "alice"), Decision::Deny);
    }

    #[test]
    fn super_user_overrides_ownership() {
        assert!(check_owner(&super_user("admin"), "alice").allowed());
    }
}
