//! Bearer token issuance and validation.
//!
//! Tokens are compact HS256-signed JWTs. The claim payload carries the subject
//! (username), a fresh `jti`, the display identity fields, and every custom
//! claim attached to the principal at issuance time. Nothing is recorded
//! server-side: validity is determined purely by signature, issuer, audience
//! and embedded expiry.
//!
//! Validation is a pure function of (token, current time, configuration):
//! the same inputs always produce the same verdict within the token's
//! validity window.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::TokenConfig;

use super::principal::Principal;

/// Claim payload embedded in issued tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub jti: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub email: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    /// Custom claims attached to the identity (e.g. `SuperUser=True`).
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, String>,
}

/// A freshly issued token and its expiry timestamp.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Error returned when token issuance or validation fails.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token issuer is not trusted")]
    InvalidIssuer,
    #[error("token audience is not trusted")]
    InvalidAudience,
    #[error("malformed token")]
    Malformed,
    #[error("missing 'sub' claim")]
    MissingSubject,
    #[error("token signing key is not configured")]
    MissingKey,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Mint a signed token for an already-verified principal.
///
/// The caller is responsible for having checked the password; this function
/// only snapshots the identity into a claim set and signs it.
pub fn issue_token(cfg: &TokenConfig, principal: &Principal) -> Result<IssuedToken, TokenError> {
    if cfg.secret.is_empty() {
        return Err(TokenError::MissingKey);
    }
    let expires_at = Utc::now() + Duration::seconds(cfg.token_ttl_secs as i64);
    let claims = Claims {
        sub: principal.username.clone(),
        jti: Uuid::new_v4().to_string(),
        given_name: principal.given_name.clone(),
        family_name: principal.family_name.clone(),
        email: principal.email.clone(),
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
        exp: expires_at.timestamp(),
        extra: principal.claims.clone(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))?;
    Ok(IssuedToken { token, expires_at })
}

/// Validate a presented token and rebuild the principal it asserts.
///
/// Signature, issuer, audience and expiry are all checked (zero leeway).
pub fn verify_token(cfg: &TokenConfig, token: &str) -> Result<Principal, TokenError> {
    if cfg.secret.is_empty() {
        return Err(TokenError::MissingKey);
    }
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[cfg.issuer.as_str()]);
    validation.set_audience(&[cfg.audience.as_str()]);
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )
    .map_err(map_jwt_error)?;

    let c = data.claims;
    if c.sub.is_empty() {
        return Err(TokenError::MissingSubject);
    }
    Ok(Principal {
        username: c.sub,
        given_name: c.given_name,
        family_name: c.family_name,
        email: c.email,
        claims: c.extra,
    })
}

fn map_jwt_error(error: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match error.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
        ErrorKind::InvalidAudience => TokenError::InvalidAudience,
        ErrorKind::MissingRequiredClaim(_) => TokenError::MissingSubject,
        ErrorKind::InvalidToken
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => TokenError::Malformed,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TokenConfig {
        TokenConfig {
            secret: "test-secret-key-that-is-long-enough".into(),
            issuer: "http://campsite.example".into(),
            audience: "http://campsite.example".into(),
            token_ttl_secs: 900,
        }
    }

    fn test_principal() -> Principal {
        let mut claims = BTreeMap::new();
        claims.insert("SuperUser".to_string(), "True".to_string());
        Principal {
            username: "shawn".into(),
            given_name: "Shawn".into(),
            family_name: "W".into(),
            email: "shawn@campsite.example".into(),
            claims,
        }
    }

    fn encode_claims(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issue_then_verify_round_trips_identity_and_claims() {
        let cfg = test_config();
        let issued = issue_token(&cfg, &test_principal()).unwrap();
        let p = verify_token(&cfg, &issued.token).unwrap();
        assert_eq!(p.username, "shawn");
        assert_eq!(p.email, "shawn@campsite.example");
        assert_eq!(p.given_name, "Shawn");
        assert!(p.has_claim("SuperUser", "True"));
    }

    #[test]
    fn expiry_is_ttl_ahead_of_issuance() {
        let cfg = test_config();
        let before = Utc::now();
        let issued = issue_token(&cfg, &test_principal()).unwrap();
        let delta = issued.expires_at - before;
        assert!(delta >= Duration::seconds(899) && delta <= Duration::seconds(901));
    }

    #[test]
    fn fresh_jti_per_issuance() {
        let cfg = test_config();
        let a = issue_token(&cfg, &test_principal()).unwrap();
        let b = issue_token(&cfg, &test_principal()).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn tampered_signature_segment_is_rejected() {
        let cfg = test_config();
        let issued = issue_token(&cfg, &test_principal()).unwrap();
        // Flip the last character of the signature segment
        let mut tampered = issued.token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });
        let result = verify_token(&cfg, &tampered);
        assert!(matches!(result, Err(TokenError::InvalidSignature) | Err(TokenError::Malformed)));
    }

    #[test]
    fn token_signed_with_a_different_key_is_rejected() {
        let cfg = test_config();
        let issued = issue_token(&cfg, &test_principal()).unwrap();
        let mut other = test_config();
        other.secret = "a-completely-different-secret-key!!".into();
        assert!(matches!(verify_token(&other, &issued.token), Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn expired_token_is_rejected_even_with_valid_signature() {
        let cfg = test_config();
        let claims = Claims {
            sub: "shawn".into(),
            jti: Uuid::new_v4().to_string(),
            given_name: String::new(),
            family_name: String::new(),
            email: String::new(),
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
            exp: (Utc::now() - Duration::seconds(120)).timestamp(),
            extra: BTreeMap::new(),
        };
        let token = encode_claims(&claims, &cfg.secret);
        assert!(matches!(verify_token(&cfg, &token), Err(TokenError::Expired)));
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let cfg = test_config();
        let mut claims = Claims {
            sub: "shawn".into(),
            jti: Uuid::new_v4().to_string(),
            given_name: String::new(),
            family_name: String::new(),
            email: String::new(),
            iss: "http://somewhere.else".into(),
            aud: cfg.audience.clone(),
            exp: (Utc::now() + Duration::seconds(600)).timestamp(),
            extra: BTreeMap::new(),
        };
        let token = encode_claims(&claims, &cfg.secret);
        assert!(matches!(verify_token(&cfg, &token), Err(TokenError::InvalidIssuer)));

        claims.iss = cfg.issuer.clone();
        claims.aud = "http://somewhere.else".into();
        let token = encode_claims(&claims, &cfg.secret);
        assert!(matches!(verify_token(&cfg, &token), Err(TokenError::InvalidAudience)));
    }

    #[test]
    fn garbage_input_is_malformed_not_a_panic() {
        let cfg = test_config();
        assert!(matches!(verify_token(&cfg, "not-a-jwt"), Err(TokenError::Malformed)));
        assert!(matches!(verify_token(&cfg, ""), Err(TokenError::Malformed)));
    }

    #[test]
    fn empty_secret_refuses_to_sign_or_verify() {
        let mut cfg = test_config();
        cfg.secret = String::new();
        assert!(matches!(issue_token(&cfg, &test_principal()), Err(TokenError::MissingKey)));
        assert!(matches!(verify_token(&cfg, "x.y.z"), Err(TokenError::MissingKey)));
    }
}
