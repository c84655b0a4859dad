//! Signed tokens for login links and sessions
//!
//! Two token kinds, both HS256 JWTs signed with the application secret:
//! a login token carries the email address a login link was sent to, an
//! access token identifies an authenticated user. Verification returns
//! `None` on any signature or shape mismatch; callers treat a bad token
//! the same as a missing one.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct LoginClaims {
    email: String,
    /// Issued-at (seconds since epoch)
    iat: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: i64,
    iat: u64,
}

/// Signs and verifies the application's tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign a login-link token for an email address
    pub fn generate_login_token(&self, email: &str) -> String {
        let claims = LoginClaims {
            email: email.to_string(),
            iat: now(),
        };
        encode(&Header::default(), &claims, &self.encoding).unwrap_or_default()
    }

    /// Verify a login token, returning the email it was issued for
    pub fn verify_login_token(&self, token: &str) -> Option<String> {
        decode::<LoginClaims>(token, &self.decoding, &validation())
            .ok()
            .map(|data| data.claims.email)
    }

    /// Sign an access token for a user
    pub fn generate_access_token(&self, user_id: i64) -> String {
        let claims = AccessClaims {
            sub: user_id,
            iat: now(),
        };
        encode(&Header::default(), &claims, &self.encoding).unwrap_or_default()
    }

    /// Verify an access token, returning the user id it identifies
    pub fn verify_access_token(&self, token: &str) -> Option<i64> {
        decode::<AccessClaims>(token, &self.decoding, &validation())
            .ok()
            .map(|data| data.claims.sub)
    }
}

fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Tokens never expire; only the signature is checked
fn validation() -> Validation {
    let mut validation = Validation::default();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trip() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.generate_access_token(42);
        assert_eq!(codec.verify_access_token(&token), Some(42));
    }

    #[test]
    fn login_token_round_trip() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.generate_login_token("zech@8ly.example");
        assert_eq!(
            codec.verify_login_token(&token).as_deref(),
            Some("zech@8ly.example")
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let codec = TokenCodec::new("test-secret");
        let other = TokenCodec::new("other-secret");
        let token = codec.generate_access_token(42);
        assert_eq!(other.verify_access_token(&token), None);
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = TokenCodec::new("test-secret");
        assert_eq!(codec.verify_access_token("not-a-token"), None);
        assert_eq!(codec.verify_login_token(""), None);
    }
}
