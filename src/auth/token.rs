//! Signed bearer tokens (HS256 JWT).

use jiff::{SignedDuration, Timestamp};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Username of the bearer.
    pub sub: String,
    /// Row id of the bearer. Usernames can be given up and claimed again,
    /// ids cannot.
    pub uid: i32,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token encoding error: {0}")]
    Encoding(jsonwebtoken::errors::Error),

    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    InvalidToken,
}

/// Issues and resolves access tokens with a single server secret.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: SignedDuration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: SignedDuration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `resolve_at`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, username: &str, uid: i32) -> Result<String, TokenError> {
        self.issue_at(username, uid, Timestamp::now())
    }

    pub fn issue_at(&self, username: &str, uid: i32, now: Timestamp) -> Result<String, TokenError> {
        let iat = now.as_second();
        let claims = Claims {
            sub: username.to_string(),
            uid,
            iat,
            exp: iat + self.ttl.as_secs(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    pub fn resolve(&self, token: &str) -> Result<Claims, TokenError> {
        self.resolve_at(token, Timestamp::now())
    }

    pub fn resolve_at(&self, token: &str, now: Timestamp) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::InvalidToken)?;

        if now.as_second() > data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(secret: &[u8]) -> TokenIssuer {
        TokenIssuer::new(secret, SignedDuration::from_mins(30))
    }

    #[test]
    fn resolves_to_the_subject_and_id() {
        let tokens = issuer(b"secret");
        let token = tokens.issue("alice", 7).unwrap();

        let claims = tokens.resolve(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn accepted_until_ttl_elapses() {
        let tokens = issuer(b"secret");
        let issued = Timestamp::from_second(1_700_000_000).unwrap();
        let token = tokens.issue_at("alice", 1, issued).unwrap();

        let almost = issued + SignedDuration::from_secs(29 * 60 + 59);
        let edge = issued + SignedDuration::from_mins(30);
        let after = edge + SignedDuration::from_secs(1);

        assert_eq!(tokens.resolve_at(&token, almost).unwrap().sub, "alice");
        assert_eq!(tokens.resolve_at(&token, edge).unwrap().sub, "alice");
        assert!(matches!(tokens.resolve_at(&token, after), Err(TokenError::Expired)));
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = issuer(b"one").issue("alice", 1).unwrap();

        assert!(matches!(issuer(b"two").resolve(&token), Err(TokenError::InvalidToken)));
    }

    #[test]
    fn rejects_tampered_and_malformed_tokens() {
        let tokens = issuer(b"secret");
        let token = tokens.issue("alice", 1).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');

        assert!(matches!(tokens.resolve(&tampered), Err(TokenError::InvalidToken)));
        assert!(matches!(tokens.resolve("not.a.jwt"), Err(TokenError::InvalidToken)));
        assert!(matches!(tokens.resolve(""), Err(TokenError::InvalidToken)));
    }
}
