use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

/// Signed credential payload carried by every authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

/// Why a token was rejected. Everything maps to 401 at the HTTP boundary;
/// the distinction matters for tests and logs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Holds the signing and verification keys with the configured lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig { secret, ttl_hours } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }
}

impl JwtKeys {
    pub(crate) fn issue_with_ttl(
        &self,
        user_id: Uuid,
        email: &str,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "token issued");
        Ok(token)
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        self.issue_with_ttl(user_id, email, self.ttl)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let mut validation = Validation::default();
        // A token expired one second ago must read as expired.
        validation.leeway = 0;
        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                ErrorKind::InvalidSignature => VerifyError::BadSignature,
                _ => VerifyError::Malformed,
            })?;
        debug!(user_id = %data.claims.sub, "token verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(1),
        }
    }

    #[test]
    fn issue_then_verify_roundtrip() {
        let keys = make_keys("dev-secret");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id, "anna@example.com").expect("issue");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "anna@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_payload_fails_with_bad_signature() {
        let keys = make_keys("dev-secret");
        let token = keys.issue(Uuid::new_v4(), "anna@example.com").expect("issue");

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        assert_eq!(parts.len(), 3);
        let payload = parts[1].clone();
        let flipped = if payload.starts_with('A') { 'B' } else { 'A' };
        parts[1] = format!("{}{}", flipped, &payload[1..]);
        let tampered = parts.join(".");

        assert_eq!(keys.verify(&tampered), Err(VerifyError::BadSignature));
    }

    #[test]
    fn wrong_secret_fails_with_bad_signature() {
        let signer = make_keys("one-secret");
        let verifier = make_keys("another-secret");
        let token = signer.issue(Uuid::new_v4(), "anna@example.com").expect("issue");
        assert_eq!(verifier.verify(&token), Err(VerifyError::BadSignature));
    }

    #[test]
    fn expired_token_fails_with_expired() {
        let keys = make_keys("dev-secret");
        let token = keys
            .issue_with_ttl(Uuid::new_v4(), "anna@example.com", Duration::hours(-1))
            .expect("issue");
        assert_eq!(keys.verify(&token), Err(VerifyError::Expired));
    }

    #[test]
    fn garbage_fails_with_malformed() {
        let keys = make_keys("dev-secret");
        assert_eq!(keys.verify("definitely-not-a-token"), Err(VerifyError::Malformed));
        assert_eq!(keys.verify("a.b.c"), Err(VerifyError::Malformed));
        assert_eq!(keys.verify(""), Err(VerifyError::Malformed));
    }
}
