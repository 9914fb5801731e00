use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::jwt::{Claims, JwtKeys},
    error::AppError,
};

/// Extracts and verifies the bearer token, yielding the caller's claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("Missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthenticated("Invalid Authorization header".into()))?;

        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            AppError::Unauthenticated("Invalid or expired token".into())
        })?;

        Ok(AuthUser(claims))
    }
}

// Mismatch is 403; authentication failures were already rejected during
// extraction. Handlers pass the returned id to the repository, never the
// raw path value.
pub fn require_owner(claims: &Claims, user_id: Uuid) -> Result<Uuid, AppError> {
    if claims.sub == user_id {
        Ok(user_id)
    } else {
        Err(AppError::Forbidden(
            "You can only access your own tasks".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_for(user_id: Uuid) -> Claims {
        Claims {
            sub: user_id,
            email: "anna@example.com".into(),
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn require_owner_allows_matching_identity() {
        let user_id = Uuid::new_v4();
        let claims = claims_for(user_id);
        assert_eq!(require_owner(&claims, user_id).unwrap(), user_id);
    }

    #[test]
    fn require_owner_rejects_foreign_identity() {
        let claims = claims_for(Uuid::new_v4());
        let err = require_owner(&claims, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
