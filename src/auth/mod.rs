mod password;
mod token;

use std::sync::Arc;

use axum::{RequestPartsExt, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

pub use password::{PasswordError, hash_password, verify_password};
pub use token::{TokenError, TokenIssuer};

use crate::{AppState, entities::user, error::AppError};

/// The user behind a valid `Authorization: Bearer` token.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub user::Model);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthorized("Not authenticated".to_string()))?;

        let claims = state.tokens.resolve(bearer.token()).inspect_err(|err| {
            warn!(error = %err, "rejected bearer token");
        })?;

        // The token is bound to the account row, and stops working once that
        // account gives up the username it was issued under.
        let user = state
            .users
            .find(claims.uid)
            .await?
            .filter(|u| u.username == claims.sub)
            .ok_or_else(|| {
                warn!(user_id = claims.uid, sub = %claims.sub, "stale token subject");
                AppError::Unauthorized("Could not validate credentials".to_string())
            })?;

        if user.disabled {
            warn!(user_id = user.id, "disabled user presented a token");
            return Err(AppError::Unauthorized("Inactive user".to_string()));
        }

        Ok(Self(user))
    }
}

/// Single ownership gate for every mutating operation on an owned resource.
pub fn ensure_owner(
    owner_id: i32,
    requester: &user::Model,
    resource: &str,
) -> Result<(), AppError> {
    if owner_id == requester.id {
        return Ok(());
    }
    warn!(user_id = requester.id, owner_id, resource, "ownership check failed");
    Err(AppError::Forbidden(format!("Not authorized to modify this {resource}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i32) -> user::Model {
        user::Model {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@x.com"),
            full_name: None,
            hashed_password: String::new(),
            disabled: false,
        }
    }

    #[test]
    fn owner_passes_and_others_are_forbidden() {
        assert!(ensure_owner(1, &user(1), "movie").is_ok());

        let err = ensure_owner(1, &user(2), "movie").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg.contains("movie")));
    }
}
