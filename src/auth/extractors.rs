use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{claims::Claims, jwt::TokenError, repo_types::User},
    error::AppError,
    state::AppState,
};

/// Identity resolved from a bearer token.
///
/// Member identities are re-read from the store on every request, so
/// authorization follows the account's current state rather than the
/// verification flag embedded in the token.
#[derive(Debug, Clone)]
pub enum Principal {
    Member(User),
    Guest(Claims),
}

/// A principal backed by a persisted account.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// A persisted account whose email is verified.
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthenticated("No token provided. Access denied.".into()))?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("Invalid Authorization header".into()))
}

pub async fn resolve(state: &AppState, token: &str) -> Result<Principal, AppError> {
    let claims = state.jwt.verify(token).map_err(|e: TokenError| {
        warn!(error = %e, "token rejected");
        AppError::from(e)
    })?;

    if claims.is_guest() {
        return Ok(Principal::Guest(claims));
    }

    let user_id = Uuid::parse_str(&claims.sub).map_err(|e| {
        warn!(error = %e, sub = %claims.sub, "token subject is not a user id");
        AppError::Unauthenticated("Invalid or expired token".into())
    })?;

    match state.users.find_by_id(user_id).await? {
        Some(user) => Ok(Principal::Member(user)),
        None => {
            warn!(%user_id, "token for missing user");
            Err(AppError::Unauthenticated(
                "User not found. Unauthorized access.".into(),
            ))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        resolve(state, token).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Principal::from_request_parts(parts, state).await? {
            Principal::Member(user) => Ok(AuthUser(user)),
            Principal::Guest(_) => Err(AppError::Forbidden(
                "Guest accounts cannot perform this action. Please register.".into(),
            )),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for VerifiedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_verified {
            return Err(AppError::Forbidden(
                "Access denied. Please verify your email to manage events.".into(),
            ));
        }
        Ok(VerifiedUser(user))
    }
}
