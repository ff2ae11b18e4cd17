use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::jwt::TokenError;

/// Errors returned by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already in use")]
    Duplicate(&'static str),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                if let Some(field) = duplicate_field(db.constraint()) {
                    return StoreError::Duplicate(field);
                }
            }
        }
        StoreError::Backend(e.into())
    }
}

/// Maps a unique constraint name to the user-facing field it protects.
fn duplicate_field(constraint: Option<&str>) -> Option<&'static str> {
    match constraint? {
        c if c.contains("email") => Some("Email"),
        c if c.contains("phone") => Some("Phone number"),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Email is already verified")]
    AlreadyVerified,
    #[error("Invalid or expired verification token")]
    InvalidToken,
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("server misconfigured: {0}")]
    Misconfigured(String),
    #[error("upstream failure: {0:#}")]
    Upstream(anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::Conflict(_)
            | AppError::AlreadyVerified
            | AppError::InvalidToken => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Misconfigured(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(field) => AppError::Conflict(format!("{field} already in use")),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// JSON body extractor whose rejections render as `AppError::Validation`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::MissingSecret => AppError::Misconfigured("missing token secret".into()),
            TokenError::Expired | TokenError::Malformed(_) => {
                AppError::Unauthenticated("Invalid or expired token".into())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Misconfigured(detail) => {
                error!(%detail, "server misconfiguration");
                "Server error".to_string()
            }
            AppError::Upstream(e) => {
                error!(error = %format!("{e:#}"), "upstream collaborator failed");
                "An upstream service failed. Please try again later.".to_string()
            }
            AppError::Internal(e) => {
                error!(error = %format!("{e:#}"), "internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthenticated("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Misconfigured("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Upstream(anyhow::anyhow!("smtp down")).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn token_errors_split_between_auth_and_server() {
        let expired: AppError = TokenError::Expired.into();
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
        let missing: AppError = TokenError::MissingSecret.into();
        assert_eq!(missing.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn only_email_and_phone_constraints_are_duplicates() {
        assert_eq!(duplicate_field(Some("users_email_key")), Some("Email"));
        assert_eq!(duplicate_field(Some("users_phone_number_key")), Some("Phone number"));
        assert_eq!(duplicate_field(Some("users_verification_token_key")), None);
        assert_eq!(duplicate_field(None), None);
    }

    #[test]
    fn duplicate_store_error_becomes_conflict() {
        let err: AppError = StoreError::Duplicate("Email").into();
        assert!(matches!(&err, AppError::Conflict(m) if m == "Email already in use"));
    }
}
