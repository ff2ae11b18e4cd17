use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MessageResponse, ProfileResponse, PublicUser,
            RegisterRequest, UpdateProfileRequest, VerifyEmailRequest,
        },
        extractors::{AuthUser, Principal},
        services,
    },
    error::{AppError, AppJson},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/guest", post(guest))
        .route("/users/verify", post(verify_email))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/current", get(current))
        .route("/users/verify/request", get(request_verification))
        .route(
            "/users/userinfo",
            get(current).put(update_profile).delete(delete_account),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let created = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(services::login(&state, payload).await?))
}

#[instrument(skip(state))]
pub async fn guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(services::guest_login(&state)?))
}

#[instrument(skip(state, user))]
pub async fn request_verification(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    Ok(Json(services::request_verification(&state, &user).await?))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyEmailRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(services::verify_email(&state, payload).await?))
}

/// GET /users/current and GET /users/userinfo
#[instrument(skip_all)]
pub async fn current(principal: Principal) -> Json<PublicUser> {
    match principal {
        Principal::Member(user) => Json(PublicUser::from(&user)),
        Principal::Guest(claims) => {
            debug!("guest profile requested");
            Json(PublicUser::guest(&claims))
        }
    }
}

#[instrument(skip(state, user, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(services::update_profile(&state, &user, payload).await?))
}

#[instrument(skip(state, user))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    Ok(Json(services::delete_account(&state, &user).await?))
}

#[cfg(test)]
mod me_tests {
    use super::*;
    use crate::auth::{claims::TokenSubject, jwt::TOKEN_TTL, repo_types::tests::sample_user};

    #[tokio::test]
    async fn current_returns_member_profile_without_secrets() {
        let Json(profile) = current(Principal::Member(sample_user())).await;
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn current_returns_guest_profile() {
        let state = AppState::fake();
        let token = state.jwt.issue(&TokenSubject::guest()).unwrap();
        let claims = state.jwt.verify(&token).unwrap();
        assert!(claims.exp - claims.iat == TOKEN_TTL.whole_seconds());

        let Json(profile) = current(Principal::Guest(claims)).await;
        assert_eq!(profile.id, "guest");
        assert_eq!(profile.role, "guest");
        assert!(!profile.is_verified);
    }
}
