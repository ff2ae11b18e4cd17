use serde::{Deserialize, Serialize};

use crate::auth::{
    claims::{Claims, GUEST_ID},
    repo_types::{User, DEFAULT_AVATAR},
};

/// Request body for user registration. Fields are optional so a missing one
/// surfaces as a validation error rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "phone")]
    pub phone_number: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "phone")]
    pub phone_number: Option<String>,
    pub avatar: Option<String>,
}

/// Response returned after register, login, guest login or verification.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub avatar: String,
    pub is_verified: bool,
    pub role: &'static str,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.username.clone(),
            email: u.email.clone(),
            phone_number: Some(u.phone_number.clone()),
            avatar: u.avatar.clone(),
            is_verified: u.is_verified,
            role: "user",
        }
    }
}

impl PublicUser {
    pub fn guest(claims: &Claims) -> Self {
        Self {
            id: GUEST_ID.into(),
            username: claims.username.clone(),
            email: claims.email.clone(),
            phone_number: None,
            avatar: DEFAULT_AVATAR.into(),
            is_verified: false,
            role: "guest",
        }
    }
}
