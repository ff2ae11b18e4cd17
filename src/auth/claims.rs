use serde::{Deserialize, Serialize};

use crate::auth::repo_types::User;

pub const GUEST_ID: &str = "guest";
pub const GUEST_USERNAME: &str = "Guest";
pub const GUEST_EMAIL: &str = "guest@example.com";

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,       // user ID, or "guest"
    pub username: String,
    pub email: String,
    pub is_verified: bool, // snapshot at issuance
    pub iat: i64,          // issued at (unix timestamp)
    pub exp: i64,          // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn is_guest(&self) -> bool {
        self.sub == GUEST_ID
    }
}

/// Identity fields embedded into a freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
}

impl TokenSubject {
    pub fn guest() -> Self {
        Self {
            id: GUEST_ID.into(),
            username: GUEST_USERNAME.into(),
            email: GUEST_EMAIL.into(),
            is_verified: false,
        }
    }
}

impl From<&User> for TokenSubject {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            is_verified: user.is_verified,
        }
    }
}
