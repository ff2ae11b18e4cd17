use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::{
    auth::{
        claims::TokenSubject,
        dto::{
            AuthResponse, LoginRequest, MessageResponse, ProfileResponse, PublicUser,
            RegisterRequest, UpdateProfileRequest, VerifyEmailRequest,
        },
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        repo_types::{NewUser, User, UserChanges, AVATARS, DEFAULT_AVATAR},
    },
    error::AppError,
    mailer::EmailMessage,
    state::AppState,
};

const VERIFICATION_TOKEN_LEN: usize = 48;
const MIN_USERNAME_LEN: usize = 3;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 ()\-]{5,18}[0-9]$").unwrap();
    // Compared against when the email is unknown so both failure paths cost a hash.
    static ref DUMMY_HASH: String = hash_password("not-a-real-password").unwrap_or_default();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn present(field: Option<String>) -> Option<String> {
    field.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AppError::Validation(
            "Username must be at least 3 characters long".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if !is_valid_email(email) {
        return Err(AppError::Validation("Please enter a valid email address".into()));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), AppError> {
    if !is_valid_phone(phone) {
        return Err(AppError::Validation("Please enter a valid phone number".into()));
    }
    Ok(())
}

fn validate_avatar(avatar: &str) -> Result<(), AppError> {
    if !AVATARS.contains(&avatar) {
        return Err(AppError::Validation(format!(
            "Avatar must be one of {}",
            AVATARS.join(", ")
        )));
    }
    Ok(())
}

fn generate_verification_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFICATION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn issue_for(st: &AppState, user: &User) -> Result<String, AppError> {
    Ok(st.jwt.issue(&TokenSubject::from(user))?)
}

pub async fn register(st: &AppState, req: RegisterRequest) -> Result<AuthResponse, AppError> {
    let (Some(username), Some(email), Some(password), Some(phone_number)) = (
        present(req.username),
        req.email.as_deref().map(normalize_email).filter(|e| !e.is_empty()),
        req.password.filter(|p| !p.is_empty()),
        present(req.phone_number),
    ) else {
        return Err(AppError::Validation("All fields are required".into()));
    };

    validate_username(&username)?;
    validate_email(&email)?;
    validate_phone(&phone_number)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 6 characters long".into(),
        ));
    }
    let avatar = present(req.avatar).unwrap_or_else(|| DEFAULT_AVATAR.to_string());
    validate_avatar(&avatar)?;

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("Email already in use".into()));
    }
    if st.users.find_by_phone(&phone_number).await?.is_some() {
        warn!("phone number already registered");
        return Err(AppError::Conflict("Phone number already in use".into()));
    }

    let password_hash = hash_password(&password)?;
    let user = st
        .users
        .create(NewUser {
            username,
            email,
            phone_number,
            password_hash,
            avatar,
        })
        .await?;

    let token = issue_for(st, &user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(AuthResponse {
        message: "User registered successfully".into(),
        user: PublicUser::from(&user),
        token,
    })
}

pub async fn login(st: &AppState, req: LoginRequest) -> Result<AuthResponse, AppError> {
    let (Some(email), Some(password)) = (
        req.email.as_deref().map(normalize_email).filter(|e| !e.is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation("All fields are required".into()));
    };

    let invalid = || AppError::Unauthenticated("Invalid email or password".into());

    let Some(user) = st.users.find_by_email(&email).await? else {
        let _ = verify_password(&password, &DUMMY_HASH);
        warn!(%email, "login unknown email");
        return Err(invalid());
    };
    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let mut user = st.users.record_login(user.id).await?.ok_or_else(invalid)?;
    if st.auto_verify.should_verify(&user) {
        user = st.users.mark_verified(user.id).await?.ok_or_else(invalid)?;
        info!(user_id = %user.id, login_count = user.login_count, "account auto-verified by login count");
    }

    let token = issue_for(st, &user)?;
    info!(user_id = %user.id, login_count = user.login_count, "user logged in");
    Ok(AuthResponse {
        message: "Login successful".into(),
        user: PublicUser::from(&user),
        token,
    })
}

pub fn guest_login(st: &AppState) -> Result<AuthResponse, AppError> {
    let subject = TokenSubject::guest();
    let token = st.jwt.issue(&subject)?;
    let claims = st.jwt.verify(&token)?;
    Ok(AuthResponse {
        message: "Guest login successful".into(),
        user: PublicUser::guest(&claims),
        token,
    })
}

pub async fn request_verification(st: &AppState, user: &User) -> Result<MessageResponse, AppError> {
    if user.is_verified {
        return Err(AppError::AlreadyVerified);
    }

    let token = generate_verification_token();
    let expires_at = OffsetDateTime::now_utc() + Duration::hours(st.config.verification_ttl_hours);
    st.users
        .set_verification_token(user.id, &token, expires_at)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let link = format!(
        "{}/verify?token={}",
        st.config.public_url.trim_end_matches('/'),
        token
    );
    let message = EmailMessage {
        to: user.email.clone(),
        subject: "Verify your email address".into(),
        text: format!(
            "Hi {}, please confirm your email address by opening this link: {}",
            user.username, link
        ),
        html: Some(format!(
            "<p>Hi {},</p><p>Please confirm your email address:</p><p><a href=\"{link}\">Verify email</a></p>",
            user.username
        )),
    };
    st.mailer.send(&message).await.map_err(AppError::Upstream)?;

    info!(user_id = %user.id, "verification email sent");
    Ok(MessageResponse {
        message: "Verification email sent".into(),
    })
}

pub async fn verify_email(st: &AppState, req: VerifyEmailRequest) -> Result<AuthResponse, AppError> {
    let Some(token) = present(req.token) else {
        return Err(AppError::Validation("Verification token is required".into()));
    };

    let user = st
        .users
        .consume_verification_token(&token, OffsetDateTime::now_utc())
        .await?
        .ok_or(AppError::InvalidToken)?;

    let token = issue_for(st, &user)?;
    info!(user_id = %user.id, "email verified");
    Ok(AuthResponse {
        message: "Email verified successfully".into(),
        user: PublicUser::from(&user),
        token,
    })
}

pub async fn update_profile(
    st: &AppState,
    user: &User,
    req: UpdateProfileRequest,
) -> Result<ProfileResponse, AppError> {
    let changes = UserChanges {
        username: present(req.username),
        email: req.email.as_deref().map(normalize_email).filter(|e| !e.is_empty()),
        phone_number: present(req.phone_number),
        avatar: present(req.avatar),
    };
    if changes.is_empty() {
        return Ok(ProfileResponse {
            message: "No changes to apply".into(),
            user: PublicUser::from(user),
        });
    }

    if let Some(username) = &changes.username {
        validate_username(username)?;
    }
    if let Some(email) = &changes.email {
        validate_email(email)?;
        if st.users.find_by_email(email).await?.is_some_and(|u| u.id != user.id) {
            return Err(AppError::Conflict("Email already in use by another user".into()));
        }
    }
    if let Some(phone) = &changes.phone_number {
        validate_phone(phone)?;
        if st.users.find_by_phone(phone).await?.is_some_and(|u| u.id != user.id) {
            return Err(AppError::Conflict(
                "Phone number already in use by another user".into(),
            ));
        }
    }
    if let Some(avatar) = &changes.avatar {
        validate_avatar(avatar)?;
    }

    let updated = st
        .users
        .update_profile(user.id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(user_id = %updated.id, "profile updated");
    Ok(ProfileResponse {
        message: "User information updated successfully".into(),
        user: PublicUser::from(&updated),
    })
}

pub async fn delete_account(st: &AppState, user: &User) -> Result<MessageResponse, AppError> {
    if !st.users.delete(user.id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    info!(user_id = %user.id, "account deleted");
    Ok(MessageResponse {
        message: "User account deleted successfully".into(),
    })
}
