use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Principal;
use crate::error::{ApiError, ApiResult};
use crate::extract::Input;
use crate::models::{PublicUser, Role};
use crate::password;
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordInput {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInput {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

pub async fn signup(
    State(state): State<AppState>,
    Input(input): Input<SignupInput>,
) -> ApiResult<Json<SignupResponse>> {
    let email = normalize_email(&input.email)?;
    check_password(&input.password)?;
    let name = input
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let role = if state.config.admin_email.as_deref() == Some(email.as_str()) {
        Role::Admin
    } else {
        Role::User
    };

    let mut db = state.db()?;
    if db.find_user_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }
    let user = db
        .create_user(&email, &password::hash(&input.password)?, name, role)?
        .ok_or_else(|| ApiError::Conflict("User already exists".to_string()))?;

    tracing::info!(user_id = user.id, role = %user.role, "user signed up");
    Ok(Json(SignupResponse {
        message: "User created successfully".to_string(),
        user: PublicUser::from(&user),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Input(input): Input<LoginInput>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());
    let email = normalize_email(&input.email).map_err(|_| invalid())?;

    let db = state.db()?;
    let user = db.find_user_by_email(&email)?.ok_or_else(invalid)?;
    if !password::verify(&input.password, &user.password_hash) {
        tracing::warn!(user_id = user.id, "rejected login");
        return Err(invalid());
    }

    let token = state.sessions.issue(user.id, &user.email)?;
    Ok(Json(LoginResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

pub async fn me(State(state): State<AppState>, principal: Principal) -> ApiResult<Json<PublicUser>> {
    let db = state.db()?;
    let user = db
        .find_user(principal.id)?
        .ok_or_else(|| ApiError::user_not_found(principal.id))?;
    Ok(Json(PublicUser::from(&user)))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Input(input): Input<ForgotPasswordInput>,
) -> ApiResult<Json<MessageResponse>> {
    let email = normalize_email(&input.email)?;
    let db = state.db()?;
    let user = db
        .find_user_by_email(&email)?
        .ok_or_else(|| ApiError::NotFound("No account with that email".to_string()))?;

    let token = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + state.config.reset_token_ttl;
    db.set_reset_token(user.id, &token, expires_at)?;

    let link = format!("{}/reset-password?token={token}", state.config.public_url);
    state.mailer.send_reset_link(&user.email, &link)?;

    tracing::info!(user_id = user.id, %expires_at, "password reset requested");
    Ok(MessageResponse::new("Reset link has been sent to your email."))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Input(input): Input<ResetPasswordInput>,
) -> ApiResult<Json<MessageResponse>> {
    check_password(&input.new_password)?;
    let invalid = || ApiError::BadRequest("Invalid or expired token".to_string());

    let token = input.token.trim();
    let mut db = state.db()?;
    let user = db.find_user_by_reset_token(token)?.ok_or_else(invalid)?;
    match user.reset_token_expires_at {
        Some(expires_at) if expires_at > Utc::now() => {}
        _ => return Err(invalid()),
    }

    if !db.reset_password(user.id, token, &password::hash(&input.new_password)?)? {
        return Err(invalid());
    }
    tracing::info!(user_id = user.id, "password reset");
    Ok(MessageResponse::new("Password reset successfully"))
}

fn normalize_email(email: &str) -> ApiResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if valid && !email.contains(char::is_whitespace) {
        Ok(email)
    } else {
        Err(ApiError::BadRequest("Invalid email address".to_string()))
    }
}

fn check_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
