use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;

use crate::access::Principal;
use crate::error::ApiError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";

/// JSON body whose rejections use the API error format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Input<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Input<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Input(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection_message(rejection))),
        }
    }
}

fn rejection_message(rejection: JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(e) => format!("Invalid input: {}", e.body_text()),
        JsonRejection::JsonSyntaxError(e) => format!("Malformed JSON: {}", e.body_text()),
        JsonRejection::MissingJsonContentType(_) => {
            "Expected Content-Type: application/json".to_string()
        }
        other => other.body_text(),
    }
}

/// Bearer token from `Authorization`, falling back to the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller from the request headers against the current store state.
pub fn resolve_principal(headers: &HeaderMap, state: &AppState) -> Result<Principal, ApiError> {
    let token = session_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Not signed in".to_string()))?;
    let claims = state.sessions.verify(token)?;
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized("Invalid session subject".to_string()))?;

    let db = state.db()?;
    let user = db
        .find_user(user_id)?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;
    Ok(Principal::from(&user))
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_principal(&parts.headers, state)
    }
}

/// Procedures open to admins and subadmins.
#[derive(Debug, Clone)]
pub struct StaffPrincipal(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for StaffPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = resolve_principal(&parts.headers, state)?;
        principal.require_staff()?;
        Ok(StaffPrincipal(principal))
    }
}
