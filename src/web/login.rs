// Login and logout

use super::{AppState, found};
use crate::error::AppError;
use crate::gate::{AUTH_COOKIE, LOGIN_PATH};
use crate::validate;
use axum::extract::{Form, State};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{info, warn};

#[derive(Deserialize)]
pub(super) struct LoginForm {
    #[serde(default)]
    login: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    path: Option<String>,
}

pub(super) async fn page() -> Html<&'static str> {
    Html(include_str!("../../static/login.html"))
}

pub(super) async fn submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let valid = state
        .credentials
        .check_password(&form.login, &form.password)
        .await?;
    if !valid {
        warn!("Rejected login attempt");
        return Err(AppError::BadRequest("invalid login or password".to_string()));
    }

    let issued = state.sessions.issue(&form.login)?;
    let expires = OffsetDateTime::from_unix_timestamp(issued.expires_at.timestamp())
        .map_err(|e| AppError::Internal(format!("session expiry out of range: {}", e)))?;

    let cookie = Cookie::build((AUTH_COOKIE, issued.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.run_mode.secure_cookies())
        .expires(expires);

    let target = validate::redirect_path(form.path.as_deref()).unwrap_or_else(|| "/".to_string());
    info!("Admin {} logged in", form.login);

    Ok((jar.add(cookie), found(&target)).into_response())
}

/// Tell the client to drop its session cookie. Tokens are stateless, so a
/// copy kept elsewhere stays valid until it expires.
pub(super) async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let cookie = Cookie::build((AUTH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.run_mode.secure_cookies())
        .expires(OffsetDateTime::UNIX_EPOCH);

    (jar.add(cookie), found(LOGIN_PATH))
}
