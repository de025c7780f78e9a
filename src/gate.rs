// Access gate
// Session check in front of every protected route

use crate::error::AppError;
use crate::session::{InvalidSession, SessionIssuer};
use crate::web::{AppState, found};
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Cookie carrying the session token
pub const AUTH_COOKIE: &str = "auth";
/// Where unauthenticated requests are sent
pub const LOGIN_PATH: &str = "/login";

/// Administrator behind the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub login: String,
}

/// Result of running an operation behind the gate
#[derive(Debug)]
pub enum GateOutcome<T> {
    Allowed(T),
    /// Session missing, invalid or expired; send the client here
    Redirect(String),
}

/// Marks a response produced because the session was rejected further down
/// the stack. The middleware turns such responses into a login redirect.
#[derive(Debug, Clone, Copy)]
pub struct SessionRejected;

/// Login URL that brings the user back to `path_and_query` afterwards
pub fn login_redirect(path_and_query: &str) -> String {
    if path_and_query.is_empty() || path_and_query == "/" {
        return LOGIN_PATH.to_string();
    }
    let escaped: String = url::form_urlencoded::byte_serialize(path_and_query.as_bytes()).collect();
    format!("{}?path={}", LOGIN_PATH, escaped)
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    sessions: Arc<SessionIssuer>,
}

impl AccessGate {
    pub fn new(sessions: Arc<SessionIssuer>) -> Self {
        Self { sessions }
    }

    /// Identity proven by `token`; a missing token is as bad as a forged one
    pub fn authorize(&self, token: Option<&str>) -> Result<AdminIdentity, InvalidSession> {
        let token = token.filter(|t| !t.is_empty()).ok_or(InvalidSession)?;
        let claims = self.sessions.validate(token)?;
        Ok(AdminIdentity {
            login: claims.login,
        })
    }

    /// Run `op` only if `token` is a valid session.
    ///
    /// Session failures, whether detected here or reported by `op` as
    /// [`AppError::Unauthorized`], become a redirect to the login page. Any
    /// other error from `op` is returned untouched.
    pub async fn guard<T, F, Fut>(
        &self,
        token: Option<&str>,
        path_and_query: &str,
        op: F,
    ) -> Result<GateOutcome<T>, AppError>
    where
        F: FnOnce(AdminIdentity) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let identity = match self.authorize(token) {
            Ok(identity) => identity,
            Err(InvalidSession) => {
                debug!("No valid session for {}", path_and_query);
                return Ok(GateOutcome::Redirect(login_redirect(path_and_query)));
            }
        };

        match op(identity).await {
            Ok(value) => Ok(GateOutcome::Allowed(value)),
            Err(AppError::Unauthorized) => Ok(GateOutcome::Redirect(login_redirect(path_and_query))),
            Err(other) => Err(other),
        }
    }
}

/// axum middleware guarding the protected routes
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let token = jar.get(AUTH_COOKIE).map(|c| c.value().to_string());
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();

    let outcome = state
        .gate
        .guard(token.as_deref(), &path_and_query, |identity| async move {
            request.extensions_mut().insert(identity);
            let response = next.run(request).await;
            if response.extensions().get::<SessionRejected>().is_some() {
                return Err(AppError::Unauthorized);
            }
            Ok(response)
        })
        .await;

    match outcome {
        Ok(GateOutcome::Allowed(response)) => response,
        Ok(GateOutcome::Redirect(location)) => found(&location),
        Err(err) => err.into_response(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminIdentity>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
