// Web console
// Router, shared state and the handlers behind it

mod admins;
mod login;
mod projects;
mod users;

use crate::config::{Config, RunMode};
use crate::credentials::Credentials;
use crate::gate::{self, AccessGate};
use crate::session::SessionIssuer;
use crate::store::Store;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) credentials: Credentials<dyn Store>,
    pub(crate) sessions: Arc<SessionIssuer>,
    pub(crate) gate: AccessGate,
    pub(crate) run_mode: RunMode,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, sessions: SessionIssuer, run_mode: RunMode) -> Self {
        let sessions = Arc::new(sessions);
        Self {
            credentials: Credentials::new(Arc::clone(&store)),
            gate: AccessGate::new(Arc::clone(&sessions)),
            store,
            sessions,
            run_mode,
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Self {
        Self::new(
            store,
            SessionIssuer::new(config.jwt_secret.as_bytes()),
            config.run_mode,
        )
    }

    /// Override the bcrypt work factor of admin passwords
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.credentials = self.credentials.with_cost(cost);
        self
    }
}

/// Build the console router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(index))
        .route("/projects", get(projects::list).post(projects::create))
        .route("/projects/:project_id", post(projects::edit))
        .route("/projects/:project_id/edit", get(projects::edit_page))
        .route("/projects/:project_id/users", get(projects::users))
        .route("/admins", get(admins::list).post(admins::create))
        .route("/admins/:admin_id", post(admins::edit))
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/:user_id/addresses",
            get(users::addresses).post(users::edit_addresses),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            gate::require_session,
        ));

    Router::new()
        .route("/login", get(login::page).post(login::submit))
        .route("/logout", get(login::logout))
        .merge(protected)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 302 redirect
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

async fn index() -> Response {
    found("/projects")
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::Coin;
    use crate::gate::AUTH_COOKIE;
    use crate::store::MemoryStore;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use bigdecimal::BigDecimal;
    use serde_json::{Value, json};
    use std::str::FromStr;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"console-test-secret";

    fn state(store: &Arc<MemoryStore>) -> AppState {
        AppState::new(
            Arc::clone(store) as Arc<dyn Store>,
            SessionIssuer::new(SECRET),
            RunMode::Testing,
        )
        .with_password_cost(4)
    }

    fn session_cookie(login: &str) -> String {
        let token = SessionIssuer::new(SECRET).issue(login).unwrap().token;
        format!("{}={}", AUTH_COOKIE, token)
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn form_request(uri: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn send(state: &AppState, request: Request<Body>) -> Response {
        router(state.clone()).oneshot(request).await.unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_without_session_redirects_to_login() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);

        let response = send(&state, get_request("/", None)).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_root_with_session_redirects_to_projects() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let cookie = session_cookie("root");

        let response = send(&state, get_request("/", Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/projects");
    }

    #[tokio::test]
    async fn test_expired_session_keeps_requested_path() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let token = SessionIssuer::new(SECRET)
            .issue_at("root", Utc::now() - Duration::hours(13))
            .unwrap()
            .token;
        let cookie = format!("{}={}", AUTH_COOKIE, token);

        let response = send(&state, get_request("/projects", Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/login?path=%2Fprojects");
    }

    #[tokio::test]
    async fn test_forged_session_keeps_query_string() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let forged = SessionIssuer::new(b"someone-else").issue("root").unwrap().token;
        let cookie = format!("{}={}", AUTH_COOKIE, forged);

        let response = send(&state, get_request("/projects/3/users?sort=coin", Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            location(&response),
            "/login?path=%2Fprojects%2F3%2Fusers%3Fsort%3Dcoin"
        );
    }

    #[tokio::test]
    async fn test_login_page_is_public() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);

        let response = send(&state, get_request("/login?path=%2Fadmins", None)).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_redirects() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let password = state.credentials.add_admin("root").await.unwrap();

        let response = send(
            &state,
            form_request(
                "/login",
                None,
                &[("login", "root"), ("password", password.expose()), ("path", "/admins")],
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/admins");
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.starts_with("auth="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(!set_cookie.contains("Secure"));

        // The issued cookie opens the protected pages
        let cookie = set_cookie.split(';').next().unwrap();
        let response = send(&state, get_request("/admins", Some(cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let admins = body_json(response).await;
        assert_eq!(admins[0]["login"], "root");
    }

    #[tokio::test]
    async fn test_login_ignores_offsite_redirect() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let password = state.credentials.add_admin("root").await.unwrap();

        let response = send(
            &state,
            form_request(
                "/login",
                None,
                &[("login", "root"), ("password", password.expose()), ("path", "//evil.example")],
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        state.credentials.add_admin("root").await.unwrap();

        for (login, password) in [("root", "wrong"), ("nobody", "wrong"), ("", "")] {
            let response = send(
                &state,
                form_request("/login", None, &[("login", login), ("password", password)]),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert!(response.headers().get(header::SET_COOKIE).is_none());
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&body[..], b"invalid login or password");
        }
    }

    #[tokio::test]
    async fn test_logout_expires_cookie() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let cookie = session_cookie("root");

        let response = send(&state, get_request("/logout", Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/login");
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("auth=;"));
        assert!(set_cookie.contains("1970"));
    }

    #[tokio::test]
    async fn test_projects_listing() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let beta = store.project_add("beta").await.unwrap();
        let alpha = store.project_add("alpha").await.unwrap();
        store
            .ledger_credit(alpha, "addr-1", Coin::Btc, BigDecimal::from_str("1.50000000").unwrap())
            .await;
        store
            .ledger_credit(alpha, "addr-2", Coin::Btc, BigDecimal::from_str("0.25").unwrap())
            .await;
        store
            .ledger_credit(alpha, "addr-1", Coin::Ltc, BigDecimal::from_str("-2.0").unwrap())
            .await;
        let cookie = session_cookie("root");

        let response = send(&state, get_request("/projects", Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([
                {
                    "project_id": alpha,
                    "project_name": "alpha",
                    "coins": [
                        {"coin": "BTC", "amount": "1.75"},
                        {"coin": "LTC", "amount": "-2"}
                    ]
                },
                {"project_id": beta, "project_name": "beta", "coins": []}
            ])
        );
    }

    #[tokio::test]
    async fn test_project_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let cookie = session_cookie("root");

        let response = send(
            &state,
            form_request("/projects", Some(&cookie), &[("name", "  gamma  ")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/projects");

        let listing = body_json(send(&state, get_request("/projects", Some(&cookie))).await).await;
        assert_eq!(listing[0]["project_name"], "gamma");
        let id = listing[0]["project_id"].as_i64().unwrap();

        let uri = format!("/projects/{}", id);
        let response = send(
            &state,
            form_request(&uri, Some(&cookie), &[("action", "edit"), ("name", "delta")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), format!("/projects/{}/edit", id));

        let page = body_json(
            send(&state, get_request(&format!("/projects/{}/edit", id), Some(&cookie))).await,
        )
        .await;
        assert_eq!(page["name"], "delta");

        let response = send(&state, form_request(&uri, Some(&cookie), &[("action", "remove")])).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(store.project_get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_project_input_errors() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let cookie = session_cookie("root");
        let id = store.project_add("alpha").await.unwrap();

        let response = send(&state, form_request("/projects", Some(&cookie), &[("name", " ")])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &state,
            form_request("/projects/abc", Some(&cookie), &[("action", "remove")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &state,
            form_request(&format!("/projects/{}", id), Some(&cookie), &[("action", "archive")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&state, get_request("/projects/999/edit", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_add_admin_then_login() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let cookie = session_cookie("root");

        let response = send(&state, form_request("/admins", Some(&cookie), &[("login", "ops")])).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let page = body_json(response).await;
        assert_eq!(page["login"], "ops");
        let password = page["password"].as_str().unwrap();
        assert_eq!(password.len(), 12);
        assert!(state.credentials.check_password("ops", password).await.unwrap());

        let response = send(&state, form_request("/admins", Some(&cookie), &[("login", "o ps")])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_and_remove_admin() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let cookie = session_cookie("root");
        let old = state.credentials.add_admin("ops").await.unwrap();
        let id = state.credentials.admins().await.unwrap()[0].id;
        let uri = format!("/admins/{}", id);

        let response = send(
            &state,
            form_request(&uri, Some(&cookie), &[("action", "reset-password")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        let new = page["password"].as_str().unwrap();
        assert!(state.credentials.check_password("ops", new).await.unwrap());
        assert!(!state.credentials.check_password("ops", old.expose()).await.unwrap());

        let response = send(&state, form_request(&uri, Some(&cookie), &[("action", "remove")])).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/admins");
        assert!(!state.credentials.check_password("ops", new).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_addresses_and_project_balances() {
        let store = Arc::new(MemoryStore::new());
        let state = state(&store);
        let cookie = session_cookie("root");
        let project = store.project_add("alpha").await.unwrap();

        let response = send(
            &state,
            form_request("/users", Some(&cookie), &[("email", "ann@example.com"), ("name", "Ann")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let addresses_uri = location(&response).to_string();

        let response = send(
            &state,
            form_request(
                &addresses_uri,
                Some(&cookie),
                &[("action", "add"), ("coin", "BTC"), ("address", "bc1-ann")],
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), addresses_uri);

        let page = body_json(send(&state, get_request(&addresses_uri, Some(&cookie))).await).await;
        assert_eq!(page["user"]["email"], "ann@example.com");
        assert_eq!(page["addresses"]["BTC"], json!(["bc1-ann"]));
        assert_eq!(page["coins"], json!(["BTC", "BCH", "DASH", "ETH", "LTC"]));

        store
            .ledger_credit(project, "bc1-ann", Coin::Btc, BigDecimal::from_str("0.10").unwrap())
            .await;
        let page = body_json(
            send(&state, get_request(&format!("/projects/{}/users", project), Some(&cookie))).await,
        )
        .await;
        assert_eq!(page["project"]["name"], "alpha");
        assert_eq!(
            page["balances"],
            json!([{"email": "ann@example.com", "coins": [{"coin": "BTC", "amount": "0.1"}]}])
        );

        let response = send(
            &state,
            form_request(
                &addresses_uri,
                Some(&cookie),
                &[("action", "add"), ("coin", "DOGE"), ("address", "D-ann")],
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&state, get_request("/users/999/addresses", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
