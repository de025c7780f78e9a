// Administrator accounts

use super::{AppState, found};
use crate::error::AppError;
use crate::gate::AdminIdentity;
use crate::store::Admin;
use crate::validate;
use axum::Json;
use axum::extract::{Form, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
pub(super) struct NewAdminForm {
    #[serde(default)]
    login: String,
}

#[derive(Deserialize)]
pub(super) struct EditAdminForm {
    #[serde(default)]
    action: String,
}

/// One-time password shown right after creation or reset
#[derive(Serialize)]
struct PasswordPage {
    login: Option<String>,
    password: String,
}

fn password_page(login: Option<String>, password: String) -> Response {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(PasswordPage { login, password }),
    )
        .into_response()
}

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<Admin>>, AppError> {
    Ok(Json(state.credentials.admins().await?))
}

pub(super) async fn create(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Form(form): Form<NewAdminForm>,
) -> Result<Response, AppError> {
    let login = validate::admin_login(&form.login)?;
    let secret = state.credentials.add_admin(&login).await?;
    info!("{} created admin {}", identity.login, login);
    Ok(password_page(Some(login), secret.into_inner()))
}

pub(super) async fn edit(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(admin_id): Path<String>,
    Form(form): Form<EditAdminForm>,
) -> Result<Response, AppError> {
    let id = validate::id(&admin_id, "invalid admin ID")?;

    match form.action.as_str() {
        "reset-password" => {
            let secret = state.credentials.reset_password(id).await?;
            info!("{} reset password of admin {}", identity.login, id);
            Ok(password_page(None, secret.into_inner()))
        }
        "remove" => {
            state.credentials.remove_admin(id).await?;
            info!("{} removed admin {}", identity.login, id);
            Ok(found("/admins"))
        }
        _ => Err(AppError::BadRequest("unknown action".to_string())),
    }
}
