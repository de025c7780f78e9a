// Pool users and their payout addresses

use super::{AppState, found};
use crate::coin::Coin;
use crate::error::AppError;
use crate::gate::AdminIdentity;
use crate::store::{User, UserAddresses};
use crate::validate;
use axum::Json;
use axum::extract::{Form, Path, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
pub(super) struct NewUserForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
pub(super) struct EditAddressForm {
    #[serde(default)]
    action: String,
    #[serde(default)]
    coin: String,
    #[serde(default)]
    address: String,
}

#[derive(Serialize)]
pub(super) struct UserAddressesPage {
    user: User,
    coins: &'static [Coin],
    addresses: UserAddresses,
}

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.store.users_list().await?))
}

pub(super) async fn create(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Form(form): Form<NewUserForm>,
) -> Result<Response, AppError> {
    let email = validate::email(&form.email)?;
    let name = validate::user_name(&form.name)?;
    let id = state.store.user_add(&email, &name).await?;
    info!("{} added user {} ({})", identity.login, id, email);
    Ok(found(&format!("/users/{}/addresses", id)))
}

async fn load_user(state: &AppState, raw_id: &str) -> Result<User, AppError> {
    let id = validate::id(raw_id, "invalid user ID")?;
    state
        .store
        .user_get(id)
        .await?
        .ok_or(AppError::NotFound("user not found"))
}

pub(super) async fn addresses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserAddressesPage>, AppError> {
    let user = load_user(&state, &user_id).await?;
    let addresses = state.store.user_addresses(user.id).await?;
    Ok(Json(UserAddressesPage {
        user,
        coins: Coin::list(),
        addresses,
    }))
}

pub(super) async fn edit_addresses(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(user_id): Path<String>,
    Form(form): Form<EditAddressForm>,
) -> Result<Response, AppError> {
    let user = load_user(&state, &user_id).await?;
    let coin = validate::coin(&form.coin)?;
    let address = validate::address(&form.address)?;
    let back = format!("/users/{}/addresses", user.id);

    match form.action.as_str() {
        "add" => {
            state.store.user_address_add(user.id, coin, &address).await?;
            info!("{} added {} address for user {}", identity.login, coin, user.id);
            Ok(found(&back))
        }
        "remove" => {
            state.store.user_address_remove(user.id, coin, &address).await?;
            info!("{} removed {} address of user {}", identity.login, coin, user.id);
            Ok(found(&back))
        }
        _ => Err(AppError::BadRequest("unknown action".to_string())),
    }
}
