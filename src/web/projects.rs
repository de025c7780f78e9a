// Projects and their balances

use super::{AppState, found};
use crate::balance::{self, ProjectBalance, UserBalance};
use crate::error::AppError;
use crate::gate::AdminIdentity;
use crate::store::Project;
use crate::validate;
use axum::Json;
use axum::extract::{Form, Path, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
pub(super) struct NewProjectForm {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
pub(super) struct EditProjectForm {
    #[serde(default)]
    action: String,
    #[serde(default)]
    name: String,
}

#[derive(Serialize)]
pub(super) struct ProjectUsersPage {
    project: Project,
    balances: Vec<UserBalance>,
}

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<ProjectBalance>>, AppError> {
    let balances = balance::projects_balances(state.store.as_ref()).await?;
    Ok(Json(balances))
}

pub(super) async fn create(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Form(form): Form<NewProjectForm>,
) -> Result<Response, AppError> {
    let name = validate::project_name(&form.name)?;
    let id = state.store.project_add(&name).await?;
    info!("{} added project {} ({})", identity.login, id, name);
    Ok(found("/projects"))
}

async fn load_project(state: &AppState, raw_id: &str) -> Result<Project, AppError> {
    let id = validate::id(raw_id, "invalid project ID")?;
    state
        .store
        .project_get(id)
        .await?
        .ok_or(AppError::NotFound("project not found"))
}

pub(super) async fn edit_page(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, AppError> {
    let project = load_project(&state, &project_id).await?;
    Ok(Json(project))
}

pub(super) async fn users(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectUsersPage>, AppError> {
    let project = load_project(&state, &project_id).await?;
    let balances = balance::project_users_balances(state.store.as_ref(), project.id).await?;
    Ok(Json(ProjectUsersPage { project, balances }))
}

pub(super) async fn edit(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(project_id): Path<String>,
    Form(form): Form<EditProjectForm>,
) -> Result<Response, AppError> {
    let id = validate::id(&project_id, "invalid project ID")?;

    match form.action.as_str() {
        "edit" => {
            let name = validate::project_name(&form.name)?;
            state.store.project_set_name(id, &name).await?;
            info!("{} renamed project {} to {}", identity.login, id, name);
            Ok(found(&format!("/projects/{}/edit", id)))
        }
        "remove" => {
            state.store.project_remove(id).await?;
            info!("{} removed project {}", identity.login, id);
            Ok(found("/projects"))
        }
        _ => Err(AppError::BadRequest("unknown action".to_string())),
    }
}
