//! REST API handlers for the dashboard
//!
//! JSON endpoints for login links, projects and tasks. Authentication is
//! an access token, taken from the `Access-Token` header or the
//! `SESSION_TOKEN` cookie.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::adapters::email::Email;
use crate::agents::catalog::{email_agent, EmailDraft};
use crate::domain::{NewTask, Project, Task, TaskType, TaskUpdate, User};
use crate::persistence::Storage;
use crate::AppState;

/// Resolve the requesting user from the access token, if any
pub(crate) async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = headers
        .get("Access-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| cookie_value(headers, "SESSION_TOKEN"));

    let user_id = state.tokens.verify_access_token(&token?)?;
    state
        .storage
        .get_user_by_id(user_id)
        .await
        .ok()
        .flatten()
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

fn internal(context: &str) -> impl Fn(crate::persistence::PersistenceError) -> StatusCode + '_ {
    move |e| {
        error!(error = %e, "{} failed", context);
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Load a task and check the requester owns it
async fn owned_task(
    state: &AppState,
    user: &User,
    task_id: i64,
) -> Result<(Task, Project), StatusCode> {
    let task = state
        .storage
        .get_task(task_id)
        .await
        .map_err(internal("get_task"))?
        .ok_or(StatusCode::NOT_FOUND)?;
    let project = state
        .storage
        .get_project(task.project_id)
        .await
        .map_err(internal("get_project"))?
        .ok_or(StatusCode::NOT_FOUND)?;
    if project.user_id != user.id {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok((task, project))
}

// --- auth ---

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

/// `POST /api/login`: email a signed login link. The response never
/// reveals whether the address is known.
pub async fn request_login_link(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Json<Value> {
    let email = body.email.trim().to_lowercase();
    let token = state.tokens.generate_login_token(&email);
    let link = format!("{}/api/verify?token={}", state.public_url, token);

    match &state.mailer {
        Some(mailer) => {
            let mailer = mailer.clone();
            tokio::spawn(async move {
                if let Err(e) = mailer.send(Email::login_link(&email, &link)).await {
                    warn!(error = %e, "login email failed");
                }
            });
        }
        None => info!(%link, "smtp not configured; login link logged"),
    }

    Json(json!({ "message": "Login link sent to email" }))
}

#[derive(Deserialize)]
pub struct VerifyParams {
    pub token: String,
}

/// `GET /api/verify`: trade a login token for an access token,
/// registering the user on first login.
pub async fn verify_login_token(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<Value>, StatusCode> {
    let email = state
        .tokens
        .verify_login_token(&params.token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user = state
        .storage
        .get_user_by_email(&email)
        .await
        .map_err(internal("get_user_by_email"))?;
    let user_id = match user {
        Some(user) => user.id,
        None => state
            .storage
            .insert_user(&email, Some(&email))
            .await
            .map_err(internal("insert_user"))?,
    };

    Ok(Json(json!({
        "access_token": state.tokens.generate_access_token(user_id)
    })))
}

// --- projects ---

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

pub async fn list_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Project>>, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let projects = state
        .storage
        .get_projects_by_user(user.id)
        .await
        .map_err(internal("get_projects_by_user"))?;
    Ok(Json(projects))
}

pub async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateProjectRequest>,
) -> Result<Json<Project>, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let project_id = state
        .storage
        .insert_project(user.id, &body.name)
        .await
        .map_err(internal("insert_project"))?;
    let project = state
        .storage
        .get_project(project_id)
        .await
        .map_err(internal("get_project"))?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let project = state
        .storage
        .get_project(project_id)
        .await
        .map_err(internal("get_project"))?
        .ok_or(StatusCode::NOT_FOUND)?;
    if project.user_id != user.id {
        return Err(StatusCode::FORBIDDEN);
    }
    state
        .storage
        .delete_project(project_id)
        .await
        .map_err(internal("delete_project"))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- tasks ---

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub task_type: Option<TaskType>,
}

pub async fn list_project_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<Task>>, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let project = state
        .storage
        .get_project(project_id)
        .await
        .map_err(internal("get_project"))?
        .ok_or(StatusCode::NOT_FOUND)?;
    if project.user_id != user.id {
        return Err(StatusCode::FORBIDDEN);
    }
    let tasks = state
        .storage
        .get_tasks_by_project(project_id)
        .await
        .map_err(internal("get_tasks_by_project"))?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project_id): Path<i64>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Json<Task>, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let project = state
        .storage
        .get_project(project_id)
        .await
        .map_err(internal("get_project"))?
        .ok_or(StatusCode::NOT_FOUND)?;
    if project.user_id != user.id {
        return Err(StatusCode::FORBIDDEN);
    }

    let task_id = state
        .storage
        .insert_task(NewTask {
            project_id,
            title: body.title,
            description: body.description,
            due_date: body.due_date,
            priority: body.priority.unwrap_or(1),
            task_type: body.task_type.unwrap_or_default(),
        })
        .await
        .map_err(internal("insert_task"))?;
    let task = state
        .storage
        .get_task(task_id)
        .await
        .map_err(internal("get_task"))?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(task))
}

pub async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Result<Json<Task>, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let (task, _) = owned_task(&state, &user, task_id).await?;
    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    owned_task(&state, &user, task_id).await?;

    state
        .storage
        .update_task(task_id, update)
        .await
        .map_err(internal("update_task"))?;
    let task = state
        .storage
        .get_task(task_id)
        .await
        .map_err(internal("get_task"))?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    owned_task(&state, &user, task_id).await?;
    state
        .storage
        .delete_task(task_id)
        .await
        .map_err(internal("delete_task"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/tasks/{id}/email-draft`: draft the email an email-type
/// task calls for
pub async fn draft_task_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Result<Json<EmailDraft>, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let (task, project) = owned_task(&state, &user, task_id).await?;

    let mut agent = email_agent(state.model.clone(), &user);
    let draft = agent
        .send_typed::<EmailDraft>(&format!(
            "I need you to write an email for the {} project. Here are some more specific \
             instructions:\n{}\n{}",
            project.name,
            task.title,
            task.description.as_deref().unwrap_or_default()
        ))
        .await
        .map_err(|e| {
            error!(error = %e, "email draft failed");
            StatusCode::BAD_GATEWAY
        })?;
    Ok(Json(draft))
}

/// `GET /api/me/top-task`: the user's most pressing task
pub async fn top_task(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    let user = current_user(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let task = state
        .storage
        .top_task(user.id)
        .await
        .map_err(internal("top_task"))?;
    Ok(Json(json!({ "task": task })))
}
