//! Author handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use blog_core::domain::User;
use blog_core::error::RepoError;
use blog_shared::dto::{CreateUserRequest, UserResponse};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn user_response(user: User) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        created_at: user.created_at,
    }
}

fn not_found(id: Uuid) -> impl FnOnce(RepoError) -> AppError {
    move |err| match err {
        RepoError::NotFound => AppError::NotFound(format!("User {id} not found")),
        other => other.into(),
    }
}

/// POST /api/users
pub async fn create_user(
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let user = state.users.create(User::new(req.username, req.email)).await?;

    tracing::info!(user_id = %user.id, "Registered author");
    Ok(HttpResponse::Created().json(user_response(user)))
}

/// GET /api/users/{id}
pub async fn get_user(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let user = state.users.get(id).await.map_err(not_found(id))?;
    Ok(HttpResponse::Ok().json(user_response(user)))
}

/// DELETE /api/users/{id} - removes the author and every post they wrote.
pub async fn delete_user(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    state.users.delete(id).await.map_err(not_found(id))?;
    Ok(HttpResponse::NoContent().finish())
}
