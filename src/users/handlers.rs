use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
    users::dto::{CreateUserRequest, MessageResponse, Pagination, UpdatePasswordRequest, UserOut},
};

const MAX_PAGE: i64 = 1000;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", get(list_users).post(create_user))
        .route("/users/me", get(get_me))
        .route("/users/:id", get(get_user))
        .route("/users/:id/password", put(update_password))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(p): ApiQuery<Pagination>,
) -> Result<Json<Vec<UserOut>>, AppError> {
    if p.skip < 0 || p.limit < 0 {
        return Err(AppError::validation("skip and limit must be non-negative"));
    }
    let users = state.users.list(p.skip, p.limit.min(MAX_PAGE)).await?;
    Ok(Json(users.into_iter().map(UserOut::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<UserOut>, AppError> {
    let user = state.users.find_by_id(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<Json<UserOut>, AppError> {
    let user = state
        .users
        .create(&payload.name, &payload.email, payload.role, &payload.password)
        .await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, Response> {
    match state
        .users
        .update_password(id, &payload.old_password, &payload.new_password)
        .await
    {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Password updated successfully",
        })),
        // a wrong old password is a bad request here, not an auth failure
        Err(e @ AppError::InvalidCredential) => {
            Err(e.respond(StatusCode::BAD_REQUEST, "Old password is incorrect"))
        }
        Err(e) => Err(e.into_response()),
    }
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
) -> Result<Json<UserOut>, AppError> {
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::TokenInvalid)?;
    Ok(Json(user.into()))
}
