//! User profile endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::{error_response, ApiState, AuthenticatedUser};
use crate::identity::{ProfileUpdate, User};

/// GET /users/{id}
pub async fn get_user(
    State(state): State<ApiState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<User>, (StatusCode, String)> {
    let user = state.identity.get_user(&id).await.map_err(error_response)?;
    Ok(Json(user))
}

/// PUT /users/{id} - Callers may only edit their own profile
pub async fn update_user(
    State(state): State<ApiState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, (StatusCode, String)> {
    let updated = state
        .identity
        .update_profile(user.address(), &id, update)
        .await
        .map_err(error_response)?;
    Ok(Json(updated))
}

pub fn create_user_router(state: ApiState) -> Router {
    Router::new()
        .route("/users/{id}", get(get_user).put(update_user))
        .with_state(state)
}
