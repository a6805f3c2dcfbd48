use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{dto::MessageResponse, jwt::AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
    users::{
        dto::PublicUser,
        repo::{ProfilePatch, User},
    },
};

pub fn me_routes() -> Router<AppState> {
    Router::new().route(
        "/users/me",
        get(get_profile).put(update_profile).delete(delete_account),
    )
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, patch))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(patch): Json<ProfilePatch>,
) -> ApiResult<Json<PublicUser>> {
    let user = User::update_profile(&state.db, user_id, &patch).await?;
    info!(user_id, "profile updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<MessageResponse>> {
    User::delete_with_events(&state.db, user_id).await?;
    info!(user_id, "account deleted");
    Ok(Json(MessageResponse {
        message: "Account deleted".into(),
    }))
}
