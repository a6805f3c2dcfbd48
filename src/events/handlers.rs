use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{dto::MessageResponse, jwt::AuthUser},
    error::{ApiError, ApiResult},
    events::{
        dto::{CreateEventRequest, EventPatch, EventView},
        repo::Event,
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/:id", get(get_event))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/:id", put(update_event).delete(delete_event))
}

#[instrument(skip(state))]
pub async fn list_events(State(state): State<AppState>) -> ApiResult<Json<Vec<EventView>>> {
    let events = Event::list_all(&state.db).await?;
    Ok(Json(events.into_iter().map(EventView::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<EventView>> {
    let event = Event::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;
    Ok(Json(event.into()))
}

#[instrument(skip(state, payload))]
pub async fn create_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<EventView>)> {
    let new = payload.into_new_event()?;
    let event = Event::create(&state.db, user_id, &new).await?;
    info!(event_id = event.id, user_id, "event created");
    Ok((StatusCode::CREATED, Json(event.into())))
}

#[instrument(skip(state, patch))]
pub async fn update_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(patch): Json<EventPatch>,
) -> ApiResult<Json<EventView>> {
    let mut event = Event::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;

    if event.user_id != user_id {
        warn!(event_id = id, user_id, owner_id = event.user_id, "update by non-owner");
        return Err(ApiError::Forbidden("Not authorized".into()));
    }

    patch.apply(&mut event)?;
    let event = event.update(&state.db).await?;
    info!(event_id = event.id, user_id, "event updated");
    Ok(Json(event.into()))
}

#[instrument(skip(state))]
pub async fn delete_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let event = Event::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;

    if event.user_id != user_id {
        warn!(event_id = id, user_id, owner_id = event.user_id, "delete by non-owner");
        return Err(ApiError::Forbidden("Not authorized".into()));
    }

    Event::delete(&state.db, id).await?;
    info!(event_id = id, user_id, "event deleted");
    Ok(Json(MessageResponse {
        message: "Event deleted".into(),
    }))
}
