use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::MessageResponse,
        extractors::{AuthUser, VerifiedUser},
    },
    error::{AppError, AppJson},
    events::{
        dto::{
            CreateEventRequest, EventEnvelope, EventListResponse, EventResponse, RsvpResponse,
            UpdateEventRequest,
        },
        realtime::rsvp_stream,
        services,
    },
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/stream", get(rsvp_stream))
        .route("/events/:id", get(get_event))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/events/create", post(create_event))
        .route("/events/:id", axum::routing::put(update_event).delete(delete_event))
        .route("/events/:id/rsvp", post(toggle_rsvp))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_events(State(state): State<AppState>) -> Result<Json<EventListResponse>, AppError> {
    Ok(Json(services::list_events(&state).await?))
}

#[instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, AppError> {
    Ok(Json(services::get_event(&state, &id).await?))
}

#[instrument(skip(state, user, payload))]
pub async fn create_event(
    State(state): State<AppState>,
    VerifiedUser(user): VerifiedUser,
    AppJson(payload): AppJson<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventEnvelope>), AppError> {
    let created = services::create_event(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, user, payload))]
pub async fn update_event(
    State(state): State<AppState>,
    VerifiedUser(user): VerifiedUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateEventRequest>,
) -> Result<Json<EventEnvelope>, AppError> {
    Ok(Json(services::update_event(&state, &user, &id, payload).await?))
}

#[instrument(skip(state, user))]
pub async fn delete_event(
    State(state): State<AppState>,
    VerifiedUser(user): VerifiedUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    Ok(Json(services::delete_event(&state, &user, &id).await?))
}

/// POST /events/:id/rsvp flips the caller's interest in the event.
#[instrument(skip(state, user))]
pub async fn toggle_rsvp(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RsvpResponse>, AppError> {
    Ok(Json(services::toggle_rsvp(&state, &user, &id).await?))
}
