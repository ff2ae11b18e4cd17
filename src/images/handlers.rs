use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::VerifiedUser,
    error::AppError,
    images::services::{upload_event_image, UploadItem, UploadedImage},
    state::AppState,
};

pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/events/image", post(upload_image))
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024)) // 5MB
}

/// POST /events/image (multipart, field `image`)
#[instrument(skip_all)]
pub async fn upload_image(
    State(state): State<AppState>,
    VerifiedUser(user): VerifiedUser,
    mut mp: Multipart,
) -> Result<Json<UploadedImage>, AppError> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        let uploaded = upload_event_image(
            &state,
            user.id,
            UploadItem {
                body,
                content_type: &content_type,
            },
        )
        .await?;
        return Ok(Json(uploaded));
    }
    Err(AppError::Validation("image field is required".into()))
}
