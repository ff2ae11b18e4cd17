use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub struct UploadItem<'a> {
    pub body: Bytes,
    pub content_type: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UploadedImage {
    pub url: String,
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

pub async fn upload_event_image(
    st: &AppState,
    user_id: Uuid,
    image: UploadItem<'_>,
) -> Result<UploadedImage, AppError> {
    let storage = st
        .storage
        .as_ref()
        .ok_or_else(|| AppError::Misconfigured("image storage is not configured".into()))?;
    let ext = ext_from_mime(image.content_type).ok_or_else(|| {
        AppError::Validation("Only jpg, jpeg, png, webp and gif images are allowed".into())
    })?;
    if image.body.is_empty() {
        return Err(AppError::Validation("Uploaded image is empty".into()));
    }

    let key = format!("event-images/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    storage
        .put_object(&key, image.body, image.content_type)
        .await
        .map_err(|e| AppError::Upstream(e.context(format!("put_object {}", key))))?;

    let url = storage.public_url(&key);
    info!(%user_id, %key, "event image uploaded");
    Ok(UploadedImage { url })
}
