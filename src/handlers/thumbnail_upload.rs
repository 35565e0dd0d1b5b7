//! `POST /api/videos/{video_id}/thumbnail`: attach a thumbnail image.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use bytes::BytesMut;
use chrono::Utc;
use metrics::counter;
use tracing::{error, info, warn};

use super::{load_owned_video, parse_media_type, parse_video_id};
use crate::auth::authenticate;
use crate::errors::ApiError;
use crate::keys::extension_for;
use crate::metadata::VideoRecord;
use crate::metrics::UPLOADS_TOTAL;
use crate::storage::thumbnail::ThumbnailUpload;
use crate::AppState;

/// Form field carrying the image.
pub const THUMBNAIL_FIELD: &str = "thumbnail";

/// Accepted image types and their stored extensions.
fn image_extension(essence: &str) -> Option<&'static str> {
    match essence {
        "image/jpeg" | "image/png" | "image/gif" => extension_for(essence),
        _ => None,
    }
}

#[utoipa::path(
    post,
    path = "/api/videos/{video_id}/thumbnail",
    tag = "Videos",
    operation_id = "UploadThumbnail",
    params(("video_id" = String, Path, description = "Video id (UUID)")),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Thumbnail stored", body = VideoRecord),
        (status = 400, description = "Invalid id, form, or media type", body = crate::errors::ErrorBody),
        (status = 401, description = "Not authenticated or not the owner", body = crate::errors::ErrorBody),
        (status = 404, description = "Video not found", body = crate::errors::ErrorBody),
        (status = 413, description = "Image too large", body = crate::errors::ErrorBody),
        (status = 500, description = "Internal error", body = crate::errors::ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn upload_thumbnail(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VideoRecord>, ApiError> {
    let result = handle_upload(&state, &video_id, &headers, multipart).await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    counter!(UPLOADS_TOTAL, "kind" => "thumbnail", "outcome" => outcome).increment(1);
    result.map(Json)
}

async fn handle_upload(
    state: &AppState,
    video_id: &str,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<VideoRecord, ApiError> {
    let video_id = parse_video_id(video_id)?;
    let user_id = authenticate(headers, &state.config.auth)?;
    let mut video = load_owned_video(state, video_id, user_id).await?;

    let (media_type, extension, data) =
        read_thumbnail_part(multipart?, state.thumbnails.max_bytes()).await?;

    let stored = state
        .thumbnails
        .store(ThumbnailUpload {
            video_id,
            media_type,
            extension,
            data: data.freeze(),
        })
        .await
        .map_err(ApiError::internal("Couldn't save thumbnail"))?;

    video.thumbnail_url = Some(stored.url.clone());
    video.updated_at = Utc::now();
    if let Err(e) = state.metadata.update_video(&video).await {
        if let Err(discard_err) = state.thumbnails.discard(&stored).await {
            error!(video_id = %video_id, error = ?discard_err, "failed to discard thumbnail");
        }
        return Err(ApiError::internal("Couldn't update video metadata")(e));
    }
    if let Err(e) = state.thumbnails.commit(&stored).await {
        warn!(video_id = %video_id, error = ?e, "failed to drop replaced thumbnail backup");
    }

    info!(video_id = %video_id, "thumbnail uploaded");
    Ok(video)
}

/// Find the `thumbnail` part, validate it, and buffer at most `max_bytes`.
async fn read_thumbnail_part(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<(String, &'static str, BytesMut), ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(THUMBNAIL_FIELD) {
            continue;
        }

        let media_type = parse_media_type(field.content_type())?;
        let essence = media_type.essence_str();
        let extension = image_extension(essence)
            .ok_or_else(|| ApiError::UnsupportedMediaType(essence.to_string()))?;

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            if data.len() + chunk.len() > max_bytes {
                return Err(ApiError::PayloadTooLarge);
            }
            data.extend_from_slice(&chunk);
        }
        return Ok((essence.to_string(), extension, data));
    }
    Err(ApiError::MissingFile(THUMBNAIL_FIELD))
}
