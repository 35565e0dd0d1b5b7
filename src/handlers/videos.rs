//! Video record endpoints: create, list, and fetch.
//!
//! Records leave the server with their stored video location replaced by a
//! presigned URL.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use super::{load_video, parse_video_id, signed_url_ttl};
use crate::auth::authenticate;
use crate::errors::ApiError;
use crate::metadata::VideoRecord;
use crate::signing::sign_video;
use crate::AppState;

/// Body of `POST /api/videos`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVideoRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[utoipa::path(
    post,
    path = "/api/videos",
    tag = "Videos",
    operation_id = "CreateVideo",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Video created", body = VideoRecord),
        (status = 400, description = "Invalid body", body = crate::errors::ErrorBody),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn create_video(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateVideoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<VideoRecord>), ApiError> {
    let user_id = authenticate(&headers, &state.config.auth)?;
    let Json(req) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::InvalidInput("Title must not be empty".to_string()));
    }

    let record = VideoRecord::new(user_id, title, req.description);
    state
        .metadata
        .create_video(&record)
        .await
        .map_err(ApiError::internal("Couldn't create video"))?;

    info!(video_id = %record.id, user_id = %user_id, "video created");
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/api/videos",
    tag = "Videos",
    operation_id = "ListVideos",
    responses(
        (status = 200, description = "Caller's videos, newest first", body = [VideoRecord]),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<VideoRecord>>, ApiError> {
    let user_id = authenticate(&headers, &state.config.auth)?;
    let videos = state
        .metadata
        .list_videos(user_id)
        .await
        .map_err(ApiError::internal("Couldn't retrieve videos"))?;

    let ttl = signed_url_ttl(&state);
    let mut signed = Vec::with_capacity(videos.len());
    for video in videos {
        signed.push(
            sign_video(state.objects.as_ref(), video, ttl)
                .await
                .map_err(ApiError::internal("Couldn't generate presigned URL"))?,
        );
    }
    Ok(Json(signed))
}

#[utoipa::path(
    get,
    path = "/api/videos/{video_id}",
    tag = "Videos",
    operation_id = "GetVideo",
    params(("video_id" = String, Path, description = "Video id (UUID)")),
    responses(
        (status = 200, description = "Video with a signed playback URL", body = VideoRecord),
        (status = 400, description = "Invalid id", body = crate::errors::ErrorBody),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorBody),
        (status = 404, description = "Video not found", body = crate::errors::ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<VideoRecord>, ApiError> {
    let video_id = parse_video_id(&video_id)?;
    authenticate(&headers, &state.config.auth)?;
    let video = load_video(&state, video_id).await?;
    let signed = sign_video(state.objects.as_ref(), video, signed_url_ttl(&state))
        .await
        .map_err(ApiError::internal("Couldn't generate presigned URL"))?;
    Ok(Json(signed))
}
