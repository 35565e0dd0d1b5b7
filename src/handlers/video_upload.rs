//! `POST /api/videos/{video_id}/video`: upload the video file of a record.
//!
//! The part is streamed to a staged file on local disk, optionally probed
//! for its aspect ratio, then streamed from disk to the object store.  The
//! record keeps the `<bucket>,<key>` location; read paths sign it later.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use metrics::counter;
use tracing::{debug, info, warn};

use super::{load_owned_video, parse_media_type, parse_video_id};
use crate::auth::authenticate;
use crate::errors::ApiError;
use crate::keys::{generate_key, KeyEncoding};
use crate::media::AspectRatio;
use crate::metadata::VideoRecord;
use crate::metrics::UPLOADS_TOTAL;
use crate::signing::ObjectLocation;
use crate::staging::StagedFile;
use crate::AppState;

/// Form field carrying the video file.
pub const VIDEO_FIELD: &str = "video";

/// The only accepted media type.
const VIDEO_MEDIA_TYPE: &str = "video/mp4";

#[utoipa::path(
    post,
    path = "/api/videos/{video_id}/video",
    tag = "Videos",
    operation_id = "UploadVideo",
    params(("video_id" = String, Path, description = "Video id (UUID)")),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video stored", body = VideoRecord),
        (status = 400, description = "Invalid id, form, or media type", body = crate::errors::ErrorBody),
        (status = 401, description = "Not authenticated or not the owner", body = crate::errors::ErrorBody),
        (status = 404, description = "Video not found", body = crate::errors::ErrorBody),
        (status = 413, description = "Upload too large", body = crate::errors::ErrorBody),
        (status = 500, description = "Internal error", body = crate::errors::ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VideoRecord>, ApiError> {
    let result = handle_upload(&state, &video_id, &headers, multipart).await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    counter!(UPLOADS_TOTAL, "kind" => "video", "outcome" => outcome).increment(1);
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

    let mut staged = stage_video_part(state, multipart?).await?;
    debug!(video_id = %video_id, bytes = staged.len(), "video staged");

    let folder = if state.config.media.classify_aspect_ratio {
        let dims = state
            .prober
            .probe(staged.path())
            .await
            .map_err(ApiError::internal("Couldn't determine aspect ratio"))?;
        let aspect = AspectRatio::classify(dims.width, dims.height);
        debug!(width = dims.width, height = dims.height, aspect = %aspect, "video probed");
        Some(aspect.folder())
    } else {
        None
    };

    staged
        .rewind()
        .await
        .map_err(ApiError::internal("Couldn't reset file pointer"))?;

    let file_key = generate_key(KeyEncoding::Hex, "mp4")
        .map_err(ApiError::internal("Couldn't generate object key"))?;
    let key = match folder {
        Some(folder) => format!("{folder}/{file_key}"),
        None => file_key,
    };

    let location = ObjectLocation::new(&state.config.storage.bucket, key);
    let body = staged
        .body()
        .await
        .map_err(ApiError::internal("Couldn't read staged file"))?;
    state
        .objects
        .put_object(&location.bucket, &location.key, body, VIDEO_MEDIA_TYPE)
        .await
        .map_err(ApiError::internal("Couldn't upload file to object storage"))?;

    video.video_url = Some(location.encode());
    video.updated_at = Utc::now();
    if let Err(e) = state.metadata.update_video(&video).await {
        warn!(
            video_id = %video_id,
            bucket = %location.bucket,
            key = %location.key,
            "video object orphaned by failed metadata update"
        );
        return Err(ApiError::internal("Couldn't update video metadata")(e));
    }

    info!(video_id = %video_id, location = %location, bytes = staged.len(), "video uploaded");
    Ok(video)
}

/// Find the `video` part, validate its media type, and stream it to disk.
async fn stage_video_part(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<StagedFile, ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let media_type = parse_media_type(field.content_type())?;
        if media_type.essence_str() != VIDEO_MEDIA_TYPE {
            return Err(ApiError::UnsupportedMediaType(
                media_type.essence_str().to_string(),
            ));
        }

        let mut staged = StagedFile::create(&state.config.uploads.staging_dir(), ".mp4")
            .map_err(ApiError::internal("Couldn't create temporary file"))?;
        while let Some(chunk) = field.chunk().await? {
            staged
                .write_chunk(&chunk)
                .await
                .map_err(ApiError::internal("Couldn't save file"))?;
        }
        staged
            .flush()
            .await
            .map_err(ApiError::internal("Couldn't save file"))?;
        return Ok(staged);
    }
    Err(ApiError::MissingFile(VIDEO_FIELD))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use uuid::Uuid;

    use super::*;
    use crate::handlers::test_support::*;
    use crate::media::Dimensions;
    use crate::metadata::memory::MemoryMetadataStore;

    const MP4: &[u8] = b"\x00\x00\x00\x18ftypmp42fake video payload";

    fn uri(id: impl std::fmt::Display) -> String {
        format!("/api/videos/{id}/video")
    }

    fn mp4_form() -> Vec<u8> {
        multipart_body("video", "boots.mp4", Some("video/mp4"), MP4)
    }

    #[tokio::test]
    async fn test_upload_stores_object_and_location() {
        let h = HarnessBuilder::new().build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), mp4_form()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;

        let stored = h.stored(video.id).await;
        let raw = stored.video_url.clone().unwrap();
        assert_eq!(json["video_url"], raw);
        assert!(stored.updated_at >= video.updated_at);

        let location = ObjectLocation::decode(&raw).unwrap();
        assert_eq!(location.bucket, "tubely-videos");
        let (folder, file) = location.key.split_once('/').unwrap();
        assert_eq!(folder, "landscape");
        let stem = file.strip_suffix(".mp4").unwrap();
        assert_eq!(stem.len(), 64);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));

        let object = h.objects.get(&location.bucket, &location.key).await.unwrap();
        assert_eq!(object.data.as_ref(), MP4);
        assert_eq!(object.content_type, "video/mp4");
        assert_eq!(h.staging_entries(), 0);
    }

    #[tokio::test]
    async fn test_portrait_video_filed_under_portrait() {
        let h = HarnessBuilder::new()
            .prober(FixedProber(Dimensions {
                width: 1080,
                height: 1920,
            }))
            .build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), mp4_form()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let raw = h.stored(video.id).await.video_url.unwrap();
        assert!(raw.starts_with("tubely-videos,portrait/"));
    }

    #[tokio::test]
    async fn test_classification_disabled_uses_flat_key() {
        let h = HarnessBuilder::new()
            .configure(|c| c.media.classify_aspect_ratio = false)
            .prober(BrokenProber)
            .build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), mp4_form()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let raw = h.stored(video.id).await.video_url.unwrap();
        let key = ObjectLocation::decode(&raw).unwrap().key;
        assert!(!key.contains('/'));
        assert_eq!(key.len(), 64 + 4);
    }

    #[tokio::test]
    async fn test_repeat_uploads_get_distinct_keys() {
        let h = HarnessBuilder::new().build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;
        let token = h.token(owner);

        h.send(upload_request(&uri(video.id), Some(&token), mp4_form())).await;
        let first = h.stored(video.id).await.video_url.unwrap();
        h.send(upload_request(&uri(video.id), Some(&token), mp4_form())).await;
        let second = h.stored(video.id).await.video_url.unwrap();
        assert_ne!(first, second);
        assert_eq!(h.objects.keys("tubely-videos").await.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_id_is_400_before_auth() {
        let h = HarnessBuilder::new().build();
        let response = h.send(upload_request(&uri("not-a-uuid"), None, mp4_form())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid video ID");
    }

    #[tokio::test]
    async fn test_missing_token_is_401() {
        let h = HarnessBuilder::new().build();
        let video = h.seed_video(Uuid::new_v4()).await;
        let response = h.send(upload_request(&uri(video.id), None, mp4_form())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(h.staging_entries(), 0);
    }

    #[tokio::test]
    async fn test_unknown_video_is_404() {
        let h = HarnessBuilder::new().build();
        let owner = Uuid::new_v4();
        let response = h
            .send(upload_request(&uri(Uuid::new_v4()), Some(&h.token(owner)), mp4_form()))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_owner_rejected_and_record_untouched() {
        let h = HarnessBuilder::new().build();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let video = h.seed_video(owner).await;

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(intruder)), mp4_form()))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(h.stored(video.id).await, video);
        assert!(h.objects.keys("tubely-videos").await.is_empty());
        assert_eq!(h.staging_entries(), 0);
    }

    #[tokio::test]
    async fn test_quicktime_rejected() {
        let h = HarnessBuilder::new().build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;
        let form = multipart_body("video", "boots.mov", Some("video/quicktime"), MP4);

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), form))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.stored(video.id).await, video);
        assert_eq!(h.staging_entries(), 0);
    }

    #[tokio::test]
    async fn test_filename_does_not_influence_type_or_key() {
        let h = HarnessBuilder::new().build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;
        let form = multipart_body("video", "../../etc/passwd.mp4", Some("video/mp4"), MP4);

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), form))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let raw = h.stored(video.id).await.video_url.unwrap();
        assert!(!raw.contains("passwd"));
    }

    #[tokio::test]
    async fn test_missing_content_type_is_400() {
        let h = HarnessBuilder::new().build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;
        let form = multipart_body("video", "boots.mp4", None, MP4);

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), form))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_field_name_is_400() {
        let h = HarnessBuilder::new().build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;
        let form = multipart_body("file", "boots.mp4", Some("video/mp4"), MP4);

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), form))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Missing file in form field `video`"
        );
    }

    #[tokio::test]
    async fn test_oversized_body_is_413_without_staging() {
        let h = HarnessBuilder::new()
            .configure(|c| c.uploads.max_video_bytes = 1024)
            .build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;
        let form = multipart_body("video", "big.mp4", Some("video/mp4"), &vec![0u8; 4096]);

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), form))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            json_body(response).await["error"],
            "Upload exceeds the size limit"
        );
        assert_eq!(h.staging_entries(), 0);
        assert!(h.stored(video.id).await.video_url.is_none());
    }

    #[tokio::test]
    async fn test_undeclared_length_overrun_is_413() {
        let h = HarnessBuilder::new()
            .configure(|c| c.uploads.max_video_bytes = 1024)
            .build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;
        let form = multipart_body("video", "big.mp4", Some("video/mp4"), &vec![0u8; 4096]);

        let mut request = upload_request(&uri(video.id), Some(&h.token(owner)), form);
        request.headers_mut().remove("content-length");

        let response = h.send(request).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            json_body(response).await["error"],
            "Upload exceeds the size limit"
        );
        assert_eq!(h.staging_entries(), 0);
        assert!(h.objects.keys("tubely-videos").await.is_empty());
        assert!(h.stored(video.id).await.video_url.is_none());
    }

    #[tokio::test]
    async fn test_probe_failure_is_500_and_cleans_up() {
        let h = HarnessBuilder::new().prober(BrokenProber).build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), mp4_form()))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["error"],
            "Couldn't determine aspect ratio"
        );
        assert_eq!(h.staging_entries(), 0);
        assert!(h.objects.keys("tubely-videos").await.is_empty());
    }

    #[tokio::test]
    async fn test_object_store_failure_is_500_and_record_untouched() {
        let h = HarnessBuilder::new().objects(FailingObjectStore).build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), mp4_form()))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(h.stored(video.id).await, video);
        assert_eq!(h.staging_entries(), 0);
    }

    #[tokio::test]
    async fn test_metadata_failure_leaves_object_in_place() {
        let h = HarnessBuilder::new()
            .metadata(ReadOnlyMetadata(MemoryMetadataStore::new()))
            .build();
        let owner = Uuid::new_v4();
        let video = h.seed_video(owner).await;

        let response = h
            .send(upload_request(&uri(video.id), Some(&h.token(owner)), mp4_form()))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(h.stored(video.id).await.video_url.is_none());
        assert_eq!(h.objects.keys("tubely-videos").await.len(), 1);
        assert_eq!(h.staging_entries(), 0);
    }
}
