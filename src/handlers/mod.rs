//! HTTP handlers for the video API.
//!
//! Every mutating handler runs the same gates in the same order before it
//! touches the body: parse the id, authenticate the caller, load the record,
//! and check ownership.  The helpers below implement those gates.

pub mod thumbnail_upload;
pub mod video_upload;
pub mod videos;

use std::time::Duration;

use uuid::Uuid;

use crate::errors::ApiError;
use crate::metadata::VideoRecord;
use crate::AppState;

/// Parse a `{video_id}` path segment.
pub(crate) fn parse_video_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidVideoId)
}

/// Fetch a record by id, or 404.
pub(crate) async fn load_video(state: &AppState, video_id: Uuid) -> Result<VideoRecord, ApiError> {
    state
        .metadata
        .get_video(video_id)
        .await
        .map_err(ApiError::internal("Couldn't get video"))?
        .ok_or(ApiError::VideoNotFound)
}

/// Fetch a record and require that `user_id` owns it.
pub(crate) async fn load_owned_video(
    state: &AppState,
    video_id: Uuid,
    user_id: Uuid,
) -> Result<VideoRecord, ApiError> {
    let video = load_video(state, video_id).await?;
    if video.user_id != user_id {
        return Err(ApiError::NotOwner);
    }
    Ok(video)
}

/// Parse the declared content type of a multipart part.
pub(crate) fn parse_media_type(raw: Option<&str>) -> Result<mime::Mime, ApiError> {
    raw.ok_or(ApiError::InvalidContentType)?
        .parse::<mime::Mime>()
        .map_err(|_| ApiError::InvalidContentType)
}

/// Lifetime of presigned playback URLs.
pub(crate) fn signed_url_ttl(state: &AppState) -> Duration {
    Duration::from_secs(state.config.storage.signed_url_ttl_secs)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_video_id(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_video_id("not-a-uuid"), Err(ApiError::InvalidVideoId)));
        assert!(matches!(parse_video_id(""), Err(ApiError::InvalidVideoId)));
    }

    #[test]
    fn test_parse_media_type() {
        let m = parse_media_type(Some("video/mp4; codecs=\"avc1\"")).unwrap();
        assert_eq!(m.essence_str(), "video/mp4");
        assert!(matches!(parse_media_type(None), Err(ApiError::InvalidContentType)));
        assert!(matches!(
            parse_media_type(Some("not a media type")),
            Err(ApiError::InvalidContentType)
        ));
    }
}
