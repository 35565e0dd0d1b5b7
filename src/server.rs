//! Axum router construction.
//!
//! The [`app`] function wires every endpoint to its handler and returns a
//! ready-to-serve [`axum::Router`].  Upload routes carry their own body
//! limits; everything else keeps axum's default.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header::CONTENT_LENGTH, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::errors::ApiError;
use crate::handlers::{thumbnail_upload, video_upload, videos};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI document ---------------------------------------------------------

/// OpenAPI documentation for the Tubely API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tubely API",
        version = "0.1.0",
        description = "Video hosting: uploads, thumbnails, and signed playback URLs"
    ),
    paths(
        health_check,
        videos::create_video,
        videos::list_videos,
        videos::get_video,
        video_upload::upload_video,
        thumbnail_upload::upload_thumbnail,
    ),
    components(schemas(
        crate::metadata::VideoRecord,
        crate::errors::ErrorBody,
        videos::CreateVideoRequest,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Videos", description = "Video records and uploads"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Reject a request whose declared `Content-Length` exceeds `limit` before
/// the handler reads any of the body.
async fn reject_declared_oversize(
    State(limit): State<usize>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    match declared {
        Some(len) if len > limit as u64 => ApiError::PayloadTooLarge.into_response(),
        _ => next.run(req).await,
    }
}

/// Build the axum [`Router`] with all routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let video_limit = state.config.uploads.max_video_bytes;
    let thumbnail_limit = state.config.uploads.max_thumbnail_bytes;

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_json))
        .route(
            "/api/videos",
            post(videos::create_video).get(videos::list_videos),
        )
        .route("/api/videos/:video_id", get(videos::get_video))
        .route(
            "/api/videos/:video_id/video",
            post(video_upload::upload_video)
                // Undeclared lengths are capped while the multipart stream is read.
                .layer::<_, Infallible>(DefaultBodyLimit::max(video_limit))
                .layer::<_, Infallible>(middleware::from_fn_with_state(
                    video_limit,
                    reject_declared_oversize,
                )),
        )
        .route(
            "/api/videos/:video_id/thumbnail",
            post(thumbnail_upload::upload_thumbnail)
                // Undeclared lengths are capped while the multipart stream is read.
                .layer::<_, Infallible>(DefaultBodyLimit::max(thumbnail_limit))
                .layer::<_, Infallible>(middleware::from_fn_with_state(
                    thumbnail_limit,
                    reject_declared_oversize,
                )),
        )
        .nest_service(
            "/assets",
            ServeDir::new(&state.config.thumbnails.assets_root),
        );

    if state.config.observability.metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        // Application state shared across all handlers.
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // metrics_middleware is outer (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Health check ------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    use crate::handlers::test_support::{json_body, HarnessBuilder};

    #[tokio::test]
    async fn test_health() {
        let h = HarnessBuilder::new().build();
        let response = h
            .send(Request::get("/health").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_openapi_document_lists_routes() {
        let h = HarnessBuilder::new().build();
        let response = h
            .send(Request::get("/openapi.json").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let paths = json["paths"].as_object().unwrap();
        for path in [
            "/health",
            "/api/videos",
            "/api/videos/{video_id}",
            "/api/videos/{video_id}/video",
            "/api/videos/{video_id}/thumbnail",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(json["components"]["securitySchemes"]["bearer"].is_object());
    }

    #[tokio::test]
    async fn test_metrics_route_toggle() {
        let h = HarnessBuilder::new()
            .configure(|c| c.observability.metrics = false)
            .build();
        let response = h
            .send(Request::get("/metrics").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let h = HarnessBuilder::new().build();
        let response = h
            .send(Request::get("/nope").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
