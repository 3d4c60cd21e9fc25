// Route exports
pub mod drive;
pub mod faces;

use actix_multipart::MultipartError;
use actix_web::http::StatusCode;
use actix_web::{error, web, HttpResponse, Responder};
use std::sync::Arc;

use crate::engine::FaceInference;
use crate::models::HealthResponse;
use crate::services::{DriveClient, ImageFetcher};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub drive: Arc<DriveClient>,
    pub fetcher: Arc<ImageFetcher>,
    pub engine: Arc<dyn FaceInference>,
    pub max_upload_bytes: usize,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/fetch_drive_files", web::post().to(drive::fetch_drive_files))
        .route("/analyze_face", web::post().to(faces::analyze_face))
        .route("/search_faces", web::post().to(faces::search_faces));
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// JSON error response for payload errors
#[derive(Debug, serde::Serialize)]
pub struct PayloadError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for PayloadError {}

impl error::ResponseError for PayloadError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .body(serde_json::to_string(self).unwrap())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(
    err: error::JsonPayloadError,
    req: &actix_web::HttpRequest,
) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    PayloadError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle multipart form errors (missing or malformed fields)
pub fn handle_multipart_error(err: MultipartError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Multipart error on {}: {}", req.path(), err);
    PayloadError {
        error: "invalid_multipart".to_string(),
        message: format!("Invalid multipart form: {}", err),
        status_code: 400,
    }
    .into()
}
