use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::models::{DriveListRequest, ErrorResponse};
use crate::services::DriveError;

use super::AppState;

/// Drive folder listing proxy
///
/// POST /fetch_drive_files
///
/// Request body:
/// ```json
/// {
///   "folderId": "string",
///   "nextPageToken": "string"
/// }
/// ```
///
/// Relays the provider's listing JSON verbatim on success; any provider or
/// transport failure becomes a 500 with the provider's message.
pub async fn fetch_drive_files(
    state: web::Data<AppState>,
    req: web::Json<DriveListRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for fetch_drive_files request: {:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "Validation failed",
            errors.to_string(),
            400,
        ));
    }

    tracing::info!("Listing Drive folder: {}", req.folder_id);

    match state
        .drive
        .list_folder(&req.folder_id, req.next_page_token.as_deref())
        .await
    {
        Ok(listing) => HttpResponse::Ok().json(listing),
        Err(DriveError::MissingApiKey) => {
            tracing::error!("Drive listing requested but no API key is configured");
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                "Google API Key is not defined",
                "Set MY_GOOGLE_API_KEY in the environment",
                500,
            ))
        }
        Err(e) => {
            tracing::error!("Drive listing failed for {}: {}", req.folder_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                e.to_string(),
                "Failed to fetch drive files",
                500,
            ))
        }
    }
}
