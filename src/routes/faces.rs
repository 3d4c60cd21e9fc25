use actix_multipart::form::MultipartForm;
use actix_web::{web, HttpResponse, Responder};

use crate::core::{analyze_reference, compare_targets, AnalyzeError};
use crate::engine::preprocess;
use crate::models::{AnalyzeFaceForm, ErrorResponse, SearchFacesForm};

use super::AppState;

/// Demographic analysis endpoint
///
/// POST /analyze_face
///
/// Multipart body with one file field `referenceImage`. The upload lives in a
/// unique request-scoped temp file that is removed on every exit path when
/// the form is dropped.
pub async fn analyze_face(
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<AnalyzeFaceForm>,
) -> impl Responder {
    if form.reference_image.size == 0 {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "No reference image attached",
            "referenceImage must be a non-empty file field",
            400,
        ));
    }

    if form.reference_image.size > state.max_upload_bytes {
        return HttpResponse::PayloadTooLarge().json(ErrorResponse::new(
            "Reference image is too large",
            format!("Uploads are limited to {} bytes", state.max_upload_bytes),
            413,
        ));
    }

    tracing::info!(
        "Analyzing uploaded image ({} bytes)",
        form.reference_image.size
    );

    match analyze_reference(state.engine.as_ref(), form.reference_image.file.path()) {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(AnalyzeError::InvalidImage) => HttpResponse::BadRequest().json(ErrorResponse::new(
            "invalid image format",
            "The uploaded file could not be decoded as an image",
            400,
        )),
        Err(e) => {
            tracing::error!("Analysis failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                e.to_string(),
                "Failed to analyze reference image",
                500,
            ))
        }
    }
}

/// Face comparison endpoint
///
/// POST /search_faces
///
/// Multipart body with a file field `referenceImage` and a text field
/// `targetImages` holding a JSON array of image URLs. Responds with an
/// ordered array of one verification-or-error record per URL; a failing
/// target never aborts the batch.
pub async fn search_faces(
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<SearchFacesForm>,
) -> impl Responder {
    if form.reference_image.size == 0 {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "No reference image attached",
            "referenceImage must be a non-empty file field",
            400,
        ));
    }

    if form.reference_image.size > state.max_upload_bytes {
        return HttpResponse::PayloadTooLarge().json(ErrorResponse::new(
            "Reference image is too large",
            format!("Uploads are limited to {} bytes", state.max_upload_bytes),
            413,
        ));
    }

    let urls: Vec<String> = match serde_json::from_str(form.target_images.as_str()) {
        Ok(urls) => urls,
        Err(e) => {
            tracing::info!("Rejecting malformed targetImages field: {}", e);
            return HttpResponse::BadRequest().json(ErrorResponse::new(
                "targetImages must be a JSON array of URL strings",
                e.to_string(),
                400,
            ));
        }
    };

    tracing::info!(
        "Comparing reference image ({} bytes) against {} targets",
        form.reference_image.size,
        urls.len()
    );

    // The reference is decoded and embedded once, then reused for every target
    let reference_bytes = match std::fs::read(form.reference_image.file.path()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to read reference upload: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse::new(
                e.to_string(),
                "Failed to read reference image",
                500,
            ));
        }
    };

    let reference = match preprocess::decode_image(&reference_bytes) {
        Ok(image) => image,
        Err(_) => {
            return HttpResponse::BadRequest().json(ErrorResponse::new(
                "invalid image format",
                "The reference image could not be decoded",
                400,
            ));
        }
    };

    let embedding = match state.engine.embed(&reference) {
        Ok(embedding) => embedding,
        Err(e) => {
            tracing::error!("Failed to embed reference image: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse::new(
                e.to_string(),
                "Failed to analyze reference image",
                500,
            ));
        }
    };

    let results = compare_targets(
        state.engine.as_ref(),
        state.fetcher.as_ref(),
        &embedding,
        &urls,
    )
    .await;

    let failures = results.iter().filter(|r| r.is_failure()).count();
    tracing::info!(
        "Compared {} targets ({} failed individually)",
        results.len(),
        failures
    );

    HttpResponse::Ok().json(results)
}
