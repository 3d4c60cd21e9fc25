use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to list files in a Drive folder
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DriveListRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "folder_id", rename = "folderId")]
    pub folder_id: String,
    #[serde(default)]
    #[serde(alias = "next_page_token", rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// Multipart upload for demographic analysis
#[derive(Debug, MultipartForm)]
pub struct AnalyzeFaceForm {
    #[multipart(rename = "referenceImage")]
    pub reference_image: TempFile,
}

/// Multipart upload for the comparator: one reference image plus a JSON array
/// of target image URLs.
#[derive(Debug, MultipartForm)]
pub struct SearchFacesForm {
    #[multipart(rename = "referenceImage")]
    pub reference_image: TempFile,
    #[multipart(rename = "targetImages")]
    pub target_images: Text<String>,
}
