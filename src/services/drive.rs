use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Field projection requested from the Drive listing API
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

/// Page size for one listing call
const LIST_PAGE_SIZE: u32 = 1000;

/// Errors that can occur when talking to the Google Drive API
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Google API Key is not defined")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("{0}")]
    ApiError(String),
}

/// Google Drive listing client
///
/// Forwards folder listing queries to the Drive v3 files API and relays the
/// provider's JSON verbatim. The API key travels as a query parameter, the
/// way the Drive API expects key-based auth.
pub struct DriveClient {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl DriveClient {
    /// Create a new Drive client
    pub fn new(endpoint: String, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint,
            api_key,
            client,
        }
    }

    /// List the files contained in one Drive folder.
    ///
    /// Returns the provider's JSON body untouched on success. A provider
    /// response that is non-2xx or carries an `error` key is surfaced as
    /// `DriveError::ApiError` with the provider's own message.
    pub async fn list_folder(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<Value, DriveError> {
        let api_key = self.api_key.as_deref().ok_or(DriveError::MissingApiKey)?;

        let parents_query = format!("'{}' in parents", folder_id);
        let mut url = format!(
            "{}?q={}&key={}&fields={}&pageSize={}",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(&parents_query),
            urlencoding::encode(api_key),
            urlencoding::encode(LIST_FIELDS),
            LIST_PAGE_SIZE
        );

        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(token));
        }

        tracing::debug!("Listing Drive folder: {}", folder_id);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() || body.get("error").is_some() {
            let message = provider_error_message(&body);
            tracing::error!("Drive listing failed for {}: {} - {}", folder_id, status, message);
            return Err(DriveError::ApiError(message));
        }

        Ok(body)
    }
}

/// Pull the human-readable message out of a Drive error body, falling back
/// to "Unknown error" when the provider gives nothing usable.
fn provider_error_message(body: &Value) -> String {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_drive_client_creation() {
        let client = DriveClient::new(
            "https://www.googleapis.com/drive/v3/files".to_string(),
            Some("test_key".to_string()),
            30,
        );

        assert_eq!(client.endpoint, "https://www.googleapis.com/drive/v3/files");
        assert_eq!(client.api_key.as_deref(), Some("test_key"));
    }

    #[test]
    fn test_provider_error_message_extraction() {
        let body = json!({"error": {"code": 403, "message": "The caller does not have permission"}});
        assert_eq!(
            provider_error_message(&body),
            "The caller does not have permission"
        );
    }

    #[test]
    fn test_provider_error_message_fallback() {
        assert_eq!(provider_error_message(&json!({"error": {}})), "Unknown error");
        assert_eq!(provider_error_message(&json!({})), "Unknown error");
    }

    #[actix_web::test]
    async fn test_missing_api_key_is_per_request() {
        let client = DriveClient::new("https://drive.test".to_string(), None, 5);
        let err = client.list_folder("folder", None).await.unwrap_err();
        assert!(matches!(err, DriveError::MissingApiKey));
        assert_eq!(err.to_string(), "Google API Key is not defined");
    }

    #[actix_web::test]
    async fn test_list_folder_passes_provider_body_through() {
        let mut server = mockito::Server::new_async().await;
        let listing = json!({
            "files": [{"id": "1", "name": "a.jpg", "mimeType": "image/jpeg"}],
            "nextPageToken": "tok"
        });

        let mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/.*".to_string()))
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("q".into(), "'folder123' in parents".into()),
                mockito::Matcher::UrlEncoded("key".into(), "k".into()),
                mockito::Matcher::UrlEncoded("pageSize".into(), "1000".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(listing.to_string())
            .create_async()
            .await;

        let client = DriveClient::new(server.url(), Some("k".to_string()), 5);
        let body = client.list_folder("folder123", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body, listing);
    }

    #[actix_web::test]
    async fn test_list_folder_surfaces_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/.*".to_string()))
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"message": "Access denied"}}"#)
            .create_async()
            .await;

        let client = DriveClient::new(server.url(), Some("k".to_string()), 5);
        let err = client.list_folder("folder123", None).await.unwrap_err();

        match err {
            DriveError::ApiError(message) => assert_eq!(message, "Access denied"),
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn test_list_folder_error_key_in_success_body() {
        // The Drive API can return 200 with an embedded error object
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/.*".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"message": "Invalid folder"}}"#)
            .create_async()
            .await;

        let client = DriveClient::new(server.url(), Some("k".to_string()), 5);
        let err = client.list_folder("folder123", None).await.unwrap_err();
        assert!(matches!(err, DriveError::ApiError(m) if m == "Invalid folder"));
    }

    #[actix_web::test]
    async fn test_list_folder_forwards_page_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/.*".to_string()))
            .match_query(mockito::Matcher::UrlEncoded(
                "pageToken".into(),
                "next-page".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"files": []}"#)
            .create_async()
            .await;

        let client = DriveClient::new(server.url(), Some("k".to_string()), 5);
        client
            .list_folder("folder123", Some("next-page"))
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
